//! # Stripe Charges
//!
//! Implementation of the Stripe Charge API: a single synchronous capture
//! per payment, no retries. Failures are classified from Stripe's error
//! envelope into `GatewayError` kinds.

use crate::config::StripeConfig;
use async_trait::async_trait;
use cart_core::{Charge, ChargeGateway, GatewayError, Price};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, error, info, instrument};

/// Stripe charge gateway
///
/// Captures funds with a card token collected client-side; the server
/// never sees card data.
pub struct StripeChargeGateway {
    config: StripeConfig,
    client: Client,
}

impl StripeChargeGateway {
    /// Create a new Stripe charge gateway
    pub fn new(config: StripeConfig) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self { config, client }
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self, cart_core::CartError> {
        let config = StripeConfig::from_env()?;
        Ok(Self::new(config))
    }
}

#[async_trait]
impl ChargeGateway for StripeChargeGateway {
    #[instrument(skip(self, token), fields(amount = amount.amount, currency = %amount.currency))]
    async fn charge(&self, amount: Price, token: &str) -> Result<Charge, GatewayError> {
        let url = format!("{}/v1/charges", self.config.api_base_url);

        let form_params = [
            ("amount", amount.amount.to_string()),
            ("currency", amount.currency.as_str().to_string()),
            ("source", token.to_string()),
        ];

        debug!("Creating Stripe charge");

        let response = self
            .client
            .post(&url)
            .header("Authorization", self.config.auth_header())
            .header("Stripe-Version", &self.config.api_version)
            .form(&form_params)
            .send()
            .await
            .map_err(|e| {
                error!("Stripe request failed: {}", e);
                GatewayError::Network
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            error!("Failed to read Stripe response: {}", e);
            GatewayError::Network
        })?;

        if !status.is_success() {
            error!("Stripe API error: status={}, body={}", status, body);
            return Err(classify_error(status.as_u16(), &body));
        }

        let charge_response: StripeChargeResponse =
            serde_json::from_str(&body).map_err(|e| {
                error!("Failed to parse Stripe response: {}", e);
                GatewayError::Unclassified
            })?;

        info!("Created Stripe charge: id={}", charge_response.id);

        Ok(Charge {
            charge_id: charge_response.id,
        })
    }

    fn provider_name(&self) -> &'static str {
        "stripe"
    }
}

/// Classify a non-2xx Stripe response into a `GatewayError` kind.
///
/// The `error.type` field is authoritative; the HTTP status is the
/// fallback when the envelope does not parse.
fn classify_error(status: u16, body: &str) -> GatewayError {
    let envelope: Result<StripeErrorResponse, _> = serde_json::from_str(body);

    let Ok(envelope) = envelope else {
        return GatewayError::Unclassified;
    };

    match envelope.error.error_type.as_deref() {
        Some("card_error") => GatewayError::CardDeclined {
            message: envelope
                .error
                .message
                .unwrap_or_else(|| "Your card was declined".to_string()),
        },
        Some("rate_limit_error") => GatewayError::RateLimited,
        Some("invalid_request_error") => GatewayError::InvalidRequest,
        Some("authentication_error") => GatewayError::AuthenticationFailed,
        Some(_) => GatewayError::Gateway,
        None => match status {
            401 => GatewayError::AuthenticationFailed,
            429 => GatewayError::RateLimited,
            _ => GatewayError::Gateway,
        },
    }
}

// =============================================================================
// Stripe API Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct StripeChargeResponse {
    id: String,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorResponse {
    error: StripeError,
}

#[derive(Debug, Deserialize)]
struct StripeError {
    #[serde(rename = "type")]
    error_type: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use cart_core::Currency;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn gateway_for(server: &MockServer) -> StripeChargeGateway {
        let config = StripeConfig::new("sk_test_abc123").with_api_base_url(server.uri());
        StripeChargeGateway::new(config)
    }

    fn dollars(amount: i64) -> Price {
        Price::from_cents(amount, Currency::USD)
    }

    #[test]
    fn test_classify_card_error() {
        let body = json!({
            "error": {
                "type": "card_error",
                "code": "card_declined",
                "message": "Your card has insufficient funds."
            }
        })
        .to_string();

        let err = classify_error(402, &body);
        assert_eq!(
            err,
            GatewayError::CardDeclined {
                message: "Your card has insufficient funds.".into()
            }
        );
    }

    #[test]
    fn test_classify_by_type() {
        let typed = |t: &str| {
            json!({ "error": { "type": t, "message": "m" } }).to_string()
        };

        assert_eq!(
            classify_error(429, &typed("rate_limit_error")),
            GatewayError::RateLimited
        );
        assert_eq!(
            classify_error(400, &typed("invalid_request_error")),
            GatewayError::InvalidRequest
        );
        assert_eq!(
            classify_error(401, &typed("authentication_error")),
            GatewayError::AuthenticationFailed
        );
        assert_eq!(
            classify_error(500, &typed("api_error")),
            GatewayError::Gateway
        );
    }

    #[test]
    fn test_classify_falls_back_to_status() {
        let untyped = json!({ "error": { "message": "m" } }).to_string();

        assert_eq!(classify_error(401, &untyped), GatewayError::AuthenticationFailed);
        assert_eq!(classify_error(429, &untyped), GatewayError::RateLimited);
        assert_eq!(classify_error(500, &untyped), GatewayError::Gateway);
    }

    #[test]
    fn test_classify_garbage_body() {
        assert_eq!(
            classify_error(500, "<html>not json</html>"),
            GatewayError::Unclassified
        );
    }

    #[tokio::test]
    async fn test_charge_success() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/charges"))
            .and(header("Authorization", "Bearer sk_test_abc123"))
            .and(body_string_contains("amount=2000"))
            .and(body_string_contains("currency=usd"))
            .and(body_string_contains("source=tok_visa"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "ch_test_123",
                "status": "succeeded"
            })))
            .mount(&server)
            .await;

        let gateway = gateway_for(&server);
        let charge = gateway.charge(dollars(2000), "tok_visa").await.unwrap();

        assert_eq!(charge.charge_id, "ch_test_123");
    }

    #[tokio::test]
    async fn test_charge_declined() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/charges"))
            .respond_with(ResponseTemplate::new(402).set_body_json(json!({
                "error": {
                    "type": "card_error",
                    "code": "card_declined",
                    "message": "Your card was declined."
                }
            })))
            .mount(&server)
            .await;

        let gateway = gateway_for(&server);
        let err = gateway
            .charge(dollars(2000), "tok_chargeDeclined")
            .await
            .unwrap_err();

        assert_eq!(
            err,
            GatewayError::CardDeclined {
                message: "Your card was declined.".into()
            }
        );
    }

    #[tokio::test]
    async fn test_charge_rate_limited() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/charges"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "error": { "type": "rate_limit_error", "message": "Too many requests" }
            })))
            .mount(&server)
            .await;

        let gateway = gateway_for(&server);
        let err = gateway.charge(dollars(2000), "tok_visa").await.unwrap_err();

        assert_eq!(err, GatewayError::RateLimited);
    }

    #[tokio::test]
    async fn test_charge_network_error() {
        // Nothing listening on this port
        let config = StripeConfig::new("sk_test_abc123")
            .with_api_base_url("http://127.0.0.1:1");
        let gateway = StripeChargeGateway::new(config);

        let err = gateway.charge(dollars(2000), "tok_visa").await.unwrap_err();
        assert_eq!(err, GatewayError::Network);
    }
}
