//! # Charge Gateway Trait
//!
//! Seam between the cart state machine and the external payment processor.
//! Implementations: Stripe (`cart-stripe`), test stubs.

use crate::error::GatewayError;
use crate::item::Price;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A successfully captured charge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Charge {
    /// Provider's charge identifier, opaque to the cart
    pub charge_id: String,
}

/// Trait for payment provider implementations.
///
/// A charge is a single synchronous request/response call: no retry policy,
/// no cancellation. Failures come back as a typed `GatewayError` kind that
/// the cart maps to a user-facing message.
#[async_trait]
pub trait ChargeGateway: Send + Sync {
    /// Capture a charge for `amount` against an opaque client-side `token`.
    async fn charge(&self, amount: Price, token: &str) -> Result<Charge, GatewayError>;

    /// Get the provider name (for logging).
    fn provider_name(&self) -> &'static str;
}

/// Type alias for a boxed charge gateway (dynamic dispatch)
pub type BoxedChargeGateway = Arc<dyn ChargeGateway>;
