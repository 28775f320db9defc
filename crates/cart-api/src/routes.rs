//! # Routes
//!
//! Axum router configuration for the storefront API.

use crate::handlers;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Create the main application router
///
/// Routes:
/// - Catalog:
///   - GET  /api/v1/items - List catalog items
///   - GET  /api/v1/items/{item_id} - Get item by ID
///
/// - Cart (all take X-User-Id):
///   - GET  /api/v1/cart - Open cart summary
///   - POST /api/v1/cart/add - Add one unit of an item
///   - POST /api/v1/cart/remove - Remove an item's line entirely
///   - POST /api/v1/cart/reduce - Reduce an item's quantity by one
///
/// - Checkout/payment:
///   - POST /api/v1/checkout - Record checkout address
///   - POST /api/v1/pay - Capture payment, place the order
///   - GET  /api/v1/orders/latest - Most recently placed order
pub fn create_router(state: AppState) -> Router {
    // CORS configuration - allow all origins for now
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let catalog_routes = Router::new()
        .route("/items", get(handlers::list_items))
        .route("/items/{item_id}", get(handlers::get_item));

    let cart_routes = Router::new()
        .route("/cart", get(handlers::cart_summary))
        .route("/cart/add", post(handlers::add_to_cart))
        .route("/cart/remove", post(handlers::remove_from_cart))
        .route("/cart/reduce", post(handlers::reduce_quantity));

    let order_routes = Router::new()
        .route("/checkout", post(handlers::checkout))
        .route("/pay", post(handlers::pay))
        .route("/orders/latest", get(handlers::latest_order));

    let api_routes = Router::new()
        .merge(catalog_routes)
        .merge(cart_routes)
        .merge(order_routes);

    Router::new()
        // Health check at root
        .route("/health", get(handlers::health))
        .route("/", get(handlers::health))
        // API v1
        .nest("/api/v1", api_routes)
        // Middleware
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        // State
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppConfig;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use cart_core::{
        CartService, Charge, ChargeGateway, Currency, GatewayError, Item, MemoryStore, Price,
    };
    use std::sync::Arc;
    use tower::ServiceExt;

    struct AlwaysOk;

    #[async_trait]
    impl ChargeGateway for AlwaysOk {
        async fn charge(&self, _amount: Price, _token: &str) -> Result<Charge, GatewayError> {
            Ok(Charge {
                charge_id: "ch_test_123".into(),
            })
        }

        fn provider_name(&self) -> &'static str {
            "test"
        }
    }

    fn test_router() -> Router {
        let store = Arc::new(MemoryStore::new());
        store.seed_item(Item::new(
            "blue-hoodie",
            "Blue Hoodie",
            Price::new(42.0, Currency::USD),
        ));

        let cart = Arc::new(CartService::new(store, Arc::new(AlwaysOk)));
        let config = AppConfig {
            host: "127.0.0.1".into(),
            port: 0,
            environment: "test".into(),
        };

        create_router(AppState::with_parts(cart, config))
    }

    fn json_post(uri: &str, user: Option<&str>, body: &str) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(user) = user {
            builder = builder.header("x-user-id", user);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let app = test_router();

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_add_then_pay_flow() {
        let app = test_router();

        let response = app
            .clone()
            .oneshot(json_post(
                "/api/v1/cart/add",
                Some("user-1"),
                r#"{"item_id":"blue-hoodie"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(json_post(
                "/api/v1/pay",
                Some("user-1"),
                r#"{"token":"tok_visa"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // The cart is gone once the order is placed
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/cart")
                    .header("x-user-id", "user-1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_missing_user_header() {
        let app = test_router();

        let response = app
            .oneshot(json_post(
                "/api/v1/cart/add",
                None,
                r#"{"item_id":"blue-hoodie"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_item_is_404() {
        let app = test_router();

        let response = app
            .oneshot(json_post(
                "/api/v1/cart/add",
                Some("user-1"),
                r#"{"item_id":"red-hoodie"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
