//! # Request Handlers
//!
//! Axum request handlers for the storefront API. Every cart route takes
//! the authenticated user identity from the `X-User-Id` header and returns
//! either a notice or a typed error response; nothing here renders HTML.

use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use cart_core::{AddressForm, CartError, CartNotice};
use serde::{Deserialize, Serialize};
use tracing::{error, instrument};

// =============================================================================
// Request/Response Types
// =============================================================================

/// Body for the add/remove/reduce cart mutations
#[derive(Debug, Deserialize)]
pub struct CartItemRequest {
    /// Catalog item ID
    pub item_id: String,
}

/// Body for the payment route
#[derive(Debug, Deserialize)]
pub struct PayRequest {
    /// Opaque card token collected client-side
    pub token: String,
}

/// Notice response for cart mutations
#[derive(Debug, Serialize)]
pub struct NoticeResponse {
    /// User-facing message
    pub message: String,
    /// Structured notice for clients that branch without string matching
    pub notice: CartNotice,
}

impl From<CartNotice> for NoticeResponse {
    fn from(notice: CartNotice) -> Self {
        Self {
            message: notice.to_string(),
            notice,
        }
    }
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: u16) -> Self {
        Self {
            error: error.into(),
            code,
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

fn cart_error_to_response(err: CartError) -> (StatusCode, Json<ErrorResponse>) {
    let code = err.status_code();
    let response = ErrorResponse::new(err.to_string(), code);
    (
        StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        Json(response),
    )
}

/// Pull the authenticated identity off the request headers
fn require_user(headers: &HeaderMap) -> Result<String, (StatusCode, Json<ErrorResponse>)> {
    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(String::from)
        .ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new("Missing X-User-Id header", 400)),
            )
        })
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "storefront",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// List the catalog
pub async fn list_items(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    let items = state.cart.catalog().await.map_err(cart_error_to_response)?;
    Ok(Json(serde_json::json!({
        "items": items,
        "count": items.len()
    })))
}

/// Get a single catalog item
pub async fn get_item(
    State(state): State<AppState>,
    Path(item_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    let item = state
        .cart
        .item(&item_id)
        .await
        .map_err(cart_error_to_response)?;
    Ok(Json(item))
}

/// Add one unit of an item to the cart
#[instrument(skip(state, headers), fields(item_id = %request.item_id))]
pub async fn add_to_cart(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CartItemRequest>,
) -> Result<Json<NoticeResponse>, (StatusCode, Json<ErrorResponse>)> {
    let user = require_user(&headers)?;
    let notice = state
        .cart
        .add_to_cart(&user, &request.item_id)
        .await
        .map_err(cart_error_to_response)?;
    Ok(Json(notice.into()))
}

/// Remove an item's line from the cart entirely
#[instrument(skip(state, headers), fields(item_id = %request.item_id))]
pub async fn remove_from_cart(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CartItemRequest>,
) -> Result<Json<NoticeResponse>, (StatusCode, Json<ErrorResponse>)> {
    let user = require_user(&headers)?;
    let notice = state
        .cart
        .remove_from_cart(&user, &request.item_id)
        .await
        .map_err(cart_error_to_response)?;
    Ok(Json(notice.into()))
}

/// Reduce an item's quantity by one
#[instrument(skip(state, headers), fields(item_id = %request.item_id))]
pub async fn reduce_quantity(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CartItemRequest>,
) -> Result<Json<NoticeResponse>, (StatusCode, Json<ErrorResponse>)> {
    let user = require_user(&headers)?;
    let notice = state
        .cart
        .reduce_quantity(&user, &request.item_id)
        .await
        .map_err(cart_error_to_response)?;
    Ok(Json(notice.into()))
}

/// Summary of the open cart
#[instrument(skip(state, headers))]
pub async fn cart_summary(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    let user = require_user(&headers)?;
    let view = state
        .cart
        .open_cart(&user)
        .await
        .map_err(cart_error_to_response)?;
    Ok(Json(view))
}

/// Record the checkout address against the open order
#[instrument(skip(state, headers, request))]
pub async fn checkout(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<AddressForm>,
) -> Result<Json<NoticeResponse>, (StatusCode, Json<ErrorResponse>)> {
    let user = require_user(&headers)?;
    let notice = state
        .cart
        .checkout(&user, request)
        .await
        .map_err(cart_error_to_response)?;
    Ok(Json(notice.into()))
}

/// Capture payment for the open order
#[instrument(skip(state, headers, request))]
pub async fn pay(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<PayRequest>,
) -> Result<Json<NoticeResponse>, (StatusCode, Json<ErrorResponse>)> {
    let user = require_user(&headers)?;
    let notice = state
        .cart
        .pay(&user, &request.token)
        .await
        .map_err(|e| {
            error!("Payment failed: {}", e);
            cart_error_to_response(e)
        })?;
    Ok(Json(notice.into()))
}

/// Confirmation view: the most recently placed order
#[instrument(skip(state, headers))]
pub async fn latest_order(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    let user = require_user(&headers)?;
    let view = state
        .cart
        .latest_placed_order(&user)
        .await
        .map_err(cart_error_to_response)?;
    Ok(Json(view))
}
