//! # cart-api
//!
//! HTTP API layer for storefront-rs: axum handlers and router over the
//! `cart-core` state machine, with Stripe as the charge gateway.

pub mod handlers;
pub mod routes;
pub mod state;
