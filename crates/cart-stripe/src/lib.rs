//! # cart-stripe
//!
//! Stripe charge gateway for storefront-rs.
//!
//! Captures payments through the Stripe Charge API: one form-POST per
//! capture, authenticated with the secret key, classified into typed
//! `GatewayError` kinds on failure.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use cart_stripe::StripeChargeGateway;
//! use cart_core::{ChargeGateway, Price, Currency};
//!
//! // Create gateway from environment (STRIPE_SECRET_KEY)
//! let gateway = StripeChargeGateway::from_env()?;
//!
//! // Capture a charge
//! let charge = gateway
//!     .charge(Price::from_cents(2000, Currency::USD), "tok_visa")
//!     .await?;
//!
//! println!("captured {}", charge.charge_id);
//! ```

pub mod charge;
pub mod config;

// Re-exports
pub use charge::StripeChargeGateway;
pub use config::StripeConfig;
