//! # cart-core
//!
//! Core types and cart state machine for the storefront engine.
//!
//! This crate provides:
//! - `Item` and `ItemCatalog` for the read-only product catalog
//! - `Order`, `OrderLine`, `Payment`, and `CheckoutAddress` records
//! - `CartStore` repository trait with an in-memory implementation
//! - `ChargeGateway` trait for payment providers
//! - `CartService`, the cart/order state machine
//! - `CartError` for typed error handling
//!
//! ## Example
//!
//! ```rust,ignore
//! use cart_core::{CartService, MemoryStore, Item, Price, Currency};
//! use std::sync::Arc;
//!
//! let store = Arc::new(MemoryStore::new());
//! store.seed_item(Item::new("blue-hoodie", "Blue Hoodie", Price::from_cents(4200, Currency::USD)));
//!
//! let cart = CartService::new(store, gateway);
//!
//! // Add an item, then capture payment
//! cart.add_to_cart("user-1", "blue-hoodie").await?;
//! cart.pay("user-1", "tok_visa").await?;
//! ```

pub mod cart;
pub mod error;
pub mod gateway;
pub mod item;
pub mod order;
pub mod store;

// Re-exports for convenience
pub use cart::{AddressForm, CartService};
pub use error::{CartError, CartResult, GatewayError, StoreError};
pub use gateway::{BoxedChargeGateway, Charge, ChargeGateway};
pub use item::{Currency, Item, ItemCatalog, Price};
pub use order::{
    CartNotice, CheckoutAddress, LineView, Order, OrderLine, OrderView, Payment,
};
pub use store::{BoxedCartStore, CartStore, MemoryStore};
