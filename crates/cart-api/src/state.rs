//! # Application State
//!
//! Shared state for the axum application: the cart service wired to the
//! in-memory store and the Stripe gateway, plus server configuration.

use cart_core::{CartService, ItemCatalog, MemoryStore};
use cart_stripe::StripeChargeGateway;
use std::sync::Arc;

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Environment (development, staging, production)
    pub environment: String,
}

impl AppConfig {
    /// Load from environment variables
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
        }
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> std::net::SocketAddr {
        format!("{}:{}", self.host, self.port)
            .parse()
            .expect("Invalid socket address")
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// The cart/order state machine
    pub cart: Arc<CartService>,
    /// Application config
    pub config: AppConfig,
}

impl AppState {
    /// Create a new AppState with the in-memory store and Stripe gateway
    pub fn new() -> anyhow::Result<Self> {
        let config = AppConfig::from_env();

        let catalog = load_item_catalog()?;
        let store = Arc::new(MemoryStore::with_catalog(&catalog));

        let gateway = StripeChargeGateway::from_env()
            .map_err(|e| anyhow::anyhow!("Failed to initialize Stripe: {}", e))?;

        let cart = Arc::new(CartService::new(store, Arc::new(gateway)));

        Ok(Self { cart, config })
    }

    /// Assemble state from pre-built parts (used by tests)
    pub fn with_parts(cart: Arc<CartService>, config: AppConfig) -> Self {
        Self { cart, config }
    }
}

/// Load the item catalog from the config file
fn load_item_catalog() -> anyhow::Result<ItemCatalog> {
    let config_paths = [
        "config/items.toml",
        "../config/items.toml",
        "../../config/items.toml",
    ];

    for path in config_paths {
        if let Ok(content) = std::fs::read_to_string(path) {
            let catalog = ItemCatalog::from_toml(&content)
                .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path, e))?;
            tracing::info!("Loaded {} items from {}", catalog.items.len(), path);
            return Ok(catalog);
        }
    }

    // Return empty catalog if no config found
    tracing::warn!("No item catalog found, using empty catalog");
    Ok(ItemCatalog::new())
}
