//! # Order Records
//!
//! Order, line, payment and checkout-address records for the storefront.
//!
//! An `Order` with `ordered == false` is the user's open cart; there is at
//! most one per user at any time. The order transitions open -> placed
//! exactly once, on successful payment capture, and never back.

use crate::item::{Item, Price};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One line in a user's cart: an item, a quantity and an ordered flag.
///
/// Created when the user first adds the item, mutated on repeat add/reduce,
/// deleted on removal or when the quantity would drop to zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLine {
    /// Unique line ID (generated)
    pub id: String,

    /// Catalog item this line refers to
    pub item_id: String,

    /// Owning user
    pub user_id: String,

    /// Item name (denormalized for display)
    pub name: String,

    /// Unit price captured from the item at creation
    pub unit_price: Price,

    /// Quantity, always >= 1 while the record exists
    pub quantity: u32,

    /// Frozen once the owning order is placed
    pub ordered: bool,
}

impl OrderLine {
    /// Create a quantity-1 line from a catalog item
    pub fn from_item(item: &Item, user_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            item_id: item.id.clone(),
            user_id: user_id.into(),
            name: item.name.clone(),
            unit_price: item.price.clone(),
            quantity: 1,
            ordered: false,
        }
    }

    /// Calculate the total price for this line
    pub fn total(&self) -> Price {
        Price {
            amount: self.unit_price.amount * self.quantity as i64,
            currency: self.unit_price.currency,
        }
    }
}

/// An order: the open cart while `ordered == false`, a placed order after.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Unique order ID (generated)
    pub id: String,

    /// Owning user
    pub user_id: String,

    /// false = open cart, true = placed
    pub ordered: bool,

    /// When the order was created
    pub ordered_date: DateTime<Utc>,

    /// Attached line IDs (attachment order irrelevant)
    pub line_ids: Vec<String>,

    /// Payment captured for this order, set on placement
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,

    /// Checkout address collected for this order
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address_id: Option<String>,
}

impl Order {
    /// Create a new open order for a user
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            ordered: false,
            ordered_date: Utc::now(),
            line_ids: Vec::new(),
            payment_id: None,
            address_id: None,
        }
    }

    /// Check whether a line is attached to this order
    pub fn contains_line(&self, line_id: &str) -> bool {
        self.line_ids.iter().any(|id| id == line_id)
    }

    /// Attach a line to this order
    pub fn attach_line(&mut self, line_id: impl Into<String>) {
        self.line_ids.push(line_id.into());
    }

    /// Detach a line from this order
    pub fn detach_line(&mut self, line_id: &str) {
        self.line_ids.retain(|id| id != line_id);
    }

    /// Check if the order has no lines
    pub fn is_empty(&self) -> bool {
        self.line_ids.is_empty()
    }
}

/// A captured payment, created exactly once per successful checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    /// Unique payment ID (generated)
    pub id: String,

    /// External charge identifier, opaque
    pub charge_id: String,

    /// Paying user
    pub user_id: String,

    /// Captured amount
    pub amount: Price,

    /// When the payment was captured
    pub created_at: DateTime<Utc>,
}

impl Payment {
    /// Record a captured charge
    pub fn new(charge_id: impl Into<String>, user_id: impl Into<String>, amount: Price) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            charge_id: charge_id.into(),
            user_id: user_id.into(),
            amount,
            created_at: Utc::now(),
        }
    }
}

/// Shipping/billing address collected at checkout. Thin form data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutAddress {
    /// Unique address ID (generated)
    pub id: String,

    /// Owning user
    pub user_id: String,

    pub street: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub apartment: Option<String>,

    /// ISO country code
    pub country: String,

    pub zip: String,
}

impl CheckoutAddress {
    pub fn new(
        user_id: impl Into<String>,
        street: impl Into<String>,
        apartment: Option<String>,
        country: impl Into<String>,
        zip: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            street: street.into(),
            apartment,
            country: country.into(),
            zip: zip.into(),
        }
    }
}

/// User-facing notice returned by every cart mutation.
///
/// Display strings carry the message shown to the user; the serialized tag
/// lets API clients branch without string matching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CartNotice {
    /// Item newly attached to the cart
    ItemAdded { name: String },
    /// Item was already in the cart; its quantity went up by one
    QuantityIncreased { name: String },
    /// Line removed entirely
    ItemRemoved { name: String },
    /// Quantity went down by one, or the line was removed at quantity 1
    QuantityReduced { name: String },
    /// No open order exists for this user; nothing was changed
    NoOpenOrder,
    /// The item is not in the user's cart; nothing was changed
    NotInCart,
    /// Checkout address recorded against the open order
    CheckoutComplete,
    /// Payment captured; the order is now placed
    OrderPlaced,
}

impl std::fmt::Display for CartNotice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CartNotice::ItemAdded { .. } => write!(f, "Item added to your cart"),
            CartNotice::QuantityIncreased { .. } => write!(f, "Added quantity to item"),
            CartNotice::ItemRemoved { name } => {
                write!(f, "Item \"{}\" removed from your cart", name)
            }
            CartNotice::QuantityReduced { .. } => write!(f, "Item quantity has been updated"),
            CartNotice::NoOpenOrder => write!(f, "You do not have an order"),
            CartNotice::NotInCart => write!(f, "This item is not in your cart"),
            CartNotice::CheckoutComplete => write!(f, "Checkout address saved"),
            CartNotice::OrderPlaced => write!(f, "Your order has been placed"),
        }
    }
}

/// Read-only projection of one order line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineView {
    pub item_id: String,
    pub name: String,
    pub unit_price: Price,
    pub quantity: u32,
    pub line_total: Price,
}

impl From<&OrderLine> for LineView {
    fn from(line: &OrderLine) -> Self {
        Self {
            item_id: line.item_id.clone(),
            name: line.name.clone(),
            unit_price: line.unit_price.clone(),
            quantity: line.quantity,
            line_total: line.total(),
        }
    }
}

/// Read-only projection of an order: the summary and confirmation views.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderView {
    pub order_id: String,
    pub ordered: bool,
    pub ordered_date: DateTime<Utc>,
    pub lines: Vec<LineView>,
    pub total: Price,
    /// External charge id, present once the order is placed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub charge_id: Option<String>,
}
