//! # Persistence Store
//!
//! Repository seam for the storefront's records. The trait exposes typed
//! lookups (equality on user + ordered flag, equality on item reference)
//! instead of a generic filter surface, so backends can index them.
//!
//! `MemoryStore` is the bundled implementation, seeded from the item
//! catalog at startup.

use crate::error::StoreError;
use crate::item::{Item, ItemCatalog};
use crate::order::{CheckoutAddress, Order, OrderLine, Payment};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Typed repository over the storefront's records.
///
/// Every method is an individually atomic operation against the backend.
/// Multi-step mutations are serialized per user by `CartService`, not here.
#[async_trait]
pub trait CartStore: Send + Sync {
    /// Look up a catalog item by id
    async fn item(&self, item_id: &str) -> Result<Option<Item>, StoreError>;

    /// All catalog items
    async fn items(&self) -> Result<Vec<Item>, StoreError>;

    /// The user's open order (`ordered == false`), if any
    async fn open_order(&self, user_id: &str) -> Result<Option<Order>, StoreError>;

    /// The user's placed orders, sorted by `ordered_date` ascending
    /// (ties broken by id) so "latest" is always the last element
    async fn placed_orders(&self, user_id: &str) -> Result<Vec<Order>, StoreError>;

    async fn insert_order(&self, order: Order) -> Result<(), StoreError>;

    /// Persist changes to an existing order
    async fn save_order(&self, order: &Order) -> Result<(), StoreError>;

    /// Look up a line by id
    async fn line(&self, line_id: &str) -> Result<Option<OrderLine>, StoreError>;

    /// The user's open line for an item (`ordered == false`), if any
    async fn open_line(&self, user_id: &str, item_id: &str)
        -> Result<Option<OrderLine>, StoreError>;

    async fn insert_line(&self, line: OrderLine) -> Result<(), StoreError>;

    /// Persist changes to an existing line
    async fn save_line(&self, line: &OrderLine) -> Result<(), StoreError>;

    async fn delete_line(&self, line_id: &str) -> Result<(), StoreError>;

    async fn insert_payment(&self, payment: Payment) -> Result<(), StoreError>;

    /// Look up a payment by id
    async fn payment(&self, payment_id: &str) -> Result<Option<Payment>, StoreError>;

    /// All payments captured for a user
    async fn payments(&self, user_id: &str) -> Result<Vec<Payment>, StoreError>;

    async fn insert_address(&self, address: CheckoutAddress) -> Result<(), StoreError>;
}

/// Type alias for a shared store handle
pub type BoxedCartStore = Arc<dyn CartStore>;

#[derive(Default)]
struct MemoryInner {
    items: HashMap<String, Item>,
    orders: HashMap<String, Order>,
    lines: HashMap<String, OrderLine>,
    payments: HashMap<String, Payment>,
    addresses: HashMap<String, CheckoutAddress>,
}

/// In-memory store backed by keyed maps behind a `RwLock`.
pub struct MemoryStore {
    inner: RwLock<MemoryInner>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryInner::default()),
        }
    }

    /// Create a store seeded with a catalog
    pub fn with_catalog(catalog: &ItemCatalog) -> Self {
        let store = Self::new();
        for item in &catalog.items {
            store.seed_item(item.clone());
        }
        store
    }

    /// Seed a single catalog item
    pub fn seed_item(&self, item: Item) {
        let mut inner = self.inner.write().expect("store lock poisoned");
        inner.items.insert(item.id.clone(), item);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CartStore for MemoryStore {
    async fn item(&self, item_id: &str) -> Result<Option<Item>, StoreError> {
        let inner = self.inner.read().expect("store lock poisoned");
        Ok(inner.items.get(item_id).cloned())
    }

    async fn items(&self) -> Result<Vec<Item>, StoreError> {
        let inner = self.inner.read().expect("store lock poisoned");
        let mut items: Vec<Item> = inner.items.values().cloned().collect();
        items.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(items)
    }

    async fn open_order(&self, user_id: &str) -> Result<Option<Order>, StoreError> {
        let inner = self.inner.read().expect("store lock poisoned");
        Ok(inner
            .orders
            .values()
            .find(|o| o.user_id == user_id && !o.ordered)
            .cloned())
    }

    async fn placed_orders(&self, user_id: &str) -> Result<Vec<Order>, StoreError> {
        let inner = self.inner.read().expect("store lock poisoned");
        let mut orders: Vec<Order> = inner
            .orders
            .values()
            .filter(|o| o.user_id == user_id && o.ordered)
            .cloned()
            .collect();
        orders.sort_by(|a, b| {
            a.ordered_date
                .cmp(&b.ordered_date)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(orders)
    }

    async fn insert_order(&self, order: Order) -> Result<(), StoreError> {
        let mut inner = self.inner.write().expect("store lock poisoned");
        inner.orders.insert(order.id.clone(), order);
        Ok(())
    }

    async fn save_order(&self, order: &Order) -> Result<(), StoreError> {
        let mut inner = self.inner.write().expect("store lock poisoned");
        if !inner.orders.contains_key(&order.id) {
            return Err(StoreError::MissingRecord(format!("order {}", order.id)));
        }
        inner.orders.insert(order.id.clone(), order.clone());
        Ok(())
    }

    async fn line(&self, line_id: &str) -> Result<Option<OrderLine>, StoreError> {
        let inner = self.inner.read().expect("store lock poisoned");
        Ok(inner.lines.get(line_id).cloned())
    }

    async fn open_line(
        &self,
        user_id: &str,
        item_id: &str,
    ) -> Result<Option<OrderLine>, StoreError> {
        let inner = self.inner.read().expect("store lock poisoned");
        Ok(inner
            .lines
            .values()
            .find(|l| l.user_id == user_id && l.item_id == item_id && !l.ordered)
            .cloned())
    }

    async fn insert_line(&self, line: OrderLine) -> Result<(), StoreError> {
        let mut inner = self.inner.write().expect("store lock poisoned");
        inner.lines.insert(line.id.clone(), line);
        Ok(())
    }

    async fn save_line(&self, line: &OrderLine) -> Result<(), StoreError> {
        let mut inner = self.inner.write().expect("store lock poisoned");
        if !inner.lines.contains_key(&line.id) {
            return Err(StoreError::MissingRecord(format!("line {}", line.id)));
        }
        inner.lines.insert(line.id.clone(), line.clone());
        Ok(())
    }

    async fn delete_line(&self, line_id: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write().expect("store lock poisoned");
        inner.lines.remove(line_id);
        Ok(())
    }

    async fn insert_payment(&self, payment: Payment) -> Result<(), StoreError> {
        let mut inner = self.inner.write().expect("store lock poisoned");
        inner.payments.insert(payment.id.clone(), payment);
        Ok(())
    }

    async fn payment(&self, payment_id: &str) -> Result<Option<Payment>, StoreError> {
        let inner = self.inner.read().expect("store lock poisoned");
        Ok(inner.payments.get(payment_id).cloned())
    }

    async fn payments(&self, user_id: &str) -> Result<Vec<Payment>, StoreError> {
        let inner = self.inner.read().expect("store lock poisoned");
        let mut payments: Vec<Payment> = inner
            .payments
            .values()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        payments.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(payments)
    }

    async fn insert_address(&self, address: CheckoutAddress) -> Result<(), StoreError> {
        let mut inner = self.inner.write().expect("store lock poisoned");
        inner.addresses.insert(address.id.clone(), address);
        Ok(())
    }
}
