//! # Cart State Machine
//!
//! `CartService` mutates order and line records in response to user
//! actions and orchestrates payment capture through a `ChargeGateway`.
//!
//! Invariants maintained here:
//! - at most one open order per user
//! - line quantity never reaches zero while the record exists
//! - an order transitions open -> placed exactly once, on gateway success
//!
//! Every mutating operation takes the calling user's lock first, so the
//! find-or-create and increment steps cannot interleave across concurrent
//! requests from the same user.

use crate::error::{CartError, CartResult};
use crate::gateway::BoxedChargeGateway;
use crate::item::{Item, Price};
use crate::order::{
    CartNotice, CheckoutAddress, LineView, Order, OrderLine, OrderView, Payment,
};
use crate::store::BoxedCartStore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{info, instrument, warn};

/// Checkout address form fields
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressForm {
    pub street: String,
    #[serde(default)]
    pub apartment: Option<String>,
    pub country: String,
    pub zip: String,
}

/// The cart/order state machine.
///
/// Stateless per request apart from the per-user mutation locks; all
/// record state lives in the store.
pub struct CartService {
    store: BoxedCartStore,
    gateway: BoxedChargeGateway,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl CartService {
    pub fn new(store: BoxedCartStore, gateway: BoxedChargeGateway) -> Self {
        Self {
            store,
            gateway,
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn user_lock(&self, user_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().expect("lock table poisoned");
        locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    async fn require_item(&self, item_id: &str) -> CartResult<Item> {
        self.store
            .item(item_id)
            .await?
            .ok_or_else(|| CartError::ItemNotFound {
                item_id: item_id.to_string(),
            })
    }

    /// Resolve an order's attached lines. A dangling line id is a store
    /// inconsistency, not a user error.
    async fn order_lines(&self, order: &Order) -> CartResult<Vec<OrderLine>> {
        let mut lines = Vec::with_capacity(order.line_ids.len());
        for line_id in &order.line_ids {
            let line = self.store.line(line_id).await?.ok_or_else(|| {
                crate::error::StoreError::MissingRecord(format!("line {}", line_id))
            })?;
            lines.push(line);
        }
        Ok(lines)
    }

    fn order_total(lines: &[OrderLine]) -> Price {
        let currency = lines
            .first()
            .map(|l| l.unit_price.currency)
            .unwrap_or_default();
        Price {
            amount: lines.iter().map(|l| l.total().amount).sum(),
            currency,
        }
    }

    fn view_of(order: &Order, lines: &[OrderLine], charge_id: Option<String>) -> OrderView {
        OrderView {
            order_id: order.id.clone(),
            ordered: order.ordered,
            ordered_date: order.ordered_date,
            lines: lines.iter().map(LineView::from).collect(),
            total: Self::order_total(lines),
            charge_id,
        }
    }

    /// List the catalog
    pub async fn catalog(&self) -> CartResult<Vec<Item>> {
        Ok(self.store.items().await?)
    }

    /// Look up a single catalog item
    pub async fn item(&self, item_id: &str) -> CartResult<Item> {
        self.require_item(item_id).await
    }

    /// Add one unit of an item to the user's cart.
    ///
    /// Creates the open order lazily on first add. Repeat adds of the same
    /// item increment the existing line's quantity.
    #[instrument(skip(self))]
    pub async fn add_to_cart(&self, user_id: &str, item_id: &str) -> CartResult<CartNotice> {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;

        let item = self.require_item(item_id).await?;

        // Find-or-create the open line for (user, item)
        let line = match self.store.open_line(user_id, item_id).await? {
            Some(line) => line,
            None => {
                let line = OrderLine::from_item(&item, user_id);
                self.store.insert_line(line.clone()).await?;
                line
            }
        };

        match self.store.open_order(user_id).await? {
            Some(mut order) => {
                if order.contains_line(&line.id) {
                    let mut line = line;
                    line.quantity += 1;
                    self.store.save_line(&line).await?;

                    info!(quantity = line.quantity, "increased line quantity");
                    Ok(CartNotice::QuantityIncreased { name: item.name })
                } else {
                    order.attach_line(&line.id);
                    self.store.save_order(&order).await?;

                    info!(order_id = %order.id, "attached item to open order");
                    Ok(CartNotice::ItemAdded { name: item.name })
                }
            }
            None => {
                let mut order = Order::new(user_id);
                order.attach_line(&line.id);
                self.store.insert_order(order).await?;

                info!("created open order");
                Ok(CartNotice::ItemAdded { name: item.name })
            }
        }
    }

    /// Remove an item's line from the cart entirely (not a decrement).
    ///
    /// Degrades to a no-op notice when there is no open order or the item
    /// is not in it.
    #[instrument(skip(self))]
    pub async fn remove_from_cart(&self, user_id: &str, item_id: &str) -> CartResult<CartNotice> {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;

        self.require_item(item_id).await?;

        let Some(mut order) = self.store.open_order(user_id).await? else {
            return Ok(CartNotice::NoOpenOrder);
        };

        let Some(line) = self.store.open_line(user_id, item_id).await? else {
            return Ok(CartNotice::NotInCart);
        };
        if !order.contains_line(&line.id) {
            return Ok(CartNotice::NotInCart);
        }

        order.detach_line(&line.id);
        self.store.delete_line(&line.id).await?;
        self.store.save_order(&order).await?;

        Ok(CartNotice::ItemRemoved { name: line.name })
    }

    /// Reduce an item's quantity by one; at quantity 1 the line is removed
    /// entirely. Same no-op guards as `remove_from_cart`.
    #[instrument(skip(self))]
    pub async fn reduce_quantity(&self, user_id: &str, item_id: &str) -> CartResult<CartNotice> {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;

        self.require_item(item_id).await?;

        let Some(mut order) = self.store.open_order(user_id).await? else {
            return Ok(CartNotice::NoOpenOrder);
        };

        let Some(mut line) = self.store.open_line(user_id, item_id).await? else {
            return Ok(CartNotice::NotInCart);
        };
        if !order.contains_line(&line.id) {
            return Ok(CartNotice::NotInCart);
        }

        if line.quantity > 1 {
            line.quantity -= 1;
            self.store.save_line(&line).await?;
        } else {
            order.detach_line(&line.id);
            self.store.delete_line(&line.id).await?;
            self.store.save_order(&order).await?;
        }

        Ok(CartNotice::QuantityReduced { name: line.name })
    }

    /// Record the checkout address against the open order.
    ///
    /// Does not advance order state: only a successful payment places the
    /// order.
    #[instrument(skip(self, address))]
    pub async fn checkout(&self, user_id: &str, address: AddressForm) -> CartResult<CartNotice> {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;

        let Some(mut order) = self.store.open_order(user_id).await? else {
            return Err(CartError::OrderNotFound);
        };

        let address = CheckoutAddress::new(
            user_id,
            address.street,
            address.apartment,
            address.country,
            address.zip,
        );
        order.address_id = Some(address.id.clone());

        self.store.insert_address(address).await?;
        self.store.save_order(&order).await?;

        Ok(CartNotice::CheckoutComplete)
    }

    /// Capture payment for the open order and place it.
    ///
    /// On gateway failure the order is left untouched; no payment record
    /// is created and the error kind surfaces as the user notice.
    #[instrument(skip(self, token))]
    pub async fn pay(&self, user_id: &str, token: &str) -> CartResult<CartNotice> {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;

        let Some(mut order) = self.store.open_order(user_id).await? else {
            return Err(CartError::OrderNotFound);
        };

        let lines = self.order_lines(&order).await?;
        if lines.is_empty() {
            return Err(CartError::EmptyOrder);
        }

        let total = Self::order_total(&lines);

        let charge = match self.gateway.charge(total.clone(), token).await {
            Ok(charge) => charge,
            Err(e) => {
                warn!(order_id = %order.id, error = %e, "charge failed");
                return Err(CartError::Gateway(e));
            }
        };

        let payment = Payment::new(charge.charge_id, user_id, total);

        for mut line in lines {
            line.ordered = true;
            self.store.save_line(&line).await?;
        }

        order.ordered = true;
        order.payment_id = Some(payment.id.clone());

        self.store.insert_payment(payment).await?;
        self.store.save_order(&order).await?;

        info!(order_id = %order.id, "order placed");
        Ok(CartNotice::OrderPlaced)
    }

    /// Summary of the user's open cart
    #[instrument(skip(self))]
    pub async fn open_cart(&self, user_id: &str) -> CartResult<OrderView> {
        let Some(order) = self.store.open_order(user_id).await? else {
            return Err(CartError::OrderNotFound);
        };
        let lines = self.order_lines(&order).await?;
        Ok(Self::view_of(&order, &lines, None))
    }

    /// The user's most recently placed order, by `ordered_date`
    #[instrument(skip(self))]
    pub async fn latest_placed_order(&self, user_id: &str) -> CartResult<OrderView> {
        let placed = self.store.placed_orders(user_id).await?;
        let Some(order) = placed.last() else {
            return Err(CartError::OrderNotFound);
        };

        let lines = self.order_lines(order).await?;
        let charge_id = match &order.payment_id {
            Some(payment_id) => self
                .store
                .payment(payment_id)
                .await?
                .map(|p| p.charge_id),
            None => None,
        };
        Ok(Self::view_of(order, &lines, charge_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayError;
    use crate::gateway::{Charge, ChargeGateway};
    use crate::item::{Currency, Item, ItemCatalog};
    use crate::store::{CartStore, MemoryStore};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubGateway {
        fail_with: Option<GatewayError>,
        calls: AtomicUsize,
    }

    impl StubGateway {
        fn ok() -> Self {
            Self {
                fail_with: None,
                calls: AtomicUsize::new(0),
            }
        }

        fn failing(err: GatewayError) -> Self {
            Self {
                fail_with: Some(err),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ChargeGateway for StubGateway {
        async fn charge(&self, _amount: Price, _token: &str) -> Result<Charge, GatewayError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.fail_with {
                Some(e) => Err(e.clone()),
                None => Ok(Charge {
                    charge_id: "ch_test_123".into(),
                }),
            }
        }

        fn provider_name(&self) -> &'static str {
            "stub"
        }
    }

    fn catalog() -> ItemCatalog {
        let mut catalog = ItemCatalog::new();
        catalog.add(Item::new(
            "blue-hoodie",
            "Blue Hoodie",
            Price::new(10.0, Currency::USD),
        ));
        catalog.add(Item::new(
            "coffee-mug",
            "Coffee Mug",
            Price::new(12.0, Currency::USD),
        ));
        catalog
    }

    fn service(gateway: StubGateway) -> (Arc<MemoryStore>, Arc<StubGateway>, CartService) {
        let store = Arc::new(MemoryStore::with_catalog(&catalog()));
        let gateway = Arc::new(gateway);
        let cart = CartService::new(store.clone(), gateway.clone());
        (store, gateway, cart)
    }

    fn address() -> AddressForm {
        AddressForm {
            street: "1 Main St".into(),
            apartment: None,
            country: "US".into(),
            zip: "10001".into(),
        }
    }

    #[tokio::test]
    async fn test_add_creates_order_then_increments() {
        let (store, _, cart) = service(StubGateway::ok());

        let notice = cart.add_to_cart("user-1", "blue-hoodie").await.unwrap();
        assert_eq!(
            notice,
            CartNotice::ItemAdded {
                name: "Blue Hoodie".into()
            }
        );

        let view = cart.open_cart("user-1").await.unwrap();
        assert_eq!(view.lines.len(), 1);
        assert_eq!(view.lines[0].quantity, 1);
        assert_eq!(view.total.amount, 1000);

        let notice = cart.add_to_cart("user-1", "blue-hoodie").await.unwrap();
        assert_eq!(
            notice,
            CartNotice::QuantityIncreased {
                name: "Blue Hoodie".into()
            }
        );

        let view = cart.open_cart("user-1").await.unwrap();
        assert_eq!(view.lines.len(), 1);
        assert_eq!(view.lines[0].quantity, 2);
        assert_eq!(view.total.amount, 2000);

        // Still exactly one open order
        assert!(store.open_order("user-1").await.unwrap().is_some());
        let second = store.placed_orders("user-1").await.unwrap();
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn test_add_second_item_reuses_open_order() {
        let (store, _, cart) = service(StubGateway::ok());

        cart.add_to_cart("user-1", "blue-hoodie").await.unwrap();
        let first = store.open_order("user-1").await.unwrap().unwrap();

        let notice = cart.add_to_cart("user-1", "coffee-mug").await.unwrap();
        assert_eq!(
            notice,
            CartNotice::ItemAdded {
                name: "Coffee Mug".into()
            }
        );

        let second = store.open_order("user-1").await.unwrap().unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.line_ids.len(), 2);

        let view = cart.open_cart("user-1").await.unwrap();
        assert_eq!(view.total.amount, 2200);
    }

    #[tokio::test]
    async fn test_add_unknown_item() {
        let (_, _, cart) = service(StubGateway::ok());

        let err = cart.add_to_cart("user-1", "red-hoodie").await.unwrap_err();
        assert!(matches!(err, CartError::ItemNotFound { .. }));
    }

    #[tokio::test]
    async fn test_add_then_remove_leaves_no_stray_lines() {
        let (store, _, cart) = service(StubGateway::ok());

        cart.add_to_cart("user-1", "blue-hoodie").await.unwrap();
        let notice = cart.remove_from_cart("user-1", "blue-hoodie").await.unwrap();
        assert_eq!(
            notice,
            CartNotice::ItemRemoved {
                name: "Blue Hoodie".into()
            }
        );

        // Line record is gone, not just detached
        assert!(store
            .open_line("user-1", "blue-hoodie")
            .await
            .unwrap()
            .is_none());

        let order = store.open_order("user-1").await.unwrap().unwrap();
        assert!(order.is_empty());
    }

    #[tokio::test]
    async fn test_remove_guards() {
        let (_, _, cart) = service(StubGateway::ok());

        // No open order yet
        let notice = cart.remove_from_cart("user-1", "blue-hoodie").await.unwrap();
        assert_eq!(notice, CartNotice::NoOpenOrder);

        // Open order exists, but for a different item
        cart.add_to_cart("user-1", "coffee-mug").await.unwrap();
        let notice = cart.remove_from_cart("user-1", "blue-hoodie").await.unwrap();
        assert_eq!(notice, CartNotice::NotInCart);

        // Unknown item is an error, not a notice
        let err = cart.remove_from_cart("user-1", "red-hoodie").await.unwrap_err();
        assert!(matches!(err, CartError::ItemNotFound { .. }));
    }

    #[tokio::test]
    async fn test_reduce_decrements_then_deletes() {
        let (store, _, cart) = service(StubGateway::ok());

        cart.add_to_cart("user-1", "blue-hoodie").await.unwrap();
        cart.add_to_cart("user-1", "blue-hoodie").await.unwrap();

        // qty 2 -> 1
        cart.reduce_quantity("user-1", "blue-hoodie").await.unwrap();
        let view = cart.open_cart("user-1").await.unwrap();
        assert_eq!(view.lines[0].quantity, 1);
        assert_eq!(view.total.amount, 1000);

        // qty 1 -> line deleted
        cart.reduce_quantity("user-1", "blue-hoodie").await.unwrap();
        let view = cart.open_cart("user-1").await.unwrap();
        assert!(view.lines.is_empty());
        assert!(store
            .open_line("user-1", "blue-hoodie")
            .await
            .unwrap()
            .is_none());

        // Further reduce is a no-op notice
        let notice = cart.reduce_quantity("user-1", "blue-hoodie").await.unwrap();
        assert_eq!(notice, CartNotice::NotInCart);
    }

    #[tokio::test]
    async fn test_checkout_records_address_without_placing() {
        let (store, _, cart) = service(StubGateway::ok());

        cart.add_to_cart("user-1", "blue-hoodie").await.unwrap();
        let notice = cart.checkout("user-1", address()).await.unwrap();
        assert_eq!(notice, CartNotice::CheckoutComplete);

        let order = store.open_order("user-1").await.unwrap().unwrap();
        assert!(!order.ordered);
        assert!(order.address_id.is_some());
    }

    #[tokio::test]
    async fn test_checkout_requires_open_order() {
        let (_, _, cart) = service(StubGateway::ok());

        let err = cart.checkout("user-1", address()).await.unwrap_err();
        assert!(matches!(err, CartError::OrderNotFound));
    }

    #[tokio::test]
    async fn test_pay_places_order_once() {
        let (store, gateway, cart) = service(StubGateway::ok());

        cart.add_to_cart("user-1", "blue-hoodie").await.unwrap();
        cart.add_to_cart("user-1", "blue-hoodie").await.unwrap();

        let notice = cart.pay("user-1", "tok_visa").await.unwrap();
        assert_eq!(notice, CartNotice::OrderPlaced);
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);

        // Exactly one payment, for the order total
        let payments = store.payments("user-1").await.unwrap();
        assert_eq!(payments.len(), 1);
        assert_eq!(payments[0].amount.amount, 2000);
        assert_eq!(payments[0].charge_id, "ch_test_123");

        // Open cart is gone; the order is placed with the payment attached
        assert!(matches!(
            cart.open_cart("user-1").await.unwrap_err(),
            CartError::OrderNotFound
        ));
        let placed = store.placed_orders("user-1").await.unwrap();
        assert_eq!(placed.len(), 1);
        assert_eq!(placed[0].payment_id.as_deref(), Some(payments[0].id.as_str()));

        // Paying again has no open order to act on
        assert!(matches!(
            cart.pay("user-1", "tok_visa").await.unwrap_err(),
            CartError::OrderNotFound
        ));
        assert_eq!(store.payments("user-1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_pay_declined_leaves_order_open() {
        let (store, _, cart) = service(StubGateway::failing(GatewayError::CardDeclined {
            message: "Your card was declined.".into(),
        }));

        cart.add_to_cart("user-1", "blue-hoodie").await.unwrap();

        let err = cart.pay("user-1", "tok_chargeDeclined").await.unwrap_err();
        assert!(matches!(
            err,
            CartError::Gateway(GatewayError::CardDeclined { .. })
        ));

        // No payment record, order still open
        assert!(store.payments("user-1").await.unwrap().is_empty());
        let order = store.open_order("user-1").await.unwrap().unwrap();
        assert!(!order.ordered);

        // Lines are still live
        let view = cart.open_cart("user-1").await.unwrap();
        assert_eq!(view.lines.len(), 1);
    }

    #[tokio::test]
    async fn test_pay_empty_order_rejected_before_gateway() {
        let (_, gateway, cart) = service(StubGateway::ok());

        cart.add_to_cart("user-1", "blue-hoodie").await.unwrap();
        cart.remove_from_cart("user-1", "blue-hoodie").await.unwrap();

        let err = cart.pay("user-1", "tok_visa").await.unwrap_err();
        assert!(matches!(err, CartError::EmptyOrder));
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_pay_requires_open_order() {
        let (_, _, cart) = service(StubGateway::ok());

        let err = cart.pay("user-1", "tok_visa").await.unwrap_err();
        assert!(matches!(err, CartError::OrderNotFound));
    }

    #[tokio::test]
    async fn test_latest_placed_order() {
        let (_, _, cart) = service(StubGateway::ok());

        assert!(matches!(
            cart.latest_placed_order("user-1").await.unwrap_err(),
            CartError::OrderNotFound
        ));

        cart.add_to_cart("user-1", "blue-hoodie").await.unwrap();
        cart.pay("user-1", "tok_visa").await.unwrap();

        cart.add_to_cart("user-1", "coffee-mug").await.unwrap();
        cart.pay("user-1", "tok_visa").await.unwrap();

        let latest = cart.latest_placed_order("user-1").await.unwrap();
        assert!(latest.ordered);
        assert_eq!(latest.lines.len(), 1);
        assert_eq!(latest.lines[0].item_id, "coffee-mug");
        assert_eq!(latest.charge_id.as_deref(), Some("ch_test_123"));
    }

    #[tokio::test]
    async fn test_placed_lines_are_frozen() {
        let (store, _, cart) = service(StubGateway::ok());

        cart.add_to_cart("user-1", "blue-hoodie").await.unwrap();
        cart.pay("user-1", "tok_visa").await.unwrap();

        // The line survives but is no longer an open line; a fresh add
        // starts a new cart with a new line
        assert!(store
            .open_line("user-1", "blue-hoodie")
            .await
            .unwrap()
            .is_none());

        cart.add_to_cart("user-1", "blue-hoodie").await.unwrap();
        let view = cart.open_cart("user-1").await.unwrap();
        assert_eq!(view.lines[0].quantity, 1);
    }

    #[tokio::test]
    async fn test_users_are_isolated() {
        let (_, _, cart) = service(StubGateway::ok());

        cart.add_to_cart("user-1", "blue-hoodie").await.unwrap();
        cart.add_to_cart("user-2", "coffee-mug").await.unwrap();

        let one = cart.open_cart("user-1").await.unwrap();
        let two = cart.open_cart("user-2").await.unwrap();

        assert_ne!(one.order_id, two.order_id);
        assert_eq!(one.lines[0].item_id, "blue-hoodie");
        assert_eq!(two.lines[0].item_id, "coffee-mug");
    }

    #[tokio::test]
    async fn test_concurrent_adds_do_not_lose_updates() {
        let (store, _, cart) = service(StubGateway::ok());
        let cart = Arc::new(cart);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cart = cart.clone();
            handles.push(tokio::spawn(async move {
                cart.add_to_cart("user-1", "blue-hoodie").await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        // One open order, one line, quantity 8
        let order = store.open_order("user-1").await.unwrap().unwrap();
        assert_eq!(order.line_ids.len(), 1);
        let line = store
            .open_line("user-1", "blue-hoodie")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(line.quantity, 8);
    }
}
