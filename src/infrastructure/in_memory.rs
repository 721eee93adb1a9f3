use crate::domain::cart::Cart;
use crate::domain::ids::{IntentId, OrderId, ProductId, SubscriptionId, UserId};
use crate::domain::intent::{IntentChange, PaymentIntent};
use crate::domain::money::Amount;
use crate::domain::order::{Order, OrderStatus};
use crate::domain::penalty::PenaltyRecord;
use crate::domain::ports::{
    CartStore, IntentStore, OrderStore, PenaltyStore, ProductCatalog, Stored, SubscriptionStore,
    Transitioned,
};
use crate::domain::product::Product;
use crate::domain::subscription::Subscription;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A thread-safe in-memory product catalog.
///
/// Stands in for the external catalog service in tests and in the CLI, where
/// products are loaded from a CSV file up front.
#[derive(Default, Clone)]
pub struct InMemoryCatalog {
    products: Arc<RwLock<HashMap<ProductId, Product>>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_products(products: impl IntoIterator<Item = Product>) -> Self {
        let map = products.into_iter().map(|p| (p.id.clone(), p)).collect();
        Self {
            products: Arc::new(RwLock::new(map)),
        }
    }

    /// Inserts or replaces a product.
    pub async fn upsert(&self, product: Product) {
        self.products.write().await.insert(product.id.clone(), product);
    }

    /// Changes the current price. Returns `false` for unknown products.
    pub async fn set_price(&self, id: &ProductId, price: Amount) -> bool {
        match self.products.write().await.get_mut(id) {
            Some(product) => {
                product.price = price;
                true
            }
            None => false,
        }
    }

    pub async fn set_available(&self, id: &ProductId, available: bool) -> bool {
        match self.products.write().await.get_mut(id) {
            Some(product) => {
                product.available = available;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl ProductCatalog for InMemoryCatalog {
    async fn product(&self, id: &ProductId) -> Result<Option<Product>> {
        Ok(self.products.read().await.get(id).cloned())
    }
}

/// A thread-safe in-memory store for carts, keyed by user.
#[derive(Default, Clone)]
pub struct InMemoryCartStore {
    carts: Arc<RwLock<HashMap<UserId, Cart>>>,
}

impl InMemoryCartStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CartStore for InMemoryCartStore {
    async fn load(&self, user: UserId) -> Result<Option<Cart>> {
        Ok(self.carts.read().await.get(&user).cloned())
    }

    async fn save(&self, cart: Cart) -> Result<()> {
        self.carts.write().await.insert(cart.user, cart);
        Ok(())
    }
}

#[derive(Default)]
struct IntentTable {
    intents: HashMap<IntentId, PaymentIntent>,
    keys: HashMap<String, IntentId>,
}

/// A thread-safe in-memory store for payment intents.
///
/// Both the intents and the idempotency-key index live behind one lock, so a
/// conditional insert is a single critical section.
#[derive(Default, Clone)]
pub struct InMemoryIntentStore {
    table: Arc<RwLock<IntentTable>>,
}

impl InMemoryIntentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IntentStore for InMemoryIntentStore {
    async fn insert_if_absent(&self, intent: PaymentIntent) -> Result<Stored<PaymentIntent>> {
        let mut table = self.table.write().await;
        if let Some(existing) = table
            .keys
            .get(&intent.idempotency_key)
            .and_then(|id| table.intents.get(id))
        {
            return Ok(Stored::Existing(existing.clone()));
        }
        table
            .keys
            .insert(intent.idempotency_key.clone(), intent.id.clone());
        table.intents.insert(intent.id.clone(), intent.clone());
        Ok(Stored::Inserted(intent))
    }

    async fn get(&self, id: &IntentId) -> Result<Option<PaymentIntent>> {
        Ok(self.table.read().await.intents.get(id).cloned())
    }

    async fn find_by_key(&self, idempotency_key: &str) -> Result<Option<PaymentIntent>> {
        let table = self.table.read().await;
        Ok(table
            .keys
            .get(idempotency_key)
            .and_then(|id| table.intents.get(id))
            .cloned())
    }

    async fn transition(
        &self,
        id: &IntentId,
        change: IntentChange,
    ) -> Result<Option<Transitioned>> {
        let mut table = self.table.write().await;
        Ok(table.intents.get_mut(id).map(|intent| {
            let changed = intent.apply(change);
            Transitioned {
                intent: intent.clone(),
                changed,
            }
        }))
    }
}

#[derive(Default)]
struct OrderTable {
    orders: HashMap<OrderId, Order>,
    by_intent: HashMap<IntentId, OrderId>,
}

/// A thread-safe in-memory order ledger with a unique index on intent id.
#[derive(Default, Clone)]
pub struct InMemoryOrderStore {
    table: Arc<RwLock<OrderTable>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn insert_if_absent(&self, order: Order) -> Result<Stored<Order>> {
        let mut table = self.table.write().await;
        if let Some(existing) = table
            .by_intent
            .get(&order.intent)
            .and_then(|id| table.orders.get(id))
        {
            return Ok(Stored::Existing(existing.clone()));
        }
        table.by_intent.insert(order.intent.clone(), order.id);
        table.orders.insert(order.id, order.clone());
        Ok(Stored::Inserted(order))
    }

    async fn get_by_intent(&self, intent: &IntentId) -> Result<Option<Order>> {
        let table = self.table.read().await;
        Ok(table
            .by_intent
            .get(intent)
            .and_then(|id| table.orders.get(id))
            .cloned())
    }

    async fn list_by_user(&self, user: UserId) -> Result<Vec<Order>> {
        let table = self.table.read().await;
        let mut orders: Vec<Order> = table
            .orders
            .values()
            .filter(|o| o.user == user)
            .cloned()
            .collect();
        orders.sort_by_key(|o| o.created_at);
        Ok(orders)
    }

    async fn all(&self) -> Result<Vec<Order>> {
        let table = self.table.read().await;
        let mut orders: Vec<Order> = table.orders.values().cloned().collect();
        orders.sort_by_key(|o| o.created_at);
        Ok(orders)
    }

    async fn set_status(&self, id: OrderId, status: OrderStatus) -> Result<Option<Order>> {
        let mut table = self.table.write().await;
        Ok(table.orders.get_mut(&id).map(|order| {
            order.status = status;
            order.clone()
        }))
    }
}

/// A thread-safe in-memory store for subscriptions.
#[derive(Default, Clone)]
pub struct InMemorySubscriptionStore {
    subscriptions: Arc<RwLock<HashMap<SubscriptionId, Subscription>>>,
}

impl InMemorySubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SubscriptionStore for InMemorySubscriptionStore {
    async fn insert(&self, subscription: Subscription) -> Result<()> {
        self.subscriptions
            .write()
            .await
            .insert(subscription.id, subscription);
        Ok(())
    }

    async fn get(&self, id: SubscriptionId) -> Result<Option<Subscription>> {
        Ok(self.subscriptions.read().await.get(&id).cloned())
    }

    async fn list_by_user(&self, user: UserId) -> Result<Vec<Subscription>> {
        let subscriptions = self.subscriptions.read().await;
        let mut owned: Vec<Subscription> = subscriptions
            .values()
            .filter(|s| s.user == user)
            .cloned()
            .collect();
        owned.sort_by_key(|s| s.created_at);
        Ok(owned)
    }

    async fn due(&self, now: DateTime<Utc>) -> Result<Vec<Subscription>> {
        let subscriptions = self.subscriptions.read().await;
        let mut due: Vec<Subscription> = subscriptions
            .values()
            .filter(|s| s.is_due(now))
            .cloned()
            .collect();
        due.sort_by_key(|s| s.next_renewal);
        Ok(due)
    }

    async fn compare_and_set(&self, expected_version: u64, mut updated: Subscription) -> Result<bool> {
        let mut subscriptions = self.subscriptions.write().await;
        match subscriptions.get(&updated.id) {
            Some(current) if current.version == expected_version => {
                updated.version = expected_version + 1;
                subscriptions.insert(updated.id, updated);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// A thread-safe, append-only in-memory penalty ledger.
#[derive(Default, Clone)]
pub struct InMemoryPenaltyStore {
    records: Arc<RwLock<Vec<PenaltyRecord>>>,
}

impl InMemoryPenaltyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PenaltyStore for InMemoryPenaltyStore {
    async fn append(&self, record: PenaltyRecord) -> Result<()> {
        self.records.write().await.push(record);
        Ok(())
    }

    async fn list_by_user(&self, user: UserId) -> Result<Vec<PenaltyRecord>> {
        let records = self.records.read().await;
        Ok(records.iter().filter(|r| r.user == user).cloned().collect())
    }
}
