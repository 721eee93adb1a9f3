use crate::domain::cart::Cart;
use crate::domain::ids::{IntentId, OrderId, SubscriptionId, UserId};
use crate::domain::intent::{IntentChange, PaymentIntent};
use crate::domain::order::{Order, OrderStatus};
use crate::domain::penalty::PenaltyRecord;
use crate::domain::ports::{
    CartStore, IntentStore, OrderStore, PenaltyStore, Stored, SubscriptionStore, Transitioned,
};
use crate::domain::subscription::Subscription;
use crate::error::{CheckoutError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, Direction, IteratorMode, Options};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family for carts, keyed by user id.
pub const CF_CARTS: &str = "carts";
/// Column Family for payment intents, keyed by provider intent id.
pub const CF_INTENTS: &str = "intents";
/// Index from idempotency key to intent id.
pub const CF_INTENT_KEYS: &str = "intent_keys";
/// Column Family for orders, keyed by the intent they settle.
pub const CF_ORDERS: &str = "orders";
/// Index from order id to intent id.
pub const CF_ORDER_IDS: &str = "order_ids";
/// Column Family for subscriptions, keyed by subscription id.
pub const CF_SUBSCRIPTIONS: &str = "subscriptions";
/// Column Family for penalties, keyed by user id then issue time.
pub const CF_PENALTIES: &str = "penalties";

const COLUMN_FAMILIES: [&str; 7] = [
    CF_CARTS,
    CF_INTENTS,
    CF_INTENT_KEYS,
    CF_ORDERS,
    CF_ORDER_IDS,
    CF_SUBSCRIPTIONS,
    CF_PENALTIES,
];

/// A persistent store implementation using RocksDB.
///
/// Each entity lives in its own Column Family, values are JSON. Conditional
/// writes (insert-if-absent, status transitions, compare-and-set) read and
/// write under a single write gate, so the unique constraints hold across
/// tasks.
///
/// Orders are keyed by intent id, which makes "one order per intent" the
/// primary key. Index entries are written after the entity they point to and
/// rewritten whenever an existing entity is found, so an interrupted write
/// is repaired by the next attempt.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    write_gate: Arc<Mutex<()>>,
}

fn user_key(user: UserId) -> [u8; 8] {
    user.0.to_be_bytes()
}

fn penalty_key(record: &PenaltyRecord) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(&user_key(record.user));
    key.extend_from_slice(&record.issued_at.timestamp_micros().to_be_bytes());
    key.extend_from_slice(record.id.0.as_bytes());
    key
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that every column family the stores need exists.
    ///
    /// # Arguments
    ///
    /// * `path` - The filesystem path where the database will be stored.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = COLUMN_FAMILIES
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()));
        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        Ok(Self {
            db: Arc::new(db),
            write_gate: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &'static str) -> Result<&ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| {
            CheckoutError::persistence(format!("column family `{name}` not found"))
        })
    }

    fn read<T: DeserializeOwned>(&self, cf: &'static str, key: impl AsRef<[u8]>) -> Result<Option<T>> {
        match self.db.get_pinned_cf(self.cf(cf)?, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn write<T: Serialize>(&self, cf: &'static str, key: impl AsRef<[u8]>, value: &T) -> Result<()> {
        self.db.put_cf(self.cf(cf)?, key, serde_json::to_vec(value)?)?;
        Ok(())
    }

    /// Every value whose key starts with `prefix`, in key order.
    fn scan<T: DeserializeOwned>(&self, cf: &'static str, prefix: &[u8]) -> Result<Vec<T>> {
        let iter = self
            .db
            .iterator_cf(self.cf(cf)?, IteratorMode::From(prefix, Direction::Forward));
        let mut values = Vec::new();
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            values.push(serde_json::from_slice(&value)?);
        }
        Ok(values)
    }

    fn intent_id_for_key(&self, idempotency_key: &str) -> Result<Option<IntentId>> {
        match self.db.get_pinned_cf(self.cf(CF_INTENT_KEYS)?, idempotency_key)? {
            Some(bytes) => Ok(Some(IntentId::new(
                String::from_utf8_lossy(&bytes).into_owned(),
            ))),
            None => Ok(None),
        }
    }

    fn intent_for_order(&self, id: OrderId) -> Result<Option<IntentId>> {
        match self.db.get_pinned_cf(self.cf(CF_ORDER_IDS)?, id.0.as_bytes())? {
            Some(bytes) => Ok(Some(IntentId::new(
                String::from_utf8_lossy(&bytes).into_owned(),
            ))),
            None => Ok(None),
        }
    }

    fn index_order(&self, order: &Order) -> Result<()> {
        self.db.put_cf(
            self.cf(CF_ORDER_IDS)?,
            order.id.0.as_bytes(),
            order.intent.as_str(),
        )?;
        Ok(())
    }
}

#[async_trait]
impl CartStore for RocksDBStore {
    async fn load(&self, user: UserId) -> Result<Option<Cart>> {
        self.read(CF_CARTS, user_key(user))
    }

    async fn save(&self, cart: Cart) -> Result<()> {
        self.write(CF_CARTS, user_key(cart.user), &cart)
    }
}

#[async_trait]
impl IntentStore for RocksDBStore {
    async fn insert_if_absent(&self, intent: PaymentIntent) -> Result<Stored<PaymentIntent>> {
        let _gate = self.write_gate.lock().await;
        if let Some(id) = self.intent_id_for_key(&intent.idempotency_key)?
            && let Some(existing) = self.read(CF_INTENTS, id.as_str())?
        {
            return Ok(Stored::Existing(existing));
        }

        self.write(CF_INTENTS, intent.id.as_str(), &intent)?;
        self.db.put_cf(
            self.cf(CF_INTENT_KEYS)?,
            &intent.idempotency_key,
            intent.id.as_str(),
        )?;
        Ok(Stored::Inserted(intent))
    }

    async fn get(&self, id: &IntentId) -> Result<Option<PaymentIntent>> {
        self.read(CF_INTENTS, id.as_str())
    }

    async fn find_by_key(&self, idempotency_key: &str) -> Result<Option<PaymentIntent>> {
        match self.intent_id_for_key(idempotency_key)? {
            Some(id) => self.read(CF_INTENTS, id.as_str()),
            None => Ok(None),
        }
    }

    async fn transition(
        &self,
        id: &IntentId,
        change: IntentChange,
    ) -> Result<Option<Transitioned>> {
        let _gate = self.write_gate.lock().await;
        let Some(mut intent) = self.read::<PaymentIntent>(CF_INTENTS, id.as_str())? else {
            return Ok(None);
        };
        let changed = intent.apply(change);
        if changed {
            self.write(CF_INTENTS, id.as_str(), &intent)?;
        }
        Ok(Some(Transitioned { intent, changed }))
    }
}

#[async_trait]
impl OrderStore for RocksDBStore {
    async fn insert_if_absent(&self, order: Order) -> Result<Stored<Order>> {
        let _gate = self.write_gate.lock().await;
        if let Some(existing) = self.read::<Order>(CF_ORDERS, order.intent.as_str())? {
            self.index_order(&existing)?;
            return Ok(Stored::Existing(existing));
        }

        self.write(CF_ORDERS, order.intent.as_str(), &order)?;
        self.index_order(&order)?;
        Ok(Stored::Inserted(order))
    }

    async fn get_by_intent(&self, intent: &IntentId) -> Result<Option<Order>> {
        self.read(CF_ORDERS, intent.as_str())
    }

    async fn list_by_user(&self, user: UserId) -> Result<Vec<Order>> {
        let mut orders = self.all().await?;
        orders.retain(|o| o.user == user);
        Ok(orders)
    }

    async fn all(&self) -> Result<Vec<Order>> {
        let mut orders: Vec<Order> = self.scan(CF_ORDERS, &[])?;
        orders.sort_by_key(|o| o.created_at);
        Ok(orders)
    }

    async fn set_status(&self, id: OrderId, status: OrderStatus) -> Result<Option<Order>> {
        let _gate = self.write_gate.lock().await;
        let Some(intent) = self.intent_for_order(id)? else {
            return Ok(None);
        };
        let Some(mut order) = self.read::<Order>(CF_ORDERS, intent.as_str())? else {
            return Ok(None);
        };
        order.status = status;
        self.write(CF_ORDERS, intent.as_str(), &order)?;
        Ok(Some(order))
    }
}

#[async_trait]
impl SubscriptionStore for RocksDBStore {
    async fn insert(&self, subscription: Subscription) -> Result<()> {
        self.write(CF_SUBSCRIPTIONS, subscription.id.0.as_bytes(), &subscription)
    }

    async fn get(&self, id: SubscriptionId) -> Result<Option<Subscription>> {
        self.read(CF_SUBSCRIPTIONS, id.0.as_bytes())
    }

    async fn list_by_user(&self, user: UserId) -> Result<Vec<Subscription>> {
        let mut owned: Vec<Subscription> = self.scan(CF_SUBSCRIPTIONS, &[])?;
        owned.retain(|s| s.user == user);
        owned.sort_by_key(|s| s.created_at);
        Ok(owned)
    }

    async fn due(&self, now: DateTime<Utc>) -> Result<Vec<Subscription>> {
        let mut due: Vec<Subscription> = self.scan(CF_SUBSCRIPTIONS, &[])?;
        due.retain(|s| s.is_due(now));
        due.sort_by_key(|s| s.next_renewal);
        Ok(due)
    }

    async fn compare_and_set(&self, expected_version: u64, mut updated: Subscription) -> Result<bool> {
        let _gate = self.write_gate.lock().await;
        let current: Option<Subscription> = self.read(CF_SUBSCRIPTIONS, updated.id.0.as_bytes())?;
        match current {
            Some(current) if current.version == expected_version => {
                updated.version = expected_version + 1;
                self.write(CF_SUBSCRIPTIONS, updated.id.0.as_bytes(), &updated)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl PenaltyStore for RocksDBStore {
    async fn append(&self, record: PenaltyRecord) -> Result<()> {
        self.write(CF_PENALTIES, penalty_key(&record), &record)
    }

    async fn list_by_user(&self, user: UserId) -> Result<Vec<PenaltyRecord>> {
        self.scan(CF_PENALTIES, &user_key(user))
    }
}
