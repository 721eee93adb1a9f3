//! Boundaries to the collaborators checkout depends on: catalog, payment
//! processor, clock and persistence.

use super::cart::Cart;
use super::ids::{IntentId, OrderId, ProductId, SubscriptionId, UserId};
use super::intent::{IntentChange, PaymentIntent, PaymentOutcome};
use super::money::{Currency, Money};
use super::order::{Order, OrderStatus};
use super::penalty::PenaltyRecord;
use super::product::Product;
use super::subscription::Subscription;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Result of a conditional insert.
#[derive(Debug, Clone, PartialEq)]
pub enum Stored<T> {
    /// The value passed in was written.
    Inserted(T),
    /// Another writer got there first; this is what is stored.
    Existing(T),
}

impl<T> Stored<T> {
    pub fn into_inner(self) -> T {
        match self {
            Self::Inserted(v) | Self::Existing(v) => v,
        }
    }

    pub fn was_inserted(&self) -> bool {
        matches!(self, Self::Inserted(_))
    }
}

/// Result of an intent status change.
#[derive(Debug, Clone, PartialEq)]
pub struct Transitioned {
    pub intent: PaymentIntent,
    pub changed: bool,
}

#[async_trait]
pub trait ProductCatalog: Send + Sync {
    async fn product(&self, id: &ProductId) -> Result<Option<Product>>;
}

/// What checkout asks the provider to hold.
#[derive(Debug, Clone, PartialEq)]
pub struct HoldRequest {
    pub idempotency_key: String,
    pub user: UserId,
    pub amount: Money,
    pub currency: Currency,
}

/// The provider's handle on a hold.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderIntent {
    pub id: IntentId,
    pub client_secret: String,
}

#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    /// Requests a hold. Repeating a request with the same idempotency key must
    /// return the same provider intent.
    async fn create_hold(&self, request: HoldRequest) -> Result<ProviderIntent>;

    /// Confirms an off-session charge and waits for its terminal outcome.
    async fn await_outcome(&self, intent: &PaymentIntent) -> Result<PaymentOutcome>;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[async_trait]
pub trait CartStore: Send + Sync {
    async fn load(&self, user: UserId) -> Result<Option<Cart>>;
    async fn save(&self, cart: Cart) -> Result<()>;
}

#[async_trait]
pub trait IntentStore: Send + Sync {
    /// Inserts unless an intent with the same idempotency key already exists.
    async fn insert_if_absent(&self, intent: PaymentIntent) -> Result<Stored<PaymentIntent>>;
    async fn get(&self, id: &IntentId) -> Result<Option<PaymentIntent>>;
    async fn find_by_key(&self, idempotency_key: &str) -> Result<Option<PaymentIntent>>;
    /// Applies `change` atomically. `None` if the intent does not exist.
    async fn transition(&self, id: &IntentId, change: IntentChange)
    -> Result<Option<Transitioned>>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Inserts unless an order for the same intent already exists.
    async fn insert_if_absent(&self, order: Order) -> Result<Stored<Order>>;
    async fn get_by_intent(&self, intent: &IntentId) -> Result<Option<Order>>;
    async fn list_by_user(&self, user: UserId) -> Result<Vec<Order>>;
    async fn all(&self) -> Result<Vec<Order>>;
    async fn set_status(&self, id: OrderId, status: OrderStatus) -> Result<Option<Order>>;
}

#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn insert(&self, subscription: Subscription) -> Result<()>;
    async fn get(&self, id: SubscriptionId) -> Result<Option<Subscription>>;
    async fn list_by_user(&self, user: UserId) -> Result<Vec<Subscription>>;
    /// Active subscriptions whose `next_renewal <= now`.
    async fn due(&self, now: DateTime<Utc>) -> Result<Vec<Subscription>>;
    /// Replaces the stored subscription only if its version is still
    /// `expected_version`; the written copy gets the next version.
    async fn compare_and_set(&self, expected_version: u64, updated: Subscription)
    -> Result<bool>;
}

/// Append-only. Records are never updated or removed.
#[async_trait]
pub trait PenaltyStore: Send + Sync {
    async fn append(&self, record: PenaltyRecord) -> Result<()>;
    async fn list_by_user(&self, user: UserId) -> Result<Vec<PenaltyRecord>>;
}

pub type SharedCatalog = Arc<dyn ProductCatalog>;
pub type SharedProcessor = Arc<dyn PaymentProcessor>;
pub type SharedClock = Arc<dyn Clock>;
pub type SharedCartStore = Arc<dyn CartStore>;
pub type SharedIntentStore = Arc<dyn IntentStore>;
pub type SharedOrderStore = Arc<dyn OrderStore>;
pub type SharedSubscriptionStore = Arc<dyn SubscriptionStore>;
pub type SharedPenaltyStore = Arc<dyn PenaltyStore>;
