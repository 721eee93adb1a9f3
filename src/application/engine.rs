use super::cart::CartService;
use super::finalizer::{Finalization, OrderFinalizer};
use super::gateway::PaymentGateway;
use super::ledger::PenaltyLedger;
use super::scheduler::{SchedulerParts, SubscriptionScheduler, TickReport};
use crate::config::CheckoutConfig;
use crate::domain::cart::{CartSnapshot, Quote};
use crate::domain::ids::{IntentId, OrderId, ProductId, SubscriptionId, UserId};
use crate::domain::intent::{IntentStatus, PaymentIntent, PaymentOutcome};
use crate::domain::order::{Order, OrderStatus};
use crate::domain::penalty::PenaltyRecord;
use crate::domain::ports::{
    SharedCartStore, SharedCatalog, SharedClock, SharedIntentStore, SharedOrderStore,
    SharedPenaltyStore, SharedProcessor, SharedSubscriptionStore,
};
use crate::domain::subscription::Subscription;
use crate::error::{CheckoutError, Result};
use crate::infrastructure::in_memory::{
    InMemoryCartStore, InMemoryIntentStore, InMemoryOrderStore, InMemoryPenaltyStore,
    InMemorySubscriptionStore,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::info;

/// Every collaborator the engine needs, as shared trait objects.
#[derive(Clone)]
pub struct Ports {
    pub catalog: SharedCatalog,
    pub processor: SharedProcessor,
    pub clock: SharedClock,
    pub carts: SharedCartStore,
    pub intents: SharedIntentStore,
    pub orders: SharedOrderStore,
    pub subscriptions: SharedSubscriptionStore,
    pub penalties: SharedPenaltyStore,
}

impl Ports {
    /// Wires the external collaborators to fresh in-memory stores.
    pub fn in_memory(catalog: SharedCatalog, processor: SharedProcessor, clock: SharedClock) -> Self {
        Self {
            catalog,
            processor,
            clock,
            carts: Arc::new(InMemoryCartStore::new()),
            intents: Arc::new(InMemoryIntentStore::new()),
            orders: Arc::new(InMemoryOrderStore::new()),
            subscriptions: Arc::new(InMemorySubscriptionStore::new()),
            penalties: Arc::new(InMemoryPenaltyStore::new()),
        }
    }
}

/// Result of delivering a provider outcome for an intent.
#[derive(Debug, Clone, PartialEq)]
pub struct Confirmation {
    pub intent: PaymentIntent,
    /// Present when the intent succeeded and its order exists.
    pub order: Option<Order>,
}

/// The boundary to checkout and recurring purchases.
///
/// `CheckoutEngine` wires the cart store, the payment gateway, the order
/// finalizer, the subscription scheduler and the penalty ledger over one set
/// of ports. It is `Send + Sync`; share it behind an `Arc` and call it from as
/// many tasks as needed.
pub struct CheckoutEngine {
    config: CheckoutConfig,
    carts: Arc<CartService>,
    gateway: Arc<PaymentGateway>,
    finalizer: Arc<OrderFinalizer>,
    scheduler: SubscriptionScheduler,
    penalties: PenaltyLedger,
    orders: SharedOrderStore,
}

impl CheckoutEngine {
    /// Creates a new `CheckoutEngine` instance.
    ///
    /// # Arguments
    ///
    /// * `ports` - The catalog, processor, clock and stores to run against.
    /// * `config` - Currency, tax and renewal policy.
    pub fn new(ports: Ports, config: CheckoutConfig) -> Result<Self> {
        config.validate()?;

        let carts = Arc::new(CartService::new(ports.carts, Arc::clone(&ports.catalog)));
        let gateway = Arc::new(PaymentGateway::new(
            Arc::clone(&ports.intents),
            Arc::clone(&ports.processor),
            Arc::clone(&ports.clock),
            config.tax_rate,
        ));
        let finalizer = Arc::new(OrderFinalizer::new(
            ports.intents,
            Arc::clone(&ports.orders),
            Arc::clone(&carts),
            Arc::clone(&ports.clock),
        ));
        let scheduler = SubscriptionScheduler::new(
            SchedulerParts {
                subscriptions: ports.subscriptions,
                catalog: ports.catalog,
                gateway: Arc::clone(&gateway),
                finalizer: Arc::clone(&finalizer),
                processor: ports.processor,
                clock: Arc::clone(&ports.clock),
            },
            config.currency.clone(),
            config.renewal_failure_threshold,
        );
        let penalties = PenaltyLedger::new(ports.penalties, ports.clock);

        Ok(Self {
            config,
            carts,
            gateway,
            finalizer,
            scheduler,
            penalties,
            orders: ports.orders,
        })
    }

    pub fn config(&self) -> &CheckoutConfig {
        &self.config
    }

    // Cart

    pub async fn add_item(&self, user: UserId, product: &ProductId, quantity: i64) -> Result<CartSnapshot> {
        self.carts.add_item(user, product, quantity).await
    }

    pub async fn update_quantity(
        &self,
        user: UserId,
        product: &ProductId,
        quantity: i64,
    ) -> Result<CartSnapshot> {
        self.carts.update_quantity(user, product, quantity).await
    }

    pub async fn remove_item(&self, user: UserId, product: &ProductId) -> Result<CartSnapshot> {
        self.carts.remove_item(user, product).await
    }

    pub async fn get_cart(&self, user: UserId) -> Result<CartSnapshot> {
        self.carts.get_cart(user).await
    }

    pub async fn cart_summary(&self, user: UserId) -> Result<Quote> {
        self.carts.summary(user, self.config.tax_rate).await
    }

    // Checkout

    /// Starts checkout for the user's current cart.
    ///
    /// The cart is snapshotted and its lock released before the provider is
    /// called; later cart edits do not change the returned intent.
    pub async fn create_payment_intent(&self, user: UserId) -> Result<PaymentIntent> {
        let snapshot = self.carts.get_cart(user).await?;
        let intent = self
            .gateway
            .create_intent(snapshot, self.config.currency.clone())
            .await?;
        self.gateway.begin_confirmation(&intent.id).await
    }

    /// Delivers the provider's outcome for an intent, creating the order on success.
    ///
    /// Safe to call any number of times for the same intent.
    pub async fn confirm_payment(&self, id: &IntentId, outcome: PaymentOutcome) -> Result<Confirmation> {
        let intent = self.gateway.record_outcome(id, outcome).await?;
        let order = if intent.status == IntentStatus::Succeeded {
            Some(self.finalizer.finalize(id).await?.into_order())
        } else {
            None
        };
        Ok(Confirmation { intent, order })
    }

    pub async fn finalize(&self, id: &IntentId) -> Result<Finalization> {
        self.finalizer.finalize(id).await
    }

    pub async fn cancel_intent(&self, id: &IntentId) -> Result<PaymentIntent> {
        self.gateway.cancel(id).await
    }

    pub async fn intent(&self, id: &IntentId) -> Result<PaymentIntent> {
        self.gateway.get(id).await
    }

    // Subscriptions

    pub async fn create_subscription(
        &self,
        user: UserId,
        product: &ProductId,
        interval_days: i64,
    ) -> Result<Subscription> {
        self.scheduler.create(user, product, interval_days).await
    }

    pub async fn list_subscriptions(&self, user: UserId) -> Result<Vec<Subscription>> {
        self.scheduler.list(user).await
    }

    pub async fn pause_subscription(&self, user: UserId, id: SubscriptionId) -> Result<Subscription> {
        self.scheduler.pause(user, id).await
    }

    pub async fn resume_subscription(&self, user: UserId, id: SubscriptionId) -> Result<Subscription> {
        self.scheduler.resume(user, id).await
    }

    pub async fn tick(&self, now: DateTime<Utc>) -> Result<TickReport> {
        self.scheduler.tick(now).await
    }

    // Penalties

    pub async fn apply_penalty(&self, user: UserId, amount: Decimal, reason: &str) -> Result<PenaltyRecord> {
        self.penalties.apply_penalty(user, amount, reason).await
    }

    pub async fn list_penalties(&self, user: UserId) -> Result<Vec<PenaltyRecord>> {
        self.penalties.list(user).await
    }

    // Orders

    pub async fn orders_for(&self, user: UserId) -> Result<Vec<Order>> {
        self.orders.list_by_user(user).await
    }

    pub async fn order_for_intent(&self, intent: &IntentId) -> Result<Option<Order>> {
        self.orders.get_by_intent(intent).await
    }

    /// Every order, oldest first.
    pub async fn all_orders(&self) -> Result<Vec<Order>> {
        self.orders.all().await
    }

    /// Moves an order to `fulfilled` or `refunded`.
    pub async fn update_order_status(&self, id: OrderId, status: OrderStatus) -> Result<Order> {
        if status == OrderStatus::Completed {
            return Err(CheckoutError::InvalidArgument(
                "orders cannot be moved back to completed".to_string(),
            ));
        }
        let order = self
            .orders
            .set_status(id, status)
            .await?
            .ok_or_else(|| CheckoutError::not_found("order", id))?;
        info!(order = %id, %status, "Order status updated");
        Ok(order)
    }
}
