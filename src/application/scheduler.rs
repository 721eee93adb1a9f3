use super::finalizer::OrderFinalizer;
use super::gateway::PaymentGateway;
use crate::domain::cart::CartSnapshot;
use crate::domain::ids::{OrderId, ProductId, SubscriptionId, UserId};
use crate::domain::intent::IntentOrigin;
use crate::domain::money::Currency;
use crate::domain::order::Order;
use crate::domain::ports::{SharedCatalog, SharedClock, SharedProcessor, SharedSubscriptionStore};
use crate::domain::product::Product;
use crate::domain::subscription::Subscription;
use crate::error::{CheckoutError, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What one tick did to one due subscription.
#[derive(Debug, Clone, PartialEq)]
pub enum RenewalOutcome {
    Renewed {
        subscription: SubscriptionId,
        order: OrderId,
        next_renewal: DateTime<Utc>,
    },
    Failed {
        subscription: SubscriptionId,
        reason: String,
        paused: bool,
        next_renewal: DateTime<Utc>,
    },
    /// Another tick already handled this due date.
    Skipped { subscription: SubscriptionId },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub now: DateTime<Utc>,
    pub outcomes: Vec<RenewalOutcome>,
}

impl TickReport {
    pub fn renewed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, RenewalOutcome::Renewed { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, RenewalOutcome::Failed { .. }))
            .count()
    }

    pub fn paused(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, RenewalOutcome::Failed { paused: true, .. }))
            .count()
    }
}

/// Dependencies of the renewal pipeline.
pub struct SchedulerParts {
    pub subscriptions: SharedSubscriptionStore,
    pub catalog: SharedCatalog,
    pub gateway: Arc<PaymentGateway>,
    pub finalizer: Arc<OrderFinalizer>,
    pub processor: SharedProcessor,
    pub clock: SharedClock,
}

/// Recurring purchases and their renewal ticks.
///
/// A renewal is keyed by subscription and due date, so any number of ticks
/// over the same due date charge at most once and create at most one order.
/// Stored updates go through a version check; a tick that loses the race
/// reports the subscription as skipped.
pub struct SubscriptionScheduler {
    subscriptions: SharedSubscriptionStore,
    catalog: SharedCatalog,
    gateway: Arc<PaymentGateway>,
    finalizer: Arc<OrderFinalizer>,
    processor: SharedProcessor,
    clock: SharedClock,
    currency: Currency,
    failure_threshold: u32,
}

impl SubscriptionScheduler {
    pub fn new(parts: SchedulerParts, currency: Currency, failure_threshold: u32) -> Self {
        Self {
            subscriptions: parts.subscriptions,
            catalog: parts.catalog,
            gateway: parts.gateway,
            finalizer: parts.finalizer,
            processor: parts.processor,
            clock: parts.clock,
            currency,
            failure_threshold,
        }
    }

    /// Subscribes `user` to `product`. The first renewal is one interval from now.
    pub async fn create(
        &self,
        user: UserId,
        product: &ProductId,
        interval_days: i64,
    ) -> Result<Subscription> {
        let interval_days = u32::try_from(interval_days)
            .ok()
            .filter(|days| *days > 0)
            .ok_or_else(|| {
                CheckoutError::InvalidArgument(format!(
                    "interval_days must be a positive number of days, got {interval_days}"
                ))
            })?;
        match self.catalog.product(product).await? {
            Some(p) if p.available => {}
            _ => return Err(CheckoutError::not_found("product", product)),
        }

        let subscription = Subscription::new(user, product.clone(), interval_days, self.clock.now())?;
        self.subscriptions.insert(subscription.clone()).await?;
        info!(
            subscription = %subscription.id,
            %user,
            %product,
            interval_days,
            next_renewal = %subscription.next_renewal,
            "Subscription created"
        );
        Ok(subscription)
    }

    pub async fn list(&self, user: UserId) -> Result<Vec<Subscription>> {
        self.subscriptions.list_by_user(user).await
    }

    pub async fn pause(&self, user: UserId, id: SubscriptionId) -> Result<Subscription> {
        self.update_owned(user, id, Subscription::pause).await
    }

    /// Reactivates a paused subscription and clears its failure count.
    ///
    /// Renewals missed while paused are not charged; the next one is the first
    /// scheduled due date after now.
    pub async fn resume(&self, user: UserId, id: SubscriptionId) -> Result<Subscription> {
        let now = self.clock.now();
        self.update_owned(user, id, |s| s.resume(now)).await
    }

    async fn update_owned(
        &self,
        user: UserId,
        id: SubscriptionId,
        change: impl Fn(&mut Subscription),
    ) -> Result<Subscription> {
        loop {
            let current = self
                .subscriptions
                .get(id)
                .await?
                .filter(|s| s.user == user)
                .ok_or_else(|| CheckoutError::not_found("subscription", id))?;
            let mut updated = current.clone();
            change(&mut updated);
            if self
                .subscriptions
                .compare_and_set(current.version, updated.clone())
                .await?
            {
                info!(subscription = %id, %user, status = %updated.status, "Subscription updated");
                updated.version = current.version + 1;
                return Ok(updated);
            }
            debug!(subscription = %id, "Concurrent subscription update, retrying");
        }
    }

    /// Renews every active subscription due at `now`.
    ///
    /// Each subscription gets at most one attempt per tick; one that is several
    /// intervals behind catches up over later ticks. A persistence failure
    /// aborts the tick without advancing the schedule, so re-running it is safe.
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<TickReport> {
        let due = self.subscriptions.due(now).await?;
        debug!(%now, due = due.len(), "Subscription tick");

        let mut outcomes = Vec::with_capacity(due.len());
        for subscription in due {
            outcomes.push(self.renew(subscription).await?);
        }
        let report = TickReport { now, outcomes };
        if !report.outcomes.is_empty() {
            info!(
                %now,
                renewed = report.renewed(),
                failed = report.failed(),
                paused = report.paused(),
                "Subscription tick finished"
            );
        }
        Ok(report)
    }

    async fn renew(&self, subscription: Subscription) -> Result<RenewalOutcome> {
        let id = subscription.id;
        let mut updated = subscription.clone();
        let outcome = match self.charge(&subscription).await {
            Ok(order) => {
                updated.record_success();
                RenewalOutcome::Renewed {
                    subscription: id,
                    order: order.id,
                    next_renewal: updated.next_renewal,
                }
            }
            Err(e @ CheckoutError::Persistence(_)) => return Err(e),
            Err(e) => {
                let paused = updated.record_failure(self.failure_threshold);
                warn!(
                    subscription = %id,
                    user = %subscription.user,
                    failures = updated.consecutive_failures,
                    error = %e,
                    "Subscription renewal failed"
                );
                if paused {
                    warn!(subscription = %id, user = %subscription.user, "Subscription paused after repeated renewal failures");
                }
                RenewalOutcome::Failed {
                    subscription: id,
                    reason: e.to_string(),
                    paused,
                    next_renewal: updated.next_renewal,
                }
            }
        };

        if self
            .subscriptions
            .compare_and_set(subscription.version, updated)
            .await?
        {
            Ok(outcome)
        } else {
            debug!(subscription = %id, "Renewal already recorded by a concurrent tick");
            Ok(RenewalOutcome::Skipped { subscription: id })
        }
    }

    async fn charge(&self, subscription: &Subscription) -> Result<Order> {
        let product = self
            .catalog
            .product(&subscription.product)
            .await?
            .filter(Product::is_purchasable)
            .ok_or_else(|| CheckoutError::not_found("product", &subscription.product))?;

        let snapshot = CartSnapshot::single(subscription.user, &product, 1);
        let origin = IntentOrigin::Renewal {
            subscription: subscription.id,
            due: subscription.next_renewal,
        };
        let key = format!(
            "renewal:{}:{}",
            subscription.id,
            subscription.next_renewal.timestamp()
        );
        let mut intent = self
            .gateway
            .create_intent_keyed(snapshot, self.currency.clone(), origin, key)
            .await?;

        if !intent.status.is_terminal() {
            self.gateway.begin_confirmation(&intent.id).await?;
            let outcome = self.processor.await_outcome(&intent).await?;
            intent = self.gateway.record_outcome(&intent.id, outcome).await?;
        }
        Ok(self.finalizer.finalize(&intent.id).await?.into_order())
    }
}
