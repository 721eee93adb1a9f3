use crate::domain::cart::CartSnapshot;
use crate::domain::ids::IntentId;
use crate::domain::intent::{IntentChange, IntentOrigin, IntentStatus, PaymentIntent, PaymentOutcome};
use crate::domain::money::Currency;
use crate::domain::ports::{HoldRequest, SharedClock, SharedIntentStore, SharedProcessor};
use crate::error::{CheckoutError, Result};
use rust_decimal::Decimal;
use tracing::{debug, info};
use uuid::Uuid;

/// Creates provider holds and tracks their outcomes.
///
/// An intent is created at most once per idempotency key, whatever the number
/// of concurrent or repeated callers, and its status only ever moves forward.
pub struct PaymentGateway {
    intents: SharedIntentStore,
    processor: SharedProcessor,
    clock: SharedClock,
    tax_rate: Decimal,
}

impl PaymentGateway {
    pub fn new(
        intents: SharedIntentStore,
        processor: SharedProcessor,
        clock: SharedClock,
        tax_rate: Decimal,
    ) -> Self {
        Self {
            intents,
            processor,
            clock,
            tax_rate,
        }
    }

    /// Creates a checkout intent for the snapshot under a fresh idempotency key.
    pub async fn create_intent(
        &self,
        snapshot: CartSnapshot,
        currency: Currency,
    ) -> Result<PaymentIntent> {
        let key = format!("checkout:{}", Uuid::new_v4().simple());
        self.create_intent_keyed(snapshot, currency, IntentOrigin::Checkout, key)
            .await
    }

    /// Creates an intent, or returns the one already stored under `key`.
    ///
    /// Safe to retry after a provider timeout: the provider sees the same key
    /// and the store keeps a single intent per key.
    pub async fn create_intent_keyed(
        &self,
        snapshot: CartSnapshot,
        currency: Currency,
        origin: IntentOrigin,
        key: String,
    ) -> Result<PaymentIntent> {
        if snapshot.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        if let Some(existing) = self.intents.find_by_key(&key).await? {
            debug!(intent = %existing.id, key, "Reusing intent for idempotency key");
            return Ok(existing);
        }

        let quote = snapshot.quote(self.tax_rate);
        let hold = self
            .processor
            .create_hold(HoldRequest {
                idempotency_key: key.clone(),
                user: snapshot.user,
                amount: quote.total,
                currency: currency.clone(),
            })
            .await?;

        let intent = PaymentIntent {
            id: hold.id,
            idempotency_key: key,
            user: snapshot.user,
            origin,
            lines: snapshot.lines,
            subtotal: quote.subtotal,
            tax: quote.tax,
            amount: quote.total,
            currency,
            status: IntentStatus::Created,
            client_secret: hold.client_secret,
            created_at: self.clock.now(),
        };

        let stored = self.intents.insert_if_absent(intent).await?;
        if stored.was_inserted() {
            let intent = stored.into_inner();
            info!(
                intent = %intent.id,
                user = %intent.user,
                amount = %intent.amount,
                currency = %intent.currency,
                "Payment intent created"
            );
            Ok(intent)
        } else {
            Ok(stored.into_inner())
        }
    }

    /// Marks the intent as handed to the payer for confirmation.
    pub async fn begin_confirmation(&self, id: &IntentId) -> Result<PaymentIntent> {
        self.apply(id, IntentChange::AwaitConfirmation).await
    }

    /// Records a terminal outcome reported by the provider.
    ///
    /// Redundant or conflicting deliveries against a settled intent leave it
    /// unchanged and return it as stored.
    pub async fn record_outcome(
        &self,
        id: &IntentId,
        outcome: PaymentOutcome,
    ) -> Result<PaymentIntent> {
        self.apply(id, IntentChange::Settle(outcome)).await
    }

    pub async fn cancel(&self, id: &IntentId) -> Result<PaymentIntent> {
        self.record_outcome(id, PaymentOutcome::Canceled).await
    }

    pub async fn get(&self, id: &IntentId) -> Result<PaymentIntent> {
        self.intents
            .get(id)
            .await?
            .ok_or_else(|| CheckoutError::UnknownIntent(id.clone()))
    }

    async fn apply(&self, id: &IntentId, change: IntentChange) -> Result<PaymentIntent> {
        let transitioned = self
            .intents
            .transition(id, change)
            .await?
            .ok_or_else(|| CheckoutError::UnknownIntent(id.clone()))?;
        if transitioned.changed {
            info!(intent = %id, status = %transitioned.intent.status, "Payment intent updated");
        } else {
            debug!(intent = %id, status = %transitioned.intent.status, ?change, "Intent change ignored");
        }
        Ok(transitioned.intent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cart::Cart;
    use crate::domain::ids::UserId;
    use crate::domain::money::{Amount, Money};
    use crate::domain::product::Product;
    use crate::infrastructure::clock::SystemClock;
    use crate::infrastructure::in_memory::InMemoryIntentStore;
    use crate::infrastructure::processor::SimulatedProcessor;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn gateway(tax_rate: Decimal) -> (Arc<PaymentGateway>, SimulatedProcessor) {
        let processor = SimulatedProcessor::new();
        let gateway = PaymentGateway::new(
            Arc::new(InMemoryIntentStore::new()),
            Arc::new(processor.clone()),
            Arc::new(SystemClock),
            tax_rate,
        );
        (Arc::new(gateway), processor)
    }

    fn snapshot(price: Decimal, quantity: u32) -> CartSnapshot {
        let mut cart = Cart::new(UserId(7));
        cart.add(
            &Product::new("a", "A", Amount::new(price).unwrap(), 100),
            quantity,
        );
        cart.snapshot()
    }

    #[tokio::test]
    async fn test_intent_freezes_amount() {
        let (gateway, _) = gateway(Decimal::ZERO);
        let intent = gateway
            .create_intent(snapshot(dec!(10), 2), Currency::default())
            .await
            .unwrap();
        assert_eq!(intent.amount, Money::new(dec!(20)));
        assert_eq!(intent.status, IntentStatus::Created);
        assert!(!intent.client_secret.is_empty());
        assert_eq!(gateway.get(&intent.id).await.unwrap(), intent);
    }

    #[tokio::test]
    async fn test_tax_is_added_to_amount() {
        let (gateway, _) = gateway(dec!(0.12));
        let intent = gateway
            .create_intent(snapshot(dec!(10.99), 1), Currency::default())
            .await
            .unwrap();
        assert_eq!(intent.subtotal, Money::new(dec!(10.99)));
        assert_eq!(intent.tax, Money::new(dec!(1.32)));
        assert_eq!(intent.amount, Money::new(dec!(12.31)));
    }

    #[tokio::test]
    async fn test_empty_snapshot_rejected() {
        let (gateway, processor) = gateway(Decimal::ZERO);
        let empty = Cart::new(UserId(1)).snapshot();
        assert!(matches!(
            gateway.create_intent(empty, Currency::default()).await,
            Err(CheckoutError::EmptyCart)
        ));
        assert_eq!(processor.hold_count().await, 0);
    }

    #[tokio::test]
    async fn test_same_key_yields_one_intent_under_concurrency() {
        let (gateway, processor) = gateway(Decimal::ZERO);
        let mut handles = Vec::new();
        for _ in 0..16 {
            let gateway = Arc::clone(&gateway);
            handles.push(tokio::spawn(async move {
                gateway
                    .create_intent_keyed(
                        snapshot(dec!(5), 1),
                        Currency::default(),
                        IntentOrigin::Checkout,
                        "checkout:fixed".to_string(),
                    )
                    .await
                    .unwrap()
            }));
        }
        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().id);
        }
        ids.dedup();
        assert_eq!(ids.len(), 1);
        assert_eq!(processor.hold_count().await, 1);
    }

    #[tokio::test]
    async fn test_provider_outage_leaves_nothing_behind() {
        let (gateway, processor) = gateway(Decimal::ZERO);
        processor.set_offline(true);
        let err = gateway
            .create_intent_keyed(
                snapshot(dec!(5), 1),
                Currency::default(),
                IntentOrigin::Checkout,
                "k".to_string(),
            )
            .await
            .unwrap_err();
        assert!(err.is_retryable());

        processor.set_offline(false);
        let intent = gateway
            .create_intent_keyed(
                snapshot(dec!(5), 1),
                Currency::default(),
                IntentOrigin::Checkout,
                "k".to_string(),
            )
            .await
            .unwrap();
        assert_eq!(intent.status, IntentStatus::Created);
    }

    #[tokio::test]
    async fn test_outcome_is_recorded_once() {
        let (gateway, _) = gateway(Decimal::ZERO);
        let intent = gateway
            .create_intent(snapshot(dec!(5), 1), Currency::default())
            .await
            .unwrap();
        gateway.begin_confirmation(&intent.id).await.unwrap();

        let first = gateway
            .record_outcome(&intent.id, PaymentOutcome::Succeeded)
            .await
            .unwrap();
        let late_failure = gateway
            .record_outcome(&intent.id, PaymentOutcome::Failed)
            .await
            .unwrap();
        assert_eq!(first.status, IntentStatus::Succeeded);
        assert_eq!(late_failure.status, IntentStatus::Succeeded);
    }

    #[tokio::test]
    async fn test_unknown_intent() {
        let (gateway, _) = gateway(Decimal::ZERO);
        let missing = IntentId::new("pi_missing");
        assert!(matches!(
            gateway.record_outcome(&missing, PaymentOutcome::Succeeded).await,
            Err(CheckoutError::UnknownIntent(_))
        ));
        assert!(matches!(
            gateway.get(&missing).await,
            Err(CheckoutError::UnknownIntent(_))
        ));
    }
}
