use crate::domain::ids::{PenaltyId, UserId};
use crate::domain::money::Amount;
use crate::domain::penalty::PenaltyRecord;
use crate::domain::ports::{SharedClock, SharedPenaltyStore};
use crate::error::{CheckoutError, Result};
use rust_decimal::Decimal;
use tracing::info;

/// Administrative adjustments against a user. Append-only.
pub struct PenaltyLedger {
    store: SharedPenaltyStore,
    clock: SharedClock,
}

impl PenaltyLedger {
    pub fn new(store: SharedPenaltyStore, clock: SharedClock) -> Self {
        Self { store, clock }
    }

    pub async fn apply_penalty(
        &self,
        user: UserId,
        amount: Decimal,
        reason: &str,
    ) -> Result<PenaltyRecord> {
        let amount = Amount::new(amount)?;
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(CheckoutError::InvalidArgument(
                "penalty reason must not be empty".to_string(),
            ));
        }

        let record = PenaltyRecord {
            id: PenaltyId::generate(),
            user,
            amount,
            reason: reason.to_string(),
            issued_at: self.clock.now(),
        };
        self.store.append(record.clone()).await?;
        info!(penalty = %record.id, %user, amount = %record.amount, reason, "Penalty applied");
        Ok(record)
    }

    /// All penalties for `user`, oldest first.
    pub async fn list(&self, user: UserId) -> Result<Vec<PenaltyRecord>> {
        self.store.list_by_user(user).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::clock::SystemClock;
    use crate::infrastructure::in_memory::InMemoryPenaltyStore;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn ledger() -> PenaltyLedger {
        PenaltyLedger::new(Arc::new(InMemoryPenaltyStore::new()), Arc::new(SystemClock))
    }

    #[tokio::test]
    async fn test_penalties_accumulate_in_order() {
        let ledger = ledger();
        let first = ledger
            .apply_penalty(UserId(1), dec!(5), "late return")
            .await
            .unwrap();
        ledger
            .apply_penalty(UserId(1), dec!(2.50), "damaged item")
            .await
            .unwrap();
        ledger
            .apply_penalty(UserId(2), dec!(1), "other user")
            .await
            .unwrap();

        let records = ledger.list(UserId(1)).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], first);
        assert_eq!(records[1].reason, "damaged item");
    }

    #[tokio::test]
    async fn test_non_positive_amount_rejected() {
        let ledger = ledger();
        for amount in [dec!(0), dec!(-3)] {
            assert!(matches!(
                ledger.apply_penalty(UserId(1), amount, "x").await,
                Err(CheckoutError::InvalidArgument(_))
            ));
        }
        assert!(ledger.list(UserId(1)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_blank_reason_rejected() {
        assert!(matches!(
            ledger().apply_penalty(UserId(1), dec!(1), "  ").await,
            Err(CheckoutError::InvalidArgument(_))
        ));
    }
}
