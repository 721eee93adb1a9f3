use crate::domain::ids::{IntentId, UserId};
use crate::domain::intent::{PaymentIntent, PaymentOutcome};
use crate::domain::ports::{HoldRequest, PaymentProcessor, ProviderIntent};
use crate::error::{CheckoutError, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Ledger {
    holds: HashMap<String, ProviderIntent>,
    charged: HashSet<IntentId>,
    declined: HashSet<UserId>,
}

/// An in-process stand-in for the card processor.
///
/// Honours idempotency keys the way a real provider does, can be switched
/// offline, and declines off-session charges for configured users. Card data
/// never passes through here; the client secret is all the front end needs.
#[derive(Default, Clone)]
pub struct SimulatedProcessor {
    ledger: Arc<RwLock<Ledger>>,
    offline: Arc<AtomicBool>,
}

impl SimulatedProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a processor that declines every off-session charge for `users`.
    pub fn declining(users: impl IntoIterator<Item = UserId>) -> Self {
        let ledger = Ledger {
            declined: users.into_iter().collect(),
            ..Ledger::default()
        };
        Self {
            ledger: Arc::new(RwLock::new(ledger)),
            offline: Arc::default(),
        }
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub async fn decline(&self, user: UserId) {
        self.ledger.write().await.declined.insert(user);
    }

    pub async fn approve(&self, user: UserId) {
        self.ledger.write().await.declined.remove(&user);
    }

    /// Number of distinct holds created.
    pub async fn hold_count(&self) -> usize {
        self.ledger.read().await.holds.len()
    }

    /// Number of distinct intents charged off-session.
    pub async fn charge_count(&self) -> usize {
        self.ledger.read().await.charged.len()
    }

    fn ensure_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            Err(CheckoutError::ProviderUnavailable(
                "simulated processor is offline".to_string(),
            ))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl PaymentProcessor for SimulatedProcessor {
    async fn create_hold(&self, request: HoldRequest) -> Result<ProviderIntent> {
        self.ensure_online()?;
        if request.amount.is_zero() {
            return Err(CheckoutError::InvalidArgument(
                "hold amount must be greater than zero".to_string(),
            ));
        }

        let mut ledger = self.ledger.write().await;
        let hold = ledger
            .holds
            .entry(request.idempotency_key)
            .or_insert_with(|| {
                let id = format!("pi_{}", Uuid::new_v4().simple());
                let client_secret = format!("{id}_secret_{}", Uuid::new_v4().simple());
                ProviderIntent {
                    id: IntentId::new(id),
                    client_secret,
                }
            });
        Ok(hold.clone())
    }

    async fn await_outcome(&self, intent: &PaymentIntent) -> Result<PaymentOutcome> {
        self.ensure_online()?;
        let mut ledger = self.ledger.write().await;
        if ledger.declined.contains(&intent.user) {
            return Ok(PaymentOutcome::Failed);
        }
        ledger.charged.insert(intent.id.clone());
        Ok(PaymentOutcome::Succeeded)
    }
}
