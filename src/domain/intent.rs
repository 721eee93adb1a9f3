use super::cart::LineItem;
use super::ids::{IntentId, SubscriptionId, UserId};
use super::money::{Currency, Money};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a payment intent.
///
/// `created -> requires_confirmation -> {succeeded | failed | canceled}`.
/// The three right-hand states are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    Created,
    RequiresConfirmation,
    Succeeded,
    Failed,
    Canceled,
}

impl IntentStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Canceled)
    }
}

impl fmt::Display for IntentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::RequiresConfirmation => "requires_confirmation",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
        };
        f.write_str(s)
    }
}

/// A terminal result delivered by the payment provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentOutcome {
    Succeeded,
    Failed,
    Canceled,
}

impl From<PaymentOutcome> for IntentStatus {
    fn from(outcome: PaymentOutcome) -> Self {
        match outcome {
            PaymentOutcome::Succeeded => Self::Succeeded,
            PaymentOutcome::Failed => Self::Failed,
            PaymentOutcome::Canceled => Self::Canceled,
        }
    }
}

impl std::str::FromStr for PaymentOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            "canceled" | "cancelled" => Ok(Self::Canceled),
            other => Err(format!("unknown payment outcome: {other}")),
        }
    }
}

/// What produced the intent. Only checkout intents take lines out of the owner's cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IntentOrigin {
    Checkout,
    Renewal {
        subscription: SubscriptionId,
        due: DateTime<Utc>,
    },
}

/// A status change requested against a stored intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentChange {
    AwaitConfirmation,
    Settle(PaymentOutcome),
}

/// A provider-tracked hold for a fixed amount.
///
/// Amount, lines and currency are frozen at creation; only `status` moves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: IntentId,
    /// Deduplicates creation: the same key always resolves to the same intent.
    pub idempotency_key: String,
    pub user: UserId,
    pub origin: IntentOrigin,
    pub lines: Vec<LineItem>,
    pub subtotal: Money,
    pub tax: Money,
    pub amount: Money,
    pub currency: Currency,
    pub status: IntentStatus,
    pub client_secret: String,
    pub created_at: DateTime<Utc>,
}

impl PaymentIntent {
    /// Applies `change` if the state machine allows it.
    ///
    /// Returns `true` when the status actually moved. Changes against a terminal
    /// intent are ignored so redundant provider deliveries are harmless.
    pub fn apply(&mut self, change: IntentChange) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        match change {
            IntentChange::AwaitConfirmation => {
                if self.status == IntentStatus::Created {
                    self.status = IntentStatus::RequiresConfirmation;
                    true
                } else {
                    false
                }
            }
            IntentChange::Settle(outcome) => {
                self.status = outcome.into();
                true
            }
        }
    }

    pub fn settles_cart(&self) -> bool {
        matches!(self.origin, IntentOrigin::Checkout)
    }
}
