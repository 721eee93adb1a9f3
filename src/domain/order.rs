use super::cart::LineItem;
use super::ids::{IntentId, OrderId, UserId};
use super::intent::PaymentIntent;
use super::money::{Currency, Money};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Completed,
    Fulfilled,
    Refunded,
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Completed => "completed",
            Self::Fulfilled => "fulfilled",
            Self::Refunded => "refunded",
        };
        f.write_str(s)
    }
}

/// Immutable record of a completed purchase. At most one exists per intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub intent: IntentId,
    pub user: UserId,
    pub lines: Vec<LineItem>,
    pub subtotal: Money,
    pub tax: Money,
    pub total: Money,
    pub currency: Currency,
    /// The only field that changes after creation.
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Builds the order for a settled intent, charging exactly what the intent quoted.
    pub fn for_intent(intent: &PaymentIntent, created_at: DateTime<Utc>) -> Self {
        Self {
            id: OrderId::generate(),
            intent: intent.id.clone(),
            user: intent.user,
            lines: intent.lines.clone(),
            subtotal: intent.subtotal,
            tax: intent.tax,
            total: intent.amount,
            currency: intent.currency.clone(),
            status: OrderStatus::Completed,
            created_at,
        }
    }
}
