use super::ids::{PenaltyId, UserId};
use super::money::Amount;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An out-of-band balance adjustment. Never edited or removed once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PenaltyRecord {
    pub id: PenaltyId,
    pub user: UserId,
    pub amount: Amount,
    pub reason: String,
    pub issued_at: DateTime<Utc>,
}
