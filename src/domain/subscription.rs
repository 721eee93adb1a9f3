use super::ids::{ProductId, SubscriptionId, UserId};
use crate::error::CheckoutError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Active,
    Paused,
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => f.write_str("active"),
            Self::Paused => f.write_str("paused"),
        }
    }
}

/// A recurring purchase of one product every `interval_days`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub user: UserId,
    pub product: ProductId,
    pub interval_days: u32,
    /// The scheduled due date. Advanced from itself, never from the wall clock.
    pub next_renewal: DateTime<Utc>,
    pub status: SubscriptionStatus,
    /// Reset on every successful renewal and on resume.
    pub consecutive_failures: u32,
    pub created_at: DateTime<Utc>,
    /// Optimistic concurrency token, bumped by every stored update.
    #[serde(default)]
    pub version: u64,
}

impl Subscription {
    pub fn new(
        user: UserId,
        product: ProductId,
        interval_days: u32,
        now: DateTime<Utc>,
    ) -> Result<Self, CheckoutError> {
        if interval_days == 0 {
            return Err(CheckoutError::InvalidArgument(
                "interval_days must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            id: SubscriptionId::generate(),
            user,
            product,
            interval_days,
            next_renewal: now + Duration::days(i64::from(interval_days)),
            status: SubscriptionStatus::Active,
            consecutive_failures: 0,
            created_at: now,
            version: 0,
        })
    }

    pub fn is_active(&self) -> bool {
        self.status == SubscriptionStatus::Active
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.is_active() && self.next_renewal <= now
    }

    fn advance(&mut self) {
        self.next_renewal += Duration::days(i64::from(self.interval_days));
    }

    pub fn record_success(&mut self) {
        self.advance();
        self.consecutive_failures = 0;
    }

    /// Counts a failed renewal and still moves the schedule forward.
    ///
    /// Returns `true` if this failure reached `threshold` and paused the subscription.
    pub fn record_failure(&mut self, threshold: u32) -> bool {
        self.advance();
        self.consecutive_failures += 1;
        if self.consecutive_failures >= threshold {
            self.status = SubscriptionStatus::Paused;
            true
        } else {
            false
        }
    }

    pub fn pause(&mut self) {
        self.status = SubscriptionStatus::Paused;
    }

    /// Reactivates the subscription at `now`.
    ///
    /// Due dates that passed while paused are skipped: `next_renewal` moves
    /// forward in whole intervals until it lies after `now`.
    pub fn resume(&mut self, now: DateTime<Utc>) {
        if self.next_renewal <= now {
            let interval = i64::from(self.interval_days);
            let missed = (now - self.next_renewal).num_days() / interval + 1;
            self.next_renewal += Duration::days(missed * interval);
        }
        self.status = SubscriptionStatus::Active;
        self.consecutive_failures = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, d, 0, 0, 0).unwrap()
    }

    fn subscription(interval_days: u32) -> Subscription {
        Subscription::new(UserId(1), ProductId::new("coffee"), interval_days, day(1)).unwrap()
    }

    #[test]
    fn test_first_renewal_is_one_interval_out() {
        let sub = subscription(7);
        assert_eq!(sub.next_renewal, day(8));
        assert!(!sub.is_due(day(7)));
        assert!(sub.is_due(day(8)));
    }

    #[test]
    fn test_success_advances_from_schedule_not_now() {
        let mut sub = subscription(7);
        // Processed a day late.
        assert!(sub.is_due(day(9)));
        sub.record_success();
        assert_eq!(sub.next_renewal, day(15));
    }

    #[test]
    fn test_failures_pause_at_threshold() {
        let mut sub = subscription(1);
        assert!(!sub.record_failure(3));
        assert!(!sub.record_failure(3));
        assert!(sub.record_failure(3));
        assert_eq!(sub.status, SubscriptionStatus::Paused);
        assert_eq!(sub.next_renewal, day(5));
        assert!(!sub.is_due(day(20)));
    }

    #[test]
    fn test_success_resets_failures() {
        let mut sub = subscription(1);
        sub.record_failure(3);
        sub.record_failure(3);
        sub.record_success();
        assert_eq!(sub.consecutive_failures, 0);
        assert!(!sub.record_failure(3));
    }

    #[test]
    fn test_resume_reactivates() {
        let mut sub = subscription(1);
        sub.pause();
        assert!(!sub.is_due(day(2)));
        sub.resume(day(1));
        assert_eq!(sub.next_renewal, day(2));
        assert!(sub.is_due(day(2)));
    }

    #[test]
    fn test_resume_skips_periods_missed_while_paused() {
        let mut sub = subscription(7);
        sub.pause();
        // Due dates on the 8th, 15th and 22nd passed while paused.
        sub.resume(day(22));
        assert_eq!(sub.next_renewal, day(29));
        assert!(!sub.is_due(day(22)));

        let mut sub = subscription(7);
        sub.pause();
        sub.resume(day(20) + Duration::hours(5));
        assert_eq!(sub.next_renewal, day(22));
    }

    #[test]
    fn test_zero_interval_rejected() {
        assert!(matches!(
            Subscription::new(UserId(1), ProductId::new("x"), 0, day(1)),
            Err(CheckoutError::InvalidArgument(_))
        ));
    }
}
