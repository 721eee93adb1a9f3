//! Provider webhook intake.
//!
//! Deliveries carry a `Signature` header of the form `t=<unix seconds>,v1=<hex>`
//! where the hex digest is HMAC-SHA256 over `"<t>.<raw body>"` with the shared
//! endpoint secret. Verified `payment_intent.*` events are fed to the engine;
//! anything else is acknowledged and ignored.

use crate::application::engine::CheckoutEngine;
use crate::config::CheckoutConfig;
use crate::domain::ids::{IntentId, OrderId};
use crate::domain::intent::{IntentStatus, PaymentOutcome};
use crate::domain::ports::SharedClock;
use crate::error::{CheckoutError, Result};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::{debug, info, warn};

type HmacSha256 = Hmac<Sha256>;

fn rejected(reason: impl Into<String>) -> CheckoutError {
    CheckoutError::InvalidSignature(reason.into())
}

/// Checks webhook signatures against the shared secret.
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: String,
    tolerance_secs: i64,
}

impl WebhookVerifier {
    pub fn new(secret: impl Into<String>, tolerance_secs: i64) -> Self {
        Self {
            secret: secret.into(),
            tolerance_secs,
        }
    }

    /// `None` when no webhook secret is configured.
    pub fn from_config(config: &CheckoutConfig) -> Option<Self> {
        config
            .webhook_secret
            .as_ref()
            .map(|secret| Self::new(secret.clone(), config.webhook_tolerance_secs))
    }

    fn digest(&self, timestamp: i64, payload: &[u8]) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|_| rejected("unusable webhook secret"))?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Produces a header value for `payload` signed at `timestamp`.
    pub fn sign(&self, payload: &[u8], timestamp: i64) -> Result<String> {
        Ok(format!("t={timestamp},v1={}", self.digest(timestamp, payload)?))
    }

    /// Accepts the delivery if any `v1` signature matches and the timestamp is
    /// within tolerance of `now`.
    pub fn verify(&self, payload: &[u8], header: &str, now: DateTime<Utc>) -> Result<()> {
        let mut timestamp = None;
        let mut signatures = Vec::new();
        for part in header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
                Some(("v1", value)) => signatures.push(value),
                _ => {}
            }
        }
        let timestamp = timestamp.ok_or_else(|| rejected("missing or invalid timestamp"))?;
        if signatures.is_empty() {
            return Err(rejected("no v1 signature"));
        }
        if (now.timestamp() - timestamp).abs() > self.tolerance_secs {
            return Err(rejected("timestamp outside tolerance window"));
        }

        let expected = self.digest(timestamp, payload)?;
        let matched = signatures
            .iter()
            .any(|sig| bool::from(expected.as_bytes().ct_eq(sig.as_bytes())));
        if matched {
            Ok(())
        } else {
            Err(rejected("signature mismatch"))
        }
    }
}

#[derive(Debug, Deserialize)]
struct Event {
    #[serde(default)]
    id: Option<String>,
    #[serde(rename = "type")]
    kind: String,
    data: EventData,
}

#[derive(Debug, Deserialize)]
struct EventData {
    object: EventObject,
}

#[derive(Debug, Deserialize)]
struct EventObject {
    id: String,
}

fn outcome_for(kind: &str) -> Option<PaymentOutcome> {
    match kind {
        "payment_intent.succeeded" => Some(PaymentOutcome::Succeeded),
        "payment_intent.payment_failed" => Some(PaymentOutcome::Failed),
        "payment_intent.canceled" => Some(PaymentOutcome::Canceled),
        _ => None,
    }
}

/// What a verified delivery did.
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookReceipt {
    Ignored {
        event_type: String,
    },
    Applied {
        intent: IntentId,
        status: IntentStatus,
        order: Option<OrderId>,
    },
}

/// Verifies deliveries and applies their outcomes through the engine.
pub struct WebhookHandler {
    engine: Arc<CheckoutEngine>,
    verifier: WebhookVerifier,
    clock: SharedClock,
}

impl WebhookHandler {
    pub fn new(engine: Arc<CheckoutEngine>, verifier: WebhookVerifier, clock: SharedClock) -> Self {
        Self {
            engine,
            verifier,
            clock,
        }
    }

    /// Handles one raw delivery. Redelivery of the same event is harmless.
    pub async fn handle(&self, payload: &[u8], signature: &str) -> Result<WebhookReceipt> {
        if let Err(e) = self.verifier.verify(payload, signature, self.clock.now()) {
            warn!(error = %e, "Webhook rejected");
            return Err(e);
        }

        let event: Event = serde_json::from_slice(payload)
            .map_err(|e| CheckoutError::InvalidArgument(format!("malformed webhook payload: {e}")))?;
        let Some(outcome) = outcome_for(&event.kind) else {
            debug!(event = ?event.id, event_type = %event.kind, "Ignoring webhook event");
            return Ok(WebhookReceipt::Ignored {
                event_type: event.kind,
            });
        };

        let intent = IntentId::new(event.data.object.id);
        let confirmation = self.engine.confirm_payment(&intent, outcome).await?;
        info!(
            event = ?event.id,
            intent = %intent,
            status = %confirmation.intent.status,
            "Webhook applied"
        );
        Ok(WebhookReceipt::Applied {
            intent,
            status: confirmation.intent.status,
            order: confirmation.order.map(|o| o.id),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::engine::Ports;
    use crate::domain::ids::{ProductId, UserId};
    use crate::domain::money::Amount;
    use crate::domain::product::Product;
    use crate::infrastructure::clock::FixedClock;
    use crate::infrastructure::in_memory::InMemoryCatalog;
    use crate::infrastructure::processor::SimulatedProcessor;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    const SECRET: &str = "whsec_test";

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 1, 9, 30, 0).unwrap()
    }

    fn event(kind: &str, intent: &IntentId) -> Vec<u8> {
        serde_json::json!({
            "id": "evt_1",
            "type": kind,
            "data": { "object": { "id": intent.as_str(), "object": "payment_intent" } }
        })
        .to_string()
        .into_bytes()
    }

    async fn setup() -> (WebhookHandler, Arc<CheckoutEngine>, IntentId) {
        let catalog = InMemoryCatalog::with_products([Product::new(
            "a",
            "A",
            Amount::new(dec!(9)).unwrap(),
            10,
        )]);
        let clock = Arc::new(FixedClock::new(now()));
        let ports = Ports::in_memory(
            Arc::new(catalog),
            Arc::new(SimulatedProcessor::new()),
            clock.clone(),
        );
        let engine = Arc::new(CheckoutEngine::new(ports, CheckoutConfig::default()).unwrap());
        engine.add_item(UserId(1), &ProductId::new("a"), 1).await.unwrap();
        let intent = engine.create_payment_intent(UserId(1)).await.unwrap();
        let handler = WebhookHandler::new(
            Arc::clone(&engine),
            WebhookVerifier::new(SECRET, 300),
            clock,
        );
        (handler, engine, intent.id)
    }

    #[test]
    fn test_sign_then_verify() {
        let verifier = WebhookVerifier::new(SECRET, 300);
        let header = verifier.sign(b"{}", now().timestamp()).unwrap();
        assert!(header.starts_with(&format!("t={},v1=", now().timestamp())));
        assert!(verifier.verify(b"{}", &header, now()).is_ok());
    }

    #[test]
    fn test_verify_rejects_tampering_and_replay() {
        let verifier = WebhookVerifier::new(SECRET, 300);
        let header = verifier.sign(b"{\"a\":1}", now().timestamp()).unwrap();

        assert!(verifier.verify(b"{\"a\":2}", &header, now()).is_err());
        let stale = now() + chrono::Duration::seconds(301);
        assert!(verifier.verify(b"{\"a\":1}", &header, stale).is_err());
        let other = WebhookVerifier::new("whsec_other", 300);
        assert!(other.verify(b"{\"a\":1}", &header, now()).is_err());
        assert!(matches!(
            verifier.verify(b"{}", "garbage", now()),
            Err(CheckoutError::InvalidSignature(_))
        ));
    }

    #[tokio::test]
    async fn test_succeeded_event_creates_order_once() {
        let (handler, engine, intent) = setup().await;
        let payload = event("payment_intent.succeeded", &intent);
        let header = handler.verifier.sign(&payload, now().timestamp()).unwrap();

        let first = handler.handle(&payload, &header).await.unwrap();
        let second = handler.handle(&payload, &header).await.unwrap();
        assert_eq!(first, second);
        assert!(matches!(
            first,
            WebhookReceipt::Applied {
                status: IntentStatus::Succeeded,
                order: Some(_),
                ..
            }
        ));
        assert_eq!(engine.orders_for(UserId(1)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_event_creates_no_order() {
        let (handler, engine, intent) = setup().await;
        let payload = event("payment_intent.payment_failed", &intent);
        let header = handler.verifier.sign(&payload, now().timestamp()).unwrap();

        let receipt = handler.handle(&payload, &header).await.unwrap();
        assert!(matches!(
            receipt,
            WebhookReceipt::Applied {
                status: IntentStatus::Failed,
                order: None,
                ..
            }
        ));
        assert!(engine.orders_for(UserId(1)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unrelated_event_is_ignored() {
        let (handler, _, intent) = setup().await;
        let payload = event("charge.refunded", &intent);
        let header = handler.verifier.sign(&payload, now().timestamp()).unwrap();
        assert_eq!(
            handler.handle(&payload, &header).await.unwrap(),
            WebhookReceipt::Ignored {
                event_type: "charge.refunded".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_bad_signature_applies_nothing() {
        let (handler, engine, intent) = setup().await;
        let payload = event("payment_intent.succeeded", &intent);
        let forged = WebhookVerifier::new("whsec_forged", 300)
            .sign(&payload, now().timestamp())
            .unwrap();
        assert!(matches!(
            handler.handle(&payload, &forged).await,
            Err(CheckoutError::InvalidSignature(_))
        ));
        assert_eq!(
            engine.intent(&intent).await.unwrap().status,
            IntentStatus::RequiresConfirmation
        );
    }

    #[tokio::test]
    async fn test_malformed_payload() {
        let (handler, _, _) = setup().await;
        let payload = b"not json";
        let header = handler.verifier.sign(payload, now().timestamp()).unwrap();
        assert!(matches!(
            handler.handle(payload, &header).await,
            Err(CheckoutError::InvalidArgument(_))
        ));
    }
}
