use super::cart::CartService;
use crate::domain::ids::IntentId;
use crate::domain::intent::{IntentStatus, PaymentIntent};
use crate::domain::order::Order;
use crate::domain::ports::{SharedClock, SharedIntentStore, SharedOrderStore, Stored};
use crate::error::{CheckoutError, Result};
use std::sync::Arc;
use tracing::{debug, error, info};

/// What a call to [`OrderFinalizer::finalize`] did.
#[derive(Debug, Clone, PartialEq)]
pub enum Finalization {
    /// This call created the order.
    Created(Order),
    /// An order for the intent already existed and was returned unchanged.
    AlreadyFinalized(Order),
}

impl Finalization {
    pub fn order(&self) -> &Order {
        match self {
            Self::Created(order) | Self::AlreadyFinalized(order) => order,
        }
    }

    pub fn into_order(self) -> Order {
        match self {
            Self::Created(order) | Self::AlreadyFinalized(order) => order,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// Turns succeeded intents into orders, exactly once per intent.
pub struct OrderFinalizer {
    intents: SharedIntentStore,
    orders: SharedOrderStore,
    carts: Arc<CartService>,
    clock: SharedClock,
}

impl OrderFinalizer {
    pub fn new(
        intents: SharedIntentStore,
        orders: SharedOrderStore,
        carts: Arc<CartService>,
        clock: SharedClock,
    ) -> Self {
        Self {
            intents,
            orders,
            carts,
            clock,
        }
    }

    /// Creates the order for a succeeded intent.
    ///
    /// Any number of concurrent or repeated calls for the same intent produce a
    /// single order; all but the winner get `AlreadyFinalized`. The order is
    /// priced from the intent, never from the live cart. For checkout intents
    /// the purchased lines are then taken out of the owner's cart. That cleanup
    /// is idempotent and reruns on every call, so a retry completes it if an
    /// earlier call stored the order but failed to update the cart.
    pub async fn finalize(&self, id: &IntentId) -> Result<Finalization> {
        let intent = self
            .intents
            .get(id)
            .await?
            .ok_or_else(|| CheckoutError::UnknownIntent(id.clone()))?;
        if intent.status != IntentStatus::Succeeded {
            return Err(CheckoutError::IntentNotConfirmed {
                intent: id.clone(),
                status: intent.status,
            });
        }

        if let Some(existing) = self.orders.get_by_intent(id).await? {
            debug!(intent = %id, order = %existing.id, "Intent already finalized");
            self.clear_purchased(&intent, &existing).await;
            return Ok(Finalization::AlreadyFinalized(existing));
        }

        let order = Order::for_intent(&intent, self.clock.now());
        match self.orders.insert_if_absent(order).await? {
            Stored::Inserted(order) => {
                info!(
                    order = %order.id,
                    intent = %id,
                    user = %order.user,
                    total = %order.total,
                    "Order created"
                );
                self.clear_purchased(&intent, &order).await;
                Ok(Finalization::Created(order))
            }
            Stored::Existing(order) => {
                debug!(intent = %id, order = %order.id, "Lost finalization race");
                self.clear_purchased(&intent, &order).await;
                Ok(Finalization::AlreadyFinalized(order))
            }
        }
    }

    /// The order is already durable here; a cart failure is logged and left
    /// for the next finalize call.
    async fn clear_purchased(&self, intent: &PaymentIntent, order: &Order) {
        if !intent.settles_cart() {
            return;
        }
        if let Err(e) = self.carts.clear_purchased(intent).await {
            error!(user = %intent.user, order = %order.id, error = %e, "Failed to update cart after order");
        }
    }
}
