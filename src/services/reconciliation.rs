use std::sync::Arc;
use uuid::Uuid;

use crate::db::PaymentStore;
use crate::error::{AppError, AppResult};
use crate::gateway::GatewayClient;
use crate::models::IntentProjection;
use crate::services::{Outcome, TransitionEngine, TransitionResult};

/// Pull-based fallback for when the webhook never arrives, or when the
/// payer asks "I already paid, check now". Converges on the same
/// transition engine as the webhook processor, so repeated and concurrent
/// invocations are safe: whichever caller applies first wins and the rest
/// observe a no-op.
pub struct ReconciliationSync {
    intents: Arc<dyn PaymentStore>,
    gateway: Arc<dyn GatewayClient>,
    transition: Arc<TransitionEngine>,
}

impl ReconciliationSync {
    pub fn new(
        intents: Arc<dyn PaymentStore>,
        gateway: Arc<dyn GatewayClient>,
        transition: Arc<TransitionEngine>,
    ) -> Self {
        Self {
            intents,
            gateway,
            transition,
        }
    }

    pub async fn sync_status(&self, order_id: Uuid) -> AppResult<IntentProjection> {
        let intent = self
            .intents
            .latest_for_order(order_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("No payment intent for order {}", order_id))
            })?;

        if intent.status.is_terminal() {
            return Ok(intent.into());
        }

        // Nothing to ask the gateway about until the create call has
        // reported an external id.
        let Some(external_id) = intent.external_id.clone() else {
            return Ok(intent.into());
        };

        let payment = self.gateway.fetch_payment(&external_id).await?;

        match Outcome::from_gateway(&payment.status) {
            Some(outcome) => match self.transition.apply(&intent, outcome).await? {
                TransitionResult::Applied(settled) => Ok(settled.into()),
                TransitionResult::AlreadySettled => {
                    // Lost the race against a webhook; re-read for the
                    // winner's view.
                    let fresh = self
                        .intents
                        .find_by_id(intent.id)
                        .await?
                        .unwrap_or(intent);
                    Ok(fresh.into())
                }
            },
            None => {
                tracing::debug!(
                    order_id = %order_id,
                    external_id = %external_id,
                    "Gateway still reports a non-terminal status"
                );
                Ok(intent.into())
            }
        }
    }
}
