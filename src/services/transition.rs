use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::db::{OrderStore, PaymentStore};
use crate::error::AppResult;
use crate::gateway::GatewayPaymentStatus;
use crate::models::{PaymentIntent, PaymentStatus};
use crate::services::NotificationDispatcher;

/// Terminal outcome observed at the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Approved,
    Rejected,
}

impl Outcome {
    /// Gateway state mapping: `approved` approves, `rejected` and
    /// `cancelled` reject, everything else stays pending.
    pub fn from_gateway(status: &GatewayPaymentStatus) -> Option<Self> {
        match status {
            GatewayPaymentStatus::Approved => Some(Outcome::Approved),
            GatewayPaymentStatus::Rejected | GatewayPaymentStatus::Cancelled => {
                Some(Outcome::Rejected)
            }
            _ => None,
        }
    }

    fn status(self) -> PaymentStatus {
        match self {
            Outcome::Approved => PaymentStatus::Approved,
            Outcome::Rejected => PaymentStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone)]
pub enum TransitionResult {
    Applied(PaymentIntent),
    /// The intent was already terminal; nothing changed and no side effects
    /// ran. Replays land here.
    AlreadySettled,
}

/// Single choke point for terminal state changes. Webhook processing,
/// reconciliation and synchronous card results all converge here, so
/// replay safety is a structural property rather than per-caller
/// discipline.
pub struct TransitionEngine {
    intents: Arc<dyn PaymentStore>,
    orders: Arc<dyn OrderStore>,
    notifier: NotificationDispatcher,
    locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl TransitionEngine {
    pub fn new(
        intents: Arc<dyn PaymentStore>,
        orders: Arc<dyn OrderStore>,
        notifier: NotificationDispatcher,
    ) -> Self {
        Self {
            intents,
            orders,
            notifier,
            locks: DashMap::new(),
        }
    }

    fn order_lock(&self, order_id: Uuid) -> Arc<Mutex<()>> {
        self.locks
            .entry(order_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Apply a terminal outcome to an intent. Serialized per order, and the
    /// store-level conditional update is the authoritative guard: of two
    /// concurrent callers, the loser observes `AlreadySettled`.
    pub async fn apply(
        &self,
        intent: &PaymentIntent,
        outcome: Outcome,
    ) -> AppResult<TransitionResult> {
        let lock = self.order_lock(intent.order_id);
        let result = {
            let _guard = lock.lock().await;
            self.apply_outcome(intent, outcome).await?
        };

        // Terminal either way now; drop the order's entry so the lock table
        // stays bounded by in-flight orders. Late callers recreate it and
        // the conditional settle still turns them into no-ops.
        self.locks.remove(&intent.order_id);

        Ok(result)
    }

    async fn apply_outcome(
        &self,
        intent: &PaymentIntent,
        outcome: Outcome,
    ) -> AppResult<TransitionResult> {
        if intent.status.is_terminal() {
            return Ok(TransitionResult::AlreadySettled);
        }

        let paid_at = match outcome {
            Outcome::Approved => Some(Utc::now()),
            Outcome::Rejected => None,
        };

        let settled = match self.intents.settle(intent.id, outcome.status(), paid_at).await? {
            Some(updated) => updated,
            None => return Ok(TransitionResult::AlreadySettled),
        };

        tracing::info!(
            intent_id = %settled.id,
            order_id = %settled.order_id,
            status = ?settled.status,
            "Payment intent settled"
        );

        match outcome {
            Outcome::Approved => {
                if !self.orders.mark_paid(settled.order_id).await? {
                    tracing::warn!(
                        order_id = %settled.order_id,
                        "Order was not awaiting payment when intent approved"
                    );
                }
                if let Some(order) = self.orders.find_by_id(settled.order_id).await? {
                    self.notifier.payment_approved(&settled, &order);
                }
            }
            Outcome::Rejected => {
                self.notifier.payment_rejected(&settled);
            }
        }

        Ok(TransitionResult::Applied(settled))
    }
}
