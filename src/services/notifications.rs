use async_trait::async_trait;
use std::sync::Arc;

use crate::error::AppResult;
use crate::models::{Order, PaymentIntent};

/// Delivery seam for payer/counterpart notifications. Implementations are
/// external collaborators (push, email); the engine only needs the hook.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn payment_created(&self, intent: &PaymentIntent) -> AppResult<()>;

    /// Approval notifies both the payer and the order's counterpart.
    async fn payment_approved(&self, intent: &PaymentIntent, order: &Order) -> AppResult<()>;

    async fn payment_rejected(&self, intent: &PaymentIntent) -> AppResult<()>;
}

/// Hands notifications off to a spawned task after the state change has
/// committed. Failures are logged and dropped; they can never unwind a
/// payment transition or block the caller.
#[derive(Clone)]
pub struct NotificationDispatcher {
    notifier: Arc<dyn Notifier>,
}

impl NotificationDispatcher {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }

    pub fn payment_created(&self, intent: &PaymentIntent) {
        let notifier = self.notifier.clone();
        let intent = intent.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier.payment_created(&intent).await {
                tracing::warn!(intent_id = %intent.id, "Failed to deliver created notification: {}", e);
            }
        });
    }

    pub fn payment_approved(&self, intent: &PaymentIntent, order: &Order) {
        let notifier = self.notifier.clone();
        let intent = intent.clone();
        let order = order.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier.payment_approved(&intent, &order).await {
                tracing::warn!(intent_id = %intent.id, "Failed to deliver approval notification: {}", e);
            }
        });
    }

    pub fn payment_rejected(&self, intent: &PaymentIntent) {
        let notifier = self.notifier.clone();
        let intent = intent.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier.payment_rejected(&intent).await {
                tracing::warn!(intent_id = %intent.id, "Failed to deliver rejection notification: {}", e);
            }
        });
    }
}

/// Default sink: structured log lines only. Stands in until a real
/// push/email channel is wired up.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn payment_created(&self, intent: &PaymentIntent) -> AppResult<()> {
        tracing::info!(
            intent_id = %intent.id,
            order_id = %intent.order_id,
            payer_id = %intent.payer_id,
            "Payment created"
        );
        Ok(())
    }

    async fn payment_approved(&self, intent: &PaymentIntent, order: &Order) -> AppResult<()> {
        tracing::info!(
            intent_id = %intent.id,
            order_id = %intent.order_id,
            payer_id = %intent.payer_id,
            provider_id = %order.provider_id,
            "Payment approved"
        );
        Ok(())
    }

    async fn payment_rejected(&self, intent: &PaymentIntent) -> AppResult<()> {
        tracing::info!(
            intent_id = %intent.id,
            order_id = %intent.order_id,
            payer_id = %intent.payer_id,
            "Payment rejected"
        );
        Ok(())
    }
}
