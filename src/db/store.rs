use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{AttemptRecord, MethodPayload, Order, PaymentIntent, PaymentStatus};

/// Durable record of payment intents. The conditional operations are the
/// serialization points the transition engine relies on: `settle` and
/// `delete_stale_pending` only act while the row is still `pending`.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn insert(&self, intent: &PaymentIntent) -> AppResult<()>;

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<PaymentIntent>>;

    async fn find_by_external_id(&self, external_id: &str) -> AppResult<Option<PaymentIntent>>;

    async fn find_pending_by_order(&self, order_id: Uuid) -> AppResult<Option<PaymentIntent>>;

    /// Most recent intent for an order regardless of status.
    async fn latest_for_order(&self, order_id: Uuid) -> AppResult<Option<PaymentIntent>>;

    /// Fill in the gateway's id and method payload after a successful create
    /// call. The external id is written exactly once.
    async fn attach_gateway_result(
        &self,
        id: Uuid,
        external_id: &str,
        payload: &MethodPayload,
    ) -> AppResult<PaymentIntent>;

    /// Backfill an external id learned through cross-reference recovery.
    /// A no-op when the intent already carries one.
    async fn attach_external_id(&self, id: Uuid, external_id: &str) -> AppResult<()>;

    /// Remove a stale pending intent so a retry can replace it. Returns
    /// false when the intent settled in the meantime, in which case nothing
    /// is deleted.
    async fn delete_stale_pending(&self, id: Uuid) -> AppResult<bool>;

    /// Conditional terminal write: `UPDATE ... WHERE status = 'pending'`.
    /// Returns `None` when the intent is no longer pending, making replays
    /// and concurrent losers structural no-ops.
    async fn settle(
        &self,
        id: Uuid,
        status: PaymentStatus,
        paid_at: Option<DateTime<Utc>>,
    ) -> AppResult<Option<PaymentIntent>>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Order>>;

    /// Conditional cascade: flips the order to `paid` only while it is still
    /// awaiting payment. Returns false when another caller got there first.
    async fn mark_paid(&self, id: Uuid) -> AppResult<bool>;
}

/// Append-only audit log of outbound gateway calls.
#[async_trait]
pub trait AttemptStore: Send + Sync {
    async fn append(&self, record: &AttemptRecord) -> AppResult<()>;

    async fn list_for_intent(&self, intent_id: Uuid) -> AppResult<Vec<AttemptRecord>>;
}
