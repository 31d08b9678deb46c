use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::Type, PartialEq)]
#[sqlx(type_name = "order_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    AwaitingPayment,
    Paid,
    Cancelled,
}

impl OrderStatus {
    pub fn permits_payment(&self) -> bool {
        matches!(self, OrderStatus::AwaitingPayment)
    }
}

/// The thing being paid for. Owned by another subsystem; the engine only
/// reads it and flips it to `paid` when an intent is approved.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub id: Uuid,
    pub payer_id: Uuid,
    /// Counterpart notified alongside the payer on approval.
    pub provider_id: Uuid,
    pub payer_email: Option<String>,
    pub description: Option<String>,
    pub amount_cents: i64,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
