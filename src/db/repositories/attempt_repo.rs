use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::store::AttemptStore;
use crate::error::AppResult;
use crate::models::AttemptRecord;

#[derive(Clone)]
pub struct PgAttemptStore {
    pool: PgPool,
}

impl PgAttemptStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AttemptStore for PgAttemptStore {
    async fn append(&self, record: &AttemptRecord) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO payment_attempts (
                id, intent_id, order_id, payer_id, correlation_id, method,
                amount_cents, request_payload, response_payload, http_status,
                success, error_message, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(record.id)
        .bind(record.intent_id)
        .bind(record.order_id)
        .bind(record.payer_id)
        .bind(record.correlation_id)
        .bind(record.method)
        .bind(record.amount_cents)
        .bind(&record.request_payload)
        .bind(&record.response_payload)
        .bind(record.http_status)
        .bind(record.success)
        .bind(&record.error_message)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_for_intent(&self, intent_id: Uuid) -> AppResult<Vec<AttemptRecord>> {
        let records = sqlx::query_as::<_, AttemptRecord>(
            "SELECT id, intent_id, order_id, payer_id, correlation_id, method, \
             amount_cents, request_payload, response_payload, http_status, \
             success, error_message, created_at \
             FROM payment_attempts WHERE intent_id = $1 ORDER BY created_at",
        )
        .bind(intent_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }
}
