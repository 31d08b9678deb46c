use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::store::PaymentStore;
use crate::error::{AppError, AppResult};
use crate::models::{MethodPayload, PaymentIntent, PaymentStatus};

const INTENT_COLUMNS: &str = "id, order_id, payer_id, amount_cents, method, external_id, status, \
     pix_qr_code, pix_qr_code_base64, checkout_url, payload_complete, paid_at, created_at, updated_at";

#[derive(Clone)]
pub struct PgPaymentStore {
    pool: PgPool,
}

impl PgPaymentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PaymentStore for PgPaymentStore {
    async fn insert(&self, intent: &PaymentIntent) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO payment_intents (
                id, order_id, payer_id, amount_cents, method, external_id, status,
                pix_qr_code, pix_qr_code_base64, checkout_url, payload_complete,
                paid_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(intent.id)
        .bind(intent.order_id)
        .bind(intent.payer_id)
        .bind(intent.amount_cents)
        .bind(intent.method)
        .bind(&intent.external_id)
        .bind(intent.status)
        .bind(&intent.pix_qr_code)
        .bind(&intent.pix_qr_code_base64)
        .bind(&intent.checkout_url)
        .bind(intent.payload_complete)
        .bind(intent.paid_at)
        .bind(intent.created_at)
        .bind(intent.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<PaymentIntent>> {
        let intent = sqlx::query_as::<_, PaymentIntent>(&format!(
            "SELECT {} FROM payment_intents WHERE id = $1",
            INTENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(intent)
    }

    async fn find_by_external_id(&self, external_id: &str) -> AppResult<Option<PaymentIntent>> {
        let intent = sqlx::query_as::<_, PaymentIntent>(&format!(
            "SELECT {} FROM payment_intents WHERE external_id = $1",
            INTENT_COLUMNS
        ))
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(intent)
    }

    async fn find_pending_by_order(&self, order_id: Uuid) -> AppResult<Option<PaymentIntent>> {
        let intent = sqlx::query_as::<_, PaymentIntent>(&format!(
            "SELECT {} FROM payment_intents WHERE order_id = $1 AND status = 'pending' \
             ORDER BY created_at DESC LIMIT 1",
            INTENT_COLUMNS
        ))
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(intent)
    }

    async fn latest_for_order(&self, order_id: Uuid) -> AppResult<Option<PaymentIntent>> {
        let intent = sqlx::query_as::<_, PaymentIntent>(&format!(
            "SELECT {} FROM payment_intents WHERE order_id = $1 \
             ORDER BY created_at DESC LIMIT 1",
            INTENT_COLUMNS
        ))
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(intent)
    }

    async fn attach_gateway_result(
        &self,
        id: Uuid,
        external_id: &str,
        payload: &MethodPayload,
    ) -> AppResult<PaymentIntent> {
        let intent = sqlx::query_as::<_, PaymentIntent>(&format!(
            r#"
            UPDATE payment_intents
            SET external_id = COALESCE(external_id, $2),
                pix_qr_code = $3,
                pix_qr_code_base64 = $4,
                checkout_url = $5,
                payload_complete = $6,
                updated_at = $7
            WHERE id = $1
            RETURNING {}
            "#,
            INTENT_COLUMNS
        ))
        .bind(id)
        .bind(external_id)
        .bind(&payload.pix_qr_code)
        .bind(&payload.pix_qr_code_base64)
        .bind(&payload.checkout_url)
        .bind(payload.complete)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Payment intent {} not found", id)))?;

        Ok(intent)
    }

    async fn attach_external_id(&self, id: Uuid, external_id: &str) -> AppResult<()> {
        sqlx::query(
            "UPDATE payment_intents SET external_id = $2, updated_at = $3 \
             WHERE id = $1 AND external_id IS NULL",
        )
        .bind(id)
        .bind(external_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_stale_pending(&self, id: Uuid) -> AppResult<bool> {
        let result =
            sqlx::query("DELETE FROM payment_intents WHERE id = $1 AND status = 'pending'")
                .bind(id)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn settle(
        &self,
        id: Uuid,
        status: PaymentStatus,
        paid_at: Option<DateTime<Utc>>,
    ) -> AppResult<Option<PaymentIntent>> {
        // The WHERE clause is the replay guard: a loser racing against an
        // already-applied terminal outcome updates zero rows.
        let intent = sqlx::query_as::<_, PaymentIntent>(&format!(
            r#"
            UPDATE payment_intents
            SET status = $2, paid_at = $3, updated_at = $4
            WHERE id = $1 AND status = 'pending'
            RETURNING {}
            "#,
            INTENT_COLUMNS
        ))
        .bind(id)
        .bind(status)
        .bind(paid_at)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        Ok(intent)
    }
}
