use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::store::OrderStore;
use crate::error::AppResult;
use crate::models::Order;

#[derive(Clone)]
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(
            "SELECT id, payer_id, provider_id, payer_email, description, amount_cents, \
             status, created_at, updated_at \
             FROM orders WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(order)
    }

    async fn mark_paid(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE orders SET status = 'paid', updated_at = $2 \
             WHERE id = $1 AND status = 'awaiting_payment'",
        )
        .bind(id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
