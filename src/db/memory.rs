//! In-memory store implementations backing the test suite and local
//! development without Postgres. Conditional operations take the map lock
//! for their whole read-modify-write so they stay atomic, mirroring the
//! `WHERE status = 'pending'` guards of the SQL repositories.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::db::store::{AttemptStore, OrderStore, PaymentStore};
use crate::error::{AppError, AppResult};
use crate::models::{AttemptRecord, MethodPayload, Order, OrderStatus, PaymentIntent, PaymentStatus};

#[derive(Default)]
pub struct MemoryPaymentStore {
    rows: Mutex<HashMap<Uuid, PaymentIntent>>,
}

impl MemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentStore for MemoryPaymentStore {
    async fn insert(&self, intent: &PaymentIntent) -> AppResult<()> {
        let mut rows = self.rows.lock().unwrap();

        // Same invariant the partial unique index enforces in Postgres
        let pending_exists = rows.values().any(|i| {
            i.order_id == intent.order_id && i.status == PaymentStatus::Pending && i.id != intent.id
        });
        if intent.status == PaymentStatus::Pending && pending_exists {
            return Err(AppError::Internal(format!(
                "Order {} already has a pending intent",
                intent.order_id
            )));
        }

        rows.insert(intent.id, intent.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<PaymentIntent>> {
        Ok(self.rows.lock().unwrap().get(&id).cloned())
    }

    async fn find_by_external_id(&self, external_id: &str) -> AppResult<Option<PaymentIntent>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .find(|i| i.external_id.as_deref() == Some(external_id))
            .cloned())
    }

    async fn find_pending_by_order(&self, order_id: Uuid) -> AppResult<Option<PaymentIntent>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|i| i.order_id == order_id && i.status == PaymentStatus::Pending)
            .max_by_key(|i| i.created_at)
            .cloned())
    }

    async fn latest_for_order(&self, order_id: Uuid) -> AppResult<Option<PaymentIntent>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|i| i.order_id == order_id)
            .max_by_key(|i| i.created_at)
            .cloned())
    }

    async fn attach_gateway_result(
        &self,
        id: Uuid,
        external_id: &str,
        payload: &MethodPayload,
    ) -> AppResult<PaymentIntent> {
        let mut rows = self.rows.lock().unwrap();
        let intent = rows
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Payment intent {} not found", id)))?;

        if intent.external_id.is_none() {
            intent.external_id = Some(external_id.to_string());
        }
        intent.pix_qr_code = payload.pix_qr_code.clone();
        intent.pix_qr_code_base64 = payload.pix_qr_code_base64.clone();
        intent.checkout_url = payload.checkout_url.clone();
        intent.payload_complete = payload.complete;
        intent.updated_at = Utc::now();

        Ok(intent.clone())
    }

    async fn attach_external_id(&self, id: Uuid, external_id: &str) -> AppResult<()> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(intent) = rows.get_mut(&id) {
            if intent.external_id.is_none() {
                intent.external_id = Some(external_id.to_string());
                intent.updated_at = Utc::now();
            }
        }
        Ok(())
    }

    async fn delete_stale_pending(&self, id: Uuid) -> AppResult<bool> {
        let mut rows = self.rows.lock().unwrap();
        match rows.get(&id) {
            Some(intent) if intent.status == PaymentStatus::Pending => {
                rows.remove(&id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn settle(
        &self,
        id: Uuid,
        status: PaymentStatus,
        paid_at: Option<DateTime<Utc>>,
    ) -> AppResult<Option<PaymentIntent>> {
        let mut rows = self.rows.lock().unwrap();
        match rows.get_mut(&id) {
            Some(intent) if intent.status == PaymentStatus::Pending => {
                intent.status = status;
                intent.paid_at = paid_at;
                intent.updated_at = Utc::now();
                Ok(Some(intent.clone()))
            }
            _ => Ok(None),
        }
    }
}

#[derive(Default)]
pub struct MemoryOrderStore {
    rows: Mutex<HashMap<Uuid, Order>>,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, order: Order) {
        self.rows.lock().unwrap().insert(order.id, order);
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Order>> {
        Ok(self.rows.lock().unwrap().get(&id).cloned())
    }

    async fn mark_paid(&self, id: Uuid) -> AppResult<bool> {
        let mut rows = self.rows.lock().unwrap();
        match rows.get_mut(&id) {
            Some(order) if order.status == OrderStatus::AwaitingPayment => {
                order.status = OrderStatus::Paid;
                order.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[derive(Default)]
pub struct MemoryAttemptStore {
    rows: Mutex<Vec<AttemptRecord>>,
}

impl MemoryAttemptStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl AttemptStore for MemoryAttemptStore {
    async fn append(&self, record: &AttemptRecord) -> AppResult<()> {
        self.rows.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn list_for_intent(&self, intent_id: Uuid) -> AppResult<Vec<AttemptRecord>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.intent_id == intent_id)
            .cloned()
            .collect())
    }
}
