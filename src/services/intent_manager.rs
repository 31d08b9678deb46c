use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::db::{AttemptStore, OrderStore, PaymentStore};
use crate::error::{AppError, AppResult};
use crate::gateway::{GatewayClient, GatewayIntentRequest, GatewayMethod};
use crate::models::{
    AttemptRecord, CreatePaymentRequest, IntentProjection, MethodPayload, Order, PaymentIntent,
    PaymentMethodParams,
};
use crate::services::{NotificationDispatcher, Outcome, TransitionEngine, TransitionResult};

/// Orchestrates intent creation: precondition checks, dedup against an
/// existing pending intent, the outbound gateway call, persistence, audit
/// and the created notification.
pub struct IntentManager {
    intents: Arc<dyn PaymentStore>,
    orders: Arc<dyn OrderStore>,
    attempts: Arc<dyn AttemptStore>,
    gateway: Arc<dyn GatewayClient>,
    transition: Arc<TransitionEngine>,
    notifier: NotificationDispatcher,
}

impl IntentManager {
    pub fn new(
        intents: Arc<dyn PaymentStore>,
        orders: Arc<dyn OrderStore>,
        attempts: Arc<dyn AttemptStore>,
        gateway: Arc<dyn GatewayClient>,
        transition: Arc<TransitionEngine>,
        notifier: NotificationDispatcher,
    ) -> Self {
        Self {
            intents,
            orders,
            attempts,
            gateway,
            transition,
            notifier,
        }
    }

    pub async fn create_intent(
        &self,
        order_id: Uuid,
        request: &CreatePaymentRequest,
    ) -> AppResult<IntentProjection> {
        request
            .validate()
            .map_err(|e| AppError::Validation(format!("Invalid request: {}", e)))?;

        let order = self.load_payable_order(order_id, request).await?;

        // Idempotent short-circuit: a pending intent with a usable payload
        // is returned unchanged; anything else pending is stale debris from
        // a partially-failed attempt and gets replaced.
        if let Some(existing) = self.intents.find_pending_by_order(order.id).await? {
            if existing.method == request.params.method() && existing.has_usable_payload() {
                tracing::info!(
                    intent_id = %existing.id,
                    order_id = %order.id,
                    "Reusing pending intent with complete payload"
                );
                return Ok(existing.into());
            }

            tracing::info!(
                intent_id = %existing.id,
                order_id = %order.id,
                "Replacing stale pending intent"
            );
            self.intents.delete_stale_pending(existing.id).await?;
        }

        // Fresh per attempt; doubles as the idempotency key offered to the
        // gateway so a retried call cannot double-charge.
        let correlation_id = Uuid::new_v4();

        let intent = PaymentIntent::new(&order, request.payer_id, request.params.method());
        self.intents.insert(&intent).await?;

        let gateway_request = build_gateway_request(&order, &request.params, correlation_id);
        let request_payload = audit_request_payload(&gateway_request);

        match self.gateway.create_intent(&gateway_request).await {
            Ok(response) => {
                self.record_attempt(AttemptRecord::success(
                    &intent,
                    correlation_id,
                    request_payload,
                    response.raw.clone(),
                    response.http_status,
                ))
                .await;

                let payload = MethodPayload {
                    pix_qr_code: response.pix.as_ref().and_then(|p| p.qr_code.clone()),
                    pix_qr_code_base64: response
                        .pix
                        .as_ref()
                        .and_then(|p| p.qr_code_base64.clone()),
                    checkout_url: response.checkout_url.clone(),
                    complete: response.pix.as_ref().map(|p| p.complete).unwrap_or(true),
                };

                let intent = self
                    .intents
                    .attach_gateway_result(intent.id, &response.external_id, &payload)
                    .await?;

                self.notifier.payment_created(&intent);

                // Card charges settle inline; route the synchronous result
                // through the same transition as webhooks so a later
                // redundant delivery becomes a no-op.
                if let Some(outcome) = Outcome::from_gateway(&response.status) {
                    return match self.transition.apply(&intent, outcome).await? {
                        TransitionResult::Applied(settled) => Ok(settled.into()),
                        TransitionResult::AlreadySettled => {
                            let fresh = self
                                .intents
                                .find_by_id(intent.id)
                                .await?
                                .unwrap_or(intent);
                            Ok(fresh.into())
                        }
                    };
                }

                Ok(intent.into())
            }
            Err(error) => {
                // The failed attempt must still leave audit evidence; the
                // placeholder intent above is discoverable as stale by the
                // next dedup pass.
                self.record_attempt(AttemptRecord::failure(
                    &intent,
                    correlation_id,
                    request_payload,
                    error.to_string(),
                ))
                .await;

                Err(error)
            }
        }
    }

    /// Current intent projection for an order, newest first.
    pub async fn current_intent(&self, order_id: Uuid) -> AppResult<IntentProjection> {
        let intent = self
            .intents
            .latest_for_order(order_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("No payment intent for order {}", order_id))
            })?;

        Ok(intent.into())
    }

    async fn load_payable_order(
        &self,
        order_id: Uuid,
        request: &CreatePaymentRequest,
    ) -> AppResult<Order> {
        let order = self
            .orders
            .find_by_id(order_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Order {} not found", order_id)))?;

        if order.payer_id != request.payer_id {
            return Err(AppError::Unauthorized(
                "Order does not belong to this payer".to_string(),
            ));
        }

        if !order.status.permits_payment() {
            return Err(AppError::Validation(
                "Order is not awaiting payment".to_string(),
            ));
        }

        if order.amount_cents <= 0 {
            return Err(AppError::Validation("Order has no price".to_string()));
        }

        // The order price is the only authority; a client-supplied amount
        // that disagrees is a tampering attempt, not an input.
        if let Some(amount) = request.amount_cents {
            if amount != order.amount_cents {
                return Err(AppError::Validation(
                    "Amount does not match the order price".to_string(),
                ));
            }
        }

        Ok(order)
    }

    /// Audit appends are best-effort: a store failure here is logged and
    /// must never roll back or mask the payment operation itself.
    async fn record_attempt(&self, record: AttemptRecord) {
        if let Err(e) = self.attempts.append(&record).await {
            tracing::error!(
                intent_id = %record.intent_id,
                correlation_id = %record.correlation_id,
                "Failed to persist attempt record: {}",
                e
            );
        }
    }
}

fn build_gateway_request(
    order: &Order,
    params: &PaymentMethodParams,
    correlation_id: Uuid,
) -> GatewayIntentRequest {
    let method = match params {
        PaymentMethodParams::Pix => GatewayMethod::Pix,
        PaymentMethodParams::CreditCard {
            card_token,
            installments,
        } => GatewayMethod::Card {
            token: card_token.clone(),
            installments: *installments,
            debit: false,
        },
        PaymentMethodParams::DebitCard { card_token } => GatewayMethod::Card {
            token: card_token.clone(),
            installments: 1,
            debit: true,
        },
        PaymentMethodParams::CheckoutRedirect => GatewayMethod::CheckoutRedirect,
    };

    GatewayIntentRequest {
        amount_cents: order.amount_cents,
        description: order
            .description
            .clone()
            .unwrap_or_else(|| format!("Order {}", order.id)),
        payer_email: order.payer_email.clone(),
        order_ref: order.id,
        idempotency_key: correlation_id,
        method,
    }
}

/// Outbound payload as recorded in the audit log. Card tokens are
/// single-use but still excluded.
fn audit_request_payload(request: &GatewayIntentRequest) -> serde_json::Value {
    let method = match &request.method {
        GatewayMethod::Pix => json!({ "type": "pix" }),
        GatewayMethod::Card {
            installments,
            debit,
            ..
        } => json!({ "type": if *debit { "debit_card" } else { "credit_card" }, "installments": installments }),
        GatewayMethod::CheckoutRedirect => json!({ "type": "checkout_redirect" }),
    };

    json!({
        "amount_cents": request.amount_cents,
        "description": request.description,
        "external_reference": request.order_ref.to_string(),
        "idempotency_key": request.idempotency_key.to_string(),
        "method": method,
    })
}
