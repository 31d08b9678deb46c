//! End-to-end lifecycle scenarios over the in-memory stores, a scripted
//! gateway double and a recording notifier.

use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

use payment_intents::db::memory::{MemoryAttemptStore, MemoryOrderStore, MemoryPaymentStore};
use payment_intents::db::{AttemptStore, OrderStore, PaymentStore};
use payment_intents::error::{AppError, AppResult};
use payment_intents::gateway::{
    GatewayClient, GatewayIntentRequest, GatewayIntentResponse, GatewayPayment,
    GatewayPaymentStatus, PixPayload, WebhookVerifier,
};
use payment_intents::models::{
    CreatePaymentRequest, GatewayEvent, Order, OrderStatus, PaymentIntent, PaymentMethod,
    PaymentMethodParams, PaymentStatus,
};
use payment_intents::services::{
    IntentManager, NotificationDispatcher, Notifier, ReconciliationSync, TransitionEngine,
    WebhookDisposition, WebhookProcessor,
};

const SECRET: &str = "it-is-a-shared-secret";

enum ScriptedCreate {
    Respond(GatewayIntentResponse),
    Timeout,
}

#[derive(Default)]
struct MockGateway {
    create_script: Mutex<VecDeque<ScriptedCreate>>,
    payments: Mutex<HashMap<String, GatewayPayment>>,
    create_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
}

impl MockGateway {
    fn script_create(&self, step: ScriptedCreate) {
        self.create_script.lock().unwrap().push_back(step);
    }

    fn set_payment(&self, external_id: &str, status: GatewayPaymentStatus, order_ref: Option<Uuid>) {
        self.payments.lock().unwrap().insert(
            external_id.to_string(),
            GatewayPayment {
                external_id: external_id.to_string(),
                status,
                external_reference: order_ref.map(|id| id.to_string()),
                raw: json!({"id": external_id}),
            },
        );
    }
}

#[async_trait]
impl GatewayClient for MockGateway {
    async fn create_intent(
        &self,
        _request: &GatewayIntentRequest,
    ) -> AppResult<GatewayIntentResponse> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        match self.create_script.lock().unwrap().pop_front() {
            Some(ScriptedCreate::Respond(response)) => Ok(response),
            Some(ScriptedCreate::Timeout) => Err(AppError::GatewayTimeout),
            None => panic!("unscripted gateway create call"),
        }
    }

    async fn fetch_payment(&self, external_id: &str) -> AppResult<GatewayPayment> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.payments
            .lock()
            .unwrap()
            .get(external_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Gateway payment {} not found", external_id)))
    }
}

#[derive(Default)]
struct RecordingNotifier {
    created: AtomicUsize,
    approved: AtomicUsize,
    rejected: AtomicUsize,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn payment_created(&self, _intent: &PaymentIntent) -> AppResult<()> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn payment_approved(&self, _intent: &PaymentIntent, _order: &Order) -> AppResult<()> {
        self.approved.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn payment_rejected(&self, _intent: &PaymentIntent) -> AppResult<()> {
        self.rejected.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct TestEnv {
    intents: Arc<MemoryPaymentStore>,
    orders: Arc<MemoryOrderStore>,
    attempts: Arc<MemoryAttemptStore>,
    gateway: Arc<MockGateway>,
    notifier: Arc<RecordingNotifier>,
    manager: IntentManager,
    processor: WebhookProcessor,
    reconciliation: ReconciliationSync,
}

fn env() -> TestEnv {
    let intents = Arc::new(MemoryPaymentStore::new());
    let orders = Arc::new(MemoryOrderStore::new());
    let attempts = Arc::new(MemoryAttemptStore::new());
    let gateway = Arc::new(MockGateway::default());
    let notifier = Arc::new(RecordingNotifier::default());

    let dispatcher = NotificationDispatcher::new(notifier.clone());
    let transition = Arc::new(TransitionEngine::new(
        intents.clone() as Arc<dyn PaymentStore>,
        orders.clone() as Arc<dyn OrderStore>,
        dispatcher.clone(),
    ));

    let manager = IntentManager::new(
        intents.clone(),
        orders.clone(),
        attempts.clone() as Arc<dyn AttemptStore>,
        gateway.clone() as Arc<dyn GatewayClient>,
        transition.clone(),
        dispatcher,
    );
    let processor = WebhookProcessor::new(
        intents.clone(),
        gateway.clone(),
        transition.clone(),
        WebhookVerifier::new(SECRET),
    );
    let reconciliation =
        ReconciliationSync::new(intents.clone(), gateway.clone(), transition);

    TestEnv {
        intents,
        orders,
        attempts,
        gateway,
        notifier,
        manager,
        processor,
        reconciliation,
    }
}

fn order(amount_cents: i64) -> Order {
    let now = Utc::now();
    Order {
        id: Uuid::new_v4(),
        payer_id: Uuid::new_v4(),
        provider_id: Uuid::new_v4(),
        payer_email: Some("payer@example.com".to_string()),
        description: Some("Medical consultation".to_string()),
        amount_cents,
        status: OrderStatus::AwaitingPayment,
        created_at: now,
        updated_at: now,
    }
}

fn pix_request(payer_id: Uuid) -> CreatePaymentRequest {
    CreatePaymentRequest {
        payer_id,
        amount_cents: None,
        params: PaymentMethodParams::Pix,
    }
}

fn pix_response(external_id: &str, complete: bool) -> GatewayIntentResponse {
    GatewayIntentResponse {
        external_id: external_id.to_string(),
        status: GatewayPaymentStatus::Pending,
        pix: Some(PixPayload {
            qr_code: complete.then(|| "00020126580014br.gov.bcb.pix0136chave-pix".to_string()),
            qr_code_base64: complete.then(|| "aVZCT1J3MEtHZ29B".to_string()),
            complete,
        }),
        checkout_url: None,
        raw: json!({"id": external_id, "status": "pending"}),
        http_status: 201,
    }
}

fn card_response(external_id: &str, status: GatewayPaymentStatus) -> GatewayIntentResponse {
    let status_str = match &status {
        GatewayPaymentStatus::Approved => "approved",
        GatewayPaymentStatus::Rejected => "rejected",
        _ => "pending",
    };
    GatewayIntentResponse {
        external_id: external_id.to_string(),
        status,
        pix: None,
        checkout_url: None,
        raw: json!({"id": external_id, "status": status_str}),
        http_status: 201,
    }
}

fn signed_event(external_id: &str) -> (GatewayEvent, String) {
    let event: GatewayEvent = serde_json::from_value(json!({
        "action": "payment.updated",
        "data": { "id": external_id }
    }))
    .unwrap();

    let ts = "1704908010";
    let manifest = format!("id:{};ts:{};", external_id.to_lowercase(), ts);
    let mut mac = Hmac::<Sha256>::new_from_slice(SECRET.as_bytes()).unwrap();
    mac.update(manifest.as_bytes());
    let v1 = hex::encode(mac.finalize().into_bytes());

    (event, format!("ts={},v1={}", ts, v1))
}

async fn settle_spawned_notifications() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

// Scenario 1: PIX creation is idempotent while a complete payload exists.
#[tokio::test]
async fn pix_creation_is_idempotent() {
    let env = env();
    let order = order(4990);
    let payer_id = order.payer_id;
    env.orders.insert(order.clone());

    env.gateway
        .script_create(ScriptedCreate::Respond(pix_response("gw-1", true)));

    let first = env
        .manager
        .create_intent(order.id, &pix_request(payer_id))
        .await
        .unwrap();

    assert_eq!(first.status, PaymentStatus::Pending);
    assert_eq!(first.amount_cents, 4990);
    assert!(first.pix_qr_code.is_some());

    let attempts = env.attempts.list_for_intent(first.intent_id).await.unwrap();
    assert_eq!(attempts.len(), 1);
    assert!(attempts[0].success);

    // Second call returns the same intent without touching the gateway
    let second = env
        .manager
        .create_intent(order.id, &pix_request(payer_id))
        .await
        .unwrap();

    assert_eq!(second.intent_id, first.intent_id);
    assert_eq!(env.gateway.create_calls.load(Ordering::SeqCst), 1);
}

// Scenario 2: a timed-out create still leaves audit evidence, and the
// stale placeholder is replaced on retry rather than accumulating.
#[tokio::test]
async fn gateway_timeout_leaves_failure_attempt_and_no_live_intent() {
    let env = env();
    let order = order(4990);
    let payer_id = order.payer_id;
    env.orders.insert(order.clone());

    env.gateway.script_create(ScriptedCreate::Timeout);

    let error = env
        .manager
        .create_intent(order.id, &pix_request(payer_id))
        .await
        .unwrap_err();
    assert!(matches!(error, AppError::GatewayTimeout));

    // Failure attempt recorded against the placeholder intent
    let placeholder = env
        .intents
        .latest_for_order(order.id)
        .await
        .unwrap()
        .unwrap();
    assert!(!placeholder.has_usable_payload());
    let attempts = env
        .attempts
        .list_for_intent(placeholder.id)
        .await
        .unwrap();
    assert_eq!(attempts.len(), 1);
    assert!(!attempts[0].success);
    assert!(attempts[0].error_message.is_some());

    // Retry replaces the stale placeholder; exactly one live intent remains
    env.gateway
        .script_create(ScriptedCreate::Respond(pix_response("gw-2", true)));

    let retried = env
        .manager
        .create_intent(order.id, &pix_request(payer_id))
        .await
        .unwrap();

    assert_ne!(retried.intent_id, placeholder.id);
    assert!(env
        .intents
        .find_by_id(placeholder.id)
        .await
        .unwrap()
        .is_none());
    let pending = env
        .intents
        .find_pending_by_order(order.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(pending.id, retried.intent_id);
    assert!(pending.has_usable_payload());
}

// Scenario 3 + 4: an authenticated approval webhook settles the intent and
// cascades to the order exactly once; redelivery is a no-op.
#[tokio::test]
async fn approval_webhook_applies_once() {
    let env = env();
    let order = order(4990);
    let payer_id = order.payer_id;
    let order_id = order.id;
    env.orders.insert(order.clone());

    env.gateway
        .script_create(ScriptedCreate::Respond(pix_response("gw-1", true)));
    let created = env
        .manager
        .create_intent(order_id, &pix_request(payer_id))
        .await
        .unwrap();

    env.gateway
        .set_payment("gw-1", GatewayPaymentStatus::Approved, Some(order_id));

    let (event, signature) = signed_event("gw-1");
    env.processor
        .authenticate(&event, None, Some(&signature))
        .unwrap();

    let disposition = env.processor.process(&event).await.unwrap();
    assert_eq!(disposition, WebhookDisposition::Applied);

    let settled = env
        .intents
        .find_by_id(created.intent_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(settled.status, PaymentStatus::Approved);
    assert!(settled.paid_at.is_some());

    let order = env.orders.find_by_id(order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Paid);

    // Duplicate delivery: safe no-op, no second notification
    let replay = env.processor.process(&event).await.unwrap();
    assert_eq!(replay, WebhookDisposition::AlreadySettled);

    settle_spawned_notifications().await;
    assert_eq!(env.notifier.approved.load(Ordering::SeqCst), 1);
}

// Signature rejection: a forged event never mutates state.
#[tokio::test]
async fn forged_webhook_never_mutates_state() {
    let env = env();
    let order = order(4990);
    let payer_id = order.payer_id;
    let order_id = order.id;
    env.orders.insert(order.clone());

    env.gateway
        .script_create(ScriptedCreate::Respond(pix_response("gw-1", true)));
    let created = env
        .manager
        .create_intent(order_id, &pix_request(payer_id))
        .await
        .unwrap();

    env.gateway
        .set_payment("gw-1", GatewayPaymentStatus::Approved, Some(order_id));

    let (event, _) = signed_event("gw-1");
    let forged = "ts=1704908010,v1=0000000000000000000000000000000000000000000000000000000000000000";

    assert!(env
        .processor
        .authenticate(&event, None, Some(forged))
        .is_err());
    assert!(env.processor.authenticate(&event, None, None).is_err());

    // The event was dropped before processing; nothing changed
    let intent = env
        .intents
        .find_by_id(created.intent_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(intent.status, PaymentStatus::Pending);
    let order = env.orders.find_by_id(order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::AwaitingPayment);
}

// Cross-reference recovery: a webhook for an external id we never stored
// resolves through the gateway's external_reference, then backfills the id
// so the next delivery resolves directly.
#[tokio::test]
async fn webhook_resolves_via_cross_reference_and_backfills() {
    let env = env();
    let order = order(4990);
    let order_id = order.id;
    env.orders.insert(order.clone());

    // Intent whose create call never reported an external id
    let intent = PaymentIntent::new(&order, order.payer_id, PaymentMethod::Pix);
    env.intents.insert(&intent).await.unwrap();

    env.gateway
        .set_payment("gw-77", GatewayPaymentStatus::Approved, Some(order_id));

    let (event, signature) = signed_event("gw-77");
    env.processor
        .authenticate(&event, None, Some(&signature))
        .unwrap();

    let disposition = env.processor.process(&event).await.unwrap();
    assert_eq!(disposition, WebhookDisposition::Applied);

    let settled = env.intents.find_by_id(intent.id).await.unwrap().unwrap();
    assert_eq!(settled.external_id.as_deref(), Some("gw-77"));
    assert_eq!(settled.status, PaymentStatus::Approved);

    // One fetch resolved the cross-reference and doubled as the
    // authoritative status read
    assert_eq!(env.gateway.fetch_calls.load(Ordering::SeqCst), 1);

    // Redelivery now resolves directly by external id
    let replay = env.processor.process(&event).await.unwrap();
    assert_eq!(replay, WebhookDisposition::AlreadySettled);
}

// Scenario 5: reconciliation settles a rejected payment when the webhook
// never arrived.
#[tokio::test]
async fn reconciliation_applies_rejection() {
    let env = env();
    let order = order(4990);
    let payer_id = order.payer_id;
    let order_id = order.id;
    env.orders.insert(order.clone());

    env.gateway
        .script_create(ScriptedCreate::Respond(pix_response("gw-1", true)));
    env.manager
        .create_intent(order_id, &pix_request(payer_id))
        .await
        .unwrap();

    env.gateway
        .set_payment("gw-1", GatewayPaymentStatus::Rejected, Some(order_id));

    let projection = env.reconciliation.sync_status(order_id).await.unwrap();
    assert_eq!(projection.status, PaymentStatus::Rejected);
    assert!(projection.paid_at.is_none());

    let order = env.orders.find_by_id(order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::AwaitingPayment);

    // Idempotent re-sync
    let again = env.reconciliation.sync_status(order_id).await.unwrap();
    assert_eq!(again.status, PaymentStatus::Rejected);

    settle_spawned_notifications().await;
    assert_eq!(env.notifier.rejected.load(Ordering::SeqCst), 1);
}

// Scenario 6: card charges settle synchronously inside the create call.
#[tokio::test]
async fn card_payment_settles_synchronously() {
    let env = env();
    let order = order(12000);
    let payer_id = order.payer_id;
    let order_id = order.id;
    env.orders.insert(order.clone());

    env.gateway.script_create(ScriptedCreate::Respond(card_response(
        "gw-card-1",
        GatewayPaymentStatus::Approved,
    )));

    let request = CreatePaymentRequest {
        payer_id,
        amount_cents: None,
        params: PaymentMethodParams::CreditCard {
            card_token: "tok_abc123".to_string(),
            installments: 3,
        },
    };

    let projection = env.manager.create_intent(order_id, &request).await.unwrap();

    assert_eq!(projection.status, PaymentStatus::Approved);
    assert!(projection.paid_at.is_some());

    let order = env.orders.find_by_id(order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Paid);

    // A redundant webhook for the same outcome is already a no-op
    env.gateway
        .set_payment("gw-card-1", GatewayPaymentStatus::Approved, Some(order_id));
    let (event, _) = signed_event("gw-card-1");
    let disposition = env.processor.process(&event).await.unwrap();
    assert_eq!(disposition, WebhookDisposition::AlreadySettled);

    settle_spawned_notifications().await;
    assert_eq!(env.notifier.approved.load(Ordering::SeqCst), 1);
}

// Price integrity: the client can never set the price.
#[tokio::test]
async fn client_supplied_amount_cannot_override_order_price() {
    let env = env();
    let order = order(4990);
    let payer_id = order.payer_id;
    env.orders.insert(order.clone());

    let mut request = pix_request(payer_id);
    request.amount_cents = Some(1);

    let error = env.manager.create_intent(order.id, &request).await.unwrap_err();
    assert!(matches!(error, AppError::Validation(_)));
    assert_eq!(env.gateway.create_calls.load(Ordering::SeqCst), 0);

    // Matching amount is accepted, and the persisted intent is priced from
    // the order either way
    env.gateway
        .script_create(ScriptedCreate::Respond(pix_response("gw-1", true)));
    request.amount_cents = Some(4990);
    let projection = env.manager.create_intent(order.id, &request).await.unwrap();
    assert_eq!(projection.amount_cents, 4990);
}

// Precondition failures reject locally before any gateway call.
#[tokio::test]
async fn preconditions_are_checked_before_the_gateway() {
    let env = env();
    let order = order(4990);
    let payer_id = order.payer_id;
    env.orders.insert(order.clone());

    // Unknown order
    let error = env
        .manager
        .create_intent(Uuid::new_v4(), &pix_request(payer_id))
        .await
        .unwrap_err();
    assert!(matches!(error, AppError::NotFound(_)));

    // Wrong payer
    let error = env
        .manager
        .create_intent(order.id, &pix_request(Uuid::new_v4()))
        .await
        .unwrap_err();
    assert!(matches!(error, AppError::Unauthorized(_)));

    // Paid orders are no longer payable
    env.orders.mark_paid(order.id).await.unwrap();
    let error = env
        .manager
        .create_intent(order.id, &pix_request(payer_id))
        .await
        .unwrap_err();
    assert!(matches!(error, AppError::Validation(_)));

    assert_eq!(env.gateway.create_calls.load(Ordering::SeqCst), 0);
    assert!(env.attempts.is_empty());
}

// A stale pending PIX intent with an incomplete payload is replaced, not
// returned, so retries never hand out unusable codes.
#[tokio::test]
async fn incomplete_pix_payload_is_treated_as_stale() {
    let env = env();
    let order = order(4990);
    let payer_id = order.payer_id;
    env.orders.insert(order.clone());

    env.gateway
        .script_create(ScriptedCreate::Respond(pix_response("gw-1", false)));
    let first = env
        .manager
        .create_intent(order.id, &pix_request(payer_id))
        .await
        .unwrap();
    assert!(first.pix_qr_code.is_none());

    env.gateway
        .script_create(ScriptedCreate::Respond(pix_response("gw-2", true)));
    let second = env
        .manager
        .create_intent(order.id, &pix_request(payer_id))
        .await
        .unwrap();

    assert_ne!(second.intent_id, first.intent_id);
    assert!(second.pix_qr_code.is_some());
    assert_eq!(env.gateway.create_calls.load(Ordering::SeqCst), 2);
}

// Monotonicity under interleaving: reconciliation racing a webhook yields
// one applied transition; conflicting late outcomes never overwrite.
#[tokio::test]
async fn concurrent_sync_and_webhook_converge() {
    let env = env();
    let order = order(4990);
    let payer_id = order.payer_id;
    let order_id = order.id;
    env.orders.insert(order.clone());

    env.gateway
        .script_create(ScriptedCreate::Respond(pix_response("gw-1", true)));
    let created = env
        .manager
        .create_intent(order_id, &pix_request(payer_id))
        .await
        .unwrap();

    env.gateway
        .set_payment("gw-1", GatewayPaymentStatus::Approved, Some(order_id));

    let (event, _) = signed_event("gw-1");
    let (webhook_result, sync_result) = tokio::join!(
        env.processor.process(&event),
        env.reconciliation.sync_status(order_id),
    );

    webhook_result.unwrap();
    assert_eq!(sync_result.unwrap().status, PaymentStatus::Approved);

    let settled = env
        .intents
        .find_by_id(created.intent_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(settled.status, PaymentStatus::Approved);

    settle_spawned_notifications().await;
    assert_eq!(env.notifier.approved.load(Ordering::SeqCst), 1);
}

// Non-payment events are filtered before anything else.
#[tokio::test]
async fn non_payment_events_are_ignored() {
    let env = env();

    let event: GatewayEvent = serde_json::from_value(json!({
        "topic": "merchant_order",
        "id": "order-55"
    }))
    .unwrap();

    let disposition = env.processor.process(&event).await.unwrap();
    assert_eq!(disposition, WebhookDisposition::Ignored);
    assert_eq!(env.gateway.fetch_calls.load(Ordering::SeqCst), 0);
}

// A webhook for an external id the gateway cannot cross-reference is a
// recognized no-op, not an error.
#[tokio::test]
async fn unknown_external_id_without_cross_reference_is_unknown() {
    let env = env();
    env.gateway
        .set_payment("gw-x", GatewayPaymentStatus::Approved, None);

    let (event, _) = signed_event("gw-x");
    let disposition = env.processor.process(&event).await.unwrap();
    assert_eq!(disposition, WebhookDisposition::Unknown);
}

// An event whose authoritative status is still pending changes nothing.
#[tokio::test]
async fn pending_gateway_status_leaves_intent_untouched() {
    let env = env();
    let order = order(4990);
    let payer_id = order.payer_id;
    let order_id = order.id;
    env.orders.insert(order.clone());

    env.gateway
        .script_create(ScriptedCreate::Respond(pix_response("gw-1", true)));
    let created = env
        .manager
        .create_intent(order_id, &pix_request(payer_id))
        .await
        .unwrap();

    env.gateway
        .set_payment("gw-1", GatewayPaymentStatus::InProcess, Some(order_id));

    let (event, _) = signed_event("gw-1");
    let disposition = env.processor.process(&event).await.unwrap();
    assert_eq!(disposition, WebhookDisposition::StillPending);

    let intent = env
        .intents
        .find_by_id(created.intent_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(intent.status, PaymentStatus::Pending);
}
