pub mod http;
pub mod signature;

pub use http::HttpGatewayClient;
pub use signature::WebhookVerifier;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppResult;

/// Status vocabulary of the external provider. Anything outside the known
/// set is carried verbatim so reconciliation can log it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayPaymentStatus {
    Approved,
    Rejected,
    Cancelled,
    Pending,
    InProcess,
    Other(String),
}

impl GatewayPaymentStatus {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "approved" => GatewayPaymentStatus::Approved,
            "rejected" => GatewayPaymentStatus::Rejected,
            "cancelled" => GatewayPaymentStatus::Cancelled,
            "pending" => GatewayPaymentStatus::Pending,
            "in_process" => GatewayPaymentStatus::InProcess,
            other => GatewayPaymentStatus::Other(other.to_string()),
        }
    }
}

/// Method-specific instructions for the create call.
#[derive(Debug, Clone)]
pub enum GatewayMethod {
    Pix,
    Card {
        token: String,
        installments: u32,
        debit: bool,
    },
    CheckoutRedirect,
}

/// Outbound creation request. The amount is always the order's server-side
/// price; `order_ref` becomes the gateway's `external_reference` so webhooks
/// can be cross-referenced back to the order.
#[derive(Debug, Clone)]
pub struct GatewayIntentRequest {
    pub amount_cents: i64,
    pub description: String,
    pub payer_email: Option<String>,
    pub order_ref: Uuid,
    pub idempotency_key: Uuid,
    pub method: GatewayMethod,
}

/// PIX payload as handed over by the provider. `complete` is the adapter's
/// explicit judgement that the copy-paste code is usable, so callers never
/// have to infer completeness from payload length.
#[derive(Debug, Clone, Default)]
pub struct PixPayload {
    pub qr_code: Option<String>,
    pub qr_code_base64: Option<String>,
    pub complete: bool,
}

#[derive(Debug, Clone)]
pub struct GatewayIntentResponse {
    pub external_id: String,
    pub status: GatewayPaymentStatus,
    pub pix: Option<PixPayload>,
    pub checkout_url: Option<String>,
    pub raw: serde_json::Value,
    pub http_status: u16,
}

/// Authoritative view of one gateway payment, used both for status
/// reconciliation and for cross-reference recovery (`external_reference`
/// carries the local order id).
#[derive(Debug, Clone)]
pub struct GatewayPayment {
    pub external_id: String,
    pub status: GatewayPaymentStatus,
    pub external_reference: Option<String>,
    pub raw: serde_json::Value,
}

/// Narrow capability contract consumed by the core. The production adapter
/// wraps the provider's REST API; tests substitute a scripted double.
#[async_trait]
pub trait GatewayClient: Send + Sync {
    async fn create_intent(&self, request: &GatewayIntentRequest)
        -> AppResult<GatewayIntentResponse>;

    /// Fetch a payment by the gateway's id. Serves both status
    /// reconciliation and cross-reference recovery; the provider exposes a
    /// single endpoint for both.
    async fn fetch_payment(&self, external_id: &str) -> AppResult<GatewayPayment>;
}
