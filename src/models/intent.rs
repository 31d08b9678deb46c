use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::models::Order;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "payment_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Approved,
    Rejected,
}

impl PaymentStatus {
    /// Terminal statuses never transition again.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "payment_method", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Pix,
    CreditCard,
    DebitCard,
    CheckoutRedirect,
}

/// One attempt to collect money for one order. Not the same thing as a
/// completed payment: an order accumulates terminal intents across retries
/// but carries at most one `pending` intent at a time.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PaymentIntent {
    pub id: Uuid,
    pub order_id: Uuid,
    pub payer_id: Uuid,
    pub amount_cents: i64,
    pub method: PaymentMethod,
    /// Gateway's id for this intent; null until the create call returns,
    /// immutable once set.
    pub external_id: Option<String>,
    pub status: PaymentStatus,
    /// PIX copy-paste payment code.
    pub pix_qr_code: Option<String>,
    /// PIX QR image, base64 PNG as handed over by the gateway.
    pub pix_qr_code_base64: Option<String>,
    /// Hosted checkout page for redirect payments.
    pub checkout_url: Option<String>,
    /// Explicit completeness flag reported by the gateway adapter. A pending
    /// intent without it is stale and may be replaced on retry.
    pub payload_complete: bool,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentIntent {
    /// New `pending` intent priced from the order, before the gateway has
    /// been called. Until `attach_gateway_result` fills it in, this row is
    /// the failure-evidence placeholder the retry path cleans up.
    pub fn new(order: &Order, payer_id: Uuid, method: PaymentMethod) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            order_id: order.id,
            payer_id,
            amount_cents: order.amount_cents,
            method,
            external_id: None,
            status: PaymentStatus::Pending,
            pix_qr_code: None,
            pix_qr_code_base64: None,
            checkout_url: None,
            payload_complete: false,
            paid_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether a pending intent can be handed back to the client as-is
    /// instead of being replaced.
    pub fn has_usable_payload(&self) -> bool {
        match self.method {
            PaymentMethod::Pix => self.payload_complete && self.pix_qr_code.is_some(),
            PaymentMethod::CheckoutRedirect => self.checkout_url.is_some(),
            PaymentMethod::CreditCard | PaymentMethod::DebitCard => self.external_id.is_some(),
        }
    }
}

/// Method payload attached to an intent after a successful gateway call.
#[derive(Debug, Clone, Default)]
pub struct MethodPayload {
    pub pix_qr_code: Option<String>,
    pub pix_qr_code_base64: Option<String>,
    pub checkout_url: Option<String>,
    pub complete: bool,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreatePaymentRequest {
    pub payer_id: Uuid,
    /// Optional and advisory only: the server-side order price is always
    /// authoritative, and a disagreeing value is rejected outright.
    #[serde(default)]
    #[validate(range(min = 1, message = "Amount must be positive"))]
    pub amount_cents: Option<i64>,
    #[serde(flatten)]
    pub params: PaymentMethodParams,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum PaymentMethodParams {
    Pix,
    CreditCard {
        card_token: String,
        #[serde(default = "default_installments")]
        installments: u32,
    },
    DebitCard {
        card_token: String,
    },
    CheckoutRedirect,
}

fn default_installments() -> u32 {
    1
}

impl PaymentMethodParams {
    pub fn method(&self) -> PaymentMethod {
        match self {
            PaymentMethodParams::Pix => PaymentMethod::Pix,
            PaymentMethodParams::CreditCard { .. } => PaymentMethod::CreditCard,
            PaymentMethodParams::DebitCard { .. } => PaymentMethod::DebitCard,
            PaymentMethodParams::CheckoutRedirect => PaymentMethod::CheckoutRedirect,
        }
    }
}

/// Public projection of an intent. Never exposes the audit trail.
#[derive(Debug, Clone, Serialize)]
pub struct IntentProjection {
    pub intent_id: Uuid,
    pub order_id: Uuid,
    pub status: PaymentStatus,
    pub method: PaymentMethod,
    pub amount_cents: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pix_qr_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pix_qr_code_base64: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkout_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<PaymentIntent> for IntentProjection {
    fn from(intent: PaymentIntent) -> Self {
        Self {
            intent_id: intent.id,
            order_id: intent.order_id,
            status: intent.status,
            method: intent.method,
            amount_cents: intent.amount_cents,
            pix_qr_code: intent.pix_qr_code,
            pix_qr_code_base64: intent.pix_qr_code_base64,
            checkout_url: intent.checkout_url,
            paid_at: intent.paid_at,
            created_at: intent.created_at,
        }
    }
}
