use std::sync::Arc;
use uuid::Uuid;

use crate::db::PaymentStore;
use crate::error::{AppError, AppResult};
use crate::gateway::{GatewayClient, GatewayPayment, WebhookVerifier};
use crate::gateway::signature::SignatureHeader;
use crate::models::{GatewayEvent, PaymentIntent};
use crate::services::{Outcome, TransitionEngine, TransitionResult};

/// How an inbound event was handled. Everything here is a 2xx from the
/// gateway's point of view; only authentication and transport problems
/// surface as errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookDisposition {
    /// Not a payment-status kind.
    Ignored,
    /// No local intent could be resolved, directly or by cross-reference.
    Unknown,
    /// The intent is already terminal; duplicate delivery.
    AlreadySettled,
    /// Gateway still reports a non-terminal status.
    StillPending,
    Applied,
}

/// Drives the state machine for pushed gateway events. Stateless between
/// calls except via the payment store.
pub struct WebhookProcessor {
    intents: Arc<dyn PaymentStore>,
    gateway: Arc<dyn GatewayClient>,
    transition: Arc<TransitionEngine>,
    verifier: WebhookVerifier,
}

impl WebhookProcessor {
    pub fn new(
        intents: Arc<dyn PaymentStore>,
        gateway: Arc<dyn GatewayClient>,
        transition: Arc<TransitionEngine>,
        verifier: WebhookVerifier,
    ) -> Self {
        Self {
            intents,
            gateway,
            transition,
            verifier,
        }
    }

    /// Authenticate an event before anything touches state. An event that
    /// fails here must be dropped, never applied.
    pub fn authenticate(
        &self,
        event: &GatewayEvent,
        request_id: Option<&str>,
        signature_header: Option<&str>,
    ) -> AppResult<()> {
        let raw = signature_header.ok_or_else(|| {
            AppError::WebhookVerification("missing signature header".to_string())
        })?;
        let signature = SignatureHeader::parse(raw).ok_or_else(|| {
            AppError::WebhookVerification("malformed signature header".to_string())
        })?;

        self.verifier
            .verify(event.payment_id().as_deref(), request_id, &signature)
    }

    /// Steps 3-6: resolve the intent, short-circuit terminal ones, fetch
    /// the authoritative status and apply it. The webhook body's own status
    /// field is never trusted; the event is only a trigger to re-check.
    pub async fn process(&self, event: &GatewayEvent) -> AppResult<WebhookDisposition> {
        if !event.is_payment_event() {
            return Ok(WebhookDisposition::Ignored);
        }

        let Some(external_id) = event.payment_id() else {
            tracing::warn!("Payment event without a payment id, ignoring");
            return Ok(WebhookDisposition::Ignored);
        };

        let mut fetched: Option<GatewayPayment> = None;

        let intent = match self.intents.find_by_external_id(&external_id).await? {
            Some(intent) => intent,
            None => match self.resolve_by_cross_reference(&external_id, &mut fetched).await? {
                Some(intent) => intent,
                None => return Ok(WebhookDisposition::Unknown),
            },
        };

        if intent.status.is_terminal() {
            return Ok(WebhookDisposition::AlreadySettled);
        }

        let payment = match fetched {
            Some(payment) => payment,
            None => self.gateway.fetch_payment(&external_id).await?,
        };

        match Outcome::from_gateway(&payment.status) {
            Some(outcome) => match self.transition.apply(&intent, outcome).await? {
                TransitionResult::Applied(_) => Ok(WebhookDisposition::Applied),
                TransitionResult::AlreadySettled => Ok(WebhookDisposition::AlreadySettled),
            },
            None => Ok(WebhookDisposition::StillPending),
        }
    }

    /// The external id is unknown locally when the webhook outruns the row
    /// update, or for payments created before external ids were persisted.
    /// The gateway's own record carries our order id as its
    /// `external_reference`; use it to locate the intent and backfill the
    /// external id so the next delivery resolves directly.
    async fn resolve_by_cross_reference(
        &self,
        external_id: &str,
        fetched: &mut Option<GatewayPayment>,
    ) -> AppResult<Option<PaymentIntent>> {
        let payment = self.gateway.fetch_payment(external_id).await?;

        let order_id = payment
            .external_reference
            .as_deref()
            .and_then(|r| Uuid::parse_str(r).ok());

        let Some(order_id) = order_id else {
            tracing::warn!(
                external_id = %external_id,
                "Gateway payment carries no usable cross-reference"
            );
            *fetched = Some(payment);
            return Ok(None);
        };

        let Some(mut intent) = self.intents.latest_for_order(order_id).await? else {
            tracing::warn!(
                external_id = %external_id,
                order_id = %order_id,
                "Cross-referenced order has no payment intent"
            );
            *fetched = Some(payment);
            return Ok(None);
        };

        if intent.external_id.is_none() {
            self.intents
                .attach_external_id(intent.id, external_id)
                .await?;
            intent.external_id = Some(external_id.to_string());
        }

        *fetched = Some(payment);
        Ok(Some(intent))
    }
}
