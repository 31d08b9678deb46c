use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::json;

use crate::config::GatewayConfig;
use crate::error::{AppError, AppResult};
use crate::gateway::{
    GatewayClient, GatewayIntentRequest, GatewayIntentResponse, GatewayMethod, GatewayPayment,
    GatewayPaymentStatus, PixPayload,
};

/// REST adapter over the payment provider. Stateless and safe to call
/// concurrently; every call carries the configured deadline.
#[derive(Clone)]
pub struct HttpGatewayClient {
    http_client: Client,
    base_url: String,
    access_token: String,
}

impl HttpGatewayClient {
    pub fn new(config: &GatewayConfig) -> AppResult<Self> {
        let http_client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            access_token: config.access_token.clone(),
        })
    }

    fn create_body(request: &GatewayIntentRequest) -> serde_json::Value {
        let mut body = json!({
            "transaction_amount": request.amount_cents as f64 / 100.0,
            "description": request.description,
            "external_reference": request.order_ref.to_string(),
        });

        if let Some(email) = &request.payer_email {
            body["payer"] = json!({ "email": email });
        }

        match &request.method {
            GatewayMethod::Pix => {
                body["payment_method_id"] = json!("pix");
            }
            GatewayMethod::Card {
                token,
                installments,
                debit,
            } => {
                body["token"] = json!(token);
                body["installments"] = json!(installments);
                if *debit {
                    body["payment_type_id"] = json!("debit_card");
                }
            }
            GatewayMethod::CheckoutRedirect => {}
        }

        body
    }

    fn preference_body(request: &GatewayIntentRequest) -> serde_json::Value {
        let mut body = json!({
            "items": [{
                "title": request.description,
                "quantity": 1,
                "unit_price": request.amount_cents as f64 / 100.0,
            }],
            "external_reference": request.order_ref.to_string(),
        });

        if let Some(email) = &request.payer_email {
            body["payer"] = json!({ "email": email });
        }

        body
    }

    async fn post(
        &self,
        endpoint: &str,
        body: &serde_json::Value,
        idempotency_key: &str,
    ) -> AppResult<(serde_json::Value, u16)> {
        let url = format!("{}{}", self.base_url, endpoint);

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.access_token)
            .header("X-Idempotency-Key", idempotency_key)
            .json(body)
            .send()
            .await
            .map_err(map_transport_error)?;

        self.handle_response(response).await
    }

    async fn get(&self, endpoint: &str) -> AppResult<(serde_json::Value, u16)> {
        let url = format!("{}{}", self.base_url, endpoint);

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(map_transport_error)?;

        self.handle_response(response).await
    }

    async fn handle_response(
        &self,
        response: reqwest::Response,
    ) -> AppResult<(serde_json::Value, u16)> {
        let status = response.status();
        let body = response.text().await.map_err(map_transport_error)?;

        if status.is_success() {
            let value = serde_json::from_str(&body).map_err(|e| {
                tracing::error!("Failed to parse gateway response: {} - Body: {}", e, body);
                AppError::Gateway(format!("Failed to parse response: {}", e))
            })?;
            return Ok((value, status.as_u16()));
        }

        tracing::error!("Gateway API error: {} - {}", status, body);

        let error_msg = match status {
            StatusCode::BAD_REQUEST => serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
                .unwrap_or_else(|| "Bad request".to_string()),
            StatusCode::UNAUTHORIZED => "Invalid API credentials".to_string(),
            StatusCode::NOT_FOUND => {
                return Err(AppError::NotFound("Gateway payment not found".to_string()))
            }
            StatusCode::TOO_MANY_REQUESTS => "Rate limit exceeded".to_string(),
            _ => format!("API error: {}", status),
        };

        Err(AppError::Gateway(error_msg))
    }
}

fn map_transport_error(error: reqwest::Error) -> AppError {
    if error.is_timeout() {
        AppError::GatewayTimeout
    } else {
        AppError::HttpClient(error)
    }
}

fn parse_payment(raw: &serde_json::Value) -> AppResult<(String, GatewayPaymentStatus)> {
    let external_id = raw
        .get("id")
        .map(|id| match id {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .ok_or_else(|| AppError::Gateway("Response is missing payment id".to_string()))?;

    let status = raw
        .get("status")
        .and_then(|s| s.as_str())
        .map(GatewayPaymentStatus::parse)
        .unwrap_or(GatewayPaymentStatus::Pending);

    Ok((external_id, status))
}

fn parse_pix_payload(raw: &serde_json::Value) -> PixPayload {
    let transaction_data = raw
        .pointer("/point_of_interaction/transaction_data")
        .cloned()
        .unwrap_or_default();

    let qr_code = transaction_data
        .get("qr_code")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(String::from);
    let qr_code_base64 = transaction_data
        .get("qr_code_base64")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(String::from);

    // The adapter owns the completeness judgement: a PIX payload is usable
    // once the copy-paste code is present.
    let complete = qr_code.is_some();

    PixPayload {
        qr_code,
        qr_code_base64,
        complete,
    }
}

#[async_trait]
impl GatewayClient for HttpGatewayClient {
    async fn create_intent(
        &self,
        request: &GatewayIntentRequest,
    ) -> AppResult<GatewayIntentResponse> {
        let idempotency_key = request.idempotency_key.to_string();

        match &request.method {
            GatewayMethod::Pix | GatewayMethod::Card { .. } => {
                let body = Self::create_body(request);
                let (raw, http_status) =
                    self.post("/v1/payments", &body, &idempotency_key).await?;

                let (external_id, status) = parse_payment(&raw)?;
                let pix = matches!(request.method, GatewayMethod::Pix)
                    .then(|| parse_pix_payload(&raw));

                Ok(GatewayIntentResponse {
                    external_id,
                    status,
                    pix,
                    checkout_url: None,
                    raw,
                    http_status,
                })
            }
            GatewayMethod::CheckoutRedirect => {
                let body = Self::preference_body(request);
                let (raw, http_status) = self
                    .post("/checkout/preferences", &body, &idempotency_key)
                    .await?;

                let external_id = raw
                    .get("id")
                    .and_then(|v| v.as_str())
                    .map(String::from)
                    .ok_or_else(|| {
                        AppError::Gateway("Preference response is missing id".to_string())
                    })?;
                let checkout_url = raw
                    .get("init_point")
                    .and_then(|v| v.as_str())
                    .map(String::from);

                Ok(GatewayIntentResponse {
                    external_id,
                    status: GatewayPaymentStatus::Pending,
                    pix: None,
                    checkout_url,
                    raw,
                    http_status,
                })
            }
        }
    }

    async fn fetch_payment(&self, external_id: &str) -> AppResult<GatewayPayment> {
        let (raw, _) = self.get(&format!("/v1/payments/{}", external_id)).await?;

        let (external_id, status) = parse_payment(&raw)?;
        let external_reference = raw
            .get("external_reference")
            .and_then(|v| v.as_str())
            .map(String::from);

        Ok(GatewayPayment {
            external_id,
            status,
            external_reference,
            raw,
        })
    }
}
