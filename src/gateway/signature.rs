use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{AppError, AppResult};

type HmacSha256 = Hmac<Sha256>;

/// `ts` and `v1` fields extracted from the `x-signature` header, which the
/// gateway sends as `ts=<unix ts>,v1=<hex hmac>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    pub ts: String,
    pub v1: String,
}

impl SignatureHeader {
    pub fn parse(raw: &str) -> Option<Self> {
        let mut ts = None;
        let mut v1 = None;

        for part in raw.split(',') {
            let (key, value) = part.split_once('=')?;
            match key.trim() {
                "ts" => ts = Some(value.trim().to_string()),
                "v1" => v1 = Some(value.trim().to_string()),
                _ => {}
            }
        }

        Some(Self { ts: ts?, v1: v1? })
    }
}

/// Verifies webhook authenticity against the shared secret.
///
/// The canonical manifest is built only from the fields present in the
/// request, each as `key:value` joined by `;` with a trailing `;`:
/// `id:<lowercased payment id>;request-id:<x-request-id>;ts:<ts>;`
pub struct WebhookVerifier {
    secret: String,
}

impl WebhookVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    pub fn verify(
        &self,
        payment_id: Option<&str>,
        request_id: Option<&str>,
        signature: &SignatureHeader,
    ) -> AppResult<()> {
        if self.secret.is_empty() {
            return Err(AppError::WebhookVerification(
                "webhook secret is not configured".to_string(),
            ));
        }

        let manifest = Self::manifest(payment_id, request_id, &signature.ts);

        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| AppError::Internal(format!("HMAC initialization failed: {}", e)))?;
        mac.update(manifest.as_bytes());
        let expected = hex::encode(mac.finalize().into_bytes());

        // Provider documentation leaves the hex case unspecified
        if expected.eq_ignore_ascii_case(&signature.v1) {
            Ok(())
        } else {
            Err(AppError::WebhookVerification(
                "signature mismatch".to_string(),
            ))
        }
    }

    fn manifest(payment_id: Option<&str>, request_id: Option<&str>, ts: &str) -> String {
        let mut manifest = String::new();
        if let Some(id) = payment_id {
            manifest.push_str(&format!("id:{};", id.to_lowercase()));
        }
        if let Some(request_id) = request_id {
            manifest.push_str(&format!("request-id:{};", request_id));
        }
        manifest.push_str(&format!("ts:{};", ts));
        manifest
    }
}
