use serde::{Deserialize, Serialize};

/// Inbound gateway notification. The provider has shipped two body shapes
/// over the years and both are still delivered:
///
/// - `{"action": "payment.updated", "data": {"id": 123}}`
/// - `{"topic": "payment", "id": "123"}`
///
/// Ids arrive as JSON numbers or strings depending on the shape, so both are
/// captured as raw values and normalized through [`GatewayEvent::payment_id`].
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GatewayEvent {
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    #[serde(default)]
    pub data: Option<GatewayEventData>,
    #[serde(default)]
    pub live_mode: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GatewayEventData {
    #[serde(default)]
    pub id: Option<serde_json::Value>,
}

impl GatewayEvent {
    /// Only payment-status kinds drive state; everything else is dropped
    /// before authentication.
    pub fn is_payment_event(&self) -> bool {
        if let Some(action) = &self.action {
            if action.starts_with("payment") {
                return true;
            }
        }
        if let Some(kind) = &self.kind {
            if kind == "payment" {
                return true;
            }
        }
        matches!(self.topic.as_deref(), Some("payment"))
    }

    /// Gateway payment id carried by either body shape.
    pub fn payment_id(&self) -> Option<String> {
        self.data
            .as_ref()
            .and_then(|d| d.id.as_ref())
            .or(self.id.as_ref())
            .and_then(value_to_id)
    }
}

fn value_to_id(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
