use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Uniform JSON body: `{success, message?, ...data}`.
///
/// Only JSON objects decode into an `Envelope`; any other upstream payload is
/// rejected at the boundary. Keys other than `success` and `message` are kept
/// in `data` and written back flattened, so a body passes through unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

impl Envelope {
    pub fn succeeded() -> Self {
        Self {
            success: Some(true),
            ..Self::default()
        }
    }

    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: Some(true),
            message: Some(message.into()),
            data: Map::new(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: Some(false),
            message: Some(message.into()),
            data: Map::new(),
        }
    }

    pub fn with(mut self, key: &str, value: Value) -> Self {
        self.data.insert(key.to_string(), value);
        self
    }

    /// Upstream message, or `fallback` when it is missing or blank.
    pub fn message_or(&self, fallback: &str) -> String {
        match self.message.as_deref().map(str::trim) {
            Some(m) if !m.is_empty() => m.to_string(),
            _ => fallback.to_string(),
        }
    }
}
