//! Completion gateway trait and request types.

use async_trait::async_trait;
use secrecy::SecretString;

use crate::config::BridgeConfig;
use crate::error::LlmError;

/// A structured-output generation request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Fixed instructions for this round-trip.
    pub system_prompt: String,
    /// JSON Schema the result must follow.
    pub schema: serde_json::Value,
    /// Name the schema is registered under with the backend.
    pub schema_name: String,
    /// Turn-specific context (history, utterance, hints).
    pub context: String,
    /// Credentials captured at the start of the turn.
    pub api_key: Option<SecretString>,
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    pub fn new(
        system_prompt: impl Into<String>,
        schema: serde_json::Value,
        context: impl Into<String>,
    ) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            schema,
            schema_name: "response".to_string(),
            context: context.into(),
            api_key: None,
            model: String::new(),
            temperature: None,
            max_tokens: None,
        }
    }

    /// Use the credentials and model from a config snapshot.
    pub fn with_config(mut self, config: &BridgeConfig) -> Self {
        self.api_key = config.api_key.clone();
        self.model = config.model.clone();
        self
    }

    pub fn with_schema_name(mut self, name: impl Into<String>) -> Self {
        self.schema_name = name.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Opaque generation capability: prompt + schema in, structured value out.
#[async_trait]
pub trait CompletionGateway: Send + Sync {
    /// Run one round-trip.
    async fn complete(&self, request: CompletionRequest) -> Result<serde_json::Value, LlmError>;

    /// Name used in logs and errors.
    fn provider_name(&self) -> &str;
}

/// Extract a JSON object from text that might contain other content.
pub fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if start < end {
        Some(&text[start..=end])
    } else {
        None
    }
}

/// Parse backend text into a JSON value.
///
/// Falls back to treating the whole text as a string when no object can be
/// recovered, so free-text answers still reach the validator.
pub fn parse_structured(text: &str) -> serde_json::Value {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        return value;
    }
    extract_json(trimmed)
        .and_then(|json| serde_json::from_str(json).ok())
        .unwrap_or_else(|| serde_json::Value::String(trimmed.to_string()))
}
