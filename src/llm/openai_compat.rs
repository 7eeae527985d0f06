//! OpenAI-compatible Chat Completions gateway.
//!
//! Sends the system prompt and turn context as two messages and asks for a
//! `json_schema` response format. Credentials come with each request, so a
//! reconfigured bridge takes effect on the next turn without rebuilding
//! the gateway.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::llm::provider::{CompletionGateway, CompletionRequest, parse_structured};

const PROVIDER: &str = "openai_compat";

/// Chat Completions client.
pub struct OpenAiCompatGateway {
    client: Client,
    base_url: String,
}

impl OpenAiCompatGateway {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn api_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    async fn send_request(
        &self,
        api_key: &str,
        body: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, LlmError> {
        let url = self.api_url("chat/completions");

        tracing::debug!("Sending request to {}: {}", PROVIDER, url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("{} request failed: {}", PROVIDER, e);
                LlmError::RequestFailed {
                    provider: PROVIDER.to_string(),
                    reason: e.to_string(),
                }
            })?;

        let status = response.status();
        let headers = response.headers().clone();
        let response_text = response.text().await.unwrap_or_default();

        tracing::debug!("{} response status: {}", PROVIDER, status);

        if !status.is_success() {
            if status.as_u16() == 401 {
                return Err(LlmError::AuthFailed {
                    provider: PROVIDER.to_string(),
                });
            }
            if status.as_u16() == 429 {
                let retry_after = headers
                    .get("retry-after")
                    .and_then(|h| h.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok())
                    .map(Duration::from_secs);

                return Err(LlmError::RateLimited {
                    provider: PROVIDER.to_string(),
                    retry_after,
                });
            }
            return Err(LlmError::RequestFailed {
                provider: PROVIDER.to_string(),
                reason: format!("HTTP {}: {}", status, response_text),
            });
        }

        serde_json::from_str(&response_text).map_err(|e| LlmError::InvalidResponse {
            provider: PROVIDER.to_string(),
            reason: format!("JSON parse error: {}", e),
        })
    }
}

#[async_trait]
impl CompletionGateway for OpenAiCompatGateway {
    async fn complete(&self, req: CompletionRequest) -> Result<serde_json::Value, LlmError> {
        let api_key = req
            .api_key
            .as_ref()
            .map(|k| k.expose_secret().to_string())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| LlmError::AuthFailed {
                provider: PROVIDER.to_string(),
            })?;

        let request = ChatCompletionRequest {
            model: req.model,
            messages: vec![
                ChatCompletionMessage {
                    role: "system".to_string(),
                    content: req.system_prompt,
                },
                ChatCompletionMessage {
                    role: "user".to_string(),
                    content: req.context,
                },
            ],
            temperature: req.temperature,
            max_tokens: req.max_tokens,
            response_format: ResponseFormat {
                format_type: "json_schema".to_string(),
                json_schema: JsonSchemaFormat {
                    name: req.schema_name,
                    schema: req.schema,
                    strict: false,
                },
            },
        };

        let response = self.send_request(&api_key, &request).await?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse {
                provider: PROVIDER.to_string(),
                reason: "No choices in response".to_string(),
            })?;

        if choice.finish_reason.as_deref() == Some("content_filter") {
            return Err(LlmError::InvalidResponse {
                provider: PROVIDER.to_string(),
                reason: "Response blocked by content filter".to_string(),
            });
        }

        let content = choice.message.content.unwrap_or_default();
        if let Some(usage) = response.usage {
            tracing::debug!(
                "{} usage: {} prompt tokens, {} completion tokens",
                PROVIDER,
                usage.prompt_tokens,
                usage.completion_tokens
            );
        }

        Ok(parse_structured(&content))
    }

    fn provider_name(&self) -> &str {
        PROVIDER
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatCompletionMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatCompletionMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
    json_schema: JsonSchemaFormat,
}

#[derive(Debug, Serialize)]
struct JsonSchemaFormat {
    name: String,
    schema: serde_json::Value,
    strict: bool,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatCompletionChoice>,
    #[serde(default)]
    usage: Option<ChatCompletionUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    message: ChatCompletionResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}
