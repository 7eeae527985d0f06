//! Error types for the command bridge.

use std::time::Duration;

/// Errors from the generation backend.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Authentication failed for {provider}")]
    AuthFailed { provider: String },

    #[error("Request to {provider} failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Rate limited by {provider}, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Generation round-trip timed out after {0:?}")]
    Timeout(Duration),
}

/// Errors raised by the host when an operation cannot be delivered at all.
///
/// An operation the host received and refused is not an error: it comes
/// back as an `OpResult` with `ok: false`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum HostError {
    #[error("Host operation {operation} failed: {reason}")]
    Transport { operation: String, reason: String },
}

/// Errors from the script synthesis sub-pipeline.
#[derive(Debug, thiserror::Error)]
pub enum SynthesisError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("Generated script rejected after {attempts} attempt(s): {findings}")]
    Rejected { attempts: u32, findings: String },
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}

/// Errors that abort a turn and reach the caller of `CommandBridge::send`.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Generation backend failed: {0}")]
    Llm(#[from] LlmError),

    #[error("Turn timed out after {0:?}")]
    Timeout(Duration),
}

impl BridgeError {
    /// Generic text shown to the user in place of an assistant reply.
    pub fn user_message(&self) -> &'static str {
        match self {
            BridgeError::Llm(LlmError::AuthFailed { .. }) => {
                "The command link rejected our credentials. Check the API key and try again."
            }
            BridgeError::Llm(_) => "The command link is unavailable right now. Try again shortly.",
            BridgeError::Timeout(_) => {
                "The command link took too long to answer. Try again shortly."
            }
        }
    }
}

/// Result type for bridge turns.
pub type Result<T> = std::result::Result<T, BridgeError>;
