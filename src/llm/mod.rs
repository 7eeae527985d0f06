//! Generation backend integration.
//!
//! The bridge treats the backend as an opaque capability behind
//! [`CompletionGateway`]. The only concrete implementation talks to an
//! OpenAI-compatible Chat Completions endpoint with JSON-schema output.

mod openai_compat;
mod provider;
#[cfg(test)]
pub(crate) mod replay;

pub use openai_compat::OpenAiCompatGateway;
pub use provider::{
    CompletionGateway, CompletionRequest, extract_json, parse_structured,
};

use std::sync::Arc;

use crate::config::BridgeOptions;

/// Create the gateway described by the options.
pub fn create_gateway(options: &BridgeOptions) -> Arc<dyn CompletionGateway> {
    tracing::info!("Using OpenAI-compatible gateway at {}", options.base_url);
    Arc::new(OpenAiCompatGateway::new(options.base_url.clone()))
}
