//! Turn orchestration.
//!
//! A turn runs:
//! - Prompt composition from the history window and the utterance
//! - One intent round-trip and schema validation
//! - At most one action dispatched to the host
//! - Reply composition and history append

mod bridge;
pub mod dispatcher;
pub mod prompt;

pub use bridge::CommandBridge;
pub use dispatcher::{DispatchSettings, ToolDispatcher, TurnContext, preview};
pub use prompt::{Prompt, PromptComposer, PromptInput};
