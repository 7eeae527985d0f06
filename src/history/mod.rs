//! Conversation and audit history.
//!
//! The store is the single owner of every message a bridge produces:
//! - User utterances
//! - Tool-call audit entries (one per host invocation)
//! - Assistant replies
//!
//! It feeds both the prompt windows and the user-facing transcript.

mod message;
mod store;

pub use message::{Message, Role, ToolCallMeta};
pub use store::HistoryStore;
