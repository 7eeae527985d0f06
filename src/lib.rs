//! shipclaw: a conversational command bridge for a mining ship.
//!
//! A user utterance goes through one structured-output round-trip to a
//! generation backend, is validated against a closed set of actions, and at
//! most one action is dispatched to the host. Script actions run a second
//! round-trip that writes the script.

pub mod agent;
pub mod config;
pub mod error;
pub mod history;
pub mod intent;
pub mod llm;
pub mod script;
pub mod tools;

pub use agent::CommandBridge;
pub use config::{BridgeConfig, BridgeOptions, BridgeProfile};
pub use error::{BridgeError, Result};
pub use history::{Message, Role};
