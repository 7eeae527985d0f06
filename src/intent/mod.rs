//! Intent schema and validation.
//!
//! The backend answers every turn with `{say, call?}`. This module owns the
//! closed action set, the schema sent to the backend, and the validator that
//! turns raw output into a typed [`Intent`].

mod action;
mod schema;
mod validator;

pub use action::{
    Action, ActionName, CreateScriptArgs, DeleteScriptArgs, Intent, MiningArgs, MoveArgs, ScanArgs, ScriptRef,
    UpdateScriptArgs,
};
pub use schema::{args_schema, intent_schema};
pub use validator::{IntentValidator, SchemaViolation, Validated};
