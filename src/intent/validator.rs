//! Validation of backend output into an [`Intent`].
//!
//! Malformed output never fails a turn: a bad `call` is dropped and the
//! violation is reported alongside the intent.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::BridgeProfile;
use crate::intent::action::{
    Action, ActionName, CreateScriptArgs, DeleteScriptArgs, Intent, MiningArgs, MoveArgs,
    ScanArgs, ScriptRef, UpdateScriptArgs,
};

/// A way in which backend output failed to match the intent schema.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemaViolation {
    #[error("response is neither an object nor text")]
    NotAnObject,

    #[error("'say' is missing or blank")]
    MissingSay,

    #[error("'call' has no action name")]
    MissingActionName,

    #[error("unknown action '{0}'")]
    UnknownAction(String),

    #[error("action '{0}' is not available in this profile")]
    NotInProfile(ActionName),

    #[error("bad arguments for '{action}': {reason}")]
    BadArguments { action: ActionName, reason: String },
}

/// Outcome of validating one backend response.
#[derive(Debug, Clone)]
pub struct Validated {
    pub intent: Intent,
    pub violations: Vec<SchemaViolation>,
}

impl Validated {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Enforces the intent schema for a profile.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntentValidator {
    profile: BridgeProfile,
}

impl IntentValidator {
    pub fn new(profile: BridgeProfile) -> Self {
        Self { profile }
    }

    /// Validate a backend response.
    pub fn validate(&self, raw: &Value) -> Validated {
        let mut violations = Vec::new();

        let obj = match raw {
            Value::Object(obj) => obj,
            Value::String(text) => {
                // Free text instead of structured output: keep the words, no call.
                if text.trim().is_empty() {
                    violations.push(SchemaViolation::MissingSay);
                }
                return Validated {
                    intent: Intent::say(text.trim()),
                    violations,
                };
            }
            _ => {
                return Validated {
                    intent: Intent::say(String::new()),
                    violations: vec![SchemaViolation::NotAnObject],
                };
            }
        };

        let say = obj
            .get("say")
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or_default()
            .to_string();
        if say.is_empty() {
            violations.push(SchemaViolation::MissingSay);
        }

        let call = match obj.get("call") {
            None | Some(Value::Null) => None,
            Some(call) => match self.parse_call(call) {
                Ok(action) => Some(action),
                Err(violation) => {
                    violations.push(violation);
                    None
                }
            },
        };

        Validated {
            intent: Intent { say, call },
            violations,
        }
    }

    fn parse_call(&self, call: &Value) -> Result<Action, SchemaViolation> {
        let raw_name = call
            .get("name")
            .and_then(Value::as_str)
            .ok_or(SchemaViolation::MissingActionName)?;

        let name: ActionName = serde_json::from_value(Value::String(raw_name.to_string()))
            .map_err(|_| SchemaViolation::UnknownAction(raw_name.to_string()))?;

        if !self.profile.allows(name) {
            return Err(SchemaViolation::NotInProfile(name));
        }

        let args = normalize_args(call.get("args").or_else(|| call.get("arguments")));

        let action = match name {
            ActionName::Move => {
                let args: MoveArgs = parse_args(name, args)?;
                if ![args.x, args.y, args.z].iter().all(|c| c.is_finite()) {
                    return Err(bad(name, "coordinates must be finite numbers"));
                }
                Action::Move(args)
            }
            ActionName::ShipStatus => Action::ShipStatus,
            ActionName::ScanSector => {
                let args: ScanArgs = parse_args(name, args)?;
                if args.limit == Some(0) {
                    return Err(bad(name, "'limit' must be at least 1"));
                }
                Action::ScanSector(args)
            }
            ActionName::PerformScan => Action::PerformScan,
            ActionName::GetResources => Action::GetResources,
            ActionName::StartMining => Action::StartMining(parse_args::<MiningArgs>(name, args)?),
            ActionName::StopMining => Action::StopMining,
            ActionName::MiningStatus => Action::MiningStatus,
            ActionName::ListScripts => Action::ListScripts,
            ActionName::GetScriptCode => Action::GetScriptCode(parse_script_ref(name, args)?),
            ActionName::DeleteScript => {
                let mut args: DeleteScriptArgs = parse_args(name, args)?;
                args.name = args.name.trim().to_string();
                if args.name.is_empty() {
                    return Err(bad(name, "'name' must not be blank"));
                }
                Action::DeleteScript(args)
            }
            ActionName::RunScript => Action::RunScript(parse_script_ref(name, args)?),
            ActionName::CreateScript => {
                let mut args: CreateScriptArgs = parse_args(name, args)?;
                args.name = args.name.trim().to_string();
                args.goal = args.goal.trim().to_string();
                if args.name.is_empty() || args.goal.is_empty() {
                    return Err(bad(name, "'name' and 'goal' must not be blank"));
                }
                args.description = non_blank(args.description);
                Action::CreateScript(args)
            }
            ActionName::UpdateScript => {
                let mut args: UpdateScriptArgs = parse_args(name, args)?;
                args.goal = args.goal.trim().to_string();
                if args.goal.is_empty() {
                    return Err(bad(name, "'goal' must not be blank"));
                }
                args.name = non_blank(args.name);
                Action::UpdateScript(args)
            }
        };

        Ok(action)
    }
}

/// Missing or null args become an empty object; JSON-encoded strings are decoded.
fn normalize_args(args: Option<&Value>) -> Value {
    match args {
        None | Some(Value::Null) => Value::Object(Default::default()),
        Some(Value::String(encoded)) => serde_json::from_str(encoded)
            .unwrap_or_else(|_| Value::String(encoded.clone())),
        Some(other) => other.clone(),
    }
}

fn parse_args<T: DeserializeOwned>(action: ActionName, args: Value) -> Result<T, SchemaViolation> {
    serde_json::from_value(args).map_err(|e| bad(action, e.to_string()))
}

fn parse_script_ref(action: ActionName, args: Value) -> Result<ScriptRef, SchemaViolation> {
    let args: ScriptRef = parse_args(action, args)?;
    Ok(ScriptRef {
        name: non_blank(args.name),
    })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn bad(action: ActionName, reason: impl Into<String>) -> SchemaViolation {
    SchemaViolation::BadArguments {
        action,
        reason: reason.into(),
    }
}
