//! JSON Schema for the intent the backend must return.

use serde_json::{Value, json};

use crate::config::BridgeProfile;
use crate::intent::ActionName;

fn resource_schema() -> Value {
    json!({"type": "string", "enum": ["iron", "silicon", "uranium"]})
}

/// Parameter schema for one action.
pub fn args_schema(action: ActionName) -> Value {
    let empty = json!({"type": "object", "properties": {}, "additionalProperties": false});
    match action {
        ActionName::Move => json!({
            "type": "object",
            "properties": {
                "x": {"type": "number"},
                "y": {"type": "number"},
                "z": {"type": "number"}
            },
            "required": ["x", "y", "z"]
        }),
        ActionName::ScanSector => json!({
            "type": "object",
            "properties": {
                "resource": resource_schema(),
                "limit": {"type": "integer", "minimum": 1}
            }
        }),
        ActionName::StartMining => json!({
            "type": "object",
            "properties": {"resource": resource_schema()},
            "required": ["resource"]
        }),
        ActionName::GetScriptCode | ActionName::RunScript => json!({
            "type": "object",
            "properties": {"name": {"type": "string"}}
        }),
        ActionName::DeleteScript => json!({
            "type": "object",
            "properties": {"name": {"type": "string", "minLength": 1}},
            "required": ["name"]
        }),
        ActionName::CreateScript => json!({
            "type": "object",
            "properties": {
                "name": {"type": "string"},
                "goal": {"type": "string"},
                "description": {"type": "string"}
            },
            "required": ["name", "goal"]
        }),
        ActionName::UpdateScript => json!({
            "type": "object",
            "properties": {
                "name": {"type": "string"},
                "goal": {"type": "string"}
            },
            "required": ["goal"]
        }),
        ActionName::ShipStatus
        | ActionName::PerformScan
        | ActionName::GetResources
        | ActionName::StopMining
        | ActionName::MiningStatus
        | ActionName::ListScripts => empty,
    }
}

/// Schema of `{say, call?}` restricted to the profile's actions.
pub fn intent_schema(profile: BridgeProfile) -> Value {
    let variants: Vec<Value> = profile
        .actions()
        .into_iter()
        .map(|action| {
            json!({
                "type": "object",
                "description": action.description(),
                "properties": {
                    "name": {"const": action.as_str()},
                    "args": args_schema(action)
                },
                "required": ["name"]
            })
        })
        .collect();

    json!({
        "type": "object",
        "properties": {
            "say": {"type": "string", "minLength": 1},
            "call": {"oneOf": variants}
        },
        "required": ["say"]
    })
}
