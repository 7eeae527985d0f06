//! The closed set of actions a turn can dispatch.

use serde::{Deserialize, Serialize};

use crate::tools::{Resource, Vec3};

/// Action identifiers as they appear on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionName {
    Move,
    ShipStatus,
    ScanSector,
    PerformScan,
    GetResources,
    StartMining,
    StopMining,
    MiningStatus,
    ListScripts,
    GetScriptCode,
    DeleteScript,
    RunScript,
    CreateScript,
    UpdateScript,
}

impl ActionName {
    pub const ALL: [ActionName; 14] = [
        ActionName::Move,
        ActionName::ShipStatus,
        ActionName::ScanSector,
        ActionName::PerformScan,
        ActionName::GetResources,
        ActionName::StartMining,
        ActionName::StopMining,
        ActionName::MiningStatus,
        ActionName::ListScripts,
        ActionName::GetScriptCode,
        ActionName::DeleteScript,
        ActionName::RunScript,
        ActionName::CreateScript,
        ActionName::UpdateScript,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionName::Move => "move",
            ActionName::ShipStatus => "ship_status",
            ActionName::ScanSector => "scan_sector",
            ActionName::PerformScan => "perform_scan",
            ActionName::GetResources => "get_resources",
            ActionName::StartMining => "start_mining",
            ActionName::StopMining => "stop_mining",
            ActionName::MiningStatus => "mining_status",
            ActionName::ListScripts => "list_scripts",
            ActionName::GetScriptCode => "get_script_code",
            ActionName::DeleteScript => "delete_script",
            ActionName::RunScript => "run_script",
            ActionName::CreateScript => "create_script",
            ActionName::UpdateScript => "update_script",
        }
    }

    /// One-line description used in prompts and the exported schema.
    pub fn description(&self) -> &'static str {
        match self {
            ActionName::Move => "Fly the ship to coordinates {x, y, z}.",
            ActionName::ShipStatus => "Report the ship's position and speed.",
            ActionName::ScanSector => {
                "Run an active scan, then list known deposits {resource?, limit?}."
            }
            ActionName::PerformScan => "Run an active scan and report new discoveries.",
            ActionName::GetResources => "Report cargo stockpiles.",
            ActionName::StartMining => "Start mining the nearest known deposit {resource}.",
            ActionName::StopMining => "Stop mining.",
            ActionName::MiningStatus => "Report what the mining laser is doing.",
            ActionName::ListScripts => "List stored scripts.",
            ActionName::GetScriptCode => "Show the code of a script {name?}.",
            ActionName::DeleteScript => "Delete a script by explicit name {name}.",
            ActionName::RunScript => "Run a script {name?}.",
            ActionName::CreateScript => {
                "Write a new script from a goal {name, goal, description?}."
            }
            ActionName::UpdateScript => "Rewrite an existing script towards a goal {name?, goal}.",
        }
    }
}

impl std::fmt::Display for ActionName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveArgs {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl MoveArgs {
    pub fn target(&self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanArgs {
    #[serde(default)]
    pub resource: Option<Resource>,
    #[serde(default)]
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MiningArgs {
    pub resource: Resource,
}

/// Arguments naming a script. The name may be omitted in favour of the
/// turn's default script name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScriptRef {
    #[serde(default)]
    pub name: Option<String>,
}

/// Deletion always names its target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteScriptArgs {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateScriptArgs {
    pub name: String,
    pub goal: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateScriptArgs {
    #[serde(default)]
    pub name: Option<String>,
    pub goal: String,
}

/// A validated, parameter-typed request to the host.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Move(MoveArgs),
    ShipStatus,
    ScanSector(ScanArgs),
    PerformScan,
    GetResources,
    StartMining(MiningArgs),
    StopMining,
    MiningStatus,
    ListScripts,
    GetScriptCode(ScriptRef),
    DeleteScript(DeleteScriptArgs),
    RunScript(ScriptRef),
    CreateScript(CreateScriptArgs),
    UpdateScript(UpdateScriptArgs),
}

impl Action {
    pub fn name(&self) -> ActionName {
        match self {
            Action::Move(_) => ActionName::Move,
            Action::ShipStatus => ActionName::ShipStatus,
            Action::ScanSector(_) => ActionName::ScanSector,
            Action::PerformScan => ActionName::PerformScan,
            Action::GetResources => ActionName::GetResources,
            Action::StartMining(_) => ActionName::StartMining,
            Action::StopMining => ActionName::StopMining,
            Action::MiningStatus => ActionName::MiningStatus,
            Action::ListScripts => ActionName::ListScripts,
            Action::GetScriptCode(_) => ActionName::GetScriptCode,
            Action::DeleteScript(_) => ActionName::DeleteScript,
            Action::RunScript(_) => ActionName::RunScript,
            Action::CreateScript(_) => ActionName::CreateScript,
            Action::UpdateScript(_) => ActionName::UpdateScript,
        }
    }
}

/// Parsed backend output for one turn.
#[derive(Debug, Clone, PartialEq)]
pub struct Intent {
    pub say: String,
    pub call: Option<Action>,
}

impl Intent {
    pub fn say(text: impl Into<String>) -> Self {
        Self {
            say: text.into(),
            call: None,
        }
    }
}
