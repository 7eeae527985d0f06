//! Host trait and types.
//!
//! The host is the ship-side system the bridge drives. Every operation is
//! asynchronous and either succeeds with a typed result or fails with a
//! [`HostError`] when it cannot be delivered.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::HostError;

/// A point in sector space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn distance(&self, other: &Vec3) -> f64 {
        let (dx, dy, dz) = (self.x - other.x, self.y - other.y, self.z - other.z);
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// Minable resource identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resource {
    Iron,
    Silicon,
    Uranium,
}

impl Resource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Iron => "iron",
            Resource::Silicon => "silicon",
            Resource::Uranium => "uranium",
        }
    }
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Resource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "iron" => Ok(Resource::Iron),
            "silicon" => Ok(Resource::Silicon),
            "uranium" => Ok(Resource::Uranium),
            other => Err(format!(
                "unknown resource '{}', expected 'iron', 'silicon' or 'uranium'",
                other
            )),
        }
    }
}

/// Outcome of a host operation that can be refused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpResult {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OpResult {
    pub fn ok() -> Self {
        Self {
            ok: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipStatus {
    pub position: Vec3,
    pub speed: f64,
}

/// Filter for [`Host::scan_sector`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<Resource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

/// A known deposit returned by a sector listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanHit {
    pub resource: Resource,
    pub position: Vec3,
    pub distance: f64,
}

/// Cargo stockpiles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Resources {
    pub iron: f64,
    pub silicon: f64,
    pub uranium: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MiningStart {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MiningState {
    #[default]
    Idle,
    Approaching,
    Mining,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MiningStatus {
    pub state: MiningState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<Resource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate: Option<f64>,
    /// Last notable event, e.g. `depleted`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_event: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_target: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptSummary {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub last_modified: DateTime<Utc>,
}

/// A stored automation script. Owned by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptRecord {
    pub name: String,
    pub code: String,
    #[serde(default)]
    pub description: Option<String>,
    pub last_modified: DateTime<Utc>,
}

impl ScriptRecord {
    pub fn summary(&self) -> ScriptSummary {
        ScriptSummary {
            name: self.name.clone(),
            description: self.description.clone(),
            last_modified: self.last_modified,
        }
    }
}

/// Names of host operations, as they appear in tool-call audit entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostOp {
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
    CreateScript,
    UpdateScript,
    DeleteScript,
    RunScript,
}

impl HostOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            HostOp::Move => "move",
            HostOp::ShipStatus => "ship_status",
            HostOp::ScanSector => "scan_sector",
            HostOp::PerformScan => "perform_scan",
            HostOp::GetResources => "get_resources",
            HostOp::StartMining => "start_mining",
            HostOp::StopMining => "stop_mining",
            HostOp::MiningStatus => "mining_status",
            HostOp::ListScripts => "list_scripts",
            HostOp::GetScriptCode => "get_script_code",
            HostOp::CreateScript => "create_script",
            HostOp::UpdateScript => "update_script",
            HostOp::DeleteScript => "delete_script",
            HostOp::RunScript => "run_script",
        }
    }
}

impl std::fmt::Display for HostOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The host tool surface consumed by the bridge.
#[async_trait]
pub trait Host: Send + Sync {
    /// Set a course for the given coordinates.
    async fn move_to(&self, target: Vec3) -> Result<OpResult, HostError>;

    /// Current position and speed, or `None` when telemetry is unavailable.
    async fn ship_status(&self) -> Result<Option<ShipStatus>, HostError>;

    /// List known deposits matching the filter, nearest first.
    async fn scan_sector(&self, filter: ScanFilter) -> Result<Vec<ScanHit>, HostError>;

    /// Run an active scan. Returns the ids of newly discovered deposits.
    async fn perform_scan(&self) -> Result<Vec<String>, HostError>;

    async fn resources(&self) -> Result<Resources, HostError>;

    async fn start_mining(&self, resource: Resource) -> Result<MiningStart, HostError>;

    async fn stop_mining(&self) -> Result<OpResult, HostError>;

    async fn mining_status(&self) -> Result<MiningStatus, HostError>;

    async fn list_scripts(&self) -> Result<Vec<ScriptSummary>, HostError>;

    /// Source of a stored script, `None` if no script has that name.
    async fn script_code(&self, name: &str) -> Result<Option<String>, HostError>;

    async fn create_script(
        &self,
        name: &str,
        code: &str,
        description: Option<&str>,
    ) -> Result<OpResult, HostError>;

    async fn update_script(&self, name: &str, code: &str) -> Result<OpResult, HostError>;

    async fn delete_script(&self, name: &str) -> Result<OpResult, HostError>;

    async fn run_script(&self, name: &str) -> Result<OpResult, HostError>;
}
