//! In-memory host.
//!
//! Backs the terminal REPL and the test suite. Keeps an ordered journal of
//! every call it receives and supports failure injection per operation.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::HostError;
use crate::tools::host::{
    Host, HostOp, MiningStart, MiningState, MiningStatus, OpResult, Resource, Resources,
    ScanFilter, ScanHit, ScriptRecord, ScriptSummary, ShipStatus, Vec3,
};

/// Active scan reaches deposits within this distance of the ship.
const SCAN_RANGE: f64 = 1500.0;
/// Approach speed in units per second.
const APPROACH_SPEED: f64 = 50.0;
/// Extraction rate in units per second.
const MINING_RATE: f64 = 2.0;

/// One recorded call to the simulated host.
#[derive(Debug, Clone, PartialEq)]
pub struct HostCall {
    pub op: HostOp,
    pub input: serde_json::Value,
}

/// Injected behaviour for an operation.
#[derive(Debug, Clone)]
pub enum Failure {
    /// The operation is delivered and refused (`ok: false`).
    Reject(String),
    /// The operation never reaches the host.
    Disconnect(String),
}

#[derive(Debug, Clone)]
struct Deposit {
    id: String,
    resource: Resource,
    position: Vec3,
    quantity: f64,
    discovered: bool,
}

#[derive(Debug, Clone)]
enum Mining {
    Idle {
        last_event: Option<String>,
        last_resource: Option<Resource>,
        last_target: Option<String>,
    },
    Approaching {
        target: String,
        resource: Resource,
    },
    Mining {
        target: String,
        resource: Resource,
    },
}

#[derive(Debug)]
struct State {
    position: Vec3,
    speed: f64,
    telemetry: bool,
    cargo: Resources,
    deposits: Vec<Deposit>,
    mining: Mining,
    mining_override: Option<MiningStatus>,
    scripts: BTreeMap<String, ScriptRecord>,
    running: Option<String>,
    failures: HashMap<HostOp, Failure>,
    journal: Vec<HostCall>,
}

/// Simulated ship and sector.
#[derive(Debug)]
pub struct SimulatedHost {
    state: Mutex<State>,
}

impl Default for SimulatedHost {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedHost {
    /// An empty sector with the ship at the origin.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                position: Vec3::default(),
                speed: 0.0,
                telemetry: true,
                cargo: Resources::default(),
                deposits: Vec::new(),
                mining: Mining::Idle {
                    last_event: None,
                    last_resource: None,
                    last_target: None,
                },
                mining_override: None,
                scripts: BTreeMap::new(),
                running: None,
                failures: HashMap::new(),
                journal: Vec::new(),
            }),
        }
    }

    /// A small seeded sector used by the REPL.
    pub fn demo() -> Self {
        Self::new()
            .with_deposit(Resource::Iron, Vec3::new(320.0, 10.0, -140.0), 80.0)
            .with_deposit(Resource::Iron, Vec3::new(-900.0, 0.0, 450.0), 120.0)
            .with_deposit(Resource::Silicon, Vec3::new(610.0, -35.0, 220.0), 60.0)
            .with_deposit(Resource::Uranium, Vec3::new(1200.0, 80.0, -700.0), 25.0)
            .with_deposit(Resource::Uranium, Vec3::new(4000.0, 0.0, 4000.0), 40.0)
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn with_deposit(self, resource: Resource, position: Vec3, quantity: f64) -> Self {
        {
            let mut state = self.lock();
            let id = format!("{}-{}", resource, state.deposits.len() + 1);
            state.deposits.push(Deposit {
                id,
                resource,
                position,
                quantity,
                discovered: false,
            });
        }
        self
    }

    pub fn with_ship(self, position: Vec3, speed: f64) -> Self {
        {
            let mut state = self.lock();
            state.position = position;
            state.speed = speed;
        }
        self
    }

    pub fn with_cargo(self, cargo: Resources) -> Self {
        self.lock().cargo = cargo;
        self
    }

    pub fn with_script(self, name: &str, code: &str, description: Option<&str>) -> Self {
        self.lock().scripts.insert(
            name.to_string(),
            ScriptRecord {
                name: name.to_string(),
                code: code.to_string(),
                description: description.map(str::to_string),
                last_modified: Utc::now(),
            },
        );
        self
    }

    /// Report this status from `mining_status` regardless of internal state.
    pub fn with_mining_status(self, status: MiningStatus) -> Self {
        self.lock().mining_override = Some(status);
        self
    }

    /// Toggle ship telemetry. Without it `ship_status` returns `None`.
    pub fn set_telemetry(&self, available: bool) {
        self.lock().telemetry = available;
    }

    /// Make every call to `op` fail in the given way.
    pub fn fail(&self, op: HostOp, failure: Failure) {
        self.lock().failures.insert(op, failure);
    }

    /// Every call received so far, in order.
    pub fn calls(&self) -> Vec<HostCall> {
        self.lock().journal.clone()
    }

    /// Operation names received so far, in order.
    pub fn ops(&self) -> Vec<HostOp> {
        self.lock().journal.iter().map(|c| c.op).collect()
    }

    /// How many times `op` was called.
    pub fn count(&self, op: HostOp) -> usize {
        self.lock().journal.iter().filter(|c| c.op == op).count()
    }

    /// Stored script, if any. Inspection helper for callers and tests.
    pub fn script(&self, name: &str) -> Option<ScriptRecord> {
        self.lock().scripts.get(name).cloned()
    }

    /// Name of the script most recently started.
    pub fn running_script(&self) -> Option<String> {
        self.lock().running.clone()
    }

    /// Advance mining by `elapsed`: approach the target, then extract.
    pub fn advance(&self, elapsed: Duration) {
        let mut state = self.lock();
        let mut secs = elapsed.as_secs_f64();

        if let Mining::Approaching { target, resource } = state.mining.clone() {
            let Some(deposit) = state.deposits.iter().find(|d| d.id == target).cloned() else {
                state.mining = idle_with(Some("lost"), Some(resource), Some(target));
                return;
            };
            let distance = state.position.distance(&deposit.position);
            let needed = distance / APPROACH_SPEED;
            if secs < needed {
                let t = secs * APPROACH_SPEED / distance;
                state.position = lerp(&state.position, &deposit.position, t);
                state.speed = APPROACH_SPEED;
                return;
            }
            secs -= needed;
            state.position = deposit.position;
            state.speed = 0.0;
            state.mining = Mining::Mining { target, resource };
        }

        if let Mining::Mining { target, resource } = state.mining.clone() {
            let Some(idx) = state.deposits.iter().position(|d| d.id == target) else {
                state.mining = idle_with(Some("lost"), Some(resource), Some(target));
                return;
            };
            let mined = (secs * MINING_RATE).min(state.deposits[idx].quantity);
            state.deposits[idx].quantity -= mined;
            match resource {
                Resource::Iron => state.cargo.iron += mined,
                Resource::Silicon => state.cargo.silicon += mined,
                Resource::Uranium => state.cargo.uranium += mined,
            }
            if state.deposits[idx].quantity <= f64::EPSILON {
                state.mining = idle_with(Some("depleted"), Some(resource), Some(target));
            }
        }
    }

    /// Record the call and return any injected failure for it.
    fn enter(&self, op: HostOp, input: serde_json::Value) -> Result<Option<String>, HostError> {
        let mut state = self.lock();
        state.journal.push(HostCall { op, input });
        match state.failures.get(&op) {
            Some(Failure::Disconnect(reason)) => Err(HostError::Transport {
                operation: op.as_str().to_string(),
                reason: reason.clone(),
            }),
            Some(Failure::Reject(error)) => Ok(Some(error.clone())),
            None => Ok(None),
        }
    }
}

fn idle_with(event: Option<&str>, resource: Option<Resource>, target: Option<String>) -> Mining {
    Mining::Idle {
        last_event: event.map(str::to_string),
        last_resource: resource,
        last_target: target,
    }
}

fn lerp(a: &Vec3, b: &Vec3, t: f64) -> Vec3 {
    Vec3::new(
        a.x + (b.x - a.x) * t,
        a.y + (b.y - a.y) * t,
        a.z + (b.z - a.z) * t,
    )
}

#[async_trait]
impl Host for SimulatedHost {
    async fn move_to(&self, target: Vec3) -> Result<OpResult, HostError> {
        let input = serde_json::json!({"x": target.x, "y": target.y, "z": target.z});
        if let Some(error) = self.enter(HostOp::Move, input)? {
            return Ok(OpResult::failed(error));
        }
        let mut state = self.lock();
        state.position = target;
        state.speed = 0.0;
        Ok(OpResult::ok())
    }

    async fn ship_status(&self) -> Result<Option<ShipStatus>, HostError> {
        let injected = self.enter(HostOp::ShipStatus, serde_json::json!({}))?;
        let state = self.lock();
        if injected.is_some() || !state.telemetry {
            return Ok(None);
        }
        Ok(Some(ShipStatus {
            position: state.position,
            speed: state.speed,
        }))
    }

    async fn scan_sector(&self, filter: ScanFilter) -> Result<Vec<ScanHit>, HostError> {
        let input = serde_json::to_value(&filter).unwrap_or_default();
        if self.enter(HostOp::ScanSector, input)?.is_some() {
            return Ok(Vec::new());
        }
        let state = self.lock();
        let mut hits: Vec<ScanHit> = state
            .deposits
            .iter()
            .filter(|d| d.discovered && d.quantity > 0.0)
            .filter(|d| filter.resource.is_none_or(|r| r == d.resource))
            .map(|d| ScanHit {
                resource: d.resource,
                position: d.position,
                distance: state.position.distance(&d.position),
            })
            .collect();
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        if let Some(limit) = filter.limit {
            hits.truncate(limit as usize);
        }
        Ok(hits)
    }

    async fn perform_scan(&self) -> Result<Vec<String>, HostError> {
        if self
            .enter(HostOp::PerformScan, serde_json::json!({}))?
            .is_some()
        {
            return Ok(Vec::new());
        }
        let mut state = self.lock();
        let ship = state.position;
        let mut found = Vec::new();
        for deposit in state.deposits.iter_mut() {
            if !deposit.discovered && ship.distance(&deposit.position) <= SCAN_RANGE {
                deposit.discovered = true;
                found.push(deposit.id.clone());
            }
        }
        Ok(found)
    }

    async fn resources(&self) -> Result<Resources, HostError> {
        self.enter(HostOp::GetResources, serde_json::json!({}))?;
        Ok(self.lock().cargo)
    }

    async fn start_mining(&self, resource: Resource) -> Result<MiningStart, HostError> {
        let input = serde_json::json!({"resource": resource});
        if let Some(error) = self.enter(HostOp::StartMining, input)? {
            return Ok(MiningStart {
                ok: false,
                error: Some(error),
                target_id: None,
            });
        }
        let mut state = self.lock();
        let ship = state.position;
        let target = state
            .deposits
            .iter()
            .filter(|d| d.discovered && d.resource == resource && d.quantity > 0.0)
            .min_by(|a, b| {
                ship.distance(&a.position)
                    .total_cmp(&ship.distance(&b.position))
            })
            .map(|d| d.id.clone());

        match target {
            Some(id) => {
                state.mining = Mining::Approaching {
                    target: id.clone(),
                    resource,
                };
                Ok(MiningStart {
                    ok: true,
                    error: None,
                    target_id: Some(id),
                })
            }
            None => Ok(MiningStart {
                ok: false,
                error: Some(format!(
                    "No known {} deposit. Run a scan first.",
                    resource
                )),
                target_id: None,
            }),
        }
    }

    async fn stop_mining(&self) -> Result<OpResult, HostError> {
        if let Some(error) = self.enter(HostOp::StopMining, serde_json::json!({}))? {
            return Ok(OpResult::failed(error));
        }
        let mut state = self.lock();
        state.mining = match state.mining.clone() {
            Mining::Approaching { target, resource } | Mining::Mining { target, resource } => {
                idle_with(Some("stopped"), Some(resource), Some(target))
            }
            idle => idle,
        };
        Ok(OpResult::ok())
    }

    async fn mining_status(&self) -> Result<MiningStatus, HostError> {
        self.enter(HostOp::MiningStatus, serde_json::json!({}))?;
        let state = self.lock();
        if let Some(status) = &state.mining_override {
            return Ok(status.clone());
        }
        let find = |id: &str| state.deposits.iter().find(|d| d.id == id);
        Ok(match &state.mining {
            Mining::Idle {
                last_event,
                last_resource,
                last_target,
            } => MiningStatus {
                state: MiningState::Idle,
                resource: *last_resource,
                last_event: last_event.clone(),
                last_target: last_target.clone(),
                ..Default::default()
            },
            Mining::Approaching { target, resource } => MiningStatus {
                state: MiningState::Approaching,
                resource: Some(*resource),
                distance: find(target).map(|d| state.position.distance(&d.position)),
                last_target: Some(target.clone()),
                ..Default::default()
            },
            Mining::Mining { target, resource } => MiningStatus {
                state: MiningState::Mining,
                resource: Some(*resource),
                remaining: find(target).map(|d| d.quantity),
                rate: Some(MINING_RATE),
                last_target: Some(target.clone()),
                ..Default::default()
            },
        })
    }

    async fn list_scripts(&self) -> Result<Vec<ScriptSummary>, HostError> {
        self.enter(HostOp::ListScripts, serde_json::json!({}))?;
        Ok(self
            .lock()
            .scripts
            .values()
            .map(ScriptRecord::summary)
            .collect())
    }

    async fn script_code(&self, name: &str) -> Result<Option<String>, HostError> {
        self.enter(HostOp::GetScriptCode, serde_json::json!({"name": name}))?;
        Ok(self.lock().scripts.get(name).map(|s| s.code.clone()))
    }

    async fn create_script(
        &self,
        name: &str,
        code: &str,
        description: Option<&str>,
    ) -> Result<OpResult, HostError> {
        let input = serde_json::json!({"name": name, "description": description});
        if let Some(error) = self.enter(HostOp::CreateScript, input)? {
            return Ok(OpResult::failed(error));
        }
        let mut state = self.lock();
        if state.scripts.contains_key(name) {
            return Ok(OpResult::failed(format!("Script '{}' already exists", name)));
        }
        state.scripts.insert(
            name.to_string(),
            ScriptRecord {
                name: name.to_string(),
                code: code.to_string(),
                description: description.map(str::to_string),
                last_modified: Utc::now(),
            },
        );
        Ok(OpResult::ok())
    }

    async fn update_script(&self, name: &str, code: &str) -> Result<OpResult, HostError> {
        if let Some(error) = self.enter(HostOp::UpdateScript, serde_json::json!({"name": name}))? {
            return Ok(OpResult::failed(error));
        }
        let mut state = self.lock();
        match state.scripts.get_mut(name) {
            Some(record) => {
                record.code = code.to_string();
                record.last_modified = Utc::now();
                Ok(OpResult::ok())
            }
            None => Ok(OpResult::failed(format!("Script '{}' not found", name))),
        }
    }

    async fn delete_script(&self, name: &str) -> Result<OpResult, HostError> {
        if let Some(error) = self.enter(HostOp::DeleteScript, serde_json::json!({"name": name}))? {
            return Ok(OpResult::failed(error));
        }
        let mut state = self.lock();
        if state.scripts.remove(name).is_some() {
            if state.running.as_deref() == Some(name) {
                state.running = None;
            }
            Ok(OpResult::ok())
        } else {
            Ok(OpResult::failed(format!("Script '{}' not found", name)))
        }
    }

    async fn run_script(&self, name: &str) -> Result<OpResult, HostError> {
        if let Some(error) = self.enter(HostOp::RunScript, serde_json::json!({"name": name}))? {
            return Ok(OpResult::failed(error));
        }
        let mut state = self.lock();
        if state.scripts.contains_key(name) {
            state.running = Some(name.to_string());
            Ok(OpResult::ok())
        } else {
            Ok(OpResult::failed(format!("Script '{}' not found", name)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scan_discovers_deposits_in_range() {
        let host = SimulatedHost::demo();

        let before = host.scan_sector(ScanFilter::default()).await.unwrap();
        assert!(before.is_empty());

        let found = host.perform_scan().await.unwrap();
        assert_eq!(found.len(), 4);

        let again = host.perform_scan().await.unwrap();
        assert!(again.is_empty());

        let iron = host
            .scan_sector(ScanFilter {
                resource: Some(Resource::Iron),
                limit: None,
            })
            .await
            .unwrap();
        assert_eq!(iron.len(), 2);
        assert!(iron[0].distance <= iron[1].distance);
    }

    #[tokio::test]
    async fn test_mining_lifecycle() {
        let host = SimulatedHost::new().with_deposit(Resource::Iron, Vec3::new(100.0, 0.0, 0.0), 4.0);
        host.perform_scan().await.unwrap();

        let start = host.start_mining(Resource::Iron).await.unwrap();
        assert!(start.ok);
        assert_eq!(start.target_id.as_deref(), Some("iron-1"));

        let status = host.mining_status().await.unwrap();
        assert_eq!(status.state, MiningState::Approaching);
        assert_eq!(status.distance, Some(100.0));

        host.advance(Duration::from_secs(2));
        let status = host.mining_status().await.unwrap();
        assert_eq!(status.state, MiningState::Mining);

        host.advance(Duration::from_secs(10));
        let status = host.mining_status().await.unwrap();
        assert_eq!(status.state, MiningState::Idle);
        assert_eq!(status.last_event.as_deref(), Some("depleted"));
        assert_eq!(host.resources().await.unwrap().iron, 4.0);
    }

    #[tokio::test]
    async fn test_start_mining_without_known_deposit() {
        let host = SimulatedHost::new();
        let start = host.start_mining(Resource::Uranium).await.unwrap();
        assert!(!start.ok);
        assert!(start.error.unwrap().contains("uranium"));
    }

    #[tokio::test]
    async fn test_script_crud() {
        let host = SimulatedHost::new();
        assert!(host.create_script("patrol", "moveTo(0, 0, 0);", None).await.unwrap().ok);
        assert!(!host.create_script("patrol", "x", None).await.unwrap().ok);
        assert!(host.update_script("patrol", "sleep(10);").await.unwrap().ok);
        assert_eq!(
            host.script_code("patrol").await.unwrap().as_deref(),
            Some("sleep(10);")
        );
        assert!(host.run_script("patrol").await.unwrap().ok);
        assert_eq!(host.running_script().as_deref(), Some("patrol"));
        assert!(host.delete_script("patrol").await.unwrap().ok);
        assert!(host.script_code("patrol").await.unwrap().is_none());
        assert!(!host.run_script("patrol").await.unwrap().ok);
    }

    #[tokio::test]
    async fn test_failure_injection_and_journal() {
        let host = SimulatedHost::new();
        host.fail(HostOp::RunScript, Failure::Reject("engine offline".to_string()));
        host.fail(HostOp::Move, Failure::Disconnect("link down".to_string()));

        let run = host.run_script("any").await.unwrap();
        assert_eq!(run.error.as_deref(), Some("engine offline"));
        assert!(host.move_to(Vec3::new(1.0, 2.0, 3.0)).await.is_err());

        assert_eq!(host.ops(), vec![HostOp::RunScript, HostOp::Move]);
        assert_eq!(host.calls()[1].input["z"], serde_json::json!(3.0));
    }

    #[tokio::test]
    async fn test_ship_status_without_telemetry() {
        let host = SimulatedHost::new();
        host.set_telemetry(false);
        assert!(host.ship_status().await.unwrap().is_none());
    }
}
