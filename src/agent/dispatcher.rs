//! Routes one validated action to the host and renders its result.
//!
//! Each host invocation is recorded as a tool-call message before the
//! turn's reply is composed. Host refusals and transport errors end the
//! action with an error fragment; they never fail the turn.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Value, json};

use crate::config::BridgeConfig;
use crate::error::HostError;
use crate::history::{HistoryStore, Message};
use crate::intent::{
    Action, CreateScriptArgs, DeleteScriptArgs, MiningArgs, MoveArgs, ScanArgs, ScriptRef,
    UpdateScriptArgs,
};
use crate::script::{ScriptSynthesizer, SynthesisRequest};
use crate::tools::{Host, HostOp, MiningState, MiningStatus, OpResult, ScanFilter, ScanHit};

/// Dispatcher tuning taken from the bridge options.
#[derive(Debug, Clone, Copy)]
pub struct DispatchSettings {
    /// Characters shown by `get_script_code`.
    pub preview_limit: usize,
    /// History entries handed to script synthesis.
    pub synthesis_window: usize,
    pub log_tool_calls: bool,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            preview_limit: 400,
            synthesis_window: 5,
            log_tool_calls: true,
        }
    }
}

/// Per-turn inputs the dispatcher needs besides the action.
#[derive(Debug, Clone, Copy)]
pub struct TurnContext<'a> {
    /// Config snapshot taken at the start of the turn.
    pub config: &'a BridgeConfig,
    /// Script name used when an action omits one.
    pub default_script: &'a str,
}

/// Executes actions against the host.
pub struct ToolDispatcher {
    host: Arc<dyn Host>,
    synthesizer: ScriptSynthesizer,
    history: Arc<HistoryStore>,
    settings: DispatchSettings,
}

impl ToolDispatcher {
    pub fn new(
        host: Arc<dyn Host>,
        synthesizer: ScriptSynthesizer,
        history: Arc<HistoryStore>,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            host,
            synthesizer,
            history,
            settings,
        }
    }

    /// Execute one action. Returns the text to append to the reply, if any.
    pub async fn dispatch(&self, action: &Action, turn: &TurnContext<'_>) -> Option<String> {
        let name = action.name();
        tracing::info!("Dispatching action {}", name);

        match self.execute(action, turn).await {
            Ok(fragment) => fragment,
            Err(e) => {
                tracing::warn!("Host operation for {} failed: {}", name, e);
                Some(format!("Error: {}", e))
            }
        }
    }

    async fn execute(
        &self,
        action: &Action,
        turn: &TurnContext<'_>,
    ) -> Result<Option<String>, HostError> {
        match action {
            Action::Move(args) => self.move_to(args).await,
            Action::ShipStatus => self.ship_status().await,
            Action::ScanSector(args) => self.scan_sector(args).await,
            Action::PerformScan => self.perform_scan().await,
            Action::GetResources => self.resources().await,
            Action::StartMining(args) => self.start_mining(args).await,
            Action::StopMining => self.stop_mining().await,
            Action::MiningStatus => self.mining_status().await,
            Action::ListScripts => self.list_scripts().await,
            Action::GetScriptCode(target) => self.script_code(target, turn).await,
            Action::DeleteScript(args) => self.delete_script(args).await,
            Action::RunScript(target) => self.run_script(target, turn).await,
            Action::CreateScript(args) => self.create_script(args, turn).await,
            Action::UpdateScript(args) => self.update_script(args, turn).await,
        }
    }

    /// Append a tool-call message for one host invocation.
    fn record<T: Serialize>(&self, op: HostOp, input: Value, result: &Result<T, HostError>) {
        if !self.settings.log_tool_calls {
            return;
        }
        let output = match result {
            Ok(value) => serde_json::to_value(value).unwrap_or_default(),
            Err(e) => json!({"error": e.to_string()}),
        };
        tracing::debug!("Recorded tool call {}", op);
        self.history
            .append(Message::tool_call(op.as_str(), input, output));
    }

    async fn move_to(&self, args: &MoveArgs) -> Result<Option<String>, HostError> {
        let result = self.host.move_to(args.target()).await;
        self.record(HostOp::Move, to_input(args), &result);
        Ok(refusal(&result?, "Could not set course"))
    }

    async fn ship_status(&self) -> Result<Option<String>, HostError> {
        let result = self.host.ship_status().await;
        self.record(HostOp::ShipStatus, json!({}), &result);
        Ok(result?.map(|status| {
            let p = status.position;
            format!(
                "Position ({:.1}, {:.1}, {:.1}), speed {:.2}.",
                p.x, p.y, p.z, status.speed
            )
        }))
    }

    async fn scan_sector(&self, args: &ScanArgs) -> Result<Option<String>, HostError> {
        let discovered = self.host.perform_scan().await;
        self.record(HostOp::PerformScan, json!({}), &discovered);
        let discovered = discovered?;

        let filter = ScanFilter {
            resource: args.resource,
            limit: args.limit,
        };
        let hits = self.host.scan_sector(filter.clone()).await;
        self.record(HostOp::ScanSector, to_input(&filter), &hits);
        let hits = hits?;

        let mut lines = Vec::new();
        if !discovered.is_empty() {
            lines.push(match discovered.len() {
                1 => "Active scan found 1 new deposit.".to_string(),
                n => format!("Active scan found {} new deposits.", n),
            });
        }
        if hits.is_empty() {
            lines.push(match args.resource {
                Some(resource) => format!("No matches found for {}.", resource),
                None => "No matches found.".to_string(),
            });
        } else {
            lines.extend(hits.iter().map(format_hit));
        }

        Ok(Some(lines.join("\n")))
    }

    async fn perform_scan(&self) -> Result<Option<String>, HostError> {
        let result = self.host.perform_scan().await;
        self.record(HostOp::PerformScan, json!({}), &result);
        Ok(Some(match result?.len() {
            1 => "Scan complete: 1 new discovery.".to_string(),
            n => format!("Scan complete: {} new discoveries.", n),
        }))
    }

    async fn resources(&self) -> Result<Option<String>, HostError> {
        let result = self.host.resources().await;
        self.record(HostOp::GetResources, json!({}), &result);
        let cargo = result?;
        Ok(Some(format!(
            "Cargo: iron {:.1}, silicon {:.1}, uranium {:.1}.",
            cargo.iron, cargo.silicon, cargo.uranium
        )))
    }

    async fn start_mining(&self, args: &MiningArgs) -> Result<Option<String>, HostError> {
        let result = self.host.start_mining(args.resource).await;
        self.record(HostOp::StartMining, to_input(args), &result);
        let start = result?;

        if start.ok {
            return Ok(Some(format!(
                "Mining engaged: heading for the nearest {} deposit.",
                args.resource
            )));
        }
        tracing::warn!("Mining {} refused: {:?}", args.resource, start.error);
        Ok(Some(
            start
                .error
                .unwrap_or_else(|| "Mining could not start.".to_string()),
        ))
    }

    async fn stop_mining(&self) -> Result<Option<String>, HostError> {
        let result = self.host.stop_mining().await;
        self.record(HostOp::StopMining, json!({}), &result);
        result?;
        Ok(Some("Mining stopped.".to_string()))
    }

    async fn mining_status(&self) -> Result<Option<String>, HostError> {
        let result = self.host.mining_status().await;
        self.record(HostOp::MiningStatus, json!({}), &result);
        Ok(Some(describe_mining(&result?)))
    }

    async fn list_scripts(&self) -> Result<Option<String>, HostError> {
        let result = self.host.list_scripts().await;
        self.record(HostOp::ListScripts, json!({}), &result);
        let names: Vec<String> = result?.into_iter().map(|s| s.name).collect();
        Ok(Some(if names.is_empty() {
            "Scripts: none.".to_string()
        } else {
            format!("Scripts: {}.", names.join(", "))
        }))
    }

    async fn script_code(
        &self,
        target: &ScriptRef,
        turn: &TurnContext<'_>,
    ) -> Result<Option<String>, HostError> {
        let Some(name) = resolve_name(target.name.as_deref(), turn) else {
            return Ok(Some(NO_SCRIPT_NAME.to_string()));
        };
        let result = self.host.script_code(name).await;
        self.record(HostOp::GetScriptCode, json!({"name": name}), &result);

        Ok(Some(match result? {
            Some(code) => format!(
                "Script \"{}\":\n{}",
                name,
                preview(&code, self.settings.preview_limit)
            ),
            None => missing_script(name),
        }))
    }

    /// Deletion never falls back to the turn's default script.
    async fn delete_script(&self, args: &DeleteScriptArgs) -> Result<Option<String>, HostError> {
        let name = args.name.trim();
        if name.is_empty() {
            return Ok(Some(NO_SCRIPT_NAME.to_string()));
        }
        let result = self.host.delete_script(name).await;
        self.record(HostOp::DeleteScript, json!({"name": name}), &result);
        let outcome = result?;

        Ok(Some(match refusal(&outcome, &format!("Could not delete \"{}\"", name)) {
            Some(error) => error,
            None => format!("Script \"{}\" deleted.", name),
        }))
    }

    async fn run_script(
        &self,
        target: &ScriptRef,
        turn: &TurnContext<'_>,
    ) -> Result<Option<String>, HostError> {
        let Some(name) = resolve_name(target.name.as_deref(), turn) else {
            return Ok(Some(NO_SCRIPT_NAME.to_string()));
        };
        let result = self.host.run_script(name).await;
        self.record(HostOp::RunScript, json!({"name": name}), &result);
        let outcome = result?;

        Ok(Some(match refusal(&outcome, &format!("Could not run \"{}\"", name)) {
            Some(error) => error,
            None => format!("Script \"{}\" is running.", name),
        }))
    }

    async fn create_script(
        &self,
        args: &CreateScriptArgs,
        turn: &TurnContext<'_>,
    ) -> Result<Option<String>, HostError> {
        let name = args.name.trim();
        let code = match self.synthesize(name, &args.goal, None, turn).await {
            Ok(code) => code,
            Err(fragment) => return Ok(Some(fragment)),
        };

        let description = args.description.as_deref();
        let result = self.host.create_script(name, &code, description).await;
        self.record(
            HostOp::CreateScript,
            json!({"name": name, "code": code, "description": description}),
            &result,
        );
        let outcome = result?;

        Ok(Some(match refusal(&outcome, &format!("Could not create \"{}\"", name)) {
            Some(error) => error,
            None => format!("Script \"{}\" created.", name),
        }))
    }

    async fn update_script(
        &self,
        args: &UpdateScriptArgs,
        turn: &TurnContext<'_>,
    ) -> Result<Option<String>, HostError> {
        let Some(name) = resolve_name(args.name.as_deref(), turn) else {
            return Ok(Some(NO_SCRIPT_NAME.to_string()));
        };

        let current = self.host.script_code(name).await;
        self.record(HostOp::GetScriptCode, json!({"name": name}), &current);
        let Some(current) = current? else {
            tracing::info!("Skipping update of {}: script does not exist", name);
            return Ok(Some(missing_script(name)));
        };

        let code = match self.synthesize(name, &args.goal, Some(&current), turn).await {
            Ok(code) => code,
            Err(fragment) => return Ok(Some(fragment)),
        };

        let result = self.host.update_script(name, &code).await;
        self.record(
            HostOp::UpdateScript,
            json!({"name": name, "code": code}),
            &result,
        );
        let outcome = result?;

        Ok(Some(match refusal(&outcome, &format!("Could not update \"{}\"", name)) {
            Some(error) => error,
            None => format!("Script \"{}\" updated.", name),
        }))
    }

    /// Run script synthesis. A failure comes back as the reply fragment.
    async fn synthesize(
        &self,
        name: &str,
        goal: &str,
        existing_code: Option<&str>,
        turn: &TurnContext<'_>,
    ) -> Result<String, String> {
        let history = self.history.transcript(self.settings.synthesis_window);
        let request = SynthesisRequest {
            script_name: name,
            goal,
            existing_code,
            history: &history,
        };

        self.synthesizer
            .synthesize(request, turn.config)
            .await
            .map_err(|e| {
                tracing::warn!("Synthesis of script {} failed: {}", name, e);
                format!("Could not write script \"{}\": {}", name, e)
            })
    }
}

const NO_SCRIPT_NAME: &str = "No script name given and no default script is selected.";

fn to_input<T: Serialize>(args: &T) -> Value {
    serde_json::to_value(args).unwrap_or_default()
}

/// Explicit name if given, otherwise the turn's default.
fn resolve_name<'a>(explicit: Option<&'a str>, turn: &TurnContext<'a>) -> Option<&'a str> {
    explicit
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .or_else(|| Some(turn.default_script.trim()).filter(|n| !n.is_empty()))
}

/// Error fragment for a refused operation, `None` when it succeeded.
fn refusal(outcome: &OpResult, prefix: &str) -> Option<String> {
    if outcome.ok {
        return None;
    }
    tracing::warn!("{}: {:?}", prefix, outcome.error);
    Some(format!(
        "{}: {}",
        prefix,
        outcome.error.as_deref().unwrap_or("unknown error")
    ))
}

fn missing_script(name: &str) -> String {
    format!("Script \"{}\" does not exist.", name)
}

fn format_hit(hit: &ScanHit) -> String {
    let p = hit.position;
    format!(
        "• {} @ ({:.0}, {:.0}, {:.0}) [{:.0}]",
        hit.resource, p.x, p.y, p.z, hit.distance
    )
}

/// First `limit` characters, with an ellipsis only when something was cut.
pub fn preview(code: &str, limit: usize) -> String {
    let mut chars = code.chars();
    let head: String = chars.by_ref().take(limit).collect();
    if chars.next().is_some() {
        format!("{}…", head)
    } else {
        head
    }
}

fn describe_mining(status: &MiningStatus) -> String {
    let resource = status
        .resource
        .map(|r| r.as_str())
        .unwrap_or("ore");

    match status.state {
        MiningState::Idle => match status.last_event.as_deref() {
            Some("depleted") => format!(
                "Mining is idle. The last {} deposit was depleted.",
                resource
            ),
            _ => "Mining is idle.".to_string(),
        },
        MiningState::Approaching => match status.distance {
            Some(distance) => format!(
                "Approaching the {} deposit, {:.0} units away.",
                resource, distance
            ),
            None => format!("Approaching the {} deposit.", resource),
        },
        MiningState::Mining => {
            let mut text = format!("Mining {}", resource);
            if let Some(remaining) = status.remaining {
                text.push_str(&format!(": ~{:.1} remaining", remaining));
            }
            if let Some(rate) = status.rate {
                text.push_str(&format!(" at {}/s", rate));
            }
            text.push('.');
            text
        }
    }
}
