//! The command bridge: one utterance in, one assistant message out.

use std::sync::{Arc, RwLock};
use std::time::Instant;

use serde_json::Value;

use crate::agent::dispatcher::{DispatchSettings, ToolDispatcher, TurnContext};
use crate::agent::prompt::{PromptComposer, PromptInput};
use crate::config::{BridgeConfig, BridgeOptions};
use crate::error::{BridgeError, Result};
use crate::history::{HistoryStore, Message};
use crate::intent::{IntentValidator, intent_schema};
use crate::llm::{CompletionGateway, CompletionRequest};
use crate::script::ScriptSynthesizer;
use crate::tools::Host;

/// Reply used when the backend produced neither words nor a result.
const EMPTY_REPLY: &str = "I did not catch that. Could you rephrase?";

/// Turns natural-language commands into host actions.
///
/// Turns are serialized: a second `send` waits until the first has
/// appended its reply.
pub struct CommandBridge {
    gateway: Arc<dyn CompletionGateway>,
    history: Arc<HistoryStore>,
    composer: PromptComposer,
    validator: IntentValidator,
    dispatcher: ToolDispatcher,
    options: BridgeOptions,
    config: RwLock<BridgeConfig>,
    turn: tokio::sync::Mutex<()>,
}

impl CommandBridge {
    pub fn new(
        gateway: Arc<dyn CompletionGateway>,
        host: Arc<dyn Host>,
        config: BridgeConfig,
        options: BridgeOptions,
    ) -> Self {
        let history = Arc::new(HistoryStore::new());
        let synthesizer = ScriptSynthesizer::new(Arc::clone(&gateway))
            .with_max_steps(options.max_synthesis_steps)
            .with_timeout(options.round_trip_timeout);
        let dispatcher = ToolDispatcher::new(
            host,
            synthesizer,
            Arc::clone(&history),
            DispatchSettings {
                preview_limit: options.preview_limit,
                synthesis_window: options.synthesis_window,
                log_tool_calls: options.profile.logs_tool_calls(),
            },
        );

        Self {
            gateway,
            history,
            composer: PromptComposer::new(options.profile),
            validator: IntentValidator::new(options.profile),
            dispatcher,
            options,
            config: RwLock::new(config),
            turn: tokio::sync::Mutex::new(()),
        }
    }

    /// Run one turn.
    ///
    /// `fallback_name` is the script used when an action omits a name;
    /// `fallback_code` is the editor buffer, offered to the backend as
    /// context. Only a failed or timed-out intent round-trip is an error.
    /// The user message stays in the history either way.
    pub async fn send(
        &self,
        utterance: &str,
        fallback_name: &str,
        fallback_code: &str,
    ) -> Result<Message> {
        let _turn = self.turn.lock().await;
        let config = self.config();
        let started = Instant::now();

        let window = self.history.transcript(self.options.prompt_window);
        let prompt = self.composer.compose(&PromptInput {
            history: &window,
            utterance,
            default_script: fallback_name,
            editor_code: fallback_code,
        });
        self.history.append(Message::user(utterance));

        tracing::info!(
            "Starting turn with model {} ({} messages in history)",
            config.model,
            self.history.len()
        );
        tracing::debug!(
            "Composed intent prompt: {} system chars, {} context chars",
            prompt.system.len(),
            prompt.context.len()
        );

        let request = CompletionRequest::new(
            prompt.system,
            intent_schema(self.options.profile),
            prompt.context,
        )
        .with_config(&config)
        .with_schema_name("intent")
        .with_temperature(0.3);

        let raw = self.round_trip(request).await.inspect_err(|e| {
            tracing::error!(
                "Intent round-trip to {} failed: {}",
                self.gateway.provider_name(),
                e
            );
        })?;

        let validated = self.validator.validate(&raw);
        for violation in &validated.violations {
            tracing::warn!("Intent schema violation: {}", violation);
        }
        let intent = validated.intent;

        let fragment = match &intent.call {
            Some(action) => {
                let turn = TurnContext {
                    config: &config,
                    default_script: fallback_name,
                };
                self.dispatcher.dispatch(action, &turn).await
            }
            None => None,
        };

        let reply = Message::assistant(compose_reply(&intent.say, fragment.as_deref()));
        self.history.append(reply.clone());

        tracing::info!(
            "Turn completed with action {} in {}ms",
            intent.call.as_ref().map(|a| a.name().as_str()).unwrap_or("none"),
            started.elapsed().as_millis()
        );
        Ok(reply)
    }

    async fn round_trip(&self, request: CompletionRequest) -> Result<Value> {
        let call = self.gateway.complete(request);
        match self.options.round_trip_timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| BridgeError::Timeout(limit))?
                .map_err(BridgeError::from),
            None => call.await.map_err(BridgeError::from),
        }
    }

    /// Snapshot of every message so far, oldest first.
    pub fn history(&self) -> Vec<Message> {
        self.history.snapshot()
    }

    /// Current configuration.
    pub fn config(&self) -> BridgeConfig {
        self.config
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Replace the configuration. Takes effect from the next turn.
    pub fn set_config(&self, config: BridgeConfig) {
        tracing::info!("Bridge reconfigured for model {}", config.model);
        *self.config.write().unwrap_or_else(|e| e.into_inner()) = config;
    }

    pub fn options(&self) -> &BridgeOptions {
        &self.options
    }
}

/// Join the backend's words with the action's result.
fn compose_reply(say: &str, fragment: Option<&str>) -> String {
    match (say.trim(), fragment) {
        ("", None) => EMPTY_REPLY.to_string(),
        (say, None) => say.to_string(),
        ("", Some(fragment)) => fragment.to_string(),
        (say, Some(fragment)) if fragment.contains('\n') => format!("{}\n{}", say, fragment),
        (say, Some(fragment)) => format!("{} {}", say, fragment),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::config::BridgeProfile;
    use crate::error::LlmError;
    use crate::history::Role;
    use crate::llm::replay::{ReplayGateway, StalledGateway};
    use crate::tools::{
        Failure, HostOp, MiningState, MiningStatus, Resource, SimulatedHost, Vec3,
    };
    use pretty_assertions::assert_eq;
    use secrecy::SecretString;
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};

    fn bridge(
        gateway: Arc<ReplayGateway>,
        host: Arc<SimulatedHost>,
        options: BridgeOptions,
    ) -> CommandBridge {
        CommandBridge::new(gateway, host, BridgeConfig::default(), options)
    }

    fn roles(bridge: &CommandBridge) -> Vec<Role> {
        bridge.history().iter().map(|m| m.role).collect()
    }

    fn tool_names(bridge: &CommandBridge) -> Vec<String> {
        bridge
            .history()
            .into_iter()
            .filter_map(|m| m.meta.map(|meta| meta.name))
            .collect()
    }

    #[tokio::test]
    async fn test_move_turn() {
        let gateway = Arc::new(ReplayGateway::new(vec![json!({
            "say": "Rumo a (500, 0, 250).",
            "call": {"name": "move", "args": {"x": 500, "y": 0, "z": 250}}
        })]));
        let host = Arc::new(SimulatedHost::new());
        let bridge = bridge(gateway.clone(), host.clone(), BridgeOptions::default());

        let reply = assert_ok!(bridge.send("Mova a nave para 500, 0, 250", "patrol", "").await);

        assert_eq!(reply.role, Role::Assistant);
        assert_eq!(reply.content, "Rumo a (500, 0, 250).");
        assert_eq!(roles(&bridge), vec![Role::User, Role::Tool, Role::Assistant]);
        assert_eq!(host.ops(), vec![HostOp::Move]);
        assert_eq!(host.calls()[0].input, json!({"x": 500.0, "y": 0.0, "z": 250.0}));
        assert_eq!(gateway.calls(), 1);
        assert!(gateway.requests()[0].context.ends_with("User: Mova a nave para 500, 0, 250"));
    }

    #[tokio::test]
    async fn test_create_script_turn() {
        let gateway = Arc::new(ReplayGateway::new(vec![
            json!({
                "say": "Vou escrever o script.",
                "call": {"name": "create_script", "args": {"name": "patrol", "goal": "patrulhar o setor"}}
            }),
            json!({"code": "while (true) { await performScan(); await sleep(5000); }"}),
        ]));
        let host = Arc::new(SimulatedHost::new());
        let bridge = bridge(gateway.clone(), host.clone(), BridgeOptions::default());

        let reply = bridge.send("crie um script de patrulha", "", "").await.unwrap();

        assert_eq!(reply.content, "Vou escrever o script. Script \"patrol\" created.");
        assert_eq!(gateway.calls(), 2);
        assert_eq!(gateway.requests()[1].schema_name, "script");
        assert!(gateway.requests()[1].context.contains("Goal: patrulhar o setor"));
        assert!(host.script("patrol").is_some());
        assert_eq!(tool_names(&bridge), vec!["create_script"]);
    }

    #[tokio::test]
    async fn test_update_nonexistent_script() {
        let gateway = Arc::new(ReplayGateway::new(vec![json!({
            "say": "Atualizando.",
            "call": {"name": "update_script", "args": {"name": "ghost", "goal": "faster"}}
        })]));
        let host = Arc::new(SimulatedHost::new());
        let bridge = bridge(gateway.clone(), host.clone(), BridgeOptions::default());

        let reply = bridge.send("deixe o ghost mais rápido", "", "").await.unwrap();

        assert_eq!(reply.content, "Atualizando. Script \"ghost\" does not exist.");
        assert_eq!(gateway.calls(), 1);
        assert_eq!(host.count(HostOp::UpdateScript), 0);
        assert_eq!(host.count(HostOp::CreateScript), 0);
        assert_eq!(tool_names(&bridge), vec!["get_script_code"]);
    }

    #[tokio::test]
    async fn test_delete_without_name_keeps_default_script() {
        let gateway = Arc::new(ReplayGateway::new(vec![json!({
            "say": "Apagando.",
            "call": {"name": "delete_script", "args": {}}
        })]));
        let host = Arc::new(SimulatedHost::new().with_script("patrol", "await sleep(1);", None));
        let bridge = bridge(gateway, host.clone(), BridgeOptions::default());

        let reply = bridge.send("apague o script", "patrol", "").await.unwrap();

        assert_eq!(reply.content, "Apagando.");
        assert!(host.ops().is_empty());
        assert!(host.script("patrol").is_some());
        assert_eq!(roles(&bridge), vec![Role::User, Role::Assistant]);
    }

    #[tokio::test]
    async fn test_mining_status_turn() {
        let gateway = Arc::new(ReplayGateway::new(vec![json!({
            "say": "Status:",
            "call": {"name": "mining_status"}
        })]));
        let host = Arc::new(SimulatedHost::new().with_mining_status(MiningStatus {
            state: MiningState::Mining,
            resource: Some(Resource::Iron),
            remaining: Some(12.34),
            rate: Some(2.0),
            ..Default::default()
        }));
        let bridge = bridge(gateway, host, BridgeOptions::default());

        let reply = bridge.send("como está a mineração?", "", "").await.unwrap();
        assert_eq!(reply.content, "Status: Mining iron: ~12.3 remaining at 2/s.");
    }

    #[tokio::test]
    async fn test_read_only_turns_are_idempotent() {
        let turn = json!({"say": "Carga:", "call": {"name": "get_resources"}});
        let gateway = Arc::new(ReplayGateway::new(vec![turn.clone(), turn]));
        let host = Arc::new(SimulatedHost::new());
        let bridge = bridge(gateway, host, BridgeOptions::default());

        let first = bridge.send("carga?", "", "").await.unwrap();
        let second = bridge.send("carga?", "", "").await.unwrap();
        assert_eq!(first.content, second.content);
    }

    #[tokio::test]
    async fn test_script_code_preview_boundary() {
        let code = "a".repeat(400);
        let turn = json!({"say": "", "call": {"name": "get_script_code"}});
        let gateway = Arc::new(ReplayGateway::new(vec![turn]));
        let host = Arc::new(SimulatedHost::new().with_script("patrol", &code, None));
        let bridge = bridge(gateway, host, BridgeOptions::default());

        let reply = bridge.send("mostre o código", "patrol", &code).await.unwrap();
        assert_eq!(reply.content, format!("Script \"patrol\":\n{}", code));
    }

    #[tokio::test]
    async fn test_history_window_feeds_prompt() {
        let gateway = Arc::new(ReplayGateway::new(vec![
            json!({"say": "um"}),
            json!({"say": "dois"}),
        ]));
        let host = Arc::new(SimulatedHost::new());
        let bridge = bridge(gateway.clone(), host, BridgeOptions::default());

        bridge.send("primeiro", "", "").await.unwrap();
        let before = bridge.history();
        bridge.send("segundo", "", "").await.unwrap();

        let requests = gateway.requests();
        assert!(!requests[0].context.contains("Recent conversation"));
        assert!(requests[1]
            .context
            .starts_with("Recent conversation:\nuser: primeiro\nassistant: um\n"));

        let after = bridge.history();
        assert_eq!(after.len(), 4);
        for (a, b) in before.iter().zip(after.iter()) {
            assert_eq!(a.id, b.id);
        }
    }

    #[tokio::test]
    async fn test_unknown_action_is_ignored() {
        let gateway = Arc::new(ReplayGateway::new(vec![json!({
            "say": "Olá, comandante.",
            "call": {"name": "self_destruct", "args": {}}
        })]));
        let host = Arc::new(SimulatedHost::new());
        let bridge = bridge(gateway, host.clone(), BridgeOptions::default());

        let reply = bridge.send("olá", "", "").await.unwrap();
        assert_eq!(reply.content, "Olá, comandante.");
        assert!(host.ops().is_empty());
        assert_eq!(roles(&bridge), vec![Role::User, Role::Assistant]);
    }

    #[tokio::test]
    async fn test_host_rejection_completes_turn() {
        let gateway = Arc::new(ReplayGateway::new(vec![json!({
            "say": "Partindo.",
            "call": {"name": "move", "args": {"x": 1, "y": 2, "z": 3}}
        })]));
        let host = Arc::new(SimulatedHost::new());
        host.fail(HostOp::Move, Failure::Disconnect("link down".to_string()));
        let bridge = bridge(gateway, host, BridgeOptions::default());

        let reply = bridge.send("vá", "", "").await.unwrap();
        assert!(reply.content.starts_with("Partindo.\n") || reply.content.starts_with("Partindo. "));
        assert!(reply.content.contains("link down"));
        assert_eq!(roles(&bridge), vec![Role::User, Role::Tool, Role::Assistant]);
    }

    #[tokio::test]
    async fn test_transport_failure_keeps_user_message() {
        let gateway = Arc::new(ReplayGateway::new(vec![]).then_fail("503"));
        let host = Arc::new(SimulatedHost::new());
        let bridge = bridge(gateway, host, BridgeOptions::default());

        let err = assert_err!(bridge.send("status", "", "").await);
        assert!(matches!(
            err,
            BridgeError::Llm(LlmError::RequestFailed { .. })
        ));
        assert_eq!(roles(&bridge), vec![Role::User]);
    }

    #[tokio::test]
    async fn test_round_trip_timeout() {
        let host = Arc::new(SimulatedHost::new());
        let options = BridgeOptions::default().with_timeout(Some(Duration::from_millis(50)));
        let bridge = CommandBridge::new(
            Arc::new(StalledGateway),
            host,
            BridgeConfig::default(),
            options,
        );

        let err = bridge.send("status", "", "").await.unwrap_err();
        assert!(matches!(err, BridgeError::Timeout(_)));
        assert_eq!(roles(&bridge), vec![Role::User]);

        // The bridge stays usable after a timed-out turn.
        let err = bridge.send("status", "", "").await.unwrap_err();
        assert!(matches!(err, BridgeError::Timeout(_)));
        assert_eq!(bridge.history().len(), 2);
    }

    #[tokio::test]
    async fn test_minimal_profile() {
        let gateway = Arc::new(ReplayGateway::new(vec![
            json!({"say": "Escaneando.", "call": {"name": "perform_scan"}}),
            json!({"say": "Não posso.", "call": {"name": "create_script", "args": {"name": "a", "goal": "b"}}}),
        ]));
        let host = Arc::new(
            SimulatedHost::new().with_deposit(Resource::Iron, Vec3::new(10.0, 0.0, 0.0), 5.0),
        );
        let options = BridgeOptions::default().with_profile(BridgeProfile::Minimal);
        let bridge = bridge(gateway.clone(), host.clone(), options);

        let reply = bridge.send("scan", "", "").await.unwrap();
        assert_eq!(reply.content, "Escaneando. Scan complete: 1 new discovery.");
        assert!(tool_names(&bridge).is_empty());

        let reply = bridge.send("crie um script", "", "").await.unwrap();
        assert_eq!(reply.content, "Não posso.");
        assert_eq!(gateway.calls(), 2);
        assert_eq!(host.ops(), vec![HostOp::PerformScan]);
    }

    #[tokio::test]
    async fn test_config_is_read_per_turn() {
        let gateway = Arc::new(ReplayGateway::new(vec![
            json!({"say": "a"}),
            json!({"say": "b"}),
        ]));
        let host = Arc::new(SimulatedHost::new());
        let bridge = bridge(gateway.clone(), host, BridgeOptions::default());

        bridge.send("one", "", "").await.unwrap();
        bridge.set_config(BridgeConfig::new(
            Some(SecretString::from("sk-test".to_string())),
            "other-model",
        ));
        bridge.send("two", "", "").await.unwrap();

        let requests = gateway.requests();
        assert_eq!(requests[0].model, crate::config::DEFAULT_MODEL);
        assert!(requests[0].api_key.is_none());
        assert_eq!(requests[1].model, "other-model");
        assert!(requests[1].api_key.is_some());
        assert_eq!(bridge.config().model, "other-model");
    }

    #[tokio::test]
    async fn test_turns_are_serialized() {
        let gateway = Arc::new(
            ReplayGateway::new(vec![json!({"say": "first"}), json!({"say": "second"})])
                .with_delay(Duration::from_millis(20)),
        );
        let host = Arc::new(SimulatedHost::new());
        let bridge = bridge(gateway.clone(), host, BridgeOptions::default());

        let (a, b) = tokio::join!(bridge.send("a", "", ""), bridge.send("b", "", ""));
        a.unwrap();
        b.unwrap();

        assert_eq!(gateway.max_in_flight(), 1);
        assert_eq!(
            roles(&bridge),
            vec![Role::User, Role::Assistant, Role::User, Role::Assistant]
        );
    }

    #[test]
    fn test_compose_reply() {
        assert_eq!(compose_reply("Ok.", None), "Ok.");
        assert_eq!(compose_reply("", Some("Mining stopped.")), "Mining stopped.");
        assert_eq!(compose_reply("Ok.", Some("Mining stopped.")), "Ok. Mining stopped.");
        assert_eq!(compose_reply("Found:", Some("a\nb")), "Found:\na\nb");
        assert_eq!(compose_reply("  ", None), EMPTY_REPLY);
    }
}
