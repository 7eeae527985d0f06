//! Script synthesis: goal (+ existing code) in, runnable script out.
//!
//! One synthesis is a bounded loop of generation steps. Each candidate is
//! linted; a rejected candidate goes back to the backend with the findings.
//! Callers see a single blocking call.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};

use crate::config::BridgeConfig;
use crate::error::{LlmError, SynthesisError};
use crate::llm::{CompletionGateway, CompletionRequest};
use crate::script::lint::{LintFinding, lint, strip_fences};

/// Host-runtime primitives a script may call, with their signatures.
pub const RUNTIME_PRIMITIVES: &[(&str, &str)] = &[
    ("moveTo(x, y, z)", "fly to coordinates; resolves when the course is set"),
    ("scanSector({ resource?, limit? })", "list known deposits, nearest first"),
    ("performScan()", "active scan; returns ids of new deposits"),
    ("startMining(resource)", "mine the nearest known 'iron' | 'silicon' | 'uranium' deposit"),
    ("stopMining()", "stop the mining laser"),
    ("getMiningStatus()", "{ state: 'idle' | 'approaching' | 'mining', resource, distance, remaining, rate }"),
    ("getShipStatus()", "{ position: { x, y, z }, speed } or null"),
    ("getResources()", "{ iron, silicon, uranium }"),
    ("memory.get(key)", "read a value persisted between runs"),
    ("memory.set(key, value)", "persist a value between runs"),
    ("sleep(ms)", "cooperative wait; always await it inside loops"),
];

/// What to synthesize.
#[derive(Debug, Clone, Copy)]
pub struct SynthesisRequest<'a> {
    pub script_name: &'a str,
    pub goal: &'a str,
    /// Current code when editing an existing script.
    pub existing_code: Option<&'a str>,
    /// Recent history lines, oldest first.
    pub history: &'a [String],
}

/// Generates scripts through the completion gateway.
pub struct ScriptSynthesizer {
    gateway: Arc<dyn CompletionGateway>,
    max_steps: u32,
    timeout: Option<Duration>,
}

impl ScriptSynthesizer {
    pub fn new(gateway: Arc<dyn CompletionGateway>) -> Self {
        Self {
            gateway,
            max_steps: 3,
            timeout: None,
        }
    }

    /// Bound the number of generation steps. At least one step always runs.
    pub fn with_max_steps(mut self, steps: u32) -> Self {
        self.max_steps = steps.max(1);
        self
    }

    /// Bound each generation step.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Produce raw script text for the request.
    pub async fn synthesize(
        &self,
        request: SynthesisRequest<'_>,
        config: &BridgeConfig,
    ) -> Result<String, SynthesisError> {
        let system_prompt = system_prompt();
        let mut feedback: Option<(String, Vec<LintFinding>)> = None;

        for step in 1..=self.max_steps {
            let context = build_context(&request, feedback.as_ref());
            let completion = CompletionRequest::new(system_prompt.clone(), schema(), context)
                .with_config(config)
                .with_schema_name("script")
                .with_temperature(0.2)
                .with_max_tokens(4096);

            tracing::debug!(
                "Synthesis step {} for {} via {}",
                step,
                request.script_name,
                self.gateway.provider_name()
            );
            let raw = self.round_trip(completion).await?;
            let code = extract_code(&raw);
            let findings = lint(&code);

            if findings.is_empty() {
                tracing::info!(
                    "Synthesized script {} in {} step(s), {} bytes",
                    request.script_name,
                    step,
                    code.len()
                );
                return Ok(code);
            }

            tracing::warn!(
                "Rejected script {} at step {}: {}",
                request.script_name,
                step,
                join_findings(&findings)
            );
            feedback = Some((code, findings));
        }

        let findings = feedback
            .map(|(_, findings)| join_findings(&findings))
            .unwrap_or_default();
        Err(SynthesisError::Rejected {
            attempts: self.max_steps,
            findings,
        })
    }

    async fn round_trip(&self, request: CompletionRequest) -> Result<Value, LlmError> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.gateway.complete(request))
                .await
                .map_err(|_| LlmError::Timeout(limit))?,
            None => self.gateway.complete(request).await,
        }
    }
}

fn schema() -> Value {
    json!({
        "type": "object",
        "properties": {"code": {"type": "string", "minLength": 1}},
        "required": ["code"]
    })
}

/// Fixed instructions for every synthesis round-trip.
pub fn system_prompt() -> String {
    let primitives: Vec<String> = RUNTIME_PRIMITIVES
        .iter()
        .map(|(sig, doc)| format!("- {}: {}", sig, doc))
        .collect();

    format!(
        r#"You write automation scripts for a mining ship. Scripts are JavaScript and run inside the ship's script runtime.

## Runtime API
Every primitive is async; await each call. Nothing else from the host is available:
{}

## Rules
- Return the complete script, ready to run. Never leave placeholders, TODO markers or instructions to fill something in.
- Repeat work with loops (`while`, `for`) and `await sleep(ms)`. Never use recursion to iterate.
- Handle `null` from getShipStatus() and failed startMining() results.
- Use memory.get/memory.set for anything that must survive between runs.
- Respond with JSON {{"code": "<script>"}}. No markdown fences, no commentary."#,
        primitives.join("\n")
    )
}

fn build_context(
    request: &SynthesisRequest<'_>,
    feedback: Option<&(String, Vec<LintFinding>)>,
) -> String {
    let mut context = String::new();

    if !request.history.is_empty() {
        context.push_str("Recent conversation:\n");
        for line in request.history {
            context.push_str(line);
            context.push('\n');
        }
        context.push('\n');
    }

    context.push_str(&format!("Script name: {}\n", request.script_name));
    context.push_str(&format!("Goal: {}\n", request.goal));

    if let Some(existing) = request.existing_code {
        context.push_str("\nCurrent code (rewrite it to meet the goal, keep what still applies):\n");
        context.push_str(existing);
        context.push('\n');
    }

    if let Some((rejected, findings)) = feedback {
        context.push_str("\nYour previous attempt was rejected:\n");
        for finding in findings {
            context.push_str(&format!("- {}\n", finding));
        }
        context.push_str("Previous attempt:\n");
        context.push_str(rejected);
        context.push('\n');
    }

    context
}

/// Pull script text out of a backend result.
fn extract_code(raw: &Value) -> String {
    let text = match raw {
        Value::Object(obj) => obj
            .get("code")
            .and_then(Value::as_str)
            .unwrap_or_default(),
        Value::String(s) => s.as_str(),
        _ => "",
    };
    strip_fences(text)
}

fn join_findings(findings: &[LintFinding]) -> String {
    findings
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::replay::ReplayGateway;

    fn request<'a>(existing: Option<&'a str>, history: &'a [String]) -> SynthesisRequest<'a> {
        SynthesisRequest {
            script_name: "patrol",
            goal: "patrulhar o setor",
            existing_code: existing,
            history,
        }
    }

    #[tokio::test]
    async fn test_single_step_when_clean() {
        let gateway = Arc::new(ReplayGateway::new(vec![json!({"code": "```js\nawait performScan();\n```"})]));
        let synth = ScriptSynthesizer::new(gateway.clone());

        let code = synth
            .synthesize(request(None, &[]), &BridgeConfig::default())
            .await
            .unwrap();

        assert_eq!(code, "await performScan();");
        let seen = gateway.requests();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].context.contains("Goal: patrulhar o setor"));
        assert!(!seen[0].context.contains("Current code"));
        assert!(seen[0].system_prompt.contains("sleep(ms)"));
    }

    #[tokio::test]
    async fn test_existing_code_and_history_in_context() {
        let gateway = Arc::new(ReplayGateway::new(vec![json!({"code": "await sleep(10);"})]));
        let synth = ScriptSynthesizer::new(gateway.clone());
        let history = vec!["user: make it slower".to_string()];

        synth
            .synthesize(request(Some("await sleep(1);"), &history), &BridgeConfig::default())
            .await
            .unwrap();

        let context = &gateway.requests()[0].context;
        assert!(context.contains("Current code"));
        assert!(context.contains("await sleep(1);"));
        assert!(context.starts_with("Recent conversation:\nuser: make it slower"));
    }

    #[tokio::test]
    async fn test_rejected_candidate_is_retried_with_feedback() {
        let gateway = Arc::new(ReplayGateway::new(vec![
            json!({"code": "// TODO: write patrol"}),
            json!({"code": "while (true) { await sleep(1000); }"}),
        ]));
        let synth = ScriptSynthesizer::new(gateway.clone());

        let code = synth
            .synthesize(request(None, &[]), &BridgeConfig::default())
            .await
            .unwrap();

        assert_eq!(code, "while (true) { await sleep(1000); }");
        let seen = gateway.requests();
        assert_eq!(seen.len(), 2);
        assert!(seen[1].context.contains("previous attempt was rejected"));
    }

    #[tokio::test]
    async fn test_step_bound() {
        let gateway = Arc::new(ReplayGateway::new(vec![
            json!({"code": ""}),
            json!({"code": ""}),
            json!({"code": ""}),
        ]));
        let synth = ScriptSynthesizer::new(gateway.clone()).with_max_steps(2);

        let err = synth
            .synthesize(request(None, &[]), &BridgeConfig::default())
            .await
            .unwrap_err();

        assert!(matches!(err, SynthesisError::Rejected { attempts: 2, .. }));
        assert_eq!(gateway.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_gateway_failure_propagates() {
        let gateway = Arc::new(ReplayGateway::new(vec![]));
        let synth = ScriptSynthesizer::new(gateway);
        let err = synth
            .synthesize(request(None, &[]), &BridgeConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SynthesisError::Llm(_)));
    }
}
