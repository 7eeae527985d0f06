//! Terminal front end: a REPL over a simulated ship.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use secrecy::SecretString;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use shipclaw::config::parse_timeout;
use shipclaw::llm::create_gateway;
use shipclaw::tools::SimulatedHost;
use shipclaw::{BridgeConfig, BridgeOptions, BridgeProfile, CommandBridge, Role};

#[derive(Parser, Debug)]
#[command(name = "shipclaw", version, about = "Talk to your mining ship")]
struct Cli {
    /// Model used for both intent and script generation
    #[arg(long, env = "SHIPCLAW_MODEL")]
    model: Option<String>,

    /// OpenAI-compatible endpoint
    #[arg(long, env = "SHIPCLAW_BASE_URL")]
    base_url: Option<String>,

    /// Action profile: full or minimal
    #[arg(long, env = "SHIPCLAW_PROFILE")]
    profile: Option<BridgeProfile>,

    /// Seconds per generation round-trip, 0 to wait indefinitely
    #[arg(long, env = "SHIPCLAW_TIMEOUT_SECS")]
    timeout_secs: Option<String>,

    /// Script used when a command does not name one
    #[arg(long, default_value = "patrol")]
    script: String,

    /// File whose contents are offered as the open editor buffer
    #[arg(long)]
    editor: Option<PathBuf>,
}

/// REPL line history, relative to the working directory.
const HISTORY_FILE: &str = ".shipclaw_history";

const HELP: &str = "\
/history        show the conversation and tool calls
/config         show model and profile
/model <name>   switch model from the next turn
/key <key>      set the API key from the next turn
/tick <secs>    advance the simulation
/quit           leave";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shipclaw=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = BridgeConfig::from_env();
    if let Some(model) = cli.model {
        config.model = model;
    }
    if !config.has_api_key() {
        tracing::warn!("No API key configured; set SHIPCLAW_API_KEY or use /key");
    }

    let mut options = BridgeOptions::from_env()?;
    if let Some(url) = cli.base_url {
        options.base_url = url;
    }
    if let Some(profile) = cli.profile {
        options.profile = profile;
    }
    if let Some(raw) = cli.timeout_secs.as_deref() {
        options.round_trip_timeout = parse_timeout(raw)?;
    }

    let host = Arc::new(SimulatedHost::demo());
    let gateway = create_gateway(&options);
    let bridge = CommandBridge::new(gateway, host.clone(), config, options);

    println!("shipclaw ready. Type /help for commands.");
    let mut editor = DefaultEditor::new()?;
    if editor.load_history(HISTORY_FILE).is_err() {
        tracing::debug!("No REPL history at {}", HISTORY_FILE);
    }

    loop {
        let line = match editor.readline("bridge> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        editor.add_history_entry(input)?;

        if let Some(command) = input.strip_prefix('/') {
            let (name, arg) = command
                .split_once(char::is_whitespace)
                .map(|(n, a)| (n, a.trim()))
                .unwrap_or((command, ""));
            match name {
                "quit" | "exit" => break,
                "help" => println!("{}", HELP),
                "history" => {
                    for message in bridge.history() {
                        let time = message.created_at.format("%H:%M:%S");
                        match message.role {
                            Role::Tool => println!("  {} {}", time, message.content),
                            _ => println!("{} {}", time, message.transcript_line()),
                        }
                    }
                }
                "config" => {
                    let config = bridge.config();
                    println!(
                        "model: {}\napi key: {}\nprofile: {:?}",
                        config.model,
                        if config.has_api_key() { "set" } else { "missing" },
                        bridge.options().profile
                    );
                }
                "model" if !arg.is_empty() => {
                    let mut config = bridge.config();
                    config.model = arg.to_string();
                    bridge.set_config(config);
                }
                "key" if !arg.is_empty() => {
                    let mut config = bridge.config();
                    config.api_key = Some(SecretString::from(arg.to_string()));
                    bridge.set_config(config);
                }
                "tick" => match arg.parse::<f64>() {
                    Ok(secs) if secs >= 0.0 => host.advance(Duration::from_secs_f64(secs)),
                    _ => println!("usage: /tick <seconds>"),
                },
                _ => println!("Unknown command. Type /help."),
            }
            continue;
        }

        let buffer = read_editor_buffer(cli.editor.as_deref()).await;

        match bridge.send(input, &cli.script, &buffer).await {
            Ok(reply) => println!("{}", reply.content),
            Err(e) => {
                tracing::error!("Turn failed: {}", e);
                println!("{}", e.user_message());
            }
        }
    }

    if let Err(e) = editor.save_history(HISTORY_FILE) {
        tracing::warn!("Could not save REPL history: {}", e);
    }
    Ok(())
}

/// Current contents of the editor file. An unreadable file counts as an
/// empty buffer for this turn.
async fn read_editor_buffer(path: Option<&Path>) -> String {
    let Some(path) = path else {
        return String::new();
    };
    match tokio::fs::read_to_string(path).await {
        Ok(code) => code,
        Err(e) => {
            tracing::warn!("Could not read editor buffer {}: {}", path.display(), e);
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_editor_buffer_reads_file() {
        let path = std::env::temp_dir()
            .join(format!("shipclaw-editor-{}.js", std::process::id()));
        tokio::fs::write(&path, "await performScan();").await.unwrap();

        assert_eq!(read_editor_buffer(Some(&path)).await, "await performScan();");
        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn test_unreadable_editor_buffer_is_empty() {
        let missing = Path::new("/nonexistent/shipclaw/editor.js");
        assert_eq!(read_editor_buffer(Some(missing)).await, "");
        assert_eq!(read_editor_buffer(None).await, "");
    }
}
