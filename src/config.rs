//! Bridge configuration.
//!
//! Two layers:
//! - [`BridgeConfig`]: credentials and model, mutable between turns.
//! - [`BridgeOptions`]: window sizes, limits and timeouts fixed at construction.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use crate::error::ConfigError;
use crate::intent::ActionName;

/// Default model when none is configured.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Default OpenAI-compatible endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Credentials and model for the generation backend.
///
/// Read fresh at the start of every turn.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub api_key: Option<SecretString>,
    pub model: String,
}

impl BridgeConfig {
    pub fn new(api_key: Option<SecretString>, model: impl Into<String>) -> Self {
        Self {
            api_key,
            model: model.into(),
        }
    }

    /// Load from `SHIPCLAW_API_KEY` (or `OPENAI_API_KEY`) and `SHIPCLAW_MODEL`.
    pub fn from_env() -> Self {
        let api_key = std::env::var("SHIPCLAW_API_KEY")
            .or_else(|_| std::env::var("OPENAI_API_KEY"))
            .ok()
            .filter(|k| !k.trim().is_empty())
            .map(SecretString::from);
        let model = std::env::var("SHIPCLAW_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        Self { api_key, model }
    }

    /// Whether an API key is configured.
    pub fn has_api_key(&self) -> bool {
        self.api_key
            .as_ref()
            .is_some_and(|k| !k.expose_secret().is_empty())
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
        }
    }
}

/// Which action set and audit behaviour a bridge runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BridgeProfile {
    /// All actions, tool-call logging enabled.
    #[default]
    Full,
    /// Navigation, scanning and status only. No tool-call logging.
    Minimal,
}

impl BridgeProfile {
    /// Whether the profile accepts the given action.
    pub fn allows(&self, action: ActionName) -> bool {
        match self {
            BridgeProfile::Full => true,
            BridgeProfile::Minimal => matches!(
                action,
                ActionName::Move
                    | ActionName::ShipStatus
                    | ActionName::ScanSector
                    | ActionName::PerformScan
                    | ActionName::GetResources
            ),
        }
    }

    /// Whether host invocations are recorded as tool-call messages.
    pub fn logs_tool_calls(&self) -> bool {
        matches!(self, BridgeProfile::Full)
    }

    /// Actions available under this profile, in declaration order.
    pub fn actions(&self) -> Vec<ActionName> {
        ActionName::ALL
            .iter()
            .copied()
            .filter(|a| self.allows(*a))
            .collect()
    }
}

impl std::str::FromStr for BridgeProfile {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "full" => Ok(BridgeProfile::Full),
            "minimal" | "min" => Ok(BridgeProfile::Minimal),
            other => Err(ConfigError::InvalidValue {
                key: "profile".to_string(),
                reason: format!("expected 'full' or 'minimal', got '{}'", other),
            }),
        }
    }
}

/// Fixed tuning for a bridge instance.
#[derive(Debug, Clone)]
pub struct BridgeOptions {
    /// History entries rendered into the intent prompt.
    pub prompt_window: usize,
    /// History entries rendered into the synthesis prompt.
    pub synthesis_window: usize,
    /// Characters shown by `get_script_code`.
    pub preview_limit: usize,
    /// Upper bound on generation steps per synthesis.
    pub max_synthesis_steps: u32,
    /// Per round-trip timeout. `None` waits indefinitely.
    pub round_trip_timeout: Option<Duration>,
    pub profile: BridgeProfile,
    /// Base URL of the OpenAI-compatible backend.
    pub base_url: String,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            prompt_window: 8,
            synthesis_window: 5,
            preview_limit: 400,
            max_synthesis_steps: 3,
            round_trip_timeout: Some(Duration::from_secs(60)),
            profile: BridgeProfile::Full,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

impl BridgeOptions {
    /// Load overrides from `SHIPCLAW_BASE_URL`, `SHIPCLAW_TIMEOUT_SECS`
    /// and `SHIPCLAW_PROFILE`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut options = Self::default();

        if let Ok(url) = std::env::var("SHIPCLAW_BASE_URL") {
            options.base_url = url;
        }

        if let Ok(raw) = std::env::var("SHIPCLAW_TIMEOUT_SECS") {
            options.round_trip_timeout = parse_timeout(&raw)?;
        }

        if let Ok(raw) = std::env::var("SHIPCLAW_PROFILE") {
            options.profile = raw.parse()?;
        }

        Ok(options)
    }

    pub fn with_profile(mut self, profile: BridgeProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.round_trip_timeout = timeout;
        self
    }
}

/// Parse a timeout in seconds; `0` disables the timeout.
pub fn parse_timeout(raw: &str) -> Result<Option<Duration>, ConfigError> {
    let secs: u64 = raw
        .trim()
        .parse()
        .map_err(|e: std::num::ParseIntError| ConfigError::InvalidValue {
            key: "SHIPCLAW_TIMEOUT_SECS".to_string(),
            reason: e.to_string(),
        })?;
    Ok((secs > 0).then(|| Duration::from_secs(secs)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_from_str() {
        assert_eq!("FULL".parse::<BridgeProfile>().unwrap(), BridgeProfile::Full);
        assert_eq!(
            "minimal".parse::<BridgeProfile>().unwrap(),
            BridgeProfile::Minimal
        );
        assert!("verbose".parse::<BridgeProfile>().is_err());
    }

    #[test]
    fn test_minimal_profile_actions() {
        let minimal = BridgeProfile::Minimal;
        assert!(minimal.allows(ActionName::Move));
        assert!(!minimal.allows(ActionName::CreateScript));
        assert!(!minimal.logs_tool_calls());
        assert_eq!(minimal.actions().len(), 5);
        assert_eq!(BridgeProfile::Full.actions().len(), ActionName::ALL.len());
    }

    #[test]
    fn test_parse_timeout() {
        assert_eq!(parse_timeout("30").unwrap(), Some(Duration::from_secs(30)));
        assert_eq!(parse_timeout("0").unwrap(), None);
        assert!(parse_timeout("soon").is_err());
    }

    #[test]
    fn test_has_api_key() {
        assert!(!BridgeConfig::default().has_api_key());
        let config = BridgeConfig::new(Some(SecretString::from("sk-test".to_string())), "m");
        assert!(config.has_api_key());
    }

    #[test]
    fn test_default_options() {
        let options = BridgeOptions::default();
        assert_eq!(options.prompt_window, 8);
        assert_eq!(options.synthesis_window, 5);
        assert_eq!(options.preview_limit, 400);
    }
}
