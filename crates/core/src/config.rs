use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::error::{E2eError, E2eResult};
use crate::secrets::SecretProvider;

/// Root harness configuration. Loaded from environment variables with the
/// prefix `MAPLE_E2E__`, e.g. `MAPLE_E2E__RETRY__MAX_ATTEMPTS=5`.
#[derive(Debug, Clone, Deserialize)]
pub struct E2eConfig {
    #[serde(default = "default_app_url")]
    pub app_url: String,
    /// Name of the environment variable holding the agent's LLM API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_headless")]
    pub headless: bool,
    #[serde(default = "default_logs_dir")]
    pub logs_dir: PathBuf,
    #[serde(default = "default_summary_path")]
    pub summary_path: PathBuf,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub agent: AgentProcessConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_delay_secs")]
    pub delay_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentProcessConfig {
    /// argv of the external agent bridge; `MAPLE_E2E__AGENT__COMMAND=python3,bridge.py`.
    #[serde(default)]
    pub command: Vec<String>,
    #[serde(default = "default_max_steps")]
    pub default_max_steps: u32,
}

fn default_app_url() -> String {
    "http://localhost:5173".to_string()
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}
fn default_headless() -> bool {
    true
}
fn default_logs_dir() -> PathBuf {
    PathBuf::from("logs")
}
fn default_summary_path() -> PathBuf {
    PathBuf::from("logs/test_summary.txt")
}
fn default_max_attempts() -> u32 {
    3
}
fn default_retry_delay_secs() -> u64 {
    2
}
fn default_max_steps() -> u32 {
    10
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay_secs: default_retry_delay_secs(),
        }
    }
}

impl RetryConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_secs)
    }
}

impl Default for AgentProcessConfig {
    fn default() -> Self {
        Self {
            command: Vec::new(),
            default_max_steps: default_max_steps(),
        }
    }
}

impl Default for E2eConfig {
    fn default() -> Self {
        Self {
            app_url: default_app_url(),
            api_key_env: default_api_key_env(),
            headless: default_headless(),
            logs_dir: default_logs_dir(),
            summary_path: default_summary_path(),
            retry: RetryConfig::default(),
            agent: AgentProcessConfig::default(),
        }
    }
}

impl E2eConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from(None)
    }

    /// Load from the given variables instead of the process environment.
    fn load_from(vars: Option<config::Map<String, String>>) -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder().add_source(
            config::Environment::with_prefix("MAPLE_E2E")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("agent.command")
                .source(vars),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Reject settings the harness cannot run with.
    pub fn validate(&self) -> E2eResult<()> {
        let url = url::Url::parse(&self.app_url)
            .map_err(|e| E2eError::Config(format!("app_url {:?} is invalid: {e}", self.app_url)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(E2eError::Config(format!(
                "app_url must use http or https, got {}",
                url.scheme()
            )));
        }
        if self.retry.max_attempts == 0 {
            return Err(E2eError::Config("retry.max_attempts must be at least 1".into()));
        }
        if self.agent.default_max_steps == 0 {
            return Err(E2eError::Config(
                "agent.default_max_steps must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// The agent cannot run without its API key, so a missing key aborts the
    /// whole run before any test starts.
    pub fn require_api_key(&self, secrets: &dyn SecretProvider) -> E2eResult<()> {
        match secrets.get(&self.api_key_env) {
            Some(_) => Ok(()),
            None => {
                debug!(variable = %self.api_key_env, "API key missing");
                Err(E2eError::Config(format!("{} not set", self.api_key_env)))
            }
        }
    }
}
