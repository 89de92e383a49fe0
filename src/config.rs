//! Configuration types: provider credentials, agents, the judge and debate settings

use crate::agent::{DebateAgent, RoleAgent};
use crate::error::{Error, Result};
use crate::judge::{Judge, JudgeAgent};
use crate::llm_client::LlmClient;
use crate::tools::ToolRegistry;
use crate::types::{AgentRole, SummarizationMethod};
use dotenvy::dotenv;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Default OpenAI-compatible base URL
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
/// OpenRouter base URL, used when only an OpenRouter key is configured
pub const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Default threshold (characters) above which an agent's context is summarized
pub const DEFAULT_SUMMARY_THRESHOLD: usize = 5000;
/// Default maximum summary length in characters
pub const DEFAULT_SUMMARY_MAX_LENGTH: usize = 2500;
/// Default cap on tool-loop iterations per contribution
pub const DEFAULT_MAX_TOOL_ITERATIONS: u32 = 10;
/// Default number of debate rounds
pub const DEFAULT_ROUNDS: u32 = 3;

/// LLM provider configuration
#[derive(Clone)]
pub struct ProviderConfig {
    /// API key
    pub api_key: SecretString,
    /// Base URL; `/responses` and `/chat/completions` are appended
    pub base_url: Url,
    /// Request timeout
    pub timeout: Duration,
    /// App name sent with each request
    pub app_name: String,
}

impl ProviderConfig {
    /// Create a provider configuration
    pub fn new(api_key: impl Into<String>, base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| Error::config(format!("Invalid base URL {}: {}", base_url, e)))?;
        Ok(Self {
            api_key: SecretString::from(api_key.into()),
            base_url,
            timeout: Duration::from_secs(120),
            app_name: "dialectic".to_string(),
        })
    }

    /// Load from the environment (and `.env` when present).
    ///
    /// Reads `OPENAI_API_KEY`, falling back to `OPENROUTER_API_KEY`; `LLM_BASE_URL`
    /// overrides the base URL.
    pub fn from_env() -> Result<Self> {
        let _ = dotenv();

        let (api_key, default_base) = match std::env::var("OPENAI_API_KEY") {
            Ok(key) => (key, DEFAULT_BASE_URL),
            Err(_) => std::env::var("OPENROUTER_API_KEY")
                .map(|key| (key, OPENROUTER_BASE_URL))
                .map_err(|_| {
                    Error::config("Neither OPENAI_API_KEY nor OPENROUTER_API_KEY is set")
                })?,
        };
        let base_url = std::env::var("LLM_BASE_URL").unwrap_or_else(|_| default_base.to_string());

        Self::new(api_key, &base_url)
    }

    /// Set the timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the app name
    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = app_name.into();
        self
    }

    /// Get the API key as a string
    pub fn api_key(&self) -> &str {
        self.api_key.expose_secret()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &"***REDACTED***")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("app_name", &self.app_name)
            .finish()
    }
}

/// Debate-level summarization settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarizationConfig {
    pub enabled: bool,
    /// Context size (characters) at which summarization kicks in
    pub threshold: usize,
    /// Hard cap on stored summary length (characters)
    pub max_length: usize,
    pub method: SummarizationMethod,
}

impl Default for SummarizationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: DEFAULT_SUMMARY_THRESHOLD,
            max_length: DEFAULT_SUMMARY_MAX_LENGTH,
            method: SummarizationMethod::LengthBased,
        }
    }
}

impl SummarizationConfig {
    /// Apply an agent-level override; unset fields keep the debate-level value
    pub fn merged(&self, agent: Option<&SummarizationOverride>) -> Self {
        let Some(agent) = agent else {
            return self.clone();
        };
        Self {
            enabled: agent.enabled.unwrap_or(self.enabled),
            threshold: agent.threshold.unwrap_or(self.threshold),
            max_length: agent.max_length.unwrap_or(self.max_length),
            method: agent.method.unwrap_or(self.method),
        }
    }
}

/// Per-agent summarization override
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummarizationOverride {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub threshold: Option<usize>,
    #[serde(default)]
    pub max_length: Option<usize>,
    #[serde(default)]
    pub method: Option<SummarizationMethod>,
}

/// Agent instantiation parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Unique agent id, recorded on every contribution
    pub id: String,
    /// Display name
    pub name: String,
    pub role: AgentRole,
    /// Model identifier
    pub model: String,
    /// Provider label recorded in summary metadata
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Replaces the role's built-in system prompt
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub summarization: Option<SummarizationOverride>,
    #[serde(default = "default_max_tool_iterations")]
    pub max_tool_iterations: u32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl AgentConfig {
    /// Create an agent config with defaults for the optional fields
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        role: AgentRole,
        model: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role,
            model: model.into(),
            provider: default_provider(),
            temperature: default_temperature(),
            system_prompt: None,
            summarization: None,
            max_tool_iterations: DEFAULT_MAX_TOOL_ITERATIONS,
            enabled: true,
        }
    }

    /// Set the provider label
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }

    /// Set the temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the summarization override
    pub fn with_summarization(mut self, summarization: SummarizationOverride) -> Self {
        self.summarization = Some(summarization);
        self
    }

    /// Set the tool iteration cap
    pub fn with_max_tool_iterations(mut self, max: u32) -> Self {
        self.max_tool_iterations = max;
        self
    }
}

fn default_provider() -> String {
    "openai".to_string()
}
fn default_temperature() -> f32 {
    0.5
}
fn default_max_tool_iterations() -> u32 {
    DEFAULT_MAX_TOOL_ITERATIONS
}
fn default_enabled() -> bool {
    true
}

/// Debate-level settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebateConfig {
    /// Number of rounds (>= 1)
    pub rounds: u32,
    /// Optional per-round time limit
    pub timeout_per_round_ms: Option<u64>,
    /// Render the raw transcript for agents without a summary
    pub include_full_history: bool,
    pub summarization: SummarizationConfig,
}

impl Default for DebateConfig {
    fn default() -> Self {
        Self {
            rounds: DEFAULT_ROUNDS,
            timeout_per_round_ms: None,
            include_full_history: false,
            summarization: SummarizationConfig::default(),
        }
    }
}

impl DebateConfig {
    /// Set the round count
    pub fn with_rounds(mut self, rounds: u32) -> Self {
        self.rounds = rounds;
        self
    }

    /// Set the per-round timeout
    pub fn with_timeout_per_round(mut self, timeout: Duration) -> Self {
        self.timeout_per_round_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// Enable raw transcript rendering
    pub fn with_full_history(mut self, include: bool) -> Self {
        self.include_full_history = include;
        self
    }

    /// Set summarization settings
    pub fn with_summarization(mut self, summarization: SummarizationConfig) -> Self {
        self.summarization = summarization;
        self
    }

    pub fn timeout_per_round(&self) -> Option<Duration> {
        self.timeout_per_round_ms.map(Duration::from_millis)
    }

    /// Reject configurations the orchestrator cannot run
    pub fn validate(&self) -> Result<()> {
        if self.rounds == 0 {
            return Err(Error::config("rounds must be at least 1"));
        }
        if self.summarization.enabled && self.summarization.max_length == 0 {
            return Err(Error::config("summarization.max_length must be positive"));
        }
        Ok(())
    }
}

/// Agents and the judge built from a [`SystemConfig`]
pub struct Participants {
    pub agents: Vec<Arc<dyn DebateAgent>>,
    pub judge: Arc<dyn Judge>,
}

/// Complete debate system configuration, loadable from YAML or JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    pub agents: Vec<AgentConfig>,
    pub judge: AgentConfig,
    #[serde(default)]
    pub debate: DebateConfig,
}

impl SystemConfig {
    /// Load configuration from a YAML (or JSON) string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| Error::config(format!("Failed to read {}: {}", path.as_ref().display(), e)))?;
        Self::from_yaml(&content)
    }

    /// Enabled agents
    pub fn enabled_agents(&self) -> impl Iterator<Item = &AgentConfig> {
        self.agents.iter().filter(|a| a.enabled)
    }

    /// Check ids are unique and at least one agent is enabled
    pub fn validate(&self) -> Result<()> {
        self.debate.validate()?;
        if self.enabled_agents().next().is_none() {
            return Err(Error::config("at least one enabled agent is required"));
        }
        let mut seen = HashSet::new();
        for id in self.agents.iter().map(|a| &a.id).chain(std::iter::once(&self.judge.id)) {
            if !seen.insert(id.as_str()) {
                return Err(Error::config(format!("duplicate agent id: {}", id)));
            }
        }
        Ok(())
    }

    /// Build the enabled agents and the judge
    pub fn build(&self, client: Arc<dyn LlmClient>, tools: ToolRegistry) -> Result<Participants> {
        self.validate()?;
        let agents = self
            .enabled_agents()
            .map(|config| {
                Arc::new(RoleAgent::new(
                    config.clone(),
                    client.clone(),
                    tools.clone(),
                    &self.debate.summarization,
                )) as Arc<dyn DebateAgent>
            })
            .collect();
        let judge = Arc::new(JudgeAgent::new(
            self.judge.clone(),
            client,
            tools,
            &self.debate.summarization,
        ));
        Ok(Participants { agents, judge })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
agents:
  - id: agent-architect
    name: "System Architect"
    role: architect
    model: gpt-4
    summarization:
      threshold: 8000
  - id: agent-performance
    name: "Performance Engineer"
    role: performance
    model: gpt-4
    temperature: 0.3
  - id: agent-testing
    name: "Test Lead"
    role: testing
    model: gpt-4
    enabled: false
judge:
  id: judge-main
  name: "Technical Judge"
  role: generalist
  model: gpt-4
debate:
  rounds: 2
  include_full_history: true
"#;

    #[test]
    fn test_parse_system_config() {
        let config = SystemConfig::from_yaml(YAML).unwrap();
        assert_eq!(config.agents.len(), 3);
        assert_eq!(config.enabled_agents().count(), 2);
        assert_eq!(config.debate.rounds, 2);
        assert!(config.debate.include_full_history);
        assert_eq!(config.debate.summarization, SummarizationConfig::default());
        assert_eq!(config.agents[0].max_tool_iterations, DEFAULT_MAX_TOOL_ITERATIONS);
        assert_eq!(config.agents[1].temperature, 0.3);
    }

    #[test]
    fn test_json_config_is_accepted() {
        let json = r#"{
            "agents": [{ "id": "a", "name": "A", "role": "security", "model": "m" }],
            "judge": { "id": "j", "name": "J", "role": "generalist", "model": "m" }
        }"#;
        let config = SystemConfig::from_yaml(json).unwrap();
        assert_eq!(config.debate.rounds, DEFAULT_ROUNDS);
    }

    #[test]
    fn test_agent_override_merges_onto_debate_defaults() {
        let config = SystemConfig::from_yaml(YAML).unwrap();
        let merged = config
            .debate
            .summarization
            .merged(config.agents[0].summarization.as_ref());

        assert_eq!(merged.threshold, 8000);
        assert_eq!(merged.max_length, DEFAULT_SUMMARY_MAX_LENGTH);
        assert!(merged.enabled);

        let untouched = config.debate.summarization.merged(None);
        assert_eq!(untouched.threshold, DEFAULT_SUMMARY_THRESHOLD);
    }

    #[test]
    fn test_duplicate_ids_and_zero_rounds_rejected() {
        let duplicate = YAML.replace("id: judge-main", "id: agent-architect");
        assert!(matches!(
            SystemConfig::from_yaml(&duplicate),
            Err(Error::Config(_))
        ));

        let zero = YAML.replace("rounds: 2", "rounds: 0");
        assert!(SystemConfig::from_yaml(&zero).is_err());
    }

    #[test]
    fn test_provider_config_redacts_key() {
        let config = ProviderConfig::new("sk-secret", DEFAULT_BASE_URL).unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("sk-secret"));
        assert_eq!(config.api_key(), "sk-secret");
        assert!(ProviderConfig::new("k", "not a url").is_err());
    }
}
