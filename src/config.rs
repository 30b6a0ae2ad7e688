//! Configuration for the orchestrator.
//!
//! Mirrors the teacher's `CloudLLMConfig` philosophy: a plain struct callers construct
//! manually, no TOML/YAML parsing dependency. [`Config::from_env`] is provided for callers
//! who do want to source values from the environment, but nothing in the core calls it
//! implicitly — there is no ambient configuration object (spec §9 design note).

use std::env;
use std::time::Duration;

/// Recognized configuration options (spec §6).
#[derive(Debug, Clone)]
pub struct Config {
    /// Enable protocol-based (remote subprocess) tool dispatch; when false, the
    /// [`crate::tools::dispatcher::ToolDispatcher`] uses only direct APIs.
    pub use_remote_tools: bool,
    /// Enable the LLM fallback step of the intent classifier.
    pub intent_use_llm: bool,
    pub intent_llm_timeout: Duration,
    pub intent_confidence_threshold: f32,
    pub intent_llm_temperature: f32,
    /// Names the provider to instantiate at the composition root (informational — the
    /// concrete binding is chosen by whoever builds the `Arc<dyn LlmProvider>`).
    pub llm_provider: String,
    pub agent_delegation_enabled: bool,
    pub ticket_base_url: Option<String>,
    pub ticket_auth_user: Option<String>,
    pub ticket_auth_token: Option<String>,
    pub ticket_project_key: Option<String>,
    pub wiki_base_url: Option<String>,
    pub wiki_space_key: Option<String>,
    /// Whether a retrieval/RAG collaborator is configured (implied by spec §3's "optional",
    /// named explicitly here so the Router's capability checks have something to inspect).
    pub rag_enabled: bool,
    /// Whether a memory-store collaborator is configured.
    pub memory_enabled: bool,
    pub intent_cache_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            use_remote_tools: true,
            intent_use_llm: true,
            intent_llm_timeout: Duration::from_secs(5),
            intent_confidence_threshold: 0.7,
            intent_llm_temperature: 0.1,
            llm_provider: "openai".to_string(),
            agent_delegation_enabled: false,
            ticket_base_url: None,
            ticket_auth_user: None,
            ticket_auth_token: None,
            ticket_project_key: None,
            wiki_base_url: None,
            wiki_space_key: None,
            rag_enabled: false,
            memory_enabled: false,
            intent_cache_capacity: 100,
        }
    }
}

impl Config {
    /// Build a `Config` from the documented environment variable names. Missing variables
    /// fall back to [`Config::default`] values for that field.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            use_remote_tools: env_bool("USE_REMOTE_TOOLS", defaults.use_remote_tools),
            intent_use_llm: env_bool("INTENT_USE_LLM", defaults.intent_use_llm),
            intent_llm_timeout: env::var("INTENT_LLM_TIMEOUT")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.intent_llm_timeout),
            intent_confidence_threshold: env::var("INTENT_CONFIDENCE_THRESHOLD")
                .ok()
                .and_then(|v| v.parse::<f32>().ok())
                .unwrap_or(defaults.intent_confidence_threshold),
            intent_llm_temperature: env::var("INTENT_LLM_TEMPERATURE")
                .ok()
                .and_then(|v| v.parse::<f32>().ok())
                .unwrap_or(defaults.intent_llm_temperature),
            llm_provider: env::var("LLM_PROVIDER").unwrap_or(defaults.llm_provider),
            agent_delegation_enabled: env_bool(
                "AGENT_DELEGATION_ENABLED",
                defaults.agent_delegation_enabled,
            ),
            ticket_base_url: env::var("TICKET_BASE_URL").ok(),
            ticket_auth_user: env::var("TICKET_AUTH_USER").ok(),
            ticket_auth_token: env::var("TICKET_AUTH_TOKEN").ok(),
            ticket_project_key: env::var("TICKET_PROJECT_KEY").ok(),
            wiki_base_url: env::var("WIKI_BASE_URL").ok(),
            wiki_space_key: env::var("WIKI_SPACE_KEY").ok(),
            rag_enabled: env_bool("RAG_ENABLED", defaults.rag_enabled),
            memory_enabled: env_bool("MEMORY_ENABLED", defaults.memory_enabled),
            intent_cache_capacity: defaults.intent_cache_capacity,
        }
    }

    pub fn has_ticket_capability(&self) -> bool {
        self.ticket_base_url.is_some()
    }

    pub fn has_wiki_capability(&self) -> bool {
        self.wiki_base_url.is_some()
    }
}

fn env_bool(name: &str, default: bool) -> bool {
    match env::var(name) {
        Ok(v) => matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}
