//! Worker configuration resolved from the environment.
//!
//! The CLI loads `.env` with `dotenvy` before calling [`WorkerConfig::from_env`];
//! command-line flags then override individual fields.

use std::{str::FromStr, time::Duration};

use crate::{
    core::agent::DEFAULT_MODEL,
    error::{AgentError, Result},
    tools::search::{GOOGLE_MAPS_BASE_URL, SERPER_SEARCH_URL},
};

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_REQUEST_QUEUE: &str = "planning_requests";
pub const DEFAULT_RESULTS_QUEUE: &str = "results";

/// Knobs for the coordinator and specialist agents of one job.
#[derive(Debug, Clone)]
pub struct PlannerSettings {
    pub model: String,
    /// Bound on each model HTTP call
    pub request_timeout: Duration,
    pub coordinator_max_iterations: usize,
    pub specialist_max_iterations: usize,
    /// Maximum `delegate_work` calls per job
    pub max_delegations: usize,
    pub coordinator_max_tokens: u32,
    pub specialist_max_tokens: u32,
}

impl Default for PlannerSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            request_timeout: Duration::from_secs(120),
            coordinator_max_iterations: 30,
            specialist_max_iterations: 8,
            max_delegations: 12,
            coordinator_max_tokens: 4096,
            specialist_max_tokens: 1500,
        }
    }
}

/// Credentials and endpoints for the capability providers.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub google_api_key: Option<String>,
    pub serper_api_key: Option<String>,
    pub google_base_url: String,
    pub serper_url: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            google_api_key: None,
            serper_api_key: None,
            google_base_url: GOOGLE_MAPS_BASE_URL.to_string(),
            serper_url: SERPER_SEARCH_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub api_key: String,
    pub base_url: String,
    pub planner: PlannerSettings,
    pub providers: ProviderConfig,
    pub request_queue: String,
    pub results_queue: String,
    /// Fixed delay between broker retries
    pub retry_backoff: Duration,
    pub publish_attempts: u32,
}

impl WorkerConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            planner: PlannerSettings::default(),
            providers: ProviderConfig::default(),
            request_queue: DEFAULT_REQUEST_QUEUE.to_string(),
            results_queue: DEFAULT_RESULTS_QUEUE.to_string(),
            retry_backoff: Duration::from_secs(5),
            publish_attempts: 3,
        }
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let api_key = get("OPENAI_API_KEY").ok_or_else(|| {
            AgentError::Config("OPENAI_API_KEY must be set to reach the model API".to_string())
        })?;

        let mut config = Self::new(api_key);

        if let Some(base_url) = get("OPENAI_BASE_URL").or_else(|| get("OPENROUTER_BASE_URL")) {
            config.base_url = base_url;
        }
        if let Some(model) = get("MODEL") {
            config.planner.model = model;
        }

        config.providers.google_api_key = get("GOOGLE_API_KEY");
        config.providers.serper_api_key = get("SERPER_API_KEY");

        if let Some(queue) = get("PLANNING_REQUEST_QUEUE") {
            config.request_queue = queue;
        }
        if let Some(queue) = get("RESULTS_QUEUE") {
            config.results_queue = queue;
        }

        if let Some(raw) = get("MAX_DELEGATION_ROUNDS") {
            config.planner.max_delegations = parse_positive("MAX_DELEGATION_ROUNDS", &raw)?;
        }
        if let Some(raw) = get("COORDINATOR_MAX_ITERATIONS") {
            config.planner.coordinator_max_iterations =
                parse_positive("COORDINATOR_MAX_ITERATIONS", &raw)?;
        }
        if let Some(raw) = get("RETRY_BACKOFF_SECS") {
            config.retry_backoff = Duration::from_secs(parse_number("RETRY_BACKOFF_SECS", &raw)?);
        }

        Ok(config)
    }
}

fn parse_number<T: FromStr>(key: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.parse::<T>()
        .map_err(|err| AgentError::Config(format!("{} has invalid value '{}': {}", key, raw, err)))
}

fn parse_positive(key: &str, raw: &str) -> Result<usize> {
    match parse_number::<usize>(key, raw)? {
        0 => Err(AgentError::Config(format!("{} must be at least 1", key))),
        value => Ok(value),
    }
}
