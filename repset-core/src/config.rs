use anyhow::{Result, anyhow};
use std::env;
use std::time::Duration;

use crate::retry::RetryPolicy;

pub const DEFAULT_REST_SECONDS: u32 = 45;
pub const DEFAULT_WEIGHT: &str = "0";
pub const DEFAULT_REPS: &str = "10";
pub const SNAPSHOT_KEY_PREFIX: &str = "workout_state_";

/// Tunables for a single active workout.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub default_rest_seconds: u32,
    /// Autosave runs once every this many scheduler ticks (one tick per second).
    pub autosave_every_ticks: u64,
    pub load_retry: RetryPolicy,
    pub finalize_retry: RetryPolicy,
    pub default_weight: String,
    pub default_reps: String,
    pub event_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_rest_seconds: DEFAULT_REST_SECONDS,
            autosave_every_ticks: 30,
            load_retry: RetryPolicy::linear(3, Duration::from_millis(1000)),
            finalize_retry: RetryPolicy::immediate(2),
            default_weight: DEFAULT_WEIGHT.to_string(),
            default_reps: DEFAULT_REPS.to_string(),
            event_capacity: 64,
        }
    }
}

impl SessionConfig {
    /// Config with zero backoff, for tests and scripted runs.
    pub fn without_delays() -> Self {
        Self {
            load_retry: RetryPolicy::immediate(3),
            ..Default::default()
        }
    }
}

pub fn snapshot_key(workout_id: &str) -> String {
    format!("{}{}", SNAPSHOT_KEY_PREFIX, workout_id)
}

/// Connection settings for the hosted backend.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub base_url: String,
    pub api_key: String,
    pub access_token: Option<String>,
    pub timeout: Duration,
}

impl BackendConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            access_token: None,
            timeout: Duration::from_secs(15),
        }
    }

    pub fn with_access_token(mut self, token: Option<String>) -> Self {
        self.access_token = token;
        self
    }

    pub fn from_env() -> Result<Self> {
        let base_url = env::var("REPSET_BACKEND_URL")
            .map_err(|_| anyhow!("REPSET_BACKEND_URL must be specified or present in the environment"))?;
        let api_key = env::var("REPSET_BACKEND_KEY")
            .map_err(|_| anyhow!("REPSET_BACKEND_KEY must be specified or present in the environment"))?;

        let mut config = Self::new(base_url, api_key)
            .with_access_token(env::var("REPSET_ACCESS_TOKEN").ok());

        if let Ok(secs) = env::var("REPSET_HTTP_TIMEOUT_SECS") {
            let secs: u64 = secs
                .parse()
                .map_err(|e| anyhow!("invalid REPSET_HTTP_TIMEOUT_SECS {:?}: {}", secs, e))?;
            config.timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }
}
