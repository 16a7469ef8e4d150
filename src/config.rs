//! Configuration for the audit pipeline
//!
//! Loaded from a TOML file with `AUDIT__` environment overrides, or from
//! environment variables alone. Every loader validates before returning, so
//! a misconfigured threshold profile fails at startup.

use crate::audit::fingerprint::DEFAULT_MAX_INTENT_TOKENS;
use crate::audit::thresholds::ThresholdProfiles;
use crate::error::{AuditError, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub thresholds: ThresholdProfiles,
    #[serde(default)]
    pub fingerprint: FingerprintConfig,
    #[serde(default)]
    pub context: ContextConfig,
    #[serde(default)]
    pub scorer: ScorerConfig,
    #[serde(default)]
    pub resilience: ResilienceConfig,
    #[serde(default)]
    pub events: EventsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load from a TOML file, then apply `AUDIT__SECTION__KEY` overrides
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::from(path.as_ref()))
            .add_source(
                ::config::Environment::with_prefix("AUDIT")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse TOML text
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::from_str(toml, ::config::FileFormat::Toml))
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults with environment overrides (reads `.env` when present)
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = Self::default();
        config.scorer = config.scorer.from_env();
        config.resilience = config.resilience.from_env();

        if let Ok(val) = std::env::var("AUDIT_MISSION_MIN_SCORE") {
            config.thresholds.mission.min_average_score = parse_env("AUDIT_MISSION_MIN_SCORE", &val)?;
        }
        if let Ok(val) = std::env::var("AUDIT_MISSION_MIN_RELEVANCE") {
            config.thresholds.mission.min_relevance = parse_env("AUDIT_MISSION_MIN_RELEVANCE", &val)?;
        }
        if let Ok(val) = std::env::var("AUDIT_INSIGHT_MIN_SCORE") {
            config.thresholds.insight.min_average_score = parse_env("AUDIT_INSIGHT_MIN_SCORE", &val)?;
        }
        if let Ok(val) = std::env::var("AUDIT_INSIGHT_MIN_RELEVANCE") {
            config.thresholds.insight.min_relevance = parse_env("AUDIT_INSIGHT_MIN_RELEVANCE", &val)?;
        }
        if let Ok(val) = std::env::var("AUDIT_FALLBACK_FOCUS_AREA") {
            config.context.fallback_focus_area = val;
        }
        if let Ok(val) = std::env::var("AUDIT_LOG_LEVEL") {
            config.logging.level = val;
        }
        if let Ok(val) = std::env::var("AUDIT_LOG_JSON") {
            config.logging.json = val.to_lowercase() == "true" || val == "1";
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.thresholds.validate()?;

        if self.fingerprint.max_intent_tokens == 0 {
            return Err(AuditError::Configuration(
                "fingerprint.max_intent_tokens must be at least 1".to_string(),
            ));
        }
        if self.scorer.kind == ScorerKind::Llm && self.scorer.endpoint.is_empty() {
            return Err(AuditError::Configuration(
                "scorer.endpoint is required for the llm scorer".to_string(),
            ));
        }
        if self.resilience.circuit_breaker_failures == 0 {
            return Err(AuditError::Configuration(
                "resilience.circuit_breaker_failures must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, val: &str) -> Result<T> {
    val.parse()
        .map_err(|_| AuditError::Configuration(format!("{} has an invalid value: {}", key, val)))
}

/// Fingerprint configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FingerprintConfig {
    #[serde(default = "default_max_intent_tokens")]
    pub max_intent_tokens: usize,
}

fn default_max_intent_tokens() -> usize {
    DEFAULT_MAX_INTENT_TOKENS
}

impl Default for FingerprintConfig {
    fn default() -> Self {
        Self {
            max_intent_tokens: default_max_intent_tokens(),
        }
    }
}

/// Business context configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ContextConfig {
    #[serde(default = "default_focus_area")]
    pub fallback_focus_area: String,
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_cache_capacity")]
    pub cache_max_capacity: u64,
}

fn default_focus_area() -> String {
    crate::audit::models::DEFAULT_FOCUS_AREA.to_string()
}

fn default_cache_ttl() -> u64 {
    300
}

fn default_cache_capacity() -> u64 {
    1000
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            fallback_focus_area: default_focus_area(),
            cache_ttl_secs: default_cache_ttl(),
            cache_max_capacity: default_cache_capacity(),
        }
    }
}

impl ContextConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

/// Which quality scorer to build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScorerKind {
    Heuristic,
    Llm,
}

/// Quality scorer configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ScorerConfig {
    #[serde(default = "default_scorer_kind")]
    pub kind: ScorerKind,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// API key (read from env AUDIT_SCORER_API_KEY if not set)
    #[serde(default)]
    pub api_key: Option<SecretString>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_scorer_kind() -> ScorerKind {
    ScorerKind::Heuristic
}

fn default_endpoint() -> String {
    "http://localhost:8080/v1/chat/completions".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_timeout_ms() -> u64 {
    15_000
}

fn default_temperature() -> f32 {
    0.0
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            kind: default_scorer_kind(),
            endpoint: default_endpoint(),
            api_key: None,
            model: default_model(),
            timeout_ms: default_timeout_ms(),
            temperature: default_temperature(),
        }
    }
}

impl ScorerConfig {
    /// Override with environment variables if present
    pub fn from_env(mut self) -> Self {
        if let Ok(val) = std::env::var("AUDIT_SCORER_KIND") {
            match val.to_lowercase().as_str() {
                "llm" => self.kind = ScorerKind::Llm,
                "heuristic" => self.kind = ScorerKind::Heuristic,
                _ => {}
            }
        }

        if let Ok(val) = std::env::var("AUDIT_SCORER_ENDPOINT") {
            self.endpoint = val;
        }

        if let Ok(val) = std::env::var("AUDIT_SCORER_API_KEY") {
            self.api_key = Some(SecretString::new(val));
        }

        if let Ok(val) = std::env::var("AUDIT_SCORER_MODEL") {
            self.model = val;
        }

        if let Ok(val) = std::env::var("AUDIT_SCORER_TIMEOUT_MS") {
            if let Ok(timeout) = val.parse() {
                self.timeout_ms = timeout;
            }
        }

        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Retry and circuit breaker settings for scoring calls
#[derive(Debug, Clone, Deserialize)]
pub struct ResilienceConfig {
    #[serde(default = "default_scoring_retries")]
    pub scoring_retries: usize,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    #[serde(default = "default_breaker_failures")]
    pub circuit_breaker_failures: usize,
    #[serde(default = "default_breaker_reset")]
    pub circuit_breaker_reset_secs: u64,
}

fn default_scoring_retries() -> usize {
    1
}

fn default_retry_backoff_ms() -> u64 {
    200
}

fn default_breaker_failures() -> usize {
    5
}

fn default_breaker_reset() -> u64 {
    30
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            scoring_retries: default_scoring_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            circuit_breaker_failures: default_breaker_failures(),
            circuit_breaker_reset_secs: default_breaker_reset(),
        }
    }
}

impl ResilienceConfig {
    pub fn from_env(mut self) -> Self {
        if let Ok(val) = std::env::var("AUDIT_SCORING_RETRIES") {
            if let Ok(retries) = val.parse() {
                self.scoring_retries = retries;
            }
        }

        if let Ok(val) = std::env::var("AUDIT_RETRY_BACKOFF_MS") {
            if let Ok(ms) = val.parse() {
                self.retry_backoff_ms = ms;
            }
        }

        if let Ok(val) = std::env::var("AUDIT_CIRCUIT_THRESHOLD") {
            if let Ok(threshold) = val.parse() {
                self.circuit_breaker_failures = threshold;
            }
        }

        if let Ok(val) = std::env::var("AUDIT_CIRCUIT_COOLDOWN_SECS") {
            if let Ok(secs) = val.parse() {
                self.circuit_breaker_reset_secs = secs;
            }
        }

        self
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn breaker_reset_timeout(&self) -> Duration {
        Duration::from_secs(self.circuit_breaker_reset_secs)
    }
}

/// Event delivery configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EventsConfig {
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_channel_capacity() -> usize {
    1024
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}
