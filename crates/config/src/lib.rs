//! Configuration loading and validation for the Wayfarer concierge gateway.
//!
//! Loads a single versioned [`ConciergeConfig`] at startup from a TOML file
//! with environment variable overrides. All tier-specific rate-limit
//! behavior flows through the one `tiers` lookup table; there are no
//! scattered per-tier conditionals anywhere else in the workspace.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure. Maps directly to `concierge.toml`.
#[derive(Clone, Serialize, Deserialize, Default)]
pub struct ConciergeConfig {
    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default)]
    pub context: ContextConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    #[serde(default)]
    pub fetch: FetchConfig,

    #[serde(default)]
    pub guardrails: GuardrailConfig,

    #[serde(default)]
    pub gateway: GatewayConfig,
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for ConciergeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConciergeConfig")
            .field("provider", &self.provider)
            .field("context", &self.context)
            .field("cache", &self.cache)
            .field("rate_limit", &self.rate_limit)
            .field("fetch", &self.fetch)
            .field("guardrails", &self.guardrails)
            .field("gateway", &self.gateway)
            .finish()
    }
}

/// Model provider settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Per-attempt timeout for the provider call.
    #[serde(default = "default_provider_timeout_ms")]
    pub timeout_ms: u64,

    /// Retries after the first attempt, on transient errors only.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Conversation history cap, most recent turns kept.
    #[serde(default = "default_max_history_turns")]
    pub max_history_turns: usize,

    /// Hard ceiling on the serialized prompt, in characters.
    #[serde(default = "default_prompt_char_ceiling")]
    pub prompt_char_ceiling: usize,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("timeout_ms", &self.timeout_ms)
            .field("max_retries", &self.max_retries)
            .field("max_tokens", &self.max_tokens)
            .field("max_history_turns", &self.max_history_turns)
            .field("prompt_char_ceiling", &self.prompt_char_ceiling)
            .finish()
    }
}

fn default_api_url() -> String {
    "https://api.openai.com/v1/chat/completions".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_provider_timeout_ms() -> u64 {
    10_000
}
fn default_max_retries() -> u32 {
    2
}
fn default_max_tokens() -> u32 {
    1024
}
fn default_max_history_turns() -> usize {
    10
}
fn default_prompt_char_ceiling() -> usize {
    8_000
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_api_url(),
            model: default_model(),
            timeout_ms: default_provider_timeout_ms(),
            max_retries: default_max_retries(),
            max_tokens: default_max_tokens(),
            max_history_turns: default_max_history_turns(),
            prompt_char_ceiling: default_prompt_char_ceiling(),
        }
    }
}

/// Context aggregation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Hard ceiling on the bundle, in characters.
    #[serde(default = "default_char_budget")]
    pub char_budget: usize,

    /// Per-adapter read timeout.
    #[serde(default = "default_adapter_timeout_ms")]
    pub adapter_timeout_ms: u64,

    #[serde(default = "default_chat_limit")]
    pub chat_message_limit: usize,

    #[serde(default = "default_receipt_limit")]
    pub receipt_limit: usize,
}

fn default_char_budget() -> usize {
    6_000
}
fn default_adapter_timeout_ms() -> u64 {
    3_000
}
fn default_chat_limit() -> usize {
    30
}
fn default_receipt_limit() -> usize {
    10
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            char_budget: default_char_budget(),
            adapter_timeout_ms: default_adapter_timeout_ms(),
            chat_message_limit: default_chat_limit(),
            receipt_limit: default_receipt_limit(),
        }
    }
}

/// Response cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_ttl")]
    pub ttl_seconds: u64,

    /// Distinct cached queries kept per trip, oldest evicted first.
    #[serde(default = "default_max_entries_per_trip")]
    pub max_entries_per_trip: usize,

    /// Whether a near-miss may be promoted to a hit when fingerprints
    /// are identical.
    #[serde(default = "default_true")]
    pub similarity_promotion: bool,

    /// Token-overlap threshold for promotion (0.0–1.0).
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
}

fn default_cache_ttl() -> u64 {
    7 * 24 * 3600
}
fn default_max_entries_per_trip() -> usize {
    50
}
fn default_similarity_threshold() -> f64 {
    0.6
}
fn default_true() -> bool {
    true
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_cache_ttl(),
            max_entries_per_trip: default_max_entries_per_trip(),
            similarity_promotion: true,
            similarity_threshold: default_similarity_threshold(),
        }
    }
}

/// One rate-limit tier: max queries per sliding window, per (user, trip).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TierLimit {
    pub max_queries: u32,
    pub window_seconds: u64,
}

/// The tier table. Paid tiers are just bigger ceilings — every tier goes
/// through the same code path, unlimited is represented as a very large
/// ceiling rather than a bypass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_tiers")]
    pub tiers: HashMap<String, TierLimit>,

    #[serde(default = "default_tier")]
    pub default_tier: String,
}

fn default_tiers() -> HashMap<String, TierLimit> {
    HashMap::from([
        (
            "free".to_string(),
            TierLimit { max_queries: 20, window_seconds: 3600 },
        ),
        (
            "plus".to_string(),
            TierLimit { max_queries: 200, window_seconds: 3600 },
        ),
        (
            "pro".to_string(),
            TierLimit { max_queries: 1_000_000, window_seconds: 3600 },
        ),
    ])
}
fn default_tier() -> String {
    "free".into()
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            tiers: default_tiers(),
            default_tier: default_tier(),
        }
    }
}

/// SSRF-safe external fetch policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_max_redirects")]
    pub max_redirects: u32,

    #[serde(default = "default_fetch_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_max_response_bytes")]
    pub max_response_bytes: usize,
}

fn default_max_redirects() -> u32 {
    3
}
fn default_fetch_timeout_ms() -> u64 {
    5_000
}
fn default_max_response_bytes() -> usize {
    1024 * 1024
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_redirects: default_max_redirects(),
            timeout_ms: default_fetch_timeout_ms(),
            max_response_bytes: default_max_response_bytes(),
        }
    }
}

/// Guardrail pipeline knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardrailConfig {
    /// Maximum query text length, in characters.
    #[serde(default = "default_max_text_len")]
    pub max_text_len: usize,

    /// Classification confidence below which a sensitive-looking action
    /// defaults to require_confirmation.
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,
}

fn default_max_text_len() -> usize {
    2_000
}
fn default_confidence_threshold() -> f32 {
    0.5
}

impl Default for GuardrailConfig {
    fn default() -> Self {
        Self {
            max_text_len: default_max_text_len(),
            confidence_threshold: default_confidence_threshold(),
        }
    }
}

/// HTTP surface settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    8787
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Errors from config loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Invalid config: {0}")]
    Invalid(String),
}

impl ConciergeConfig {
    /// Load from the default location (`./concierge.toml`) with environment
    /// overrides. Missing file means defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from(Path::new("concierge.toml"))?;

        // Environment variable overrides (highest priority)
        if config.provider.api_key.is_none() {
            config.provider.api_key = std::env::var("WAYFARER_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }
        if let Ok(url) = std::env::var("WAYFARER_API_URL") {
            config.provider.api_url = url;
        }
        if let Ok(model) = std::env::var("WAYFARER_MODEL") {
            config.provider.model = model;
        }

        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.context.char_budget == 0 {
            return Err(ConfigError::Invalid("context.char_budget must be > 0".into()));
        }
        if self.provider.prompt_char_ceiling < self.context.char_budget {
            return Err(ConfigError::Invalid(
                "provider.prompt_char_ceiling must be >= context.char_budget".into(),
            ));
        }
        if !self.rate_limit.tiers.contains_key(&self.rate_limit.default_tier) {
            return Err(ConfigError::Invalid(format!(
                "rate_limit.default_tier '{}' has no entry in the tier table",
                self.rate_limit.default_tier
            )));
        }
        if !(0.0..=1.0).contains(&self.cache.similarity_threshold) {
            return Err(ConfigError::Invalid(
                "cache.similarity_threshold must be in [0, 1]".into(),
            ));
        }
        for (name, tier) in &self.rate_limit.tiers {
            if tier.max_queries == 0 || tier.window_seconds == 0 {
                return Err(ConfigError::Invalid(format!(
                    "tier '{name}' must have nonzero max_queries and window_seconds"
                )));
            }
        }
        Ok(())
    }

    /// Look up a tier, falling back to the default tier.
    pub fn tier(&self, name: &str) -> &TierLimit {
        self.rate_limit
            .tiers
            .get(name)
            .unwrap_or_else(|| &self.rate_limit.tiers[&self.rate_limit.default_tier])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ConciergeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cache.ttl_seconds, 7 * 24 * 3600);
        assert_eq!(config.provider.max_retries, 2);
        assert_eq!(config.context.adapter_timeout_ms, 3_000);
    }

    #[test]
    fn tier_lookup_falls_back_to_default() {
        let config = ConciergeConfig::default();
        assert_eq!(config.tier("free").max_queries, 20);
        assert_eq!(config.tier("nonexistent").max_queries, 20);
        assert_eq!(config.tier("pro").max_queries, 1_000_000);
    }

    #[test]
    fn debug_redacts_api_key() {
        let mut config = ConciergeConfig::default();
        config.provider.api_key = Some("sk-supersecret".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("supersecret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn parse_partial_toml_fills_defaults() {
        let toml_str = r#"
            [cache]
            ttl_seconds = 60

            [rate_limit.tiers.free]
            max_queries = 5
            window_seconds = 600
        "#;
        let config: ConciergeConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.cache.ttl_seconds, 60);
        assert_eq!(config.tier("free").max_queries, 5);
        // Untouched sections keep defaults
        assert_eq!(config.context.char_budget, 6_000);
    }

    #[test]
    fn invalid_default_tier_rejected() {
        let mut config = ConciergeConfig::default();
        config.rate_limit.default_tier = "platinum".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_window_tier_rejected() {
        let mut config = ConciergeConfig::default();
        config
            .rate_limit
            .tiers
            .insert("broken".into(), TierLimit { max_queries: 1, window_seconds: 0 });
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_from_missing_file_uses_defaults() {
        let config =
            ConciergeConfig::load_from(Path::new("/nonexistent/concierge.toml")).unwrap();
        assert_eq!(config.gateway.port, 8787);
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("concierge.toml");
        std::fs::write(&path, "[gateway]\nport = 9000\n").unwrap();
        let config = ConciergeConfig::load_from(&path).unwrap();
        assert_eq!(config.gateway.port, 9000);
    }
}
