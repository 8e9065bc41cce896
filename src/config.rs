//! TOML configuration.
//!
//! Every section has serde defaults, so a config file only needs the
//! settings it changes. [`load_config`] parses and validates;
//! [`Config::minimal`] gives an all-defaults config for library use.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub patterns: PatternsConfig,
    #[serde(default)]
    pub enhancement: EnhancementConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./data/plans.sqlite")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExtractionConfig {
    #[serde(default = "default_max_bytes")]
    pub max_bytes: u64,
    /// Recorded on documents and used to repair missing platform tags.
    #[serde(default = "default_platform_tag")]
    pub platform_tag: String,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_bytes: default_max_bytes(),
            platform_tag: default_platform_tag(),
        }
    }
}

fn default_max_bytes() -> u64 {
    25 * 1024 * 1024
}
fn default_platform_tag() -> String {
    std::env::consts::OS.to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct PatternsConfig {
    #[serde(default = "default_max_per_format")]
    pub max_per_format: usize,
    #[serde(default = "default_hint_limit")]
    pub hint_limit: usize,
}

impl Default for PatternsConfig {
    fn default() -> Self {
        Self {
            max_per_format: default_max_per_format(),
            hint_limit: default_hint_limit(),
        }
    }
}

fn default_max_per_format() -> usize {
    plan_harness_core::patterns::MAX_FINGERPRINTS_PER_FORMAT
}
fn default_hint_limit() -> usize {
    plan_harness_core::patterns::HINT_LIMIT
}

#[derive(Debug, Deserialize, Clone)]
pub struct EnhancementConfig {
    /// `local-first`, `remote-first` or `balanced`.
    #[serde(default = "default_policy")]
    pub policy: String,
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
    #[serde(default = "default_local_batch_size")]
    pub local_batch_size: usize,
    #[serde(default = "default_inter_batch_delay_ms")]
    pub inter_batch_delay_ms: u64,
    #[serde(default)]
    pub local: LocalEngineConfig,
    #[serde(default)]
    pub remote: RemoteServiceConfig,
}

impl Default for EnhancementConfig {
    fn default() -> Self {
        Self {
            policy: default_policy(),
            probe_timeout_secs: default_probe_timeout_secs(),
            local_batch_size: default_local_batch_size(),
            inter_batch_delay_ms: default_inter_batch_delay_ms(),
            local: LocalEngineConfig::default(),
            remote: RemoteServiceConfig::default(),
        }
    }
}

fn default_policy() -> String {
    "balanced".to_string()
}
fn default_probe_timeout_secs() -> u64 {
    5
}
fn default_local_batch_size() -> usize {
    3
}
fn default_inter_batch_delay_ms() -> u64 {
    500
}

#[derive(Debug, Deserialize, Clone)]
pub struct LocalEngineConfig {
    /// `disabled` or `ollama`.
    #[serde(default = "default_disabled")]
    pub provider: String,
    #[serde(default = "default_ollama_url")]
    pub url: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_local_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LocalEngineConfig {
    fn default() -> Self {
        Self {
            provider: default_disabled(),
            url: default_ollama_url(),
            model: None,
            timeout_secs: default_local_timeout_secs(),
        }
    }
}

impl LocalEngineConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_disabled() -> String {
    "disabled".to_string()
}
fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_local_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct RemoteServiceConfig {
    /// `disabled` or `huggingface`.
    #[serde(default = "default_disabled")]
    pub provider: String,
    #[serde(default = "default_remote_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub model: Option<String>,
    /// Tried in order after `model` hits a rate limit or quota.
    #[serde(default)]
    pub alternate_models: Vec<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_inter_call_delay_ms")]
    pub inter_call_delay_ms: u64,
    #[serde(default = "default_max_calls_per_window")]
    pub max_calls_per_window: u32,
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
    #[serde(default = "default_remote_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for RemoteServiceConfig {
    fn default() -> Self {
        Self {
            provider: default_disabled(),
            base_url: default_remote_base_url(),
            model: None,
            alternate_models: Vec::new(),
            api_key_env: default_api_key_env(),
            inter_call_delay_ms: default_inter_call_delay_ms(),
            max_calls_per_window: default_max_calls_per_window(),
            window_secs: default_window_secs(),
            cooldown_secs: default_cooldown_secs(),
            timeout_secs: default_remote_timeout_secs(),
        }
    }
}

impl RemoteServiceConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }

    /// Primary model followed by the alternates, without duplicates.
    pub fn models(&self) -> Vec<String> {
        let mut models: Vec<String> = self.model.iter().cloned().collect();
        for alt in &self.alternate_models {
            if !models.contains(alt) {
                models.push(alt.clone());
            }
        }
        models
    }
}

fn default_remote_base_url() -> String {
    "https://api-inference.huggingface.co/models".to_string()
}
fn default_api_key_env() -> String {
    "HF_API_TOKEN".to_string()
}
fn default_inter_call_delay_ms() -> u64 {
    1000
}
fn default_max_calls_per_window() -> u32 {
    30
}
fn default_window_secs() -> u64 {
    60
}
fn default_cooldown_secs() -> u64 {
    60
}
fn default_remote_timeout_secs() -> u64 {
    30
}

impl Config {
    /// All defaults, both inference tiers disabled.
    pub fn minimal() -> Self {
        Self::default()
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.extraction.max_bytes == 0 {
        anyhow::bail!("extraction.max_bytes must be > 0");
    }

    if config.patterns.max_per_format == 0 {
        anyhow::bail!("patterns.max_per_format must be >= 1");
    }
    if config.patterns.hint_limit == 0 {
        anyhow::bail!("patterns.hint_limit must be >= 1");
    }

    let enhancement = &config.enhancement;
    match enhancement.policy.as_str() {
        "local-first" | "remote-first" | "balanced" => {}
        other => anyhow::bail!(
            "Unknown enhancement policy: '{}'. Must be local-first, remote-first, or balanced.",
            other
        ),
    }
    if enhancement.local_batch_size == 0 {
        anyhow::bail!("enhancement.local_batch_size must be >= 1");
    }

    match enhancement.local.provider.as_str() {
        "disabled" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown local engine provider: '{}'. Must be disabled or ollama.",
            other
        ),
    }
    if enhancement.local.is_enabled() && enhancement.local.model.is_none() {
        anyhow::bail!(
            "enhancement.local.model must be specified when provider is '{}'",
            enhancement.local.provider
        );
    }

    match enhancement.remote.provider.as_str() {
        "disabled" | "huggingface" => {}
        other => anyhow::bail!(
            "Unknown remote provider: '{}'. Must be disabled or huggingface.",
            other
        ),
    }
    if enhancement.remote.is_enabled() {
        if enhancement.remote.model.is_none() {
            anyhow::bail!(
                "enhancement.remote.model must be specified when provider is '{}'",
                enhancement.remote.provider
            );
        }
        if enhancement.remote.max_calls_per_window == 0 {
            anyhow::bail!("enhancement.remote.max_calls_per_window must be >= 1");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gets_defaults() {
        let config: Config = toml::from_str("").unwrap();
        validate(&config).unwrap();
        assert_eq!(config.patterns.max_per_format, 50);
        assert_eq!(config.patterns.hint_limit, 5);
        assert_eq!(config.enhancement.policy, "balanced");
        assert_eq!(config.enhancement.local_batch_size, 3);
        assert_eq!(config.enhancement.remote.api_key_env, "HF_API_TOKEN");
        assert!(!config.enhancement.remote.is_enabled());
    }

    #[test]
    fn rejects_unknown_policy() {
        let config: Config = toml::from_str("[enhancement]\npolicy = \"fastest\"\n").unwrap();
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("Unknown enhancement policy"));
    }

    #[test]
    fn enabled_remote_needs_model() {
        let config: Config =
            toml::from_str("[enhancement.remote]\nprovider = \"huggingface\"\n").unwrap();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn model_list_has_no_duplicates() {
        let config: Config = toml::from_str(
            "[enhancement.remote]\nprovider = \"huggingface\"\nmodel = \"a\"\nalternate_models = [\"b\", \"a\", \"c\"]\n",
        )
        .unwrap();
        validate(&config).unwrap();
        assert_eq!(config.enhancement.remote.models(), vec!["a", "b", "c"]);
    }
}
