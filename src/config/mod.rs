//! Configuration system (layered: code > env > config file > defaults).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::OmniError;
use crate::tools::descriptor::BackendFamily;
use crate::util::retry::{RetryPolicy, DEFAULT_RETRY_STATUSES};
use crate::util::usage::{TokenAccountant, DEFAULT_TOKEN_CEILING, DEFAULT_WARNING_FLOOR};

/// Supported backends.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ProviderKind {
    #[default]
    Cborg,
    Openai,
    Ollama,
}

impl ProviderKind {
    pub fn family(&self) -> BackendFamily {
        match self {
            Self::Cborg | Self::Openai => BackendFamily::Structured,
            Self::Ollama => BackendFamily::Tagged,
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Self::Cborg => "lbl/cborg-coder:latest",
            Self::Openai => "gpt-4o",
            Self::Ollama => "codellama",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::Cborg => "https://api.cborg.lbl.gov/v1",
            Self::Openai => "https://api.openai.com/v1",
            Self::Ollama => "http://localhost:11434",
        }
    }

    /// Environment variable holding the API key, for providers that need one.
    pub fn api_key_env(&self) -> Option<&'static str> {
        match self {
            Self::Cborg => Some("CBORG_API_KEY"),
            Self::Openai => Some("OPENAI_API_KEY"),
            Self::Ollama => None,
        }
    }

    pub fn base_url_env(&self) -> &'static str {
        match self {
            Self::Cborg => "CBORG_BASE_URL",
            Self::Openai => "OPENAI_BASE_URL",
            Self::Ollama => "OLLAMA_BASE_URL",
        }
    }
}

/// Per-provider credentials and endpoint overrides.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
}

impl std::fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("api_key", &self.api_key.as_ref().map(|_| ".."))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

/// Retry envelope settings as written in the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub multiplier: f64,
    pub retry_on_status: Vec<u16>,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 1_000,
            max_backoff_ms: 8_000,
            multiplier: 2.0,
            retry_on_status: DEFAULT_RETRY_STATUSES.to_vec(),
        }
    }
}

impl RetrySettings {
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
            multiplier: self.multiplier,
            retry_on_status: self.retry_on_status.clone(),
        }
    }
}

/// Token budget settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetSettings {
    pub token_ceiling: u64,
    pub warning_floor: u64,
}

impl Default for BudgetSettings {
    fn default() -> Self {
        Self {
            token_ceiling: DEFAULT_TOKEN_CEILING,
            warning_floor: DEFAULT_WARNING_FLOOR,
        }
    }
}

impl BudgetSettings {
    pub fn to_accountant(&self) -> TokenAccountant {
        TokenAccountant::new(self.token_ceiling, self.warning_floor)
    }
}

/// Explicit overrides applied last (typically CLI flags).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigOverrides {
    pub provider: Option<ProviderKind>,
    pub model: Option<String>,
    pub temperature: Option<f64>,
}

/// Layered configuration for Omni.
///
/// Resolution order, lowest first:
/// 1. Built-in defaults
/// 2. TOML file (`$OMNI_CONFIG` or the platform config dir)
/// 3. Environment variables (after loading `.env`)
/// 4. [`ConfigOverrides`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OmniConfig {
    pub provider: ProviderKind,
    /// Model override for the active provider.
    pub model: Option<String>,
    pub temperature: f64,
    pub top_p: f64,
    pub show_tool_usage: bool,
    /// Shell command run to install a missing dependency; `{package}` is substituted.
    pub install_command: String,
    pub cborg: ProviderSettings,
    pub openai: ProviderSettings,
    pub ollama: ProviderSettings,
    pub retry: RetrySettings,
    pub budget: BudgetSettings,
}

impl Default for OmniConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            model: None,
            temperature: 0.7,
            top_p: 0.9,
            show_tool_usage: true,
            install_command: "cargo install {package}".to_string(),
            cborg: ProviderSettings::default(),
            openai: ProviderSettings::default(),
            ollama: ProviderSettings::default(),
            retry: RetrySettings::default(),
            budget: BudgetSettings::default(),
        }
    }
}

impl OmniConfig {
    /// Load defaults, the config file (if any) and the environment.
    pub fn load() -> Result<Self, OmniError> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        Self::load_from(default_config_path().as_deref())
    }

    /// Like [`OmniConfig::load`] with an explicit config file path.
    pub fn load_from(path: Option<&Path>) -> Result<Self, OmniError> {
        let mut config = match path {
            Some(path) if path.exists() => Self::from_file(path)?,
            _ => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, OmniError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
            .map_err(|e| OmniError::Configuration(format!("{}: {e}", path.display())))
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, OmniError> {
        toml::from_str(raw).map_err(|e| OmniError::Configuration(e.to_string()))
    }

    /// Apply environment overrides read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), OmniError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(provider) = lookup("OMNI_PROVIDER") {
            self.provider = provider.trim().parse().map_err(|_| {
                OmniError::Configuration(format!(
                    "Invalid provider '{provider}'. Must be one of: cborg, openai, ollama"
                ))
            })?;
        }
        if let Some(model) = lookup("OMNI_MODEL") {
            self.model = Some(model);
        }
        if let Some(temperature) = lookup("OMNI_TEMPERATURE") {
            self.temperature = temperature.trim().parse().map_err(|_| {
                OmniError::Configuration(format!("OMNI_TEMPERATURE is not a number: {temperature}"))
            })?;
        }

        for kind in [ProviderKind::Cborg, ProviderKind::Openai, ProviderKind::Ollama] {
            let settings = self.provider_settings_mut(kind);
            if let Some(key) = kind.api_key_env().and_then(lookup) {
                settings.api_key = Some(key);
            }
            if let Some(url) = lookup(kind.base_url_env()) {
                settings.base_url = Some(url);
            }
        }
        Ok(())
    }

    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(provider) = overrides.provider {
            self.provider = provider;
        }
        if let Some(model) = overrides.model {
            self.model = Some(model);
        }
        if let Some(temperature) = overrides.temperature {
            self.temperature = temperature;
        }
        self
    }

    pub fn provider_settings(&self, kind: ProviderKind) -> &ProviderSettings {
        match kind {
            ProviderKind::Cborg => &self.cborg,
            ProviderKind::Openai => &self.openai,
            ProviderKind::Ollama => &self.ollama,
        }
    }

    fn provider_settings_mut(&mut self, kind: ProviderKind) -> &mut ProviderSettings {
        match kind {
            ProviderKind::Cborg => &mut self.cborg,
            ProviderKind::Openai => &mut self.openai,
            ProviderKind::Ollama => &mut self.ollama,
        }
    }

    /// Model for the active provider.
    pub fn resolved_model(&self) -> String {
        self.model
            .clone()
            .or_else(|| self.provider_settings(self.provider).model.clone())
            .unwrap_or_else(|| self.provider.default_model().to_string())
    }

    /// Base URL for the active provider.
    pub fn resolved_base_url(&self) -> String {
        self.provider_settings(self.provider)
            .base_url
            .clone()
            .unwrap_or_else(|| self.provider.default_base_url().to_string())
    }

    /// API key for the active provider.
    pub fn api_key(&self) -> Option<String> {
        self.provider_settings(self.provider).api_key.clone()
    }

    pub fn family(&self) -> BackendFamily {
        self.provider.family()
    }

    /// Check ranges and credentials for the active provider.
    pub fn validate(&self) -> Result<(), OmniError> {
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(OmniError::Configuration(format!(
                "temperature must be between 0 and 1, got {}",
                self.temperature
            )));
        }
        if !(0.0..=1.0).contains(&self.top_p) {
            return Err(OmniError::Configuration(format!(
                "top_p must be between 0 and 1, got {}",
                self.top_p
            )));
        }
        if self.retry.multiplier < 1.0 {
            return Err(OmniError::Configuration(format!(
                "retry multiplier must be at least 1, got {}",
                self.retry.multiplier
            )));
        }
        if let Some(env) = self.provider.api_key_env() {
            if self.api_key().map_or(true, |k| k.trim().is_empty()) {
                return Err(OmniError::Authentication(format!(
                    "Missing {env} for provider {}",
                    self.provider
                )));
            }
        }
        Ok(())
    }
}

/// `$OMNI_CONFIG`, else `config.toml` in the platform config directory.
pub fn default_config_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os("OMNI_CONFIG") {
        return Some(PathBuf::from(path));
    }
    directories::ProjectDirs::from("", "", "omni").map(|dirs| dirs.config_dir().join("config.toml"))
}
