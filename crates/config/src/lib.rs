//! Configuration loading, validation, and management for Weave.
//!
//! Loads configuration from `~/.weave/config.toml` with environment
//! variable overrides. Validates all settings at startup.

pub mod request;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use weave_core::{FieldConfig, FieldKind, Insertion, TokenLimit, TrimDirection, TrimMethod};

pub use request::{load_request, ActivationDocument, FieldDocument, RequestDocument};

/// The root configuration structure.
///
/// Maps directly to `~/.weave/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Token ceiling used when a request does not set one
    #[serde(default = "default_max_tokens")]
    pub max_tokens: i64,

    /// Tokenizer selection: `words`, `chars` or `hf:<path>`
    #[serde(default = "default_encoder")]
    pub encoder: String,

    /// Text shown ahead of the assembled context, outside the budget
    #[serde(default)]
    pub preamble: String,

    /// Defaults for key-triggered fields
    #[serde(default)]
    pub key_matching: KeyMatchingConfig,

    /// Per-kind field configuration overrides
    #[serde(default)]
    pub defaults: FieldDefaults,
}

fn default_max_tokens() -> i64 {
    2048
}
fn default_encoder() -> String {
    "words".into()
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyMatchingConfig {
    #[serde(default = "default_true")]
    pub case_insensitive: bool,

    #[serde(default)]
    pub whole_word: bool,

    /// Only search the last N characters of assembled text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_range: Option<usize>,
}

impl Default for KeyMatchingConfig {
    fn default() -> Self {
        Self {
            case_insensitive: true,
            whole_word: false,
            search_range: None,
        }
    }
}

/// Partial `FieldConfig`. Unset values fall through to the base config.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldConfigOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget_priority: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reserved_tokens: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trim_direction: Option<TrimDirection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_trim: Option<TrimMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insertion: Option<Insertion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suffix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_budget: Option<TokenLimit>,
}

impl FieldConfigOverride {
    pub fn apply(&self, mut base: FieldConfig) -> FieldConfig {
        if let Some(v) = self.budget_priority {
            base.budget_priority = v;
        }
        if let Some(v) = self.reserved_tokens {
            base.reserved_tokens = v;
        }
        if let Some(v) = self.trim_direction {
            base.trim_direction = v;
        }
        if let Some(v) = self.max_trim {
            base.max_trim = v;
        }
        if let Some(v) = self.insertion {
            base.insertion = v;
        }
        if let Some(v) = &self.prefix {
            base.prefix = v.clone();
        }
        if let Some(v) = &self.suffix {
            base.suffix = v.clone();
        }
        if let Some(v) = self.token_budget {
            base.token_budget = Some(v);
        }
        base
    }
}

/// Per-kind overrides on top of the built-in field defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldDefaults {
    #[serde(default)]
    pub story: FieldConfigOverride,
    #[serde(default)]
    pub memory: FieldConfigOverride,
    #[serde(default)]
    pub authors_note: FieldConfigOverride,
    #[serde(default)]
    pub lore: FieldConfigOverride,
    #[serde(default)]
    pub ephemeral: FieldConfigOverride,
}

impl FieldDefaults {
    pub fn overrides(&self, kind: FieldKind) -> &FieldConfigOverride {
        match kind {
            FieldKind::Story => &self.story,
            FieldKind::Memory => &self.memory,
            FieldKind::AuthorsNote => &self.authors_note,
            FieldKind::Lore => &self.lore,
            FieldKind::Ephemeral => &self.ephemeral,
        }
    }

    /// Effective default configuration for a kind.
    pub fn for_kind(&self, kind: FieldKind) -> FieldConfig {
        self.overrides(kind).apply(FieldConfig::for_kind(kind))
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.weave/config.toml).
    ///
    /// Environment overrides:
    /// - `WEAVE_MAX_TOKENS`
    /// - `WEAVE_ENCODER`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if let Ok(raw) = std::env::var("WEAVE_MAX_TOKENS") {
            config.max_tokens = raw.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!("WEAVE_MAX_TOKENS is not an integer: {raw}"))
            })?;
        }

        if let Ok(encoder) = std::env::var("WEAVE_ENCODER") {
            config.encoder = encoder;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
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

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".weave")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_tokens <= 0 {
            return Err(ConfigError::ValidationError("max_tokens must be > 0".into()));
        }

        if self.encoder.trim().is_empty() {
            return Err(ConfigError::ValidationError("encoder must not be empty".into()));
        }

        for kind in [
            FieldKind::Story,
            FieldKind::Memory,
            FieldKind::AuthorsNote,
            FieldKind::Lore,
            FieldKind::Ephemeral,
        ] {
            if let Some(limit) = self.defaults.overrides(kind).token_budget {
                if !limit.is_valid() {
                    return Err(ConfigError::ValidationError(format!(
                        "defaults.{kind:?}.token_budget must be a fraction in (0, 1] or a token count"
                    )));
                }
            }
        }

        Ok(())
    }

    /// Generate a default config TOML string (for `weave config`).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            encoder: default_encoder(),
            preamble: String::new(),
            key_matching: KeyMatchingConfig::default(),
            defaults: FieldDefaults::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigError> for weave_core::Error {
    fn from(err: ConfigError) -> Self {
        weave_core::Error::Config {
            message: err.to_string(),
        }
    }
}
