//! Request documents: a `ContextRequest` written as TOML or JSON.
//!
//! Documents may leave most things out. Field configuration is filled from
//! the per-kind defaults of [`AppConfig`], key matching options from
//! `key_matching`, and the ceiling, encoder and preamble from the top level.

use std::path::Path;

use serde::{Deserialize, Serialize};
use weave_core::{ActivationRule, BiasGroup, ContentField, ContextRequest, EncoderVariant, FieldKind, KeyTrigger};

use crate::{AppConfig, ConfigError, FieldConfigOverride, KeyMatchingConfig};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<i64>,
    #[serde(default)]
    pub turn: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preamble: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldDocument>,
    #[serde(default)]
    pub biases: Vec<BiasGroup>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDocument {
    pub identifier: String,
    pub kind: FieldKind,
    #[serde(default)]
    pub text: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub config: FieldConfigOverride,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activation: Option<ActivationDocument>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_fields: Vec<FieldDocument>,
}

fn default_true() -> bool {
    true
}

/// Activation as written in a document; unset key options come from
/// `key_matching`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActivationDocument {
    AlwaysActive,
    KeyTriggered {
        keys: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        case_insensitive: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        whole_word: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        search_range: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cascading: Option<bool>,
    },
    TimeWindowed {
        start_turn: u32,
        end_turn: u32,
    },
}

impl ActivationDocument {
    fn resolve(self, matching: &KeyMatchingConfig) -> ActivationRule {
        match self {
            Self::AlwaysActive => ActivationRule::AlwaysActive,
            Self::TimeWindowed { start_turn, end_turn } => ActivationRule::TimeWindowed { start_turn, end_turn },
            Self::KeyTriggered {
                keys,
                case_insensitive,
                whole_word,
                search_range,
                cascading,
            } => ActivationRule::KeyTriggered(KeyTrigger {
                keys,
                case_insensitive: case_insensitive.unwrap_or(matching.case_insensitive),
                whole_word: whole_word.unwrap_or(matching.whole_word),
                search_range: search_range.or(matching.search_range),
                cascading: cascading.unwrap_or(true),
            }),
        }
    }
}

impl FieldDocument {
    pub fn into_field(self, config: &AppConfig) -> ContentField {
        let field_config = self.config.apply(config.defaults.for_kind(self.kind));
        let activation = self
            .activation
            .map(|a| a.resolve(&config.key_matching))
            .unwrap_or_default();
        ContentField {
            identifier: self.identifier,
            kind: self.kind,
            text: self.text,
            enabled: self.enabled,
            config: field_config,
            activation,
            sub_fields: self.sub_fields.into_iter().map(|f| f.into_field(config)).collect(),
        }
    }
}

impl RequestDocument {
    pub fn into_request(self, config: &AppConfig) -> ContextRequest {
        let fields = self.fields.into_iter().map(|f| f.into_field(config)).collect();
        ContextRequest::new(self.max_tokens.unwrap_or(config.max_tokens), fields)
            .with_turn(self.turn)
            .with_encoder(EncoderVariant::new(self.encoder.unwrap_or_else(|| config.encoder.clone())))
            .with_preamble(self.preamble.unwrap_or_else(|| config.preamble.clone()))
            .with_biases(self.biases)
    }

    /// Parse a document, choosing the format by file extension
    /// (`.json`, anything else is TOML).
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let parse_error = |reason: String| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason,
        };

        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&content).map_err(|e| parse_error(e.to_string())),
            _ => toml::from_str(&content).map_err(|e| parse_error(e.to_string())),
        }
    }
}

/// Load a request document and resolve it against `config`.
pub fn load_request(path: &Path, config: &AppConfig) -> Result<ContextRequest, ConfigError> {
    let request = RequestDocument::load(path)?.into_request(config);
    tracing::debug!(
        path = %path.display(),
        fields = request.fields.len(),
        max_tokens = request.max_tokens,
        "Loaded request"
    );
    Ok(request)
}
