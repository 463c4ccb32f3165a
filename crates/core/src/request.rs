//! The input of one assembly pass.

use serde::{Deserialize, Serialize};

use crate::bias::BiasGroup;
use crate::field::ContentField;
use crate::tokenizer::EncoderVariant;

/// An immutable snapshot of everything a pass needs.
///
/// The caller resolves story, lorebook and session state into this value;
/// the engine never reaches for ambient state of its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextRequest {
    /// Token ceiling. Validated by the engine; zero or negative is rejected.
    pub max_tokens: i64,

    /// Current turn, for time-windowed fields.
    #[serde(default)]
    pub turn: u32,

    #[serde(default)]
    pub encoder: EncoderVariant,

    #[serde(default)]
    pub preamble: String,

    pub fields: Vec<ContentField>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub biases: Vec<BiasGroup>,
}

impl ContextRequest {
    pub fn new(max_tokens: i64, fields: Vec<ContentField>) -> Self {
        Self {
            max_tokens,
            turn: 0,
            encoder: EncoderVariant::default(),
            preamble: String::new(),
            fields,
            biases: Vec::new(),
        }
    }

    pub fn with_turn(mut self, turn: u32) -> Self {
        self.turn = turn;
        self
    }

    pub fn with_encoder(mut self, encoder: EncoderVariant) -> Self {
        self.encoder = encoder;
        self
    }

    pub fn with_preamble(mut self, preamble: impl Into<String>) -> Self {
        self.preamble = preamble.into();
        self
    }

    pub fn with_biases(mut self, biases: Vec<BiasGroup>) -> Self {
        self.biases = biases;
        self
    }
}
