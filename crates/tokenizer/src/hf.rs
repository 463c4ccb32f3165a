//! Tokenizer backed by a HuggingFace `tokenizer.json` file.
//!
//! Uses the [tokenizers](https://github.com/huggingface/tokenizers) crate, so
//! counts match the model the context is being built for.

use std::path::Path;

use async_trait::async_trait;
use tracing::info;
use weave_core::error::TokenizerError;
use weave_core::tokenizer::{EncoderVariant, Tokenizer};

pub struct HfTokenizer {
    variant: EncoderVariant,
    inner: tokenizers::Tokenizer,
}

impl HfTokenizer {
    /// Load a tokenizer file and serve it under `variant`.
    pub fn from_file(path: &Path, variant: EncoderVariant) -> Result<Self, TokenizerError> {
        let inner = tokenizers::Tokenizer::from_file(path).map_err(|e| {
            TokenizerError::Unavailable(format!("Failed to load tokenizer from {}: {e}", path.display()))
        })?;
        info!(path = %path.display(), variant = %variant, "Loaded tokenizer file");
        Ok(Self { variant, inner })
    }
}

#[async_trait]
impl Tokenizer for HfTokenizer {
    fn name(&self) -> &str {
        self.variant.as_str()
    }

    fn supports(&self, variant: &EncoderVariant) -> bool {
        *variant == self.variant
    }

    async fn encode(&self, text: &str, variant: &EncoderVariant) -> Result<Vec<u32>, TokenizerError> {
        self.ensure_supported(variant)?;
        let encoding = self
            .inner
            .encode(text, false)
            .map_err(|e| TokenizerError::Encode(e.to_string()))?;
        Ok(encoding.get_ids().to_vec())
    }

    async fn decode(&self, tokens: &[u32], variant: &EncoderVariant) -> Result<String, TokenizerError> {
        self.ensure_supported(variant)?;
        self.inner
            .decode(tokens, false)
            .map_err(|e| TokenizerError::Decode(e.to_string()))
    }
}
