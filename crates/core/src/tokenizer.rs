//! Tokenizer trait — the abstraction over text ↔ token id services.
//!
//! The engine never tokenizes on its own; every count it makes goes through
//! a `Tokenizer`. Implementations must be deterministic for identical
//! `(text, variant)` pairs within one pass.
//!
//! Implementations: `weave-tokenizer` (chars, words, HuggingFace files).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::TokenizerError;

/// Name of an encoder (vocabulary) a tokenizer serves.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncoderVariant(pub String);

impl EncoderVariant {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for EncoderVariant {
    fn default() -> Self {
        Self::new("words")
    }
}

impl std::fmt::Display for EncoderVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The tokenizer service consumed by the context engine.
///
/// Every call is a potential suspension point: an implementation may hand the
/// work to a worker thread or a remote service.
#[async_trait]
pub trait Tokenizer: Send + Sync {
    /// Tokenizer name (for logging and error messages).
    fn name(&self) -> &str;

    /// Whether this tokenizer can serve the given encoder variant.
    fn supports(&self, variant: &EncoderVariant) -> bool;

    /// Encode text into token ids.
    async fn encode(&self, text: &str, variant: &EncoderVariant) -> Result<Vec<u32>, TokenizerError>;

    /// Decode token ids back into text.
    async fn decode(&self, tokens: &[u32], variant: &EncoderVariant) -> Result<String, TokenizerError>;

    /// Number of tokens `text` encodes to.
    async fn count(&self, text: &str, variant: &EncoderVariant) -> Result<usize, TokenizerError> {
        if text.is_empty() {
            return Ok(0);
        }
        Ok(self.encode(text, variant).await?.len())
    }

    /// Reject a variant this tokenizer does not serve.
    fn ensure_supported(&self, variant: &EncoderVariant) -> Result<(), TokenizerError> {
        if self.supports(variant) {
            Ok(())
        } else {
            Err(TokenizerError::UnsupportedVariant {
                tokenizer: self.name().to_string(),
                variant: variant.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BytesTokenizer;

    #[async_trait]
    impl Tokenizer for BytesTokenizer {
        fn name(&self) -> &str {
            "bytes"
        }

        fn supports(&self, variant: &EncoderVariant) -> bool {
            variant.as_str() == "bytes"
        }

        async fn encode(&self, text: &str, variant: &EncoderVariant) -> Result<Vec<u32>, TokenizerError> {
            self.ensure_supported(variant)?;
            Ok(text.bytes().map(u32::from).collect())
        }

        async fn decode(&self, tokens: &[u32], variant: &EncoderVariant) -> Result<String, TokenizerError> {
            self.ensure_supported(variant)?;
            let bytes: Vec<u8> = tokens.iter().map(|t| *t as u8).collect();
            String::from_utf8(bytes).map_err(|e| TokenizerError::Decode(e.to_string()))
        }
    }

    #[tokio::test]
    async fn default_count_uses_encode() {
        let tok = BytesTokenizer;
        let variant = EncoderVariant::new("bytes");
        assert_eq!(tok.count("abc", &variant).await.unwrap(), 3);
        assert_eq!(tok.count("", &variant).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn unsupported_variant_is_rejected() {
        let tok = BytesTokenizer;
        let err = tok.encode("abc", &EncoderVariant::new("gpt2")).await.unwrap_err();
        assert!(matches!(err, TokenizerError::UnsupportedVariant { .. }));
    }

    #[test]
    fn variant_serializes_as_plain_string() {
        let json = serde_json::to_string(&EncoderVariant::new("chars")).unwrap();
        assert_eq!(json, "\"chars\"");
    }
}
