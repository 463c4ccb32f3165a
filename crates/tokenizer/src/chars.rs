//! One token per Unicode scalar value.
//!
//! Lossless and stateless: a token id is the code point itself, so any prefix
//! or suffix of the id sequence decodes to a prefix or suffix of the text.

use async_trait::async_trait;
use weave_core::error::TokenizerError;
use weave_core::tokenizer::{EncoderVariant, Tokenizer};

/// Variant name served by [`CharTokenizer`].
pub const CHARS_VARIANT: &str = "chars";

#[derive(Debug, Clone, Copy, Default)]
pub struct CharTokenizer;

impl CharTokenizer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Tokenizer for CharTokenizer {
    fn name(&self) -> &str {
        CHARS_VARIANT
    }

    fn supports(&self, variant: &EncoderVariant) -> bool {
        variant.as_str() == CHARS_VARIANT
    }

    async fn encode(&self, text: &str, variant: &EncoderVariant) -> Result<Vec<u32>, TokenizerError> {
        self.ensure_supported(variant)?;
        Ok(text.chars().map(u32::from).collect())
    }

    async fn decode(&self, tokens: &[u32], variant: &EncoderVariant) -> Result<String, TokenizerError> {
        self.ensure_supported(variant)?;
        tokens
            .iter()
            .map(|&t| {
                char::from_u32(t).ok_or_else(|| TokenizerError::Decode(format!("invalid code point {t:#x}")))
            })
            .collect()
    }

    async fn count(&self, text: &str, variant: &EncoderVariant) -> Result<usize, TokenizerError> {
        self.ensure_supported(variant)?;
        Ok(text.chars().count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variant() -> EncoderVariant {
        EncoderVariant::new(CHARS_VARIANT)
    }

    #[tokio::test]
    async fn counts_scalars_not_bytes() {
        let tok = CharTokenizer::new();
        assert_eq!(tok.count("héllo", &variant()).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn prefix_of_ids_decodes_to_prefix_of_text() {
        let tok = CharTokenizer::new();
        let ids = tok.encode("caves", &variant()).await.unwrap();
        assert_eq!(tok.decode(&ids[..4], &variant()).await.unwrap(), "cave");
    }

    #[tokio::test]
    async fn invalid_code_point_fails_decode() {
        let tok = CharTokenizer::new();
        let err = tok.decode(&[0xD800], &variant()).await.unwrap_err();
        assert!(matches!(err, TokenizerError::Decode(_)));
    }

    #[tokio::test]
    async fn other_variants_rejected() {
        let tok = CharTokenizer::new();
        assert!(tok.encode("x", &EncoderVariant::new("words")).await.is_err());
    }
}
