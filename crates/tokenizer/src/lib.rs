//! Tokenizer service implementations for Weave.
//!
//! All tokenizers implement the `weave_core::Tokenizer` trait.
//! [`from_encoder`] selects one from a configuration string.

pub mod chars;
#[cfg(feature = "hf")]
pub mod hf;
pub mod words;

use std::sync::Arc;

use weave_core::error::TokenizerError;
use weave_core::tokenizer::{EncoderVariant, Tokenizer};

pub use chars::{CharTokenizer, CHARS_VARIANT};
#[cfg(feature = "hf")]
pub use hf::HfTokenizer;
pub use words::{WordTokenizer, WORDS_VARIANT};

/// Build a tokenizer from an encoder spec.
///
/// - `"chars"`: one token per character
/// - `"words"`: word pieces
/// - `"hf:<path>"`: a HuggingFace tokenizer file (requires the `hf` feature)
///
/// Returns the tokenizer together with the variant it serves.
pub fn from_encoder(spec: &str) -> Result<(Arc<dyn Tokenizer>, EncoderVariant), TokenizerError> {
    match spec {
        CHARS_VARIANT => Ok((Arc::new(CharTokenizer::new()), EncoderVariant::new(CHARS_VARIANT))),
        WORDS_VARIANT => Ok((Arc::new(WordTokenizer::new()), EncoderVariant::new(WORDS_VARIANT))),
        other => match other.strip_prefix("hf:") {
            Some(path) => load_hf(path),
            None => Err(TokenizerError::Unavailable(format!("Unknown encoder: {other}"))),
        },
    }
}

#[cfg(feature = "hf")]
fn load_hf(path: &str) -> Result<(Arc<dyn Tokenizer>, EncoderVariant), TokenizerError> {
    let path = std::path::Path::new(path);
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("hf")
        .to_string();
    let variant = EncoderVariant::new(format!("hf:{name}"));
    let tokenizer = HfTokenizer::from_file(path, variant.clone())?;
    Ok((Arc::new(tokenizer), variant))
}

#[cfg(not(feature = "hf"))]
fn load_hf(path: &str) -> Result<(Arc<dyn Tokenizer>, EncoderVariant), TokenizerError> {
    Err(TokenizerError::Unavailable(format!(
        "Cannot load {path}: built without the `hf` feature"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_encoders_resolve() {
        let (tok, variant) = from_encoder("chars").unwrap();
        assert_eq!(variant.as_str(), "chars");
        assert!(tok.supports(&variant));

        let (tok, variant) = from_encoder("words").unwrap();
        assert!(tok.supports(&variant));
    }

    #[test]
    fn unknown_encoder_is_unavailable() {
        let err = from_encoder("gpt9").err().unwrap();
        assert!(matches!(err, TokenizerError::Unavailable(_)));
    }

    #[cfg(not(feature = "hf"))]
    #[test]
    fn hf_requires_feature() {
        assert!(from_encoder("hf:/tmp/tokenizer.json").is_err());
    }
}
