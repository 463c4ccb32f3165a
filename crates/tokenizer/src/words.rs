//! Word-piece tokenizer with a hashed vocabulary.
//!
//! Splits text the way BPE pre-tokenizers roughly do:
//! - a run of letters/digits is one piece, with any preceding spaces attached
//!   (`" hero"`),
//! - every other non-space character is its own piece, also carrying
//!   preceding spaces (`" ."`),
//! - `\n` is always a piece on its own,
//! - spaces before a newline or the end of the text form their own piece.
//!
//! A piece's id is the 32-bit FNV-1a hash of its bytes, so ids do not depend
//! on what the tokenizer has seen before and two instances agree. Should two
//! distinct pieces hash alike, the later one takes the next free id. Every
//! encoded piece is remembered, so decoding what this instance encoded is
//! lossless.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use weave_core::error::TokenizerError;
use weave_core::tokenizer::{EncoderVariant, Tokenizer};

/// Variant name served by [`WordTokenizer`].
pub const WORDS_VARIANT: &str = "words";

#[derive(Debug, Default)]
struct Vocab {
    pieces: HashMap<u32, String>,
}

impl Vocab {
    fn intern(&mut self, piece: &str) -> u32 {
        let mut id = fnv1a(piece);
        loop {
            match self.pieces.get(&id) {
                Some(known) if known == piece => return id,
                Some(_) => id = id.wrapping_add(1),
                None => {
                    self.pieces.insert(id, piece.to_string());
                    return id;
                }
            }
        }
    }
}

fn fnv1a(piece: &str) -> u32 {
    piece.bytes().fold(0x811c_9dc5, |hash, byte| (hash ^ u32::from(byte)).wrapping_mul(0x0100_0193))
}

#[derive(Debug, Default)]
pub struct WordTokenizer {
    vocab: RwLock<Vocab>,
}

impl WordTokenizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct pieces seen so far.
    pub fn vocab_size(&self) -> usize {
        self.vocab.read().map(|v| v.pieces.len()).unwrap_or(0)
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Split text into pieces. Concatenating the pieces yields the input.
pub fn split_pieces(text: &str) -> Vec<&str> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let offset = |i: usize| chars.get(i).map_or(text.len(), |(o, _)| *o);

    let mut pieces = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let begin = chars[i].0;
        if chars[i].1 == '\n' {
            i += 1;
            pieces.push(&text[begin..offset(i)]);
            continue;
        }

        let mut j = i;
        while j < chars.len() && chars[j].1.is_whitespace() && chars[j].1 != '\n' {
            j += 1;
        }
        if j < chars.len() && chars[j].1 != '\n' {
            if is_word_char(chars[j].1) {
                while j < chars.len() && is_word_char(chars[j].1) {
                    j += 1;
                }
            } else {
                j += 1;
            }
        }

        pieces.push(&text[begin..offset(j)]);
        i = j;
    }
    pieces
}

#[async_trait]
impl Tokenizer for WordTokenizer {
    fn name(&self) -> &str {
        WORDS_VARIANT
    }

    fn supports(&self, variant: &EncoderVariant) -> bool {
        variant.as_str() == WORDS_VARIANT
    }

    async fn encode(&self, text: &str, variant: &EncoderVariant) -> Result<Vec<u32>, TokenizerError> {
        self.ensure_supported(variant)?;
        let mut vocab = self
            .vocab
            .write()
            .map_err(|_| TokenizerError::Unavailable("word vocabulary lock poisoned".into()))?;

        Ok(split_pieces(text).into_iter().map(|piece| vocab.intern(piece)).collect())
    }

    async fn decode(&self, tokens: &[u32], variant: &EncoderVariant) -> Result<String, TokenizerError> {
        self.ensure_supported(variant)?;
        let vocab = self
            .vocab
            .read()
            .map_err(|_| TokenizerError::Unavailable("word vocabulary lock poisoned".into()))?;

        let mut out = String::new();
        for &t in tokens {
            let piece = vocab
                .pieces
                .get(&t)
                .ok_or_else(|| TokenizerError::Decode(format!("unknown token id {t}")))?;
            out.push_str(piece);
        }
        Ok(out)
    }

    async fn count(&self, text: &str, variant: &EncoderVariant) -> Result<usize, TokenizerError> {
        self.ensure_supported(variant)?;
        Ok(split_pieces(text).len())
    }
}
