//! Trim strategy — fit a field's body into what is left of the budget.
//!
//! Granularities are tried coarse to fine (Newline, Sentence, Token), up to
//! the field's `max_trim`. A finer granularity is only reached when the
//! coarser one cannot produce any non-empty text that fits. Within one
//! granularity the longest fitting cut wins.
//!
//! Prefix and suffix are never trimmed but always counted: every fit check
//! tokenizes `prefix + body + suffix` as a whole.

use tracing::debug;
use weave_core::{ContextError, EncoderVariant, FieldConfig, Tokenizer, TrimDirection, TrimMethod};

/// A trimmed body that fits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trimmed {
    pub body: String,
    pub method: TrimMethod,
    /// Tokens of `prefix + body + suffix`.
    pub tokens: usize,
}

/// Kept texts when cutting at newlines, shortest first.
///
/// `FromTop` keeps everything before a newline; `FromBottom` keeps everything
/// after one. The newline itself is dropped.
pub fn newline_cuts(text: &str, direction: TrimDirection) -> Vec<&str> {
    let positions = text.match_indices('\n').map(|(i, _)| i);
    let cuts: Vec<&str> = match direction {
        TrimDirection::None => Vec::new(),
        TrimDirection::FromTop => positions.map(|i| &text[..i]).collect(),
        TrimDirection::FromBottom => {
            let mut cuts: Vec<&str> = positions.map(|i| &text[i + 1..]).collect();
            cuts.reverse();
            cuts
        }
    };
    cuts.into_iter().filter(|s| !s.trim().is_empty()).collect()
}

/// Kept texts when cutting at sentence ends, shortest first.
///
/// A sentence ends at `.`, `!` or `?` followed by whitespace or the end of
/// the text. `FromTop` keeps up to and including the terminator; `FromBottom`
/// keeps from the first non-space character after it.
pub fn sentence_cuts(text: &str, direction: TrimDirection) -> Vec<&str> {
    let mut ends = Vec::new();
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        let at_boundary = chars.peek().is_none_or(|(_, next)| next.is_whitespace());
        if at_boundary {
            ends.push(i + c.len_utf8());
        }
    }

    let cuts: Vec<&str> = match direction {
        TrimDirection::None => Vec::new(),
        TrimDirection::FromTop => ends.into_iter().filter(|&e| e < text.len()).map(|e| &text[..e]).collect(),
        TrimDirection::FromBottom => {
            let mut cuts: Vec<&str> = ends
                .into_iter()
                .filter_map(|e| {
                    let rest = &text[e..];
                    let start = e + (rest.len() - rest.trim_start().len());
                    (start < text.len()).then(|| &text[start..])
                })
                .collect();
            cuts.reverse();
            cuts
        }
    };
    cuts.into_iter().filter(|s| !s.trim().is_empty()).collect()
}

/// Trims field bodies against one tokenizer.
pub struct Trimmer<'a> {
    tokenizer: &'a dyn Tokenizer,
    encoder: &'a EncoderVariant,
}

impl<'a> Trimmer<'a> {
    pub fn new(tokenizer: &'a dyn Tokenizer, encoder: &'a EncoderVariant) -> Self {
        Self { tokenizer, encoder }
    }

    /// Tokens of `prefix + body + suffix`.
    pub async fn count_composed(&self, prefix: &str, body: &str, suffix: &str) -> Result<usize, ContextError> {
        let composed = format!("{prefix}{body}{suffix}");
        Ok(self.tokenizer.count(&composed, self.encoder).await?)
    }

    /// Best-fitting partial body within `limit` tokens, or `None` if the
    /// configuration forbids trimming or nothing non-empty fits.
    pub async fn trim(&self, body: &str, config: &FieldConfig, limit: usize) -> Result<Option<Trimmed>, ContextError> {
        if !config.allows_trim() || body.trim().is_empty() || limit == 0 {
            return Ok(None);
        }

        for method in TrimMethod::CASCADE {
            if method > config.max_trim {
                break;
            }
            let found = match method {
                TrimMethod::Newline => {
                    let cuts = newline_cuts(body, config.trim_direction);
                    self.longest_fitting(&cuts, config, limit).await?
                }
                TrimMethod::Sentence => {
                    let cuts = sentence_cuts(body, config.trim_direction);
                    self.longest_fitting(&cuts, config, limit).await?
                }
                TrimMethod::Token => self.token_cut(body, config, limit).await?,
                TrimMethod::NoTrim => None,
            };
            if let Some((body, tokens)) = found {
                debug!(method = ?method, tokens, "Trimmed field body");
                return Ok(Some(Trimmed { body, method, tokens }));
            }
        }
        Ok(None)
    }

    /// Binary search over cuts ordered shortest first. Token counts grow with
    /// kept length, so the last probe that fits is the longest fitting cut.
    async fn longest_fitting(
        &self,
        cuts: &[&str],
        config: &FieldConfig,
        limit: usize,
    ) -> Result<Option<(String, usize)>, ContextError> {
        let (mut lo, mut hi) = (0, cuts.len());
        let mut best = None;
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let tokens = self.count_composed(&config.prefix, cuts[mid], &config.suffix).await?;
            if tokens <= limit {
                best = Some((mid, tokens));
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        Ok(best.map(|(i, tokens)| (cuts[i].to_string(), tokens)))
    }

    /// Keep the largest number of whole tokens that fits.
    async fn token_cut(
        &self,
        body: &str,
        config: &FieldConfig,
        limit: usize,
    ) -> Result<Option<(String, usize)>, ContextError> {
        let ids = self.tokenizer.encode(body, self.encoder).await?;
        if ids.len() < 2 {
            return Ok(None);
        }

        let (mut lo, mut hi) = (1, ids.len());
        let mut best = None;
        while lo < hi {
            let n = lo + (hi - lo) / 2;
            let kept = match config.trim_direction {
                TrimDirection::FromBottom => &ids[ids.len() - n..],
                _ => &ids[..n],
            };
            let text = self.tokenizer.decode(kept, self.encoder).await?;
            let tokens = self.count_composed(&config.prefix, &text, &config.suffix).await?;
            if tokens <= limit {
                best = Some((text, tokens));
                lo = n + 1;
            } else {
                hi = n;
            }
        }
        Ok(best.filter(|(text, _)| !text.trim().is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weave_core::{ContentField, FieldKind};
    use weave_tokenizer::{WordTokenizer, WORDS_VARIANT};

    #[test]
    fn newline_cuts_from_top_are_prefixes() {
        let text = "one\ntwo\nthree";
        assert_eq!(newline_cuts(text, TrimDirection::FromTop), vec!["one", "one\ntwo"]);
    }

    #[test]
    fn newline_cuts_from_bottom_are_suffixes() {
        let text = "one\ntwo\nthree";
        assert_eq!(newline_cuts(text, TrimDirection::FromBottom), vec!["three", "two\nthree"]);
    }

    #[test]
    fn newline_cuts_skip_blank_pieces() {
        assert!(newline_cuts("\n\nabc", TrimDirection::FromTop).is_empty());
    }

    #[test]
    fn sentence_cuts_from_top() {
        let text = "It was dark. Bats flew! Why? e.g.no";
        assert_eq!(
            sentence_cuts(text, TrimDirection::FromTop),
            vec!["It was dark.", "It was dark. Bats flew!", "It was dark. Bats flew! Why?"]
        );
    }

    #[test]
    fn sentence_cuts_from_bottom() {
        let text = "It was dark.  Bats flew! Why?";
        assert_eq!(sentence_cuts(text, TrimDirection::FromBottom), vec!["Why?", "Bats flew! Why?"]);
    }

    #[test]
    fn single_sentence_has_no_cut() {
        assert!(sentence_cuts("Caves are dark and damp.", TrimDirection::FromTop).is_empty());
    }

    fn config(direction: TrimDirection, max_trim: TrimMethod) -> FieldConfig {
        ContentField::new("f", FieldKind::Lore, "")
            .with_trim(direction, max_trim)
            .with_affixes("", "")
            .config
    }

    #[tokio::test]
    async fn prefers_newline_over_sentence() {
        let tok = WordTokenizer::new();
        let variant = EncoderVariant::new(WORDS_VARIANT);
        let trimmer = Trimmer::new(&tok, &variant);
        // "A. B." is 4 tokens; the first sentence cut after it would be 9.
        let body = "A. B.\nC. D. E.";
        let out = trimmer
            .trim(body, &config(TrimDirection::FromTop, TrimMethod::Token), 6)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(out.method, TrimMethod::Newline);
        assert_eq!(out.body, "A. B.");
        assert_eq!(out.tokens, 4);
    }

    #[tokio::test]
    async fn falls_through_to_sentence_then_token() {
        let tok = WordTokenizer::new();
        let variant = EncoderVariant::new(WORDS_VARIANT);
        let trimmer = Trimmer::new(&tok, &variant);

        let out = trimmer
            .trim("It was dark. Bats flew.", &config(TrimDirection::FromTop, TrimMethod::Token), 4)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(out.method, TrimMethod::Sentence);
        assert_eq!(out.body, "It was dark.");

        let out = trimmer
            .trim("Caves are dark and damp.", &config(TrimDirection::FromTop, TrimMethod::Token), 2)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(out.method, TrimMethod::Token);
        assert_eq!(out.body, "Caves are");
    }

    #[tokio::test]
    async fn from_bottom_token_cut_keeps_the_end() {
        let tok = WordTokenizer::new();
        let variant = EncoderVariant::new(WORDS_VARIANT);
        let trimmer = Trimmer::new(&tok, &variant);
        let out = trimmer
            .trim("Caves are dark and damp.", &config(TrimDirection::FromBottom, TrimMethod::Token), 2)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(out.body, " damp.");
    }

    #[tokio::test]
    async fn max_trim_stops_the_cascade() {
        let tok = WordTokenizer::new();
        let variant = EncoderVariant::new(WORDS_VARIANT);
        let trimmer = Trimmer::new(&tok, &variant);
        let out = trimmer
            .trim("Caves are dark and damp.", &config(TrimDirection::FromTop, TrimMethod::Sentence), 3)
            .await
            .unwrap();
        assert!(out.is_none());
    }

    #[tokio::test]
    async fn affixes_are_counted() {
        let tok = WordTokenizer::new();
        let variant = EncoderVariant::new(WORDS_VARIANT);
        let trimmer = Trimmer::new(&tok, &variant);
        let mut cfg = config(TrimDirection::FromTop, TrimMethod::Token);
        cfg.suffix = "\n".into();
        let out = trimmer.trim("Caves are dark.", &cfg, 2).await.unwrap().unwrap();
        assert_eq!(out.body, "Caves");
        assert_eq!(out.tokens, 2);

        assert!(trimmer.trim("Caves are dark.", &cfg, 1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn no_trim_direction_never_trims() {
        let tok = WordTokenizer::new();
        let variant = EncoderVariant::new(WORDS_VARIANT);
        let trimmer = Trimmer::new(&tok, &variant);
        let out = trimmer
            .trim("a\nb\nc", &config(TrimDirection::None, TrimMethod::Token), 2)
            .await
            .unwrap();
        assert!(out.is_none());
    }
}
