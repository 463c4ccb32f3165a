//! Activation resolver — decides whether a field is eligible for a pass.
//!
//! Activation is split in two:
//! - the static part (enable flag, time window) depends only on the field and
//!   the turn, and is resolved for every field before allocation starts;
//! - key triggering depends on the text committed *before* the field is
//!   reached, and is resolved lazily when the allocator gets to it.
//!
//! Matching is therefore scoped to earlier commits, which rules out cycles
//! between entries that would trigger each other.

use regex::{Regex, RegexBuilder};
use weave_core::{
    ActivationOutcome, ActivationRule, ContentField, ContextError, ContextReport, FieldKind, KeyTrigger,
};

/// Text that key-triggered fields are matched against.
#[derive(Debug, Clone, Default)]
pub struct KeyContext {
    all: String,
    story: String,
}

impl KeyContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a committed fragment.
    pub fn push(&mut self, kind: FieldKind, text: &str) {
        Self::append(&mut self.all, text);
        if kind == FieldKind::Story {
            Self::append(&mut self.story, text);
        }
    }

    /// Everything committed so far.
    pub fn all(&self) -> &str {
        &self.all
    }

    /// Only story text committed so far.
    pub fn story(&self) -> &str {
        &self.story
    }

    // Fragments are separated so a key cannot match across a fragment seam.
    fn append(buf: &mut String, text: &str) {
        if !buf.is_empty() {
            buf.push('\n');
        }
        buf.push_str(text);
    }
}

/// Outcome of full activation for one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Activation {
    pub outcome: ActivationOutcome,
    pub triggering_key: Option<String>,
}

impl Activation {
    fn included(triggering_key: Option<String>) -> Self {
        Self {
            outcome: ActivationOutcome::Included,
            triggering_key,
        }
    }

    fn excluded(outcome: ActivationOutcome) -> Self {
        Self {
            outcome,
            triggering_key: None,
        }
    }
}

/// Compiled keys of a key-triggered field.
#[derive(Debug, Clone)]
pub struct KeyMatcher {
    patterns: Vec<(String, Regex)>,
    search_range: Option<usize>,
    cascading: bool,
}

impl KeyMatcher {
    pub fn compile(identifier: &str, trigger: &KeyTrigger) -> Result<Self, ContextError> {
        let invalid = |key: &str, reason: String| ContextError::InvalidKey {
            identifier: identifier.to_string(),
            key: key.to_string(),
            reason,
        };

        let mut patterns = Vec::with_capacity(trigger.keys.len());
        for key in &trigger.keys {
            if key.is_empty() {
                return Err(invalid(key, "empty key".into()));
            }
            let regex = match parse_regex_key(key) {
                Some((pattern, flags)) => RegexBuilder::new(pattern)
                    .case_insensitive(flags.contains('i'))
                    .build(),
                None => {
                    let escaped = regex::escape(key);
                    let pattern = if trigger.whole_word {
                        format!(r"\b{escaped}\b")
                    } else {
                        escaped
                    };
                    RegexBuilder::new(&pattern)
                        .case_insensitive(trigger.case_insensitive)
                        .build()
                }
            }
            .map_err(|e| invalid(key, e.to_string()))?;
            patterns.push((key.clone(), regex));
        }

        Ok(Self {
            patterns,
            search_range: trigger.search_range,
            cascading: trigger.cascading,
        })
    }

    /// First key, in declaration order, found in the context.
    pub fn find(&self, context: &KeyContext) -> Option<&str> {
        let text = if self.cascading { context.all() } else { context.story() };
        let text = match self.search_range {
            Some(range) => tail_chars(text, range),
            None => text,
        };
        self.patterns
            .iter()
            .find(|(_, regex)| regex.is_match(text))
            .map(|(key, _)| key.as_str())
    }
}

/// `/pattern/flags` → `(pattern, flags)`.
fn parse_regex_key(key: &str) -> Option<(&str, &str)> {
    let rest = key.strip_prefix('/')?;
    let end = rest.rfind('/')?;
    if end == 0 {
        return None;
    }
    Some((&rest[..end], &rest[end + 1..]))
}

/// The last `n` characters of `text`.
fn tail_chars(text: &str, n: usize) -> &str {
    if n == 0 {
        return "";
    }
    match text.char_indices().rev().nth(n - 1) {
        Some((offset, _)) => &text[offset..],
        None => text,
    }
}

/// Resolve the parts of activation that do not depend on assembled text.
///
/// Returns the exclusion reason, or `None` when the field may proceed.
pub fn resolve_static(field: &ContentField, turn: u32) -> Option<ActivationOutcome> {
    if !field.enabled {
        return Some(ActivationOutcome::Disabled);
    }
    match &field.activation {
        ActivationRule::TimeWindowed { start_turn, end_turn } if turn < *start_turn || turn > *end_turn => {
            Some(ActivationOutcome::EphemeralInactive)
        }
        _ => None,
    }
}

/// Full activation of a field against the text assembled so far.
///
/// `matcher` must be the compiled keys of a key-triggered field.
pub fn resolve(field: &ContentField, matcher: Option<&KeyMatcher>, context: &KeyContext, turn: u32) -> Activation {
    if let Some(outcome) = resolve_static(field, turn) {
        return Activation::excluded(outcome);
    }
    match (&field.activation, matcher) {
        (ActivationRule::KeyTriggered(_), Some(matcher)) => match matcher.find(context) {
            Some(key) => Activation::included(Some(key.to_string())),
            None => Activation::excluded(ActivationOutcome::NoKeyTriggered),
        },
        (ActivationRule::KeyTriggered(_), None) => Activation::excluded(ActivationOutcome::NoKeyTriggered),
        _ => Activation::included(None),
    }
}

/// A category is active only if at least one child made it into its
/// sub-context.
pub fn resolve_category(sub_context: &ContextReport) -> ActivationOutcome {
    if sub_context.context_statuses.iter().any(|s| s.included) {
        ActivationOutcome::Included
    } else {
        ActivationOutcome::NoActiveEntries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(story: &str, lore: &str) -> KeyContext {
        let mut ctx = KeyContext::new();
        ctx.push(FieldKind::Story, story);
        if !lore.is_empty() {
            ctx.push(FieldKind::Lore, lore);
        }
        ctx
    }

    fn matcher(trigger: KeyTrigger) -> KeyMatcher {
        KeyMatcher::compile("entry", &trigger).unwrap()
    }

    #[test]
    fn substring_case_insensitive_by_default() {
        let m = matcher(KeyTrigger::new(["CAVE"]));
        assert_eq!(m.find(&context("The hero walked into the cave.", "")), Some("CAVE"));
    }

    #[test]
    fn first_matching_key_in_declaration_order_wins() {
        let m = matcher(KeyTrigger::new(["dragon", "hero", "cave"]));
        assert_eq!(m.find(&context("The hero walked into the cave.", "")), Some("hero"));
    }

    #[test]
    fn case_sensitive_when_configured() {
        let mut trigger = KeyTrigger::new(["Cave"]);
        trigger.case_insensitive = false;
        assert_eq!(matcher(trigger).find(&context("into the cave", "")), None);
    }

    #[test]
    fn whole_word_rejects_substrings() {
        let mut trigger = KeyTrigger::new(["cave"]);
        trigger.whole_word = true;
        let m = matcher(trigger);
        assert_eq!(m.find(&context("caverns everywhere", "")), None);
        assert_eq!(m.find(&context("a cave, deep", "")), Some("cave"));
    }

    #[test]
    fn regex_keys_with_flags() {
        let m = matcher(KeyTrigger::new(["/drag(on|oon)s?/i"]));
        assert!(m.find(&context("Two DRAGONS flew", "")).is_some());
        let m = matcher(KeyTrigger::new(["/Dragon/"]));
        assert!(m.find(&context("a dragon", "")).is_none());
    }

    #[test]
    fn invalid_regex_is_a_configuration_error() {
        let err = KeyMatcher::compile("entry", &KeyTrigger::new(["/([/"])).unwrap_err();
        assert!(matches!(err, ContextError::InvalidKey { .. }));
        let err = KeyMatcher::compile("entry", &KeyTrigger::new([""])).unwrap_err();
        assert!(matches!(err, ContextError::InvalidKey { .. }));
    }

    #[test]
    fn non_cascading_ignores_other_entries() {
        let mut trigger = KeyTrigger::new(["bats"]);
        trigger.cascading = false;
        let m = matcher(trigger);
        assert_eq!(m.find(&context("A dark cave.", "Caves have bats.")), None);

        let m = matcher(KeyTrigger::new(["bats"]));
        assert_eq!(m.find(&context("A dark cave.", "Caves have bats.")), Some("bats"));
    }

    #[test]
    fn search_range_limits_to_recent_text() {
        let mut trigger = KeyTrigger::new(["castle"]);
        trigger.search_range = Some(10);
        let m = matcher(trigger);
        assert_eq!(m.find(&context("The castle was far behind them now.", "")), None);
        assert!(m.find(&context("They reached the castle", "")).is_some());
    }

    #[test]
    fn no_match_across_fragment_seam() {
        let mut ctx = KeyContext::new();
        ctx.push(FieldKind::Story, "the ca");
        ctx.push(FieldKind::Lore, "ve");
        assert_eq!(matcher(KeyTrigger::new(["cave"])).find(&ctx), None);
    }

    #[test]
    fn static_resolution() {
        let disabled = ContentField::memory("m").disabled();
        assert_eq!(resolve_static(&disabled, 0), Some(ActivationOutcome::Disabled));

        let eph = ContentField::ephemeral("e", "text", 3, 5);
        assert_eq!(resolve_static(&eph, 2), Some(ActivationOutcome::EphemeralInactive));
        assert_eq!(resolve_static(&eph, 3), None);
        assert_eq!(resolve_static(&eph, 5), None);
        assert_eq!(resolve_static(&eph, 6), Some(ActivationOutcome::EphemeralInactive));
    }

    #[test]
    fn always_active_fields_only_respect_disable_flag() {
        let story = ContentField::story("text");
        let act = resolve(&story, None, &KeyContext::new(), 0);
        assert_eq!(act.outcome, ActivationOutcome::Included);
        assert_eq!(act.triggering_key, None);
    }

    #[test]
    fn key_triggered_field_reports_trigger() {
        let lore = ContentField::lore("cave", "Caves are dark.", ["cave"]);
        let trigger = match &lore.activation {
            ActivationRule::KeyTriggered(t) => t.clone(),
            _ => unreachable!(),
        };
        let m = KeyMatcher::compile(&lore.identifier, &trigger).unwrap();

        let act = resolve(&lore, Some(&m), &context("Into the cave.", ""), 0);
        assert_eq!(act.outcome, ActivationOutcome::Included);
        assert_eq!(act.triggering_key.as_deref(), Some("cave"));

        let act = resolve(&lore, Some(&m), &context("An open field.", ""), 0);
        assert_eq!(act.outcome, ActivationOutcome::NoKeyTriggered);
    }

    #[test]
    fn tail_chars_respects_char_boundaries() {
        assert_eq!(tail_chars("héllo", 4), "éllo");
        assert_eq!(tail_chars("hi", 10), "hi");
        assert_eq!(tail_chars("hi", 0), "");
    }
}
