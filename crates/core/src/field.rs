//! Content fields — the candidate units of text for one context pass.
//!
//! A field carries its own budgeting configuration (`FieldConfig`) and its own
//! activation rule. Fields may nest: a field with `sub_fields` is a category
//! whose children are budgeted as an independent sub-context.

use serde::{Deserialize, Serialize};

/// Fixed identifier of the story singleton.
pub const STORY_ID: &str = "story";
/// Fixed identifier of the memory singleton.
pub const MEMORY_ID: &str = "memory";
/// Fixed identifier of the author's note singleton.
pub const AUTHORS_NOTE_ID: &str = "authors_note";

/// What a field is. Drives default configuration only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Story,
    Memory,
    AuthorsNote,
    Lore,
    Ephemeral,
}

impl FieldKind {
    /// Human-readable label used in stage descriptions.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Story => "Story",
            Self::Memory => "Memory",
            Self::AuthorsNote => "Author's Note",
            Self::Lore => "Lore",
            Self::Ephemeral => "Ephemeral",
        }
    }
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Which part of a field survives trimming.
///
/// `FromTop` keeps text read from the top of the field, so the committed text
/// is a prefix. `FromBottom` keeps the end, so the committed text is a suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrimDirection {
    /// Never trimmed: the field is used whole or not at all.
    None,
    FromTop,
    FromBottom,
}

/// Trim granularity, ordered from coarsest to finest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrimMethod {
    NoTrim,
    Newline,
    Sentence,
    Token,
}

impl TrimMethod {
    /// The trimming granularities in the order they are attempted.
    pub const CASCADE: [TrimMethod; 3] =
        [TrimMethod::Newline, TrimMethod::Sentence, TrimMethod::Token];
}

/// A token ceiling, either absolute or a fraction of the pass' `max_tokens`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TokenLimit {
    Absolute(usize),
    Fraction(f64),
}

impl TokenLimit {
    /// Resolve against the ceiling of the pass.
    pub fn resolve(&self, max_tokens: usize) -> usize {
        match *self {
            Self::Absolute(n) => n,
            Self::Fraction(f) => ((max_tokens as f64) * f).floor().max(0.0) as usize,
        }
    }

    /// Fractions must lie in `(0, 1]`.
    pub fn is_valid(&self) -> bool {
        match *self {
            Self::Absolute(_) => true,
            Self::Fraction(f) => f > 0.0 && f <= 1.0,
        }
    }
}

/// Boundary unit used to count insertion positions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertionUnit {
    #[default]
    Newline,
    Sentence,
}

/// Where a committed fragment lands in the final document.
///
/// Fragments are placed in descending `order`. `position >= 0` counts `unit`
/// boundaries from the start of the document placed so far; negative values
/// count from the end, `-1` being the very end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Insertion {
    pub order: i32,
    pub position: i32,
    #[serde(default)]
    pub unit: InsertionUnit,
}

impl Insertion {
    pub fn new(order: i32, position: i32) -> Self {
        Self {
            order,
            position,
            unit: InsertionUnit::Newline,
        }
    }
}

/// Budgeting configuration of a single field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldConfig {
    /// Higher priorities are selected first.
    pub budget_priority: i32,

    /// Tokens held back for this field before allocation starts.
    #[serde(default)]
    pub reserved_tokens: usize,

    pub trim_direction: TrimDirection,

    /// Finest granularity trimming may reach.
    pub max_trim: TrimMethod,

    pub insertion: Insertion,

    /// Text placed before the body. Counted, never trimmed.
    #[serde(default)]
    pub prefix: String,

    /// Text placed after the body. Counted, never trimmed.
    #[serde(default)]
    pub suffix: String,

    /// Upper bound on what this field may consume. For a category this is
    /// the ceiling of its sub-context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_budget: Option<TokenLimit>,
}

impl FieldConfig {
    /// Default configuration for a field kind.
    pub fn for_kind(kind: FieldKind) -> Self {
        use TrimDirection::{FromBottom, FromTop};
        let (priority, direction, max_trim, insertion, suffix) = match kind {
            FieldKind::Memory => (800, FromTop, TrimMethod::Sentence, Insertion::new(800, 0), "\n"),
            FieldKind::AuthorsNote => (700, FromTop, TrimMethod::Sentence, Insertion::new(-400, -4), "\n"),
            FieldKind::Story => (600, FromBottom, TrimMethod::Sentence, Insertion::new(0, -1), ""),
            FieldKind::Lore => (400, FromTop, TrimMethod::Sentence, Insertion::new(400, -1), "\n"),
            FieldKind::Ephemeral => (300, FromTop, TrimMethod::Newline, Insertion::new(300, -1), "\n"),
        };
        Self {
            budget_priority: priority,
            reserved_tokens: 0,
            trim_direction: direction,
            max_trim,
            insertion,
            prefix: String::new(),
            suffix: suffix.to_string(),
            token_budget: None,
        }
    }

    /// Whether any trimming is permitted at all.
    pub fn allows_trim(&self) -> bool {
        self.trim_direction != TrimDirection::None && self.max_trim != TrimMethod::NoTrim
    }
}

/// Key-triggered activation settings.
///
/// Keys are OR-ed: the first key, in declaration order, that matches the
/// searched text activates the field. A key written as `/pattern/flags` is a
/// regular expression; the only recognised flag is `i`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyTrigger {
    pub keys: Vec<String>,

    #[serde(default = "default_true")]
    pub case_insensitive: bool,

    /// Match only on word boundaries.
    #[serde(default)]
    pub whole_word: bool,

    /// Search only the last N characters of the assembled text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_range: Option<usize>,

    /// When false, only story text is searched, never other inserted entries.
    #[serde(default = "default_true")]
    pub cascading: bool,
}

fn default_true() -> bool {
    true
}

impl KeyTrigger {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
            case_insensitive: true,
            whole_word: false,
            search_range: None,
            cascading: true,
        }
    }
}

/// When a field is eligible for inclusion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActivationRule {
    #[default]
    AlwaysActive,
    KeyTriggered(KeyTrigger),
    /// Active for turns `start_turn..=end_turn`.
    TimeWindowed { start_turn: u32, end_turn: u32 },
}

/// One candidate unit of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentField {
    pub identifier: String,
    pub kind: FieldKind,
    #[serde(default)]
    pub text: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub config: FieldConfig,
    #[serde(default)]
    pub activation: ActivationRule,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_fields: Vec<ContentField>,
}

impl ContentField {
    /// Create an always-active field with the default config for its kind.
    pub fn new(identifier: impl Into<String>, kind: FieldKind, text: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            kind,
            text: text.into(),
            enabled: true,
            config: FieldConfig::for_kind(kind),
            activation: ActivationRule::AlwaysActive,
            sub_fields: Vec::new(),
        }
    }

    pub fn story(text: impl Into<String>) -> Self {
        Self::new(STORY_ID, FieldKind::Story, text)
    }

    pub fn memory(text: impl Into<String>) -> Self {
        Self::new(MEMORY_ID, FieldKind::Memory, text)
    }

    pub fn authors_note(text: impl Into<String>) -> Self {
        Self::new(AUTHORS_NOTE_ID, FieldKind::AuthorsNote, text)
    }

    /// A key-triggered lorebook entry.
    pub fn lore<I, S>(identifier: impl Into<String>, text: impl Into<String>, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(identifier, FieldKind::Lore, text)
            .with_activation(ActivationRule::KeyTriggered(KeyTrigger::new(keys)))
    }

    /// An ephemeral entry active for turns `start_turn..=end_turn`.
    pub fn ephemeral(identifier: impl Into<String>, text: impl Into<String>, start_turn: u32, end_turn: u32) -> Self {
        Self::new(identifier, FieldKind::Ephemeral, text)
            .with_activation(ActivationRule::TimeWindowed { start_turn, end_turn })
    }

    /// A lorebook category. Its children form a sub-context.
    pub fn category(identifier: impl Into<String>, text: impl Into<String>, children: Vec<ContentField>) -> Self {
        Self::new(identifier, FieldKind::Lore, text).with_sub_fields(children)
    }

    pub fn with_config(mut self, config: FieldConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_activation(mut self, activation: ActivationRule) -> Self {
        self.activation = activation;
        self
    }

    pub fn with_sub_fields(mut self, sub_fields: Vec<ContentField>) -> Self {
        self.sub_fields = sub_fields;
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.config.budget_priority = priority;
        self
    }

    pub fn with_reserved_tokens(mut self, reserved: usize) -> Self {
        self.config.reserved_tokens = reserved;
        self
    }

    pub fn with_trim(mut self, direction: TrimDirection, max_trim: TrimMethod) -> Self {
        self.config.trim_direction = direction;
        self.config.max_trim = max_trim;
        self
    }

    pub fn with_insertion(mut self, insertion: Insertion) -> Self {
        self.config.insertion = insertion;
        self
    }

    pub fn with_affixes(mut self, prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        self.config.prefix = prefix.into();
        self.config.suffix = suffix.into();
        self
    }

    pub fn with_token_budget(mut self, limit: TokenLimit) -> Self {
        self.config.token_budget = Some(limit);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Whether this field is a category whose children form a sub-context.
    pub fn is_category(&self) -> bool {
        !self.sub_fields.is_empty()
    }

    /// `Kind 'identifier'`, used in stage descriptions and logs.
    pub fn describe(&self) -> String {
        format!("{} '{}'", self.kind.label(), self.identifier)
    }
}
