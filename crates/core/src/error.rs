//! Error types for the Weave domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; `Error` rolls them up.
//!
//! Note that a field being left out of a context is *not* an error. Exclusion
//! is normal and is recorded in the report's status list.

use thiserror::Error;

/// The top-level error type for Weave operations that span crates, such as
/// the CLI's build and tokenize commands.
#[derive(Debug, Error)]
pub enum Error {
    // --- Tokenizer service ---
    #[error("Tokenizer error: {0}")]
    Tokenizer(#[from] TokenizerError),

    // --- Context assembly ---
    #[error("Context error: {0}")]
    Context(#[from] ContextError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures of the tokenizer service. Any of these aborts the pass.
#[derive(Debug, Clone, Error)]
pub enum TokenizerError {
    #[error("Encoder variant not supported by {tokenizer}: {variant}")]
    UnsupportedVariant { tokenizer: String, variant: String },

    #[error("Tokenizer unavailable: {0}")]
    Unavailable(String),

    #[error("Encoding failed: {0}")]
    Encode(String),

    #[error("Decoding failed: {0}")]
    Decode(String),
}

/// Failures of a context assembly pass.
///
/// Configuration failures are rejected before any work begins; structural
/// violations mean the engine or its caller broke an invariant; tokenizer
/// failures are propagated unchanged.
#[derive(Debug, Clone, Error)]
pub enum ContextError {
    #[error("Invalid token budget: {0} (must be > 0)")]
    InvalidBudget(i64),

    #[error("Duplicate field identifier: {0}")]
    DuplicateIdentifier(String),

    #[error("Invalid key {key:?} on field {identifier}: {reason}")]
    InvalidKey {
        identifier: String,
        key: String,
        reason: String,
    },

    #[error("Invalid token limit on field {identifier}: {reason}")]
    InvalidTokenLimit { identifier: String, reason: String },

    #[error("Output does not match structured output ({output_len} vs {structured_len} bytes)")]
    OutputMismatch {
        output_len: usize,
        structured_len: usize,
    },

    #[error("Budget invariant violated: {0}")]
    BudgetInvariant(String),

    #[error(transparent)]
    Tokenizer(#[from] TokenizerError),
}

impl ContextError {
    /// Whether this error indicates an engine/caller defect rather than bad
    /// input or an unavailable service.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::DuplicateIdentifier(_) | Self::OutputMismatch { .. } | Self::BudgetInvariant(_)
        )
    }
}
