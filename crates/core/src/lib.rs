//! # Weave Core
//!
//! Domain types, traits, and error definitions for the Weave context engine.
//! This crate holds no assembly logic — it defines the model that the
//! engine, tokenizers, configuration and CLI all build against.
//!
//! ## Design Philosophy
//!
//! External services are traits here (`Tokenizer`); implementations live in
//! their own crates. Every input of a pass is an explicit value
//! (`ContextRequest`), and every output is a plain serializable report
//! (`ContextReport`).

pub mod bias;
pub mod error;
pub mod field;
pub mod report;
pub mod request;
pub mod tokenizer;

// Re-export key types at crate root for ergonomics
pub use bias::{ActiveBias, BiasGroup};
pub use error::{ContextError, Error, Result, TokenizerError};
pub use field::{
    ActivationRule, ContentField, FieldConfig, FieldKind, Insertion, InsertionUnit, KeyTrigger,
    TokenLimit, TrimDirection, TrimMethod, AUTHORS_NOTE_ID, MEMORY_ID, STORY_ID,
};
pub use report::{
    ActivationOutcome, ContextReport, ContextStageReport, ContextStatus, Segment, StatusReason,
};
pub use request::ContextRequest;
pub use tokenizer::{EncoderVariant, Tokenizer};
