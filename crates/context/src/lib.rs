//! # Weave Context
//!
//! The context assembly engine. Given a [`ContextRequest`](weave_core::ContextRequest)
//! and a tokenizer, [`ContextBuilder::build`] selects, trims and places
//! content fields within a token ceiling and returns a full
//! [`ContextReport`](weave_core::ContextReport).
//!
//! ## Pipeline
//!
//! ```text
//! request ─▶ activation ─▶ allocator ─┬─▶ trim
//!                              ▲       └─▶ placement ─▶ report
//!                              └── categories recurse as sub-contexts
//! ```

pub mod activation;
pub mod allocator;
pub mod budget;
pub mod builder;
pub mod placement;
pub mod report;
pub mod trim;

pub use activation::{Activation, KeyContext, KeyMatcher};
pub use allocator::{validate_fields, Allocation};
pub use budget::{ContextBudget, ReservationLedger};
pub use builder::ContextBuilder;
pub use placement::{place, Fragment};
pub use trim::{Trimmed, Trimmer};
