//! Public entry point of the engine.

use std::sync::Arc;

use tracing::{info, warn};
use weave_core::{ContextError, ContextReport, ContextRequest, Tokenizer};

use crate::activation::KeyContext;
use crate::allocator::{self, Allocator};
use crate::budget::ContextBudget;
use crate::report;

/// Builds context reports against one tokenizer service.
///
/// A builder holds no per-pass state; concurrent `build` calls are
/// independent. A report depends only on the request, as long as the
/// tokenizer's encoding does not change with use.
#[derive(Clone)]
pub struct ContextBuilder {
    tokenizer: Arc<dyn Tokenizer>,
}

impl ContextBuilder {
    pub fn new(tokenizer: Arc<dyn Tokenizer>) -> Self {
        Self { tokenizer }
    }

    pub fn tokenizer(&self) -> &Arc<dyn Tokenizer> {
        &self.tokenizer
    }

    /// Run one assembly pass.
    ///
    /// Configuration errors (invalid budget, duplicate identifiers, bad keys
    /// or limits, unsupported encoder) are reported before any tokenization.
    /// Tokenizer failures abort the pass; no partial report is returned.
    pub async fn build(&self, request: &ContextRequest) -> Result<ContextReport, ContextError> {
        let budget = ContextBudget::from_request(request.max_tokens)?;
        allocator::validate_fields(&request.fields)?;
        self.tokenizer.ensure_supported(&request.encoder)?;

        let allocator = Allocator::new(self.tokenizer.as_ref(), &request.encoder, request.turn);
        let allocation = allocator
            .run(&request.fields, budget.max_tokens(), KeyContext::new())
            .await?;
        let mut report = report::assemble(
            allocation,
            self.tokenizer.as_ref(),
            &request.encoder,
            request.preamble.clone(),
        )
        .await?;
        report.biases = report::active_biases(&request.biases, &report);

        let included = report.included_identifiers().len();
        info!(
            included,
            excluded = report.context_statuses.len() - included,
            reserved = report.reserved_tokens(),
            tokens = report.tokens.len(),
            max_tokens = report.max_tokens,
            encoder = %report.encoder,
            "Context assembled"
        );
        if report.tokens.len() > report.max_tokens {
            // Tokenizers that merge across fragment seams can exceed the sum
            // of per-fragment counts.
            warn!(
                tokens = report.tokens.len(),
                max_tokens = report.max_tokens,
                "Assembled output tokenizes above the ceiling"
            );
        }
        Ok(report)
    }
}
