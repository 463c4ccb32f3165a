//! Budget allocator / stage scheduler — the greedy core of a pass.
//!
//! # Algorithm
//!
//! 1. Resolve static activation (enable flag, time window) for every field;
//!    exclusions are recorded immediately with zero tokens and no stage.
//! 2. Sort the rest by `budget_priority` descending. Ties keep declaration
//!    order (the sort is stable), so of two equal-priority fields the later
//!    declared one is the first to lose out when the budget runs dry.
//! 3. Grant reservations to non-key-triggered leaf fields, in that order.
//! 4. Walk candidates in order. Key-triggered fields are matched against
//!    what has been committed so far. Categories build their sub-context
//!    within what is left after their own header, prefix and suffix, and are
//!    never trimmed. Every other candidate is committed whole if it fits,
//!    trimmed if it does not, and excluded as out of budget if no trim fits.
//!    The walk never stops early.
//! 5. Every commit charges the budget and appends a stage snapshot.
//! 6. Committed fragments are placed into document order.

use std::collections::HashSet;

use futures::future::{BoxFuture, FutureExt};
use tracing::debug;
use weave_core::{
    ActivationOutcome, ActivationRule, ContentField, ContextError, ContextReport, ContextStageReport,
    ContextStatus, EncoderVariant, Segment, StatusReason, Tokenizer, TrimMethod,
};

use crate::activation::{self, KeyContext, KeyMatcher};
use crate::budget::{ContextBudget, ReservationLedger};
use crate::placement::{self, Fragment};
use crate::report;
use crate::trim::Trimmer;

/// Everything one level of allocation produced.
#[derive(Debug, Clone)]
pub struct Allocation {
    pub structured: Vec<Segment>,
    pub statuses: Vec<ContextStatus>,
    pub stages: Vec<ContextStageReport>,
    pub max_tokens: usize,
}

/// Check a field set before any work begins: unique identifiers per level,
/// valid token limits and compilable keys, recursively.
pub fn validate_fields(fields: &[ContentField]) -> Result<(), ContextError> {
    let mut seen = HashSet::new();
    for field in fields {
        if !seen.insert(field.identifier.as_str()) {
            return Err(ContextError::DuplicateIdentifier(field.identifier.clone()));
        }
        if let Some(limit) = &field.config.token_budget {
            if !limit.is_valid() {
                return Err(ContextError::InvalidTokenLimit {
                    identifier: field.identifier.clone(),
                    reason: format!("{limit:?} is not a fraction in (0, 1]"),
                });
            }
        }
        compile_matcher(field)?;
        validate_fields(&field.sub_fields)?;
    }
    Ok(())
}

fn compile_matcher(field: &ContentField) -> Result<Option<KeyMatcher>, ContextError> {
    match &field.activation {
        ActivationRule::KeyTriggered(trigger) => KeyMatcher::compile(&field.identifier, trigger).map(Some),
        _ => Ok(None),
    }
}

/// Category header followed by its sub-context output.
fn category_body(header: &str, sub_output: &str) -> String {
    if header.is_empty() || header.ends_with('\n') {
        format!("{header}{sub_output}")
    } else {
        format!("{header}\n{sub_output}")
    }
}

/// Mark everything a sub-context committed as out of budget, for a category
/// that could not be committed after all. The report stays self-consistent:
/// no output, no stages, no included children.
fn withdraw(report: &mut ContextReport) {
    report.output.clear();
    report.structured_output.clear();
    report.stage_reports.clear();
    report.tokens.clear();
    report.biases.clear();
    for status in &mut report.context_statuses {
        if let Some(sub) = status.sub_context.as_deref_mut() {
            withdraw(sub);
        }
        if status.included {
            status.included = false;
            status.reason = StatusReason::OutOfBudget;
            status.actual_reserved_tokens = 0;
            status.trim_method = None;
        }
    }
}

/// What a candidate turned into after fitting.
struct Fitted {
    text: String,
    tokens: usize,
    method: TrimMethod,
}

/// Runs allocation levels against one tokenizer, encoder and turn.
pub struct Allocator<'a> {
    tokenizer: &'a dyn Tokenizer,
    encoder: &'a EncoderVariant,
    turn: u32,
}

impl<'a> Allocator<'a> {
    pub fn new(tokenizer: &'a dyn Tokenizer, encoder: &'a EncoderVariant, turn: u32) -> Self {
        Self {
            tokenizer,
            encoder,
            turn,
        }
    }

    /// Allocate `max_tokens` among `fields`.
    ///
    /// `outer` is the text committed by enclosing levels; key-triggered fields
    /// of this level see it in addition to this level's own commits.
    pub fn run(
        &'a self,
        fields: &'a [ContentField],
        max_tokens: usize,
        outer: KeyContext,
    ) -> BoxFuture<'a, Result<Allocation, ContextError>> {
        async move { self.allocate(fields, max_tokens, outer).await }.boxed()
    }

    async fn allocate(
        &'a self,
        fields: &'a [ContentField],
        max_tokens: usize,
        outer: KeyContext,
    ) -> Result<Allocation, ContextError> {
        let trimmer = Trimmer::new(self.tokenizer, self.encoder);
        let mut budget = ContextBudget::new(max_tokens);
        let mut ledger = ReservationLedger::new();
        let mut key_context = outer;
        let mut statuses = Vec::with_capacity(fields.len());
        let mut stages = Vec::new();
        let mut committed: Vec<Fragment> = Vec::new();

        // ── 1. Static activation ─────────────────────────────────────────
        let mut eligible = Vec::with_capacity(fields.len());
        for (index, field) in fields.iter().enumerate() {
            match activation::resolve_static(field, self.turn) {
                Some(outcome) => {
                    debug!(identifier = %field.identifier, ?outcome, "Field inactive");
                    statuses.push(ContextStatus::excluded(
                        &field.identifier,
                        field.kind,
                        StatusReason::Activation(outcome),
                    ));
                }
                None => eligible.push(index),
            }
        }

        // ── 2. Priority order (stable: ties keep declaration order) ──────
        eligible.sort_by(|a, b| {
            fields[*b]
                .config
                .budget_priority
                .cmp(&fields[*a].config.budget_priority)
        });

        // ── 3. Reservations ──────────────────────────────────────────────
        let mut measured: Vec<Option<usize>> = vec![None; fields.len()];
        for &index in &eligible {
            let field = &fields[index];
            let reserved = field.config.reserved_tokens;
            if reserved == 0 || field.is_category() || matches!(field.activation, ActivationRule::KeyTriggered(_)) {
                continue;
            }
            let tokens = trimmer
                .count_composed(&field.config.prefix, &field.text, &field.config.suffix)
                .await?;
            measured[index] = Some(tokens);
            if ledger.grant(&field.identifier, reserved.min(tokens), max_tokens) {
                debug!(identifier = %field.identifier, tokens = reserved.min(tokens), "Reserved tokens");
            }
        }

        // ── 4. Greedy walk ───────────────────────────────────────────────
        for &index in &eligible {
            let field = &fields[index];
            let config = &field.config;

            let matcher = compile_matcher(field)?;
            let activation = activation::resolve(field, matcher.as_ref(), &key_context, self.turn);
            if activation.outcome != ActivationOutcome::Included {
                debug!(identifier = %field.identifier, outcome = ?activation.outcome, "Field not triggered");
                ledger.release(&field.identifier);
                statuses.push(ContextStatus::excluded(
                    &field.identifier,
                    field.kind,
                    StatusReason::Activation(activation.outcome),
                ));
                continue;
            }

            let available = budget
                .remaining_tokens()
                .saturating_sub(ledger.held_by_others(&field.identifier));
            let limit = match &config.token_budget {
                Some(cap) => available.min(cap.resolve(max_tokens)),
                None => available,
            };

            let mut status = ContextStatus::excluded(&field.identifier, field.kind, StatusReason::OutOfBudget);
            status.triggering_key = activation.triggering_key;

            let fitted = if field.is_category() {
                // Header, prefix and suffix are charged before the children.
                let overhead = trimmer
                    .count_composed(&config.prefix, &category_body(&field.text, ""), &config.suffix)
                    .await?;
                let ceiling = limit.saturating_sub(overhead);
                let sub = self.run(&field.sub_fields, ceiling, key_context.clone()).await?;
                let mut sub_report = report::assemble(sub, self.tokenizer, self.encoder, String::new()).await?;
                let outcome = activation::resolve_category(&sub_report);
                debug!(
                    identifier = %field.identifier,
                    ceiling,
                    overhead,
                    included = sub_report.included_identifiers().len(),
                    "Built sub-context"
                );
                if outcome != ActivationOutcome::Included {
                    ledger.release(&field.identifier);
                    status.reason = StatusReason::Activation(outcome);
                    status.sub_context = Some(Box::new(sub_report));
                    statuses.push(status);
                    continue;
                }

                // A category is one fragment: committed whole or not at all.
                let body = category_body(&field.text, &sub_report.output);
                let calculated = trimmer.count_composed(&config.prefix, &body, &config.suffix).await?;
                status.calculated_tokens = calculated;
                let fitted = if calculated <= limit {
                    Some(Fitted {
                        text: format!("{}{}{}", config.prefix, body, config.suffix),
                        tokens: calculated,
                        method: TrimMethod::NoTrim,
                    })
                } else {
                    withdraw(&mut sub_report);
                    None
                };
                status.sub_context = Some(Box::new(sub_report));
                fitted
            } else {
                let calculated = match measured[index] {
                    Some(tokens) => tokens,
                    None => {
                        trimmer
                            .count_composed(&config.prefix, &field.text, &config.suffix)
                            .await?
                    }
                };
                status.calculated_tokens = calculated;

                if calculated <= limit {
                    Some(Fitted {
                        text: format!("{}{}{}", config.prefix, field.text, config.suffix),
                        tokens: calculated,
                        method: TrimMethod::NoTrim,
                    })
                } else {
                    trimmer.trim(&field.text, config, limit).await?.map(|t| Fitted {
                        text: format!("{}{}{}", config.prefix, t.body, config.suffix),
                        tokens: t.tokens,
                        method: t.method,
                    })
                }
            };
            ledger.release(&field.identifier);

            let Some(fitted) = fitted else {
                debug!(
                    identifier = %field.identifier,
                    tokens = status.calculated_tokens,
                    limit,
                    "Field excluded: out of budget"
                );
                statuses.push(status);
                continue;
            };

            // ── 5. Commit ────────────────────────────────────────────────
            budget.commit(fitted.tokens)?;
            key_context.push(field.kind, &fitted.text);
            committed.push(Fragment {
                identifier: field.identifier.clone(),
                kind: field.kind,
                text: fitted.text,
                insertion: config.insertion,
                declaration: index,
            });

            let description = match fitted.method {
                TrimMethod::NoTrim => field.describe(),
                method => format!("{} [{method:?} trim]", field.describe()),
            };
            debug!(
                identifier = %field.identifier,
                tokens = fitted.tokens,
                remaining = budget.remaining_tokens(),
                method = ?fitted.method,
                "Committed field"
            );
            stages.push(ContextStageReport {
                description,
                reserved_tokens: budget.reserved_tokens(),
                remaining_tokens: budget.remaining_tokens(),
                structured_output_so_far: placement::place(&committed),
            });

            status.included = true;
            status.reason = StatusReason::INCLUDED;
            status.actual_reserved_tokens = fitted.tokens;
            status.trim_method = Some(fitted.method);
            statuses.push(status);
        }

        // ── 6. Document order ────────────────────────────────────────────
        Ok(Allocation {
            structured: placement::place(&committed),
            statuses,
            stages,
            max_tokens,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weave_core::{FieldKind, TokenLimit};

    #[test]
    fn duplicate_identifiers_rejected() {
        let fields = vec![
            ContentField::lore("cave", "a", ["cave"]),
            ContentField::lore("cave", "b", ["cave"]),
        ];
        assert!(matches!(
            validate_fields(&fields),
            Err(ContextError::DuplicateIdentifier(id)) if id == "cave"
        ));
    }

    #[test]
    fn duplicates_checked_per_level() {
        let fields = vec![
            ContentField::lore("cave", "a", ["cave"]),
            ContentField::category("places", "", vec![ContentField::lore("cave", "b", ["cave"])]),
        ];
        assert!(validate_fields(&fields).is_ok());

        let nested = vec![ContentField::category(
            "places",
            "",
            vec![
                ContentField::new("x", FieldKind::Lore, "1"),
                ContentField::new("x", FieldKind::Lore, "2"),
            ],
        )];
        assert!(matches!(validate_fields(&nested), Err(ContextError::DuplicateIdentifier(_))));
    }

    #[test]
    fn invalid_fraction_rejected() {
        let fields = vec![ContentField::memory("m").with_token_budget(TokenLimit::Fraction(2.0))];
        assert!(matches!(validate_fields(&fields), Err(ContextError::InvalidTokenLimit { .. })));
    }

    #[test]
    fn invalid_nested_key_rejected() {
        let fields = vec![ContentField::category(
            "places",
            "",
            vec![ContentField::lore("bad", "x", ["/(/"])],
        )];
        assert!(matches!(validate_fields(&fields), Err(ContextError::InvalidKey { .. })));
    }

    #[test]
    fn withdrawn_sub_context_includes_nothing() {
        let mut cave = ContextStatus::excluded("cave", FieldKind::Lore, StatusReason::INCLUDED);
        cave.included = true;
        cave.actual_reserved_tokens = 5;
        cave.trim_method = Some(TrimMethod::NoTrim);
        let skipped = ContextStatus::excluded(
            "bridge",
            FieldKind::Lore,
            StatusReason::Activation(ActivationOutcome::NoKeyTriggered),
        );
        let segment = Segment {
            identifier: "cave".into(),
            kind: FieldKind::Lore,
            text: "Caves are dark.\n".into(),
        };
        let mut report = ContextReport {
            preamble: String::new(),
            output: segment.text.clone(),
            structured_output: vec![segment.clone()],
            context_statuses: vec![cave, skipped],
            stage_reports: vec![ContextStageReport {
                description: "Lore: cave".into(),
                reserved_tokens: 5,
                remaining_tokens: 0,
                structured_output_so_far: vec![segment],
            }],
            max_tokens: 5,
            encoder: EncoderVariant::new("words"),
            tokens: vec![0, 1, 2, 3, 4],
            biases: Vec::new(),
        };

        withdraw(&mut report);

        assert!(report.included_identifiers().is_empty());
        assert_eq!(report.reserved_tokens(), 0);
        assert!(report.output.is_empty() && report.tokens.is_empty());
        let cave = report.status("cave").unwrap();
        assert_eq!(cave.reason, StatusReason::OutOfBudget);
        assert_eq!(cave.trim_method, None);
        assert_eq!(
            report.status("bridge").unwrap().reason,
            StatusReason::Activation(ActivationOutcome::NoKeyTriggered)
        );
        report.verify().unwrap();
    }

    #[test]
    fn category_header_gets_its_own_line() {
        assert_eq!(category_body("Places:", "A\n"), "Places:\nA\n");
        assert_eq!(category_body("Places:\n", "A\n"), "Places:\nA\n");
        assert_eq!(category_body("", "A\n"), "A\n");
    }
}
