//! Context reports — the auditable output of an assembly pass.
//!
//! A report records the final text, the same text split into per-field
//! segments, one status per candidate field and one stage snapshot per
//! commit. Sub-contexts are embedded by value in their category's status.

use serde::{Deserialize, Serialize};

use crate::bias::ActiveBias;
use crate::error::ContextError;
use crate::field::{FieldKind, TrimMethod};
use crate::tokenizer::EncoderVariant;

/// A piece of the assembled document attributed to one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub identifier: String,
    pub kind: FieldKind,
    pub text: String,
}

/// Snapshot of the pass taken right after a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextStageReport {
    pub description: String,
    pub reserved_tokens: usize,
    pub remaining_tokens: usize,
    /// Document order of everything committed up to and including this stage.
    pub structured_output_so_far: Vec<Segment>,
}

/// Result of activation for a single field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationOutcome {
    Included,
    /// The field is explicitly turned off.
    Disabled,
    /// Key-triggered and none of the keys matched.
    NoKeyTriggered,
    /// Time-windowed and the current turn is outside the window.
    EphemeralInactive,
    /// A category none of whose children were included.
    NoActiveEntries,
}

impl ActivationOutcome {
    pub fn is_included(&self) -> bool {
        matches!(self, Self::Included)
    }
}

/// Why a field ended up where it did.
///
/// Budget exhaustion is kept apart from activation outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusReason {
    Activation(ActivationOutcome),
    /// Eligible, but not even a trimmed version fit the remaining budget.
    OutOfBudget,
}

impl StatusReason {
    pub const INCLUDED: StatusReason = StatusReason::Activation(ActivationOutcome::Included);
}

impl std::fmt::Display for StatusReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Activation(ActivationOutcome::Included) => "included",
            Self::Activation(ActivationOutcome::Disabled) => "disabled",
            Self::Activation(ActivationOutcome::NoKeyTriggered) => "no key triggered",
            Self::Activation(ActivationOutcome::EphemeralInactive) => "ephemeral inactive",
            Self::Activation(ActivationOutcome::NoActiveEntries) => "no active entries",
            Self::OutOfBudget => "out of budget",
        };
        f.write_str(s)
    }
}

/// One record per candidate field, included or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextStatus {
    pub identifier: String,
    pub kind: FieldKind,
    pub included: bool,
    pub reason: StatusReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triggering_key: Option<String>,
    /// Tokens of the full (untrimmed) fragment. Zero when never measured.
    pub calculated_tokens: usize,
    /// Tokens actually charged against the budget.
    pub actual_reserved_tokens: usize,
    /// `NoTrim` when committed whole; `None` when not committed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trim_method: Option<TrimMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_context: Option<Box<ContextReport>>,
}

impl ContextStatus {
    /// A terminal exclusion that never touched the budget.
    pub fn excluded(identifier: impl Into<String>, kind: FieldKind, reason: StatusReason) -> Self {
        Self {
            identifier: identifier.into(),
            kind,
            included: false,
            reason,
            triggering_key: None,
            calculated_tokens: 0,
            actual_reserved_tokens: 0,
            trim_method: None,
            sub_context: None,
        }
    }
}

/// The final output of one assembly pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextReport {
    /// Always-first text outside the budgeted set.
    #[serde(default)]
    pub preamble: String,
    pub output: String,
    pub structured_output: Vec<Segment>,
    pub context_statuses: Vec<ContextStatus>,
    pub stage_reports: Vec<ContextStageReport>,
    pub max_tokens: usize,
    pub encoder: EncoderVariant,
    /// Token ids of `output`.
    pub tokens: Vec<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub biases: Vec<ActiveBias>,
}

impl ContextReport {
    /// Status of a field in this pass (not descending into sub-contexts).
    pub fn status(&self, identifier: &str) -> Option<&ContextStatus> {
        self.context_statuses.iter().find(|s| s.identifier == identifier)
    }

    /// Status of a field anywhere in this report, sub-contexts included.
    pub fn find_status(&self, identifier: &str) -> Option<&ContextStatus> {
        self.context_statuses.iter().find_map(|s| {
            if s.identifier == identifier {
                Some(s)
            } else {
                s.sub_context.as_ref().and_then(|sub| sub.find_status(identifier))
            }
        })
    }

    /// Identifiers of included fields, in evaluation order.
    pub fn included_identifiers(&self) -> Vec<&str> {
        self.context_statuses
            .iter()
            .filter(|s| s.included)
            .map(|s| s.identifier.as_str())
            .collect()
    }

    /// Tokens committed by included fields.
    pub fn reserved_tokens(&self) -> usize {
        self.context_statuses
            .iter()
            .filter(|s| s.included)
            .map(|s| s.actual_reserved_tokens)
            .sum()
    }

    /// Concatenation of the structured output.
    pub fn structured_text(&self) -> String {
        self.structured_output.iter().map(|s| s.text.as_str()).collect()
    }

    /// Check the structural invariants of this report and every sub-context.
    pub fn verify(&self) -> Result<(), ContextError> {
        let structured = self.structured_text();
        if structured != self.output {
            return Err(ContextError::OutputMismatch {
                output_len: self.output.len(),
                structured_len: structured.len(),
            });
        }

        let reserved = self.reserved_tokens();
        if reserved > self.max_tokens {
            return Err(ContextError::BudgetInvariant(format!(
                "{reserved} tokens committed against a ceiling of {}",
                self.max_tokens
            )));
        }

        for (index, stage) in self.stage_reports.iter().enumerate() {
            if stage.remaining_tokens > self.max_tokens
                || stage.reserved_tokens + stage.remaining_tokens != self.max_tokens
            {
                return Err(ContextError::BudgetInvariant(format!(
                    "stage {index} ({}) reports {} reserved + {} remaining for a ceiling of {}",
                    stage.description, stage.reserved_tokens, stage.remaining_tokens, self.max_tokens
                )));
            }
        }

        for status in &self.context_statuses {
            if let Some(sub) = &status.sub_context {
                sub.verify()?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(id: &str, text: &str) -> Segment {
        Segment {
            identifier: id.into(),
            kind: FieldKind::Lore,
            text: text.into(),
        }
    }

    fn report(output: &str, segments: Vec<Segment>) -> ContextReport {
        ContextReport {
            preamble: String::new(),
            output: output.into(),
            structured_output: segments,
            context_statuses: vec![],
            stage_reports: vec![],
            max_tokens: 10,
            encoder: EncoderVariant::default(),
            tokens: vec![],
            biases: vec![],
        }
    }

    #[test]
    fn verify_accepts_consistent_report() {
        let r = report("ab", vec![segment("a", "a"), segment("b", "b")]);
        assert!(r.verify().is_ok());
    }

    #[test]
    fn verify_rejects_output_mismatch() {
        let r = report("abc", vec![segment("a", "a"), segment("b", "b")]);
        assert!(matches!(r.verify(), Err(ContextError::OutputMismatch { .. })));
    }

    #[test]
    fn verify_rejects_unbalanced_stage() {
        let mut r = report("a", vec![segment("a", "a")]);
        r.stage_reports.push(ContextStageReport {
            description: "Lore 'a'".into(),
            reserved_tokens: 3,
            remaining_tokens: 3,
            structured_output_so_far: vec![segment("a", "a")],
        });
        assert!(matches!(r.verify(), Err(ContextError::BudgetInvariant(_))));
    }

    #[test]
    fn find_status_descends_into_sub_contexts() {
        let mut inner = report("", vec![]);
        inner
            .context_statuses
            .push(ContextStatus::excluded("child", FieldKind::Lore, StatusReason::OutOfBudget));
        let mut outer = report("", vec![]);
        let mut category = ContextStatus::excluded(
            "places",
            FieldKind::Lore,
            StatusReason::Activation(ActivationOutcome::NoActiveEntries),
        );
        category.sub_context = Some(Box::new(inner));
        outer.context_statuses.push(category);

        assert!(outer.status("child").is_none());
        let child = outer.find_status("child").unwrap();
        assert_eq!(child.reason, StatusReason::OutOfBudget);
    }

    #[test]
    fn reason_display_is_human_readable() {
        assert_eq!(StatusReason::OutOfBudget.to_string(), "out of budget");
        assert_eq!(StatusReason::INCLUDED.to_string(), "included");
    }
}
