//! Report builder — turns an allocation into a `ContextReport`.

use weave_core::{ActiveBias, BiasGroup, ContextError, ContextReport, EncoderVariant, Tokenizer};

use crate::allocator::Allocation;

/// Concatenate the structured output, tokenize it and check the result.
///
/// Sub-contexts are assembled with this too; biases are attached to the
/// top-level report only, by [`active_biases`].
pub async fn assemble(
    allocation: Allocation,
    tokenizer: &dyn Tokenizer,
    encoder: &EncoderVariant,
    preamble: String,
) -> Result<ContextReport, ContextError> {
    let output: String = allocation.structured.iter().map(|s| s.text.as_str()).collect();
    let tokens = if output.is_empty() {
        Vec::new()
    } else {
        tokenizer.encode(&output, encoder).await?
    };

    let report = ContextReport {
        preamble,
        output,
        structured_output: allocation.structured,
        context_statuses: allocation.statuses,
        stage_reports: allocation.stages,
        max_tokens: allocation.max_tokens,
        encoder: encoder.clone(),
        tokens,
        biases: Vec::new(),
    };
    report.verify()?;
    Ok(report)
}

/// Bias groups that apply given the inclusion results in `report`,
/// sub-contexts included.
pub fn active_biases(groups: &[BiasGroup], report: &ContextReport) -> Vec<ActiveBias> {
    groups
        .iter()
        .filter(|group| group.is_active(|id| report.find_status(id).map(|s| s.included)))
        .map(BiasGroup::summary)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use weave_core::{ContextStatus, FieldKind, Segment, StatusReason};
    use weave_tokenizer::{WordTokenizer, WORDS_VARIANT};

    fn allocation() -> Allocation {
        let mut cave = ContextStatus::excluded("cave", FieldKind::Lore, StatusReason::INCLUDED);
        cave.included = true;
        cave.actual_reserved_tokens = 3;
        Allocation {
            structured: vec![Segment {
                identifier: "cave".into(),
                kind: FieldKind::Lore,
                text: "Caves are dark".into(),
            }],
            statuses: vec![
                cave,
                ContextStatus::excluded(
                    "castle",
                    FieldKind::Lore,
                    StatusReason::Activation(weave_core::ActivationOutcome::NoKeyTriggered),
                ),
            ],
            stages: Vec::new(),
            max_tokens: 10,
        }
    }

    fn group(owner: &str, when_inactive: bool) -> BiasGroup {
        BiasGroup {
            owner: Some(owner.into()),
            phrases: vec![owner.into()],
            bias: 1.0,
            enabled: true,
            when_inactive,
        }
    }

    #[tokio::test]
    async fn assembled_output_matches_segments() {
        let tok = WordTokenizer::new();
        let variant = EncoderVariant::new(WORDS_VARIANT);
        let report = assemble(allocation(), &tok, &variant, "pre".into()).await.unwrap();
        assert_eq!(report.output, "Caves are dark");
        assert_eq!(report.tokens.len(), 3);
        assert_eq!(report.preamble, "pre");
    }

    #[tokio::test]
    async fn biases_follow_inclusion() {
        let tok = WordTokenizer::new();
        let variant = EncoderVariant::new(WORDS_VARIANT);
        let report = assemble(allocation(), &tok, &variant, String::new()).await.unwrap();

        let groups = vec![
            group("cave", false),
            group("castle", false),
            group("castle", true),
            group("unknown", true),
        ];
        let active = active_biases(&groups, &report);
        let owners: Vec<_> = active.iter().map(|b| (b.owner.as_deref(), b.when_inactive)).collect();
        assert_eq!(owners, vec![(Some("cave"), false), (Some("castle"), true)]);
    }
}
