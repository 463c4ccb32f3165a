//! `weave build` — Assemble a context and print the report.

use std::fmt::Write as _;
use std::path::PathBuf;

use weave_config::{load_request, AppConfig};
use weave_context::ContextBuilder;
use weave_core::{ContextReport, ContextStatus, TrimMethod};

pub async fn run(
    path: PathBuf,
    max_tokens: Option<i64>,
    turn: Option<u32>,
    json: bool,
) -> weave_core::Result<()> {
    let config = AppConfig::load()?;
    let mut request = load_request(&path, &config)?;
    if let Some(max_tokens) = max_tokens {
        request.max_tokens = max_tokens;
    }
    if let Some(turn) = turn {
        request.turn = turn;
    }

    let (tokenizer, variant) = weave_tokenizer::from_encoder(request.encoder.as_str())?;
    request.encoder = variant;
    tracing::debug!(path = %path.display(), encoder = %request.encoder, "Building context");

    let report = ContextBuilder::new(tokenizer).build(&request).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render_summary(&report));
    }
    Ok(())
}

/// Human-readable summary: status table, stage count, token usage, output.
pub fn render_summary(report: &ContextReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Context ({} encoder)", report.encoder);
    let _ = writeln!(out, "==================");
    render_statuses(&mut out, &report.context_statuses, 1);
    let _ = writeln!(out);
    let _ = writeln!(out, "  Stages:   {}", report.stage_reports.len());
    let _ = writeln!(
        out,
        "  Tokens:   {} committed, {} in output, ceiling {}",
        report.reserved_tokens(),
        report.tokens.len(),
        report.max_tokens
    );
    if !report.biases.is_empty() {
        let _ = writeln!(out, "  Biases:   {} active", report.biases.len());
    }
    let _ = writeln!(out);
    if !report.preamble.is_empty() {
        let _ = writeln!(out, "{}", report.preamble);
    }
    let _ = writeln!(out, "{}", report.output);
    out
}

fn render_statuses(out: &mut String, statuses: &[ContextStatus], depth: usize) {
    let indent = "  ".repeat(depth);
    for status in statuses {
        let mark = if status.included { "+" } else { "-" };
        let mut line = format!(
            "{indent}{mark} {:<20} {:<12} {:>5}/{:<5} {}",
            status.identifier,
            status.kind.label(),
            status.actual_reserved_tokens,
            status.calculated_tokens,
            status.reason
        );
        if let Some(key) = &status.triggering_key {
            let _ = write!(line, " [key: {key}]");
        }
        if let Some(method) = status.trim_method.filter(|m| *m != TrimMethod::NoTrim) {
            let _ = write!(line, " [trim: {method:?}]");
        }
        let _ = writeln!(out, "{line}");
        if let Some(sub) = &status.sub_context {
            render_statuses(out, &sub.context_statuses, depth + 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use weave_core::{ContentField, ContextRequest};
    use weave_tokenizer::WordTokenizer;

    #[tokio::test]
    async fn missing_request_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = run(dir.path().join("absent.toml"), None, None, true)
            .await
            .unwrap_err();
        assert!(matches!(err, weave_core::Error::Config { .. }));
        assert!(err.to_string().contains("absent.toml"));
    }

    #[tokio::test]
    async fn unknown_encoder_is_a_tokenizer_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("request.toml");
        std::fs::write(
            &path,
            "max_tokens = 50\nencoder = \"morse\"\n\n[[fields]]\nidentifier = \"story\"\nkind = \"story\"\ntext = \"Into the cave.\"\n",
        )
        .unwrap();
        let err = run(path, None, None, true).await.unwrap_err();
        assert!(matches!(err, weave_core::Error::Tokenizer(_)));
    }

    #[tokio::test]
    async fn summary_lists_nested_statuses() {
        let request = ContextRequest::new(
            50,
            vec![
                ContentField::story("Into the cave."),
                ContentField::category(
                    "places",
                    "Places:",
                    vec![ContentField::lore("cave", "Caves are dark.", ["cave"])],
                ),
            ],
        );
        let report = ContextBuilder::new(Arc::new(WordTokenizer::new()))
            .build(&request)
            .await
            .unwrap();

        let summary = render_summary(&report);
        assert!(summary.contains("+ story"));
        assert!(summary.contains("    + cave"));
        assert!(summary.contains("[key: cave]"));
        assert!(summary.contains("Stages:   2"));
        assert!(summary.ends_with(&format!("{}\n", report.output)));
    }
}
