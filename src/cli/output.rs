//! Output rendering for CLI commands.

use std::fmt::Write as _;

use serde::Serialize;

use crate::agent::state::TurnOutput;
use crate::retrieval::CollectionInfo;

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// Pretty-printed JSON.
    Json,
}

impl OutputFormat {
    /// Parses a format name, falling back to text for anything unknown.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Text,
        }
    }

    /// Serializes `value` as pretty JSON, or an error object if that fails.
    pub fn to_json<T: Serialize + ?Sized>(self, value: &T) -> String {
        serde_json::to_string_pretty(value).unwrap_or_else(|e| {
            serde_json::json!({ "error": format!("serialization failed: {e}") }).to_string()
        })
    }
}

/// Renders the result of one turn.
///
/// Text output is the reply followed by a one-line summary; `verbose` adds
/// the plan, queries and cited sources.
pub fn format_turn(output: &TurnOutput, format: OutputFormat, verbose: bool) -> String {
    if format == OutputFormat::Json {
        return format.to_json(output);
    }

    let mut out = output.reply().unwrap_or_default().to_string();
    let _ = write!(
        out,
        "\n\n---\nCategory: {} | Collections: {} | Steps: {} | Documents: {} | Time: {:.1}s",
        output.category,
        if output.collections.is_empty() {
            "-".to_string()
        } else {
            output.collections.join(", ")
        },
        output.research_steps(),
        output.documents.len(),
        output.elapsed.as_secs_f64()
    );

    for report in &output.research {
        for query in &report.failed_queries {
            let _ = write!(out, "\nFailed query: {query}");
        }
    }

    if verbose {
        let _ = write!(out, "\nReason: {}", output.justification);
        for (i, report) in output.research.iter().enumerate() {
            let _ = write!(
                out,
                "\nStep {}: {} ({} found, {} new)",
                i + 1,
                report.step,
                report.documents_found,
                report.documents_added
            );
            for query in &report.queries {
                let _ = write!(out, "\n  - {query}");
            }
        }
        for (i, doc) in output.documents.iter().enumerate() {
            let _ = write!(
                out,
                "\n[{}] {}",
                i + 1,
                doc.source()
                    .or_else(|| doc.title())
                    .unwrap_or(doc.id.as_str())
            );
        }
    }
    out
}

/// Renders the collection list.
pub fn format_collections(collections: &[CollectionInfo], format: OutputFormat) -> String {
    if format == OutputFormat::Json {
        return format.to_json(collections);
    }
    if collections.is_empty() {
        return "No collections loaded.\n".to_string();
    }

    let width = collections
        .iter()
        .map(|c| c.name.len())
        .max()
        .unwrap_or(0)
        .max(4);
    let mut out = format!("{:<width$}  {:>9}  {}\n", "NAME", "DOCUMENTS", "CREATED");
    for c in collections {
        let _ = writeln!(
            out,
            "{:<width$}  {:>9}  {}",
            c.name, c.document_count, c.created_at
        );
    }
    out
}
