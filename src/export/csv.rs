//! Flat CSV export of experiment results.
//!
//! One row per execution with the evaluation columns joined in. Failed
//! executions are exported too, with empty evaluation columns, so the file
//! accounts for every execution the experiment attempted.

use std::path::Path;

use tracing::info;
use uuid::Uuid;

use crate::error::ExportError;
use crate::storage::{Database, ResultRow};

/// Column order of the exported file.
pub const HEADERS: [&str; 31] = [
    "execution_id",
    "experiment_id",
    "model",
    "pollution_level",
    "difficulty",
    "tool_set",
    "context_placement",
    "adversarial_variant",
    "iteration",
    "seed",
    "prompt_hash",
    "block_count",
    "expected_value",
    "trap_value",
    "status",
    "error",
    "latency_ms",
    "input_tokens",
    "output_tokens",
    "rounds",
    "final_text",
    "classification",
    "called_any_tool",
    "called_target_tool",
    "used_tool_result",
    "anchored_on_context",
    "extracted_value",
    "candidate_count",
    "confidence_score",
    "manually_reviewed",
    "created_at",
];

/// Fetches every row of one experiment and writes them as CSV.
///
/// Returns the number of data rows written.
pub async fn export_experiment(
    database: &Database,
    experiment_id: Uuid,
    path: &Path,
) -> Result<usize, ExportError> {
    let rows = database.experiment_rows(experiment_id).await?;
    if rows.is_empty() {
        return Err(ExportError::NothingToExport(experiment_id.to_string()));
    }

    let csv = render_csv(&rows);
    tokio::fs::write(path, csv).await?;

    info!(rows = rows.len(), path = %path.display(), "Wrote CSV export");
    Ok(rows.len())
}

/// Renders rows into CSV text, header line first.
pub fn render_csv(rows: &[ResultRow]) -> String {
    let mut out = String::new();
    out.push_str(&HEADERS.join(","));
    out.push('\n');
    for row in rows {
        out.push_str(&render_row(row));
        out.push('\n');
    }
    out
}

fn render_row(row: &ResultRow) -> String {
    let fields = [
        row.execution_id.to_string(),
        row.experiment_id.to_string(),
        row.model.clone(),
        row.pollution_level.to_string(),
        row.difficulty.clone(),
        row.tool_set.clone(),
        row.context_placement.clone(),
        opt_str(row.adversarial_variant.as_deref()),
        row.iteration.to_string(),
        row.seed.to_string(),
        row.prompt_hash.clone(),
        row.block_count.to_string(),
        row.expected_value.to_string(),
        row.trap_value.to_string(),
        row.status.clone(),
        opt_str(row.error.as_deref()),
        opt_display(row.latency_ms),
        opt_display(row.input_tokens),
        opt_display(row.output_tokens),
        opt_display(row.rounds),
        opt_str(row.final_text.as_deref()),
        opt_str(row.classification.as_deref()),
        opt_display(row.called_any_tool),
        opt_display(row.called_target_tool),
        opt_display(row.used_tool_result),
        opt_display(row.anchored_on_context),
        opt_display(row.extracted_value),
        opt_display(row.candidate_count),
        opt_display(row.confidence_score),
        opt_display(row.manually_reviewed),
        row.created_at.to_rfc3339(),
    ];

    fields
        .iter()
        .map(|field| escape_field(field))
        .collect::<Vec<_>>()
        .join(",")
}

fn opt_str(value: Option<&str>) -> String {
    value.unwrap_or_default().to_string()
}

fn opt_display<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Quotes a field when it contains a delimiter, quote, or line break;
/// embedded quotes are doubled per RFC 4180.
fn escape_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
