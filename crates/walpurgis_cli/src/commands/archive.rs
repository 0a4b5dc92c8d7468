//! Offline archive management: export, import and status.

use std::path::Path;

use miette::{IntoDiagnostic, Result};
use tracing::info;
use walpurgis_core::{commands, BotContext, ImportReport};

use crate::output::Output;

/// Write the whole archive to `path` as JSON.
pub async fn export(context: &BotContext, path: &Path, output: &Output) -> Result<usize> {
    let json = commands::export_json(context).await?;
    let count = context.db.stats().await?.entry_count;
    tokio::fs::write(path, json).await.into_diagnostic()?;

    info!(count, path = %path.display(), "Exported archive");
    output.success(&format!("Exported {} entries to {}", count, path.display()));
    Ok(count as usize)
}

/// Load a JSON export (current or legacy layout) from `path`.
pub async fn import(context: &BotContext, path: &Path, output: &Output) -> Result<ImportReport> {
    let json = tokio::fs::read_to_string(path).await.into_diagnostic()?;
    let report = commands::import_json(context, &json).await?;

    output.success(&format!(
        "Imported {} entries from {}",
        report.inserted,
        path.display()
    ));
    if report.skipped > 0 {
        output.warning(&format!(
            "Skipped {} days that were already archived",
            report.skipped
        ));
    }
    Ok(report)
}

/// Print every page of the presence report for `[start, end]`.
pub async fn status(
    context: &BotContext,
    start: i64,
    end: Option<i64>,
    output: &Output,
) -> Result<()> {
    let report = commands::status_report(context, start, end).await?;
    output.section("Archive status");
    for page in 1..=report.total_pages() {
        output.print(&report.page(page));
    }
    output.kv("Archived", &report.archived.len().to_string());
    output.kv("Missing", &report.missing().to_string());
    Ok(())
}
