//! JSON report output.
//!
//! The report carries the same rows as the table plus run metadata
//! (generation time, phrase, categories, missing-date count).

use crate::error::Result;
use crate::models::RunReport;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

/// Serialize `report` to `path`, replacing any previous file.
#[instrument(level = "info", skip(report), fields(path = %path.display()))]
pub async fn write_report(report: &RunReport, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    fs::write(path, json).await?;
    info!(articles = report.articles.len(), "Wrote JSON report");
    Ok(())
}
