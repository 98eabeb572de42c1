//! Output writers for a finished run.
//!
//! # Output Structure
//!
//! ```text
//! output_dir/
//! ├── news_data.csv          # one row per article, fixed column order
//! ├── news_data.json         # the same rows plus run metadata
//! ├── date_error_page.html   # last page whose date could not be resolved
//! └── 3f2b...c9.jpg          # one thumbnail per article
//! ```

pub mod csv;
pub mod json;

use crate::config::Settings;
use crate::error::Result;
use crate::models::{ArticleRecord, RunReport};
use std::path::PathBuf;
use tracing::instrument;

pub const TABLE_FILE: &str = "news_data.csv";
pub const REPORT_FILE: &str = "news_data.json";

/// Write every output the settings ask for. Returns the written paths.
#[instrument(level = "info", skip_all, fields(count = records.len()))]
pub async fn write_outputs(
    settings: &Settings,
    search_phrase: &str,
    records: Vec<ArticleRecord>,
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();

    if settings.format.writes_csv() {
        let path = settings.output_path().join(TABLE_FILE);
        csv::write_table(&records, &path).await?;
        written.push(path);
    }

    if settings.format.writes_json() {
        let path = settings.output_path().join(REPORT_FILE);
        let report = RunReport::new(search_phrase, &settings.categories, records);
        json::write_report(&report, &path).await?;
        written.push(path);
    }

    Ok(written)
}
