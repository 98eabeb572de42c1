//! The tabular output: RFC 4180 CSV with a header row.
//!
//! Columns are always, in order:
//! `title, date, description, link, image_url, search_phrase,
//! appears_of_search_phrase, image_file_path`.

use crate::error::Result;
use crate::models::ArticleRecord;
use std::io::{self, Write};
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

fn needs_quotes(field: &str) -> bool {
    field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r')
}

/// Write one CSV row to any writer.
pub fn write_row<W: Write, S: AsRef<str>>(mut w: W, row: &[S]) -> io::Result<()> {
    let mut first = true;
    for cell in row {
        if !first {
            write!(w, ",")?;
        }
        first = false;
        let cell = cell.as_ref();
        if needs_quotes(cell) {
            write!(w, "\"{}\"", cell.replace('"', "\"\""))?;
        } else {
            write!(w, "{cell}")?;
        }
    }
    writeln!(w)
}

/// Render the header and one row per record.
pub fn to_table_string(records: &[ArticleRecord]) -> String {
    let mut buf: Vec<u8> = Vec::new();
    // writes into a Vec cannot fail
    let _ = write_row(&mut buf, &ArticleRecord::COLUMNS);
    for record in records {
        let _ = write_row(&mut buf, record.to_row().as_slice());
    }
    match String::from_utf8(buf) {
        Ok(s) => s,
        Err(e) => String::from_utf8_lossy(&e.into_bytes()).into_owned(),
    }
}

/// Write the whole table to `path` in one go, replacing any previous file.
#[instrument(level = "info", skip(records), fields(path = %path.display()))]
pub async fn write_table(records: &[ArticleRecord], path: &Path) -> Result<()> {
    fs::write(path, to_table_string(records)).await?;
    info!(rows = records.len(), "Wrote article table");
    Ok(())
}
