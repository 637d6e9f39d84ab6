//! Input loading: a CSV table with a text column, or a plain file with one
//! log line per row.

use std::fs;
use std::path::Path;

use tracing::{debug, info};

use logvec_core::config::InputFormat;
use logvec_core::error::{Error, Result};
use logvec_core::types::Record;

/// Read every record from `path`, in file order.
pub fn load_records(path: &Path, text_column: &str, format: InputFormat) -> Result<Vec<Record>> {
    if !path.exists() {
        return Err(Error::InputNotFound { path: path.to_path_buf() });
    }
    let records = match resolve_format(path, format) {
        InputFormat::Lines => read_lines(path)?,
        _ => read_csv(path, text_column)?,
    };
    info!(path = %path.display(), records = records.len(), "loaded input");
    Ok(records)
}

fn resolve_format(path: &Path, format: InputFormat) -> InputFormat {
    match format {
        InputFormat::Auto => {
            let is_csv = path.extension().and_then(|e| e.to_str()).is_some_and(|e| e.eq_ignore_ascii_case("csv"));
            if is_csv { InputFormat::Csv } else { InputFormat::Lines }
        }
        other => other,
    }
}

fn read_csv(path: &Path, text_column: &str) -> Result<Vec<Record>> {
    let malformed = |row: usize, e: csv::Error| Error::MalformedInput { path: path.to_path_buf(), row, message: e.to_string() };
    let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_path(path).map_err(|e| malformed(0, e))?;
    let headers = rdr.headers().map_err(|e| malformed(0, e))?.clone();
    let column = headers
        .iter()
        .position(|h| h.trim() == text_column)
        .ok_or_else(|| Error::Schema { path: path.to_path_buf(), column: text_column.to_string() })?;
    debug!(column, headers = headers.len(), "resolved text column");

    let mut records = Vec::new();
    for (row, result) in rdr.records().enumerate() {
        let rec = result.map_err(|e| malformed(row, e))?;
        let text = rec.get(column).unwrap_or_default().to_string();
        records.push(Record { row, text });
    }
    Ok(records)
}

fn read_lines(path: &Path) -> Result<Vec<Record>> {
    let content = fs::read_to_string(path)?;
    Ok(content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .enumerate()
        .map(|(row, line)| Record { row, text: line.to_string() })
        .collect())
}
