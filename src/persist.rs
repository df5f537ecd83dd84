// 💾 Persistence - Delimited table on disk
// Comma-separated with a header line; the processed frame carries its row
// label as the first column (`index`).
//
// WriteMode::Append adds the new rows AND a new header line to the end of an
// existing file. Nothing reconciles the two headers; `read_table` skips the
// repeated ones when loading the file back.

use anyhow::{Context, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::OpenOptions;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

// ============================================================================
// WRITE MODE
// ============================================================================

/// WriteMode - What happens to an existing file at the destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    /// Truncate and rewrite
    #[default]
    Overwrite,
    /// Add to the end, header included (duplicate-header risk)
    Append,
}

impl WriteMode {
    pub fn name(&self) -> &str {
        match self {
            WriteMode::Overwrite => "overwrite",
            WriteMode::Append => "append",
        }
    }
}

/// PersistReport - What a single write put on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistReport {
    pub path: PathBuf,
    pub mode: WriteMode,
    pub rows: usize,
    pub bytes: usize,
    /// SHA-256 of the bytes written by this call (not the whole file under Append)
    pub sha256: String,
}

impl PersistReport {
    pub fn summary(&self) -> String {
        format!(
            "{} rows ({} bytes, {}) -> {} [sha256 {}]",
            self.rows,
            self.bytes,
            self.mode.name(),
            self.path.display(),
            &self.sha256[..12.min(self.sha256.len())]
        )
    }
}

// ============================================================================
// WRITE
// ============================================================================

/// Serialize a frame (header + rows) into CSV bytes
///
/// Nulls are written as empty cells, dates as `YYYY-MM-DD`.
pub fn encode_table(table: &DataFrame) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    CsvWriter::new(&mut buffer)
        .include_header(true)
        .finish(&mut table.clone())
        .context("Failed to encode CSV")?;
    Ok(buffer)
}

/// Write a frame to `path`, truncating or appending according to `mode`
///
/// The whole frame is encoded in memory first and written with a single call.
pub fn write_table(path: &Path, table: &DataFrame, mode: WriteMode) -> Result<PersistReport> {
    let buffer = encode_table(table)?;

    let mut options = OpenOptions::new();
    match mode {
        WriteMode::Overwrite => options.write(true).create(true).truncate(true),
        WriteMode::Append => options.append(true).create(true),
    };

    if mode == WriteMode::Append && path.exists() {
        debug!(path = %path.display(), "appending to existing table, header will repeat");
    }

    let mut file = options
        .open(path)
        .with_context(|| format!("Failed to open {} for writing", path.display()))?;
    file.write_all(&buffer)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    Ok(PersistReport {
        path: path.to_path_buf(),
        mode,
        rows: table.height(),
        bytes: buffer.len(),
        sha256: format!("{:x}", Sha256::digest(&buffer)),
    })
}

// ============================================================================
// READ
// ============================================================================

/// Load a table written by `write_table`
///
/// Header lines repeated by appends are skipped. Column types are inferred
/// from the whole column, not cell by cell: a column holding only numbers
/// reads back as Float64/Int64, a column of `YYYY-MM-DD` strings as Date, so
/// text that merely looks numeric or date-like changes type on the way back.
pub fn read_table(path: &Path) -> Result<DataFrame> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let mut lines = text.lines();
    let Some(header) = lines.next() else {
        return Ok(DataFrame::empty());
    };

    let mut cleaned = String::with_capacity(text.len());
    cleaned.push_str(header);
    cleaned.push('\n');
    let mut repeated_headers = 0;
    for line in lines {
        if line == header {
            repeated_headers += 1;
            continue;
        }
        cleaned.push_str(line);
        cleaned.push('\n');
    }

    if repeated_headers > 0 {
        warn!(
            path = %path.display(),
            repeated_headers,
            "table contains repeated header lines from appended writes"
        );
    }

    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None)
        .with_parse_options(CsvParseOptions::default().with_try_parse_dates(true))
        .into_reader_with_file_handle(Cursor::new(cleaned.into_bytes()))
        .finish()
        .with_context(|| format!("Failed to parse {}", path.display()))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn create_test_table() -> DataFrame {
        let dates = vec![
            NaiveDate::from_ymd_opt(2019, 6, 1).unwrap(),
            NaiveDate::from_ymd_opt(2019, 6, 2).unwrap(),
        ];
        DataFrame::new(vec![
            Series::new("date".into(), dates).into(),
            Series::new("revenue".into(), vec![120.5, 98.0]).into(),
            Series::new("next_months_revenue".into(), vec![None, Some(4100.0)]).into(),
            Series::new("country".into(), vec!["United Kingdom", "United Kingdom"]).into(),
        ])
        .unwrap()
    }

    fn floats(df: &DataFrame, name: &str) -> Vec<Option<f64>> {
        df.column(name)
            .unwrap()
            .as_materialized_series()
            .cast(&DataType::Float64)
            .unwrap()
            .f64()
            .unwrap()
            .into_iter()
            .collect()
    }

    #[test]
    fn test_encode_layout() {
        let bytes = encode_table(&create_test_table()).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "date,revenue,next_months_revenue,country");
        assert!(lines[1].starts_with("2019-06-01,120.5,,United Kingdom"));
    }

    #[test]
    fn test_overwrite_then_read_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("processed.csv");
        let table = create_test_table();

        let report = write_table(&path, &table, WriteMode::Overwrite).unwrap();
        assert_eq!(report.rows, 2);
        assert_eq!(report.sha256.len(), 64);

        let loaded = read_table(&path).unwrap();
        assert_eq!(loaded.shape(), (2, 4));
        assert_eq!(loaded.column("date").unwrap().dtype(), &DataType::Date);
        assert_eq!(floats(&loaded, "revenue"), vec![Some(120.5), Some(98.0)]);
        assert_eq!(floats(&loaded, "next_months_revenue"), vec![None, Some(4100.0)]);
    }

    #[test]
    fn test_overwrite_is_byte_identical() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("processed.csv");
        let table = create_test_table();

        let first = write_table(&path, &table, WriteMode::Overwrite).unwrap();
        let bytes_first = std::fs::read(&path).unwrap();
        let second = write_table(&path, &table, WriteMode::Overwrite).unwrap();
        let bytes_second = std::fs::read(&path).unwrap();

        assert_eq!(first.sha256, second.sha256);
        assert_eq!(bytes_first, bytes_second);
    }

    #[test]
    fn test_append_repeats_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("processed.csv");
        let table = create_test_table();

        write_table(&path, &table, WriteMode::Overwrite).unwrap();
        let report = write_table(&path, &table, WriteMode::Append).unwrap();
        assert_eq!(report.mode, WriteMode::Append);

        let text = std::fs::read_to_string(&path).unwrap();
        let headers = text.lines().filter(|l| l.starts_with("date,")).count();
        assert_eq!(headers, 2);

        let loaded = read_table(&path).unwrap();
        assert_eq!(loaded.height(), 4);
    }

    #[test]
    fn test_numeric_looking_text_changes_type() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("codes.csv");
        let table = DataFrame::new(vec![
            Series::new("code".into(), vec!["10", "20"]).into(),
        ])
        .unwrap();

        write_table(&path, &table, WriteMode::Overwrite).unwrap();
        let loaded = read_table(&path).unwrap();
        assert_eq!(loaded.column("code").unwrap().dtype(), &DataType::Int64);
    }

    #[test]
    fn test_read_missing_file_fails() {
        let dir = tempdir().unwrap();
        let err = read_table(&dir.path().join("nope.csv")).unwrap_err();
        assert!(err.to_string().contains("Failed to open"));
    }
}
