//! R-multiple sample loaders.
//!
//! CSV: one named column (default `R`). Blank cells are skipped.
//! NDJSON: one object per line, one named key. Missing or `null` values are
//! skipped; numeric strings are accepted.
//!
//! Non-finite values are kept here; the engine discards them.

use std::fs;
use std::path::Path;

use serde_json::Value;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SampleFormat {
    Csv,
    Ndjson,
}

impl SampleFormat {
    /// `.ndjson` / `.jsonl` are NDJSON, everything else is CSV.
    pub fn infer(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("ndjson") | Some("jsonl") => SampleFormat::Ndjson,
            _ => SampleFormat::Csv,
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "csv" => Some(SampleFormat::Csv),
            "ndjson" | "jsonl" => Some(SampleFormat::Ndjson),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SampleError {
    Io(String),
    Csv(String),
    MissingColumn { column: String, available: Vec<String> },
    Parse { line: usize, value: String },
    BadJson { line: usize, msg: String },
}

impl From<std::io::Error> for SampleError {
    fn from(e: std::io::Error) -> Self {
        SampleError::Io(e.to_string())
    }
}

impl std::fmt::Display for SampleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SampleError::Io(e) => write!(f, "io error: {}", e),
            SampleError::Csv(e) => write!(f, "csv error: {}", e),
            SampleError::MissingColumn { column, available } => write!(
                f,
                "missing column '{}' (available: {})",
                column,
                available.join(",")
            ),
            SampleError::Parse { line, value } => {
                write!(f, "failed to parse R at line {}: {}", line, value)
            }
            SampleError::BadJson { line, msg } => write!(f, "bad json at line {}: {}", line, msg),
        }
    }
}

impl std::error::Error for SampleError {}

/// Load R-multiples from disk. `field` is the CSV column or NDJSON key.
pub fn load_r_multiples(
    path: &Path,
    format: SampleFormat,
    field: &str,
) -> Result<Vec<f64>, SampleError> {
    let s = fs::read_to_string(path)?;
    match format {
        SampleFormat::Csv => parse_csv_r(&s, field),
        SampleFormat::Ndjson => parse_ndjson_r(&s, field),
    }
}

pub fn parse_csv_r(content: &str, column: &str) -> Result<Vec<f64>, SampleError> {
    let content = content.trim_start_matches('\u{feff}');
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers = rdr
        .headers()
        .map_err(|e| SampleError::Csv(e.to_string()))?
        .clone();
    let idx = headers
        .iter()
        .position(|h| h == column)
        .ok_or_else(|| SampleError::MissingColumn {
            column: column.to_string(),
            available: headers.iter().map(str::to_string).collect(),
        })?;

    let mut out = Vec::new();
    for (i, rec) in rdr.records().enumerate() {
        let rec = rec.map_err(|e| SampleError::Csv(e.to_string()))?;
        // Header is line 1.
        let line = i + 2;
        let cell = rec.get(idx).unwrap_or("");
        if cell.is_empty() {
            continue;
        }
        let v: f64 = cell.parse().map_err(|_| SampleError::Parse {
            line,
            value: cell.to_string(),
        })?;
        out.push(v);
    }
    Ok(out)
}

pub fn parse_ndjson_r(content: &str, key: &str) -> Result<Vec<f64>, SampleError> {
    let mut out = Vec::new();
    for (i, raw) in content.lines().enumerate() {
        let line = i + 1;
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }
        let obj: Value = serde_json::from_str(raw).map_err(|e| SampleError::BadJson {
            line,
            msg: e.to_string(),
        })?;
        match obj.get(key) {
            None | Some(Value::Null) => continue,
            Some(Value::Number(n)) => {
                if let Some(v) = n.as_f64() {
                    out.push(v);
                }
            }
            Some(Value::String(s)) => {
                let v: f64 = s.trim().parse().map_err(|_| SampleError::Parse {
                    line,
                    value: s.clone(),
                })?;
                out.push(v);
            }
            Some(other) => {
                return Err(SampleError::Parse {
                    line,
                    value: other.to_string(),
                })
            }
        }
    }
    Ok(out)
}
