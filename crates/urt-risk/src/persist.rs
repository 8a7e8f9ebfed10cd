use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde_json::Value;

use crate::RiskReport;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportIoError {
    Io { path: String, msg: String },
    Parse { path: String, msg: String },
    Serialize(String),
}

impl fmt::Display for ReportIoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportIoError::Io { path, msg } => write!(f, "report io error at {path}: {msg}"),
            ReportIoError::Parse { path, msg } => write!(f, "report parse error at {path}: {msg}"),
            ReportIoError::Serialize(msg) => write!(f, "report serialize error: {msg}"),
        }
    }
}

impl std::error::Error for ReportIoError {}

fn io_err(path: &Path, e: std::io::Error) -> ReportIoError {
    ReportIoError::Io {
        path: path.display().to_string(),
        msg: e.to_string(),
    }
}

/// Pretty JSON with keys sorted lexicographically at every level.
pub fn to_canonical_json(report: &RiskReport) -> Result<String, ReportIoError> {
    let v = serde_json::to_value(report).map_err(|e| ReportIoError::Serialize(e.to_string()))?;
    let sorted = sort_keys(v);
    let mut s =
        serde_json::to_string_pretty(&sorted).map_err(|e| ReportIoError::Serialize(e.to_string()))?;
    s.push('\n');
    Ok(s)
}

fn sort_keys(v: Value) -> Value {
    match v {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> =
                map.into_iter().map(|(k, v)| (k, sort_keys(v))).collect();
            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(xs) => Value::Array(xs.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

/// Write the report atomically: `<path>.tmp` then rename over `path`.
///
/// Parent directories are created as needed.
pub fn save_report(report: &RiskReport, path: &Path) -> Result<(), ReportIoError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }
    }
    let body = to_canonical_json(report)?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, body).map_err(|e| io_err(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| io_err(path, e))?;
    Ok(())
}

/// Missing file is `Ok(None)`. Unreadable or malformed content is an error.
pub fn load_report(path: &Path) -> Result<Option<RiskReport>, ReportIoError> {
    let raw = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(io_err(path, e)),
    };
    let report = serde_json::from_str::<RiskReport>(&raw).map_err(|e| ReportIoError::Parse {
        path: path.display().to_string(),
        msg: e.to_string(),
    })?;
    Ok(Some(report))
}

// ---------------------------------------------------------------------------
// Report sources
// ---------------------------------------------------------------------------

/// Where the MC veto gates read reports from.
///
/// `Ok(None)` = no report under this key (a decision, not an error).
pub trait ReportSource: Send + Sync {
    fn fetch(&self, key: &str) -> Result<Option<RiskReport>, ReportIoError>;
}

/// Reads report files. Relative keys resolve against `root` when set.
#[derive(Debug, Clone, Default)]
pub struct FileReportSource {
    pub root: Option<PathBuf>,
}

impl FileReportSource {
    pub fn new() -> Self {
        Self { root: None }
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    pub fn resolve(&self, key: &str) -> PathBuf {
        let p = Path::new(key);
        match &self.root {
            Some(root) if p.is_relative() => root.join(p),
            _ => p.to_path_buf(),
        }
    }
}

impl ReportSource for FileReportSource {
    fn fetch(&self, key: &str) -> Result<Option<RiskReport>, ReportIoError> {
        load_report(&self.resolve(key))
    }
}

/// In-memory reports keyed by name. Used by tests and by callers that
/// already hold fresh reports.
#[derive(Debug, Default)]
pub struct MemoryReportSource {
    reports: RwLock<BTreeMap<String, RiskReport>>,
}

impl MemoryReportSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: impl Into<String>, report: RiskReport) {
        let mut g = self.reports.write().unwrap_or_else(|p| p.into_inner());
        g.insert(key.into(), report);
    }

    pub fn remove(&self, key: &str) -> Option<RiskReport> {
        let mut g = self.reports.write().unwrap_or_else(|p| p.into_inner());
        g.remove(key)
    }
}

impl ReportSource for MemoryReportSource {
    fn fetch(&self, key: &str) -> Result<Option<RiskReport>, ReportIoError> {
        let g = self.reports.read().unwrap_or_else(|p| p.into_inner());
        Ok(g.get(key).cloned())
    }
}
