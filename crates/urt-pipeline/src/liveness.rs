use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use urt_schemas::{MarketState, Permission, Regime};

use crate::LivenessConfig;

/// Status document handed to a liveness sink once per tick.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LivenessSnapshot {
    pub ts_utc: DateTime<Utc>,
    /// Filled by the writer at write time.
    pub written_at_utc: Option<DateTime<Utc>>,
    pub instrument: String,
    pub price: f64,
    pub regime: Regime,
    pub permission: Permission,
    pub reason: String,
    pub safety_ok: bool,
    pub volatility_ok: bool,
    pub early_exit_active: bool,
    pub confidence: f64,
}

impl LivenessSnapshot {
    pub fn from_state(state: &MarketState, price: f64) -> Self {
        Self {
            ts_utc: state.ts_utc,
            written_at_utc: None,
            instrument: state.instrument.clone(),
            price,
            regime: state.regime,
            permission: state.permission,
            reason: state.reason.clone(),
            safety_ok: state.safety_ok,
            volatility_ok: state.volatility_ok,
            early_exit_active: state.early_exit_active,
            confidence: state.confidence,
        }
    }
}

/// Fire-and-forget consumer of liveness snapshots. Must not block or fail.
pub trait LivenessSink: Send {
    fn publish(&self, snapshot: LivenessSnapshot);
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl LivenessSink for NullSink {
    fn publish(&self, _snapshot: LivenessSnapshot) {}
}

/// File sink when enabled, [`NullSink`] otherwise.
pub fn sink_from_config(cfg: &LivenessConfig) -> std::io::Result<Box<dyn LivenessSink>> {
    if !cfg.enabled {
        return Ok(Box::new(NullSink));
    }
    Ok(Box::new(FileLivenessSink::spawn(&cfg.path)?))
}

// ---------------------------------------------------------------------------
// File sink
// ---------------------------------------------------------------------------

/// Overwrites one JSON status file from a background thread.
///
/// Holds at most one pending snapshot: a publish while a write is in flight
/// replaces it. Dropping the sink flushes the last snapshot and joins the
/// writer.
pub struct FileLivenessSink {
    path: PathBuf,
    latest: Arc<Mutex<Option<LivenessSnapshot>>>,
    wake: Option<SyncSender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl FileLivenessSink {
    pub fn spawn(path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let path = path.into();
        let latest = Arc::new(Mutex::new(None));
        let (wake, rx) = mpsc::sync_channel::<()>(1);
        let target = path.clone();
        let slot = Arc::clone(&latest);
        let worker = std::thread::Builder::new()
            .name("urt-liveness".to_string())
            .spawn(move || writer_loop(&target, &slot, rx))?;
        Ok(Self {
            path,
            latest,
            wake: Some(wake),
            worker: Some(worker),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LivenessSink for FileLivenessSink {
    fn publish(&self, snapshot: LivenessSnapshot) {
        let Some(wake) = &self.wake else {
            return;
        };
        *self.latest.lock().unwrap_or_else(PoisonError::into_inner) = Some(snapshot);
        match wake.try_send(()) {
            // A wakeup is already pending; the writer will pick up this snapshot.
            Ok(()) | Err(TrySendError::Full(())) => {}
            Err(TrySendError::Disconnected(())) => {
                warn!(path = %self.path.display(), "liveness writer gone; snapshot dropped");
            }
        }
    }
}

impl Drop for FileLivenessSink {
    fn drop(&mut self) {
        // Closing the channel ends the writer loop after the pending wakeup.
        self.wake.take();
        if let Some(h) = self.worker.take() {
            if h.join().is_err() {
                warn!(path = %self.path.display(), "liveness writer panicked");
            }
        }
    }
}

fn writer_loop(path: &Path, slot: &Mutex<Option<LivenessSnapshot>>, rx: Receiver<()>) {
    while rx.recv().is_ok() {
        let Some(mut latest) = slot.lock().unwrap_or_else(PoisonError::into_inner).take() else {
            continue;
        };
        latest.written_at_utc = Some(Utc::now());
        if let Err(e) = write_atomic(path, &latest) {
            warn!(path = %path.display(), error = %e, "liveness write failed");
        }
    }
}

/// `<path>.tmp` then rename over `path`.
pub fn write_atomic(path: &Path, snapshot: &LivenessSnapshot) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let payload = serde_json::to_vec_pretty(snapshot)?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    {
        let mut f = File::create(&tmp)?;
        f.write_all(&payload)?;
        f.sync_all()?;
    }

    // Windows refuses to rename over an existing file.
    if let Err(err) = fs::rename(&tmp, path) {
        if path.exists() {
            fs::remove_file(path)?;
            fs::rename(&tmp, path)?;
        } else {
            return Err(err);
        }
    }
    Ok(())
}
