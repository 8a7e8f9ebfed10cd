//! urt-testkit
//!
//! Builders, stand-in gates and sinks, and a pipeline + router session for
//! end-to-end scenarios.

use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, TimeZone, Utc};
use urt_schemas::FeatureSnapshot;

mod session;
mod stubs;

pub use session::{Session, Tick};
pub use stubs::{CountingGate, RecordingSink};

/// Fixed epoch for fixtures: 2026-02-10 14:31:00 UTC.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 2, 10, 14, 31, 0)
        .single()
        .unwrap_or_default()
}

/// Fluent builder over a healthy default snapshot.
#[derive(Clone, Debug)]
pub struct FeatureBuilder {
    f: FeatureSnapshot,
}

impl FeatureBuilder {
    pub fn new(instrument: &str) -> Self {
        Self {
            f: FeatureSnapshot {
                ts_utc: t0(),
                instrument: instrument.to_string(),
                price: 5000.0,
                volume: 250.0,
                atr_fast: 2.0,
                atr_slow: 2.5,
                vol_norm: 0.5,
                velocity: 0.3,
                high: None,
                low: None,
            },
        }
    }

    /// `ts_utc` = t0 + `n` minutes.
    pub fn minute(mut self, n: i64) -> Self {
        self.f.ts_utc = t0() + Duration::minutes(n);
        self
    }

    pub fn price(mut self, p: f64) -> Self {
        self.f.price = p;
        self
    }

    /// high / low / close in one go; close is `price`.
    pub fn bar(mut self, high: f64, low: f64, close: f64) -> Self {
        self.f.high = Some(high);
        self.f.low = Some(low);
        self.f.price = close;
        self
    }

    pub fn volume(mut self, v: f64) -> Self {
        self.f.volume = v;
        self
    }

    pub fn vol_norm(mut self, v: f64) -> Self {
        self.f.vol_norm = v;
        self
    }

    pub fn velocity(mut self, v: f64) -> Self {
        self.f.velocity = v;
        self
    }

    pub fn atr(mut self, fast: f64, slow: f64) -> Self {
        self.f.atr_fast = fast;
        self.f.atr_slow = slow;
        self
    }

    pub fn build(self) -> FeatureSnapshot {
        self.f
    }
}

/// `n` identical bars one minute apart.
pub fn flat_bars(instrument: &str, n: usize, high: f64, low: f64, close: f64) -> Vec<FeatureSnapshot> {
    (0..n)
        .map(|i| {
            FeatureBuilder::new(instrument)
                .minute(i as i64)
                .bar(high, low, close)
                .build()
        })
        .collect()
}

/// Feature rows with a header naming `FeatureSnapshot` fields.
/// `high` / `low` columns are optional; blank cells are absent values.
pub fn load_features_csv(path: &Path) -> Result<Vec<FeatureSnapshot>> {
    let mut rdr = csv::Reader::from_path(path)
        .with_context(|| format!("open features csv: {}", path.display()))?;
    let mut out = Vec::new();
    for (i, row) in rdr.deserialize::<FeatureSnapshot>().enumerate() {
        // Header is line 1.
        out.push(row.with_context(|| format!("features csv line {}", i + 2))?);
    }

    for w in out.windows(2) {
        if w[0].instrument == w[1].instrument && w[0].ts_utc >= w[1].ts_utc {
            bail!(
                "features not strictly increasing for {} at {}",
                w[1].instrument,
                w[1].ts_utc
            );
        }
    }
    Ok(out)
}
