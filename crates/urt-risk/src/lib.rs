//! urt-risk
//!
//! Monte Carlo tail-risk engine over R-multiples.
//!
//! - Bootstrap resampling (with replacement) of a historical trade sample
//! - Additive clipped Gaussian slippage per simulated trade
//! - Loss-budget gate: P(max drawdown in cumulative R >= budget) <= threshold
//! - Losing-streak projection for dashboards
//!
//! Deterministic for a fixed (sample, config, seed). Paths are simulated on
//! rayon workers with per-path sub-seeds, so parallel and sequential runs
//! produce the same report bit for bit.

mod engine;
mod persist;
mod sample;
mod types;

pub use engine::{
    max_drawdown_in_cum_r, max_losing_streak, path_seed, percentile, run, run_with, Execution,
    PathFold,
};
pub use persist::{
    load_report, save_report, to_canonical_json, FileReportSource, MemoryReportSource,
    ReportIoError, ReportSource,
};
pub use sample::{load_r_multiples, parse_csv_r, parse_ndjson_r, SampleError, SampleFormat};
pub use types::*;
