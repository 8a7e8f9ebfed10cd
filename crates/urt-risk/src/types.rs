use serde::{Deserialize, Serialize};
use std::fmt;

/// Upper bound on simulated paths per run (admission control).
pub const MAX_PATHS: u64 = 1_000_000;

/// Monte Carlo configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct McConfig {
    pub n_paths: u64,
    /// Trades per simulated path.
    pub horizon_trades: u64,
    pub seed: u64,

    // Additive slippage noise in R, applied per simulated trade.
    pub slippage_r_mean: f64,
    pub slippage_r_std: f64,
    /// Noise is clamped to [-clip, +clip].
    pub slippage_r_clip: f64,

    /// Loss budget in R (peak-to-trough drawdown of cumulative R over the horizon).
    pub loss_budget_r: f64,
    /// Gate fails when P(DD_R >= budget) exceeds this.
    pub prob_loss_budget_exceed_threshold: f64,

    /// `true`: R <= 0 counts as a loss (scratches included). `false`: only R < 0.
    pub loss_is_r_leq_zero: bool,

    pub min_trades_required: u64,
}

impl Default for McConfig {
    fn default() -> Self {
        Self {
            n_paths: 10_000,
            horizon_trades: 100,
            seed: 42,
            slippage_r_mean: 0.0,
            slippage_r_std: 0.0,
            slippage_r_clip: 2.0,
            loss_budget_r: 7.0,
            prob_loss_budget_exceed_threshold: 0.10,
            loss_is_r_leq_zero: true,
            min_trades_required: 30,
        }
    }
}

/// Why a config was refused.
#[derive(Clone, Debug, PartialEq)]
pub enum McConfigError {
    ZeroPaths,
    TooManyPaths { got: u64, max: u64 },
    ZeroHorizon,
    BadSlippage(&'static str),
    BadLossBudget(f64),
    BadThreshold(f64),
}

impl fmt::Display for McConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            McConfigError::ZeroPaths => write!(f, "n_paths must be > 0"),
            McConfigError::TooManyPaths { got, max } => {
                write!(f, "n_paths={got} exceeds max={max}")
            }
            McConfigError::ZeroHorizon => write!(f, "horizon_trades must be > 0"),
            McConfigError::BadSlippage(field) => {
                write!(f, "{field} must be finite (std/clip must be >= 0)")
            }
            McConfigError::BadLossBudget(v) => write!(f, "loss_budget_r must be finite and > 0 (got {v})"),
            McConfigError::BadThreshold(v) => {
                write!(f, "prob_loss_budget_exceed_threshold must be in [0,1] (got {v})")
            }
        }
    }
}

impl std::error::Error for McConfigError {}

impl McConfig {
    pub fn validate(&self) -> Result<(), McConfigError> {
        if self.n_paths == 0 {
            return Err(McConfigError::ZeroPaths);
        }
        if self.n_paths > MAX_PATHS {
            return Err(McConfigError::TooManyPaths {
                got: self.n_paths,
                max: MAX_PATHS,
            });
        }
        if self.horizon_trades == 0 {
            return Err(McConfigError::ZeroHorizon);
        }
        if !self.slippage_r_mean.is_finite() {
            return Err(McConfigError::BadSlippage("slippage_r_mean"));
        }
        if !self.slippage_r_std.is_finite() || self.slippage_r_std < 0.0 {
            return Err(McConfigError::BadSlippage("slippage_r_std"));
        }
        if !self.slippage_r_clip.is_finite() || self.slippage_r_clip < 0.0 {
            return Err(McConfigError::BadSlippage("slippage_r_clip"));
        }
        if !self.loss_budget_r.is_finite() || self.loss_budget_r <= 0.0 {
            return Err(McConfigError::BadLossBudget(self.loss_budget_r));
        }
        let t = self.prob_loss_budget_exceed_threshold;
        if !t.is_finite() || !(0.0..=1.0).contains(&t) {
            return Err(McConfigError::BadThreshold(t));
        }
        Ok(())
    }

    /// Slippage is skipped entirely when it cannot move a draw.
    pub fn slippage_enabled(&self) -> bool {
        !(self.slippage_r_std <= 0.0 && self.slippage_r_mean == 0.0)
    }

    pub fn is_loss(&self, r: f64) -> bool {
        if self.loss_is_r_leq_zero {
            r <= 0.0
        } else {
            r < 0.0
        }
    }
}

/// Persisted Monte Carlo risk report.
///
/// Field names are the JSON keys. Statistics that could not be computed
/// (no simulation ran, or the sample had no losses) are `None` / `null`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RiskReport {
    pub n_paths: u64,
    pub horizon_trades: u64,
    pub n_trades_in_sample: u64,

    // Loss budget (gate input)
    pub loss_budget_r: f64,
    pub prob_dd_r_ge_budget: Option<f64>,

    pub dd_r_mean: Option<f64>,
    pub dd_r_p50: Option<f64>,
    pub dd_r_p95: Option<f64>,
    pub dd_r_p99: Option<f64>,

    // Losing-streak projection (dashboard)
    pub max_ls_mean: Option<f64>,
    pub max_ls_p50: Option<f64>,
    pub max_ls_p95: Option<f64>,
    pub max_ls_p99: Option<f64>,

    // Sample diagnostics
    pub avg_loss_r_mag: Option<f64>,
    pub loss_rate: Option<f64>,

    pub financial_ok: bool,
    pub reason: String,
}

impl RiskReport {
    /// A report that ran no simulation and fails the gate.
    pub fn refused(cfg: &McConfig, n_trades_in_sample: u64, reason: impl Into<String>) -> Self {
        Self {
            n_paths: 0,
            horizon_trades: cfg.horizon_trades,
            n_trades_in_sample,
            loss_budget_r: cfg.loss_budget_r,
            prob_dd_r_ge_budget: None,
            dd_r_mean: None,
            dd_r_p50: None,
            dd_r_p95: None,
            dd_r_p99: None,
            max_ls_mean: None,
            max_ls_p50: None,
            max_ls_p95: None,
            max_ls_p99: None,
            avg_loss_r_mag: None,
            loss_rate: None,
            financial_ok: false,
            reason: reason.into(),
        }
    }

    pub fn simulated(&self) -> bool {
        self.n_paths > 0
    }
}
