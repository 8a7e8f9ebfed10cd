use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use rayon::prelude::*;
use tracing::debug;

use crate::{McConfig, RiskReport};

/// How paths are scheduled. Both produce identical reports.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Execution {
    Sequential,
    Parallel,
}

#[derive(Copy, Clone, Debug)]
struct PathStats {
    dd_r: f64,
    max_ls: u64,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Run the loss-budget Monte Carlo on rayon workers.
pub fn run(r_multiples: &[f64], cfg: &McConfig) -> RiskReport {
    run_with(r_multiples, cfg, Execution::Parallel)
}

/// Run the loss-budget Monte Carlo with an explicit scheduling mode.
///
/// Never panics and never errors: invalid config and insufficient samples
/// come back as refused reports with `financial_ok = false`.
pub fn run_with(r_multiples: &[f64], cfg: &McConfig, exec: Execution) -> RiskReport {
    let r_stream: Vec<f64> = r_multiples.iter().copied().filter(|r| r.is_finite()).collect();
    let n = r_stream.len() as u64;

    if let Err(e) = cfg.validate() {
        return RiskReport::refused(cfg, n, format!("invalid_config:{e}"));
    }

    if n < cfg.min_trades_required || n == 0 {
        return RiskReport::refused(
            cfg,
            n,
            format!(
                "insufficient_trades_for_mc_need>={}_have={}",
                cfg.min_trades_required, n
            ),
        );
    }

    // Sample diagnostics.
    let losses: Vec<f64> = r_stream.iter().copied().filter(|r| cfg.is_loss(*r)).collect();
    let avg_loss_r_mag = if losses.is_empty() {
        None
    } else {
        Some(losses.iter().map(|r| r.abs()).sum::<f64>() / losses.len() as f64)
    };
    let loss_rate = losses.len() as f64 / n as f64;

    // validate() guarantees a finite, non-negative std.
    let noise = if cfg.slippage_enabled() {
        Normal::new(cfg.slippage_r_mean, cfg.slippage_r_std).ok()
    } else {
        None
    };

    let stats: Vec<PathStats> = match exec {
        Execution::Sequential => (0..cfg.n_paths)
            .map(|i| simulate_path(&r_stream, cfg, noise.as_ref(), i))
            .collect(),
        // `collect` on an indexed parallel iterator preserves path order.
        Execution::Parallel => (0..cfg.n_paths)
            .into_par_iter()
            .map(|i| simulate_path(&r_stream, cfg, noise.as_ref(), i))
            .collect(),
    };

    let mut dd_rs: Vec<f64> = Vec::with_capacity(stats.len());
    let mut max_lss: Vec<f64> = Vec::with_capacity(stats.len());
    let mut budget_hits: u64 = 0;
    for s in &stats {
        dd_rs.push(s.dd_r);
        max_lss.push(s.max_ls as f64);
        if s.dd_r >= cfg.loss_budget_r {
            budget_hits += 1;
        }
    }

    let paths = stats.len() as f64;
    let prob_budget = budget_hits as f64 / paths;
    let financial_ok = prob_budget <= cfg.prob_loss_budget_exceed_threshold;
    let reason = if financial_ok {
        "mc_pass".to_string()
    } else {
        format!(
            "mc_fail_prob_ddR_ge_{:.2}={:.3}_gt_{:.2}",
            cfg.loss_budget_r, prob_budget, cfg.prob_loss_budget_exceed_threshold
        )
    };

    debug!(
        n_paths = cfg.n_paths,
        horizon = cfg.horizon_trades,
        sample = n,
        prob_dd_r_ge_budget = prob_budget,
        financial_ok,
        "monte carlo run complete"
    );

    RiskReport {
        n_paths: cfg.n_paths,
        horizon_trades: cfg.horizon_trades,
        n_trades_in_sample: n,
        loss_budget_r: cfg.loss_budget_r,
        prob_dd_r_ge_budget: Some(prob_budget),
        dd_r_mean: Some(dd_rs.iter().sum::<f64>() / paths),
        dd_r_p50: percentile(&dd_rs, 0.50),
        dd_r_p95: percentile(&dd_rs, 0.95),
        dd_r_p99: percentile(&dd_rs, 0.99),
        max_ls_mean: Some(max_lss.iter().sum::<f64>() / paths),
        max_ls_p50: percentile(&max_lss, 0.50),
        max_ls_p95: percentile(&max_lss, 0.95),
        max_ls_p99: percentile(&max_lss, 0.99),
        avg_loss_r_mag,
        loss_rate: Some(loss_rate),
        financial_ok,
        reason,
    }
}

// ---------------------------------------------------------------------------
// Path simulation
// ---------------------------------------------------------------------------

/// Sub-seed for one path: splitmix64 over (run seed, path index).
pub fn path_seed(seed: u64, path_index: u64) -> u64 {
    let mut z = seed ^ path_index.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

fn simulate_path(
    r_stream: &[f64],
    cfg: &McConfig,
    noise: Option<&Normal<f64>>,
    path_index: u64,
) -> PathStats {
    let mut rng = ChaCha8Rng::seed_from_u64(path_seed(cfg.seed, path_index));
    let n = r_stream.len();

    // The path itself is never stored.
    let mut fold = PathFold::new();

    for _ in 0..cfg.horizon_trades {
        let mut r = r_stream[rng.gen_range(0..n)];
        if let Some(dist) = noise {
            let z: f64 = dist.sample(&mut rng);
            r += z.clamp(-cfg.slippage_r_clip, cfg.slippage_r_clip);
        }
        fold.push(r, cfg.is_loss(r));
    }

    PathStats {
        dd_r: fold.max_drawdown(),
        max_ls: fold.max_losing_streak(),
    }
}

/// Running drawdown and losing-streak accumulator over one R sequence.
///
/// The peak starts at zero, so an immediate loss counts as drawdown.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PathFold {
    cum: f64,
    peak: f64,
    max_dd: f64,
    cur_ls: u64,
    max_ls: u64,
}

impl PathFold {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, r: f64, is_loss: bool) {
        self.cum += r;
        if self.cum > self.peak {
            self.peak = self.cum;
        }
        let dd = self.peak - self.cum;
        if dd > self.max_dd {
            self.max_dd = dd;
        }

        if is_loss {
            self.cur_ls += 1;
            self.max_ls = self.max_ls.max(self.cur_ls);
        } else {
            self.cur_ls = 0;
        }
    }

    /// Max peak-to-trough drawdown of the cumulative R curve, in R (>= 0).
    pub fn max_drawdown(&self) -> f64 {
        self.max_dd
    }

    /// Longest run of consecutive losses pushed so far.
    pub fn max_losing_streak(&self) -> u64 {
        self.max_ls
    }
}

// ---------------------------------------------------------------------------
// Statistics helpers
// ---------------------------------------------------------------------------

/// Nearest-rank percentile on the sorted sample.
///
/// Index is `round(q * (n - 1))` (half away from zero), clamped to the sample.
/// Empty input has no percentile.
pub fn percentile(xs: &[f64], q: f64) -> Option<f64> {
    if xs.is_empty() {
        return None;
    }
    let mut sorted = xs.to_vec();
    sorted.sort_by(f64::total_cmp);
    let last = sorted.len() - 1;
    let idx = (q * last as f64).round();
    let idx = if idx.is_nan() || idx < 0.0 {
        0
    } else {
        (idx as usize).min(last)
    };
    Some(sorted[idx])
}

/// Max peak-to-trough drawdown of the cumulative R curve, in R (>= 0).
pub fn max_drawdown_in_cum_r(rs: &[f64]) -> f64 {
    let mut fold = PathFold::new();
    for &r in rs {
        fold.push(r, r < 0.0);
    }
    fold.max_drawdown()
}

/// Longest run of consecutive losses under the configured loss convention.
pub fn max_losing_streak(rs: &[f64], loss_is_r_leq_zero: bool) -> u64 {
    let mut fold = PathFold::new();
    for &r in rs {
        let is_loss = if loss_is_r_leq_zero { r <= 0.0 } else { r < 0.0 };
        fold.push(r, is_loss);
    }
    fold.max_losing_streak()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drawdown_counts_from_zero_peak() {
        assert_eq!(max_drawdown_in_cum_r(&[-1.0, -1.0, 3.0]), 2.0);
        assert_eq!(max_drawdown_in_cum_r(&[2.0, -1.0, -2.0, 1.0]), 3.0);
        assert_eq!(max_drawdown_in_cum_r(&[1.0, 1.0, 1.0]), 0.0);
        assert_eq!(max_drawdown_in_cum_r(&[]), 0.0);
    }

    #[test]
    fn streak_respects_scratch_convention() {
        let rs = [1.0, 0.0, -1.0, -0.5, 2.0, 0.0];
        assert_eq!(max_losing_streak(&rs, true), 3);
        assert_eq!(max_losing_streak(&rs, false), 2);
    }

    #[test]
    fn path_fold_tracks_drawdown_and_streak_together() {
        let mut fold = PathFold::new();
        for r in [2.0, -1.0, -2.0, 0.0, 1.0, -0.5] {
            fold.push(r, r <= 0.0);
        }
        // cum: 2, 1, -1, -1, 0, -0.5 ; peak 2
        assert_eq!(fold.max_drawdown(), 3.0);
        assert_eq!(fold.max_losing_streak(), 3);
    }

    #[test]
    fn path_fold_streak_resets_on_win() {
        let mut fold = PathFold::new();
        fold.push(-1.0, true);
        fold.push(-1.0, true);
        fold.push(5.0, false);
        fold.push(-1.0, true);
        assert_eq!(fold.max_losing_streak(), 2);
        assert_eq!(fold.max_drawdown(), 2.0);
    }

    #[test]
    fn percentile_nearest_rank_rounds_half_away() {
        let xs = [4.0, 1.0, 3.0, 2.0];
        // q * (n-1) = 1.5 -> index 2 (half away), sorted = [1,2,3,4]
        assert_eq!(percentile(&xs, 0.50), Some(3.0));
        assert_eq!(percentile(&xs, 0.0), Some(1.0));
        assert_eq!(percentile(&xs, 1.0), Some(4.0));
        assert_eq!(percentile(&xs, 0.99), Some(4.0));
        assert_eq!(percentile(&[], 0.5), None);
    }

    #[test]
    fn path_seeds_differ_per_path_and_per_run() {
        assert_ne!(path_seed(42, 0), path_seed(42, 1));
        assert_ne!(path_seed(42, 0), path_seed(43, 0));
        assert_eq!(path_seed(7, 99), path_seed(7, 99));
    }
}
