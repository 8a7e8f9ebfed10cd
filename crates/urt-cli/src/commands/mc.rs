//! `urt mc ...`: batch risk run and file-based veto checks.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::Args;
use tracing::info;

use urt_gates::{absolute_veto, drift_veto, McGateConfig, VetoOutcome};
use urt_risk::{load_r_multiples, load_report, save_report, FileReportSource, McConfig, SampleFormat};

use super::{exit_for, exit_for_permission, RISK_ENGINE_POINTER};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// R-multiple sample (CSV or NDJSON)
    #[arg(long)]
    pub input: PathBuf,

    /// csv | ndjson; inferred from the extension when omitted
    #[arg(long)]
    pub format: Option<String>,

    /// CSV column holding R
    #[arg(long = "r-col", default_value = "R")]
    pub r_col: String,

    /// NDJSON key holding R
    #[arg(long = "r-key", default_value = "R")]
    pub r_key: String,

    #[arg(long, default_value = "out/risk_report.json")]
    pub out: PathBuf,

    /// Layered YAML whose `risk_engine` section seeds the engine config
    #[arg(long = "config")]
    pub config_paths: Vec<String>,

    #[arg(long)]
    pub paths: Option<u64>,

    #[arg(long)]
    pub horizon: Option<u64>,

    #[arg(long)]
    pub seed: Option<u64>,

    #[arg(long = "slip-mean")]
    pub slip_mean: Option<f64>,

    #[arg(long = "slip-std")]
    pub slip_std: Option<f64>,

    #[arg(long = "slip-clip")]
    pub slip_clip: Option<f64>,

    /// Loss budget in R
    #[arg(long = "budget-r")]
    pub budget_r: Option<f64>,

    /// Max tolerated P(DD_R >= budget)
    #[arg(long = "p-budget")]
    pub p_budget: Option<f64>,

    /// Count only R < 0 as a loss (default: R <= 0)
    #[arg(long = "loss-lt-zero", default_value_t = false)]
    pub loss_lt_zero: bool,

    #[arg(long = "min-trades")]
    pub min_trades: Option<u64>,
}

impl RunArgs {
    fn engine_config(&self) -> Result<McConfig> {
        let mut cfg = if self.config_paths.is_empty() {
            McConfig::default()
        } else {
            urt_config::load_layered_yaml(&self.config_paths)?.section(RISK_ENGINE_POINTER)?
        };
        if let Some(v) = self.paths {
            cfg.n_paths = v;
        }
        if let Some(v) = self.horizon {
            cfg.horizon_trades = v;
        }
        if let Some(v) = self.seed {
            cfg.seed = v;
        }
        if let Some(v) = self.slip_mean {
            cfg.slippage_r_mean = v;
        }
        if let Some(v) = self.slip_std {
            cfg.slippage_r_std = v;
        }
        if let Some(v) = self.slip_clip {
            cfg.slippage_r_clip = v;
        }
        if let Some(v) = self.budget_r {
            cfg.loss_budget_r = v;
        }
        if let Some(v) = self.p_budget {
            cfg.prob_loss_budget_exceed_threshold = v;
        }
        if self.loss_lt_zero {
            cfg.loss_is_r_leq_zero = false;
        }
        if let Some(v) = self.min_trades {
            cfg.min_trades_required = v;
        }
        Ok(cfg)
    }

    fn sample_format(&self) -> Result<SampleFormat> {
        match &self.format {
            None => Ok(SampleFormat::infer(&self.input)),
            Some(raw) => match SampleFormat::parse(raw) {
                Some(f) => Ok(f),
                None => bail!("invalid --format '{raw}'. expected one of: csv | ndjson"),
            },
        }
    }
}

pub fn run(args: RunArgs) -> Result<ExitCode> {
    let cfg = args.engine_config()?;
    let format = args.sample_format()?;
    let field = match format {
        SampleFormat::Csv => &args.r_col,
        SampleFormat::Ndjson => &args.r_key,
    };

    let rs = load_r_multiples(&args.input, format, field)
        .with_context(|| format!("load R sample {}", args.input.display()))?;

    let report = urt_risk::run(&rs, &cfg);
    save_report(&report, &args.out)
        .with_context(|| format!("write report {}", args.out.display()))?;

    info!(
        out = %args.out.display(),
        n_paths = report.n_paths,
        financial_ok = report.financial_ok,
        "risk report written"
    );

    println!("financial_ok={} reason={}", report.financial_ok, report.reason);
    println!(
        "n_trades_in_sample={} n_paths={} horizon_trades={}",
        report.n_trades_in_sample, report.n_paths, report.horizon_trades
    );
    println!(
        "prob_dd_r_ge_budget={} loss_budget_r={}",
        fmt_opt(report.prob_dd_r_ge_budget),
        report.loss_budget_r
    );
    println!(
        "dd_r_p50={} dd_r_p95={} dd_r_p99={}",
        fmt_opt(report.dd_r_p50),
        fmt_opt(report.dd_r_p95),
        fmt_opt(report.dd_r_p99)
    );
    println!(
        "max_ls_p50={} max_ls_p95={} max_ls_p99={}",
        fmt_opt(report.max_ls_p50),
        fmt_opt(report.max_ls_p95),
        fmt_opt(report.max_ls_p99)
    );
    println!("report_path={}", args.out.display());

    Ok(exit_for(report.financial_ok))
}

pub fn veto(report: &str) -> Result<ExitCode> {
    let defaults = McGateConfig::default();
    let outcome = absolute_veto(load_report(Path::new(report)), report, defaults.on_missing_report);
    Ok(print_outcome(&outcome))
}

pub fn drift(recent: &str, baseline: &str, threshold: f64) -> Result<ExitCode> {
    if !threshold.is_finite() || threshold < 0.0 {
        bail!("--threshold must be finite and >= 0 (got {threshold})");
    }
    let defaults = McGateConfig::default();
    let outcome = drift_veto(
        &FileReportSource::new(),
        recent,
        baseline,
        threshold,
        defaults.on_missing_recent,
        defaults.on_missing_baseline,
    );
    Ok(print_outcome(&outcome))
}

fn print_outcome(o: &VetoOutcome) -> ExitCode {
    println!("permission={} reason={}", o.permission, o.reason);
    exit_for_permission(o.permission)
}

fn fmt_opt(v: Option<f64>) -> String {
    v.map(|x| format!("{x:.4}")).unwrap_or_else(|| "null".to_string())
}
