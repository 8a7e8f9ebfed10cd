//! Monte Carlo veto gates.
//!
//! Both policies read persisted `RiskReport`s through a [`ReportSource`] on
//! every evaluation. Reports are produced out of band by the risk engine.
//!
//! Absolute: the latest report must say `financial_ok`.
//! Drift: the recent report must say `financial_ok`, and its breach
//! probability must not exceed the baseline's by more than the threshold.
//!
//! A report that exists but cannot be read always blocks.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use urt_risk::{ReportIoError, ReportSource, RiskReport};
use urt_schemas::{FeatureSnapshot, Permission};

use crate::types::finite_non_negative;
use crate::{FailPolicy, Gate, GateConfigError, GateContext, GateDecision, GateKind};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum McMode {
    Absolute,
    Drift,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct McGateConfig {
    pub enabled: bool,
    pub mode: McMode,
    pub report_path: String,
    pub recent_path: String,
    pub baseline_path: String,
    pub drift_threshold: f64,
    pub on_missing_report: FailPolicy,
    pub on_missing_recent: FailPolicy,
    pub on_missing_baseline: FailPolicy,
}

impl Default for McGateConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: McMode::Absolute,
            report_path: "out/risk_report.json".to_string(),
            recent_path: "out/risk_report_recent.json".to_string(),
            baseline_path: "out/risk_report_baseline.json".to_string(),
            drift_threshold: 0.05,
            on_missing_report: FailPolicy::Allow,
            on_missing_recent: FailPolicy::Block,
            on_missing_baseline: FailPolicy::Allow,
        }
    }
}

/// Permission + reason from one veto evaluation.
#[derive(Clone, Debug, PartialEq)]
pub struct VetoOutcome {
    pub permission: Permission,
    pub reason: String,
}

impl VetoOutcome {
    fn allow(reason: String) -> Self {
        Self {
            permission: Permission::Allow,
            reason,
        }
    }

    fn block(reason: String) -> Self {
        Self {
            permission: Permission::Block,
            reason,
        }
    }

    fn missing(policy: FailPolicy, what: &str, key: &str) -> Self {
        match policy {
            FailPolicy::Allow => Self::allow(format!("MC:{what}:{key}")),
            FailPolicy::Block => Self::block(format!("MC_FAIL:{what}:{key}")),
        }
    }

    fn unreadable(key: &str, err: &ReportIoError) -> Self {
        warn!(key, error = %err, "risk report unreadable; blocking");
        Self::block(format!("MC_FAIL:report_unreadable:{key}"))
    }
}

fn fmt_p(p: Option<f64>) -> String {
    p.map(|v| format!("{v:.3}")).unwrap_or_else(|| "none".to_string())
}

/// Absolute veto over one fetched report.
pub fn absolute_veto(
    fetched: Result<Option<RiskReport>, ReportIoError>,
    key: &str,
    on_missing: FailPolicy,
) -> VetoOutcome {
    let report = match fetched {
        Ok(Some(r)) => r,
        Ok(None) => return VetoOutcome::missing(on_missing, "no_report", key),
        Err(e) => return VetoOutcome::unreadable(key, &e),
    };
    if !report.financial_ok {
        return VetoOutcome::block(format!("MC_FAIL:{}", report.reason));
    }
    VetoOutcome::allow(format!("MC_OK:{}", report.reason))
}

/// Drift veto. The source is only asked for the baseline when the recent
/// report passes on its own.
pub fn drift_veto(
    source: &dyn ReportSource,
    recent_key: &str,
    baseline_key: &str,
    drift_threshold: f64,
    on_missing_recent: FailPolicy,
    on_missing_baseline: FailPolicy,
) -> VetoOutcome {
    let recent = match source.fetch(recent_key) {
        Ok(Some(r)) => r,
        Ok(None) => return VetoOutcome::missing(on_missing_recent, "no_recent_report", recent_key),
        Err(e) => return VetoOutcome::unreadable(recent_key, &e),
    };
    if !recent.financial_ok {
        return VetoOutcome::block(format!("MC_FAIL:{}", recent.reason));
    }

    let baseline = match source.fetch(baseline_key) {
        Ok(Some(b)) => b,
        Ok(None) => {
            return match on_missing_baseline {
                FailPolicy::Allow => VetoOutcome::allow(format!(
                    "MC_OK:{}|MC_DRIFT:no_baseline:{}",
                    recent.reason, baseline_key
                )),
                FailPolicy::Block => {
                    VetoOutcome::block(format!("MC_FAIL:no_baseline:{baseline_key}"))
                }
            }
        }
        Err(e) => return VetoOutcome::unreadable(baseline_key, &e),
    };

    let (p_recent, p_base) = match (recent.prob_dd_r_ge_budget, baseline.prob_dd_r_ge_budget) {
        (Some(r), Some(b)) => (r, b),
        (r, b) => {
            return VetoOutcome::allow(format!(
                "MC_OK:{}|MC_DRIFT:missing_p_fields:recent={}_base={}",
                recent.reason,
                fmt_p(r),
                fmt_p(b)
            ))
        }
    };

    let drift = p_recent - p_base;
    if drift > drift_threshold {
        return VetoOutcome::block(format!(
            "MC_FAIL_DRIFT:dp={:.3}_gt_{:.3}|p_recent={:.3}|p_base={:.3}",
            drift, drift_threshold, p_recent, p_base
        ));
    }
    VetoOutcome::allow(format!(
        "MC_OK:{}|MC_DRIFT_OK:dp={:.3}_le_{:.3}|p_recent={:.3}|p_base={:.3}",
        recent.reason, drift, drift_threshold, p_recent, p_base
    ))
}

/// Downgrade-only gate wrapping [`absolute_veto`] / [`drift_veto`].
pub struct MonteCarloGate {
    cfg: McGateConfig,
    source: Arc<dyn ReportSource>,
}

impl MonteCarloGate {
    pub fn new(cfg: McGateConfig, source: Arc<dyn ReportSource>) -> Result<Self, GateConfigError> {
        finite_non_negative("monte_carlo", "drift_threshold", cfg.drift_threshold)?;
        Ok(Self { cfg, source })
    }

    pub fn check(&self) -> VetoOutcome {
        match self.cfg.mode {
            McMode::Absolute => absolute_veto(
                self.source.fetch(&self.cfg.report_path),
                &self.cfg.report_path,
                self.cfg.on_missing_report,
            ),
            McMode::Drift => drift_veto(
                self.source.as_ref(),
                &self.cfg.recent_path,
                &self.cfg.baseline_path,
                self.cfg.drift_threshold,
                self.cfg.on_missing_recent,
                self.cfg.on_missing_baseline,
            ),
        }
    }
}

impl Gate for MonteCarloGate {
    fn name(&self) -> &'static str {
        "MC"
    }

    fn kind(&self) -> GateKind {
        GateKind::Downgrade
    }

    fn evaluate(&self, _features: &FeatureSnapshot, _ctx: &GateContext) -> GateDecision {
        if !self.cfg.enabled {
            return GateDecision::downgrade(Permission::Allow, "mc_disabled");
        }
        let out = self.check();
        GateDecision::downgrade(out.permission, out.reason)
    }
}
