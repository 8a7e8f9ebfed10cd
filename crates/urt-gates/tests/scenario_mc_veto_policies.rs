use std::sync::Arc;

use chrono::{TimeZone, Utc};
use urt_gates::*;
use urt_risk::{McConfig, MemoryReportSource, ReportIoError, ReportSource, RiskReport};
use urt_schemas::{FeatureSnapshot, Permission};

fn report(ok: bool, p: Option<f64>, reason: &str) -> RiskReport {
    let mut r = RiskReport::refused(&McConfig::default(), 100, reason);
    r.n_paths = 10_000;
    r.financial_ok = ok;
    r.prob_dd_r_ge_budget = p;
    r
}

fn feat() -> FeatureSnapshot {
    FeatureSnapshot {
        ts_utc: Utc.with_ymd_and_hms(2026, 3, 2, 15, 0, 0).unwrap(),
        instrument: "MES".to_string(),
        price: 5000.0,
        volume: 1.0,
        atr_fast: 1.0,
        atr_slow: 1.0,
        vol_norm: 0.1,
        velocity: 0.0,
        high: None,
        low: None,
    }
}

struct BrokenSource;

impl ReportSource for BrokenSource {
    fn fetch(&self, key: &str) -> Result<Option<RiskReport>, ReportIoError> {
        Err(ReportIoError::Parse {
            path: key.to_string(),
            msg: "expected value".to_string(),
        })
    }
}

#[test]
fn scenario_absolute_missing_report_follows_policy() {
    let out = absolute_veto(Ok(None), "out/r.json", FailPolicy::Allow);
    assert_eq!(out.permission, Permission::Allow);
    assert_eq!(out.reason, "MC:no_report:out/r.json");

    let out = absolute_veto(Ok(None), "out/r.json", FailPolicy::Block);
    assert_eq!(out.permission, Permission::Block);
    assert_eq!(out.reason, "MC_FAIL:no_report:out/r.json");
}

#[test]
fn scenario_absolute_uses_financial_ok() {
    let out = absolute_veto(Ok(Some(report(false, Some(0.3), "mc_fail_x"))), "k", FailPolicy::Allow);
    assert_eq!(out.permission, Permission::Block);
    assert_eq!(out.reason, "MC_FAIL:mc_fail_x");

    let out = absolute_veto(Ok(Some(report(true, Some(0.01), "mc_pass"))), "k", FailPolicy::Allow);
    assert_eq!(out.permission, Permission::Allow);
    assert_eq!(out.reason, "MC_OK:mc_pass");
}

#[test]
fn scenario_unreadable_report_blocks_even_when_missing_allows() {
    let out = absolute_veto(BrokenSource.fetch("k"), "k", FailPolicy::Allow);
    assert_eq!(out.permission, Permission::Block);
    assert_eq!(out.reason, "MC_FAIL:report_unreadable:k");

    let out = drift_veto(&BrokenSource, "r", "b", 0.05, FailPolicy::Allow, FailPolicy::Allow);
    assert_eq!(out.reason, "MC_FAIL:report_unreadable:r");
}

#[test]
fn scenario_drift_blocks_on_tail_risk_increase() {
    let src = MemoryReportSource::new();
    src.insert("recent", report(true, Some(0.20), "mc_pass"));
    src.insert("baseline", report(true, Some(0.10), "mc_pass"));

    let out = drift_veto(&src, "recent", "baseline", 0.05, FailPolicy::Block, FailPolicy::Allow);
    assert_eq!(out.permission, Permission::Block);
    assert_eq!(out.reason, "MC_FAIL_DRIFT:dp=0.100_gt_0.050|p_recent=0.200|p_base=0.100");
}

#[test]
fn scenario_drift_within_threshold_allows() {
    let src = MemoryReportSource::new();
    src.insert("recent", report(true, Some(0.12), "mc_pass"));
    src.insert("baseline", report(true, Some(0.10), "mc_pass"));

    let out = drift_veto(&src, "recent", "baseline", 0.05, FailPolicy::Block, FailPolicy::Allow);
    assert_eq!(out.permission, Permission::Allow);
    assert!(out.reason.starts_with("MC_OK:mc_pass|MC_DRIFT_OK:dp=0.020_le_0.050"), "{}", out.reason);
}

#[test]
fn scenario_drift_missing_inputs() {
    let src = MemoryReportSource::new();
    let out = drift_veto(&src, "recent", "baseline", 0.05, FailPolicy::Block, FailPolicy::Allow);
    assert_eq!(out.permission, Permission::Block);
    assert_eq!(out.reason, "MC_FAIL:no_recent_report:recent");

    src.insert("recent", report(true, Some(0.2), "mc_pass"));
    let out = drift_veto(&src, "recent", "baseline", 0.05, FailPolicy::Block, FailPolicy::Allow);
    assert_eq!(out.permission, Permission::Allow);
    assert_eq!(out.reason, "MC_OK:mc_pass|MC_DRIFT:no_baseline:baseline");

    src.insert("baseline", report(true, None, "insufficient"));
    let out = drift_veto(&src, "recent", "baseline", 0.05, FailPolicy::Block, FailPolicy::Allow);
    assert_eq!(out.permission, Permission::Allow);
    assert_eq!(out.reason, "MC_OK:mc_pass|MC_DRIFT:missing_p_fields:recent=0.200_base=none");
}

#[test]
fn scenario_drift_failing_recent_blocks_first() {
    let src = MemoryReportSource::new();
    src.insert("recent", report(false, Some(0.4), "mc_fail_prob"));
    let out = drift_veto(&src, "recent", "baseline", 0.05, FailPolicy::Block, FailPolicy::Allow);
    assert_eq!(out.permission, Permission::Block);
    assert_eq!(out.reason, "MC_FAIL:mc_fail_prob");
}

#[test]
fn scenario_gate_wraps_policy_as_downgrade() {
    let src = Arc::new(MemoryReportSource::new());
    src.insert("out/risk_report.json", report(false, Some(0.5), "mc_fail"));

    let gate = MonteCarloGate::new(
        McGateConfig {
            enabled: true,
            ..McGateConfig::default()
        },
        src.clone(),
    )
    .unwrap();
    let d = gate.evaluate(&feat(), &GateContext::default());
    assert_eq!(d, GateDecision::downgrade(Permission::Block, "MC_FAIL:mc_fail"));

    let off = MonteCarloGate::new(McGateConfig::default(), src).unwrap();
    assert_eq!(
        off.evaluate(&feat(), &GateContext::default()),
        GateDecision::downgrade(Permission::Allow, "mc_disabled")
    );
}

#[test]
fn scenario_mc_config_parses_policies() {
    let cfg: McGateConfig = serde_json::from_str(
        r#"{"enabled": true, "mode": "drift", "on_missing_recent": "allow"}"#,
    )
    .unwrap();
    assert_eq!(cfg.mode, McMode::Drift);
    assert_eq!(cfg.on_missing_recent, FailPolicy::Allow);
    assert_eq!(cfg.on_missing_baseline, FailPolicy::Allow);
    assert_eq!(cfg.on_missing_report, FailPolicy::Allow);
}
