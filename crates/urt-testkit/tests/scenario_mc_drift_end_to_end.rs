use std::sync::Arc;

use urt_gates::McMode;
use urt_pipeline::{GatePipeline, NullSink, PipelineConfig};
use urt_risk::{McConfig, MemoryReportSource, RiskReport};
use urt_schemas::{Action, Permission, Regime};
use urt_strategy::{RegimeRouter, RouterConfig};
use urt_testkit::*;

fn report(p: f64) -> RiskReport {
    let mut r = RiskReport::refused(&McConfig::default(), 120, "mc_pass");
    r.n_paths = 10_000;
    r.financial_ok = true;
    r.prob_dd_r_ge_budget = Some(p);
    r
}

fn drift_cfg() -> PipelineConfig {
    let mut cfg = PipelineConfig::default();
    cfg.regime.stub_mode = "trend_only".to_string();
    cfg.monte_carlo.enabled = true;
    cfg.monte_carlo.mode = McMode::Drift;
    cfg.monte_carlo.drift_threshold = 0.05;
    cfg
}

#[test]
fn drift_breach_blocks_and_router_holds() {
    let cfg = drift_cfg();
    let reports = Arc::new(MemoryReportSource::new());
    reports.insert(cfg.monte_carlo.recent_path.clone(), report(0.20));

    let pipeline =
        GatePipeline::from_config(&cfg, reports.clone(), Box::new(NullSink)).expect("pipeline");
    let router = RegimeRouter::new(RouterConfig::default()).expect("router");
    let mut s = Session::new(pipeline, router);

    // No baseline yet: drift check disabled, recent passes.
    let t = s.feed(&FeatureBuilder::new("MES").build()).expect("feed");
    assert_eq!(t.state.permission, Permission::Allow);
    assert!(t.state.reason.contains("MC_DRIFT:no_baseline:"), "{}", t.state.reason);

    // Baseline lands between ticks; the next step reads it.
    reports.insert(cfg.monte_carlo.baseline_path.clone(), report(0.10));
    let t = s
        .feed(&FeatureBuilder::new("MES").minute(1).build())
        .expect("feed");
    assert_eq!(t.state.regime, Regime::Trend);
    assert_eq!(t.state.permission, Permission::Block);
    assert!(
        t.state.reason.ends_with("MC:MC_FAIL_DRIFT:dp=0.100_gt_0.050|p_recent=0.200|p_base=0.100"),
        "{}",
        t.state.reason
    );
    assert_eq!(t.signal.action, Action::Hold);
    assert_eq!(t.signal.reason, "router_veto_permission_BLOCK");
}

#[test]
fn missing_recent_blocks_by_default() {
    let cfg = drift_cfg();
    let pipeline = GatePipeline::from_config(
        &cfg,
        Arc::new(MemoryReportSource::new()),
        Box::new(NullSink),
    )
    .expect("pipeline");
    let router = RegimeRouter::new(RouterConfig::default()).expect("router");
    let mut s = Session::new(pipeline, router);

    let t = s.feed(&FeatureBuilder::new("MES").build()).expect("feed");
    assert_eq!(t.state.permission, Permission::Block);
    assert!(t.state.reason.contains("MC_FAIL:no_recent_report:"));
}

#[test]
fn engine_output_feeds_absolute_gate() {
    let wins = vec![1.5; 50];
    let r = urt_risk::run(&wins, &McConfig {
        n_paths: 500,
        ..McConfig::default()
    });
    assert!(r.financial_ok);
    assert_eq!(r.prob_dd_r_ge_budget, Some(0.0));

    let mut cfg = PipelineConfig::default();
    cfg.monte_carlo.enabled = true;
    let reports = Arc::new(MemoryReportSource::new());
    reports.insert(cfg.monte_carlo.report_path.clone(), r);

    let mut p = GatePipeline::from_config(&cfg, reports, Box::new(NullSink)).expect("pipeline");
    let s = p.step(&FeatureBuilder::new("MES").build()).expect("step");
    assert_eq!(s.permission, Permission::Allow);
    assert!(s.reason.ends_with("MC:MC_OK:mc_pass"), "{}", s.reason);
}
