use std::path::Path;
use std::sync::Arc;

use urt_pipeline::{GatePipeline, NullSink, PipelineConfig};
use urt_risk::MemoryReportSource;
use urt_schemas::{Action, Permission, Regime};
use urt_strategy::{RegimeRouter, RouterConfig};
use urt_testkit::*;

fn trend_session(cfg: PipelineConfig) -> Session {
    let pipeline = GatePipeline::from_config(
        &cfg,
        Arc::new(MemoryReportSource::new()),
        Box::new(NullSink),
    )
    .expect("pipeline");
    let router = RegimeRouter::new(RouterConfig::default()).expect("router");
    Session::new(pipeline, router)
}

fn trend_only() -> PipelineConfig {
    let mut cfg = PipelineConfig::default();
    cfg.regime.stub_mode = "trend_only".to_string();
    cfg
}

#[test]
fn fixture_replay_freezes_box_then_enters_long() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("fixtures")
        .join("mes_box_breakout.csv");
    let features = load_features_csv(&path).expect("fixture");
    assert_eq!(features.len(), 27);

    let mut s = trend_session(trend_only());
    let ticks = s.feed_all(&features).expect("feed");

    for t in &ticks {
        assert_eq!(t.state.regime, Regime::Trend);
        assert_eq!(t.state.permission, Permission::Allow);
    }

    assert_eq!(ticks[0].signal.reason, "darvas_warming_up_need_20_bars");
    assert_eq!(ticks[19].signal.reason, "darvas_warming_up_need_1_bars");
    assert_eq!(
        ticks[20].signal.reason,
        "darvas_box_forming|confirm=1/5|cand_top=5001.0|cand_bot=4999.0"
    );
    assert_eq!(
        ticks[24].signal.reason,
        "darvas_box_frozen|top=5001.0|bot=4999.0|confirm=5/5"
    );
    assert_eq!(ticks[24].signal.tag.as_deref(), Some("box_frozen"));
    assert_eq!(
        ticks[25].signal.reason,
        "darvas_box_active_no_breakout|age=1|top=5001.0|bot=4999.0"
    );

    let entry = &ticks[26].signal;
    assert_eq!(entry.action, Action::EnterLong);
    assert_eq!(entry.strength, 1.0);
    assert_eq!(entry.strategy, "BoxBreakout");
    assert_eq!(entry.reason, "darvas_breakout_up_close_over_top=5001.0");
    assert!(ticks[..26].iter().all(|t| t.signal.action == Action::Hold));
}

#[test]
fn open_position_suppresses_entry() {
    let mut s = trend_session(trend_only());
    s.feed_all(&flat_bars("MES", 26, 5001.0, 4999.0, 5000.0))
        .expect("feed");

    s.router_mut().set_position("MES", Some("LONG"));
    let t = s
        .feed(
            &FeatureBuilder::new("MES")
                .minute(26)
                .bar(5003.0, 5000.0, 5002.0)
                .build(),
        )
        .expect("feed");
    assert_eq!(t.signal.action, Action::Hold);
    assert_eq!(t.signal.reason, "breakout_veto_not_flat:LONG");

    // Box survived the veto; flat again, the next breakout bar enters.
    s.router_mut().set_position("MES", None);
    let t = s
        .feed(
            &FeatureBuilder::new("MES")
                .minute(27)
                .bar(5003.0, 5000.0, 5002.0)
                .build(),
        )
        .expect("feed");
    assert_eq!(t.signal.action, Action::EnterLong);
}

#[test]
fn reduced_permission_vetoes_breakout() {
    let mut cfg = trend_only();
    cfg.early_exit.force_active = true;
    let mut s = trend_session(cfg);

    let ticks = s
        .feed_all(&flat_bars("MES", 30, 5001.0, 4999.0, 5000.0))
        .expect("feed");
    for t in &ticks {
        assert_eq!(t.state.permission, Permission::Reduce);
        assert!(t.state.early_exit_active);
        assert_eq!(t.signal.reason, "router_veto_permission_REDUCE");
        assert_eq!(t.signal.tag.as_deref(), Some("veto"));
    }
    // Vetoed ticks never reach the detector.
    assert!(s.router_mut().detectors().get("MES").is_none());
}

#[test]
fn alternating_regime_splits_routes() {
    let mut s = trend_session(PipelineConfig::default());
    let ticks = s
        .feed_all(&flat_bars("MES", 4, 5001.0, 4999.0, 5000.0))
        .expect("feed");
    assert_eq!(ticks[0].signal.strategy, "BoxBreakout");
    assert_eq!(ticks[1].signal.strategy, "MeanReversion");
    assert_eq!(ticks[1].signal.reason, "mean_reversion_stub_hold");
    assert_eq!(ticks[1].signal.tag.as_deref(), Some("stub"));
    assert_eq!(
        s.router_mut()
            .detectors()
            .get("MES")
            .map(|d| d.bars_seen()),
        Some(2)
    );
}
