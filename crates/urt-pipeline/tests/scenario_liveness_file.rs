use std::sync::Arc;

use chrono::{TimeZone, Utc};
use urt_pipeline::*;
use urt_risk::MemoryReportSource;
use urt_schemas::{FeatureSnapshot, Permission, Regime};

fn feat(price: f64) -> FeatureSnapshot {
    FeatureSnapshot {
        ts_utc: Utc.with_ymd_and_hms(2026, 2, 10, 14, 31, 0).unwrap(),
        instrument: "MES".to_string(),
        price,
        volume: 250.0,
        atr_fast: 2.0,
        atr_slow: 2.5,
        vol_norm: 0.5,
        velocity: 0.3,
        high: None,
        low: None,
    }
}

#[test]
fn scenario_file_sink_keeps_latest_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("status").join("liveness.json");

    {
        let sink = FileLivenessSink::spawn(&path).unwrap();
        let mut p = GatePipeline::from_config(
            &PipelineConfig::default(),
            Arc::new(MemoryReportSource::new()),
            Box::new(sink),
        )
        .unwrap();
        p.step(&feat(5000.0)).unwrap();
        p.step(&feat(5001.25)).unwrap();
        // Dropping the pipeline drops the sink, which joins the writer.
    }

    let raw = std::fs::read_to_string(&path).unwrap();
    let snap: LivenessSnapshot = serde_json::from_str(&raw).unwrap();
    assert_eq!(snap.instrument, "MES");
    assert_eq!(snap.price, 5001.25);
    assert_eq!(snap.regime, Regime::MeanReversion);
    assert_eq!(snap.permission, Permission::Allow);
    assert!(snap.written_at_utc.is_some());
    assert!(!path.with_extension("json.tmp").exists());
}

#[test]
fn scenario_publish_burst_collapses_to_last_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("liveness.json");

    {
        let sink = FileLivenessSink::spawn(&path).unwrap();
        let base = urt_schemas::MarketState::halted(Utc::now(), "MES", "burst");
        for i in 0..10_000u32 {
            sink.publish(LivenessSnapshot::from_state(&base, f64::from(i)));
        }
    }

    let raw = std::fs::read_to_string(&path).unwrap();
    let snap: LivenessSnapshot = serde_json::from_str(&raw).unwrap();
    assert_eq!(snap.price, 9999.0);
    assert_eq!(snap.reason, "burst");
}

#[test]
fn scenario_sink_failure_does_not_change_state() {
    let dir = tempfile::tempdir().unwrap();
    // A directory where the file should be: every write fails.
    let path = dir.path().join("blocked");
    std::fs::create_dir_all(path.join("liveness.json")).unwrap();

    let sink = FileLivenessSink::spawn(path.join("liveness.json")).unwrap();
    let mut p = GatePipeline::from_config(
        &PipelineConfig::default(),
        Arc::new(MemoryReportSource::new()),
        Box::new(sink),
    )
    .unwrap();
    let s = p.step(&feat(5000.0)).unwrap();
    assert_eq!(s.permission, Permission::Allow);
    assert_eq!(s.regime, Regime::Trend);
}

#[test]
fn scenario_disabled_liveness_uses_null_sink() {
    let sink = sink_from_config(&LivenessConfig::default()).unwrap();
    sink.publish(LivenessSnapshot::from_state(
        &urt_schemas::MarketState::halted(Utc::now(), "MES", "x"),
        1.0,
    ));
}
