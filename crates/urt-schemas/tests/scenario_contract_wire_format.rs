use chrono::{TimeZone, Utc};
use urt_schemas::*;

fn snapshot() -> FeatureSnapshot {
    FeatureSnapshot {
        ts_utc: Utc.with_ymd_and_hms(2026, 1, 5, 14, 30, 0).unwrap(),
        instrument: "MES".to_string(),
        price: 5000.0,
        volume: 1000.0,
        atr_fast: 1.0,
        atr_slow: 2.0,
        vol_norm: 0.5,
        velocity: 0.1,
        high: None,
        low: None,
    }
}

#[test]
fn permission_tighten_never_relaxes() {
    use Permission::*;
    let all = [Allow, Reduce, Block];
    for a in all {
        for b in all {
            let t = a.tighten(b);
            assert!(t >= a && t >= b, "{a} tighten {b} gave {t}");
        }
    }
    assert_eq!(Reduce.tighten(Allow), Reduce);
    assert_eq!(Block.tighten(Reduce), Block);
}

#[test]
fn permission_parse_is_case_insensitive_and_closed() {
    assert_eq!(Permission::parse(" reduce "), Some(Permission::Reduce));
    assert_eq!(Permission::parse("BLOCK"), Some(Permission::Block));
    assert_eq!(Permission::parse("PERMIT"), None);
    assert_eq!(Permission::parse(""), None);
}

#[test]
fn position_state_unknown_or_absent_maps_to_flat() {
    assert_eq!(PositionState::from_raw(None), PositionState::Flat);
    assert_eq!(PositionState::from_raw(Some("no_position")), PositionState::Flat);
    assert_eq!(PositionState::from_raw(Some("sideways")), PositionState::Flat);
    assert_eq!(PositionState::from_raw(Some("pending_long")), PositionState::PendingEntryLong);
    assert_eq!(PositionState::from_raw(Some("SHORT")), PositionState::Short);
}

#[test]
fn enums_serialize_screaming_snake_case() {
    let s = serde_json::to_string(&Regime::MeanReversion).unwrap();
    assert_eq!(s, "\"MEAN_REVERSION\"");
    let a = serde_json::to_string(&Action::EnterShort).unwrap();
    assert_eq!(a, "\"ENTER_SHORT\"");
    let p: Permission = serde_json::from_str("\"REDUCE\"").unwrap();
    assert_eq!(p, Permission::Reduce);
}

#[test]
fn feature_snapshot_missing_field_is_a_contract_fault() {
    // No `velocity`: deserialization must fail rather than default.
    let raw = r#"{"ts_utc":"2026-01-05T14:30:00Z","instrument":"MES","price":1.0,
        "volume":1.0,"atr_fast":1.0,"atr_slow":1.0,"vol_norm":0.1}"#;
    assert!(serde_json::from_str::<FeatureSnapshot>(raw).is_err());

    let bad_ts = r#"{"ts_utc":"yesterday","instrument":"MES","price":1.0,"volume":1.0,
        "atr_fast":1.0,"atr_slow":1.0,"vol_norm":0.1,"velocity":0.0}"#;
    assert!(serde_json::from_str::<FeatureSnapshot>(bad_ts).is_err());
}

#[test]
fn empty_instrument_violates_contract() {
    let mut f = snapshot();
    assert!(f.check_contract().is_ok());
    f.instrument = "  ".to_string();
    assert_eq!(f.check_contract(), Err(ContractFault::EmptyInstrument));
}

#[test]
fn quality_faults_in_fixed_order() {
    let f = snapshot();
    assert_eq!(f.quality_fault(true), None);

    let mut p = snapshot();
    p.price = 0.0;
    p.volume = -1.0;
    assert_eq!(p.quality_fault(true), Some(DataQualityFault::NonPositivePrice));

    let mut v = snapshot();
    v.volume = -1.0;
    assert_eq!(v.quality_fault(true), Some(DataQualityFault::NegativeVolume));

    let mut n = snapshot();
    n.vol_norm = f64::NAN;
    assert_eq!(n.quality_fault(false), Some(DataQualityFault::NonFinite("vol_norm")));

    let mut a = snapshot();
    a.atr_slow = 0.0;
    assert_eq!(a.quality_fault(true), Some(DataQualityFault::NonPositiveAtrSlow));
    assert_eq!(a.quality_fault(false), None);
}

#[test]
fn halted_state_is_fully_closed() {
    let st = MarketState::halted(Utc::now(), "MES", "BAD_DATA:price<=0");
    assert_eq!(st.regime, Regime::Halt);
    assert_eq!(st.permission, Permission::Block);
    assert!(!st.safety_ok && !st.volatility_ok);
    assert_eq!(st.confidence, 0.0);
    assert!(!st.is_tradeable());
}
