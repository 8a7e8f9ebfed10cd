use std::collections::BTreeMap;

use tracing::debug;

use urt_schemas::{FeatureSnapshot, MarketState, Permission, PositionState, Regime, Signal};

use crate::{Bar, BreakoutConfigError, DetectorBook, RouterConfig};

const ROUTER: &str = "Router";

/// A regime-specific signal source the router can delegate to.
pub trait Strategy: Send {
    fn name(&self) -> &str;

    fn decide(&mut self, features: &FeatureSnapshot, state: &MarketState) -> Signal;
}

/// Mean-reversion slot. Placeholder: always HOLD.
#[derive(Clone, Debug)]
pub struct MeanReversionStrategy {
    name: String,
}

impl Default for MeanReversionStrategy {
    fn default() -> Self {
        Self {
            name: "MeanReversion".to_string(),
        }
    }
}

impl Strategy for MeanReversionStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn decide(&mut self, features: &FeatureSnapshot, _state: &MarketState) -> Signal {
        Signal::hold(
            features.ts_utc,
            features.instrument.clone(),
            self.name.clone(),
            "mean_reversion_stub_hold",
            Some("stub"),
        )
    }
}

/// Routes a gated `MarketState` to a strategy.
///
/// Order: permission veto, instrument mismatch veto, then by regime
/// (TREND -> breakout, MEAN_REVERSION -> mean reversion, else no route).
pub struct RegimeRouter {
    book: DetectorBook,
    mean_reversion: Box<dyn Strategy>,
    positions: BTreeMap<String, PositionState>,
}

impl RegimeRouter {
    pub fn new(cfg: RouterConfig) -> Result<Self, BreakoutConfigError> {
        Ok(Self {
            book: DetectorBook::new(cfg.breakout)?,
            mean_reversion: Box::new(MeanReversionStrategy::default()),
            positions: BTreeMap::new(),
        })
    }

    pub fn with_mean_reversion(mut self, strategy: Box<dyn Strategy>) -> Self {
        self.mean_reversion = strategy;
        self
    }

    /// Record the bookkeeping layer's position string for an instrument.
    pub fn set_position(&mut self, instrument: &str, raw: Option<&str>) {
        self.set_position_state(instrument, PositionState::from_raw(raw));
    }

    pub fn set_position_state(&mut self, instrument: &str, position: PositionState) {
        self.positions.insert(instrument.to_string(), position);
    }

    /// Unknown instruments are FLAT.
    pub fn position(&self, instrument: &str) -> PositionState {
        self.positions.get(instrument).copied().unwrap_or_default()
    }

    pub fn detectors(&self) -> &DetectorBook {
        &self.book
    }

    pub fn detectors_mut(&mut self) -> &mut DetectorBook {
        &mut self.book
    }

    pub fn route(&mut self, features: &FeatureSnapshot, state: &MarketState) -> Signal {
        if state.permission != Permission::Allow {
            return Signal::hold(
                features.ts_utc,
                features.instrument.clone(),
                ROUTER,
                format!("router_veto_permission_{}", state.permission),
                Some("veto"),
            );
        }

        if state.instrument != features.instrument {
            return Signal::hold(
                features.ts_utc,
                features.instrument.clone(),
                ROUTER,
                format!(
                    "router_veto_instrument_mismatch:state={}_features={}",
                    state.instrument, features.instrument
                ),
                Some("veto"),
            );
        }

        match state.regime {
            Regime::Trend => self.route_breakout(features),
            Regime::MeanReversion => self.mean_reversion.decide(features, state),
            other => Signal::hold(
                features.ts_utc,
                features.instrument.clone(),
                ROUTER,
                format!("router_no_route_{}", other),
                Some("no_route"),
            ),
        }
    }

    fn route_breakout(&mut self, features: &FeatureSnapshot) -> Signal {
        let close = features.price;
        let bar = Bar::new(
            features.high.unwrap_or(close),
            features.low.unwrap_or(close),
            close,
        );
        let position = self.position(&features.instrument);
        let det = self.book.get_mut(&features.instrument);
        let d = det.on_bar(bar, position);

        if d.action.is_entry() {
            debug!(
                instrument = %features.instrument,
                action = %d.action,
                reason = %d.reason,
                "breakout entry"
            );
        }

        Signal {
            ts_utc: features.ts_utc,
            instrument: features.instrument.clone(),
            strategy: det.config().strategy_name.clone(),
            action: d.action,
            strength: d.strength,
            reason: d.reason,
            tag: Some(d.tag.to_string()),
        }
    }
}
