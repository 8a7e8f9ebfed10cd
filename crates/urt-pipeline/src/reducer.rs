use chrono::{DateTime, Utc};

use urt_gates::StateFlag;
use urt_schemas::{FeatureSnapshot, MarketState, Permission, Regime};

/// Separator between reason segments.
pub const REASON_SEP: &str = ";";

fn segment(name: &str, reason: &str) -> String {
    format!("{name}:{reason}")
}

/// Before regime inference. Only hard-gate outcomes can be recorded.
#[derive(Clone, Debug)]
pub struct HardStage {
    ts_utc: DateTime<Utc>,
    instrument: String,
    safety_ok: bool,
    volatility_ok: bool,
    trail: Vec<String>,
}

impl HardStage {
    pub fn new(features: &FeatureSnapshot) -> Self {
        Self {
            ts_utc: features.ts_utc,
            instrument: features.instrument.clone(),
            safety_ok: false,
            volatility_ok: false,
            trail: Vec::new(),
        }
    }

    pub fn pass(&mut self, name: &str, flag: Option<StateFlag>, reason: &str) {
        match flag {
            Some(StateFlag::Safety) => self.safety_ok = true,
            Some(StateFlag::Volatility) => self.volatility_ok = true,
            None => {}
        }
        self.trail.push(segment(name, reason));
    }

    /// Terminal failure. The failing segment leads the trail.
    pub fn fail(self, name: &str, regime: Regime, reason: &str) -> MarketState {
        let mut trail = Vec::with_capacity(self.trail.len() + 1);
        trail.push(segment(name, reason));
        trail.extend(self.trail);
        MarketState {
            ts_utc: self.ts_utc,
            instrument: self.instrument,
            regime,
            permission: Permission::Block,
            safety_ok: self.safety_ok,
            volatility_ok: self.volatility_ok,
            early_exit_active: false,
            confidence: 0.0,
            reason: trail.join(REASON_SEP),
        }
    }

    /// Integrity failure of the chain itself: HALT with every flag cleared.
    pub fn abort(self, reason: &str) -> MarketState {
        let trail = std::iter::once(segment("PIPELINE", reason)).chain(self.trail);
        MarketState::halted(
            self.ts_utc,
            self.instrument,
            trail.collect::<Vec<_>>().join(REASON_SEP),
        )
    }

    /// The only transition that writes regime and confidence.
    ///
    /// Confidence is clamped into [0, 1]; NaN becomes 0.
    pub fn infer(mut self, name: &str, regime: Regime, confidence: f64, reason: &str) -> RegimeStage {
        self.trail.push(segment(name, reason));
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        RegimeStage {
            hard: self,
            regime,
            confidence,
            permission: Permission::Allow,
            early_exit_active: false,
        }
    }
}

/// After regime inference. Regime is frozen; permission can only tighten.
#[derive(Clone, Debug)]
pub struct RegimeStage {
    hard: HardStage,
    regime: Regime,
    confidence: f64,
    permission: Permission,
    early_exit_active: bool,
}

impl RegimeStage {
    pub fn regime(&self) -> Regime {
        self.regime
    }

    pub fn permission(&self) -> Permission {
        self.permission
    }

    pub fn tighten(&mut self, name: &str, permission: Permission, early_exit_active: bool, reason: &str) {
        self.permission = self.permission.tighten(permission);
        self.early_exit_active |= early_exit_active;
        self.hard.trail.push(segment(name, reason));
    }

    pub fn abort(self, reason: &str) -> MarketState {
        self.hard.abort(reason)
    }

    pub fn finish(self) -> MarketState {
        let HardStage {
            ts_utc,
            instrument,
            safety_ok,
            volatility_ok,
            trail,
        } = self.hard;
        MarketState {
            ts_utc,
            instrument,
            regime: self.regime,
            permission: self.permission,
            safety_ok,
            volatility_ok,
            early_exit_active: self.early_exit_active,
            confidence: self.confidence,
            reason: trail.join(REASON_SEP),
        }
    }
}
