use serde::{Deserialize, Serialize};

use urt_schemas::{FeatureSnapshot, Regime};

use crate::{Gate, GateConfigError, GateContext, GateDecision, GateKind};

const TREND_STUB_CONFIDENCE: f64 = 0.60;
const MR_STUB_CONFIDENCE: f64 = 0.55;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RegimeMode {
    /// TREND on even regime evaluations, MEAN_REVERSION on odd ones.
    /// Steps halted before inference do not advance the alternation.
    Alternating,
    TrendOnly,
    MrOnly,
    Chaotic,
    /// `velocity > trend_velocity_min` is TREND, anything else MEAN_REVERSION.
    Velocity,
}

impl RegimeMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "alternating" => Some(RegimeMode::Alternating),
            "trend_only" => Some(RegimeMode::TrendOnly),
            "mr_only" => Some(RegimeMode::MrOnly),
            "chaotic" => Some(RegimeMode::Chaotic),
            "velocity" => Some(RegimeMode::Velocity),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegimeConfig {
    pub enabled: bool,
    pub stub_mode: String,
    pub trend_velocity_min: f64,
    /// Confidence reported by `velocity` mode.
    pub base_confidence: f64,
}

impl Default for RegimeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            stub_mode: "alternating".to_string(),
            trend_velocity_min: 0.0,
            base_confidence: 0.60,
        }
    }
}

/// Sole owner of `regime` and `confidence`. Never touches permission.
#[derive(Clone, Debug)]
pub struct RegimeGate {
    enabled: bool,
    mode: RegimeMode,
    trend_velocity_min: f64,
    base_confidence: f64,
}

impl RegimeGate {
    pub fn new(cfg: RegimeConfig) -> Result<Self, GateConfigError> {
        let mode = RegimeMode::parse(&cfg.stub_mode)
            .ok_or_else(|| GateConfigError::UnknownRegimeMode(cfg.stub_mode.clone()))?;
        if !cfg.trend_velocity_min.is_finite() {
            return Err(GateConfigError::OutOfRange {
                gate: "regime",
                field: "trend_velocity_min",
                value: cfg.trend_velocity_min,
            });
        }
        if !(0.0..=1.0).contains(&cfg.base_confidence) {
            return Err(GateConfigError::OutOfRange {
                gate: "regime",
                field: "base_confidence",
                value: cfg.base_confidence,
            });
        }
        Ok(Self {
            enabled: cfg.enabled,
            mode,
            trend_velocity_min: cfg.trend_velocity_min,
            base_confidence: cfg.base_confidence,
        })
    }

    pub fn mode(&self) -> RegimeMode {
        self.mode
    }
}

impl Gate for RegimeGate {
    fn name(&self) -> &'static str {
        "REGIME"
    }

    fn kind(&self) -> GateKind {
        GateKind::Regime
    }

    fn evaluate(&self, features: &FeatureSnapshot, ctx: &GateContext) -> GateDecision {
        if !self.enabled {
            return GateDecision::regime(Regime::Chaotic, 0.0, "hmm_disabled");
        }
        match self.mode {
            RegimeMode::TrendOnly => {
                GateDecision::regime(Regime::Trend, TREND_STUB_CONFIDENCE, "hmm_stub_trend_only")
            }
            RegimeMode::MrOnly => GateDecision::regime(
                Regime::MeanReversion,
                MR_STUB_CONFIDENCE,
                "hmm_stub_mr_only",
            ),
            RegimeMode::Alternating if ctx.regime_evals % 2 == 0 => {
                GateDecision::regime(Regime::Trend, TREND_STUB_CONFIDENCE, "hmm_stub_trend")
            }
            RegimeMode::Alternating => {
                GateDecision::regime(Regime::MeanReversion, MR_STUB_CONFIDENCE, "hmm_stub_mr")
            }
            RegimeMode::Chaotic => GateDecision::regime(Regime::Chaotic, 0.0, "hmm_stub_chaotic"),
            RegimeMode::Velocity => {
                let v = features.velocity;
                if v > self.trend_velocity_min {
                    GateDecision::regime(
                        Regime::Trend,
                        self.base_confidence,
                        format!("velocity_trend:v={:.4}", v),
                    )
                } else {
                    GateDecision::regime(
                        Regime::MeanReversion,
                        self.base_confidence,
                        format!("velocity_mr:v={:.4}", v),
                    )
                }
            }
        }
    }
}
