use serde::{Deserialize, Serialize};

use urt_schemas::Action;

/// Minimal bar the detector consumes.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Bar {
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Bar {
    pub fn new(high: f64, low: f64, close: f64) -> Self {
        Self { high, low, close }
    }
}

/// Box lifecycle: empty -> forming (candidate + confirmations) -> frozen.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BoxState {
    pub active: bool,
    pub top: Option<f64>,
    pub bottom: Option<f64>,

    pub confirm_count: u32,
    pub candidate_top: Option<f64>,
    pub candidate_bottom: Option<f64>,

    /// Bar index at which the box froze.
    pub formed_at_index: Option<u64>,
}

impl BoxState {
    pub fn reset(&mut self) {
        *self = BoxState::default();
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BreakoutConfig {
    pub lookback: usize,
    /// Consecutive closes inside the candidate box needed to freeze it.
    pub min_width: u32,
    pub expiry_bars: u64,
    pub strategy_name: String,
}

impl Default for BreakoutConfig {
    fn default() -> Self {
        Self {
            lookback: 20,
            min_width: 5,
            expiry_bars: 60,
            strategy_name: "BoxBreakout".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BreakoutConfigError {
    LookbackTooShort(usize),
    MinWidthTooSmall(u32),
    ExpiryShorterThanWidth { expiry_bars: u64, min_width: u32 },
}

impl std::fmt::Display for BreakoutConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BreakoutConfigError::LookbackTooShort(n) => {
                write!(f, "breakout.lookback must be >= 5 (got {})", n)
            }
            BreakoutConfigError::MinWidthTooSmall(n) => {
                write!(f, "breakout.min_width must be >= 2 (got {})", n)
            }
            BreakoutConfigError::ExpiryShorterThanWidth {
                expiry_bars,
                min_width,
            } => write!(
                f,
                "breakout.expiry_bars ({}) must be >= min_width ({})",
                expiry_bars, min_width
            ),
        }
    }
}

impl std::error::Error for BreakoutConfigError {}

impl BreakoutConfig {
    pub fn validate(&self) -> Result<(), BreakoutConfigError> {
        if self.lookback < 5 {
            return Err(BreakoutConfigError::LookbackTooShort(self.lookback));
        }
        if self.min_width < 2 {
            return Err(BreakoutConfigError::MinWidthTooSmall(self.min_width));
        }
        if self.expiry_bars < u64::from(self.min_width) {
            return Err(BreakoutConfigError::ExpiryShorterThanWidth {
                expiry_bars: self.expiry_bars,
                min_width: self.min_width,
            });
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RouterConfig {
    pub breakout: BreakoutConfig,
}

/// Detector output for one bar, before it is stamped into a `Signal`.
#[derive(Clone, Debug, PartialEq)]
pub struct BarDecision {
    pub action: Action,
    pub strength: f64,
    pub reason: String,
    pub tag: &'static str,
}

impl BarDecision {
    pub fn hold(reason: String, tag: &'static str) -> Self {
        Self {
            action: Action::Hold,
            strength: 0.0,
            reason,
            tag,
        }
    }

    pub fn enter(action: Action, reason: String) -> Self {
        Self {
            action,
            strength: 1.0,
            reason,
            tag: "breakout",
        }
    }
}
