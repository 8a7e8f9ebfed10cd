use serde::{Deserialize, Serialize};
use std::fmt;

use urt_schemas::{Permission, Regime};

/// Where a gate may sit in the chain.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum GateKind {
    Hard,
    Regime,
    Downgrade,
}

impl GateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GateKind::Hard => "hard",
            GateKind::Regime => "regime",
            GateKind::Downgrade => "downgrade",
        }
    }
}

/// `MarketState` boolean owned by a gate. Set when that gate passes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum StateFlag {
    Safety,
    Volatility,
}

/// Per-step inputs that are not part of the feature snapshot.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GateContext {
    /// 0-based step index of the owning pipeline.
    pub tick: u64,
    /// Earlier steps that reached regime inference. Steps cut short by a
    /// hard gate or by bad data do not count.
    pub regime_evals: u64,
    /// Day's realised P&L as a fraction of equity (negative = loss).
    pub realized_pnl_frac: Option<f64>,
}

impl GateContext {
    /// Step `tick` of a stream where every earlier step reached inference.
    pub fn at_tick(tick: u64) -> Self {
        Self {
            tick,
            regime_evals: tick,
            realized_pnl_frac: None,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Verdict {
    /// Hard gate passed.
    Pass,
    /// Hard gate failed: chain terminates with this regime and BLOCK.
    Fail { regime: Regime },
    /// Regime inference output.
    Regime { regime: Regime, confidence: f64 },
    /// Downgrade gate output. `Allow` leaves permission unchanged.
    Downgrade {
        permission: Permission,
        early_exit_active: bool,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct GateDecision {
    pub verdict: Verdict,
    pub reason: String,
}

impl GateDecision {
    pub fn pass(reason: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::Pass,
            reason: reason.into(),
        }
    }

    pub fn fail(regime: Regime, reason: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::Fail { regime },
            reason: reason.into(),
        }
    }

    pub fn regime(regime: Regime, confidence: f64, reason: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::Regime { regime, confidence },
            reason: reason.into(),
        }
    }

    pub fn downgrade(permission: Permission, reason: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::Downgrade {
                permission,
                early_exit_active: false,
            },
            reason: reason.into(),
        }
    }

    pub fn is_fail(&self) -> bool {
        matches!(self.verdict, Verdict::Fail { .. })
    }
}

/// What a gate does when an input it needs is absent.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailPolicy {
    Allow,
    Block,
}

impl FailPolicy {
    pub fn permission(&self) -> Permission {
        match self {
            FailPolicy::Allow => Permission::Allow,
            FailPolicy::Block => Permission::Block,
        }
    }
}

/// Gate misconfiguration, raised at construction.
#[derive(Clone, Debug, PartialEq)]
pub enum GateConfigError {
    InvalidPermission {
        gate: &'static str,
        field: &'static str,
        value: String,
    },
    InvalidHostilityState(String),
    VolThresholds { ok: f64, block: f64 },
    UnknownRegimeMode(String),
    OutOfRange {
        gate: &'static str,
        field: &'static str,
        value: f64,
    },
}

impl fmt::Display for GateConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateConfigError::InvalidPermission { gate, field, value } => {
                write!(f, "{gate}.{field} must be ALLOW|REDUCE|BLOCK (got '{value}')")
            }
            GateConfigError::InvalidHostilityState(v) => {
                write!(f, "hostility.force_state must be NORMAL|ELEVATED|HOSTILE (got '{v}')")
            }
            GateConfigError::VolThresholds { ok, block } => write!(
                f,
                "volatility.threshold_block ({block}) must be finite and >= threshold_ok ({ok})"
            ),
            GateConfigError::UnknownRegimeMode(m) => write!(
                f,
                "regime.stub_mode must be alternating|trend_only|mr_only|chaotic|velocity (got '{m}')"
            ),
            GateConfigError::OutOfRange { gate, field, value } => {
                write!(f, "{gate}.{field} out of range (got {value})")
            }
        }
    }
}

impl std::error::Error for GateConfigError {}

pub(crate) fn finite_non_negative(
    gate: &'static str,
    field: &'static str,
    value: f64,
) -> Result<(), GateConfigError> {
    if !value.is_finite() || value < 0.0 {
        return Err(GateConfigError::OutOfRange { gate, field, value });
    }
    Ok(())
}
