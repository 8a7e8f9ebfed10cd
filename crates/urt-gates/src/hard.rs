use serde::{Deserialize, Serialize};
use tracing::warn;

use urt_schemas::{FeatureSnapshot, Permission, Regime};

use crate::types::finite_non_negative;
use crate::{Gate, GateConfigError, GateContext, GateDecision, GateKind, StateFlag};

// ---------------------------------------------------------------------------
// Safety
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SafetyConfig {
    pub force_halt: bool,
    pub force_halt_reason: String,
    pub require_atr_positive: bool,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            force_halt: false,
            force_halt_reason: "forced_halt".to_string(),
            require_atr_positive: true,
        }
    }
}

/// Data quality first, then the manual halt switch.
#[derive(Clone, Debug)]
pub struct SafetyGate {
    cfg: SafetyConfig,
}

impl SafetyGate {
    pub fn new(cfg: SafetyConfig) -> Self {
        Self { cfg }
    }
}

impl Gate for SafetyGate {
    fn name(&self) -> &'static str {
        "SAFETY"
    }

    fn kind(&self) -> GateKind {
        GateKind::Hard
    }

    fn flag(&self) -> Option<StateFlag> {
        Some(StateFlag::Safety)
    }

    fn evaluate(&self, features: &FeatureSnapshot, _ctx: &GateContext) -> GateDecision {
        if let Some(fault) = features.quality_fault(self.cfg.require_atr_positive) {
            return GateDecision::fail(Regime::Halt, format!("BAD_DATA:{fault}"));
        }
        if self.cfg.force_halt {
            return GateDecision::fail(Regime::Halt, self.cfg.force_halt_reason.clone());
        }
        GateDecision::pass("safety_ok")
    }
}

// ---------------------------------------------------------------------------
// Daily loss
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DailyLossConfig {
    pub enabled: bool,
    /// Loss limit as a fraction of equity (0.03 = 3%).
    pub limit_frac: f64,
    pub force_block: bool,
    pub force_reason: String,
}

impl Default for DailyLossConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            limit_frac: 0.03,
            force_block: false,
            force_reason: "manual_daily_loss_block".to_string(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct DailyLossGate {
    cfg: DailyLossConfig,
}

impl DailyLossGate {
    pub fn new(cfg: DailyLossConfig) -> Result<Self, GateConfigError> {
        if !cfg.limit_frac.is_finite() || cfg.limit_frac <= 0.0 || cfg.limit_frac >= 1.0 {
            return Err(GateConfigError::OutOfRange {
                gate: "daily_loss",
                field: "limit_frac",
                value: cfg.limit_frac,
            });
        }
        Ok(Self { cfg })
    }
}

impl Gate for DailyLossGate {
    fn name(&self) -> &'static str {
        "DAILY_LOSS"
    }

    fn kind(&self) -> GateKind {
        GateKind::Hard
    }

    fn evaluate(&self, _features: &FeatureSnapshot, ctx: &GateContext) -> GateDecision {
        if !self.cfg.enabled {
            return GateDecision::pass("daily_loss_disabled");
        }
        if self.cfg.force_block {
            return GateDecision::fail(Regime::Halt, self.cfg.force_reason.clone());
        }
        match ctx.realized_pnl_frac {
            // A P&L feed that reports garbage is treated as a breach.
            Some(pnl) if !pnl.is_finite() => {
                GateDecision::fail(Regime::Halt, "daily_loss_pnl_non_finite")
            }
            Some(pnl) if pnl <= -self.cfg.limit_frac => GateDecision::fail(
                Regime::Halt,
                format!("daily_loss_limit_hit:pnl={:.4}_le_-{:.4}", pnl, self.cfg.limit_frac),
            ),
            Some(pnl) => GateDecision::pass(format!("daily_loss_ok:pnl={:.4}", pnl)),
            None => GateDecision::pass("daily_loss_ok:no_pnl_feed"),
        }
    }
}

// ---------------------------------------------------------------------------
// Time debt
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimeDebtConfig {
    pub enabled: bool,
    /// `ALLOW` or `BLOCK`.
    pub force_permission: String,
    pub force_reason: String,
}

impl Default for TimeDebtConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            force_permission: "ALLOW".to_string(),
            force_reason: "time_debt_stub".to_string(),
        }
    }
}

/// Pauses new entries. ALLOW/BLOCK only; it never sizes.
///
/// An unrecognised `force_permission` is replaced by BLOCK rather than
/// rejected.
#[derive(Clone, Debug)]
pub struct TimeDebtGate {
    enabled: bool,
    force: Permission,
    force_reason: String,
}

impl TimeDebtGate {
    pub fn new(cfg: TimeDebtConfig) -> Self {
        let (force, force_reason) = match Permission::parse(&cfg.force_permission) {
            Some(p @ (Permission::Allow | Permission::Block)) => (p, cfg.force_reason),
            _ => {
                warn!(
                    value = %cfg.force_permission,
                    "time_debt.force_permission invalid; substituting BLOCK"
                );
                (
                    Permission::Block,
                    "invalid_time_debt_force_permission".to_string(),
                )
            }
        };
        Self {
            enabled: cfg.enabled,
            force,
            force_reason,
        }
    }

    pub fn forced_permission(&self) -> Permission {
        self.force
    }
}

impl Gate for TimeDebtGate {
    fn name(&self) -> &'static str {
        "TIME_DEBT"
    }

    fn kind(&self) -> GateKind {
        GateKind::Hard
    }

    fn evaluate(&self, _features: &FeatureSnapshot, _ctx: &GateContext) -> GateDecision {
        if !self.enabled {
            return GateDecision::pass("time_debt_disabled");
        }
        let reason = format!("time_debt_forced:{}", self.force_reason);
        if self.force == Permission::Block {
            return GateDecision::fail(Regime::Halt, reason);
        }
        GateDecision::pass(reason)
    }
}

// ---------------------------------------------------------------------------
// Hostility overlay
// ---------------------------------------------------------------------------

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum HostilityState {
    Normal,
    Elevated,
    Hostile,
}

impl HostilityState {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "NORMAL" => Some(HostilityState::Normal),
            "ELEVATED" => Some(HostilityState::Elevated),
            "HOSTILE" => Some(HostilityState::Hostile),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HostilityState::Normal => "NORMAL",
            HostilityState::Elevated => "ELEVATED",
            HostilityState::Hostile => "HOSTILE",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HostilityConfig {
    pub enabled: bool,
    pub force_state: Option<String>,
    pub force_reason: String,
    /// Lookback for a live hostility measure, minutes. Reserved: the forced
    /// overlay does not read it.
    pub window_min: u32,
}

impl Default for HostilityConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            force_state: None,
            force_reason: "forced_hostility".to_string(),
            window_min: 30,
        }
    }
}

/// Layer-0 market hostility. HOSTILE blocks new entries.
#[derive(Clone, Debug)]
pub struct HostilityGate {
    enabled: bool,
    forced: Option<HostilityState>,
    force_reason: String,
}

impl HostilityGate {
    pub fn new(cfg: HostilityConfig) -> Result<Self, GateConfigError> {
        let forced = match cfg.force_state.as_deref() {
            None => None,
            Some(raw) if raw.trim().is_empty() => None,
            Some(raw) => Some(
                HostilityState::parse(raw)
                    .ok_or_else(|| GateConfigError::InvalidHostilityState(raw.to_string()))?,
            ),
        };
        Ok(Self {
            enabled: cfg.enabled,
            forced,
            force_reason: cfg.force_reason,
        })
    }
}

impl Gate for HostilityGate {
    fn name(&self) -> &'static str {
        "HOSTILITY"
    }

    fn kind(&self) -> GateKind {
        GateKind::Hard
    }

    fn evaluate(&self, _features: &FeatureSnapshot, _ctx: &GateContext) -> GateDecision {
        if !self.enabled {
            return GateDecision::pass("hostility_disabled");
        }
        match self.forced {
            Some(HostilityState::Hostile) => GateDecision::fail(
                Regime::Chaotic,
                format!("hostility_forced:{}", self.force_reason),
            ),
            Some(state) => GateDecision::pass(format!(
                "hostility_forced_{}:{}",
                state.as_str().to_ascii_lowercase(),
                self.force_reason
            )),
            None => GateDecision::pass("hostility_default_normal"),
        }
    }
}

// ---------------------------------------------------------------------------
// Volatility
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VolatilityConfig {
    pub threshold_ok: f64,
    pub threshold_block: f64,
}

impl Default for VolatilityConfig {
    fn default() -> Self {
        Self {
            threshold_ok: 1.0,
            threshold_block: 1.5,
        }
    }
}

/// Bands on the normalised (non-ATR) volatility score.
///
/// Both failing bands are terminal; the reason tells them apart.
#[derive(Clone, Debug)]
pub struct VolatilityGate {
    cfg: VolatilityConfig,
}

impl VolatilityGate {
    pub fn new(cfg: VolatilityConfig) -> Result<Self, GateConfigError> {
        let VolatilityConfig {
            threshold_ok: ok,
            threshold_block: block,
        } = cfg;
        finite_non_negative("volatility", "threshold_ok", ok)?;
        if !block.is_finite() || block < ok {
            return Err(GateConfigError::VolThresholds { ok, block });
        }
        Ok(Self { cfg })
    }
}

impl Gate for VolatilityGate {
    fn name(&self) -> &'static str {
        "VOL"
    }

    fn kind(&self) -> GateKind {
        GateKind::Hard
    }

    fn flag(&self) -> Option<StateFlag> {
        Some(StateFlag::Volatility)
    }

    fn evaluate(&self, features: &FeatureSnapshot, _ctx: &GateContext) -> GateDecision {
        let v = features.vol_norm;
        if v <= self.cfg.threshold_ok {
            return GateDecision::pass("vol_ok");
        }
        if v <= self.cfg.threshold_block {
            return GateDecision::fail(Regime::Chaotic, "vol_high_reduce");
        }
        // NaN lands here.
        GateDecision::fail(Regime::Chaotic, "vol_extreme_block")
    }
}
