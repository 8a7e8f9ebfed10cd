use serde::{Deserialize, Serialize};

use urt_schemas::{FeatureSnapshot, Permission};

use crate::types::finite_non_negative;
use crate::{Gate, GateConfigError, GateContext, GateDecision, GateKind, Verdict};

// ---------------------------------------------------------------------------
// Early exit
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EarlyExitConfig {
    pub force_active: bool,
    pub force_permission: String,
    pub force_reason: String,
}

impl Default for EarlyExitConfig {
    fn default() -> Self {
        Self {
            force_active: false,
            force_permission: "REDUCE".to_string(),
            force_reason: "early_exit_forced".to_string(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct EarlyExitGate {
    active: bool,
    permission: Permission,
    reason: String,
}

impl EarlyExitGate {
    pub fn new(cfg: EarlyExitConfig) -> Result<Self, GateConfigError> {
        let permission = Permission::parse(&cfg.force_permission).ok_or_else(|| {
            GateConfigError::InvalidPermission {
                gate: "early_exit",
                field: "force_permission",
                value: cfg.force_permission.clone(),
            }
        })?;
        Ok(Self {
            active: cfg.force_active,
            permission,
            reason: cfg.force_reason,
        })
    }
}

impl Gate for EarlyExitGate {
    fn name(&self) -> &'static str {
        "EARLY_EXIT"
    }

    fn kind(&self) -> GateKind {
        GateKind::Downgrade
    }

    fn evaluate(&self, _features: &FeatureSnapshot, _ctx: &GateContext) -> GateDecision {
        if !self.active {
            return GateDecision::downgrade(Permission::Allow, "early_exit_inactive");
        }
        GateDecision {
            verdict: Verdict::Downgrade {
                permission: self.permission,
                early_exit_active: true,
            },
            reason: self.reason.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Viability (EVT)
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ViabilityConfig {
    pub enabled: bool,
    pub min_velocity: f64,
}

impl Default for ViabilityConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            min_velocity: 0.0,
        }
    }
}

/// Expected viability: blocks when price is not moving enough to reach a
/// target in time.
#[derive(Clone, Debug)]
pub struct ViabilityGate {
    cfg: ViabilityConfig,
}

impl ViabilityGate {
    pub fn new(cfg: ViabilityConfig) -> Result<Self, GateConfigError> {
        finite_non_negative("evt", "min_velocity", cfg.min_velocity)?;
        Ok(Self { cfg })
    }
}

impl Gate for ViabilityGate {
    fn name(&self) -> &'static str {
        "EVT"
    }

    fn kind(&self) -> GateKind {
        GateKind::Downgrade
    }

    fn evaluate(&self, features: &FeatureSnapshot, _ctx: &GateContext) -> GateDecision {
        if !self.cfg.enabled {
            return GateDecision::downgrade(Permission::Allow, "evt_disabled");
        }
        // NaN compares false against the floor; block it explicitly.
        let v = features.velocity.abs();
        if !v.is_finite() || v < self.cfg.min_velocity {
            return GateDecision::downgrade(Permission::Block, "evt_velocity_too_low");
        }
        GateDecision::downgrade(Permission::Allow, "evt_ok")
    }
}
