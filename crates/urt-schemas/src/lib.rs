//! urt-schemas
//!
//! Shared contracts between the gate pipeline, the strategy router and the
//! operator tooling. Plain data only: no IO, no clocks.
//!
//! Wire format for every enum is SCREAMING_SNAKE_CASE (`"MEAN_REVERSION"`,
//! `"ENTER_LONG"`), matching the JSON written to liveness and report files.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Market regime. Owned exclusively by the regime-inference gate.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Regime {
    Trend,
    MeanReversion,
    Chaotic,
    Halt,
}

impl Regime {
    pub fn as_str(&self) -> &'static str {
        match self {
            Regime::Trend => "TREND",
            Regime::MeanReversion => "MEAN_REVERSION",
            Regime::Chaotic => "CHAOTIC",
            Regime::Halt => "HALT",
        }
    }
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trade permission.
///
/// Variant order is restrictiveness order: `Allow < Reduce < Block`. The
/// derived `Ord` is what [`Permission::tighten`] relies on.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Permission {
    Allow,
    Reduce,
    Block,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::Allow => "ALLOW",
            Permission::Reduce => "REDUCE",
            Permission::Block => "BLOCK",
        }
    }

    /// Case-insensitive parse of `ALLOW | REDUCE | BLOCK`. Anything else is `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "ALLOW" => Some(Permission::Allow),
            "REDUCE" => Some(Permission::Reduce),
            "BLOCK" => Some(Permission::Block),
            _ => None,
        }
    }

    /// The more restrictive of `self` and `other`. Never relaxes.
    pub fn tighten(self, other: Permission) -> Permission {
        self.max(other)
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strategy action carried by a [`Signal`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Hold,
    EnterLong,
    EnterShort,
    Exit,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Hold => "HOLD",
            Action::EnterLong => "ENTER_LONG",
            Action::EnterShort => "ENTER_SHORT",
            Action::Exit => "EXIT",
        }
    }

    pub fn is_entry(&self) -> bool {
        matches!(self, Action::EnterLong | Action::EnterShort)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position state as seen by the strategy layer (one trade at a time).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionState {
    #[default]
    Flat,
    PendingEntryLong,
    PendingEntryShort,
    Long,
    Short,
}

impl PositionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PositionState::Flat => "FLAT",
            PositionState::PendingEntryLong => "PENDING_ENTRY_LONG",
            PositionState::PendingEntryShort => "PENDING_ENTRY_SHORT",
            PositionState::Long => "LONG",
            PositionState::Short => "SHORT",
        }
    }

    /// Lenient mapping from whatever the bookkeeping layer stores.
    ///
    /// Absent or unrecognised values map to `Flat`.
    pub fn from_raw(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return PositionState::Flat;
        };
        match raw.trim().to_ascii_uppercase().as_str() {
            "FLAT" | "NONE" | "NO_POSITION" => PositionState::Flat,
            "LONG" => PositionState::Long,
            "SHORT" => PositionState::Short,
            "PENDING_ENTRY_LONG" | "PENDING_LONG" | "ENTRY_LONG_PENDING" => {
                PositionState::PendingEntryLong
            }
            "PENDING_ENTRY_SHORT" | "PENDING_SHORT" | "ENTRY_SHORT_PENDING" => {
                PositionState::PendingEntryShort
            }
            _ => PositionState::Flat,
        }
    }

    pub fn is_flat(&self) -> bool {
        *self == PositionState::Flat
    }
}

impl fmt::Display for PositionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Feature snapshot (pipeline input)
// ---------------------------------------------------------------------------

/// One tick of precomputed features for one instrument.
///
/// `ts_utc` must be UTC; the serde representation is RFC 3339.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSnapshot {
    pub ts_utc: DateTime<Utc>,
    pub instrument: String,

    pub price: f64,
    pub volume: f64,

    pub atr_fast: f64,
    pub atr_slow: f64,
    /// Normalised (non-ATR) volatility score.
    pub vol_norm: f64,
    pub velocity: f64,

    /// Optional bar extremes. The router falls back to `price` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low: Option<f64>,
}

/// Structurally invalid input. Fatal to the current run; never absorbed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContractFault {
    EmptyInstrument,
}

impl fmt::Display for ContractFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContractFault::EmptyInstrument => write!(f, "instrument must be a non-empty string"),
        }
    }
}

impl std::error::Error for ContractFault {}

/// Structurally valid but semantically invalid value.
///
/// Inside the pipeline this becomes a HALT/BLOCK state, not an error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DataQualityFault {
    NonFinite(&'static str),
    NonPositivePrice,
    NegativeVolume,
    NonPositiveAtrFast,
    NonPositiveAtrSlow,
}

impl fmt::Display for DataQualityFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataQualityFault::NonFinite(field) => write!(f, "non_finite:{field}"),
            DataQualityFault::NonPositivePrice => write!(f, "price<=0"),
            DataQualityFault::NegativeVolume => write!(f, "volume<0"),
            DataQualityFault::NonPositiveAtrFast => write!(f, "atr_fast<=0"),
            DataQualityFault::NonPositiveAtrSlow => write!(f, "atr_slow<=0"),
        }
    }
}

impl FeatureSnapshot {
    /// Structural checks the ingestion layer must already have enforced.
    pub fn check_contract(&self) -> Result<(), ContractFault> {
        if self.instrument.trim().is_empty() {
            return Err(ContractFault::EmptyInstrument);
        }
        Ok(())
    }

    /// First data-quality fault, in a fixed check order.
    ///
    /// ATR positivity is only checked when `require_atr_positive` is set.
    pub fn quality_fault(&self, require_atr_positive: bool) -> Option<DataQualityFault> {
        let numeric = [
            ("price", self.price),
            ("volume", self.volume),
            ("atr_fast", self.atr_fast),
            ("atr_slow", self.atr_slow),
            ("vol_norm", self.vol_norm),
            ("velocity", self.velocity),
        ];
        for (field, v) in numeric {
            if !v.is_finite() {
                return Some(DataQualityFault::NonFinite(field));
            }
        }
        if let Some(h) = self.high {
            if !h.is_finite() {
                return Some(DataQualityFault::NonFinite("high"));
            }
        }
        if let Some(l) = self.low {
            if !l.is_finite() {
                return Some(DataQualityFault::NonFinite("low"));
            }
        }

        if self.price <= 0.0 {
            return Some(DataQualityFault::NonPositivePrice);
        }
        if self.volume < 0.0 {
            return Some(DataQualityFault::NegativeVolume);
        }
        if require_atr_positive {
            if self.atr_fast <= 0.0 {
                return Some(DataQualityFault::NonPositiveAtrFast);
            }
            if self.atr_slow <= 0.0 {
                return Some(DataQualityFault::NonPositiveAtrSlow);
            }
        }
        None
    }
}

// ---------------------------------------------------------------------------
// Market state (pipeline output)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketState {
    pub ts_utc: DateTime<Utc>,
    pub instrument: String,

    pub regime: Regime,
    pub permission: Permission,

    pub safety_ok: bool,
    pub volatility_ok: bool,
    pub early_exit_active: bool,

    /// In [0, 1].
    pub confidence: f64,
    /// Composite trail of every evaluated gate's reason.
    pub reason: String,
}

impl MarketState {
    /// Terminal fail-closed state: HALT / BLOCK / zero confidence.
    pub fn halted(ts_utc: DateTime<Utc>, instrument: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            ts_utc,
            instrument: instrument.into(),
            regime: Regime::Halt,
            permission: Permission::Block,
            safety_ok: false,
            volatility_ok: false,
            early_exit_active: false,
            confidence: 0.0,
            reason: reason.into(),
        }
    }

    pub fn is_tradeable(&self) -> bool {
        self.permission == Permission::Allow
    }
}

// ---------------------------------------------------------------------------
// Signal (router output)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub ts_utc: DateTime<Utc>,
    pub instrument: String,

    /// Originating strategy ("Router" when no strategy ran).
    pub strategy: String,
    pub action: Action,
    /// In [0, 1].
    pub strength: f64,

    pub reason: String,
    #[serde(default)]
    pub tag: Option<String>,
}

impl Signal {
    /// HOLD with zero strength.
    pub fn hold(
        ts_utc: DateTime<Utc>,
        instrument: impl Into<String>,
        strategy: impl Into<String>,
        reason: impl Into<String>,
        tag: Option<&str>,
    ) -> Self {
        Self {
            ts_utc,
            instrument: instrument.into(),
            strategy: strategy.into(),
            action: Action::Hold,
            strength: 0.0,
            reason: reason.into(),
            tag: tag.map(str::to_string),
        }
    }
}
