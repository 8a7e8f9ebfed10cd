//! urt-gates
//!
//! The gate family. Each gate checks one concern against a feature snapshot
//! (and, for the Monte Carlo gates, a persisted risk report) and returns a
//! [`GateDecision`]. Gates never mutate a `MarketState`; the pipeline folds
//! decisions.
//!
//! Kinds:
//! - hard: pass, or terminal fail with a fixed regime (short-circuits)
//! - regime: the single owner of regime + confidence
//! - downgrade: may only tighten permission
//!
//! Every gate is pure over (features, context, config). Misconfiguration is a
//! construction error, never a runtime surprise.

mod downgrade;
mod hard;
mod monte_carlo;
mod regime;
mod types;

pub use downgrade::*;
pub use hard::*;
pub use monte_carlo::*;
pub use regime::*;
pub use types::*;

use urt_schemas::FeatureSnapshot;

/// One check in the pipeline.
pub trait Gate: Send + Sync {
    /// Upper-case tag used as the reason-segment prefix (`VOL`, `SAFETY`, ...).
    fn name(&self) -> &'static str;

    fn kind(&self) -> GateKind;

    /// State flag this gate owns, if any.
    fn flag(&self) -> Option<StateFlag> {
        None
    }

    fn evaluate(&self, features: &FeatureSnapshot, ctx: &GateContext) -> GateDecision;
}
