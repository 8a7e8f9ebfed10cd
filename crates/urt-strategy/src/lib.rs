//! urt-strategy
//!
//! Signal generation downstream of the gate pipeline.
//!
//! - Box breakout detector (one owned state machine per instrument)
//! - Mean-reversion strategy seam (placeholder: always HOLD)
//! - Regime router: permission veto first, then route by regime
//!
//! One position at a time: entries are only emitted while FLAT.

mod breakout;
mod router;
mod types;

pub use breakout::*;
pub use router::*;
pub use types::*;
