//! urt-pipeline
//!
//! Folds an ordered chain of gates into exactly one `MarketState` per tick.
//!
//! - Layout is fixed at construction: hard gates, one regime gate, downgrade gates
//! - Hard gates short-circuit; nothing after a failing hard gate runs
//! - Regime is written once, by the regime gate; permission only tightens
//! - Every evaluated gate leaves a `NAME:reason` segment in the trail
//! - Liveness is published after the state is final and cannot change it

mod config;
mod liveness;
mod pipeline;
mod reducer;

pub use config::*;
pub use liveness::*;
pub use pipeline::*;
pub use reducer::*;
