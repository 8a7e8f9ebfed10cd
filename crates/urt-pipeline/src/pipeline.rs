use std::fmt;
use std::sync::Arc;

use tracing::debug;

use urt_gates::{
    DailyLossGate, EarlyExitGate, Gate, GateConfigError, GateContext, GateKind, HostilityGate,
    MonteCarloGate, RegimeGate, SafetyGate, TimeDebtGate, Verdict, ViabilityGate, VolatilityGate,
};
use urt_risk::ReportSource;
use urt_schemas::{ContractFault, FeatureSnapshot, MarketState, Regime};

use crate::{HardStage, LivenessSink, LivenessSnapshot, PipelineConfig, RegimeStage};

#[derive(Clone, Debug, PartialEq)]
pub enum PipelineError {
    /// Gate order violates hard -> regime -> downgrade.
    BadLayout {
        position: usize,
        gate: &'static str,
        kind: &'static str,
    },
    /// Exactly one regime gate is required.
    RegimeGateCount(usize),
    Gate(GateConfigError),
    Contract(ContractFault),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::BadLayout {
                position,
                gate,
                kind,
            } => write!(
                f,
                "gate {gate} ({kind}) at position {position} breaks hard -> regime -> downgrade order"
            ),
            PipelineError::RegimeGateCount(n) => {
                write!(f, "pipeline needs exactly one regime gate (got {n})")
            }
            PipelineError::Gate(e) => write!(f, "gate config: {e}"),
            PipelineError::Contract(e) => write!(f, "contract fault: {e}"),
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<GateConfigError> for PipelineError {
    fn from(e: GateConfigError) -> Self {
        PipelineError::Gate(e)
    }
}

impl From<ContractFault> for PipelineError {
    fn from(e: ContractFault) -> Self {
        PipelineError::Contract(e)
    }
}

fn layout_rank(kind: GateKind) -> u8 {
    match kind {
        GateKind::Hard => 0,
        GateKind::Regime => 1,
        GateKind::Downgrade => 2,
    }
}

/// Canonical gate chain, in evaluation order.
pub fn build_gates(
    cfg: &PipelineConfig,
    reports: Arc<dyn ReportSource>,
) -> Result<Vec<Box<dyn Gate>>, GateConfigError> {
    let mut gates: Vec<Box<dyn Gate>> = Vec::with_capacity(9);
    gates.push(Box::new(SafetyGate::new(cfg.safety.clone())));
    gates.push(Box::new(DailyLossGate::new(cfg.daily_loss.clone())?));
    gates.push(Box::new(TimeDebtGate::new(cfg.time_debt.clone())));
    gates.push(Box::new(HostilityGate::new(cfg.hostility.clone())?));
    gates.push(Box::new(VolatilityGate::new(cfg.volatility.clone())?));
    gates.push(Box::new(RegimeGate::new(cfg.regime.clone())?));
    gates.push(Box::new(EarlyExitGate::new(cfg.early_exit.clone())?));
    gates.push(Box::new(ViabilityGate::new(cfg.evt.clone())?));
    gates.push(Box::new(MonteCarloGate::new(cfg.monte_carlo.clone(), reports)?));
    Ok(gates)
}

/// Single-owner, synchronous gate chain for one instrument stream.
pub struct GatePipeline {
    gates: Vec<Box<dyn Gate>>,
    sink: Box<dyn LivenessSink>,
    tick: u64,
    /// Steps that reached the regime gate.
    regime_evals: u64,
    realized_pnl_frac: Option<f64>,
}

impl GatePipeline {
    pub fn new(gates: Vec<Box<dyn Gate>>, sink: Box<dyn LivenessSink>) -> Result<Self, PipelineError> {
        let mut rank = 0u8;
        let mut regime_gates = 0usize;
        for (position, g) in gates.iter().enumerate() {
            let r = layout_rank(g.kind());
            if r < rank || (g.kind() == GateKind::Regime && regime_gates > 0) {
                return Err(PipelineError::BadLayout {
                    position,
                    gate: g.name(),
                    kind: g.kind().as_str(),
                });
            }
            if g.kind() == GateKind::Regime {
                regime_gates += 1;
            }
            rank = r;
        }
        if regime_gates != 1 {
            return Err(PipelineError::RegimeGateCount(regime_gates));
        }
        Ok(Self {
            gates,
            sink,
            tick: 0,
            regime_evals: 0,
            realized_pnl_frac: None,
        })
    }

    pub fn from_config(
        cfg: &PipelineConfig,
        reports: Arc<dyn ReportSource>,
        sink: Box<dyn LivenessSink>,
    ) -> Result<Self, PipelineError> {
        let gates = build_gates(cfg, reports)?;
        Self::new(gates, sink)
    }

    pub fn gate_names(&self) -> Vec<&'static str> {
        self.gates.iter().map(|g| g.name()).collect()
    }

    /// Steps taken so far.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Realised P&L fraction seen by the daily-loss gate from the next step on.
    pub fn set_realized_pnl_frac(&mut self, pnl: Option<f64>) {
        self.realized_pnl_frac = pnl;
    }

    /// Evaluate the chain for one snapshot.
    ///
    /// Only a structurally invalid snapshot is an error. Bad values inside a
    /// well-formed snapshot come back as a fail-closed state, whatever gates
    /// the chain holds.
    pub fn step(&mut self, features: &FeatureSnapshot) -> Result<MarketState, PipelineError> {
        features.check_contract()?;

        let ctx = GateContext {
            tick: self.tick,
            regime_evals: self.regime_evals,
            realized_pnl_frac: self.realized_pnl_frac,
        };
        self.tick += 1;

        // ATR positivity stays a SafetyGate option.
        let state = match features.quality_fault(false) {
            Some(fault) => {
                HardStage::new(features).fail("SAFETY", Regime::Halt, &format!("BAD_DATA:{fault}"))
            }
            None => {
                let (state, inferred) = self.fold(features, &ctx);
                if inferred {
                    self.regime_evals += 1;
                }
                state
            }
        };

        debug!(
            instrument = %state.instrument,
            tick = ctx.tick,
            regime = %state.regime,
            permission = %state.permission,
            confidence = state.confidence,
            reason = %state.reason,
            "pipeline step"
        );

        self.sink
            .publish(LivenessSnapshot::from_state(&state, features.price));
        Ok(state)
    }

    /// Runs the chain. The flag is set once the regime gate has been evaluated.
    fn fold(&self, features: &FeatureSnapshot, ctx: &GateContext) -> (MarketState, bool) {
        let mut gates = self.gates.iter();
        let mut hard = HardStage::new(features);

        // Hard gates until the regime gate.
        let mut stage: RegimeStage = loop {
            let Some(g) = gates.next() else {
                return (hard.abort("no_regime_gate"), false);
            };
            let d = g.evaluate(features, ctx);
            match (g.kind(), d.verdict) {
                (GateKind::Hard, Verdict::Pass) => hard.pass(g.name(), g.flag(), &d.reason),
                (GateKind::Hard, Verdict::Fail { regime }) => {
                    return (hard.fail(g.name(), regime, &d.reason), false)
                }
                (GateKind::Regime, Verdict::Regime { regime, confidence }) => {
                    break hard.infer(g.name(), regime, confidence, &d.reason)
                }
                (kind, _) => {
                    let reason = format!("verdict_kind_mismatch:{}", g.name());
                    return (hard.abort(&reason), kind == GateKind::Regime);
                }
            }
        };

        for g in gates {
            let d = g.evaluate(features, ctx);
            match (g.kind(), d.verdict) {
                (
                    GateKind::Downgrade,
                    Verdict::Downgrade {
                        permission,
                        early_exit_active,
                    },
                ) => stage.tighten(g.name(), permission, early_exit_active, &d.reason),
                _ => return (stage.abort(&format!("verdict_kind_mismatch:{}", g.name())), true),
            }
        }

        (stage.finish(), true)
    }
}
