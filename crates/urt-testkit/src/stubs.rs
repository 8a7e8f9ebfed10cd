use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use urt_gates::{Gate, GateContext, GateDecision, GateKind, StateFlag};
use urt_pipeline::{LivenessSink, LivenessSnapshot};
use urt_schemas::FeatureSnapshot;

/// Gate stand-in that returns a fixed decision and counts evaluations.
pub struct CountingGate {
    name: &'static str,
    kind: GateKind,
    flag: Option<StateFlag>,
    decision: GateDecision,
    calls: Arc<AtomicUsize>,
}

impl CountingGate {
    pub fn new(name: &'static str, kind: GateKind, decision: GateDecision) -> Self {
        Self {
            name,
            kind,
            flag: None,
            decision,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_flag(mut self, flag: StateFlag) -> Self {
        self.flag = Some(flag);
        self
    }

    /// Shared counter; clone it before boxing the gate.
    pub fn counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl Gate for CountingGate {
    fn name(&self) -> &'static str {
        self.name
    }

    fn kind(&self) -> GateKind {
        self.kind
    }

    fn flag(&self) -> Option<StateFlag> {
        self.flag
    }

    fn evaluate(&self, _features: &FeatureSnapshot, _ctx: &GateContext) -> GateDecision {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.decision.clone()
    }
}

/// Keeps every published snapshot in memory.
#[derive(Clone, Default)]
pub struct RecordingSink {
    seen: Arc<Mutex<Vec<LivenessSnapshot>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshots(&self) -> Vec<LivenessSnapshot> {
        match self.seen.lock() {
            Ok(g) => g.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl LivenessSink for RecordingSink {
    fn publish(&self, snapshot: LivenessSnapshot) {
        match self.seen.lock() {
            Ok(mut g) => g.push(snapshot),
            Err(poisoned) => poisoned.into_inner().push(snapshot),
        }
    }
}
