use urt_pipeline::{GatePipeline, PipelineError};
use urt_schemas::{FeatureSnapshot, MarketState, Signal};
use urt_strategy::RegimeRouter;

/// One tick's output.
#[derive(Clone, Debug)]
pub struct Tick {
    pub state: MarketState,
    pub signal: Signal,
}

/// features -> pipeline -> router, one instrument stream at a time.
pub struct Session {
    pipeline: GatePipeline,
    router: RegimeRouter,
}

impl Session {
    pub fn new(pipeline: GatePipeline, router: RegimeRouter) -> Self {
        Self { pipeline, router }
    }

    pub fn feed(&mut self, features: &FeatureSnapshot) -> Result<Tick, PipelineError> {
        let state = self.pipeline.step(features)?;
        let signal = self.router.route(features, &state);
        Ok(Tick { state, signal })
    }

    pub fn feed_all(&mut self, features: &[FeatureSnapshot]) -> Result<Vec<Tick>, PipelineError> {
        features.iter().map(|f| self.feed(f)).collect()
    }

    pub fn pipeline_mut(&mut self) -> &mut GatePipeline {
        &mut self.pipeline
    }

    pub fn router_mut(&mut self) -> &mut RegimeRouter {
        &mut self.router
    }
}
