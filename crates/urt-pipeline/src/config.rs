use serde::{Deserialize, Serialize};

use urt_gates::{
    DailyLossConfig, EarlyExitConfig, HostilityConfig, McGateConfig, RegimeConfig, SafetyConfig,
    TimeDebtConfig, ViabilityConfig, VolatilityConfig,
};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LivenessConfig {
    pub enabled: bool,
    pub path: String,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: "out/liveness.json".to_string(),
        }
    }
}

/// One section per gate, keyed the way the YAML files key them.
///
/// Unknown top-level keys are tolerated here; the config layer reports them.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub safety: SafetyConfig,
    pub daily_loss: DailyLossConfig,
    pub time_debt: TimeDebtConfig,
    pub hostility: HostilityConfig,
    pub volatility: VolatilityConfig,
    pub regime: RegimeConfig,
    pub early_exit: EarlyExitConfig,
    pub evt: ViabilityConfig,
    pub monte_carlo: McGateConfig,
    pub liveness: LivenessConfig,
}

/// JSON-pointer prefixes `PipelineConfig` consumes.
pub const PIPELINE_CONFIG_POINTERS: &[&str] = &[
    "/safety",
    "/daily_loss",
    "/time_debt",
    "/hostility",
    "/volatility",
    "/regime",
    "/early_exit",
    "/evt",
    "/monte_carlo",
    "/liveness",
];
