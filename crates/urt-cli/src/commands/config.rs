//! `urt config-hash` / `urt config-check`.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};

use urt_config::{load_layered_yaml, report_unused_keys, UnusedKeyPolicy};
use urt_pipeline::{GatePipeline, NullSink, PipelineConfig, PIPELINE_CONFIG_POINTERS};
use urt_risk::{FileReportSource, McConfig};
use urt_strategy::{RegimeRouter, RouterConfig};

use super::{EXIT_OK, RISK_ENGINE_POINTER, ROUTER_POINTER};

pub fn hash(paths: &[String]) -> Result<ExitCode> {
    let loaded = load_layered_yaml(paths)?;
    println!("config_hash={}", loaded.config_hash);
    println!("{}", loaded.canonical_json);
    Ok(ExitCode::from(EXIT_OK))
}

/// Every pointer prefix some `urt` component reads.
pub fn consumed_pointers() -> Vec<&'static str> {
    let mut v: Vec<&'static str> = PIPELINE_CONFIG_POINTERS.to_vec();
    v.push(ROUTER_POINTER);
    v.push(RISK_ENGINE_POINTER);
    v
}

pub fn check(paths: &[String], strict: bool) -> Result<ExitCode> {
    let loaded = load_layered_yaml(paths)?;

    let pipeline_cfg: PipelineConfig = loaded.typed().context("pipeline config")?;
    let router_cfg: RouterConfig = loaded.section(ROUTER_POINTER)?;
    let engine_cfg: McConfig = loaded.section(RISK_ENGINE_POINTER)?;

    // Construction is the validation; the liveness file is not opened here.
    let pipeline = GatePipeline::from_config(
        &pipeline_cfg,
        Arc::new(FileReportSource::new()),
        Box::new(NullSink),
    )
    .context("pipeline construction failed")?;
    RegimeRouter::new(router_cfg).context("router construction failed")?;
    engine_cfg.validate().context("risk_engine config invalid")?;

    let policy = if strict {
        UnusedKeyPolicy::Fail
    } else {
        UnusedKeyPolicy::Warn
    };
    let report = report_unused_keys(
        "config-check",
        &consumed_pointers(),
        &loaded.config_json,
        policy,
    )?;

    println!("config_ok=true config_hash={}", loaded.config_hash);
    println!("gates={}", pipeline.gate_names().join(","));
    println!("unused_keys={}", report.unused_leaf_pointers.len());
    for p in &report.unused_leaf_pointers {
        println!("unused={p}");
    }
    Ok(ExitCode::from(EXIT_OK))
}
