//! Command handlers for the `urt` binary.
//!
//! Handlers return the process exit code: 0 pass, 2 the evaluated gate
//! said no, 1 (via `Err`) anything went wrong.

pub mod config;
pub mod mc;

use std::process::ExitCode;

use urt_schemas::Permission;

pub const EXIT_OK: u8 = 0;
pub const EXIT_ERROR: u8 = 1;
pub const EXIT_GATE_FAIL: u8 = 2;

/// Config sections the CLI reads besides the pipeline's own.
pub const ROUTER_POINTER: &str = "/router";
pub const RISK_ENGINE_POINTER: &str = "/risk_engine";

pub fn exit_for(pass: bool) -> ExitCode {
    ExitCode::from(if pass { EXIT_OK } else { EXIT_GATE_FAIL })
}

pub fn exit_for_permission(p: Permission) -> ExitCode {
    exit_for(p == Permission::Allow)
}
