// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Lifecycle supervision for an embedded API server.
//!
//! The host application starts a single external server process, waits until
//! it is likely accepting connections, configures a dependent in-process
//! subsystem against it, and is guaranteed exactly-once teardown on signal
//! or normal exit. Phase 2 failing rolls phase 1 back: either the server is
//! up and configured, or neither is left half-alive.

pub mod config;
pub mod coordinator;
pub mod env;
pub mod hooks;
pub mod process;
pub mod readiness;
pub mod shutdown;
pub mod state;

pub use config::{ProvisionConfig, ServerConfig, config_path, load_config};
pub use coordinator::{InitError, LifecycleCoordinator, run_scoped};
pub use hooks::{HookContext, HookFn, HookRegistry};
pub use process::{
    ProcessStatus, ServerSupervisor, SpawnError, StartOutcome, StopError, StopOutcome,
};
pub use readiness::{GateOutcome, ReadinessGate, ReadinessPolicy};
pub use shutdown::{ExitGuard, ShutdownRegistration, SignalBridge};
pub use state::LifecycleState;
