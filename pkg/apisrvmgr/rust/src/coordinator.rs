// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use crate::config::ServerConfig;
use crate::hooks::HookRegistry;
use crate::process::{ProcessStatus, ServerSupervisor, SpawnError, StartOutcome, StopOutcome};
use crate::readiness::{GateOutcome, ReadinessGate};
use crate::state::LifecycleState;
use log::{error, info, warn};
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Error)]
pub enum InitError {
    #[error("failed to start server: {0}")]
    Spawn(#[from] SpawnError),
    #[error("dependent configuration failed: {0}")]
    Config(#[source] anyhow::Error),
}

/// Sequences "start server" then "configure dependent subsystem" as one unit
/// with rollback, and tears both down exactly once on shutdown.
pub struct LifecycleCoordinator {
    supervisor: Arc<Mutex<ServerSupervisor>>,
    gate: ReadinessGate,
    hooks: HookRegistry,
    state: LifecycleState,
}

impl LifecycleCoordinator {
    pub fn new(config: ServerConfig) -> Self {
        let gate = ReadinessGate::new(config.readiness.clone());
        Self {
            supervisor: Arc::new(Mutex::new(ServerSupervisor::new(config))),
            gate,
            hooks: HookRegistry::new(),
            state: LifecycleState::Uninitialized,
        }
    }

    pub fn with_hooks(mut self, hooks: HookRegistry) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Named hook callables for the dependent subsystem.
    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    /// Shared handle to the supervisor, for wiring exit-time cleanup.
    pub fn supervisor(&self) -> Arc<Mutex<ServerSupervisor>> {
        Arc::clone(&self.supervisor)
    }

    fn transition(&mut self, next: LifecycleState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal lifecycle transition {} -> {next}",
            self.state
        );
        info!("lifecycle: {} -> {next}", self.state);
        self.state = next;
    }

    /// Two-phase initialization: spawn the server, gate on readiness, then
    /// run the caller's configuration step. A phase-2 failure rolls the
    /// server back before the original error is surfaced; a phase-1 failure
    /// has nothing to roll back. No-op unless the state is `Uninitialized`.
    pub async fn initialize<F, Fut>(&mut self, configure: F) -> Result<(), InitError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        if self.state != LifecycleState::Uninitialized {
            info!("lifecycle is {}, initialize is a no-op", self.state);
            return Ok(());
        }
        self.transition(LifecycleState::Starting);

        let start_result = self.supervisor.lock().await.start();
        match start_result {
            Ok(StartOutcome::Started(pid)) => info!("server started (pid={pid})"),
            Ok(StartOutcome::AlreadyRunning) => {}
            Err(e) => {
                self.transition(LifecycleState::Stopped);
                return Err(InitError::Spawn(e));
            }
        }

        if self.gate.wait().await == GateOutcome::TimedOut {
            warn!("server readiness deadline passed, continuing optimistically");
        }

        let verify_result = self.supervisor.lock().await.verify_startup().await;
        if let Err(e) = verify_result {
            self.transition(LifecycleState::Stopped);
            return Err(InitError::Spawn(e));
        }
        self.transition(LifecycleState::Ready);

        match configure().await {
            Ok(()) => {
                self.transition(LifecycleState::Running);
                info!("server initialized");
                Ok(())
            }
            Err(e) => {
                self.transition(LifecycleState::ConfigFailed);
                error!("dependent configuration failed, rolling back server: {e:#}");
                match self.supervisor.lock().await.stop().await {
                    Ok(_) => {}
                    // The configuration error is what the caller must see;
                    // a rollback failure is only logged.
                    Err(stop_err) => error!("rollback stop failed: {stop_err}"),
                }
                self.transition(LifecycleState::Stopped);
                Err(InitError::Config(e))
            }
        }
    }

    /// Tear the server down. Idempotent: from `Stopped` this is a no-op, and
    /// stop-path failures are logged, never escalated.
    pub async fn shutdown(&mut self) {
        if self.state.is_terminal() || self.state == LifecycleState::ShuttingDown {
            return;
        }
        self.transition(LifecycleState::ShuttingDown);
        match self.supervisor.lock().await.stop().await {
            Ok(StopOutcome::Stopped) => info!("server stopped"),
            Ok(StopOutcome::NotRunning) => {}
            Err(e) => error!("failed to stop server cleanly: {e}"),
        }
        self.transition(LifecycleState::Stopped);
    }

    /// Non-blocking liveness of the supervised server.
    pub async fn status(&self) -> ProcessStatus {
        self.supervisor.lock().await.status()
    }
}

/// Lifespan-style integration: initialize, hand the coordinator to the host
/// body, and shut down when the body returns, even on error.
pub async fn run_scoped<C, CFut, B, BFut, T>(
    config: ServerConfig,
    hooks: HookRegistry,
    configure: C,
    body: B,
) -> anyhow::Result<T>
where
    C: FnOnce() -> CFut,
    CFut: Future<Output = anyhow::Result<()>>,
    B: FnOnce(Arc<Mutex<LifecycleCoordinator>>) -> BFut,
    BFut: Future<Output = anyhow::Result<T>>,
{
    let coordinator = Arc::new(Mutex::new(LifecycleCoordinator::new(config).with_hooks(hooks)));
    coordinator.lock().await.initialize(configure).await?;
    let result = body(Arc::clone(&coordinator)).await;
    coordinator.lock().await.shutdown().await;
    result
}
