// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use crate::coordinator::LifecycleCoordinator;
use crate::process::ServerSupervisor;
use log::{info, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::Mutex;

/// One-shot guard all stop triggers converge on: signal delivery, normal
/// exit, explicit shutdown. Whoever wins the swap runs the stop sequence;
/// everyone else backs off.
#[derive(Debug, Default)]
pub struct ShutdownRegistration {
    fired: AtomicBool,
}

impl ShutdownRegistration {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Returns true exactly once, for the first caller.
    pub fn try_fire(&self) -> bool {
        !self.fired.swap(true, Ordering::SeqCst)
    }

    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }
}

/// Routes SIGINT and SIGTERM into the coordinator's shutdown path, then
/// exits the host with a success code.
pub struct SignalBridge;

impl SignalBridge {
    /// Install the signal listeners. Must be called from within a tokio
    /// runtime. The returned task runs until a signal arrives and never
    /// completes normally: it exits the process with code 0 after cleanup.
    pub fn install(
        coordinator: Arc<Mutex<LifecycleCoordinator>>,
        registration: Arc<ShutdownRegistration>,
    ) -> std::io::Result<tokio::task::JoinHandle<()>> {
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        Ok(tokio::spawn(async move {
            tokio::select! {
                _ = sigterm.recv() => info!("received SIGTERM"),
                _ = sigint.recv() => info!("received SIGINT"),
            }
            if registration.try_fire() {
                coordinator.lock().await.shutdown().await;
            } else {
                info!("shutdown already executed, ignoring signal");
            }
            std::process::exit(0);
        }))
    }
}

/// Covers the exit path no signal reaches: dropped at the end of the host's
/// life, it stops the server if shutdown has not already run.
pub struct ExitGuard {
    supervisor: Arc<Mutex<ServerSupervisor>>,
    registration: Arc<ShutdownRegistration>,
}

impl ExitGuard {
    pub fn new(
        supervisor: Arc<Mutex<ServerSupervisor>>,
        registration: Arc<ShutdownRegistration>,
    ) -> Self {
        Self {
            supervisor,
            registration,
        }
    }
}

impl Drop for ExitGuard {
    fn drop(&mut self) {
        if !self.registration.try_fire() {
            return;
        }
        // No runtime is guaranteed to be live here, so the stop is the
        // synchronous best-effort variant.
        match self.supervisor.try_lock() {
            Ok(mut supervisor) => supervisor.kill_now(),
            Err(_) => warn!("supervisor busy at exit, leaving stop to the active caller"),
        }
    }
}
