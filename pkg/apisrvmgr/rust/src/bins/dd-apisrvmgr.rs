// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use anyhow::{Context, Result};
use clap::Parser;
use dd_apisrvmgr::config::{self, ProvisionConfig};
use dd_apisrvmgr::coordinator::LifecycleCoordinator;
use dd_apisrvmgr::shutdown::{ExitGuard, ShutdownRegistration, SignalBridge};
use log::info;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tokio::sync::Mutex;

#[derive(Parser)]
#[command(name = "dd-apisrvmgr", version, about = "Supervise an embedded API server")]
struct Cli {
    /// Path to the server config. Falls back to DD_ASM_CONFIG, then the
    /// packaged default.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, default_value = "info")]
    log_level: log::Level,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    simple_logger::init_with_level(cli.log_level)?;
    info!(
        "dd-apisrvmgr starting (version {})",
        env!("CARGO_PKG_VERSION")
    );

    let path = cli.config.unwrap_or_else(config::config_path);
    let cfg = config::load_config(&path)?;
    let provision = cfg.provision.clone();

    let coordinator = Arc::new(Mutex::new(LifecycleCoordinator::new(cfg)));
    let registration = ShutdownRegistration::new();
    let supervisor = coordinator.lock().await.supervisor();
    let _exit_guard = ExitGuard::new(supervisor, Arc::clone(&registration));
    let signals = SignalBridge::install(Arc::clone(&coordinator), Arc::clone(&registration))?;

    coordinator
        .lock()
        .await
        .initialize(|| run_provision(provision))
        .await
        .context("initialization failed")?;

    info!("server running, waiting for shutdown signal");
    signals.await?;
    Ok(())
}

/// The launcher's dependent configuration step: run the configured provision
/// command to completion. Absent command means nothing to configure.
async fn run_provision(provision: Option<ProvisionConfig>) -> Result<()> {
    let Some(p) = provision else {
        info!("no provision step configured");
        return Ok(());
    };
    info!("running provision step: {} {:?}", p.command, p.args);
    let status = Command::new(&p.command)
        .args(&p.args)
        .stdin(Stdio::null())
        .status()
        .await
        .with_context(|| format!("failed to execute provision command: {}", p.command))?;
    if !status.success() {
        anyhow::bail!("provision command failed with {status}");
    }
    info!("provision step completed");
    Ok(())
}
