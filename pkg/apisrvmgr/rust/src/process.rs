// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use crate::config::ServerConfig;
use crate::env::child_environment;
use log::{debug, info, warn};
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::collections::VecDeque;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::time::{Duration, sleep};

/// Lines of child output retained per stream for diagnostics.
const OUTPUT_TAIL_LINES: usize = 200;

type OutputTail = Arc<Mutex<VecDeque<String>>>;

#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("failed to spawn {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to assemble server environment: {0}")]
    Environment(#[source] anyhow::Error),
    #[error("failed to query server status: {0}")]
    Status(#[source] std::io::Error),
    #[error("server exited during startup ({status}); stderr:\n{stderr}")]
    ExitedEarly {
        status: std::process::ExitStatus,
        stderr: String,
    },
}

#[derive(Debug, Error)]
pub enum StopError {
    #[error("failed to reap server after SIGKILL: {0}")]
    Reap(#[source] std::io::Error),
}

#[derive(Debug, PartialEq, Eq)]
pub enum StartOutcome {
    Started(u32),
    AlreadyRunning,
}

#[derive(Debug, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped,
    NotRunning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    Running,
    Stopped,
}

/// The spawned server and its captured output tails.
struct SupervisedProcess {
    child: Child,
    pid: u32,
    stdout_tail: OutputTail,
    stderr_tail: OutputTail,
}

impl SupervisedProcess {
    fn signal(&self, sig: Signal) {
        if let Err(e) = signal::kill(Pid::from_raw(self.pid as i32), sig) {
            warn!("failed to send {sig} to server (pid={}): {e}", self.pid);
        }
    }

    fn stderr_snapshot(&self) -> String {
        let tail = self.stderr_tail.lock().unwrap();
        tail.iter().cloned().collect::<Vec<_>>().join("\n")
    }
}

/// Owns the single supervised server process. At most one child is held at a
/// time; all stop paths clear the handle.
pub struct ServerSupervisor {
    config: ServerConfig,
    proc: Option<SupervisedProcess>,
}

impl ServerSupervisor {
    pub fn new(config: ServerConfig) -> Self {
        Self { config, proc: None }
    }

    /// Spawn the server. Idempotent: returns `AlreadyRunning` without
    /// spawning when a process is already held.
    pub fn start(&mut self) -> Result<StartOutcome, SpawnError> {
        if self.proc.is_some() {
            info!("server is already running");
            return Ok(StartOutcome::AlreadyRunning);
        }

        let env = child_environment(&self.config).map_err(SpawnError::Environment)?;

        let mut cmd = Command::new(&self.config.command);
        cmd.args(&self.config.args);
        for (k, v) in env {
            cmd.env(k, v);
        }
        if let Some(ref dir) = self.config.working_dir {
            cmd.current_dir(dir);
        }
        cmd.stdin(Stdio::null());
        cmd.stdout(stdio_from_str(&self.config.stdout));
        cmd.stderr(stdio_from_str(&self.config.stderr));

        let mut child = cmd.spawn().map_err(|source| SpawnError::Spawn {
            command: self.config.command.clone(),
            source,
        })?;

        let pid = child.id().unwrap_or(0);
        let stdout_tail = drain_stdout(&mut child);
        let stderr_tail = drain_stderr(&mut child);

        info!("spawned (pid={pid}, cmd={})", self.config.command);
        self.proc = Some(SupervisedProcess {
            child,
            pid,
            stdout_tail,
            stderr_tail,
        });
        Ok(StartOutcome::Started(pid))
    }

    /// Check that the server survived startup. If it already exited, the
    /// stderr tail is attached to the error and the handle is cleared.
    pub async fn verify_startup(&mut self) -> Result<(), SpawnError> {
        let status = match self.proc.as_mut() {
            None => return Ok(()),
            Some(sp) => match sp.child.try_wait() {
                Ok(None) => return Ok(()),
                Ok(Some(status)) => status,
                Err(e) => return Err(SpawnError::Status(e)),
            },
        };
        // Let the drain task reach EOF before snapshotting.
        sleep(Duration::from_millis(100)).await;
        let stderr = self
            .proc
            .take()
            .map(|sp| sp.stderr_snapshot())
            .unwrap_or_default();
        warn!("server exited during startup with {status}");
        Err(SpawnError::ExitedEarly { status, stderr })
    }

    /// Stop the server: SIGTERM, bounded liveness polling, then SIGKILL and
    /// a blocking reap. Idempotent, and the handle is cleared on every path.
    pub async fn stop(&mut self) -> Result<StopOutcome, StopError> {
        let Some(mut sp) = self.proc.take() else {
            return Ok(StopOutcome::NotRunning);
        };

        info!("stopping server (pid={}), sending SIGTERM", sp.pid);
        sp.signal(Signal::SIGTERM);

        for _ in 0..self.config.stop_poll_attempts() {
            match sp.child.try_wait() {
                Ok(Some(status)) => {
                    info!("server exited with {status}");
                    return Ok(StopOutcome::Stopped);
                }
                Ok(None) => sleep(self.config.stop_poll_interval()).await,
                Err(e) => {
                    warn!("failed to poll server during stop: {e}");
                    break;
                }
            }
        }

        warn!(
            "server did not exit within {} poll(s), sending SIGKILL",
            self.config.stop_poll_attempts()
        );
        sp.signal(Signal::SIGKILL);
        let status = sp.child.wait().await.map_err(StopError::Reap)?;
        info!("server killed ({status})");
        Ok(StopOutcome::Stopped)
    }

    /// Non-blocking liveness check. Reaps the child if it has exited.
    pub fn status(&mut self) -> ProcessStatus {
        let Some(sp) = self.proc.as_mut() else {
            return ProcessStatus::Stopped;
        };
        match sp.child.try_wait() {
            Ok(None) => ProcessStatus::Running,
            Ok(Some(status)) => {
                info!("server exited with {status}");
                self.proc = None;
                ProcessStatus::Stopped
            }
            Err(e) => {
                warn!("failed to poll server status: {e}");
                ProcessStatus::Running
            }
        }
    }

    /// Synchronous best-effort teardown for exit paths with no runtime:
    /// SIGTERM, a short blocking wait, then SIGKILL.
    pub fn kill_now(&mut self) {
        let Some(mut sp) = self.proc.take() else {
            return;
        };
        info!("stopping server (pid={}) during exit cleanup", sp.pid);
        sp.signal(Signal::SIGTERM);
        for _ in 0..20 {
            match sp.child.try_wait() {
                Ok(Some(_)) | Err(_) => return,
                Ok(None) => std::thread::sleep(Duration::from_millis(50)),
            }
        }
        warn!("server ignored SIGTERM during exit cleanup, sending SIGKILL");
        sp.signal(Signal::SIGKILL);
        let _ = sp.child.try_wait();
    }

    pub fn captured_stderr(&self) -> Option<String> {
        self.proc.as_ref().map(|sp| sp.stderr_snapshot())
    }

    pub fn captured_stdout(&self) -> Option<String> {
        self.proc.as_ref().map(|sp| {
            let tail = sp.stdout_tail.lock().unwrap();
            tail.iter().cloned().collect::<Vec<_>>().join("\n")
        })
    }
}

impl Drop for ServerSupervisor {
    fn drop(&mut self) {
        if self.proc.is_some() {
            self.kill_now();
        }
    }
}

fn stdio_from_str(s: &str) -> Stdio {
    match s {
        "capture" => Stdio::piped(),
        "null" => Stdio::null(),
        _ => Stdio::inherit(),
    }
}

fn drain_stdout(child: &mut Child) -> OutputTail {
    let tail: OutputTail = Arc::new(Mutex::new(VecDeque::new()));
    if let Some(stdout) = child.stdout.take() {
        spawn_drain(stdout, Arc::clone(&tail), "stdout");
    }
    tail
}

fn drain_stderr(child: &mut Child) -> OutputTail {
    let tail: OutputTail = Arc::new(Mutex::new(VecDeque::new()));
    if let Some(stderr) = child.stderr.take() {
        spawn_drain(stderr, Arc::clone(&tail), "stderr");
    }
    tail
}

/// Drain a child stream line by line into a bounded tail buffer. Keeps the
/// pipe from filling while retaining recent output for diagnostics.
fn spawn_drain<R>(reader: R, tail: OutputTail, stream: &'static str)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!("[server:{stream}] {line}");
            let mut tail = tail.lock().unwrap();
            if tail.len() == OUTPUT_TAIL_LINES {
                tail.pop_front();
            }
            tail.push_back(line);
        }
    });
}
