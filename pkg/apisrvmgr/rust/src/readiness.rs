// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use log::{debug, info};
use serde::Deserialize;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{Instant, sleep, timeout};

const PROBE_INTERVAL: Duration = Duration::from_millis(250);

fn default_delay_secs() -> f64 {
    2.0
}

fn default_probe_deadline_secs() -> f64 {
    30.0
}

/// How long to hold off dependent configuration after the server is spawned.
///
/// `fixed-delay` sleeps and declares readiness unconditionally; the dependent
/// step validates over its own channel, so an optimistic gate is acceptable.
/// `tcp-probe` actively attempts connections until the server accepts one or
/// the deadline passes. Neither mode blocks indefinitely.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "policy", rename_all = "kebab-case")]
pub enum ReadinessPolicy {
    FixedDelay {
        #[serde(default = "default_delay_secs")]
        delay_secs: f64,
    },
    TcpProbe {
        addr: String,
        #[serde(default = "default_probe_deadline_secs")]
        deadline_secs: f64,
    },
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        ReadinessPolicy::FixedDelay {
            delay_secs: default_delay_secs(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    Ready,
    TimedOut,
}

pub struct ReadinessGate {
    policy: ReadinessPolicy,
}

impl ReadinessGate {
    pub fn new(policy: ReadinessPolicy) -> Self {
        Self { policy }
    }

    /// Wait until the server is likely accepting connections.
    pub async fn wait(&self) -> GateOutcome {
        match &self.policy {
            ReadinessPolicy::FixedDelay { delay_secs } => {
                debug!("waiting {delay_secs}s for server startup");
                sleep(Duration::from_secs_f64(*delay_secs)).await;
                GateOutcome::Ready
            }
            ReadinessPolicy::TcpProbe {
                addr,
                deadline_secs,
            } => {
                let deadline = Instant::now() + Duration::from_secs_f64(*deadline_secs);
                loop {
                    if let Ok(Ok(_)) = timeout(PROBE_INTERVAL, TcpStream::connect(addr)).await {
                        info!("server accepting connections at {addr}");
                        return GateOutcome::Ready;
                    }
                    if Instant::now() >= deadline {
                        return GateOutcome::TimedOut;
                    }
                    sleep(PROBE_INTERVAL).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_fixed_delay_always_ready() {
        let gate = ReadinessGate::new(ReadinessPolicy::FixedDelay { delay_secs: 0.05 });
        assert_eq!(gate.wait().await, GateOutcome::Ready);
    }

    #[tokio::test]
    async fn test_fixed_delay_actually_waits() {
        let gate = ReadinessGate::new(ReadinessPolicy::FixedDelay { delay_secs: 0.2 });
        let start = std::time::Instant::now();
        gate.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(150));
    }

    #[tokio::test]
    async fn test_tcp_probe_ready_when_listening() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let gate = ReadinessGate::new(ReadinessPolicy::TcpProbe {
            addr,
            deadline_secs: 5.0,
        });
        assert_eq!(gate.wait().await, GateOutcome::Ready);
    }

    #[tokio::test]
    async fn test_tcp_probe_times_out_when_nothing_listening() {
        // Bind and drop to get a port that is very likely closed.
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().to_string()
        };

        let gate = ReadinessGate::new(ReadinessPolicy::TcpProbe {
            addr,
            deadline_secs: 0.5,
        });
        assert_eq!(gate.wait().await, GateOutcome::TimedOut);
    }

    #[tokio::test]
    async fn test_tcp_probe_ready_after_late_bind() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let addr_clone = addr.clone();
        let binder = tokio::spawn(async move {
            sleep(Duration::from_millis(400)).await;
            TcpListener::bind(addr_clone).await.unwrap()
        });

        let gate = ReadinessGate::new(ReadinessPolicy::TcpProbe {
            addr,
            deadline_secs: 5.0,
        });
        assert_eq!(gate.wait().await, GateOutcome::Ready);
        binder.await.unwrap();
    }

    #[test]
    fn test_default_policy_is_fixed_delay() {
        match ReadinessPolicy::default() {
            ReadinessPolicy::FixedDelay { delay_secs } => assert_eq!(delay_secs, 2.0),
            other => panic!("unexpected default policy: {other:?}"),
        }
    }
}
