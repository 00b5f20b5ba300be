// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Coordinator built, server never started.
    Uninitialized,
    /// Server spawn in progress, readiness not yet established.
    Starting,
    /// Server presumed accepting connections, dependent configuration pending.
    Ready,
    /// Dependent configuration failed, rollback in progress.
    ConfigFailed,
    /// Server up and dependent subsystem configured.
    Running,
    /// Teardown in progress.
    ShuttingDown,
    /// Terminal. Server confirmed gone (or never started).
    Stopped,
}

impl LifecycleState {
    pub fn is_terminal(self) -> bool {
        self == LifecycleState::Stopped
    }

    pub(crate) fn can_transition_to(self, next: LifecycleState) -> bool {
        use LifecycleState::*;
        matches!(
            (self, next),
            (Uninitialized, Starting)
                | (Starting, Ready)
                | (Starting, Stopped)
                | (Ready, ConfigFailed)
                | (Ready, Running)
                | (ConfigFailed, Stopped)
                | (Uninitialized, ShuttingDown)
                | (Starting, ShuttingDown)
                | (Ready, ShuttingDown)
                | (Running, ShuttingDown)
                | (ShuttingDown, Stopped)
        )
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleState::Uninitialized => write!(f, "uninitialized"),
            LifecycleState::Starting => write!(f, "starting"),
            LifecycleState::Ready => write!(f, "ready"),
            LifecycleState::ConfigFailed => write!(f, "config-failed"),
            LifecycleState::Running => write!(f, "running"),
            LifecycleState::ShuttingDown => write!(f, "shutting-down"),
            LifecycleState::Stopped => write!(f, "stopped"),
        }
    }
}
