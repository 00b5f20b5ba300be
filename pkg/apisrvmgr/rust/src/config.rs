// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use crate::readiness::ReadinessPolicy;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_CONFIG_PATH: &str = "/etc/datadog-agent/apisrv.yaml";

const DEFAULT_STOP_POLL_INTERVAL: Duration = Duration::from_secs(1);
const DEFAULT_STOP_POLL_ATTEMPTS: u32 = 5;

fn default_capture() -> String {
    "capture".to_string()
}

/// Command run after the server is ready, as the launcher's dependent
/// configuration step. A non-zero exit rolls the server back.
#[derive(Debug, Clone, Deserialize)]
pub struct ProvisionConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    #[allow(dead_code)]
    pub description: Option<String>,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    pub environment_file: Option<String>,
    pub working_dir: Option<String>,
    #[serde(default = "default_capture")]
    pub stdout: String,
    #[serde(default = "default_capture")]
    pub stderr: String,
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub api_url: Option<String>,
    #[serde(default)]
    pub readiness: ReadinessPolicy,
    pub stop_poll_interval_secs: Option<f64>,
    pub stop_poll_attempts: Option<u32>,
    pub provision: Option<ProvisionConfig>,
}

impl ServerConfig {
    pub fn stop_poll_interval(&self) -> Duration {
        self.stop_poll_interval_secs
            .map(Duration::from_secs_f64)
            .unwrap_or(DEFAULT_STOP_POLL_INTERVAL)
    }

    pub fn stop_poll_attempts(&self) -> u32 {
        self.stop_poll_attempts.unwrap_or(DEFAULT_STOP_POLL_ATTEMPTS)
    }

    #[cfg(test)]
    pub(crate) fn for_testing(command: &str, args: Vec<&str>) -> Self {
        Self {
            description: None,
            command: command.to_string(),
            args: args.into_iter().map(String::from).collect(),
            env: HashMap::new(),
            environment_file: None,
            working_dir: None,
            stdout: "null".to_string(),
            stderr: "null".to_string(),
            database_url: None,
            log_level: None,
            api_url: None,
            readiness: ReadinessPolicy::FixedDelay { delay_secs: 0.05 },
            stop_poll_interval_secs: Some(0.05),
            stop_poll_attempts: None,
            provision: None,
        }
    }
}

pub fn config_path() -> PathBuf {
    std::env::var("DD_ASM_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Parse the server config. Unlike a config-directory scan there is nothing
/// to skip to here, so unreadable or invalid YAML is a hard error.
pub fn load_config(path: &Path) -> Result<ServerConfig> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let config: ServerConfig =
        serde_yaml::from_str(&contents).with_context(|| format!("parsing {}", path.display()))?;
    Ok(config)
}
