// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use crate::config::ServerConfig;
use anyhow::{Context, Result};

/// Env var names the supervised server reads for its own backing store and
/// surface. Values come from the config convenience fields; an explicit
/// `env:` entry with the same name wins.
pub const ENV_DATABASE_URL: &str = "APISRV_DATABASE_CONNECTION_URL";
pub const ENV_LOG_LEVEL: &str = "APISRV_LOGGING_LEVEL";
pub const ENV_API_URL: &str = "APISRV_API_URL";

/// Parse a systemd-style environment file into key-value pairs.
/// Supports `KEY=VALUE`, `KEY="VALUE"`, `KEY='VALUE'`, comments (#), and blank lines.
pub fn parse_environment_file(path: &str) -> Result<Vec<(String, String)>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading environment file: {path}"))?;
    let mut vars = Vec::new();
    for line in contents.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        if let Some((key, raw_val)) = trimmed.split_once('=') {
            let val = raw_val
                .trim()
                .trim_matches('"')
                .trim_matches('\'')
                .to_string();
            vars.push((key.trim().to_string(), val));
        }
    }
    Ok(vars)
}

/// Assemble the environment the server is spawned with, lowest precedence
/// first: environment file, convenience fields, explicit `env:` entries.
/// Later entries override earlier ones for the same key when applied.
pub fn child_environment(config: &ServerConfig) -> Result<Vec<(String, String)>> {
    let mut vars = Vec::new();

    if let Some(ref path) = config.environment_file {
        vars.extend(parse_environment_file(path)?);
    }

    if let Some(ref url) = config.database_url {
        vars.push((ENV_DATABASE_URL.to_string(), url.clone()));
    }
    if let Some(ref level) = config.log_level {
        vars.push((ENV_LOG_LEVEL.to_string(), level.clone()));
    }
    if let Some(ref url) = config.api_url {
        vars.push((ENV_API_URL.to_string(), url.clone()));
    }

    for (k, v) in &config.env {
        vars.push((k.clone(), v.clone()));
    }

    Ok(vars)
}
