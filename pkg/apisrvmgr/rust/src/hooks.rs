// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Payload handed to a hook: the run it fires for and whatever the dependent
/// subsystem attached. The supervisor never inspects the payload.
#[derive(Debug, Clone)]
pub struct HookContext {
    pub run_id: Uuid,
    pub payload: Value,
}

impl HookContext {
    pub fn new(payload: Value) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            payload,
        }
    }
}

pub type HookFn = Arc<dyn Fn(&HookContext) + Send + Sync>;

/// Named hook callables the coordinator hands to the dependent subsystem.
/// The registry is pass-through: the host registers, the subsystem looks up.
#[derive(Default, Clone)]
pub struct HookRegistry {
    hooks: BTreeMap<String, HookFn>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, hook: HookFn) {
        self.hooks.insert(name.into(), hook);
    }

    pub fn get(&self, name: &str) -> Option<&HookFn> {
        self.hooks.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.hooks.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
