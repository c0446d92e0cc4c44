// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use derive_builder::Builder;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use validator::Validate;

pub mod environment_names;

/// Default time a caller waits for a service to become ready
pub const DEFAULT_WAIT_TIMEOUT_SECS: u64 = 30;

/// Readiness watch configuration
/// Defines which EndpointSlices are watched and the default wait budget
#[derive(Serialize, Deserialize, Validate, Debug, Builder, Clone, PartialEq)]
#[builder(build_fn(private, name = "build_internal"), derive(Debug, Serialize))]
pub struct ReadinessConfig {
    /// Namespace to watch. `None` watches every namespace.
    /// Set this at runtime with environment variable READYGATE_READINESS_NAMESPACE
    #[builder(default = "None")]
    #[builder_field_attr(serde(skip_serializing_if = "Option::is_none"))]
    pub namespace: Option<String>,

    /// Extra label selector for the EndpointSlice watch, on top of the service-name label
    /// Set this at runtime with environment variable READYGATE_READINESS_LABEL_SELECTOR
    #[builder(default = "None")]
    #[builder_field_attr(serde(skip_serializing_if = "Option::is_none"))]
    pub label_selector: Option<String>,

    /// Seconds a caller waits for a service to become ready, must be at least 1
    /// Set this at runtime with environment variable READYGATE_READINESS_WAIT_TIMEOUT_SECS
    #[validate(range(min = 1))]
    #[builder(default = "DEFAULT_WAIT_TIMEOUT_SECS")]
    #[builder_field_attr(serde(skip_serializing_if = "Option::is_none"))]
    pub wait_timeout_secs: u64,
}

impl fmt::Display for ReadinessConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "namespace={ns}, ")?,
            None => write!(f, "namespace=all, ")?,
        }
        match &self.label_selector {
            Some(selector) => write!(f, "label_selector={selector}, ")?,
            None => write!(f, "label_selector=none, ")?,
        }
        write!(f, "wait_timeout_secs={}", self.wait_timeout_secs)
    }
}

impl ReadinessConfig {
    pub fn builder() -> ReadinessConfigBuilder {
        ReadinessConfigBuilder::default()
    }

    pub(crate) fn figment() -> Figment {
        Figment::new()
            .merge(Serialized::defaults(ReadinessConfig::default()))
            .merge(Toml::file("/opt/readygate/etc/readiness.toml"))
            .merge(Env::prefixed("READYGATE_READINESS_").filter_map(|k| {
                let full_key = format!("READYGATE_READINESS_{}", k.as_str());
                // filters out empty environment variables
                match std::env::var(&full_key) {
                    Ok(v) if !v.is_empty() => Some(k.into()),
                    _ => None,
                }
            }))
    }

    /// Load the readiness configuration from the environment and configuration files
    /// Configuration is prioritized in the following order, where the last has the lowest priority:
    /// 1. Environment variables prefixed with `READYGATE_READINESS_` (top priority)
    /// 2. /opt/readygate/etc/readiness.toml
    /// 3. Built-in defaults
    pub fn from_settings() -> Result<ReadinessConfig> {
        let config: ReadinessConfig = Self::figment().extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            namespace: None,
            label_selector: None,
            wait_timeout_secs: DEFAULT_WAIT_TIMEOUT_SECS,
        }
    }
}

impl ReadinessConfigBuilder {
    /// Build and validate the readiness configuration
    pub fn build(&self) -> Result<ReadinessConfig> {
        let config = self.build_internal()?;
        config.validate()?;
        Ok(config)
    }
}

/// Check if a string is truthy
/// Used to evaluate boolean environment flags such as `READYGATE_LOGGING_JSONL`.
pub fn is_truthy(val: &str) -> bool {
    matches!(val.to_lowercase().as_str(), "1" | "true" | "on" | "yes")
}

/// Check if an environment variable is set to a truthy value
pub fn env_is_truthy(env: &str) -> bool {
    match std::env::var(env) {
        Ok(val) => is_truthy(val.as_str()),
        Err(_) => false,
    }
}

/// Check whether JSONL logging enabled
/// Set the `READYGATE_LOGGING_JSONL` environment variable a [`is_truthy`] value
pub fn jsonl_logging_enabled() -> bool {
    env_is_truthy(environment_names::logging::READYGATE_LOGGING_JSONL)
}

/// Check whether logging with ANSI terminal escape codes and colors is disabled.
/// Set the `READYGATE_DISABLE_ANSI_LOGGING` environment variable a [`is_truthy`] value
pub fn disable_ansi_logging() -> bool {
    env_is_truthy(environment_names::logging::READYGATE_DISABLE_ANSI_LOGGING)
}

/// Check whether to use local timezone for logging timestamps (default is UTC)
/// Set the `READYGATE_LOG_USE_LOCAL_TZ` environment variable to a [`is_truthy`] value
pub fn use_local_timezone() -> bool {
    env_is_truthy(environment_names::logging::READYGATE_LOG_USE_LOCAL_TZ)
}
