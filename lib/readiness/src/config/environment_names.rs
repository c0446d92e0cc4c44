// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Environment variable name constants
//!
//! Every environment variable readygate reads is named here, grouped by functional area:
//! - **Logging**: log filters, output format and timestamps
//! - **Readiness**: which EndpointSlices are watched and how long waits may take

/// Logging environment variables
pub mod logging {
    /// Log filter directives (e.g., "debug", "readygate=trace,kube=warn")
    pub const READYGATE_LOG: &str = "READYGATE_LOG";

    /// Path to a logging configuration TOML file
    pub const READYGATE_LOGGING_CONFIG_PATH: &str = "READYGATE_LOGGING_CONFIG_PATH";

    /// Emit one JSON object per log line
    pub const READYGATE_LOGGING_JSONL: &str = "READYGATE_LOGGING_JSONL";

    /// Disable ANSI terminal colors in readable logs
    pub const READYGATE_DISABLE_ANSI_LOGGING: &str = "READYGATE_DISABLE_ANSI_LOGGING";

    /// Use local timezone for logging timestamps (default is UTC)
    pub const READYGATE_LOG_USE_LOCAL_TZ: &str = "READYGATE_LOG_USE_LOCAL_TZ";
}

/// Readiness watch configuration
///
/// All of these map onto [`crate::config::ReadinessConfig`] fields through the
/// `READYGATE_READINESS_` prefix.
pub mod readiness {
    /// Namespace to watch; unset watches all namespaces
    pub const READYGATE_READINESS_NAMESPACE: &str = "READYGATE_READINESS_NAMESPACE";

    /// Extra label selector applied to the EndpointSlice watch
    pub const READYGATE_READINESS_LABEL_SELECTOR: &str = "READYGATE_READINESS_LABEL_SELECTOR";

    /// Default time in seconds a caller waits for a service to become ready
    pub const READYGATE_READINESS_WAIT_TIMEOUT_SECS: &str =
        "READYGATE_READINESS_WAIT_TIMEOUT_SECS";
}
