// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Readygate
//!
//! Tracks which Kubernetes services currently have at least one ready endpoint, as reported by
//! their EndpointSlices, and lets callers wait until a service becomes ready.

pub use anyhow::{Context as ErrorContext, Error, Result, anyhow as error, bail as raise};

pub mod config;
pub use config::{ReadinessConfig, ReadinessConfigBuilder};

pub mod kube;
pub use kube::{EndpointSliceInformer, ReadyEndpointsCache, WaitError};

pub mod logging;

pub use tokio_util::sync::CancellationToken;
