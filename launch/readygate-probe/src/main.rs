// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Block until every listed Kubernetes service has at least one ready endpoint.
//!
//! Exits with a non-zero status when any service does not become ready in time.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use clap::Parser;
use futures::future::join_all;

use readygate::kube::split_service_key;
use readygate::{
    CancellationToken, EndpointSliceInformer, ReadinessConfig, ReadyEndpointsCache, WaitError,
    logging,
};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Flags {
    /// Service to wait for, as `namespace/name`. Repeat for several services.
    #[arg(long = "service", required = true, value_parser = parse_service_key)]
    services: Vec<String>,

    /// How long to wait, e.g. `30s` or `2m`. Defaults to the configured wait timeout.
    #[arg(long, value_parser = humantime::parse_duration)]
    timeout: Option<Duration>,

    /// Only watch EndpointSlices in this namespace
    #[arg(long, env = "READYGATE_READINESS_NAMESPACE")]
    namespace: Option<String>,

    /// Extra label selector for the EndpointSlice watch
    #[arg(long, env = "READYGATE_READINESS_LABEL_SELECTOR")]
    label_selector: Option<String>,
}

fn parse_service_key(s: &str) -> Result<String, String> {
    match split_service_key(s) {
        Some(_) => Ok(s.to_string()),
        None => Err(format!("'{s}' is not of the form namespace/name")),
    }
}

impl Flags {
    /// Flags given on the command line win over configuration
    fn apply(&self, mut config: ReadinessConfig) -> ReadinessConfig {
        if let Some(namespace) = self.namespace.as_ref().filter(|ns| !ns.is_empty()) {
            config.namespace = Some(namespace.clone());
        }
        if let Some(selector) = self.label_selector.as_ref().filter(|s| !s.is_empty()) {
            config.label_selector = Some(selector.clone());
        }
        config
    }

    fn timeout(&self, config: &ReadinessConfig) -> Duration {
        self.timeout.unwrap_or_else(|| config.wait_timeout())
    }
}

/// Wait for one service and log how it went
async fn wait_for_service(
    cache: &ReadyEndpointsCache,
    service: &str,
    cancel: &CancellationToken,
    timeout: Duration,
) -> Result<bool, WaitError> {
    let started = tokio::time::Instant::now();
    let result = cache.wait_for_ready_timeout(service, cancel, timeout).await;
    match &result {
        Ok(cold_start) => tracing::info!(
            service,
            cold_start,
            waited = %humantime::format_duration(started.elapsed()),
            "Service is ready"
        ),
        Err(e) => tracing::error!(
            service,
            waited = %humantime::format_duration(started.elapsed()),
            "{e}"
        ),
    }
    result
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();
    let flags = Flags::parse();

    let config = flags.apply(ReadinessConfig::from_settings()?);
    let timeout = flags.timeout(&config);
    tracing::info!(%config, timeout = %humantime::format_duration(timeout), "readygate-probe starting");

    let client = kube::Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    let cancel = CancellationToken::new();
    let cache = Arc::new(ReadyEndpointsCache::new());

    let (api, watch_config) = EndpointSliceInformer::watch_scope(client, &config);
    let informer = tokio::spawn(EndpointSliceInformer::new(cache.clone()).run(
        api,
        watch_config,
        cancel.child_token(),
    ));

    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Received Ctrl-C, cancelling");
                cancel.cancel();
            }
        });
    }

    let waits = flags
        .services
        .iter()
        .map(|service| wait_for_service(&cache, service, &cancel, timeout));
    let failed = join_all(waits)
        .await
        .into_iter()
        .filter(Result::is_err)
        .count();

    cancel.cancel();
    match informer.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!("Informer exited with error: {e:#}"),
        Err(e) => tracing::warn!("Informer task failed: {e}"),
    }

    if failed > 0 {
        anyhow::bail!(
            "{failed} of {} services did not become ready",
            flags.services.len()
        );
    }
    Ok(())
}
