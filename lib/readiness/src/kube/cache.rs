// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Ready Endpoints Cache
//!
//! Tracks, per service key, whether the service currently has at least one routable endpoint,
//! and lets callers wait for a service to become routable instead of polling.
//!
//! The writer side is [`ReadyEndpointsCache::update`], fed with the complete set of
//! EndpointSlices known for a service. Readers either take a point-in-time look with
//! [`ReadyEndpointsCache::has_ready_endpoints`] or block in
//! [`ReadyEndpointsCache::wait_for_ready`], which reports whether the caller had to wait
//! (a cold start).

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use k8s_openapi::api::discovery::v1::EndpointSlice;
use thiserror::Error;
use tokio::sync::Notify;
use tokio::time::{Instant, error::Elapsed};
use tokio_util::sync::CancellationToken;

use super::readiness::has_any_ready_endpoint;

#[derive(Debug, Error)]
pub enum WaitError {
    #[error("timed out waiting for ready endpoints of service {key}: {source}")]
    DeadlineExceeded {
        key: String,
        #[source]
        source: Elapsed,
    },

    #[error("wait for ready endpoints of service {key} was cancelled")]
    Cancelled { key: String },
}

impl WaitError {
    /// The service key the wait was for
    pub fn key(&self) -> &str {
        match self {
            WaitError::DeadlineExceeded { key, .. } | WaitError::Cancelled { key } => key,
        }
    }

    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(self, WaitError::DeadlineExceeded { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, WaitError::Cancelled { .. })
    }
}

/// Readiness state for every known service
#[derive(Debug, Default)]
pub struct ReadyEndpointsCache {
    /// Service key -> has at least one ready endpoint.
    /// A key is present iff its most recent update carried at least one slice.
    ready: DashMap<String, bool>,
    /// Service key -> wake signal for callers blocked in `wait_for_ready`.
    /// Entries exist only while someone is waiting.
    notifiers: DashMap<String, WakeSignal>,
}

/// Wake signal shared by every caller waiting on one key
#[derive(Debug, Default)]
struct WakeSignal {
    notify: Arc<Notify>,
    /// Registered waits; only changed under the map's write lock
    waiters: usize,
}

impl ReadyEndpointsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the known slice set for `key`.
    ///
    /// `slices` must be every slice currently known for the service, not a delta. An empty
    /// set forgets the service. Otherwise the readiness flag is recomputed and all waiters on
    /// `key` are woken, whether or not the flag changed.
    pub fn update<'a, I>(&self, key: &str, slices: I)
    where
        I: IntoIterator<Item = &'a EndpointSlice>,
    {
        let mut slice_count = 0usize;
        let mut ready = false;
        for slice in slices {
            slice_count += 1;
            ready = ready || has_any_ready_endpoint(slice);
        }

        if slice_count == 0 {
            if self.ready.remove(key).is_some() {
                tracing::debug!(service = key, "Service has no EndpointSlices, removed");
            }
            return;
        }

        let previous = self.ready.insert(key.to_string(), ready);
        if previous != Some(ready) {
            tracing::debug!(
                service = key,
                ready,
                slices = slice_count,
                "Service readiness changed"
            );
        }

        // The flag must be visible before waking anyone; waiters re-read it after every wake.
        if let Some(signal) = self.notifiers.get(key) {
            signal.notify.notify_waiters();
        }
    }

    /// Whether `key` is known and has at least one ready endpoint. Never blocks.
    pub fn has_ready_endpoints(&self, key: &str) -> bool {
        self.ready.get(key).is_some_and(|ready| *ready)
    }

    /// Wait until `key` has a ready endpoint.
    ///
    /// Returns `Ok(false)` when the service was already ready and `Ok(true)` (cold start) when
    /// the caller had to suspend first. Fails when `cancel` fires or `deadline` passes before
    /// the service becomes ready.
    pub async fn wait_for_ready(
        &self,
        key: &str,
        cancel: &CancellationToken,
        deadline: Option<Instant>,
    ) -> Result<bool, WaitError> {
        if self.has_ready_endpoints(key) {
            return Ok(false);
        }

        match deadline {
            Some(deadline) => {
                tokio::time::timeout_at(deadline, self.wait_until_ready(key, cancel))
                    .await
                    .map_err(|source| WaitError::DeadlineExceeded {
                        key: key.to_string(),
                        source,
                    })?
            }
            None => self.wait_until_ready(key, cancel).await,
        }
    }

    /// [`wait_for_ready`](Self::wait_for_ready) with a deadline `timeout` from now
    pub async fn wait_for_ready_timeout(
        &self,
        key: &str,
        cancel: &CancellationToken,
        timeout: Duration,
    ) -> Result<bool, WaitError> {
        self.wait_for_ready(key, cancel, Some(Instant::now() + timeout))
            .await
    }

    async fn wait_until_ready(
        &self,
        key: &str,
        cancel: &CancellationToken,
    ) -> Result<bool, WaitError> {
        let registration = self.register(key);
        let mut suspended = false;

        loop {
            // Create the waiter BEFORE checking the flag, so an update landing in between
            // still wakes us.
            let notified = registration.notify.notified();

            if self.has_ready_endpoints(key) {
                if suspended {
                    tracing::debug!(service = key, "Service became ready after waiting");
                }
                return Ok(suspended);
            }

            tracing::trace!(service = key, "No ready endpoints yet, waiting");
            tokio::select! {
                _ = notified => {
                    suspended = true;
                }
                _ = cancel.cancelled() => {
                    return Err(WaitError::Cancelled { key: key.to_string() });
                }
            }
        }
    }

    fn register(&self, key: &str) -> Registration<'_> {
        let notify = {
            let mut signal = self.notifiers.entry(key.to_string()).or_default();
            signal.waiters += 1;
            signal.notify.clone()
        };

        Registration {
            notifiers: &self.notifiers,
            key: key.to_string(),
            notify,
        }
    }
}

/// Interest of one in-flight wait in a key's wake signal.
/// Dropping the last registration for a key removes the signal.
struct Registration<'a> {
    notifiers: &'a DashMap<String, WakeSignal>,
    key: String,
    notify: Arc<Notify>,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        if let Entry::Occupied(mut entry) = self.notifiers.entry(std::mem::take(&mut self.key)) {
            let signal = entry.get_mut();
            signal.waiters = signal.waiters.saturating_sub(1);
            if signal.waiters == 0 {
                entry.remove();
            }
        }
    }
}
