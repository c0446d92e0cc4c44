// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::Result;
use futures::StreamExt;
use k8s_openapi::api::discovery::v1::EndpointSlice;
use kube::{
    Api, Client as KubeClient,
    runtime::{WatchStreamExt, watcher, watcher::Event},
};
use tokio_util::sync::CancellationToken;

use super::cache::ReadyEndpointsCache;
use super::tombstone::{WatchObject, endpoint_slice_from_delete_obj};
use super::utils::{SERVICE_NAME_LABEL, service_key_for_slice, slice_id};
use crate::config::ReadinessConfig;

/// Slices currently known, grouped by the service they belong to
#[derive(Debug, Default)]
struct SliceIndex {
    /// service key -> slice id -> slice
    by_service: HashMap<String, HashMap<String, EndpointSlice>>,
    /// slice id -> service key
    owners: HashMap<String, String>,
}

impl SliceIndex {
    /// Insert or replace a slice. Returns the service the slice belonged to before, if that
    /// was a different one.
    fn upsert(&mut self, id: String, key: String, slice: EndpointSlice) -> Option<String> {
        let previous = self
            .owners
            .insert(id.clone(), key.clone())
            .filter(|previous| *previous != key);

        if let Some(previous) = &previous {
            self.remove_from_service(previous, &id);
        }

        self.by_service.entry(key).or_default().insert(id, slice);
        previous
    }

    /// Remove a slice, returning the service it belonged to
    fn remove(&mut self, id: &str) -> Option<String> {
        let key = self.owners.remove(id)?;
        self.remove_from_service(&key, id);
        Some(key)
    }

    fn remove_from_service(&mut self, key: &str, id: &str) {
        if let Some(slices) = self.by_service.get_mut(key) {
            slices.remove(id);
            if slices.is_empty() {
                self.by_service.remove(key);
            }
        }
    }

    fn slices(&self, key: &str) -> impl Iterator<Item = &EndpointSlice> {
        self.by_service
            .get(key)
            .into_iter()
            .flat_map(|slices| slices.values())
    }

    fn get(&self, id: &str) -> Option<&EndpointSlice> {
        let key = self.owners.get(id)?;
        self.by_service.get(key)?.get(id)
    }
}

fn label_selector(extra: Option<&str>) -> String {
    match extra.map(str::trim) {
        Some(extra) if !extra.is_empty() => format!("{SERVICE_NAME_LABEL},{extra}"),
        _ => SERVICE_NAME_LABEL.to_string(),
    }
}

/// Feeds a [`ReadyEndpointsCache`] from a stream of EndpointSlice watch events.
///
/// Every change to a slice results in an update carrying all slices of the affected service.
/// Slices that disappear while the watch is re-listing are delivered as tombstones.
pub struct EndpointSliceInformer {
    cache: Arc<ReadyEndpointsCache>,
    index: SliceIndex,
    /// Slice ids seen since the current relist started
    relisted: Option<HashSet<String>>,
}

impl EndpointSliceInformer {
    pub fn new(cache: Arc<ReadyEndpointsCache>) -> Self {
        Self {
            cache,
            index: SliceIndex::default(),
            relisted: None,
        }
    }

    /// Build the EndpointSlice API handle and watch configuration for `config`.
    ///
    /// Only slices carrying the service-name label are watched; a configured label selector
    /// narrows that further.
    pub fn watch_scope(
        client: KubeClient,
        config: &ReadinessConfig,
    ) -> (Api<EndpointSlice>, watcher::Config) {
        let api = match config.namespace.as_deref() {
            Some(namespace) => Api::namespaced(client, namespace),
            None => Api::all(client),
        };

        let selector = label_selector(config.label_selector.as_deref());
        (api, watcher::Config::default().labels(&selector))
    }

    /// Watch EndpointSlices until `cancel` fires.
    ///
    /// Watch errors are logged and retried with backoff; they never end the loop.
    pub async fn run(
        mut self,
        api: Api<EndpointSlice>,
        watch_config: watcher::Config,
        cancel: CancellationToken,
    ) -> Result<()> {
        tracing::info!("EndpointSlice informer starting");

        let stream = watcher(api, watch_config).default_backoff();
        futures::pin_mut!(stream);

        loop {
            tokio::select! {
                next = stream.next() => match next {
                    Some(Ok(event)) => self.handle_event(event),
                    Some(Err(e)) => {
                        tracing::warn!("EndpointSlice watcher error: {}", e);
                    }
                    None => anyhow::bail!("EndpointSlice watch stream ended unexpectedly"),
                },
                _ = cancel.cancelled() => {
                    tracing::info!("EndpointSlice informer received cancellation");
                    break;
                }
            }
        }

        tracing::info!("EndpointSlice informer stopped");
        Ok(())
    }

    /// Apply one watch event to the index and the cache
    pub fn handle_event(&mut self, event: Event<EndpointSlice>) {
        match event {
            Event::Apply(slice) => self.on_apply(slice),
            Event::Delete(slice) => self.on_delete(WatchObject::EndpointSlice(slice)),
            Event::Init => {
                tracing::debug!("EndpointSlice relist started");
                self.relisted = Some(HashSet::new());
            }
            Event::InitApply(slice) => {
                if let (Some(seen), Some(id)) = (self.relisted.as_mut(), slice_id(&slice)) {
                    seen.insert(id);
                }
                self.on_apply(slice);
            }
            Event::InitDone => self.finish_relist(),
        }
    }

    fn on_apply(&mut self, slice: EndpointSlice) {
        let Some(id) = slice_id(&slice) else {
            tracing::debug!("Ignoring EndpointSlice without a name");
            return;
        };

        let Some(key) = service_key_for_slice(&slice) else {
            tracing::debug!(slice = %id, "Ignoring EndpointSlice not owned by a service");
            // It may have been owned before the label was dropped
            if let Some(previous) = self.index.remove(&id) {
                self.publish(&previous);
            }
            return;
        };

        if let Some(previous) = self.index.upsert(id, key.clone(), slice) {
            self.publish(&previous);
        }
        self.publish(&key);
    }

    fn on_delete(&mut self, obj: WatchObject) {
        let slice = match endpoint_slice_from_delete_obj(obj) {
            Ok(slice) => slice,
            Err(e) => {
                tracing::warn!("Skipping EndpointSlice delete event: {}", e);
                return;
            }
        };

        let Some(id) = slice_id(&slice) else {
            return;
        };
        if let Some(key) = self.index.remove(&id) {
            self.publish(&key);
        }
    }

    /// Deliver tombstones for every slice the relist did not return
    fn finish_relist(&mut self) {
        let Some(seen) = self.relisted.take() else {
            return;
        };

        let stale: Vec<(String, EndpointSlice)> = self
            .index
            .owners
            .keys()
            .filter(|id| !seen.contains(*id))
            .filter_map(|id| Some((id.clone(), self.index.get(id)?.clone())))
            .collect();

        tracing::debug!(
            relisted = seen.len(),
            stale = stale.len(),
            "EndpointSlice relist finished"
        );

        for (id, last_known) in stale {
            self.on_delete(WatchObject::tombstone(id, last_known));
        }
    }

    fn publish(&self, key: &str) {
        self.cache.update(key, self.index.slices(key));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::discovery::v1::{Endpoint, EndpointConditions};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use std::collections::BTreeMap;

    fn slice(name: &str, service: Option<&str>, ready: Option<bool>) -> EndpointSlice {
        EndpointSlice {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("testns".to_string()),
                labels: service.map(|s| {
                    BTreeMap::from([(SERVICE_NAME_LABEL.to_string(), s.to_string())])
                }),
                ..Default::default()
            },
            address_type: "IPv4".to_string(),
            endpoints: vec![Endpoint {
                addresses: vec!["10.0.0.1".to_string()],
                conditions: Some(EndpointConditions {
                    ready,
                    ..Default::default()
                }),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    fn informer() -> (EndpointSliceInformer, Arc<ReadyEndpointsCache>) {
        let cache = Arc::new(ReadyEndpointsCache::new());
        (EndpointSliceInformer::new(cache.clone()), cache)
    }

    #[test]
    fn test_aggregates_slices_per_service() {
        let (mut informer, cache) = informer();
        let key = "testns/testsvc";

        informer.handle_event(Event::Apply(slice("testsvc-a", Some("testsvc"), Some(false))));
        assert!(!cache.has_ready_endpoints(key));

        informer.handle_event(Event::Apply(slice("testsvc-b", Some("testsvc"), None)));
        assert!(cache.has_ready_endpoints(key));

        // Deleting the ready slice leaves a known, not ready service
        informer.handle_event(Event::Delete(slice("testsvc-b", Some("testsvc"), None)));
        assert!(!cache.has_ready_endpoints(key));
        assert_eq!(informer.index.slices(key).count(), 1);

        informer.handle_event(Event::Delete(slice("testsvc-a", Some("testsvc"), Some(false))));
        assert_eq!(informer.index.slices(key).count(), 0);
        assert!(informer.index.owners.is_empty());
    }

    #[test]
    fn test_update_replaces_previous_state_of_slice() {
        let (mut informer, cache) = informer();
        let key = "testns/testsvc";

        informer.handle_event(Event::Apply(slice("testsvc-a", Some("testsvc"), Some(true))));
        assert!(cache.has_ready_endpoints(key));

        informer.handle_event(Event::Apply(slice("testsvc-a", Some("testsvc"), Some(false))));
        assert!(!cache.has_ready_endpoints(key));
        assert_eq!(informer.index.slices(key).count(), 1);
    }

    #[test]
    fn test_ignores_slices_without_service_label() {
        let (mut informer, _cache) = informer();

        informer.handle_event(Event::Apply(slice("orphan", None, Some(true))));
        assert!(informer.index.owners.is_empty());
    }

    #[test]
    fn test_slice_moving_between_services() {
        let (mut informer, cache) = informer();

        informer.handle_event(Event::Apply(slice("shared", Some("svc-one"), Some(true))));
        assert!(cache.has_ready_endpoints("testns/svc-one"));

        informer.handle_event(Event::Apply(slice("shared", Some("svc-two"), Some(true))));
        assert!(!cache.has_ready_endpoints("testns/svc-one"));
        assert!(cache.has_ready_endpoints("testns/svc-two"));

        informer.handle_event(Event::Apply(slice("shared", None, Some(true))));
        assert!(!cache.has_ready_endpoints("testns/svc-two"));
        assert!(informer.index.owners.is_empty());
    }

    #[test]
    fn test_relist_removes_vanished_slices() {
        let (mut informer, cache) = informer();

        informer.handle_event(Event::Apply(slice("keep-a", Some("keep"), Some(true))));
        informer.handle_event(Event::Apply(slice("gone-a", Some("gone"), Some(true))));
        assert!(cache.has_ready_endpoints("testns/gone"));

        informer.handle_event(Event::Init);
        informer.handle_event(Event::InitApply(slice("keep-a", Some("keep"), Some(true))));
        // Not yet known to be gone until the relist completes
        assert!(cache.has_ready_endpoints("testns/gone"));
        informer.handle_event(Event::InitDone);

        assert!(cache.has_ready_endpoints("testns/keep"));
        assert!(!cache.has_ready_endpoints("testns/gone"));
        assert!(informer.index.get("testns/gone-a").is_none());
        assert!(informer.relisted.is_none());
    }

    #[test]
    fn test_malformed_delete_is_skipped() {
        let (mut informer, cache) = informer();
        informer.handle_event(Event::Apply(slice("testsvc-a", Some("testsvc"), Some(true))));

        informer.on_delete(WatchObject::tombstone(
            "testns/testsvc-a",
            serde_json::json!("not-an-endpointslice"),
        ));

        assert!(cache.has_ready_endpoints("testns/testsvc"));
        assert!(informer.index.get("testns/testsvc-a").is_some());
    }

    #[test]
    fn test_label_selector() {
        assert_eq!(label_selector(None), "kubernetes.io/service-name");
        assert_eq!(label_selector(Some("  ")), "kubernetes.io/service-name");
        assert_eq!(
            label_selector(Some("app=web")),
            "kubernetes.io/service-name,app=web"
        );
    }
}
