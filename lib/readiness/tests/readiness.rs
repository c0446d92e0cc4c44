// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use k8s_openapi::api::discovery::v1::{Endpoint, EndpointConditions, EndpointSlice};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::runtime::watcher::Event;

use readygate::kube::{SERVICE_NAME_LABEL, WatchObject, endpoint_slice_from_delete_obj, service_key};
use readygate::{CancellationToken, EndpointSliceInformer, ReadyEndpointsCache};

fn slice(namespace: &str, service: &str, name: &str, ready: Option<bool>) -> EndpointSlice {
    EndpointSlice {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(BTreeMap::from([(
                SERVICE_NAME_LABEL.to_string(),
                service.to_string(),
            )])),
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

#[tokio::test]
async fn test_many_waiters_all_cold_start() {
    let cache = Arc::new(ReadyEndpointsCache::new());
    let cancel = CancellationToken::new();
    let key = service_key("testns", "testsvc");

    let waiters: Vec<_> = (0..16)
        .map(|_| {
            let cache = cache.clone();
            let cancel = cancel.clone();
            let key = key.clone();
            tokio::spawn(async move {
                cache
                    .wait_for_ready_timeout(&key, &cancel, Duration::from_secs(2))
                    .await
            })
        })
        .collect();

    tokio::time::sleep(Duration::from_millis(100)).await;
    cache.update(&key, &[slice("testns", "testsvc", "testsvc-abc", Some(true))]);

    for result in futures::future::join_all(waiters).await {
        assert!(result.unwrap().unwrap(), "every waiter had to suspend");
    }
}

#[tokio::test]
async fn test_waiters_on_other_keys_are_unaffected() {
    let cache = Arc::new(ReadyEndpointsCache::new());
    let cancel = CancellationToken::new();
    let ready_key = service_key("testns", "web");
    let idle_key = service_key("testns", "db");

    let idle = {
        let cache = cache.clone();
        let cancel = cancel.clone();
        let key = idle_key.clone();
        tokio::spawn(async move { cache.wait_for_ready(&key, &cancel, None).await })
    };

    cache.update(&ready_key, &[slice("testns", "web", "web-1", Some(true))]);
    assert!(
        !cache
            .wait_for_ready_timeout(&ready_key, &cancel, Duration::from_secs(1))
            .await
            .unwrap()
    );

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!idle.is_finished());

    cancel.cancel();
    let err = idle.await.unwrap().unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(err.key(), idle_key);
    assert!(!cache.has_ready_endpoints(&idle_key));
}

#[tokio::test]
async fn test_informer_wakes_waiter() {
    let cache = Arc::new(ReadyEndpointsCache::new());
    let mut informer = EndpointSliceInformer::new(cache.clone());
    let cancel = CancellationToken::new();
    let key = service_key("testns", "testsvc");

    let waiter = {
        let cache = cache.clone();
        let cancel = cancel.clone();
        let key = key.clone();
        tokio::spawn(async move {
            cache
                .wait_for_ready_timeout(&key, &cancel, Duration::from_secs(2))
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    // A slice that is not ready yet keeps the waiter parked
    informer.handle_event(Event::Apply(slice("testns", "testsvc", "a", Some(false))));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!waiter.is_finished());

    informer.handle_event(Event::Apply(slice("testns", "testsvc", "b", None)));
    assert!(waiter.await.unwrap().unwrap());
    assert!(cache.has_ready_endpoints(&key));

    informer.handle_event(Event::Delete(slice("testns", "testsvc", "b", None)));
    assert!(!cache.has_ready_endpoints(&key));
}

#[test]
fn test_delete_obj_through_tombstone() {
    let deleted = slice("testns", "testsvc", "testsvc-abc", Some(true));
    let obj = WatchObject::tombstone("testns/testsvc-abc", deleted.clone());
    assert_eq!(endpoint_slice_from_delete_obj(obj).unwrap(), deleted);

    let raw = WatchObject::tombstone(
        "testns/testsvc-abc",
        serde_json::Value::String("not-an-endpointslice".to_string()),
    );
    let err = endpoint_slice_from_delete_obj(raw).unwrap_err();
    assert!(err.to_string().contains("testns/testsvc-abc"), "{err}");
}
