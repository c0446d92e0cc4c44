// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

use k8s_openapi::api::discovery::v1::EndpointSlice;

/// Label set by the EndpointSlice controller naming the Service a slice belongs to
pub const SERVICE_NAME_LABEL: &str = "kubernetes.io/service-name";

/// Build the cache key for a service: `<namespace>/<name>`
pub fn service_key(namespace: &str, name: &str) -> String {
    format!("{namespace}/{name}")
}

/// Split a `<namespace>/<name>` key back into its parts.
///
/// Returns `None` unless both parts are non-empty and separated by exactly one `/`.
pub fn split_service_key(key: &str) -> Option<(&str, &str)> {
    let (namespace, name) = key.split_once('/')?;
    if namespace.is_empty() || name.is_empty() || name.contains('/') {
        return None;
    }
    Some((namespace, name))
}

/// Derive the service key an EndpointSlice contributes to.
///
/// Slices without a namespace or without the service-name label are not owned by a Service
/// and yield `None`.
pub fn service_key_for_slice(slice: &EndpointSlice) -> Option<String> {
    let namespace = slice.metadata.namespace.as_deref()?;
    let name = slice.metadata.labels.as_ref()?.get(SERVICE_NAME_LABEL)?;
    if namespace.is_empty() || name.is_empty() {
        return None;
    }
    Some(service_key(namespace, name))
}

/// Identity of a slice object within the cluster: `<namespace>/<slice name>`
pub(crate) fn slice_id(slice: &EndpointSlice) -> Option<String> {
    let namespace = slice.metadata.namespace.as_deref().unwrap_or_default();
    let name = slice.metadata.name.as_deref()?;
    Some(format!("{namespace}/{name}"))
}
