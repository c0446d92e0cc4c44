// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

use k8s_openapi::api::discovery::v1::{Endpoint, EndpointSlice};

/// Returns true if the slice holds at least one endpoint traffic can be routed to.
///
/// An endpoint counts when it has an address and its `ready` condition is not explicitly
/// false. The discovery API documents an unset `ready` as "unknown, assume ready", so a
/// missing condition counts as ready.
pub fn has_any_ready_endpoint(slice: &EndpointSlice) -> bool {
    slice.endpoints.iter().any(is_routable)
}

fn is_routable(endpoint: &Endpoint) -> bool {
    if endpoint.addresses.is_empty() {
        return false;
    }

    endpoint
        .conditions
        .as_ref()
        .and_then(|c| c.ready)
        .unwrap_or(true)
}
