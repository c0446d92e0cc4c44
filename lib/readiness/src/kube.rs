// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes EndpointSlice readiness tracking

mod cache;
mod informer;
mod readiness;
mod tombstone;
mod utils;

pub use cache::{ReadyEndpointsCache, WaitError};
pub use informer::EndpointSliceInformer;
pub use readiness::has_any_ready_endpoint;
pub use tombstone::{
    DeleteEventError, DeletedFinalStateUnknown, WatchObject, endpoint_slice_from_delete_obj,
};
pub use utils::{SERVICE_NAME_LABEL, service_key, service_key_for_slice, split_service_key};
