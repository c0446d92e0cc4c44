// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Delete notifications and their tombstones.
//!
//! A delete may be observed directly, carrying the object that was removed, or indirectly,
//! e.g. when a relist no longer returns an object that was known before. In the latter case
//! only the last known state is available and it is wrapped in a
//! [`DeletedFinalStateUnknown`] tombstone. [`endpoint_slice_from_delete_obj`] turns either
//! shape into a typed [`EndpointSlice`] or a [`DeleteEventError`] the caller can log and skip.

use k8s_openapi::Resource;
use k8s_openapi::api::discovery::v1::EndpointSlice;
use kube::api::DynamicObject;
use thiserror::Error;

/// An object as delivered with a watch notification.
#[derive(Debug, Clone)]
pub enum WatchObject {
    /// A typed EndpointSlice
    EndpointSlice(EndpointSlice),
    /// Last known state of an object whose deletion was not observed directly
    DeletedFinalStateUnknown(DeletedFinalStateUnknown),
    /// A Kubernetes object of some other, untyped kind
    Dynamic(DynamicObject),
    /// Anything else
    Raw(serde_json::Value),
}

/// Tombstone wrapping the last known state of a deleted object
#[derive(Debug, Clone)]
pub struct DeletedFinalStateUnknown {
    /// `<namespace>/<name>` of the deleted object
    pub key: String,
    pub obj: Box<WatchObject>,
}

#[derive(Debug, Error)]
pub enum DeleteEventError {
    #[error("couldn't get object from tombstone {key}: expected EndpointSlice, got {found}")]
    InvalidTombstone { key: String, found: String },

    #[error("couldn't interpret delete event: expected EndpointSlice, got {found}")]
    UnexpectedObject { found: String },
}

impl WatchObject {
    /// Wrap the last known state of an object in a tombstone
    pub fn tombstone(key: impl Into<String>, obj: impl Into<WatchObject>) -> Self {
        WatchObject::DeletedFinalStateUnknown(DeletedFinalStateUnknown {
            key: key.into(),
            obj: Box::new(obj.into()),
        })
    }

    /// Classify an untyped object.
    ///
    /// A `discovery.k8s.io/v1` EndpointSlice that deserializes cleanly becomes
    /// [`WatchObject::EndpointSlice`]; anything else stays [`WatchObject::Dynamic`].
    pub fn from_dynamic(obj: DynamicObject) -> Self {
        let is_slice = obj.types.as_ref().is_some_and(|t| {
            t.api_version == EndpointSlice::API_VERSION && t.kind == EndpointSlice::KIND
        });
        if !is_slice {
            return WatchObject::Dynamic(obj);
        }

        match serde_json::to_value(&obj).and_then(serde_json::from_value::<EndpointSlice>) {
            Ok(slice) => WatchObject::EndpointSlice(slice),
            Err(e) => {
                tracing::debug!(
                    name = obj.metadata.name.as_deref().unwrap_or("unknown"),
                    error = %e,
                    "Object claims to be an EndpointSlice but does not parse as one"
                );
                WatchObject::Dynamic(obj)
            }
        }
    }

    /// Short description of the payload shape for error messages
    fn describe(&self) -> String {
        match self {
            WatchObject::EndpointSlice(_) => EndpointSlice::KIND.to_string(),
            WatchObject::DeletedFinalStateUnknown(_) => "DeletedFinalStateUnknown".to_string(),
            WatchObject::Dynamic(obj) => match &obj.types {
                Some(t) => format!("{}/{}", t.api_version, t.kind),
                None => "object without type information".to_string(),
            },
            WatchObject::Raw(value) => match value {
                serde_json::Value::Null => "null".to_string(),
                serde_json::Value::Bool(_) => "bool".to_string(),
                serde_json::Value::Number(_) => "number".to_string(),
                serde_json::Value::String(_) => "string".to_string(),
                serde_json::Value::Array(_) => "array".to_string(),
                serde_json::Value::Object(_) => "map".to_string(),
            },
        }
    }
}

impl From<EndpointSlice> for WatchObject {
    fn from(slice: EndpointSlice) -> Self {
        WatchObject::EndpointSlice(slice)
    }
}

impl From<DynamicObject> for WatchObject {
    fn from(obj: DynamicObject) -> Self {
        WatchObject::Dynamic(obj)
    }
}

impl From<serde_json::Value> for WatchObject {
    fn from(value: serde_json::Value) -> Self {
        WatchObject::Raw(value)
    }
}

/// Extract the EndpointSlice a delete notification refers to.
///
/// Tombstones are unwrapped exactly one level.
pub fn endpoint_slice_from_delete_obj(obj: WatchObject) -> Result<EndpointSlice, DeleteEventError> {
    match obj {
        WatchObject::EndpointSlice(slice) => Ok(slice),
        WatchObject::DeletedFinalStateUnknown(tombstone) => match *tombstone.obj {
            WatchObject::EndpointSlice(slice) => Ok(slice),
            other => Err(DeleteEventError::InvalidTombstone {
                key: tombstone.key,
                found: other.describe(),
            }),
        },
        other => Err(DeleteEventError::UnexpectedObject {
            found: other.describe(),
        }),
    }
}
