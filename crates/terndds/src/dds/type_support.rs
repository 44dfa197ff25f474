// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 terndds contributors

//! Topic type plugin interface.
//!
//! The history consumes a narrow capability set from the registered type:
//! whether it defines key fields, how large its serialized form is, and how
//! to recover the key hash from a payload when a sample arrives without an
//! instance handle. Serialization of user data itself happens elsewhere.

use std::any::Any;

use crate::core::types::{InstanceHandle, SerializedPayload};

/// Capability set the history consumes from a topic type.
///
/// The scratch object returned by [`create_key_scratch`] is allocated once
/// per history and reused for every key extraction; it is dropped with the
/// history.
///
/// [`create_key_scratch`]: TypeSupport::create_key_scratch
pub trait TypeSupport: Send + Sync {
    /// Registered type name.
    fn type_name(&self) -> &str;

    /// Whether the type defines @key fields.
    fn has_key(&self) -> bool {
        false
    }

    /// Maximum serialized size of one sample of this type.
    fn payload_size(&self) -> usize;

    /// Allocate the reusable scratch object key extraction deserializes
    /// into. `None` when the type has no way to obtain keys.
    fn create_key_scratch(&self) -> Option<Box<dyn Any + Send>> {
        None
    }

    /// Deserialize enough of `payload` into `scratch` to extract the key.
    fn deserialize(&self, payload: &SerializedPayload, scratch: &mut (dyn Any + Send)) -> bool {
        let _ = (payload, scratch);
        false
    }

    /// Compute the instance handle from a deserialized scratch object.
    ///
    /// `is_key_protected` selects the secure key hash when the reader's
    /// security attributes require it.
    fn get_key(
        &self,
        scratch: &(dyn Any + Send),
        is_key_protected: bool,
    ) -> Option<InstanceHandle> {
        let _ = (scratch, is_key_protected);
        None
    }
}
