// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 terndds contributors

//! Core RTPS-facing building blocks for the reader history.
//!
//! | Module | Contents |
//! |--------|----------|
//! | `types` | GUID, instance handles, cache change records |
//! | `pool` | Payload pool and history sizing attributes |
//! | `history` | Generic bounded change store (reader history base) |

pub mod history;
pub mod pool;
pub mod types;

pub use history::ChangeStore;
pub use pool::{HistoryAttributes, PayloadPool};
pub use types::{
    CacheChange, ChangeKind, Guid, InstanceHandle, SampleIdentity, SerializedPayload, WriteParams,
};
