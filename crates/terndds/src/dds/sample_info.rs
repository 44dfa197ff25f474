// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 terndds contributors

//! Sample metadata returned to the application alongside each sample.
//!
//! Per DDS v1.4 Sec.2.2.2.5.5. The generation counts and ranks are fixed
//! placeholders until per-instance generation tracking lands; the viewer
//! states follow the same interim rule (everything reads as NOT_NEW).

use crate::core::types::{CacheChange, ChangeKind, InstanceHandle, SampleIdentity};

/// Sample state per DDS spec (NOT_READ vs READ).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleState {
    /// Sample has not been read yet.
    NotRead,
    /// Sample has been accessed via `read()`.
    Read,
}

/// View state of the instance a sample belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewState {
    /// First sample of a (re)born instance.
    New,
    /// Instance was already known to the reader.
    NotNew,
}

/// Lifecycle state of the instance a sample belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceState {
    Alive,
    NotAliveDisposed,
    NotAliveNoWriters,
}

/// Metadata record returned alongside a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleInfo {
    pub sample_state: SampleState,
    pub view_state: ViewState,
    pub instance_state: InstanceState,
    pub disposed_generation_count: u32,
    pub no_writers_generation_count: u32,
    pub sample_rank: u32,
    pub generation_rank: u32,
    pub absolute_generation_rank: u32,
    /// Writer-side timestamp, nanoseconds since the epoch.
    pub source_timestamp_ns: u64,
    /// Local reception timestamp, nanoseconds since the epoch.
    pub reception_timestamp_ns: u64,
    /// Handle of the instance the sample belongs to.
    pub instance_handle: InstanceHandle,
    /// Handle identifying the publishing writer.
    pub publication_handle: InstanceHandle,
    pub sample_identity: SampleIdentity,
    pub related_sample_identity: SampleIdentity,
    /// False for dispose/unregister notifications carrying no user data.
    pub valid_data: bool,
}

impl SampleInfo {
    /// Build the metadata record for one cached change.
    pub fn from_change(change: &CacheChange) -> Self {
        let instance_state = match change.kind {
            ChangeKind::Alive => InstanceState::Alive,
            ChangeKind::NotAliveDisposed => InstanceState::NotAliveDisposed,
            // Remaining kinds read as ALIVE until they get full support.
            ChangeKind::NotAliveUnregistered => InstanceState::Alive,
        };

        Self {
            sample_state: SampleState::NotRead,
            view_state: ViewState::NotNew,
            instance_state,
            disposed_generation_count: 0,
            no_writers_generation_count: 1,
            sample_rank: 0,
            generation_rank: 0,
            absolute_generation_rank: 0,
            source_timestamp_ns: change.source_timestamp_ns,
            reception_timestamp_ns: change.reception_timestamp_ns,
            instance_handle: change.instance_handle,
            publication_handle: InstanceHandle::from_guid(&change.writer_guid),
            sample_identity: change.sample_identity(),
            related_sample_identity: change.write_params.related_sample_identity,
            valid_data: change.kind == ChangeKind::Alive,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Guid, SerializedPayload, WriteParams};

    fn writer() -> Guid {
        Guid {
            prefix: [9; 12],
            entity_id: [0, 0, 0, 7],
        }
    }

    fn alive_change() -> CacheChange {
        let mut change = CacheChange::new(writer(), 42, SerializedPayload::default());
        change.source_timestamp_ns = 1_000;
        change.reception_timestamp_ns = 2_000;
        change.instance_handle = InstanceHandle::new([5; 16]);
        change.write_params = WriteParams {
            related_sample_identity: SampleIdentity::new(writer(), 41),
        };
        change
    }

    #[test]
    fn test_info_from_alive_change() {
        let change = alive_change();
        let info = SampleInfo::from_change(&change);

        assert_eq!(info.sample_state, SampleState::NotRead);
        assert_eq!(info.view_state, ViewState::NotNew);
        assert_eq!(info.instance_state, InstanceState::Alive);
        assert!(info.valid_data);
        assert_eq!(info.source_timestamp_ns, 1_000);
        assert_eq!(info.reception_timestamp_ns, 2_000);
        assert_eq!(info.instance_handle, InstanceHandle::new([5; 16]));
        assert_eq!(info.publication_handle, InstanceHandle::from_guid(&writer()));
        assert_eq!(info.sample_identity, SampleIdentity::new(writer(), 42));
        assert_eq!(info.related_sample_identity, SampleIdentity::new(writer(), 41));
    }

    #[test]
    fn test_info_stubbed_generations() {
        let info = SampleInfo::from_change(&alive_change());
        assert_eq!(info.disposed_generation_count, 0);
        assert_eq!(info.no_writers_generation_count, 1);
        assert_eq!(info.sample_rank, 0);
        assert_eq!(info.generation_rank, 0);
        assert_eq!(info.absolute_generation_rank, 0);
    }

    #[test]
    fn test_info_disposed_change() {
        let mut change = alive_change();
        change.kind = ChangeKind::NotAliveDisposed;
        let info = SampleInfo::from_change(&change);
        assert_eq!(info.instance_state, InstanceState::NotAliveDisposed);
        assert!(!info.valid_data);
    }

    #[test]
    fn test_info_unregistered_reads_alive() {
        let mut change = alive_change();
        change.kind = ChangeKind::NotAliveUnregistered;
        let info = SampleInfo::from_change(&change);
        assert_eq!(info.instance_state, InstanceState::Alive);
        assert!(!info.valid_data);
    }
}
