// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 terndds contributors

#![allow(clippy::uninlined_format_args)] // Test code readability over pedantic

//! Unkeyed reader history integration tests
//!
//! Validates KEEP_LAST / KEEP_ALL admission, resource limits and the
//! query surface for topics without key fields, through the public API.

use std::sync::Arc;
use std::time::{Duration, Instant};

use terndds::{
    CacheChange, DataReaderHistory, DataReaderQos, Guid, History, InstanceHandle, ReaderContext,
    ResourceLimits, SerializedPayload, TopicDescription, TypeSupport,
};

struct Telemetry;

impl TypeSupport for Telemetry {
    fn type_name(&self) -> &str {
        "Telemetry"
    }

    fn payload_size(&self) -> usize {
        125
    }
}

struct NullReader;

impl ReaderContext for NullReader {
    fn guid(&self) -> Guid {
        Guid {
            prefix: [2; 12],
            entity_id: [0, 0, 0, 4],
        }
    }

    fn next_untaken_cache(&self) -> Option<Arc<CacheChange>> {
        None
    }

    fn change_read_by_user(&self, _change: &Arc<CacheChange>, _taken: bool) {}
}

fn writer() -> Guid {
    Guid {
        prefix: [7; 12],
        entity_id: [0, 0, 0, 2],
    }
}

fn sample(seq: u64) -> CacheChange {
    CacheChange::new(writer(), seq, SerializedPayload::new(vec![0; 8]))
}

fn make_history(qos: DataReaderQos) -> DataReaderHistory {
    let topic = TopicDescription::new("vehicle/telemetry", "Telemetry");
    let history =
        DataReaderHistory::new(Arc::new(Telemetry), &topic, &qos).expect("valid reader QoS");
    history.attach_reader(Arc::new(NullReader));
    history
}

fn held_seqs(history: &DataReaderHistory) -> Vec<u64> {
    history
        .changes()
        .iter()
        .map(|c| c.sequence_number)
        .collect()
}

#[test]
fn test_keep_last_depth_three_keeps_newest() {
    let history = make_history(DataReaderQos {
        history: History::KeepLast(3),
        ..Default::default()
    });

    for seq in 1..=5 {
        assert!(history.received_change(sample(seq), 0), "seq {}", seq);
    }

    assert_eq!(held_seqs(&history), vec![3, 4, 5]);
    assert!(!history.is_full());
    assert_eq!(history.total_received(), 5);
}

#[test]
fn test_keep_all_stops_at_max_samples() {
    let history = make_history(DataReaderQos {
        history: History::KeepAll,
        resource_limits: ResourceLimits {
            max_samples: 2,
            ..Default::default()
        },
        ..Default::default()
    });

    assert!(history.received_change(sample(1), 0));
    assert!(history.received_change(sample(2), 0));
    assert!(!history.received_change(sample(3), 0));

    assert_eq!(held_seqs(&history), vec![1, 2]);
    assert!(history.is_full());
}

#[test]
fn test_keep_all_capacity_frees_after_take() {
    let history = make_history(DataReaderQos {
        history: History::KeepAll,
        resource_limits: ResourceLimits {
            max_samples: 2,
            ..Default::default()
        },
        ..Default::default()
    });

    assert!(history.received_change(sample(1), 0));
    assert!(history.received_change(sample(2), 0));
    assert!(history.is_full());

    let oldest = history.changes()[0].clone();
    assert!(history.remove_change_sub(&oldest));
    assert!(!history.is_full());
    assert!(history.received_change(sample(3), 0));
    assert_eq!(held_seqs(&history), vec![2, 3]);
}

#[test]
fn test_zero_resource_limits_behave_unlimited() {
    let history = make_history(DataReaderQos {
        history: History::KeepAll,
        resource_limits: ResourceLimits {
            max_samples: 0,
            allocated_samples: 0,
            max_instances: 0,
            max_samples_per_instance: 0,
        },
        ..Default::default()
    });

    for seq in 1..=500 {
        assert!(history.received_change(sample(seq), 0));
    }
    assert_eq!(history.len(), 500);
    assert!(!history.is_full());
}

#[test]
fn test_unknown_missing_changes_reserve_capacity() {
    let history = make_history(DataReaderQos {
        history: History::KeepAll,
        resource_limits: ResourceLimits {
            max_samples: 4,
            ..Default::default()
        },
        ..Default::default()
    });

    assert!(history.received_change(sample(10), 0));
    assert!(history.received_change(sample(11), 0));
    // Two older sequence numbers still expected: 2 held + 2 missing == max.
    assert!(!history.received_change(sample(14), 2));
    assert!(history.received_change(sample(14), 1));
}

#[test]
fn test_lookup_fictitious_instance() {
    let history = make_history(DataReaderQos {
        history: History::KeepLast(4),
        ..Default::default()
    });
    for seq in 1..=3 {
        assert!(history.received_change(sample(seq), 0));
    }

    // Exact nil lookup: not found.
    assert!(history
        .lookup_instance(InstanceHandle::nil(), true)
        .is_none());

    // Inexact nil lookup: the fictitious instance holding every change.
    let all = history
        .lookup_instance(InstanceHandle::nil(), false)
        .expect("fictitious instance");
    assert_eq!(all.handle, InstanceHandle::UNKEYED);
    assert_eq!(all.changes.len(), 3);

    // Any defined handle misses.
    assert!(history.lookup_instance(InstanceHandle::UNKEYED, false).is_none());
}

#[test]
fn test_global_deadline_slot() {
    let history = make_history(DataReaderQos::default());

    let at = Instant::now() + Duration::from_millis(100);
    assert!(history.set_next_deadline(InstanceHandle::nil(), at));

    let (handle, when) = history.get_next_deadline().expect("deadline set");
    assert_eq!(handle, InstanceHandle::nil());
    assert_eq!(when, at);
}

#[test]
fn test_depth_one_latest_value_cache() {
    let history = make_history(DataReaderQos {
        history: History::KeepLast(1),
        ..Default::default()
    });

    for seq in 1..=10 {
        assert!(history.received_change(sample(seq), 0));
    }
    assert_eq!(held_seqs(&history), vec![10]);
}

#[test]
fn test_payload_reservation_bounded_by_depth() {
    let history = make_history(DataReaderQos {
        history: History::KeepLast(2),
        ..Default::default()
    });

    // KEEP_LAST pool caps at depth.
    let a = history.reserve_payload(16).expect("first cache");
    let _b = history.reserve_payload(16).expect("second cache");
    assert!(history.reserve_payload(16).is_err(), "pool exhausted");
    drop(a);
}
