// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 terndds contributors

//! # terndds - DDS reader-side sample history
//!
//! The in-memory sample cache of a DDS subscription endpoint: the store an
//! RTPS reader deposits received samples into, and the application reads,
//! takes and ages them out of. It enforces the two DDS history policies
//! (`KEEP_ALL`, `KEEP_LAST`), per-topic and per-instance resource limits,
//! keyed-topic semantics with on-the-fly key extraction, and per-instance
//! deadline tracking.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use terndds::{DataReaderHistory, DataReaderQos, History, TopicDescription};
//! # use terndds::{ReaderContext, TypeSupport, CacheChange, Guid};
//! # struct MyType; impl TypeSupport for MyType {
//! #     fn type_name(&self) -> &str { "MyType" }
//! #     fn payload_size(&self) -> usize { 64 }
//! # }
//! # struct MyReader; impl ReaderContext for MyReader {
//! #     fn guid(&self) -> Guid { Guid::nil() }
//! #     fn next_untaken_cache(&self) -> Option<Arc<CacheChange>> { None }
//! #     fn change_read_by_user(&self, _: &Arc<CacheChange>, _: bool) {}
//! # }
//!
//! fn main() -> terndds::Result<()> {
//!     let qos = DataReaderQos {
//!         history: History::KeepLast(8),
//!         ..Default::default()
//!     };
//!     let topic = TopicDescription::new("sensors/temperature", "MyType");
//!     let history = DataReaderHistory::new(Arc::new(MyType), &topic, &qos)?;
//!
//!     // The enclosing RTPS reader attaches itself before delivery starts.
//!     history.attach_reader(Arc::new(MyReader));
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +--------------------------------------------------------------+
//! |                       RTPS receive path                      |
//! |            received_change() / remove_change_at()            |
//! +--------------------------------------------------------------+
//! |                      DataReaderHistory                       |
//! |  admission policy | instance table | key resolver | queries  |
//! +--------------------------------------------------------------+
//! |            ChangeStore            |        PayloadPool       |
//! |   flat store, reception order     |   bounded cache buffers  |
//! +--------------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`DataReaderHistory`] | Sample history of one DataReader |
//! | [`DataReaderQos`] | History, resource limit and deadline policies |
//! | [`CacheChange`] | One received sample plus its metadata |
//! | [`SampleInfo`] | Metadata record returned to the application |
//! | [`TypeSupport`] | Topic type plugin (key extraction, payload sizing) |
//! | [`ReaderContext`] | Contract with the enclosing RTPS reader |
//!
//! ## See Also
//!
//! - [DDS Specification](https://www.omg.org/spec/DDS/1.4/)
//! - [RTPS Specification](https://www.omg.org/spec/DDSI-RTPS/2.5/)

/// Core building blocks (identities, change store, payload pool).
pub mod core;
/// DDS surface (history, sample metadata, type support).
pub mod dds;
/// QoS (Quality of Service) policies consumed by the history.
pub mod qos;

pub use crate::core::{
    CacheChange, ChangeKind, ChangeStore, Guid, HistoryAttributes, InstanceHandle, PayloadPool,
    SampleIdentity, SerializedPayload, WriteParams,
};
pub use dds::{
    DataReaderHistory, Error, InstanceLookup, InstanceState, ReaderContext, Result, SampleInfo,
    SampleState, TopicDescription, TypeSupport, ViewState,
};
pub use qos::{DataReaderQos, Deadline, History, HistoryMemoryPolicy, ResourceLimits};

/// terndds version string.
pub const VERSION: &str = "0.2.0";
