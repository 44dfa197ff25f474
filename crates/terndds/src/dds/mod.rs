// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 terndds contributors

//! DDS-facing surface of the reader history.
//!
//! | Module | Contents |
//! |--------|----------|
//! | `reader` | `DataReaderHistory` and the enclosing-reader contract |
//! | `sample_info` | Sample metadata returned to the application |
//! | `type_support` | Topic type plugin capability set |

/// DataReader history and reader contract.
pub mod reader;
/// Sample metadata (`SampleInfo` and its state enums).
pub mod sample_info;
/// Topic type plugin interface (key extraction, payload sizing).
pub mod type_support;

pub use reader::{DataReaderHistory, InstanceLookup, ReaderContext};
pub use sample_info::{InstanceState, SampleInfo, SampleState, ViewState};
pub use type_support::TypeSupport;

/// Name and registered type of the topic a history serves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicDescription {
    pub name: String,
    pub type_name: String,
}

impl TopicDescription {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

/// Errors returned by terndds operations.
///
/// History operations themselves signal failure through their boolean or
/// `Option` results and log the category; this enum covers the fallible
/// construction and pool paths.
#[derive(Debug)]
pub enum Error {
    /// QoS policy combination is invalid (e.g. zero KEEP_LAST depth).
    InvalidQos(String),
    /// Payload pool exhausted, the sample cannot be accommodated right now.
    WouldBlock,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidQos(msg) => write!(f, "Invalid QoS: {}", msg),
            Error::WouldBlock => write!(f, "Operation would block"),
        }
    }
}

impl std::error::Error for Error {}

/// Result alias for terndds operations.
pub type Result<T> = std::result::Result<T, Error>;
