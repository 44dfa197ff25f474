// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 terndds contributors

//! DEADLINE QoS policy (DDS v1.4 Sec.2.2.3.7)
//!
//! Specifies the expected sample reception rate per instance. The enclosing
//! reader turns this period into the `Instant`s it feeds into the history via
//! `set_next_deadline`; missing a deadline triggers a QoS notification
//! outside the history.
//!
//! # QoS Compatibility (Request vs Offered)
//!
//! **Rule:** Writer offers <= Reader requests (RxO semantics)

use std::time::Duration;

/// DEADLINE QoS policy
///
/// Specifies the maximum time between samples of one instance.
/// Default: Infinite (no deadline enforcement).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    /// Maximum time between samples
    pub period: Duration,
}

impl Default for Deadline {
    /// Default: Infinite deadline (no enforcement)
    fn default() -> Self {
        Self {
            period: Duration::from_secs(u64::MAX),
        }
    }
}

impl Deadline {
    /// Create new deadline policy with specified period
    pub fn new(period: Duration) -> Self {
        Self { period }
    }

    /// Create deadline with infinite period (no enforcement)
    pub fn infinite() -> Self {
        Self::default()
    }

    /// Check if deadline is infinite (no enforcement)
    pub fn is_infinite(&self) -> bool {
        self.period == Duration::from_secs(u64::MAX)
    }

    /// Create deadline from milliseconds
    pub fn from_millis(ms: u64) -> Self {
        Self {
            period: Duration::from_millis(ms),
        }
    }

    /// Check QoS compatibility between offered (writer) and requested (reader)
    ///
    /// **Rule (RxO):** Writer offers <= Reader requests
    pub fn is_compatible_with(&self, requested: &Deadline) -> bool {
        self.period <= requested.period
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deadline_default_is_infinite() {
        let deadline = Deadline::default();
        assert!(deadline.is_infinite());
    }

    #[test]
    fn test_deadline_new() {
        let deadline = Deadline::new(Duration::from_millis(100));
        assert_eq!(deadline.period, Duration::from_millis(100));
        assert!(!deadline.is_infinite());
    }

    #[test]
    fn test_deadline_rxo_compatibility() {
        let writer = Deadline::from_millis(100);
        let reader = Deadline::from_millis(200);
        assert!(writer.is_compatible_with(&reader));
        assert!(!reader.is_compatible_with(&writer));
    }

    #[test]
    fn test_deadline_infinite_reader_accepts_any_writer() {
        let writer = Deadline::from_millis(5);
        let reader = Deadline::infinite();
        assert!(writer.is_compatible_with(&reader));
    }
}
