// runlog-core/src/runtime/quota.rs
// ============================================================================
// Module: Quota Guard
// Description: Pre-commit check of per-run event count and byte ceilings.
// Purpose: Keep a single run from growing unbounded inside one write
//          transaction, without a second round-trip to the Store.
// Dependencies: crate::core::model::RunMetrics
// ============================================================================

//! ## Overview
//! [`QuotaGuard`] is a pure function over the run's current aggregate
//! metrics and the prospective write; it never touches the Store itself, so
//! [`crate::runtime::eventlog::EventLog`] can call it from inside an already
//! open [`crate::interfaces::RunWriteTransaction`].

use thiserror::Error;

use crate::core::model::RunMetrics;

/// The ceiling that was crossed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaScope {
    /// Per-run event count ceiling.
    EventsPerRun,
    /// Per-run cumulative byte ceiling.
    BytesPerRun,
}

impl QuotaScope {
    /// Stable error-kind scope string, per the `quota_exceeded{scope}` shape.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EventsPerRun => "events_per_run",
            Self::BytesPerRun => "bytes_per_run",
        }
    }
}

impl std::fmt::Display for QuotaScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised when a prospective write would cross a configured ceiling.
#[derive(Debug, Clone, Error)]
#[error("quota_exceeded: scope={scope} limit={limit} observed={observed}")]
pub struct QuotaExceeded {
    /// The ceiling that was crossed.
    pub scope: QuotaScope,
    /// The configured limit.
    pub limit: u64,
    /// The value that would have resulted from the write.
    pub observed: u64,
}

/// Configured per-run ceilings.
#[derive(Debug, Clone, Copy)]
pub struct QuotaLimits {
    /// Maximum events per run.
    pub max_events_per_run: u64,
    /// Maximum cumulative bytes (in + out) per run.
    pub max_bytes_per_run: u64,
}

/// Stateless pre-commit quota check.
#[derive(Debug, Clone, Copy, Default)]
pub struct QuotaGuard;

impl QuotaGuard {
    /// Checks whether appending `added_bytes` to `current` would cross
    /// either ceiling in `limits`.
    ///
    /// # Errors
    ///
    /// Returns [`QuotaExceeded`] naming the first ceiling crossed, event
    /// count checked before bytes (matching §4.2's ordering of `next_events`
    /// then `next_bytes`).
    pub fn check(
        current: &RunMetrics,
        added_bytes: u64,
        limits: QuotaLimits,
    ) -> Result<(), QuotaExceeded> {
        let next_events = current.event_count + 1;
        if next_events > limits.max_events_per_run {
            return Err(QuotaExceeded {
                scope: QuotaScope::EventsPerRun,
                limit: limits.max_events_per_run,
                observed: next_events,
            });
        }
        let next_bytes = current.bytes_in + current.bytes_out + added_bytes;
        if next_bytes > limits.max_bytes_per_run {
            return Err(QuotaExceeded {
                scope: QuotaScope::BytesPerRun,
                limit: limits.max_bytes_per_run,
                observed: next_bytes,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits(events: u64, bytes: u64) -> QuotaLimits {
        QuotaLimits {
            max_events_per_run: events,
            max_bytes_per_run: bytes,
        }
    }

    #[test]
    fn allows_write_under_both_ceilings() {
        let metrics = RunMetrics {
            event_count: 2,
            bytes_in: 10,
            ..Default::default()
        };
        assert!(QuotaGuard::check(&metrics, 5, limits(5, 100)).is_ok());
    }

    #[test]
    fn rejects_on_event_count_ceiling() {
        let metrics = RunMetrics {
            event_count: 5,
            ..Default::default()
        };
        let err = QuotaGuard::check(&metrics, 0, limits(5, u64::MAX))
            .expect_err("should exceed event ceiling");
        assert_eq!(err.scope, QuotaScope::EventsPerRun);
    }

    #[test]
    fn checks_event_ceiling_before_byte_ceiling() {
        let metrics = RunMetrics {
            event_count: 5,
            bytes_in: 1000,
            ..Default::default()
        };
        let err = QuotaGuard::check(&metrics, 1000, limits(5, 10))
            .expect_err("should exceed a ceiling");
        assert_eq!(err.scope, QuotaScope::EventsPerRun);
    }

    #[test]
    fn rejects_on_byte_ceiling() {
        let metrics = RunMetrics {
            event_count: 0,
            bytes_in: 95,
            ..Default::default()
        };
        let err = QuotaGuard::check(&metrics, 10, limits(u64::MAX, 100))
            .expect_err("should exceed byte ceiling");
        assert_eq!(err.scope, QuotaScope::BytesPerRun);
    }
}
