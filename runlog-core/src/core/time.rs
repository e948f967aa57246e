// runlog-core/src/core/time.rs
// ============================================================================
// Module: Clock & Id Generation
// Description: Wall-clock timestamps and monotonic-enough opaque id minting.
// Purpose: Let runtime code depend on a trait instead of `SystemTime::now`,
//          so tests can inject deterministic clocks.
// Dependencies: crate::core::identifiers::Id, serde
// ============================================================================

//! ## Overview
//! [`Clock`] is the single seam runtime code uses to read wall-clock time.
//! [`IdGenerator`] mints [`Id`] values; the default generator combines a
//! millisecond timestamp with a random tail so ids sort roughly by creation
//! time without being usable as a sequencing mechanism (that is `seq`'s job).

use std::fmt;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use rand::RngCore;
use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::Id;

/// Milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Wraps a raw millisecond value.
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Returns milliseconds since the Unix epoch.
    #[must_use]
    pub const fn as_millis(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Source of wall-clock time, abstracted for deterministic testing.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> Timestamp;
}

/// Clock backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX));
        Timestamp::from_millis(millis)
    }
}

/// Fixed clock for tests, optionally advanced manually.
#[derive(Debug)]
pub struct FixedClock {
    /// Current millisecond reading, advanced by [`FixedClock::advance`].
    millis: AtomicU64,
}

impl FixedClock {
    /// Creates a clock fixed at `millis`.
    #[must_use]
    pub const fn new(millis: u64) -> Self {
        Self {
            millis: AtomicU64::new(millis),
        }
    }

    /// Advances the clock by `delta_millis` and returns the new reading.
    pub fn advance(&self, delta_millis: u64) -> Timestamp {
        let next = self.millis.fetch_add(delta_millis, Ordering::SeqCst) + delta_millis;
        Timestamp::from_millis(next)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_millis(self.millis.load(Ordering::SeqCst))
    }
}

/// Mints opaque 128-bit ids.
pub trait IdGenerator: Send + Sync {
    /// Generates a fresh id.
    fn generate(&self) -> Id;
}

/// Id generator combining a millisecond timestamp prefix with random tail
/// bits, so ids are roughly time-ordered without being load-bearing for
/// ordering (callers must use `seq` for that).
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIdGenerator;

impl IdGenerator for RandomIdGenerator {
    fn generate(&self) -> Id {
        let millis = SystemClock.now().as_millis();
        let mut tail = [0_u8; 8];
        rand::rng().fill_bytes(&mut tail);
        let raw = (u128::from(millis) << 64) | u128::from(u64::from_be_bytes(tail));
        Id::from_raw(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_advances_monotonically() {
        let clock = FixedClock::new(1_000);
        assert_eq!(clock.now().as_millis(), 1_000);
        assert_eq!(clock.advance(500).as_millis(), 1_500);
        assert_eq!(clock.now().as_millis(), 1_500);
    }

    #[test]
    fn random_id_generator_produces_distinct_ids() {
        let idgen = RandomIdGenerator;
        let a = idgen.generate();
        let b = idgen.generate();
        assert_ne!(a, b);
    }
}
