// src/core/time.rs
// ============================================================================
// Module: Operation Plan Time Model
// Description: Canonical timestamp and date-window representations.
// Purpose: Provide deterministic, replayable time values for plan dates,
// epst/lpst, without the core ever reading wall-clock time itself.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! The core never reads wall-clock time directly; the host supplies
//! timestamps through [`crate::interfaces::PlanClock`] or plan mutators.
//! [`crate::interfaces::PlanClock::current`] is consulted only when a
//! routing has no anchor date at all.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::cmp::Ordering;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Timestamp
// ============================================================================

/// Canonical timestamp used for plan `start`/`end`, `epst`, and `lpst`.
///
/// # Invariants
/// - Values are explicitly provided by callers; the core never reads
///   wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Creates a timestamp from unix seconds.
    #[must_use]
    pub const fn from_unix_seconds(value: i64) -> Self {
        Self(value)
    }

    /// Returns the timestamp as unix seconds.
    #[must_use]
    pub const fn as_unix_seconds(self) -> i64 {
        self.0
    }
}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

// ============================================================================
// SECTION: Date Window
// ============================================================================

/// A plan's start/end pair, either of which may be unset.
///
/// # Invariants
/// - When both are set, `start <= end` is the caller's responsibility to
///   maintain; the core does not reject inverted windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DateWindow {
    /// Start timestamp, if known.
    pub start: Option<Timestamp>,
    /// End timestamp, if known.
    pub end: Option<Timestamp>,
}

impl DateWindow {
    /// Creates a date window from explicit start/end values.
    #[must_use]
    pub const fn new(start: Option<Timestamp>, end: Option<Timestamp>) -> Self {
        Self {
            start,
            end,
        }
    }
}
