// src/core/identifiers.rs
// ============================================================================
// Module: Operation Plan Identifiers
// Description: Strongly typed identifiers for plans, operations, and demands.
// Purpose: Keep id collision and counter-advance rules in one
// non-zero-checked type instead of bare integers.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Plan identifiers are never zero: zero means "unassigned" in the source
//! model, which we represent as `Option<PlanId>` instead so the type system
//! rules out the sentinel value everywhere except the registry counter.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::num::NonZeroU64;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Plan Identifier
// ============================================================================

/// Identifier for a registered operation plan.
///
/// # Invariants
/// - Never zero (zero means "unassigned" and is represented as `None`).
/// - Unique across all plans registered with a given [`crate::runtime::PlanModel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlanId(NonZeroU64);

impl PlanId {
    /// Creates a plan identifier from a non-zero value.
    #[must_use]
    pub const fn new(value: NonZeroU64) -> Self {
        Self(value)
    }

    /// Creates a plan identifier from a raw integer, returning `None` for zero.
    #[must_use]
    pub const fn from_u64(value: u64) -> Option<Self> {
        match NonZeroU64::new(value) {
            Some(inner) => Some(Self(inner)),
            None => None,
        }
    }

    /// Returns the identifier as a raw integer.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0.get()
    }

    /// Returns the identifier's non-zero inner value.
    #[must_use]
    pub(crate) const fn as_nonzero(self) -> NonZeroU64 {
        self.0
    }
}

impl fmt::Display for PlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// SECTION: Node Key
// ============================================================================

/// Arena slot for an [`crate::core::OperationPlanRecord`], independent of
/// whether the record has been registered yet.
///
/// A plan is addressable by `NodeKey` from the moment it's constructed,
/// before `initialize()` assigns it a [`PlanId`] — this is how an
/// unregistered routing step can hold a non-owning back-reference to its
/// (also still unregistered) parent. This is the "arena + stable indices"
/// alternative named alongside the intrusive-pointer design.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeKey(NonZeroU64);

impl NodeKey {
    /// Creates a node key from a non-zero value.
    #[must_use]
    pub const fn new(value: NonZeroU64) -> Self {
        Self(value)
    }

    /// Returns the key as a raw integer.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// SECTION: Operation and Demand Identifiers
// ============================================================================

/// Identifier for an operation, the non-owning target every plan references.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(String);

impl OperationId {
    /// Creates a new operation identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for OperationId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for OperationId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Identifier for a demand a plan may deliver to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DemandId(String);

impl DemandId {
    /// Creates a new demand identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DemandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for DemandId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for DemandId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}
