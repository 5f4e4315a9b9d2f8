// src/core/errors.rs
// ============================================================================
// Module: Operation Plan Errors
// Description: Data, logic, and registry errors raised across the plan model.
// Purpose: Give every failure mode a distinct, typed variant instead of a
// single stringly-typed error.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! Two error families: data errors are recoverable at
//! the caller boundary (bad input), logic errors indicate an internal
//! invariant violation and should never be something a caller can trigger
//! through normal use. [`PlanRegistryError`] carries the one case called out
//! as a distinct "runtime error": an id collision across different
//! operations during `initialize`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::core::identifiers::NodeKey;
use crate::core::identifiers::OperationId;
use crate::core::identifiers::PlanId;

// ============================================================================
// SECTION: Data Errors
// ============================================================================

/// Bad caller input, surfaced as-is with a human message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlanDataError {
    /// `set_quantity` called with a negative value.
    #[error("operation plans can't have negative quantities: {0}")]
    NegativeQuantity(f64),
    /// The named operation does not exist.
    #[error("operation '{0}' doesn't exist")]
    UnknownOperation(OperationId),
    /// `REMOVE`/`CHANGE` referenced an id that isn't registered.
    #[error("can't find operation plan with identifier {0}")]
    UnknownPlan(PlanId),
    /// `ADD` referenced an id that is already registered.
    #[error("operation plan with identifier {0} already exists and can't be added again")]
    PlanAlreadyExists(PlanId),
    /// `ADD` was requested without an operation name.
    #[error("operation name missing for creating an operation plan")]
    MissingOperationName,
    /// An `id` was supplied together with an `operation` that names a
    /// different operation than the one the existing plan belongs to.
    #[error(
        "operation plan id {id} defined multiple times with different operations: '{existing}' & '{requested}'"
    )]
    OperationMismatch {
        /// The conflicting plan id.
        id: PlanId,
        /// The operation the plan is already registered under.
        existing: OperationId,
        /// The operation named in the conflicting request.
        requested: OperationId,
    },
    /// A subscriber vetoed `SIG_REMOVE`.
    #[error("can't delete operation plan with id {0}")]
    RemovalVetoed(PlanId),
    /// A subscriber vetoed `SIG_ADD`.
    #[error("can't create operation plan for operation '{0}'")]
    AdditionVetoed(OperationId),
    /// `REMOVE`/`CHANGE` was requested without an `id` attribute at all.
    #[error("no operation plan identifier supplied")]
    MissingPlanId,
    /// The `action` attribute named something other than add/change/remove/add_change.
    #[error("'{0}' isn't a recognized operation plan action")]
    InvalidAction(String),
}

// ============================================================================
// SECTION: Logic Errors
// ============================================================================

/// Internal invariant violations: fatal, should always name the
/// offending plan or operation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlanLogicError {
    /// `initialize()` called on a plan without an operation reference.
    #[error("initializing an invalid operation plan")]
    MissingOperation,
    /// An effective-variant plan was initialized with no inner plan.
    #[error("can't initialize an effective operation plan without a sub operation plan")]
    EffectiveMissingInner,
    /// The serialization bridge encountered an object where a plan was
    /// expected.
    #[error("incorrect object type during read operation")]
    WrongObjectType,
    /// A child's `owner` link does not point at the parent it's being
    /// wired into (or out of), an invariant that must hold before
    /// `add_sub`/`erase_sub` touch the parent's variant payload.
    #[error("operation plan {child} does not claim {owner} as its owner")]
    OwnershipMismatch {
        /// The child plan's arena slot.
        child: NodeKey,
        /// The parent plan's arena slot the caller expected the child to claim.
        owner: NodeKey,
    },
}

// ============================================================================
// SECTION: Registry Errors
// ============================================================================

/// Registry-level errors distinguished from ordinary data errors: a
/// registered-id collision across different operations during
/// `initialize`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlanRegistryError {
    /// Two plans were registered under the same id for different operations.
    #[error("duplicated operation plan id {id} between '{existing}' and '{requested}'")]
    DuplicateId {
        /// The colliding plan id.
        id: PlanId,
        /// The operation the existing registration belongs to.
        existing: OperationId,
        /// The operation the new registration was attempted for.
        requested: OperationId,
    },
    /// An arena slot the registry expected to still be live had already
    /// been removed by the time registration reached it.
    #[error("operation plan arena slot {0} vanished before registration completed")]
    MissingSlot(NodeKey),
}

// ============================================================================
// SECTION: Umbrella Error
// ============================================================================

/// Umbrella error returned by every fallible [`crate::runtime::PlanModel`]
/// operation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlanError {
    /// A data error (bad caller input).
    #[error(transparent)]
    Data(#[from] PlanDataError),
    /// A logic error (internal invariant violation).
    #[error(transparent)]
    Logic(#[from] PlanLogicError),
    /// A registry collision error.
    #[error(transparent)]
    Registry(#[from] PlanRegistryError),
}

// ============================================================================
// SECTION: Warnings
// ============================================================================

/// Non-fatal misuse, collected instead of printed: `erase_sub` called with
/// a plan that isn't actually the parent's registered child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanWarning {
    /// `erase_sub` was called with a plan that isn't the alternate/effective
    /// variant's registered child.
    EraseSubNotRegistered {
        /// The plan that was asked to be erased.
        target: PlanId,
        /// The parent plan `erase_sub` was called on.
        parent: PlanId,
    },
}
