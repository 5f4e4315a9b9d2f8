// src/interfaces/mod.rs
// ============================================================================
// Module: Operation Plan Interfaces
// Description: Backend-agnostic collaborator contracts the model depends on.
// Purpose: Define the contract surfaces for operations, demands, locking,
// and eventing without embedding any concrete implementation.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! The model never reads wall-clock time, never blocks a thread, and never
//! knows how an operation's sub-operations or size constraints are stored.
//! All of that is declared here as traits the host supplies at construction
//! time. Implementations must be deterministic: the same
//! sequence of calls against the same collaborator state must produce the
//! same plan mutations.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::DemandId;
use crate::core::FlowDefinition;
use crate::core::LoadDefinition;
use crate::core::NodeKey;
use crate::core::OperationId;
use crate::core::PlanId;
use crate::core::Timestamp;

// ============================================================================
// SECTION: Operation
// ============================================================================

/// The composite shape plans of an operation take, fixed for the
/// operation's lifetime: determined by the owning operation's kind and
/// immutable after a plan is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    /// Plans of this operation are leaves.
    Simple,
    /// Plans of this operation wrap an ordered sequence of steps.
    Routing,
    /// Plans of this operation wrap a single chosen alternative.
    Alternate,
    /// Plans of this operation delegate to a single inner plan.
    Effective,
}

/// A definition of an activity producing/consuming material and capacity
///.
pub trait Operation {
    /// The operation's name, used as its identifier.
    fn name(&self) -> &OperationId;

    /// The composite shape plans of this operation take.
    fn kind(&self) -> OperationKind;

    /// Whether plans of this operation are omitted from non-reference
    /// serialization output.
    fn hidden(&self) -> bool;

    /// The sub-operations that make up a routing, in order. Empty for
    /// simple operations.
    fn sub_operations(&self) -> &[OperationId];

    /// The flow definitions this operation declares.
    fn flows(&self) -> &[FlowDefinition];

    /// The load definitions this operation declares.
    fn loads(&self) -> &[LoadDefinition];

    /// The minimum batch size below which requested quantity is rounded up
    /// or zeroed. Zero means no minimum.
    fn size_minimum(&self) -> f64;

    /// The multiple requested quantity is rounded to. Zero means no
    /// multiple constraint.
    fn size_multiple(&self) -> f64;

    /// Reconciles a requested quantity/start/end into a consistent
    /// start/end pair via the operation's date-from-start or date-from-end
    /// solver.
    ///
    /// Returns the resolved `(start, end)` pair; the model writes it back
    /// onto the plan without further interpretation.
    fn resolve_dates(
        &self,
        quantity: f64,
        start: Option<Timestamp>,
        end: Option<Timestamp>,
    ) -> (Option<Timestamp>, Option<Timestamp>);
}

// ============================================================================
// SECTION: Demand
// ============================================================================

/// An external requirement that may be satisfied by a delivery plan
///.
pub trait Demand {
    /// This demand's identifier.
    fn id(&self) -> &DemandId;

    /// The operation whose plans may deliver against this demand.
    fn delivery_operation(&self) -> Option<&OperationId>;

    /// Registers `plan` as a delivery for this demand.
    fn add_delivery(&mut self, plan: PlanId);

    /// Removes `plan` from this demand's delivery set, if present.
    fn remove_delivery(&mut self, plan: PlanId);

    /// Marks this demand changed, e.g. because a delivery's quantity or
    /// date moved.
    fn set_changed(&mut self);
}

// ============================================================================
// SECTION: Lock Manager
// ============================================================================

/// Process-wide lock manager gating concurrent write access to individual
/// plans. Idempotent per thread: re-acquiring a lock a
/// thread already holds must not deadlock.
///
/// Keyed by [`NodeKey`] rather than [`PlanId`]: the factory locks a plan the
/// moment it is allocated, which is before `initialize()` assigns a
/// business id.
pub trait LockManager {
    /// Acquires a write lock on `plan`, blocking if necessary.
    fn obtain_write_lock(&self, plan: NodeKey);

    /// Releases a previously obtained write lock on `plan`.
    fn release_write_lock(&self, plan: NodeKey);
}

// ============================================================================
// SECTION: Event Bus
// ============================================================================

/// Lifecycle signals subscribers may veto.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanSignal {
    /// Raised before a newly created plan is exposed to the caller.
    Add,
    /// Raised before a plan is deleted.
    Remove,
}

/// Publishes lifecycle signals and collects subscriber votes.
pub trait EventBus {
    /// Raises `signal` for `plan`. Returns `true` if every subscriber
    /// allows the operation to proceed, `false` if any vetoes it.
    fn raise_event(&self, plan: NodeKey, signal: PlanSignal) -> bool;
}

// ============================================================================
// SECTION: Plan Clock
// ============================================================================

/// Supplies the reference date used only when a routing has neither a start
/// nor an end at initialization time.
pub trait PlanClock {
    /// Returns the current reference timestamp.
    fn current(&self) -> Timestamp;
}

// ============================================================================
// SECTION: Catalogs
// ============================================================================

/// Looks operations up by name. The model never enumerates operations; it
/// only resolves the one a factory call or plan references.
pub trait OperationCatalog {
    /// The concrete operation type this catalog returns.
    type Operation: Operation;

    /// Resolves an operation by name.
    fn get(&self, name: &OperationId) -> Option<&Self::Operation>;
}

/// Looks demands up by identifier, with mutable access for delivery-set
/// bookkeeping.
pub trait DemandCatalog {
    /// The concrete demand type this catalog returns.
    type Demand: Demand;

    /// Resolves a demand by identifier.
    fn get_mut(&mut self, id: &DemandId) -> Option<&mut Self::Demand>;
}
