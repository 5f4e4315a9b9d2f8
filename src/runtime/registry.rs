// src/runtime/registry.rs
// ============================================================================
// Module: Operation Plan Registry
// Description: Arena, global id counter, and per-operation plan lists.
// Purpose: Id assignment/collision detection and O(1) deletion by id,
// backing every other runtime module.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! The registry owns every [`OperationPlanRecord`] in an arena keyed by
//! [`NodeKey`], independent of the business id ([`PlanId`]) that
//! `initialize()` assigns. This lets an unregistered routing step hold a
//! stable back-reference to its also-unregistered parent before either has
//! gone through registration, then have ids layered on top once
//! `initialize()` runs — an arena-plus-stable-indices approach to the
//! cyclic owner/child graph.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::num::NonZeroU64;

use crate::core::NodeKey;
use crate::core::OperationId;
use crate::core::OperationPlanRecord;
use crate::core::PlanId;
use crate::core::PlanRegistryError;

// ============================================================================
// SECTION: Registry
// ============================================================================

/// The arena and bookkeeping behind id assignment and lookup.
#[derive(Debug)]
pub struct PlanRegistry {
    /// Next arena slot to hand out. Purely internal; never exposed as a
    /// business id.
    next_key: NonZeroU64,
    /// Next business id to hand out when none is supplied; strictly greater
    /// than every assigned id.
    id_counter: NonZeroU64,
    /// Every allocated plan, registered or not, keyed by arena slot.
    nodes: HashMap<NodeKey, OperationPlanRecord>,
    /// Maps assigned business ids back to their arena slot.
    id_index: HashMap<PlanId, NodeKey>,
    /// Per-operation plan slots, newest-first (head-insertion order).
    /// Only registered plans appear here.
    by_operation: HashMap<OperationId, Vec<NodeKey>>,
}

impl Default for PlanRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// The outcome of resolving an id during [`PlanRegistry::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationOutcome {
    /// A fresh id was assigned and the record registered.
    Inserted(PlanId),
    /// An id collided with a plan already registered under the same
    /// operation; that existing plan's slot is returned and the caller's
    /// freshly allocated (and now removed) slot is discarded.
    ReusedExisting(NodeKey, PlanId),
}

impl PlanRegistry {
    /// Creates an empty registry with the id counter at its initial value
    /// of 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_key: NonZeroU64::MIN,
            id_counter: NonZeroU64::MIN,
            nodes: HashMap::new(),
            id_index: HashMap::new(),
            by_operation: HashMap::new(),
        }
    }

    /// Allocates an arena slot for `record`, which is not yet registered
    /// (its `id` stays `None` until [`PlanRegistry::register`] assigns
    /// one).
    pub fn allocate(&mut self, record: OperationPlanRecord) -> NodeKey {
        let key = self.next_node_key();
        self.nodes.insert(key, record);
        key
    }

    /// Looks up a plan by arena slot.
    #[must_use]
    pub fn get(&self, key: NodeKey) -> Option<&OperationPlanRecord> {
        self.nodes.get(&key)
    }

    /// Mutable variant of [`PlanRegistry::get`].
    pub fn get_mut(&mut self, key: NodeKey) -> Option<&mut OperationPlanRecord> {
        self.nodes.get_mut(&key)
    }

    /// Returns the plan registered under `id`, if any. `find_id` is never
    /// called with `id > counter` by the model, but this function is safe
    /// to call with any value.
    #[must_use]
    pub fn find_id(&self, id: PlanId) -> Option<&OperationPlanRecord> {
        if id.get() > self.id_counter.get() {
            return None;
        }
        self.id_index.get(&id).and_then(|key| self.nodes.get(key))
    }

    /// Mutable variant of [`PlanRegistry::find_id`].
    pub fn find_id_mut(&mut self, id: PlanId) -> Option<&mut OperationPlanRecord> {
        if id.get() > self.id_counter.get() {
            return None;
        }
        let key = *self.id_index.get(&id)?;
        self.nodes.get_mut(&key)
    }

    /// Returns the arena slot registered under `id`, if any.
    #[must_use]
    pub fn key_for_id(&self, id: PlanId) -> Option<NodeKey> {
        self.id_index.get(&id).copied()
    }

    /// Returns the plan slots registered for `operation`, newest-first.
    #[must_use]
    pub fn plans_for_operation(&self, operation: &OperationId) -> &[NodeKey] {
        self.by_operation.get(operation).map_or(&[], Vec::as_slice)
    }

    /// Resolves and registers a business id for the already-allocated slot
    /// `key`:
    /// - `requested` unset: takes `id_counter` and advances it.
    /// - `requested < id_counter` and `key` is itself already registered
    ///   under `id`: no-op, returns `key` as-is (re-registering an
    ///   already-initialized plan, e.g. via a sibling's `owner` reference,
    ///   must not collapse it onto "itself" as a duplicate).
    /// - `requested < id_counter` and a different plan is registered under
    ///   that id for a different operation: fails with
    ///   [`PlanRegistryError::DuplicateId`]; `key`'s slot is removed from
    ///   the arena before the error is returned.
    /// - `requested < id_counter` and a different plan is registered under
    ///   that id for the same operation: that plan's slot is returned and
    ///   `key`'s slot is removed from the arena.
    /// - `requested < id_counter` with no existing plan at that id: `key`
    ///   is registered under it as-is.
    /// - `requested >= id_counter`: `id_counter` advances to
    ///   `requested + 1` and `key` is registered under it.
    ///
    /// # Errors
    ///
    /// Returns [`PlanRegistryError::DuplicateId`] on a cross-operation id
    /// collision, in which case `key`'s arena slot is removed before the
    /// error is returned — the caller never has to clean up a slot that
    /// failed to register. Returns [`PlanRegistryError::MissingSlot`] if
    /// `key` (or the slot an explicit id resolves to) has already vanished
    /// from the arena, which should never happen given the caller
    /// contracts above.
    pub fn register(
        &mut self,
        key: NodeKey,
        requested: Option<PlanId>,
    ) -> Result<RegistrationOutcome, PlanRegistryError> {
        let Some(id) = requested else {
            let assigned = self.next_business_id();
            self.bind(key, assigned)?;
            return Ok(RegistrationOutcome::Inserted(assigned));
        };

        if id.get() >= self.id_counter.get() {
            self.id_counter = id.as_nonzero().saturating_add(1);
            self.bind(key, id)?;
            return Ok(RegistrationOutcome::Inserted(id));
        }

        match self.id_index.get(&id).copied() {
            None => {
                self.bind(key, id)?;
                Ok(RegistrationOutcome::Inserted(id))
            }
            Some(existing_key) if existing_key == key => {
                // `key` is already registered under `id`; re-running
                // registration on an already-initialized plan (e.g.
                // re-reading it through a sibling's `owner` reference) must
                // be a no-op, not a collapse onto a "different" duplicate.
                Ok(RegistrationOutcome::Inserted(id))
            }
            Some(existing_key) => {
                let existing_operation = self
                    .nodes
                    .get(&existing_key)
                    .ok_or(PlanRegistryError::MissingSlot(existing_key))?
                    .operation
                    .clone();
                let requested_operation =
                    self.nodes.get(&key).ok_or(PlanRegistryError::MissingSlot(key))?.operation.clone();
                if existing_operation != requested_operation {
                    self.nodes.remove(&key);
                    Err(PlanRegistryError::DuplicateId {
                        id,
                        existing: existing_operation,
                        requested: requested_operation,
                    })
                } else {
                    self.nodes.remove(&key);
                    Ok(RegistrationOutcome::ReusedExisting(existing_key, id))
                }
            }
        }
    }

    /// Removes and returns the plan registered under `key`, unlinking it
    /// from its operation's plan list and id index if it was registered.
    pub fn remove(&mut self, key: NodeKey) -> Option<OperationPlanRecord> {
        let record = self.nodes.remove(&key)?;
        if let Some(id) = record.id {
            self.id_index.remove(&id);
        }
        if let Some(list) = self.by_operation.get_mut(&record.operation) {
            list.retain(|candidate| *candidate != key);
        }
        Some(record)
    }

    fn next_node_key(&mut self) -> NodeKey {
        let assigned = self.next_key;
        self.next_key = self.next_key.saturating_add(1);
        NodeKey::new(assigned)
    }

    fn next_business_id(&mut self) -> PlanId {
        let assigned = self.id_counter;
        self.id_counter = self.id_counter.saturating_add(1);
        PlanId::new(assigned)
    }

    /// # Errors
    ///
    /// Returns [`PlanRegistryError::MissingSlot`] if `key` isn't a live
    /// arena slot.
    fn bind(&mut self, key: NodeKey, id: PlanId) -> Result<(), PlanRegistryError> {
        let record = self.nodes.get_mut(&key).ok_or(PlanRegistryError::MissingSlot(key))?;
        record.id = Some(id);
        let operation = record.operation.clone();
        self.id_index.insert(id, key);
        self.by_operation.entry(operation).or_default().insert(0, key);
        Ok(())
    }
}
