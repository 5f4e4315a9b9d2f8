// src/runtime/factory.rs
// ============================================================================
// Module: Operation Plan Factory / Action Dispatcher
// Description: Decodes an attribute bundle into a located or newly created
// plan, enforcing the action's pre-conditions before any mutation.
// Purpose: The single entry point the serialization bridge (and any other
// caller wiring up external input) goes through to add, change, or
// remove a plan.
// Dependencies: crate::core, crate::interfaces, crate::runtime::model
// ============================================================================

//! ## Overview
//! [`PlanModel::dispatch`] never mutates anything before every precondition
//! for the requested [`Action`] has passed, converts every precondition
//! failure into a [`crate::core::PlanDataError`] before any state mutation,
//! and owns the rollback when a subscriber vetoes `SIG_ADD`: release the
//! lock and delete the just-created plan.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::NodeKey;
use crate::core::OperationId;
use crate::core::PlanDataError;
use crate::core::PlanError;
use crate::core::PlanId;
use crate::core::PlanLogicError;
use crate::interfaces::DemandCatalog;
use crate::interfaces::EventBus;
use crate::interfaces::LockManager;
use crate::interfaces::OperationCatalog;
use crate::interfaces::PlanClock;
use crate::interfaces::PlanSignal;
use crate::runtime::model::PlanModel;

// ============================================================================
// SECTION: Action
// ============================================================================

/// The action an attribute bundle requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Action {
    /// Create a new plan; fails if one is already registered under `id`.
    Add,
    /// Mutate an existing plan; fails if none is registered under `id`.
    Change,
    /// Delete an existing plan; fails if none is registered under `id`.
    Remove,
    /// Locate the plan if `id` resolves, otherwise create one. The default
    /// when no `action` attribute is supplied.
    #[default]
    AddChange,
}

// ============================================================================
// SECTION: Request
// ============================================================================

/// The decoded attribute bundle the factory dispatches on.
#[derive(Debug, Clone, Default)]
pub struct PlanRequest {
    /// The requested action.
    pub action: Action,
    /// The operation name, required for `ADD` and for creating a plan under
    /// `ADD_CHANGE`.
    pub operation: Option<OperationId>,
    /// The plan identifier, if one was supplied.
    pub id: Option<PlanId>,
}

impl PlanRequest {
    /// Builds a request with the given action.
    #[must_use]
    pub fn new(action: Action) -> Self {
        Self {
            action,
            operation: None,
            id: None,
        }
    }

    /// Sets the operation name.
    #[must_use]
    pub fn with_operation(mut self, operation: impl Into<OperationId>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    /// Sets the plan identifier.
    #[must_use]
    pub fn with_id(mut self, id: PlanId) -> Self {
        self.id = Some(id);
        self
    }
}

/// Missing-identifier error shared by `CHANGE` and `REMOVE`: a decoded `id`
/// that didn't resolve to a registered plan, or no `id` attribute at all.
fn not_found_error(id: Option<PlanId>) -> PlanDataError {
    match id {
        Some(id) => PlanDataError::UnknownPlan(id),
        None => PlanDataError::MissingPlanId,
    }
}

// ============================================================================
// SECTION: Dispatch
// ============================================================================

impl<OpCat, DemCat, Lock, Events, Clock> PlanModel<OpCat, DemCat, Lock, Events, Clock>
where
    OpCat: OperationCatalog,
    DemCat: DemandCatalog,
    Lock: LockManager,
    Events: EventBus,
    Clock: PlanClock,
{
    /// Locates, creates, mutates, or deletes a plan per `request`. Returns
    /// the located/created plan's arena slot, or `None` when `REMOVE`
    /// succeeded.
    ///
    /// Callers that go on to mutate the returned plan (e.g. the
    /// serialization bridge applying `quantity`/`start`/`end`/... fields)
    /// are responsible for releasing the write lock this acquires once
    /// they're done, via [`PlanModel::unlock`].
    ///
    /// # Errors
    ///
    /// Returns a [`PlanDataError`] for every precondition failure (missing
    /// operation, duplicate id across different operations, remove/change
    /// of an unknown id, add of an already existing id, a vetoed
    /// `SIG_ADD`/`SIG_REMOVE`), or a
    /// [`crate::core::PlanLogicError`]/[`crate::core::PlanRegistryError`]
    /// if the underlying creation fails.
    pub fn dispatch(&mut self, request: PlanRequest) -> Result<Option<NodeKey>, PlanError> {
        let existing_key = request.id.and_then(|id| self.key_for_id(id));

        if let Some(key) = existing_key {
            if let Some(requested_operation) = &request.operation {
                let existing_operation = self
                    .get(key)
                    .map(|record| record.operation.clone())
                    .ok_or(PlanLogicError::MissingOperation)?;
                if &existing_operation != requested_operation {
                    let id = request.id.ok_or(PlanDataError::MissingPlanId)?;
                    return Err(PlanDataError::OperationMismatch {
                        id,
                        existing: existing_operation,
                        requested: requested_operation.clone(),
                    }
                    .into());
                }
            }
        }

        match request.action {
            Action::Remove => return self.dispatch_remove(existing_key, request.id),
            Action::Add => {
                if existing_key.is_some() {
                    let id = request.id.ok_or(PlanDataError::MissingPlanId)?;
                    return Err(PlanDataError::PlanAlreadyExists(id).into());
                }
            }
            Action::Change => {
                if existing_key.is_none() {
                    return Err(not_found_error(request.id).into());
                }
            }
            Action::AddChange => {}
        }

        if let Some(key) = existing_key {
            self.lock(key);
            return Ok(Some(key));
        }

        let Some(operation) = request.operation else {
            return Err(PlanDataError::MissingOperationName.into());
        };
        self.dispatch_add(operation, request.id)
    }

    fn dispatch_remove(
        &mut self,
        existing_key: Option<NodeKey>,
        requested_id: Option<PlanId>,
    ) -> Result<Option<NodeKey>, PlanError> {
        let key = existing_key.ok_or_else(|| not_found_error(requested_id))?;
        let id = requested_id.ok_or_else(|| not_found_error(requested_id))?;
        self.lock(key);
        if self.raise(key, PlanSignal::Remove) {
            self.destroy(key)?;
            Ok(None)
        } else {
            self.unlock(key);
            Err(PlanDataError::RemovalVetoed(id).into())
        }
    }

    fn dispatch_add(&mut self, operation: OperationId, id: Option<PlanId>) -> Result<Option<NodeKey>, PlanError> {
        let key = self.create_plan(operation.clone(), 0.0, None, None, None, None, id, false)?;
        self.lock(key);
        if self.raise(key, PlanSignal::Add) {
            Ok(Some(key))
        } else {
            self.unlock(key);
            self.destroy(key)?;
            Err(PlanDataError::AdditionVetoed(operation).into())
        }
    }
}
