// src/runtime/model.rs
// ============================================================================
// Module: Operation Plan Model
// Description: The mutator surface over the plan arena.
// Purpose: Implements base-node operations (create/initialize/destroy,
// set_start/set_end/set_quantity/set_owner/set_demand) and the three
// composite variants' specialized date/quantity propagation and ownership
// bookkeeping, all dispatched through `OperationPlanRecord::variant`.
// Dependencies: crate::core, crate::interfaces, crate::runtime::registry
// ============================================================================

//! ## Overview
//! `PlanModel` owns a [`PlanRegistry`] plus the host-supplied collaborators
//!: an [`OperationCatalog`], a [`DemandCatalog`], a
//! [`LockManager`], an [`EventBus`], and a [`PlanClock`]. Every mutator here
//! assumes the caller already holds whatever write lock the factory (see
//! [`crate::runtime::factory`]) would have acquired: mutators assume the
//! caller holds the appropriate lock.
//!
//! Variant dispatch is a `match` on [`PlanVariant`] rather than virtual
//! dispatch: each base operation (`set_start`, `set_end`, `set_quantity`,
//! `update`, `add_sub`, `erase_sub`, `initialize`) has a default path taken
//! by `Simple` plans and by `Routing` plans with no steps yet, and a
//! specialized path for each composite shape.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::DateWindow;
use crate::core::DemandId;
use crate::core::FlowSubplanRecord;
use crate::core::LoadSubplanRecord;
use crate::core::NodeKey;
use crate::core::OperationId;
use crate::core::OperationPlanRecord;
use crate::core::PlanDataError;
use crate::core::PlanError;
use crate::core::PlanId;
use crate::core::PlanLogicError;
use crate::core::PlanVariant;
use crate::core::PlanWarning;
use crate::core::Timestamp;
use crate::core::round_quantity;
use crate::interfaces::Demand;
use crate::interfaces::DemandCatalog;
use crate::interfaces::EventBus;
use crate::interfaces::LockManager;
use crate::interfaces::Operation;
use crate::interfaces::OperationCatalog;
use crate::interfaces::OperationKind;
use crate::interfaces::PlanClock;
use crate::interfaces::PlanSignal;
use crate::runtime::registry::PlanRegistry;
use crate::runtime::registry::RegistrationOutcome;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Construction-time knobs for a [`PlanModel`].
///
/// The only numeric constant hard-coded into the sizing arithmetic is the
/// "round up without a branch" epsilon; everything else about a plan's
/// shape comes from the `Operation` collaborator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelConfig {
    /// Epsilon nudging a quotient up before flooring when rounding a
    /// quantity up to the next size multiple. See
    /// [`crate::core::SIZE_MULTIPLE_ROUND_UP_EPSILON`] for the default.
    pub round_up_epsilon: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            round_up_epsilon: crate::core::SIZE_MULTIPLE_ROUND_UP_EPSILON,
        }
    }
}

// ============================================================================
// SECTION: Plan Model
// ============================================================================

/// The operation-plan core: arena plus collaborators, mutated only through
/// the methods below.
pub struct PlanModel<OpCat, DemCat, Lock, Events, Clock> {
    registry: PlanRegistry,
    operations: OpCat,
    demands: DemCat,
    locks: Lock,
    events: Events,
    clock: Clock,
    config: ModelConfig,
    /// Non-fatal misuse collected instead of logged.
    warnings: Vec<PlanWarning>,
    /// Operations marked changed by `mark_changed`, standing in for an
    /// out-of-scope problem-detection trigger; drained by the host,
    /// mirroring the warnings sink.
    changed_operations: Vec<OperationId>,
}

impl<OpCat, DemCat, Lock, Events, Clock> PlanModel<OpCat, DemCat, Lock, Events, Clock>
where
    OpCat: OperationCatalog,
    DemCat: DemandCatalog,
    Lock: LockManager,
    Events: EventBus,
    Clock: PlanClock,
{
    /// Creates an empty model with the id counter at its initial value.
    pub fn new(
        operations: OpCat,
        demands: DemCat,
        locks: Lock,
        events: Events,
        clock: Clock,
        config: ModelConfig,
    ) -> Self {
        Self {
            registry: PlanRegistry::new(),
            operations,
            demands,
            locks,
            events,
            clock,
            config,
            warnings: Vec::new(),
            changed_operations: Vec::new(),
        }
    }

    // ------------------------------------------------------------------
    // Read-only accessors
    // ------------------------------------------------------------------

    /// Returns the plan registered under `id`, if any.
    #[must_use]
    pub fn find_id(&self, id: PlanId) -> Option<&OperationPlanRecord> {
        self.registry.find_id(id)
    }

    /// Returns the plan at arena slot `key`.
    #[must_use]
    pub fn get(&self, key: NodeKey) -> Option<&OperationPlanRecord> {
        self.registry.get(key)
    }

    /// Returns the arena slot registered under `id`, if any.
    #[must_use]
    pub fn key_for_id(&self, id: PlanId) -> Option<NodeKey> {
        self.registry.key_for_id(id)
    }

    /// Returns every plan registered for `operation`, newest-first.
    #[must_use]
    pub fn plans_for_operation(&self, operation: &OperationId) -> &[NodeKey] {
        self.registry.plans_for_operation(operation)
    }

    /// Drains the collected non-fatal warnings.
    pub fn take_warnings(&mut self) -> Vec<PlanWarning> {
        std::mem::take(&mut self.warnings)
    }

    /// Drains the operations marked changed since the last drain.
    pub fn take_changed_operations(&mut self) -> Vec<OperationId> {
        std::mem::take(&mut self.changed_operations)
    }

    /// Exposes the operation catalog for inspection by callers (e.g. the
    /// serialization bridge, which needs `hidden()` to skip output).
    #[must_use]
    pub fn operations(&self) -> &OpCat {
        &self.operations
    }

    /// Exposes the demand catalog for mutable inspection.
    pub fn demands(&mut self) -> &mut DemCat {
        &mut self.demands
    }

    /// Exposes the lock manager.
    #[must_use]
    pub fn locks(&self) -> &Lock {
        &self.locks
    }

    /// Exposes the event bus.
    #[must_use]
    pub fn events(&self) -> &Events {
        &self.events
    }

    // ------------------------------------------------------------------
    // Internal accessors
    // ------------------------------------------------------------------

    fn record(&self, key: NodeKey) -> Result<&OperationPlanRecord, PlanLogicError> {
        self.registry.get(key).ok_or(PlanLogicError::MissingOperation)
    }

    fn record_mut(&mut self, key: NodeKey) -> Result<&mut OperationPlanRecord, PlanLogicError> {
        self.registry.get_mut(key).ok_or(PlanLogicError::MissingOperation)
    }

    fn operation_of(&self, key: NodeKey) -> Result<&OpCat::Operation, PlanLogicError> {
        let name = self.record(key)?.operation.clone();
        self.operations.get(&name).ok_or(PlanLogicError::MissingOperation)
    }

    // ==================================================================
    // SECTION: Creation
    // ==================================================================

    /// Allocates a new, unregistered plan for `operation` and — when
    /// `owner` is given — wires it into the owner's variant via
    /// [`PlanModel::add_sub`]. Plans are created, then separately
    /// `initialize()`d.
    ///
    /// # Errors
    ///
    /// Returns [`PlanDataError::UnknownOperation`] if `operation` isn't in
    /// the catalog, or a [`PlanLogicError`] if `owner` doesn't resolve.
    pub fn create_plan(
        &mut self,
        operation: OperationId,
        quantity: f64,
        start: Option<Timestamp>,
        end: Option<Timestamp>,
        demand: Option<DemandId>,
        owner: Option<NodeKey>,
        id: Option<PlanId>,
        runupdate: bool,
    ) -> Result<NodeKey, PlanError> {
        let op = self
            .operations
            .get(&operation)
            .ok_or_else(|| PlanDataError::UnknownOperation(operation.clone()))?;
        let variant = match op.kind() {
            OperationKind::Simple => PlanVariant::Simple,
            OperationKind::Routing => PlanVariant::Routing {
                steps: Vec::new(),
            },
            OperationKind::Alternate => PlanVariant::Alternate {
                chosen: None,
            },
            OperationKind::Effective => PlanVariant::Effective {
                inner: None,
            },
        };
        let (resolved_start, resolved_end) = op.resolve_dates(quantity, start, end);

        let mut record = OperationPlanRecord::new(operation, variant);
        record.quantity = quantity;
        record.dates = DateWindow::new(resolved_start, resolved_end);
        record.demand = demand;
        record.owner = owner;
        record.runupdate = runupdate;
        record.id = id;

        let key = self.registry.allocate(record);
        if let Some(owner_key) = owner {
            self.add_sub(owner_key, key)?;
        }
        Ok(key)
    }

    // ==================================================================
    // SECTION: Initialize
    // ==================================================================

    /// Registers `key`, materializing step/alternate/effective children
    /// first. Returns `None` when a zero-quantity top-level plan
    /// self-destructs.
    ///
    /// # Errors
    ///
    /// Returns [`PlanLogicError::MissingOperation`] if the plan has no
    /// valid operation, [`PlanLogicError::EffectiveMissingInner`] if an
    /// effective-variant plan has no inner at this point, or
    /// [`crate::core::PlanRegistryError::DuplicateId`] on a cross-operation id
    /// collision.
    pub fn initialize(&mut self, key: NodeKey) -> Result<Option<PlanId>, PlanError> {
        let variant = self.record(key)?.variant.clone();
        let children: Vec<NodeKey> = match variant {
            PlanVariant::Simple => Vec::new(),
            PlanVariant::Routing {
                steps,
            } => {
                let steps = if steps.is_empty() { self.create_routing_steps(key)? } else { steps };
                for step in &steps {
                    self.initialize(*step)?;
                }
                steps
            }
            PlanVariant::Alternate {
                chosen,
            } => {
                let chosen = match chosen {
                    Some(child) => child,
                    None => self.create_first_alternative(key)?,
                };
                self.initialize(chosen)?;
                vec![chosen]
            }
            PlanVariant::Effective {
                inner,
            } => {
                let inner = inner.ok_or(PlanLogicError::EffectiveMissingInner)?;
                self.initialize(inner)?;
                vec![inner]
            }
        };
        match self.initialize_self(key) {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                // initialize_self only fails before mutating anything beyond
                // the registration attempt itself, but the children above
                // are already fully registered. Tear them back down so a
                // cross-operation id collision on the parent doesn't leave
                // live, registered siblings pointing at a parent whose own
                // slot just got removed.
                for child in children {
                    let _ = self.destroy_node(child);
                }
                Err(err)
            }
        }
    }

    fn initialize_self(&mut self, key: NodeKey) -> Result<Option<PlanId>, PlanError> {
        if self.operation_of(key).is_err() {
            return Err(PlanLogicError::MissingOperation.into());
        }

        let record = self.record(key)?;
        if record.quantity <= 0.0 && record.owner.is_none() {
            self.registry.remove(key);
            return Ok(None);
        }

        let requested_id = record.id;
        let owner = record.owner;
        let outcome = self.registry.register(key, requested_id)?;
        let (final_key, id) = match outcome {
            RegistrationOutcome::Inserted(id) => (key, id),
            RegistrationOutcome::ReusedExisting(existing_key, id) => {
                if let Some(owner_key) = owner {
                    self.replace_child_ref(owner_key, key, existing_key);
                }
                (existing_key, id)
            }
        };

        self.create_flow_loads(final_key)?;

        let demand = self.record(final_key)?.demand.clone();
        if let Some(demand_id) = demand {
            let operation = self.record(final_key)?.operation.clone();
            if let Some(demand_obj) = self.demands.get_mut(&demand_id) {
                if demand_obj.delivery_operation() == Some(&operation) {
                    demand_obj.add_delivery(id);
                }
            }
        }

        self.mark_changed(final_key)?;
        debug_assert!(self.check(final_key), "plan {id} failed its own invariants at initialize");
        Ok(Some(id))
    }

    fn replace_child_ref(&mut self, owner: NodeKey, old: NodeKey, new: NodeKey) {
        let Some(record) = self.registry.get_mut(owner) else {
            return;
        };
        match &mut record.variant {
            PlanVariant::Routing {
                steps,
            } => {
                for step in steps.iter_mut() {
                    if *step == old {
                        *step = new;
                    }
                }
            }
            PlanVariant::Alternate {
                chosen,
            } => {
                if *chosen == Some(old) {
                    *chosen = Some(new);
                }
            }
            PlanVariant::Effective {
                inner,
            } => {
                if *inner == Some(old) {
                    *inner = Some(new);
                }
            }
            PlanVariant::Simple => {}
        }
    }

    /// Materializes a routing's step sub-plans when none exist yet
    ///: anchored by end and built in reverse operation
    /// order when the top end is set, otherwise anchored by start (or the
    /// plan clock, when neither is set) and built forward.
    fn create_routing_steps(&mut self, key: NodeKey) -> Result<Vec<NodeKey>, PlanError> {
        let (operation, quantity, dates) = {
            let record = self.record(key)?;
            (record.operation.clone(), record.quantity, record.dates)
        };
        let sub_operations: Vec<OperationId> =
            self.operations.get(&operation).ok_or(PlanLogicError::MissingOperation)?.sub_operations().to_vec();

        let mut steps = Vec::with_capacity(sub_operations.len());
        if let Some(end) = dates.end {
            let mut anchor = end;
            for sub in sub_operations.iter().rev() {
                let child = self.create_plan(
                    sub.clone(),
                    quantity,
                    None,
                    Some(anchor),
                    None,
                    Some(key),
                    None,
                    true,
                )?;
                anchor = self.record(child)?.dates.start.unwrap_or(anchor);
                steps.push(child);
            }
            steps.reverse();
        } else {
            let mut anchor = dates.start.unwrap_or_else(|| self.clock.current());
            for sub in &sub_operations {
                let child = self.create_plan(
                    sub.clone(),
                    quantity,
                    Some(anchor),
                    None,
                    None,
                    Some(key),
                    None,
                    true,
                )?;
                anchor = self.record(child)?.dates.end.unwrap_or(anchor);
                steps.push(child);
            }
        }

        self.record_mut(key)?.variant = PlanVariant::Routing {
            steps: steps.clone(),
        };
        Ok(steps)
    }

    /// Materializes an alternate variant's default chosen child from the
    /// operation's first sub-operation.
    fn create_first_alternative(&mut self, key: NodeKey) -> Result<NodeKey, PlanError> {
        let (operation, quantity, dates) = {
            let record = self.record(key)?;
            (record.operation.clone(), record.quantity, record.dates)
        };
        let first = self
            .operations
            .get(&operation)
            .ok_or(PlanLogicError::MissingOperation)?
            .sub_operations()
            .first()
            .cloned();
        let Some(first) = first else {
            return Err(PlanLogicError::MissingOperation.into());
        };
        self.create_plan(first, quantity, dates.start, dates.end, None, Some(key), None, true)
    }

    // ==================================================================
    // SECTION: Flow/Load sub-plans
    // ==================================================================

    /// Materializes one sub-plan per flow/load definition, idempotently
    ///.
    fn create_flow_loads(&mut self, key: NodeKey) -> Result<(), PlanError> {
        let already_materialized = {
            let record = self.record(key)?;
            !record.flow_subplans.is_empty() || !record.load_subplans.is_empty()
        };
        if already_materialized {
            return Ok(());
        }

        let operation = self.record(key)?.operation.clone();
        let op = self.operations.get(&operation).ok_or(PlanLogicError::MissingOperation)?;
        let flows: Vec<FlowSubplanRecord> =
            op.flows().iter().map(FlowSubplanRecord::from_definition).collect();
        let loads: Vec<LoadSubplanRecord> =
            op.loads().iter().map(LoadSubplanRecord::from_definition).collect();

        let record = self.record_mut(key)?;
        record.flow_subplans = flows;
        record.load_subplans = loads;
        self.resize_flow_load_plans(key)?;
        Ok(())
    }

    /// Recomputes every existing flow/load sub-plan's date and quantity
    /// without recreating them.
    fn resize_flow_load_plans(&mut self, key: NodeKey) -> Result<(), PlanLogicError> {
        let record = self.record_mut(key)?;
        let quantity = record.quantity;
        let start = record.dates.start;
        let end = record.dates.end;
        for flow in &mut record.flow_subplans {
            flow.update(quantity, start, end);
        }
        for load in &mut record.load_subplans {
            load.update(quantity, start, end);
        }
        Ok(())
    }

    /// Checks every flow/load sub-plan of `key` against its owning plan's
    /// current dates.
    #[must_use]
    pub fn check(&self, key: NodeKey) -> bool {
        let Some(record) = self.registry.get(key) else {
            return false;
        };
        let (start, end) = (record.dates.start, record.dates.end);
        record.flow_subplans.iter().all(|flow| flow.check(start, end))
            && record.load_subplans.iter().all(|load| load.check(start, end))
    }

    // ==================================================================
    // SECTION: Date mutators
    // ==================================================================

    /// Sets `key`'s start date, propagating through a routing's steps or
    /// delegating to an alternate/effective's chosen child.
    ///
    /// # Errors
    ///
    /// Returns [`PlanLogicError`] if `key` doesn't resolve or its
    /// operation is missing from the catalog.
    pub fn set_start(&mut self, key: NodeKey, date: Timestamp) -> Result<(), PlanLogicError> {
        match self.record(key)?.variant.clone() {
            PlanVariant::Simple => self.base_set_start(key, date),
            PlanVariant::Routing {
                steps,
            } if steps.is_empty() => self.base_set_start(key, date),
            PlanVariant::Routing {
                steps,
            } => self.routing_set_start(key, date, &steps),
            PlanVariant::Alternate {
                chosen: Some(child),
            }
            | PlanVariant::Effective {
                inner: Some(child),
            } => self.wrapper_set_start(key, date, child),
            PlanVariant::Alternate {
                chosen: None,
            }
            | PlanVariant::Effective {
                inner: None,
            } => Ok(()),
        }
    }

    /// Sets `key`'s end date. Symmetric to [`PlanModel::set_start`].
    ///
    /// # Errors
    ///
    /// Returns [`PlanLogicError`] if `key` doesn't resolve or its
    /// operation is missing from the catalog.
    pub fn set_end(&mut self, key: NodeKey, date: Timestamp) -> Result<(), PlanLogicError> {
        match self.record(key)?.variant.clone() {
            PlanVariant::Simple => self.base_set_end(key, date),
            PlanVariant::Routing {
                steps,
            } if steps.is_empty() => self.base_set_end(key, date),
            PlanVariant::Routing {
                steps,
            } => self.routing_set_end(key, date, &steps),
            PlanVariant::Alternate {
                chosen: Some(child),
            }
            | PlanVariant::Effective {
                inner: Some(child),
            } => self.wrapper_set_end(key, date, child),
            PlanVariant::Alternate {
                chosen: None,
            }
            | PlanVariant::Effective {
                inner: None,
            } => Ok(()),
        }
    }

    fn base_set_start(&mut self, key: NodeKey, date: Timestamp) -> Result<(), PlanLogicError> {
        if self.record(key)?.locked {
            return Ok(());
        }
        let quantity = self.record(key)?.quantity;
        let op = self.operation_of(key)?;
        let (resolved_start, resolved_end) = op.resolve_dates(quantity, Some(date), None);
        self.record_mut(key)?.dates = DateWindow::new(resolved_start, resolved_end);
        self.after_date_mutation(key)
    }

    fn base_set_end(&mut self, key: NodeKey, date: Timestamp) -> Result<(), PlanLogicError> {
        if self.record(key)?.locked {
            return Ok(());
        }
        let quantity = self.record(key)?.quantity;
        let op = self.operation_of(key)?;
        let (resolved_start, resolved_end) = op.resolve_dates(quantity, None, Some(date));
        self.record_mut(key)?.dates = DateWindow::new(resolved_start, resolved_end);
        self.after_date_mutation(key)
    }

    fn after_date_mutation(&mut self, key: NodeKey) -> Result<(), PlanLogicError> {
        if self.record(key)?.runupdate {
            self.update(key)
        } else {
            self.mark_changed(key)
        }
    }

    /// Routing `set_end`: walks steps back-to-front,
    /// pushing each step's end down to `d` (then advancing `d` to that
    /// step's resolved start) as long as the step's current end exceeds
    /// `d` — or unconditionally on the very first step, a deliberately
    /// preserved quirk: it forces re-propagation through the last step
    /// even when its end already equals `d`.
    fn routing_set_end(
        &mut self,
        key: NodeKey,
        date: Timestamp,
        steps: &[NodeKey],
    ) -> Result<(), PlanLogicError> {
        let mut target = date;
        let mut first_move = true;
        for &step in steps.iter().rev() {
            let step_end = self.record(step)?.dates.end;
            let should_move = first_move || step_end.is_some_and(|end| end > target);
            if !should_move {
                break;
            }
            self.set_end(step, target)?;
            first_move = false;
            target = self.record(step)?.dates.start.unwrap_or(target);
        }
        self.resync_routing_dates(key, steps)
    }

    /// Routing `set_start`: symmetric to [`PlanModel::routing_set_end`].
    fn routing_set_start(
        &mut self,
        key: NodeKey,
        date: Timestamp,
        steps: &[NodeKey],
    ) -> Result<(), PlanLogicError> {
        let mut target = date;
        let mut first_move = true;
        for &step in steps {
            let step_start = self.record(step)?.dates.start;
            let should_move = first_move || step_start.is_some_and(|start| start < target);
            if !should_move {
                break;
            }
            self.set_start(step, target)?;
            first_move = false;
            target = self.record(step)?.dates.end.unwrap_or(target);
        }
        self.resync_routing_dates(key, steps)
    }

    fn resync_routing_dates(&mut self, key: NodeKey, steps: &[NodeKey]) -> Result<(), PlanLogicError> {
        let Some((&first, &last)) = steps.first().zip(steps.last()) else {
            return Ok(());
        };
        let start = self.record(first)?.dates.start;
        let end = self.record(last)?.dates.end;
        self.record_mut(key)?.dates = DateWindow::new(start, end);
        Ok(())
    }

    /// Alternate/effective `set_start`/`set_end`:
    /// delegates to the chosen/inner child, then resyncs top dates from
    /// it directly — note this does *not* run the base
    /// `update()`/`mark_changed()` cascade here; the resync after
    /// delegation is the entire effect on the wrapper itself (the child's
    /// own `set_start`/`set_end` already drove its own cascade).
    fn wrapper_set_start(
        &mut self,
        key: NodeKey,
        date: Timestamp,
        child: NodeKey,
    ) -> Result<(), PlanLogicError> {
        self.set_start(child, date)?;
        self.resync_wrapper_dates(key, child)
    }

    fn wrapper_set_end(
        &mut self,
        key: NodeKey,
        date: Timestamp,
        child: NodeKey,
    ) -> Result<(), PlanLogicError> {
        self.set_end(child, date)?;
        self.resync_wrapper_dates(key, child)
    }

    fn resync_wrapper_dates(&mut self, key: NodeKey, child: NodeKey) -> Result<(), PlanLogicError> {
        let dates = self.record(child)?.dates;
        self.record_mut(key)?.dates = dates;
        Ok(())
    }

    // ==================================================================
    // SECTION: Quantity mutator (components C/D/E/F)
    // ==================================================================

    /// Sets `key`'s quantity, rounding to the owning operation's size
    /// minimum/multiple. Non-top plans recurse to their
    /// owner, which is the sole size authority; routing/alternate/
    /// effective variants then copy the rounded quantity straight into
    /// their children (bypassing the children's own rounding) and resize
    /// each child's flow/load sub-plans directly, without re-running the
    /// children's full `update()` cascade.
    ///
    /// # Errors
    ///
    /// Returns [`PlanDataError::NegativeQuantity`] for `requested < 0`, or
    /// a [`PlanLogicError`] if `key` or its operation doesn't resolve.
    pub fn set_quantity(
        &mut self,
        key: NodeKey,
        requested: f64,
        round_down: bool,
    ) -> Result<(), PlanError> {
        if requested < 0.0 {
            return Err(PlanDataError::NegativeQuantity(requested).into());
        }
        if self.record(key)?.locked {
            return Ok(());
        }
        if let Some(owner) = self.record(key)?.owner {
            return self.set_quantity(owner, requested, round_down);
        }

        let op = self.operation_of(key)?;
        let rounded =
            round_quantity(requested, round_down, op.size_minimum(), op.size_multiple(), self.config.round_up_epsilon);
        self.record_mut(key)?.quantity = rounded;
        self.after_date_mutation(key)?;

        let children = self.record(key)?.variant.children();
        for child in children {
            self.record_mut(child)?.quantity = rounded;
            self.resize_flow_load_plans(child)?;
        }
        Ok(())
    }

    // ==================================================================
    // SECTION: Owner / ownership bookkeeping (components C/D/E/F)
    // ==================================================================

    /// Re-parents `key`, detaching from any existing owner first
    ///.
    ///
    /// # Errors
    ///
    /// Returns [`PlanLogicError`] if `key` doesn't resolve.
    pub fn set_owner(&mut self, key: NodeKey, new_owner: Option<NodeKey>) -> Result<(), PlanLogicError> {
        let old_owner = self.record(key)?.owner;
        if old_owner == new_owner {
            return Ok(());
        }
        if let Some(old) = old_owner {
            self.erase_sub(old, key)?;
        }
        self.record_mut(key)?.owner = new_owner;
        if let Some(new) = new_owner {
            self.add_sub(new, key)?;
        }
        Ok(())
    }

    /// Registers `child` in `owner`'s variant payload and resyncs
    /// `owner`'s top dates from it. Deliberately asymmetric: routing
    /// cascades `update()`-or-`mark_changed()` unconditionally, while
    /// alternate and effective only cascade `update()` when `runupdate`
    /// is set, with no `mark_changed()` fallback.
    fn add_sub(&mut self, owner: NodeKey, child: NodeKey) -> Result<(), PlanLogicError> {
        if self.record(child)?.owner != Some(owner) {
            return Err(PlanLogicError::OwnershipMismatch {
                child,
                owner,
            });
        }
        match self.record(owner)?.variant.clone() {
            PlanVariant::Routing {
                mut steps,
            } => {
                steps.insert(0, child);
                self.record_mut(owner)?.variant = PlanVariant::Routing {
                    steps: steps.clone(),
                };
                self.resync_routing_dates(owner, &steps)?;
                self.after_date_mutation(owner)
            }
            PlanVariant::Alternate {
                ..
            } => {
                self.record_mut(owner)?.variant = PlanVariant::Alternate {
                    chosen: Some(child),
                };
                self.resync_wrapper_dates(owner, child)?;
                if self.record(owner)?.runupdate {
                    self.update(owner)
                } else {
                    Ok(())
                }
            }
            PlanVariant::Effective {
                ..
            } => {
                self.record_mut(owner)?.variant = PlanVariant::Effective {
                    inner: Some(child),
                };
                self.resync_wrapper_dates(owner, child)?;
                if self.record(owner)?.runupdate {
                    self.update(owner)
                } else {
                    Ok(())
                }
            }
            PlanVariant::Simple => Ok(()),
        }
    }

    /// Removes `child` from `owner`'s variant payload. For alternate and
    /// effective, removing anything but the currently chosen/inner child
    /// is misuse: a [`PlanWarning::EraseSubNotRegistered`] is recorded
    /// rather than failing the call.
    fn erase_sub(&mut self, owner: NodeKey, child: NodeKey) -> Result<(), PlanLogicError> {
        match self.record(owner)?.variant.clone() {
            PlanVariant::Routing {
                mut steps,
            } => {
                steps.retain(|candidate| *candidate != child);
                self.record_mut(owner)?.variant = PlanVariant::Routing {
                    steps,
                };
            }
            PlanVariant::Alternate {
                chosen,
            } => {
                if chosen == Some(child) {
                    self.record_mut(owner)?.variant = PlanVariant::Alternate {
                        chosen: None,
                    };
                } else {
                    self.warn_erase_sub_not_registered(owner, child)?;
                }
            }
            PlanVariant::Effective {
                inner,
            } => {
                if inner == Some(child) {
                    self.record_mut(owner)?.variant = PlanVariant::Effective {
                        inner: None,
                    };
                } else {
                    self.warn_erase_sub_not_registered(owner, child)?;
                }
            }
            PlanVariant::Simple => {}
        }
        Ok(())
    }

    fn warn_erase_sub_not_registered(&mut self, owner: NodeKey, child: NodeKey) -> Result<(), PlanLogicError> {
        let owner_id = self.record(owner)?.id;
        let child_id = self.record(child)?.id;
        if let (Some(owner_id), Some(child_id)) = (owner_id, child_id) {
            self.warnings.push(PlanWarning::EraseSubNotRegistered {
                target: child_id,
                parent: owner_id,
            });
        }
        Ok(())
    }

    // ==================================================================
    // SECTION: Demand linkage
    // ==================================================================

    /// Sets the demand a plan delivers to, maintaining the demand's
    /// delivery set. The delivery-set side effect only
    /// fires once `key` is registered (has a [`PlanId`]); an unregistered
    /// plan's `demand` field is reconciled when `initialize()` runs.
    ///
    /// # Errors
    ///
    /// Returns [`PlanLogicError`] if `key` doesn't resolve.
    pub fn set_demand(&mut self, key: NodeKey, demand: Option<DemandId>) -> Result<(), PlanLogicError> {
        let old = self.record(key)?.demand.clone();
        if old == demand {
            return Ok(());
        }
        let id = self.record(key)?.id;
        if let (Some(old_id), Some(plan_id)) = (&old, id) {
            if let Some(demand_obj) = self.demands.get_mut(old_id) {
                demand_obj.remove_delivery(plan_id);
            }
        }
        self.record_mut(key)?.demand = demand.clone();
        if let Some(new_id) = &demand {
            if let Some(demand_obj) = self.demands.get_mut(new_id) {
                demand_obj.set_changed();
            }
        }
        Ok(())
    }

    /// Sets the locked flag. No cascading effects.
    ///
    /// # Errors
    ///
    /// Returns [`PlanLogicError`] if `key` doesn't resolve.
    pub fn set_locked(&mut self, key: NodeKey, locked: bool) -> Result<(), PlanLogicError> {
        self.record_mut(key)?.locked = locked;
        Ok(())
    }

    // ==================================================================
    // SECTION: Direct field writers (serialization bridge)
    // ==================================================================

    /// Assigns quantity directly, without rounding or cascading: a parsed
    /// `quantity` value lands straight on the field, unlike
    /// [`PlanModel::set_quantity`].
    ///
    /// # Errors
    ///
    /// Returns [`PlanLogicError`] if `key` doesn't resolve.
    pub fn set_quantity_raw(&mut self, key: NodeKey, value: f64) -> Result<(), PlanLogicError> {
        self.record_mut(key)?.quantity = value;
        Ok(())
    }

    /// Assigns the start date directly, bypassing the operation's date
    /// solver: `start`/`end` are set directly on the `dates` pair.
    ///
    /// # Errors
    ///
    /// Returns [`PlanLogicError`] if `key` doesn't resolve.
    pub fn set_start_raw(&mut self, key: NodeKey, value: Timestamp) -> Result<(), PlanLogicError> {
        self.record_mut(key)?.dates.start = Some(value);
        Ok(())
    }

    /// Assigns the end date directly. Symmetric to
    /// [`PlanModel::set_start_raw`].
    ///
    /// # Errors
    ///
    /// Returns [`PlanLogicError`] if `key` doesn't resolve.
    pub fn set_end_raw(&mut self, key: NodeKey, value: Timestamp) -> Result<(), PlanLogicError> {
        self.record_mut(key)?.dates.end = Some(value);
        Ok(())
    }

    /// Assigns the earliest plannable start timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`PlanLogicError`] if `key` doesn't resolve.
    pub fn set_epst(&mut self, key: NodeKey, value: Timestamp) -> Result<(), PlanLogicError> {
        self.record_mut(key)?.epst = Some(value);
        Ok(())
    }

    /// Assigns the latest plannable start timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`PlanLogicError`] if `key` doesn't resolve.
    pub fn set_lpst(&mut self, key: NodeKey, value: Timestamp) -> Result<(), PlanLogicError> {
        self.record_mut(key)?.lpst = Some(value);
        Ok(())
    }

    /// Assigns the `demand` field directly, without the attach/detach
    /// bookkeeping [`PlanModel::set_demand`] performs. A nested `demand`
    /// reference registers a delivery directly, a distinct code path from
    /// the plain setter.
    ///
    /// # Errors
    ///
    /// Returns [`PlanLogicError`] if `key` doesn't resolve.
    pub fn set_demand_raw(&mut self, key: NodeKey, demand: Option<DemandId>) -> Result<(), PlanLogicError> {
        self.record_mut(key)?.demand = demand;
        Ok(())
    }

    /// Enables the cascading-update gate (`runupdate = true`), typically
    /// immediately before `initialize()`.
    ///
    /// # Errors
    ///
    /// Returns [`PlanLogicError`] if `key` doesn't resolve.
    pub fn enable_updates(&mut self, key: NodeKey) -> Result<(), PlanLogicError> {
        self.record_mut(key)?.runupdate = true;
        Ok(())
    }

    /// Registers `key` as a delivery on its linked demand, provided both
    /// resolve. A no-op if `key` has no demand, or isn't registered yet
    /// (the `initialize()` cascade performs the same registration once an
    /// id is assigned).
    ///
    /// # Errors
    ///
    /// Returns [`PlanLogicError::WrongObjectType`] if `key`'s demand field
    /// names a demand the catalog doesn't contain.
    pub fn register_delivery(&mut self, key: NodeKey) -> Result<(), PlanLogicError> {
        let record = self.record(key)?;
        let Some(demand_id) = record.demand.clone() else {
            return Ok(());
        };
        let Some(plan_id) = record.id else {
            return Ok(());
        };
        match self.demands.get_mut(&demand_id) {
            Some(demand_obj) => {
                demand_obj.add_delivery(plan_id);
                Ok(())
            }
            None => Err(PlanLogicError::WrongObjectType),
        }
    }

    // ==================================================================
    // SECTION: Change propagation
    // ==================================================================

    /// Resyncs a composite's top dates from its children, resizes
    /// flow/load sub-plans, recurses to the owner, then marks the plan
    /// (and, transitively, its operation/demand) changed.
    ///
    /// # Errors
    ///
    /// Returns [`PlanLogicError`] if `key` doesn't resolve.
    pub fn update(&mut self, key: NodeKey) -> Result<(), PlanLogicError> {
        match self.record(key)?.variant.clone() {
            PlanVariant::Routing {
                steps,
            } if !steps.is_empty() => self.resync_routing_dates(key, &steps)?,
            PlanVariant::Alternate {
                chosen: Some(child),
            }
            | PlanVariant::Effective {
                inner: Some(child),
            } => self.resync_wrapper_dates(key, child)?,
            _ => {}
        }
        self.resize_flow_load_plans(key)?;
        if let Some(owner) = self.record(key)?.owner {
            self.update(owner)?;
        }
        self.mark_changed(key)
    }

    /// Defers to the owner if one exists; otherwise marks the owning
    /// operation and linked demand changed.
    ///
    /// # Errors
    ///
    /// Returns [`PlanLogicError`] if `key` doesn't resolve.
    pub fn mark_changed(&mut self, key: NodeKey) -> Result<(), PlanLogicError> {
        let record = self.record(key)?;
        if let Some(owner) = record.owner {
            return self.mark_changed(owner);
        }
        let operation = record.operation.clone();
        let demand = record.demand.clone();
        self.changed_operations.push(operation);
        if let Some(demand_id) = demand {
            if let Some(demand_obj) = self.demands.get_mut(&demand_id) {
                demand_obj.set_changed();
            }
        }
        Ok(())
    }

    // ==================================================================
    // SECTION: Destruction
    // ==================================================================

    /// Destroys `key`: detaches from and destroys its owner (the
    /// parent-owns-child-owns-parent cascade), then tears itself and its
    /// own variant-owned children down, unregistering each from the id
    /// index, per-operation list, and linked demand's delivery set as it
    /// goes.
    ///
    /// # Errors
    ///
    /// Returns [`PlanLogicError`] if `key` doesn't resolve.
    pub fn destroy(&mut self, key: NodeKey) -> Result<(), PlanLogicError> {
        let owner = self.record(key)?.owner;
        if let Some(owner_key) = owner {
            self.erase_sub(owner_key, key)?;
            self.record_mut(key)?.owner = None;
        }
        self.destroy_node(key)?;
        if let Some(owner_key) = owner {
            self.destroy_node(owner_key)?;
        }
        Ok(())
    }

    /// Destroys `key` and every child still owned through its variant
    /// payload, without touching `key`'s own `owner` link. Each child has
    /// its `owner` nulled out directly before being torn down, so its own
    /// recursive destruction never re-triggers this owner's deletion.
    fn destroy_node(&mut self, key: NodeKey) -> Result<(), PlanLogicError> {
        let children = self.registry.get(key).map(|record| record.variant.children()).unwrap_or_default();
        for child in children {
            if let Some(record) = self.registry.get_mut(child) {
                record.owner = None;
            }
            self.destroy_node(child)?;
        }
        self.finalize_destroy(key);
        Ok(())
    }

    fn finalize_destroy(&mut self, key: NodeKey) {
        let Some(record) = self.registry.get(key) else {
            return;
        };
        if let (Some(id), Some(demand_id)) = (record.id, record.demand.clone()) {
            if let Some(demand_obj) = self.demands.get_mut(&demand_id) {
                demand_obj.remove_delivery(id);
            }
        }
        self.registry.remove(key);
    }

    /// Bulk-deletes every plan belonging to `operation`, optionally
    /// skipping locked ones, capturing the next slot before each deletion
    /// since deletion mutates the list.
    ///
    /// # Errors
    ///
    /// Returns [`PlanLogicError`] if a captured slot disappears
    /// unexpectedly mid-iteration.
    pub fn delete_operation_plans(
        &mut self,
        operation: &OperationId,
        delete_locked: bool,
    ) -> Result<(), PlanLogicError> {
        let keys: Vec<NodeKey> = self.registry.plans_for_operation(operation).to_vec();
        for key in keys {
            let Some(record) = self.registry.get(key) else {
                continue;
            };
            if delete_locked || !record.locked {
                self.destroy(key)?;
            }
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Event bus integration helpers used by the factory
// ============================================================================

impl<OpCat, DemCat, Lock, Events, Clock> PlanModel<OpCat, DemCat, Lock, Events, Clock>
where
    OpCat: OperationCatalog,
    DemCat: DemandCatalog,
    Lock: LockManager,
    Events: EventBus,
    Clock: PlanClock,
{
    /// Acquires a write lock on `key` via the configured lock manager.
    pub fn lock(&self, key: NodeKey) {
        self.locks.obtain_write_lock(key);
    }

    /// Releases a write lock on `key`.
    pub fn unlock(&self, key: NodeKey) {
        self.locks.release_write_lock(key);
    }

    /// Raises a lifecycle signal for `key`, returning whether every
    /// subscriber allowed the operation to proceed.
    #[must_use]
    pub fn raise(&self, key: NodeKey, signal: PlanSignal) -> bool {
        self.events.raise_event(key, signal)
    }
}
