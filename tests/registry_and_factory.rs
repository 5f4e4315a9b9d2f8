// tests/registry_and_factory.rs
// ============================================================================
// Module: Registry and Factory Tests
// Description: Black-box tests for component A (id assignment/collision) and
// component G (the add/change/remove action dispatcher).
// ============================================================================

//! Exercises [`opplan_core::PlanRegistry`] id bookkeeping (spec.md §4.1) and
//! [`opplan_core::PlanModel::dispatch`] (spec.md §4.7) through fake
//! collaborators.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions are permitted."
)]

use std::cell::Cell;
use std::collections::HashMap;

use opplan_core::Action;
use opplan_core::Demand;
use opplan_core::DemandCatalog;
use opplan_core::DemandId;
use opplan_core::EventBus;
use opplan_core::FlowDefinition;
use opplan_core::LoadDefinition;
use opplan_core::LockManager;
use opplan_core::ModelConfig;
use opplan_core::NodeKey;
use opplan_core::Operation;
use opplan_core::OperationCatalog;
use opplan_core::OperationId;
use opplan_core::OperationKind;
use opplan_core::PlanClock;
use opplan_core::PlanDataError;
use opplan_core::PlanError;
use opplan_core::PlanId;
use opplan_core::PlanModel;
use opplan_core::PlanRegistryError;
use opplan_core::PlanRequest;
use opplan_core::PlanSignal;
use opplan_core::Timestamp;

// ============================================================================
// SECTION: Fakes
// ============================================================================

#[derive(Debug, Clone)]
struct FakeOperation {
    name: OperationId,
}

impl FakeOperation {
    fn new(name: &str) -> Self {
        Self {
            name: OperationId::new(name),
        }
    }
}

impl Operation for FakeOperation {
    fn name(&self) -> &OperationId {
        &self.name
    }

    fn kind(&self) -> OperationKind {
        OperationKind::Simple
    }

    fn hidden(&self) -> bool {
        false
    }

    fn sub_operations(&self) -> &[OperationId] {
        &[]
    }

    fn flows(&self) -> &[FlowDefinition] {
        &[]
    }

    fn loads(&self) -> &[LoadDefinition] {
        &[]
    }

    fn size_minimum(&self) -> f64 {
        0.0
    }

    fn size_multiple(&self) -> f64 {
        0.0
    }

    fn resolve_dates(
        &self,
        _quantity: f64,
        start: Option<Timestamp>,
        end: Option<Timestamp>,
    ) -> (Option<Timestamp>, Option<Timestamp>) {
        (start, end)
    }
}

struct FakeOperationCatalog(HashMap<OperationId, FakeOperation>);

impl FakeOperationCatalog {
    fn new(names: &[&str]) -> Self {
        Self(names.iter().map(|n| (OperationId::new(*n), FakeOperation::new(n))).collect())
    }
}

impl OperationCatalog for FakeOperationCatalog {
    type Operation = FakeOperation;

    fn get(&self, name: &OperationId) -> Option<&FakeOperation> {
        self.0.get(name)
    }
}

struct FakeDemand {
    id: DemandId,
}

impl Demand for FakeDemand {
    fn id(&self) -> &DemandId {
        &self.id
    }

    fn delivery_operation(&self) -> Option<&OperationId> {
        None
    }

    fn add_delivery(&mut self, _plan: PlanId) {}
    fn remove_delivery(&mut self, _plan: PlanId) {}
    fn set_changed(&mut self) {}
}

struct FakeDemandCatalog;

impl DemandCatalog for FakeDemandCatalog {
    type Demand = FakeDemand;

    fn get_mut(&mut self, _id: &DemandId) -> Option<&mut FakeDemand> {
        None
    }
}

#[derive(Default)]
struct FakeLockManager {
    locked: Cell<u32>,
}

impl LockManager for FakeLockManager {
    fn obtain_write_lock(&self, _plan: NodeKey) {
        self.locked.set(self.locked.get() + 1);
    }

    fn release_write_lock(&self, _plan: NodeKey) {
        self.locked.set(self.locked.get().saturating_sub(1));
    }
}

#[derive(Default)]
struct FakeEventBus {
    veto_add: Cell<bool>,
    veto_remove: Cell<bool>,
}

impl EventBus for FakeEventBus {
    fn raise_event(&self, _plan: NodeKey, signal: PlanSignal) -> bool {
        match signal {
            PlanSignal::Add => !self.veto_add.get(),
            PlanSignal::Remove => !self.veto_remove.get(),
        }
    }
}

struct FakeClock(Timestamp);

impl PlanClock for FakeClock {
    fn current(&self) -> Timestamp {
        self.0
    }
}

type TestModel = PlanModel<FakeOperationCatalog, FakeDemandCatalog, FakeLockManager, FakeEventBus, FakeClock>;

fn make_model(names: &[&str]) -> TestModel {
    PlanModel::new(
        FakeOperationCatalog::new(names),
        FakeDemandCatalog,
        FakeLockManager::default(),
        FakeEventBus::default(),
        FakeClock(Timestamp::from_unix_seconds(0)),
        ModelConfig::default(),
    )
}

// ============================================================================
// SECTION: Registry
// ============================================================================

#[test]
fn cross_operation_id_collision_fails_registration() {
    let mut model = make_model(&["a", "b"]);
    let shared_id = PlanId::from_u64(5).unwrap();

    let first = model.create_plan(OperationId::new("a"), 1.0, None, None, None, None, Some(shared_id), true).unwrap();
    model.initialize(first).unwrap();

    let second = model.create_plan(OperationId::new("b"), 1.0, None, None, None, None, Some(shared_id), true).unwrap();
    let err = model.initialize(second).unwrap_err();
    assert!(matches!(
        err,
        PlanError::Registry(PlanRegistryError::DuplicateId { id, .. }) if id == shared_id
    ));
    assert!(model.get(second).is_none(), "failed registration must remove the plan's own arena slot");
}

#[test]
fn explicit_id_advances_the_counter_for_subsequent_plans() {
    let mut model = make_model(&["a"]);
    let explicit = PlanId::from_u64(100).unwrap();

    let first = model.create_plan(OperationId::new("a"), 1.0, None, None, None, None, Some(explicit), true).unwrap();
    let first_id = model.initialize(first).unwrap().unwrap();
    assert_eq!(first_id, explicit);

    let second = model.create_plan(OperationId::new("a"), 1.0, None, None, None, None, None, true).unwrap();
    let second_id = model.initialize(second).unwrap().unwrap();
    assert_eq!(second_id.get(), 101);
}

#[test]
fn reusing_the_same_id_for_the_same_operation_collapses_to_the_existing_slot() {
    let mut model = make_model(&["a"]);
    let shared_id = PlanId::from_u64(7).unwrap();

    let first = model.create_plan(OperationId::new("a"), 1.0, None, None, None, None, Some(shared_id), true).unwrap();
    model.initialize(first).unwrap();

    let second = model.create_plan(OperationId::new("a"), 1.0, None, None, None, None, Some(shared_id), true).unwrap();
    model.initialize(second).unwrap();

    assert!(model.get(second).is_none());
    assert!(model.get(model.key_for_id(shared_id).unwrap()).is_some());
}

// ============================================================================
// SECTION: Factory
// ============================================================================

#[test]
fn add_without_id_creates_and_locates_a_new_plan() {
    let mut model = make_model(&["make"]);
    let key = model
        .dispatch(PlanRequest::new(Action::Add).with_operation("make"))
        .unwrap()
        .expect("add returns the created plan's key");
    assert!(model.get(key).is_some());
}

#[test]
fn add_with_existing_id_is_rejected() {
    let mut model = make_model(&["make"]);
    let id = PlanId::from_u64(1).unwrap();
    let created = model.create_plan(OperationId::new("make"), 1.0, None, None, None, None, Some(id), true).unwrap();
    model.initialize(created).unwrap();

    let err = model
        .dispatch(PlanRequest::new(Action::Add).with_operation("make").with_id(id))
        .unwrap_err();
    assert!(matches!(err, PlanError::Data(PlanDataError::PlanAlreadyExists(existing)) if existing == id));
}

#[test]
fn change_of_unknown_id_fails() {
    let mut model = make_model(&["make"]);
    let missing = PlanId::from_u64(99).unwrap();
    let err = model.dispatch(PlanRequest::new(Action::Change).with_id(missing)).unwrap_err();
    assert!(matches!(err, PlanError::Data(PlanDataError::UnknownPlan(id)) if id == missing));
}

#[test]
fn change_of_existing_id_locates_without_creating() {
    let mut model = make_model(&["make"]);
    let id = PlanId::from_u64(1).unwrap();
    let created = model.create_plan(OperationId::new("make"), 1.0, None, None, None, None, Some(id), true).unwrap();
    model.initialize(created).unwrap();

    let located = model.dispatch(PlanRequest::new(Action::Change).with_id(id)).unwrap();
    assert_eq!(located, Some(created));
}

#[test]
fn remove_of_unknown_id_fails() {
    let mut model = make_model(&["make"]);
    let missing = PlanId::from_u64(99).unwrap();
    let err = model.dispatch(PlanRequest::new(Action::Remove).with_id(missing)).unwrap_err();
    assert!(matches!(err, PlanError::Data(PlanDataError::UnknownPlan(id)) if id == missing));
}

#[test]
fn remove_destroys_the_plan_when_not_vetoed() {
    let mut model = make_model(&["make"]);
    let id = PlanId::from_u64(1).unwrap();
    let created = model.create_plan(OperationId::new("make"), 1.0, None, None, None, None, Some(id), true).unwrap();
    model.initialize(created).unwrap();

    let result = model.dispatch(PlanRequest::new(Action::Remove).with_id(id)).unwrap();
    assert_eq!(result, None);
    assert!(model.find_id(id).is_none());
}

#[test]
fn remove_vetoed_by_event_bus_leaves_the_plan_intact_and_releases_the_lock() {
    let mut model = make_model(&["make"]);
    let id = PlanId::from_u64(1).unwrap();
    let created = model.create_plan(OperationId::new("make"), 1.0, None, None, None, None, Some(id), true).unwrap();
    model.initialize(created).unwrap();
    model.events().veto_remove.set(true);

    let err = model.dispatch(PlanRequest::new(Action::Remove).with_id(id)).unwrap_err();
    assert!(matches!(err, PlanError::Data(PlanDataError::RemovalVetoed(existing)) if existing == id));
    assert!(model.find_id(id).is_some());
    assert_eq!(model.locks().locked.get(), 0);
}

#[test]
fn add_vetoed_by_event_bus_rolls_back_the_created_plan() {
    let mut model = make_model(&["make"]);
    model.events().veto_add.set(true);

    let err = model
        .dispatch(PlanRequest::new(Action::Add).with_operation("make"))
        .unwrap_err();
    assert!(matches!(err, PlanError::Data(PlanDataError::AdditionVetoed(op)) if op.as_str() == "make"));
    assert_eq!(model.locks().locked.get(), 0);
}

#[test]
fn add_change_with_unresolved_id_requires_an_operation_name() {
    let mut model = make_model(&["make"]);
    let err = model.dispatch(PlanRequest::new(Action::AddChange)).unwrap_err();
    assert!(matches!(err, PlanError::Data(PlanDataError::MissingOperationName)));
}

#[test]
fn requesting_a_different_operation_for_an_existing_id_is_rejected() {
    let mut model = make_model(&["a", "b"]);
    let id = PlanId::from_u64(1).unwrap();
    let created = model.create_plan(OperationId::new("a"), 1.0, None, None, None, None, Some(id), true).unwrap();
    model.initialize(created).unwrap();

    let err = model
        .dispatch(PlanRequest::new(Action::Change).with_operation("b").with_id(id))
        .unwrap_err();
    assert!(matches!(
        err,
        PlanError::Data(PlanDataError::OperationMismatch { id: mismatched_id, .. }) if mismatched_id == id
    ));
}
