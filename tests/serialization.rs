// tests/serialization.rs
// ============================================================================
// Module: Serialization Bridge Tests
// Description: Black-box tests for component H (read_plan/write_plan).
// Purpose: Cover the round-trip law and the cyclic write suppression
// scenario spec.md §8 names for this component.
// ============================================================================

//! Exercises [`opplan_core::read_plan`]/[`opplan_core::write_plan`]
//! (spec.md §4.8, §8) through fake collaborators.

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
use opplan_core::PlanModel;
use opplan_core::PlanSignal;
use opplan_core::Timestamp;
use opplan_core::WriteMode;
use opplan_core::read_plan;
use opplan_core::write_plan;

// ============================================================================
// SECTION: Fakes
// ============================================================================

#[derive(Debug, Clone)]
struct FakeOperation {
    name: OperationId,
    hidden: bool,
}

impl FakeOperation {
    fn new(name: &str) -> Self {
        Self {
            name: OperationId::new(name),
            hidden: false,
        }
    }

    fn hidden(name: &str) -> Self {
        Self {
            name: OperationId::new(name),
            hidden: true,
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
        self.hidden
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
    fn new(operations: Vec<FakeOperation>) -> Self {
        Self(operations.into_iter().map(|op| (op.name.clone(), op)).collect())
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
    delivery_operation: Option<OperationId>,
    deliveries: Vec<opplan_core::PlanId>,
}

impl opplan_core::Demand for FakeDemand {
    fn id(&self) -> &DemandId {
        &self.id
    }

    fn delivery_operation(&self) -> Option<&OperationId> {
        self.delivery_operation.as_ref()
    }

    fn add_delivery(&mut self, plan: opplan_core::PlanId) {
        self.deliveries.push(plan);
    }

    fn remove_delivery(&mut self, plan: opplan_core::PlanId) {
        self.deliveries.retain(|candidate| *candidate != plan);
    }

    fn set_changed(&mut self) {}
}

struct FakeDemandCatalog(HashMap<DemandId, FakeDemand>);

impl FakeDemandCatalog {
    fn new(demands: Vec<FakeDemand>) -> Self {
        Self(demands.into_iter().map(|d| (d.id.clone(), d)).collect())
    }
}

impl opplan_core::DemandCatalog for FakeDemandCatalog {
    type Demand = FakeDemand;

    fn get_mut(&mut self, id: &DemandId) -> Option<&mut FakeDemand> {
        self.0.get_mut(id)
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
struct FakeEventBus;

impl EventBus for FakeEventBus {
    fn raise_event(&self, _plan: NodeKey, _signal: PlanSignal) -> bool {
        true
    }
}

struct FakeClock(Timestamp);

impl PlanClock for FakeClock {
    fn current(&self) -> Timestamp {
        self.0
    }
}

type TestModel = PlanModel<FakeOperationCatalog, FakeDemandCatalog, FakeLockManager, FakeEventBus, FakeClock>;

fn make_model(operations: Vec<FakeOperation>, demands: Vec<FakeDemand>) -> TestModel {
    PlanModel::new(
        FakeOperationCatalog::new(operations),
        FakeDemandCatalog::new(demands),
        FakeLockManager::default(),
        FakeEventBus::default(),
        FakeClock(Timestamp::from_unix_seconds(0)),
        ModelConfig::default(),
    )
}

// ============================================================================
// SECTION: Round-trip law (spec.md §8)
// ============================================================================

#[test]
fn round_trip_preserves_scalar_fields_and_demand_id() {
    let mut model = make_model(
        vec![FakeOperation::new("make")],
        vec![FakeDemand {
            id: DemandId::new("d1"),
            delivery_operation: Some(OperationId::new("make")),
            deliveries: Vec::new(),
        }],
    );

    let source = serde_json::json!({
        "action": "add",
        "id": 7,
        "operation": "make",
        "quantity": 12.5,
        "start": 1_000,
        "end": 2_000,
        "locked": true,
        "epst": 500,
        "lpst": 2_500,
        "demand": "d1",
    });

    let key = read_plan(&mut model, &source).unwrap().unwrap();
    let written = write_plan(&model, key, WriteMode::Full, false).unwrap();

    let mut target = make_model(
        vec![FakeOperation::new("make")],
        vec![FakeDemand {
            id: DemandId::new("d1"),
            delivery_operation: Some(OperationId::new("make")),
            deliveries: Vec::new(),
        }],
    );
    let round_tripped_key = read_plan(&mut target, &written).unwrap().unwrap();

    let original = model.get(key).unwrap();
    let round_tripped = target.get(round_tripped_key).unwrap();

    assert_eq!(original.id, round_tripped.id);
    assert_eq!(original.operation, round_tripped.operation);
    assert_eq!(original.dates.start, round_tripped.dates.start);
    assert_eq!(original.dates.end, round_tripped.dates.end);
    assert_eq!(original.quantity, round_tripped.quantity);
    assert_eq!(original.locked, round_tripped.locked);
    assert_eq!(original.epst, round_tripped.epst);
    assert_eq!(original.lpst, round_tripped.lpst);
    assert_eq!(original.demand, round_tripped.demand);
}

#[test]
fn round_trip_preserves_owner_id() {
    let mut model = make_model(vec![FakeOperation::new("top"), FakeOperation::new("sub")], Vec::new());

    let owner_value = serde_json::json!({
        "action": "add",
        "id": 1,
        "operation": "top",
        "quantity": 1.0,
    });
    let owner_key = read_plan(&mut model, &owner_value).unwrap().unwrap();
    let owner_id = model.get(owner_key).unwrap().id.unwrap();

    let child_value = serde_json::json!({
        "action": "add",
        "id": 2,
        "operation": "sub",
        "quantity": 1.0,
        "owner": {"id": 1, "operation": "top"},
    });
    let child_key = read_plan(&mut model, &child_value).unwrap().unwrap();
    let written = write_plan(&model, child_key, WriteMode::Full, false).unwrap();

    assert_eq!(written.get("owner").and_then(|owner| owner.get("id")).and_then(serde_json::Value::as_u64), Some(1));

    let mut target = make_model(vec![FakeOperation::new("top"), FakeOperation::new("sub")], Vec::new());
    read_plan(&mut target, &owner_value).unwrap();
    let round_tripped_key = read_plan(&mut target, &written).unwrap().unwrap();

    let round_tripped_owner_key = target.get(round_tripped_key).unwrap().owner.unwrap();
    let round_tripped_owner_id = target.get(round_tripped_owner_key).unwrap().id.unwrap();
    assert_eq!(round_tripped_owner_id, owner_id);
}

// ============================================================================
// SECTION: Scenario 6 — cyclic write suppression
// ============================================================================

#[test]
fn write_plan_suppresses_demand_field_inside_a_demand_container() {
    let mut model = make_model(
        vec![FakeOperation::new("make")],
        vec![FakeDemand {
            id: DemandId::new("d1"),
            delivery_operation: Some(OperationId::new("make")),
            deliveries: Vec::new(),
        }],
    );

    let source = serde_json::json!({
        "action": "add",
        "id": 1,
        "operation": "make",
        "quantity": 1.0,
        "demand": "d1",
    });
    let key = read_plan(&mut model, &source).unwrap().unwrap();

    let top_level = write_plan(&model, key, WriteMode::Full, false).unwrap();
    assert_eq!(top_level.get("demand").and_then(serde_json::Value::as_str), Some("d1"));

    let nested_in_demand = write_plan(&model, key, WriteMode::Full, true).unwrap();
    assert!(nested_in_demand.get("demand").is_none());
}

// ============================================================================
// SECTION: Other write behavior
// ============================================================================

#[test]
fn write_plan_reference_mode_emits_only_id_and_operation() {
    let mut model = make_model(vec![FakeOperation::new("make")], Vec::new());
    let source = serde_json::json!({
        "action": "add",
        "id": 3,
        "operation": "make",
        "quantity": 1.0,
        "locked": true,
    });
    let key = read_plan(&mut model, &source).unwrap().unwrap();

    let reference = write_plan(&model, key, WriteMode::Reference, false).unwrap();
    let obj = reference.as_object().unwrap();
    assert_eq!(obj.len(), 2);
    assert_eq!(obj.get("id").and_then(serde_json::Value::as_u64), Some(3));
    assert_eq!(obj.get("operation").and_then(serde_json::Value::as_str), Some("make"));
}

#[test]
fn write_plan_omits_plans_of_hidden_operations() {
    let mut model = make_model(vec![FakeOperation::hidden("secret")], Vec::new());
    let source = serde_json::json!({
        "action": "add",
        "operation": "secret",
        "quantity": 1.0,
    });
    let key = read_plan(&mut model, &source).unwrap().unwrap();

    assert!(write_plan(&model, key, WriteMode::Full, false).is_none());
}

#[test]
fn read_plan_remove_deletes_the_plan() {
    let mut model = make_model(vec![FakeOperation::new("make")], Vec::new());
    let create = serde_json::json!({
        "action": "add",
        "id": 4,
        "operation": "make",
        "quantity": 1.0,
    });
    read_plan(&mut model, &create).unwrap();

    let remove = serde_json::json!({
        "action": "remove",
        "id": 4,
    });
    let result = read_plan(&mut model, &remove).unwrap();
    assert!(result.is_none());
    assert!(model.find_id(opplan_core::PlanId::from_u64(4).unwrap()).is_none());
}
