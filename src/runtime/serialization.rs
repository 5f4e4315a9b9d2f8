// src/runtime/serialization.rs
// ============================================================================
// Module: Operation Plan Serialization Bridge
// Description: Reads and writes the external JSON representation of a plan.
// Purpose: Component H: drive the factory (component G) from decoded
// attributes, apply the remaining fields in the order spec.md §4.8
// describes, then trigger `initialize()` once a freshly created plan's
// object closes.
// Dependencies: crate::core, crate::interfaces, crate::runtime::{factory,
// model}, serde_json
// ============================================================================

//! ## Overview
//! The source model's bridge is driven by a streaming XML parser's
//! begin/end-element callbacks, one tag at a time. Here a plan's external
//! representation is a single `serde_json::Value` object read in one call,
//! so [`read_plan`] applies every field the object carries instead of
//! dispatching per end-tag event — but it preserves the same per-field
//! semantics and ordering spec.md §4.8 specifies: `quantity`/`start`/`end`
//! bypass their respective solvers, a nested `owner` object is read through
//! recursively (mirroring "nested owner elements trigger read-through to a
//! new plan creation via G") before `set_owner` binds it, and the
//! object-end `initialize()` call happens last, gated on the sub-plan
//! collections still being empty.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Map;
use serde_json::Value;

use crate::core::DemandId;
use crate::core::NodeKey;
use crate::core::OperationId;
use crate::core::PlanDataError;
use crate::core::PlanError;
use crate::core::PlanId;
use crate::core::PlanLogicError;
use crate::core::Timestamp;
use crate::interfaces::DemandCatalog;
use crate::interfaces::EventBus;
use crate::interfaces::LockManager;
use crate::interfaces::Operation;
use crate::interfaces::OperationCatalog;
use crate::interfaces::PlanClock;
use crate::runtime::factory::Action;
use crate::runtime::factory::PlanRequest;
use crate::runtime::model::PlanModel;

// ============================================================================
// SECTION: Write mode
// ============================================================================

/// Whether [`write_plan`] emits a full record or just `(id, operation)`
///.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Emit the full record.
    Full,
    /// Emit only `(id, operation)`, the shape used when a plan is
    /// referenced from somewhere other than its own top-level entry.
    Reference,
}

// ============================================================================
// SECTION: Read
// ============================================================================

fn parse_action(raw: &str) -> Result<Action, PlanDataError> {
    match raw {
        "add" => Ok(Action::Add),
        "change" => Ok(Action::Change),
        "remove" => Ok(Action::Remove),
        "add_change" => Ok(Action::AddChange),
        other => Err(PlanDataError::InvalidAction(other.to_string())),
    }
}

fn parse_timestamp(value: &Value) -> Option<Timestamp> {
    value.as_i64().map(Timestamp::from_unix_seconds)
}

fn decode_request(obj: &Map<String, Value>) -> Result<PlanRequest, PlanDataError> {
    let action = match obj.get("action").and_then(Value::as_str) {
        Some(raw) => parse_action(raw)?,
        None => Action::AddChange,
    };
    let operation = obj.get("operation").and_then(Value::as_str).map(OperationId::new);
    let id = obj.get("id").and_then(Value::as_u64).and_then(PlanId::from_u64);
    Ok(PlanRequest {
        action,
        operation,
        id,
    })
}

/// Reads one plan's external representation, driving it through the
/// factory and every base/composite mutator the fields imply (spec.md
/// §4.8). Returns the plan's arena slot, or `None` when the object
/// requested `REMOVE` and it succeeded.
///
/// # Errors
///
/// Returns [`PlanLogicError::WrongObjectType`] if `value` isn't a JSON
/// object, or any [`PlanError`] the factory or a mutator surfaces.
pub fn read_plan<OpCat, DemCat, Lock, Events, Clock>(
    model: &mut PlanModel<OpCat, DemCat, Lock, Events, Clock>,
    value: &Value,
) -> Result<Option<NodeKey>, PlanError>
where
    OpCat: OperationCatalog,
    DemCat: DemandCatalog,
    Lock: LockManager,
    Events: EventBus,
    Clock: PlanClock,
{
    let obj = value.as_object().ok_or(PlanLogicError::WrongObjectType)?;
    let request = decode_request(obj)?;

    let Some(key) = model.dispatch(request)? else {
        return Ok(None);
    };

    if let Some(quantity) = obj.get("quantity").and_then(Value::as_f64) {
        model.set_quantity_raw(key, quantity)?;
    }
    if let Some(start) = obj.get("start").and_then(parse_timestamp) {
        model.set_start_raw(key, start)?;
    }
    if let Some(end) = obj.get("end").and_then(parse_timestamp) {
        model.set_end_raw(key, end)?;
    }
    if let Some(owner_value) = obj.get("owner") {
        if let Some(owner_key) = read_plan(model, owner_value)? {
            model.set_owner(key, Some(owner_key))?;
        }
    }
    if let Some(locked) = obj.get("locked").and_then(Value::as_bool) {
        model.set_locked(key, locked)?;
    }
    if let Some(epst) = obj.get("epst").and_then(parse_timestamp) {
        model.set_epst(key, epst)?;
    }
    if let Some(lpst) = obj.get("lpst").and_then(parse_timestamp) {
        model.set_lpst(key, lpst)?;
    }
    if let Some(demand_raw) = obj.get("demand").and_then(Value::as_str) {
        model.set_demand_raw(key, Some(DemandId::new(demand_raw)))?;
        model.register_delivery(key)?;
    }

    let sub_plans_empty =
        model.get(key).is_some_and(|record| record.flow_subplans.is_empty() && record.load_subplans.is_empty());
    if sub_plans_empty {
        model.enable_updates(key)?;
        model.initialize(key)?;
    }

    model.unlock(key);
    Ok(Some(key))
}

// ============================================================================
// SECTION: Write
// ============================================================================

/// Writes one plan's external representation. Returns
/// `None` when the plan's operation is hidden (plans of hidden operations
/// are omitted entirely).
///
/// `inside_demand_container` should be `true` when the caller is already
/// writing this plan as part of its linked demand's delivery list, so the
/// `demand` field is suppressed to avoid a cycle in the output (spec.md §8
/// scenario 6).
#[must_use]
pub fn write_plan<OpCat, DemCat, Lock, Events, Clock>(
    model: &PlanModel<OpCat, DemCat, Lock, Events, Clock>,
    key: NodeKey,
    mode: WriteMode,
    inside_demand_container: bool,
) -> Option<Value>
where
    OpCat: OperationCatalog,
    DemCat: DemandCatalog,
    Lock: LockManager,
    Events: EventBus,
    Clock: PlanClock,
{
    let record = model.get(key)?;
    let operation = model.operations().get(&record.operation)?;
    if operation.hidden() {
        return None;
    }

    if mode == WriteMode::Reference {
        return Some(serde_json::json!({
            "id": record.id.map(PlanId::get),
            "operation": record.operation.as_str(),
        }));
    }

    let mut obj = Map::new();
    if !inside_demand_container {
        if let Some(demand) = &record.demand {
            obj.insert("demand".to_string(), Value::String(demand.as_str().to_string()));
        }
    }
    obj.insert("id".to_string(), serde_json::json!(record.id.map(PlanId::get)));
    obj.insert("operation".to_string(), Value::String(record.operation.as_str().to_string()));
    obj.insert("start".to_string(), serde_json::json!(record.dates.start.map(Timestamp::as_unix_seconds)));
    obj.insert("end".to_string(), serde_json::json!(record.dates.end.map(Timestamp::as_unix_seconds)));
    obj.insert("quantity".to_string(), serde_json::json!(record.quantity));
    if record.locked {
        obj.insert("locked".to_string(), Value::Bool(true));
    }
    if let Some(epst) = record.epst {
        obj.insert("epst".to_string(), serde_json::json!(epst.as_unix_seconds()));
    }
    if let Some(lpst) = record.lpst {
        obj.insert("lpst".to_string(), serde_json::json!(lpst.as_unix_seconds()));
    }
    if let Some(owner) = record.owner {
        obj.insert("owner".to_string(), write_plan(model, owner, WriteMode::Reference, false)?);
    }

    Some(Value::Object(obj))
}
