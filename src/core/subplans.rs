// src/core/subplans.rs
// ============================================================================
// Module: Flow/Load Sub-plan Set
// Description: Per-plan material and capacity accounting records.
// Purpose: Component B: exactly one flow sub-plan per flow definition and
// one load sub-plan per load definition on the owning operation, lazily
// materialized and rebuilt on date/quantity change.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Flow and load definitions themselves are external collaborators;
//! the core only needs their identifier and direction to account for a
//! plan's material/capacity effect. `update()` recomputes the effective date
//! from the owning plan's current quantity and dates; `check()` reports
//! whether that effect is still consistent with the owning plan.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Definitions
// ============================================================================

/// Which end of the plan's date window a flow or load takes effect at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EffectiveDate {
    /// The sub-plan takes effect at the owning plan's start.
    Start,
    /// The sub-plan takes effect at the owning plan's end.
    End,
}

/// A material movement an operation declares, referenced only for sub-plan
/// construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowDefinition {
    /// Identifier of the buffer this flow moves material through.
    pub buffer: String,
    /// Quantity per unit of the plan's quantity (may be negative for
    /// consumption).
    pub quantity_per: f64,
    /// Which end of the plan's window the movement takes effect at.
    pub effective: EffectiveDate,
}

/// A capacity consumption an operation declares, referenced only for
/// sub-plan construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadDefinition {
    /// Identifier of the resource this load consumes.
    pub resource: String,
    /// Quantity per unit of the plan's quantity.
    pub quantity_per: f64,
    /// Which end of the plan's window the consumption takes effect at.
    pub effective: EffectiveDate,
}

// ============================================================================
// SECTION: Sub-plan Records
// ============================================================================

/// A single plan's material effect against one [`FlowDefinition`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowSubplanRecord {
    /// The definition this sub-plan accounts for.
    pub buffer: String,
    /// Quantity per unit of the plan's quantity.
    pub quantity_per: f64,
    /// Which end of the plan's window the movement takes effect at.
    pub effective: EffectiveDate,
    /// The date last computed by `update()`, if the owning plan has one.
    pub date: Option<Timestamp>,
    /// The effective quantity last computed by `update()`.
    pub quantity: f64,
}

impl FlowSubplanRecord {
    /// Creates a sub-plan from its definition, with zeroed computed state
    /// (call `update()` before relying on `date`/`quantity`).
    #[must_use]
    pub fn from_definition(definition: &FlowDefinition) -> Self {
        Self {
            buffer: definition.buffer.clone(),
            quantity_per: definition.quantity_per,
            effective: definition.effective,
            date: None,
            quantity: 0.0,
        }
    }

    /// Recomputes `date` and `quantity` from the owning plan's current
    /// quantity and date window.
    pub fn update(&mut self, plan_quantity: f64, start: Option<Timestamp>, end: Option<Timestamp>) {
        self.quantity = plan_quantity * self.quantity_per;
        self.date = match self.effective {
            EffectiveDate::Start => start,
            EffectiveDate::End => end,
        };
    }

    /// Returns `true` when this sub-plan's computed date matches the plan's
    /// corresponding date window endpoint.
    #[must_use]
    pub fn check(&self, start: Option<Timestamp>, end: Option<Timestamp>) -> bool {
        let expected = match self.effective {
            EffectiveDate::Start => start,
            EffectiveDate::End => end,
        };
        self.date == expected
    }
}

/// A single plan's capacity effect against one [`LoadDefinition`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadSubplanRecord {
    /// The definition this sub-plan accounts for.
    pub resource: String,
    /// Quantity per unit of the plan's quantity.
    pub quantity_per: f64,
    /// Which end of the plan's window the consumption takes effect at.
    pub effective: EffectiveDate,
    /// The date last computed by `update()`, if the owning plan has one.
    pub date: Option<Timestamp>,
    /// The effective quantity last computed by `update()`.
    pub quantity: f64,
}

impl LoadSubplanRecord {
    /// Creates a sub-plan from its definition, with zeroed computed state
    /// (call `update()` before relying on `date`/`quantity`).
    #[must_use]
    pub fn from_definition(definition: &LoadDefinition) -> Self {
        Self {
            resource: definition.resource.clone(),
            quantity_per: definition.quantity_per,
            effective: definition.effective,
            date: None,
            quantity: 0.0,
        }
    }

    /// Recomputes `date` and `quantity` from the owning plan's current
    /// quantity and date window.
    pub fn update(&mut self, plan_quantity: f64, start: Option<Timestamp>, end: Option<Timestamp>) {
        self.quantity = plan_quantity * self.quantity_per;
        self.date = match self.effective {
            EffectiveDate::Start => start,
            EffectiveDate::End => end,
        };
    }

    /// Returns `true` when this sub-plan's computed date matches the plan's
    /// corresponding date window endpoint.
    #[must_use]
    pub fn check(&self, start: Option<Timestamp>, end: Option<Timestamp>) -> bool {
        let expected = match self.effective {
            EffectiveDate::Start => start,
            EffectiveDate::End => end,
        };
        self.date == expected
    }
}
