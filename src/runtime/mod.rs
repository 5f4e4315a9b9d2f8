// src/runtime/mod.rs
// ============================================================================
// Module: Operation Plan Runtime
// Description: The arena-backed model, its registry, the factory dispatcher,
// and the serialization bridge.
// Purpose: Everything here depends on the host-supplied collaborator traits
// in `crate::interfaces`; `crate::core` stays free of them.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! [`PlanModel`] is the single mutable entry point: it owns the
//! [`PlanRegistry`] plus the collaborators spec.md §6 names,
//! and every other runtime module is a set of methods on it or a free
//! function taking it by reference. [`PlanModel::dispatch`] and
//! [`read_plan`]/[`write_plan`] are the two places external
//! input or output touches the model; everything else is driven by direct
//! method calls on [`PlanModel`].

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod factory;
pub mod model;
pub mod registry;
pub mod serialization;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use factory::Action;
pub use factory::PlanRequest;
pub use model::ModelConfig;
pub use model::PlanModel;
pub use registry::PlanRegistry;
pub use registry::RegistrationOutcome;
pub use serialization::WriteMode;
pub use serialization::read_plan;
pub use serialization::write_plan;
