// src/core/node.rs
// ============================================================================
// Module: Operation Plan Node
// Description: The base operation-plan record and its variant payload.
// Purpose: Shared fields plus the tagged variant dispatch
// (components D/E/F) living in one payload instead of an inheritance chain.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A plan is stored as one [`OperationPlanRecord`] per registered (or
//! not-yet-registered) node, held in the model's arena and addressed by
//! [`PlanId`]. Parent/child edges are plain ids instead of raw pointers:
//! the arena owns every record, a child's `owner` field is a non-owning
//! back-reference, and a parent's variant payload holds the owning edges
//! to its children (`steps`, `chosen`, or `inner`).

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::DemandId;
use crate::core::identifiers::NodeKey;
use crate::core::identifiers::OperationId;
use crate::core::identifiers::PlanId;
use crate::core::subplans::FlowSubplanRecord;
use crate::core::subplans::LoadSubplanRecord;
use crate::core::time::DateWindow;
use crate::core::time::Timestamp;

/// The epsilon used to turn "round up" into a `floor` by
/// nudging the quotient just under the next integer.
pub const SIZE_MULTIPLE_ROUND_UP_EPSILON: f64 = 0.999_999;

// ============================================================================
// SECTION: Variant
// ============================================================================

/// The composite shape a plan takes, fixed by its operation's kind and never
/// changed after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlanVariant {
    /// A leaf plan with no children.
    Simple,
    /// An ordered sequence of step plans, owned by this node.
    Routing {
        /// Child plan node keys, front-to-back in operation order.
        steps: Vec<NodeKey>,
    },
    /// A single chosen alternative, owned by this node.
    Alternate {
        /// The chosen child, if one has been selected.
        chosen: Option<NodeKey>,
    },
    /// A single delegated sub-plan, owned by this node.
    Effective {
        /// The inner plan, if one has been supplied.
        inner: Option<NodeKey>,
    },
}

impl PlanVariant {
    /// Returns `true` for [`PlanVariant::Simple`].
    #[must_use]
    pub const fn is_simple(&self) -> bool {
        matches!(self, Self::Simple)
    }

    /// Returns the owning edges to this variant's children, in the order the
    /// variant considers canonical.
    #[must_use]
    pub fn children(&self) -> Vec<NodeKey> {
        match self {
            Self::Simple => Vec::new(),
            Self::Routing { steps } => steps.clone(),
            Self::Alternate { chosen } => chosen.iter().copied().collect(),
            Self::Effective { inner } => inner.iter().copied().collect(),
        }
    }
}

// ============================================================================
// SECTION: Operation Plan Record
// ============================================================================

/// The base operation-plan node.
///
/// # Invariants
/// - `id` is `None` until registered by [`crate::runtime::PlanModel::initialize`].
/// - `quantity` is never negative.
/// - `locked` plans reject size/date mutation (enforced by the model, not
///   this record).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationPlanRecord {
    /// Registry identifier; `None` until registered.
    pub id: Option<PlanId>,
    /// The operation this plan instantiates.
    pub operation: OperationId,
    /// Planned quantity, non-negative.
    pub quantity: f64,
    /// Start/end date pair, either of which may be unset.
    pub dates: DateWindow,
    /// Freezes size/date setters when `true`.
    pub locked: bool,
    /// Earliest plannable start.
    pub epst: Option<Timestamp>,
    /// Latest plannable start.
    pub lpst: Option<Timestamp>,
    /// Non-owning back-reference to the parent plan's arena slot.
    pub owner: Option<NodeKey>,
    /// Non-owning reference to the demand this plan delivers to.
    pub demand: Option<DemandId>,
    /// Material sub-plans, rebuilt on date/quantity changes.
    pub flow_subplans: Vec<FlowSubplanRecord>,
    /// Capacity sub-plans, rebuilt on date/quantity changes.
    pub load_subplans: Vec<LoadSubplanRecord>,
    /// Suppresses cascading updates while `false`, for bulk construction.
    pub runupdate: bool,
    /// The composite shape and owned children.
    pub variant: PlanVariant,
}

impl OperationPlanRecord {
    /// Creates an unregistered, unlocked plan with `runupdate` disabled, the
    /// shape a factory builds before calling `initialize()`.
    #[must_use]
    pub fn new(operation: OperationId, variant: PlanVariant) -> Self {
        Self {
            id: None,
            operation,
            quantity: 0.0,
            dates: DateWindow::default(),
            locked: false,
            epst: None,
            lpst: None,
            owner: None,
            demand: None,
            flow_subplans: Vec::new(),
            load_subplans: Vec::new(),
            runupdate: false,
            variant,
        }
    }

    /// Returns `true` once this plan carries a registry identifier.
    #[must_use]
    pub const fn is_registered(&self) -> bool {
        self.id.is_some()
    }

    /// Returns `true` when this plan has no owner.
    #[must_use]
    pub const fn is_top_level(&self) -> bool {
        self.owner.is_none()
    }
}

// ============================================================================
// SECTION: Size-Rounding Arithmetic
// ============================================================================

/// Rounds a requested quantity against an operation's size-minimum and
/// size-multiple constraints.
///
/// Minimum is applied first: below it, `round_down` either zeroes the
/// quantity or snaps up to the minimum. The multiple is then applied to
/// whatever survives: `round_down` floors the quotient, otherwise the
/// quotient is nudged up by `round_up_epsilon` (see
/// [`SIZE_MULTIPLE_ROUND_UP_EPSILON`] for the default) before flooring,
/// expressing "round up to the next multiple" without a separate branch
/// for the exact-multiple case.
#[must_use]
pub fn round_quantity(
    requested: f64,
    round_down: bool,
    size_minimum: f64,
    size_multiple: f64,
    round_up_epsilon: f64,
) -> f64 {
    let mut value = requested;

    if size_minimum > 0.0 && value < size_minimum {
        if round_down {
            return 0.0;
        }
        value = size_minimum;
    }

    if size_multiple > 0.0 {
        let quotient = value / size_multiple;
        let mult = if round_down { quotient.floor() } else { (quotient + round_up_epsilon).floor() };
        return mult * size_multiple;
    }

    value
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "test module, panics are acceptable failures")]
mod tests {
    use super::round_quantity;

    #[test]
    fn below_minimum_rounds_to_zero_when_rounding_down() {
        assert_eq!(round_quantity(2.0, true, 5.0, 0.0, super::SIZE_MULTIPLE_ROUND_UP_EPSILON), 0.0);
    }

    #[test]
    fn below_minimum_snaps_up_when_not_rounding_down() {
        assert_eq!(round_quantity(2.0, false, 5.0, 0.0, super::SIZE_MULTIPLE_ROUND_UP_EPSILON), 5.0);
    }

    #[test]
    fn multiple_rounds_up_by_default() {
        assert_eq!(
            round_quantity(2.3 * 5.0, false, 0.0, 5.0, super::SIZE_MULTIPLE_ROUND_UP_EPSILON),
            3.0 * 5.0
        );
    }

    #[test]
    fn multiple_rounds_down_when_requested() {
        assert_eq!(
            round_quantity(2.3 * 5.0, true, 0.0, 5.0, super::SIZE_MULTIPLE_ROUND_UP_EPSILON),
            2.0 * 5.0
        );
    }

    #[test]
    fn exact_multiple_is_stable_either_direction() {
        assert_eq!(round_quantity(15.0, true, 0.0, 5.0, super::SIZE_MULTIPLE_ROUND_UP_EPSILON), 15.0);
        assert_eq!(round_quantity(15.0, false, 0.0, 5.0, super::SIZE_MULTIPLE_ROUND_UP_EPSILON), 15.0);
    }

    #[test]
    fn no_constraints_passes_value_through() {
        assert_eq!(round_quantity(7.25, false, 0.0, 0.0, super::SIZE_MULTIPLE_ROUND_UP_EPSILON), 7.25);
    }
}
