// tests/proptest_size_rounding.rs
// ============================================================================
// Module: Size Rounding Property-Based Tests
// Description: Property tests for `round_quantity` correctness and stability
// across wide input ranges.
// Purpose: Detect panics and invariant violations in the size-minimum/
// size-multiple rounding arithmetic (spec.md §4.3).
// ============================================================================

//! Property-based tests for size-rounding invariants.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use opplan_core::SIZE_MULTIPLE_ROUND_UP_EPSILON;
use opplan_core::round_quantity;
use proptest::prelude::*;

proptest! {
    #[test]
    fn result_is_never_negative(
        requested in 0.0f64..1_000_000.0,
        round_down in any::<bool>(),
        size_minimum in 0.0f64..1_000.0,
        size_multiple in 0.0f64..1_000.0,
    ) {
        let result = round_quantity(requested, round_down, size_minimum, size_multiple, SIZE_MULTIPLE_ROUND_UP_EPSILON);
        prop_assert!(result >= 0.0);
    }

    #[test]
    fn result_is_idempotent_under_the_multiple_alone(
        requested in 0.0f64..1_000_000.0,
        round_down in any::<bool>(),
        size_multiple in 1.0f64..1_000.0,
    ) {
        let once = round_quantity(requested, round_down, 0.0, size_multiple, SIZE_MULTIPLE_ROUND_UP_EPSILON);
        let twice = round_quantity(once, round_down, 0.0, size_multiple, SIZE_MULTIPLE_ROUND_UP_EPSILON);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn result_is_idempotent_under_the_minimum_alone(
        requested in 0.0f64..1_000_000.0,
        round_down in any::<bool>(),
        size_minimum in 0.0f64..1_000.0,
    ) {
        let once = round_quantity(requested, round_down, size_minimum, 0.0, SIZE_MULTIPLE_ROUND_UP_EPSILON);
        let twice = round_quantity(once, round_down, size_minimum, 0.0, SIZE_MULTIPLE_ROUND_UP_EPSILON);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn result_is_a_multiple_of_size_multiple(
        requested in 0.0f64..1_000_000.0,
        round_down in any::<bool>(),
        size_multiple in 1.0f64..1_000.0,
    ) {
        let result = round_quantity(requested, round_down, 0.0, size_multiple, SIZE_MULTIPLE_ROUND_UP_EPSILON);
        let quotient = result / size_multiple;
        prop_assert!((quotient - quotient.round()).abs() < 1e-6);
    }

    #[test]
    fn below_minimum_either_zeroes_or_snaps_up(
        requested in 0.0f64..1_000.0,
        size_minimum in 1.0f64..1_000.0,
    ) {
        prop_assume!(requested < size_minimum);
        let rounded_down = round_quantity(requested, true, size_minimum, 0.0, SIZE_MULTIPLE_ROUND_UP_EPSILON);
        let rounded_up = round_quantity(requested, false, size_minimum, 0.0, SIZE_MULTIPLE_ROUND_UP_EPSILON);
        prop_assert_eq!(rounded_down, 0.0);
        prop_assert_eq!(rounded_up, size_minimum);
    }

    #[test]
    fn no_constraints_passes_value_through_unchanged(requested in 0.0f64..1_000_000.0, round_down in any::<bool>()) {
        let result = round_quantity(requested, round_down, 0.0, 0.0, SIZE_MULTIPLE_ROUND_UP_EPSILON);
        prop_assert_eq!(result, requested);
    }

    #[test]
    fn never_panics_on_arbitrary_finite_input(
        requested in -1_000_000.0f64..1_000_000.0,
        round_down in any::<bool>(),
        size_minimum in -10.0f64..1_000.0,
        size_multiple in -10.0f64..1_000.0,
    ) {
        let _ = round_quantity(requested, round_down, size_minimum, size_multiple, SIZE_MULTIPLE_ROUND_UP_EPSILON);
    }
}
