//! Stock ledger tests
//!
//! Tests for signed stock movements including:
//! - Sign-driven addition/deduction semantics
//! - Availability checks honoring reserved stock
//! - Append-only audit trail accounting

use proptest::prelude::*;
use storefront_backend::services::stock::MovementType;

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// Test movement type labels
    #[test]
    fn test_movement_type_labels() {
        assert_eq!(MovementType::Inbound.as_str(), "inbound");
        assert_eq!(MovementType::Outbound.as_str(), "outbound");
        assert_eq!(MovementType::Adjust.as_str(), "adjust");
    }

    /// Test movement types serialize as snake_case
    #[test]
    fn test_movement_type_serde() {
        let types = [
            MovementType::Inbound,
            MovementType::Outbound,
            MovementType::Adjust,
        ];

        for t in types {
            let json = serde_json::to_string(&t).unwrap();
            assert_eq!(json, format!("\"{}\"", t.as_str()));

            let parsed: MovementType = serde_json::from_str(&json).unwrap();
            assert_eq!(parsed, t);
        }
    }

    /// Test available capacity derivation
    #[test]
    fn test_available_capacity() {
        let quantity = 10;
        let reserved = 3;
        let available = quantity - reserved;

        assert_eq!(available, 7);
    }

    /// Test that behavior is driven by sign, not by the movement type tag
    #[test]
    fn test_sign_drives_direction() {
        // An "adjust" with positive quantity adds stock
        let quantity = 10 + 5;
        assert_eq!(quantity, 15);

        // An "adjust" with negative quantity deducts stock
        let quantity = 15 - 3;
        assert_eq!(quantity, 12);
    }
}

// ============================================================================
// Ledger simulation (mirrors apply_movement semantics)
// ============================================================================

#[cfg(test)]
mod ledger_model {
    /// Simulate applying a signed movement to a stock item
    ///
    /// Returns the new on-hand quantity, or an error message when the
    /// deduction exceeds what is available after honoring reservations.
    pub fn simulate_movement(
        quantity_on_hand: i32,
        reserved: i32,
        movement: i32,
    ) -> Result<Option<i32>, &'static str> {
        if movement == 0 {
            // Zero-quantity movements are no-ops, not errors
            return Ok(None);
        }

        if movement < 0 {
            let available = quantity_on_hand - reserved;
            if -movement > available {
                return Err("Insufficient available stock");
            }
        }

        Ok(Some(quantity_on_hand + movement))
    }

    #[test]
    fn test_inbound_then_outbound() {
        // Start at 10, inbound +5, outbound -3
        let q = simulate_movement(10, 0, 5).unwrap().unwrap();
        assert_eq!(q, 15);

        let q = simulate_movement(q, 0, -3).unwrap().unwrap();
        assert_eq!(q, 12);
    }

    #[test]
    fn test_overdraft_rejected_leaves_quantity_unchanged() {
        let quantity = 12;
        let result = simulate_movement(quantity, 0, -20);

        assert!(result.is_err());
        assert_eq!(quantity, 12);
    }

    #[test]
    fn test_deduction_honors_reserved() {
        // 10 on hand, 8 reserved: only 2 available for deduction
        assert!(simulate_movement(10, 8, -3).is_err());
        assert_eq!(simulate_movement(10, 8, -2).unwrap(), Some(8));
    }

    #[test]
    fn test_zero_movement_is_noop() {
        assert_eq!(simulate_movement(10, 2, 0).unwrap(), None);
    }

    #[test]
    fn test_inbound_never_fails_on_availability() {
        // Additions are always accepted, even when nothing is available
        assert_eq!(simulate_movement(5, 5, 7).unwrap(), Some(12));
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::ledger_model::simulate_movement;
    use super::*;

    /// Strategy for signed movement quantities
    fn movement_strategy() -> impl Strategy<Value = i32> {
        -50i32..=50
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Accepted deductions never take quantity below reserved
        #[test]
        fn prop_quantity_never_below_reserved(
            initial in 0i32..=100,
            reserved_frac in 0i32..=100,
            movements in prop::collection::vec(movement_strategy(), 1..30)
        ) {
            let reserved = initial.min(reserved_frac);
            let mut quantity = initial;

            for m in movements {
                if let Ok(Some(q)) = simulate_movement(quantity, reserved, m) {
                    quantity = q;
                }
            }

            prop_assert!(quantity >= reserved);
            prop_assert!(quantity >= 0);
        }

        /// The audit trail accounts exactly for the on-hand delta
        #[test]
        fn prop_audit_trail_sums_to_delta(
            initial in 0i32..=100,
            movements in prop::collection::vec(movement_strategy(), 1..30)
        ) {
            let mut quantity = initial;
            let mut audit: Vec<i32> = Vec::new();

            for m in movements {
                if let Ok(Some(q)) = simulate_movement(quantity, 0, m) {
                    quantity = q;
                    audit.push(m);
                }
            }

            let logged: i32 = audit.iter().sum();
            prop_assert_eq!(quantity, initial + logged);

            // Movements are non-zero by construction
            prop_assert!(audit.iter().all(|m| *m != 0));
        }

        /// A rejected deduction is a pure no-op
        #[test]
        fn prop_rejected_deduction_changes_nothing(
            quantity in 0i32..=50,
            reserved_frac in 0i32..=50,
            excess in 1i32..=50
        ) {
            let reserved = quantity.min(reserved_frac);
            let available = quantity - reserved;
            let movement = -(available + excess);

            prop_assert!(simulate_movement(quantity, reserved, movement).is_err());
        }
    }
}
