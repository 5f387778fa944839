//! Stock-transfer planning
//!
//! Moving stock between the store room and a vehicle is planned here as pure
//! arithmetic and executed by the backend inside one database transaction.
//! A plan either succeeds completely or fails without describing any change.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Effect of a transfer: how much the store-room quantity changes and the
/// quantity the vehicle holds afterwards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub inventory_delta: i32,
    pub assigned_quantity: i32,
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum StockError {
    #[error("Quantity must be greater than zero")]
    NonPositiveQuantity,
    #[error("Insufficient quantity in inventory: {available} available, {requested} requested")]
    Insufficient { available: i32, requested: i32 },
    #[error("Stock adjustment would leave {current} + ({delta}) below zero")]
    NegativeStock { current: i32, delta: i32 },
    #[error("Adjustment must change the quantity")]
    ZeroAdjustment,
    #[error("Quantity is out of range")]
    Overflow,
}

/// Put `requested` more units of an item on a vehicle that already carries
/// `already_assigned` of it
pub fn plan_assignment(
    available: i32,
    already_assigned: i32,
    requested: i32,
) -> Result<StockMovement, StockError> {
    if requested <= 0 {
        return Err(StockError::NonPositiveQuantity);
    }
    if available < requested {
        return Err(StockError::Insufficient {
            available,
            requested,
        });
    }
    let assigned_quantity = already_assigned
        .checked_add(requested)
        .ok_or(StockError::Overflow)?;
    Ok(StockMovement {
        inventory_delta: -requested,
        assigned_quantity,
    })
}

/// Change the quantity a vehicle carries from `current_assigned` to
/// `new_quantity`, taking the difference from or returning it to inventory
pub fn plan_quantity_change(
    available: i32,
    current_assigned: i32,
    new_quantity: i32,
) -> Result<StockMovement, StockError> {
    if new_quantity <= 0 {
        return Err(StockError::NonPositiveQuantity);
    }
    let delta = new_quantity
        .checked_sub(current_assigned)
        .ok_or(StockError::Overflow)?;
    if delta > available {
        return Err(StockError::Insufficient {
            available,
            requested: delta,
        });
    }
    Ok(StockMovement {
        inventory_delta: -delta,
        assigned_quantity: new_quantity,
    })
}

/// Take an item off a vehicle, returning everything it carried
pub fn plan_removal(current_assigned: i32) -> StockMovement {
    StockMovement {
        inventory_delta: current_assigned.max(0),
        assigned_quantity: 0,
    }
}

/// New quantity after a manual stock adjustment
pub fn plan_adjustment(current: i32, delta: i32) -> Result<i32, StockError> {
    if delta == 0 {
        return Err(StockError::ZeroAdjustment);
    }
    let next = current.checked_add(delta).ok_or(StockError::Overflow)?;
    if next < 0 {
        return Err(StockError::NegativeStock { current, delta });
    }
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_assignment_within_bounds() {
        let plan = plan_assignment(10, 0, 4).unwrap();
        assert_eq!(plan.inventory_delta, -4);
        assert_eq!(plan.assigned_quantity, 4);
    }

    #[test]
    fn test_assignment_merges_into_existing() {
        let plan = plan_assignment(10, 3, 2).unwrap();
        assert_eq!(plan.assigned_quantity, 5);
    }

    #[test]
    fn test_assignment_exhausting_stock() {
        assert!(plan_assignment(5, 0, 5).is_ok());
        assert_eq!(
            plan_assignment(5, 0, 6),
            Err(StockError::Insufficient {
                available: 5,
                requested: 6
            })
        );
        assert_eq!(plan_assignment(5, 0, 0), Err(StockError::NonPositiveQuantity));
    }

    #[test]
    fn test_quantity_change_both_directions() {
        let up = plan_quantity_change(3, 2, 5).unwrap();
        assert_eq!(up.inventory_delta, -3);
        let down = plan_quantity_change(0, 5, 1).unwrap();
        assert_eq!(down.inventory_delta, 4);
        assert_eq!(down.assigned_quantity, 1);
        assert!(plan_quantity_change(2, 2, 5).is_err());
    }

    #[test]
    fn test_removal_returns_everything() {
        assert_eq!(plan_removal(7).inventory_delta, 7);
        assert_eq!(plan_removal(7).assigned_quantity, 0);
    }

    #[test]
    fn test_adjustment() {
        assert_eq!(plan_adjustment(5, -5), Ok(0));
        assert_eq!(plan_adjustment(5, 3), Ok(8));
        assert!(matches!(plan_adjustment(5, -6), Err(StockError::NegativeStock { .. })));
        assert_eq!(plan_adjustment(5, 0), Err(StockError::ZeroAdjustment));
        assert_eq!(plan_adjustment(i32::MAX, 1), Err(StockError::Overflow));
    }

    proptest! {
        /// Stock held in the store room plus on the vehicle is conserved
        #[test]
        fn prop_transfers_conserve_stock(
            available in 0i32..10_000,
            assigned in 0i32..10_000,
            requested in 1i32..10_000,
        ) {
            if let Ok(plan) = plan_assignment(available, assigned, requested) {
                prop_assert_eq!(
                    available + assigned,
                    available + plan.inventory_delta + plan.assigned_quantity
                );
                prop_assert!(available + plan.inventory_delta >= 0);
            } else {
                prop_assert!(available < requested);
            }
        }

        #[test]
        fn prop_quantity_change_never_overdraws(
            available in 0i32..10_000,
            assigned in 1i32..10_000,
            new_quantity in 1i32..20_000,
        ) {
            match plan_quantity_change(available, assigned, new_quantity) {
                Ok(plan) => {
                    prop_assert!(available + plan.inventory_delta >= 0);
                    prop_assert_eq!(
                        available + assigned,
                        available + plan.inventory_delta + plan.assigned_quantity
                    );
                }
                Err(e) => {
                    let is_insufficient = matches!(e, StockError::Insufficient { .. });
                    prop_assert!(is_insufficient);
                }
            }
        }
    }
}
