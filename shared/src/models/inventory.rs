//! Inventory, vehicle and reorder models

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle of a restock request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReorderStatus {
    Pending,
    Approved,
    Ordered,
    Received,
    Cancelled,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Cannot change reorder status from {from} to {to}")]
    NotAllowed {
        from: ReorderStatus,
        to: ReorderStatus,
    },
    #[error("Unknown reorder status: {0}")]
    UnknownStatus(String),
}

impl ReorderStatus {
    pub const ALL: [ReorderStatus; 5] = [
        ReorderStatus::Pending,
        ReorderStatus::Approved,
        ReorderStatus::Ordered,
        ReorderStatus::Received,
        ReorderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReorderStatus::Pending => "pending",
            ReorderStatus::Approved => "approved",
            ReorderStatus::Ordered => "ordered",
            ReorderStatus::Received => "received",
            ReorderStatus::Cancelled => "cancelled",
        }
    }

    /// Statuses reachable in one step
    pub fn allowed_next(&self) -> &'static [ReorderStatus] {
        match self {
            ReorderStatus::Pending => &[ReorderStatus::Approved, ReorderStatus::Cancelled],
            ReorderStatus::Approved => &[ReorderStatus::Ordered, ReorderStatus::Cancelled],
            ReorderStatus::Ordered => &[ReorderStatus::Received, ReorderStatus::Cancelled],
            ReorderStatus::Received | ReorderStatus::Cancelled => &[],
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.allowed_next().is_empty()
    }

    pub fn transition(self, to: ReorderStatus) -> Result<ReorderStatus, TransitionError> {
        if self.allowed_next().contains(&to) {
            Ok(to)
        } else {
            Err(TransitionError::NotAllowed { from: self, to })
        }
    }
}

impl fmt::Display for ReorderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReorderStatus {
    type Err = TransitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ReorderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| TransitionError::UnknownStatus(s.to_string()))
    }
}

/// Operational state of an apparatus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VehicleStatus {
    #[default]
    Available,
    InService,
    Maintenance,
    OutOfService,
}

impl VehicleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleStatus::Available => "available",
            VehicleStatus::InService => "in_service",
            VehicleStatus::Maintenance => "maintenance",
            VehicleStatus::OutOfService => "out_of_service",
        }
    }
}

/// Kind of entry in the inventory audit trail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogAction {
    Created,
    Updated,
    Deleted,
    Adjusted,
    AssignedToVehicle,
    VehicleQuantityChanged,
    ReturnedFromVehicle,
    ReorderReceived,
}

impl LogAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogAction::Created => "created",
            LogAction::Updated => "updated",
            LogAction::Deleted => "deleted",
            LogAction::Adjusted => "adjusted",
            LogAction::AssignedToVehicle => "assigned_to_vehicle",
            LogAction::VehicleQuantityChanged => "vehicle_quantity_changed",
            LogAction::ReturnedFromVehicle => "returned_from_vehicle",
            LogAction::ReorderReceived => "reorder_received",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reorder_happy_path() {
        let status = ReorderStatus::Pending
            .transition(ReorderStatus::Approved)
            .and_then(|s| s.transition(ReorderStatus::Ordered))
            .and_then(|s| s.transition(ReorderStatus::Received));
        assert_eq!(status, Ok(ReorderStatus::Received));
    }

    #[test]
    fn test_reorder_cannot_skip_approval() {
        assert!(ReorderStatus::Pending
            .transition(ReorderStatus::Received)
            .is_err());
        assert!(ReorderStatus::Pending.transition(ReorderStatus::Ordered).is_err());
    }

    #[test]
    fn test_terminal_statuses_are_final() {
        for to in ReorderStatus::ALL {
            assert!(ReorderStatus::Received.transition(to).is_err());
            assert!(ReorderStatus::Cancelled.transition(to).is_err());
        }
        assert!(ReorderStatus::Received.is_terminal());
        assert!(!ReorderStatus::Ordered.is_terminal());
    }

    #[test]
    fn test_reorder_status_parse() {
        assert_eq!("ordered".parse::<ReorderStatus>(), Ok(ReorderStatus::Ordered));
        assert!("lost".parse::<ReorderStatus>().is_err());
    }
}
