//! Shared types and authorization rules for the Fire Department Administration Platform
//!
//! This crate contains the pure domain logic shared between the backend and the
//! browser (via WASM): the role catalogue, permission resolution, guard
//! predicates, the user-management access policy and stock-transfer planning.

pub mod models;
pub mod permissions;
pub mod policy;
pub mod stock;
pub mod types;
pub mod validation;

pub use models::*;
pub use permissions::*;
pub use policy::*;
pub use stock::*;
pub use types::*;
pub use validation::*;
