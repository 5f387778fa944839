//! HTTP handlers

pub mod auth;
pub mod health;
pub mod inventory;
pub mod reorder;
pub mod role;
pub mod training;
pub mod user;
pub mod vehicle;

pub use auth::*;
pub use health::*;
pub use inventory::*;
pub use reorder::*;
pub use role::*;
pub use training::*;
pub use user::*;
pub use vehicle::*;
