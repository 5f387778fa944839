//! Domain models for the Fire Department Administration Platform

mod inventory;
mod training;
mod user;

pub use inventory::*;
pub use training::*;
pub use user::*;
