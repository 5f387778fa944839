//! Business logic services for the Fire Department Administration Platform

pub mod attendance;
pub mod auth;
pub mod certificate;
pub mod inventory;
pub mod inventory_log;
pub mod reorder;
pub mod role;
pub mod token;
pub mod training;
pub mod user;
pub mod vehicle;
pub mod vehicle_items;

pub use attendance::AttendanceService;
pub use auth::AuthService;
pub use certificate::CertificateService;
pub use inventory::InventoryService;
pub use inventory_log::InventoryLogService;
pub use reorder::ReorderService;
pub use role::RoleService;
pub use token::TokenService;
pub use training::TrainingService;
pub use user::UserService;
pub use vehicle::VehicleService;
pub use vehicle_items::VehicleItemService;
