// Auth domain services
pub mod jwt_service;

pub use jwt_service::*;
