// Admin domain module (back-office operations)
pub mod handlers;
pub mod routes;
pub mod services;

pub use services::*;
