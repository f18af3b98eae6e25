// Orders domain module (checkout, fulfillment, refunds)
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;

pub use models::*;
pub use services::*;
