// Orders domain services
pub mod compensation;
pub mod fulfillment_service;
pub mod pricing;
pub mod refund_service;
pub mod state;

pub use fulfillment_service::*;
pub use pricing::*;
pub use refund_service::*;
pub use state::*;
