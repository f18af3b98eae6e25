// Ledger domain services
pub mod balance_service;
pub mod ledger_service;
pub mod state;

pub use balance_service::*;
pub use ledger_service::*;
pub use state::*;
