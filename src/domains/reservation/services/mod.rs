// Reservation domain services
pub mod gateway;
pub mod sweeper;

pub use gateway::*;
pub use sweeper::*;
