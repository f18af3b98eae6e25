// Reservation domain models
pub mod reservation;

pub use reservation::*;
