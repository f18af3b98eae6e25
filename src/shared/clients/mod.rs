// External API clients
pub mod supplier;

pub use supplier::*;
