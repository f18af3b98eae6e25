// Orders domain models
pub mod catalog;
pub mod checkout;
pub mod order;

pub use catalog::*;
pub use checkout::*;
pub use order::*;
