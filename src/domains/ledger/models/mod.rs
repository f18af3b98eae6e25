// Ledger domain models
pub mod ledger_entry;

pub use ledger_entry::*;
