// Domain modules
pub mod admin;
pub mod auth;
pub mod ledger;
pub mod orders;
pub mod reservation;
