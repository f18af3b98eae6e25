// Shared module
pub mod cache;
pub mod clients;
pub mod config;
pub mod database;
pub mod errors;
pub mod logging;
pub mod middleware;
pub mod services;
pub mod utils;
