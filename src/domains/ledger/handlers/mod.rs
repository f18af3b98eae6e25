// Ledger handlers module
// 원장 핸들러 모듈

pub mod balance_handler;

pub use balance_handler::*;
