// Admin handlers module
// 관리자 핸들러 모듈

pub mod admin_handler;

pub use admin_handler::*;
