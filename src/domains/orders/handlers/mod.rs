// Orders handlers module
// 주문 핸들러 모듈

pub mod order_handler;

pub use order_handler::*;
