//! 게임 키 스토어 결제/주문 처리 서버
//! Payment and fulfillment engine for a game-key storefront
//!
//! - `domains::ledger` - 잔고 원장 (append-only)
//! - `domains::reservation` - 공급사 재고 예약 게이트웨이
//! - `domains::orders` - 결제 오케스트레이터, 보상, 환불
//! - `domains::admin` - 관리자 기능
//! - `shared` - 저장소, 캐시, 공급사 클라이언트, 설정, 로깅

pub mod domains;
pub mod routes;
pub mod shared;
