use axum::{
    routing::{get, post},
    Router,
};
use crate::shared::services::AppState;

use super::handlers;

/// 주문 라우터 생성
/// Create orders router
///
/// # Routes
/// - `POST /api/checkout` - 결제
/// - `GET  /api/orders` - 내 주문 목록
/// - `GET  /api/orders/:id` - 주문 상세 (키 포함)
/// - `POST /api/orders/:id/cancel` - 주문 취소
pub fn create_orders_router() -> Router<AppState> {
    Router::new()
        .route("/checkout", post(handlers::checkout))
        .route("/orders", get(handlers::get_my_orders))
        .route("/orders/:id", get(handlers::get_order))
        .route("/orders/:id/cancel", post(handlers::cancel_order))
}
