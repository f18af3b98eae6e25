use axum::{
    routing::{get, post},
    Router,
};
use crate::shared::services::AppState;

use super::handlers;

/// 관리자 라우터 생성
/// Create admin router
///
/// # Routes
/// - `GET  /api/admin/transactions` - 거래 내역 (필터)
/// - `POST /api/admin/orders/:id/refund` - 환불
/// - `POST /api/admin/orders/:id/cancel` - 주문 취소
/// - `POST /api/admin/users/:id/balance-adjustment` - 잔고 조정
/// - `GET  /api/admin/reservations` - 예약 목록
/// - `POST /api/admin/reservations/:id/cancel` - 예약 해제
/// - `GET  /api/admin/stats` - 통계 요약
pub fn create_admin_router() -> Router<AppState> {
    Router::new()
        // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
        // Ledger
        // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
        .route("/transactions", get(handlers::get_transactions))
        .route("/users/:id/balance-adjustment", post(handlers::adjust_balance))

        // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
        // Orders
        // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
        .route("/orders/:id/refund", post(handlers::refund_order))
        .route("/orders/:id/cancel", post(handlers::cancel_order))

        // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
        // Reservations
        // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
        .route("/reservations", get(handlers::get_reservations))
        .route("/reservations/:id/cancel", post(handlers::cancel_reservation))

        .route("/stats", get(handlers::get_stats))
}
