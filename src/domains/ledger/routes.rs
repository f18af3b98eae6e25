// Ledger domain routes
// 원장 도메인 라우터
use axum::{routing::{get, post}, Router};
use crate::domains::ledger::handlers::balance_handler;
use crate::shared::services::AppState;

/// Create balance router
/// 잔고 라우터 생성 (모두 인증 필요)
pub fn create_balance_router() -> Router<AppState> {
    Router::new()
        .route("/", get(balance_handler::get_balance))
        .route("/history", get(balance_handler::get_history))
        .route("/top-up", post(balance_handler::top_up))
}
