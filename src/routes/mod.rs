// Routes module: 라우팅 설정
// 역할: 모든 도메인의 라우터를 조합
// Routes module: combines all domain routers

use axum::Router;
use crate::shared::services::AppState;

// 각 도메인의 routes import
use crate::domains::admin::routes::create_admin_router;
use crate::domains::ledger::routes::create_balance_router;
use crate::domains::orders::routes::create_orders_router;

/// Create main router (combines all domain routers)
/// 메인 라우터 생성 (모든 도메인 라우터 조합)
pub fn create_router() -> Router<AppState> {
    Router::new()
        .nest("/api", create_orders_router())
        .nest("/api/balance", create_balance_router())
        .nest("/api/admin", create_admin_router())
}
