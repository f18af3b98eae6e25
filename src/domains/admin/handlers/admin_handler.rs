use crate::domains::ledger::models::{
    BalanceAdjustmentRequest, BalanceChangeResponse, TransactionFilter, TransactionsResponse,
};
use crate::domains::orders::models::{
    CancelOrderRequest, OrderDetails, OrderStats, RefundRequest, RefundResult,
};
use crate::domains::reservation::models::{
    ReleaseResponse, ReservationFilter, ReservationListResponse,
};
use crate::shared::errors::FulfillmentError;
use crate::shared::middleware::auth::AdminUser;
use crate::shared::services::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

// =====================================================
// Admin Handler
// =====================================================
// 역할: 관리자 전용 HTTP API 엔드포인트
//
// 모든 핸들러는 AdminUser extractor 로 role = admin 토큰만 통과시킨다.
// 토큰이 없거나 잘못되면 401, 관리자가 아니면 403.
// =====================================================

/// 거래 내역 조회 핸들러
/// List ledger transactions handler
#[utoipa::path(
    get,
    path = "/api/admin/transactions",
    params(TransactionFilter),
    responses(
        (status = 200, description = "Transactions retrieved successfully", body = TransactionsResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin privileges required")
    ),
    tag = "Admin",
    security(
        ("BearerAuth" = [])
    )
)]
pub async fn get_transactions(
    State(app_state): State<AppState>,
    _admin: AdminUser,
    Query(filter): Query<TransactionFilter>,
) -> Result<Json<TransactionsResponse>, (StatusCode, Json<serde_json::Value>)> {
    let transactions = app_state
        .admin_state
        .admin_service
        .transactions(&filter)
        .await
        .map_err(|e: FulfillmentError| -> (StatusCode, Json<serde_json::Value>) { e.into() })?;

    Ok(Json(TransactionsResponse { transactions }))
}

/// 주문 환불 핸들러
/// Refund order handler
///
/// COMPLETED 주문만 환불 가능합니다. amount 를 생략하면 남은 금액 전체를 환불합니다.
/// 지급된 키는 회수하지 않습니다.
#[utoipa::path(
    post,
    path = "/api/admin/orders/{id}/refund",
    params(
        ("id" = Uuid, Path, description = "Order ID")
    ),
    request_body = RefundRequest,
    responses(
        (status = 200, description = "Refund recorded", body = RefundResult),
        (status = 400, description = "Invalid amount"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin privileges required"),
        (status = 404, description = "Order not found"),
        (status = 409, description = "Order is not completed"),
        (status = 422, description = "Refund exceeds the refundable amount")
    ),
    tag = "Admin",
    security(
        ("BearerAuth" = [])
    )
)]
pub async fn refund_order(
    State(app_state): State<AppState>,
    admin: AdminUser,
    Path(order_id): Path<Uuid>,
    Json(request): Json<RefundRequest>,
) -> Result<Json<RefundResult>, (StatusCode, Json<serde_json::Value>)> {
    tracing::info!(admin_id = admin.user_id, %order_id, "admin refund requested");

    let result = app_state
        .admin_state
        .admin_service
        .refund(order_id, request)
        .await
        .map_err(|e: FulfillmentError| -> (StatusCode, Json<serde_json::Value>) { e.into() })?;

    Ok(Json(result))
}

/// 주문 취소 핸들러 (관리자)
/// Admin cancel order handler
///
/// 결제 도중 멈춘 PROCESSING 주문도 이 경로로 정리합니다.
#[utoipa::path(
    post,
    path = "/api/admin/orders/{id}/cancel",
    params(
        ("id" = Uuid, Path, description = "Order ID")
    ),
    request_body = CancelOrderRequest,
    responses(
        (status = 200, description = "Order cancelled", body = OrderDetails),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin privileges required"),
        (status = 404, description = "Order not found"),
        (status = 409, description = "Order already completed")
    ),
    tag = "Admin",
    security(
        ("BearerAuth" = [])
    )
)]
pub async fn cancel_order(
    State(app_state): State<AppState>,
    admin: AdminUser,
    Path(order_id): Path<Uuid>,
    body: Option<Json<CancelOrderRequest>>,
) -> Result<Json<OrderDetails>, (StatusCode, Json<serde_json::Value>)> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let reason = request.reason.as_deref().unwrap_or("cancelled by admin");
    tracing::info!(admin_id = admin.user_id, %order_id, reason, "admin cancel requested");

    let order = app_state
        .admin_state
        .admin_service
        .cancel_order(order_id, reason)
        .await
        .map_err(|e: FulfillmentError| -> (StatusCode, Json<serde_json::Value>) { e.into() })?;

    Ok(Json(order))
}

/// 잔고 조정 핸들러
/// Balance adjustment handler
#[utoipa::path(
    post,
    path = "/api/admin/users/{id}/balance-adjustment",
    params(
        ("id" = u64, Path, description = "User ID")
    ),
    request_body = BalanceAdjustmentRequest,
    responses(
        (status = 200, description = "Balance adjusted", body = BalanceChangeResponse),
        (status = 400, description = "Invalid amount or missing reason"),
        (status = 401, description = "Unauthorized"),
        (status = 402, description = "Withdrawal exceeds the balance"),
        (status = 403, description = "Admin privileges required"),
        (status = 404, description = "User not found")
    ),
    tag = "Admin",
    security(
        ("BearerAuth" = [])
    )
)]
pub async fn adjust_balance(
    State(app_state): State<AppState>,
    admin: AdminUser,
    Path(user_id): Path<u64>,
    Json(request): Json<BalanceAdjustmentRequest>,
) -> Result<Json<BalanceChangeResponse>, (StatusCode, Json<serde_json::Value>)> {
    tracing::info!(admin_id = admin.user_id, user_id, "admin balance adjustment requested");

    let response = app_state
        .admin_state
        .admin_service
        .adjust_balance(user_id, request)
        .await
        .map_err(|e: FulfillmentError| -> (StatusCode, Json<serde_json::Value>) { e.into() })?;

    Ok(Json(response))
}

/// 예약 목록 핸들러
/// List reservations handler
#[utoipa::path(
    get,
    path = "/api/admin/reservations",
    params(ReservationFilter),
    responses(
        (status = 200, description = "Reservations retrieved successfully", body = ReservationListResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin privileges required")
    ),
    tag = "Admin",
    security(
        ("BearerAuth" = [])
    )
)]
pub async fn get_reservations(
    State(app_state): State<AppState>,
    _admin: AdminUser,
    Query(filter): Query<ReservationFilter>,
) -> Result<Json<ReservationListResponse>, (StatusCode, Json<serde_json::Value>)> {
    let reservations = app_state
        .admin_state
        .admin_service
        .reservations(&filter)
        .await
        .map_err(|e: FulfillmentError| -> (StatusCode, Json<serde_json::Value>) { e.into() })?;

    Ok(Json(ReservationListResponse { reservations }))
}

/// 예약 해제 핸들러
/// Cancel reservation handler
///
/// 이미 최종 상태인 예약은 ALREADY_TERMINAL 로 응답합니다.
#[utoipa::path(
    post,
    path = "/api/admin/reservations/{id}/cancel",
    params(
        ("id" = Uuid, Path, description = "Reservation ID")
    ),
    responses(
        (status = 200, description = "Reservation released", body = ReleaseResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin privileges required"),
        (status = 404, description = "Reservation not found")
    ),
    tag = "Admin",
    security(
        ("BearerAuth" = [])
    )
)]
pub async fn cancel_reservation(
    State(app_state): State<AppState>,
    admin: AdminUser,
    Path(reservation_id): Path<Uuid>,
) -> Result<Json<ReleaseResponse>, (StatusCode, Json<serde_json::Value>)> {
    tracing::info!(admin_id = admin.user_id, %reservation_id, "admin reservation release requested");

    let response = app_state
        .admin_state
        .admin_service
        .cancel_reservation(reservation_id)
        .await
        .map_err(|e: FulfillmentError| -> (StatusCode, Json<serde_json::Value>) { e.into() })?;

    Ok(Json(response))
}

/// 통계 요약 핸들러
/// Statistics summary handler
#[utoipa::path(
    get,
    path = "/api/admin/stats",
    responses(
        (status = 200, description = "Statistics summary", body = OrderStats),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin privileges required")
    ),
    tag = "Admin",
    security(
        ("BearerAuth" = [])
    )
)]
pub async fn get_stats(
    State(app_state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<OrderStats>, (StatusCode, Json<serde_json::Value>)> {
    let stats = app_state
        .admin_state
        .admin_service
        .stats()
        .await
        .map_err(|e: FulfillmentError| -> (StatusCode, Json<serde_json::Value>) { e.into() })?;

    Ok(Json(stats))
}
