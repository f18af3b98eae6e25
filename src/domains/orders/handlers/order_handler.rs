use crate::domains::orders::models::{
    CancelOrderRequest, CheckoutRequest, OrderDetails, OrderListResponse,
};
use crate::shared::errors::FulfillmentError;
use crate::shared::middleware::auth::AuthenticatedUser;
use crate::shared::services::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

// =====================================================
// Order Handler
// =====================================================
// 역할: 결제/주문 관련 HTTP API 엔드포인트
//
// 처리 흐름:
// HTTP Request → Handler → FulfillmentService → Ledger/Gateway/Store → Response
// =====================================================

/// 결제 핸들러
/// Checkout handler
///
/// 장바구니를 결제하고 키를 지급합니다.
///
/// # Authentication
/// JWT 토큰 필요 (Bearer token)
///
/// # Response
/// - 201: 주문 완료 (키 포함)
/// - 400: 잘못된 장바구니 / 프로모션 코드
/// - 402: 잔고 부족
/// - 404: 없는 게임
/// - 409: 재고 없음 / 가격 변경
/// - 410: 공급사 홀드 만료
/// - 503: 공급사 또는 저장소 일시 장애 (재시도 가능)
#[utoipa::path(
    post,
    path = "/api/checkout",
    request_body = CheckoutRequest,
    responses(
        (status = 201, description = "Order completed, keys delivered", body = OrderDetails),
        (status = 400, description = "Invalid cart or promo code"),
        (status = 401, description = "Unauthorized (authentication required)"),
        (status = 402, description = "Insufficient balance"),
        (status = 404, description = "Game not found"),
        (status = 409, description = "Out of stock or price changed"),
        (status = 410, description = "Supplier hold expired"),
        (status = 503, description = "Supplier or storage temporarily unavailable")
    ),
    tag = "Orders",
    security(
        ("BearerAuth" = [])
    )
)]
pub async fn checkout(
    State(app_state): State<AppState>,
    AuthenticatedUser { user_id, .. }: AuthenticatedUser,
    Json(request): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<OrderDetails>), (StatusCode, Json<serde_json::Value>)> {
    let order = app_state
        .orders_state
        .fulfillment_service
        .checkout(user_id, request)
        .await
        .map_err(|e: FulfillmentError| -> (StatusCode, Json<serde_json::Value>) { e.into() })?;

    Ok((StatusCode::CREATED, Json(order)))
}

/// 내 주문 목록 핸들러
/// List my orders handler
#[utoipa::path(
    get,
    path = "/api/orders",
    responses(
        (status = 200, description = "Orders retrieved successfully", body = OrderListResponse),
        (status = 401, description = "Unauthorized (authentication required)"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Orders",
    security(
        ("BearerAuth" = [])
    )
)]
pub async fn get_my_orders(
    State(app_state): State<AppState>,
    AuthenticatedUser { user_id, .. }: AuthenticatedUser,
) -> Result<Json<OrderListResponse>, (StatusCode, Json<serde_json::Value>)> {
    let orders = app_state
        .orders_state
        .fulfillment_service
        .list_orders(user_id)
        .await
        .map_err(|e: FulfillmentError| -> (StatusCode, Json<serde_json::Value>) { e.into() })?;

    Ok(Json(OrderListResponse { orders }))
}

/// 주문 상세 조회 핸들러
/// Get order details handler
///
/// 본인 주문만 조회 가능합니다. 다른 사용자의 주문은 404 로 응답합니다.
#[utoipa::path(
    get,
    path = "/api/orders/{id}",
    params(
        ("id" = Uuid, Path, description = "Order ID")
    ),
    responses(
        (status = 200, description = "Order retrieved successfully", body = OrderDetails),
        (status = 401, description = "Unauthorized (authentication required)"),
        (status = 404, description = "Order not found")
    ),
    tag = "Orders",
    security(
        ("BearerAuth" = [])
    )
)]
pub async fn get_order(
    State(app_state): State<AppState>,
    AuthenticatedUser { user_id, .. }: AuthenticatedUser,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OrderDetails>, (StatusCode, Json<serde_json::Value>)> {
    let order = app_state
        .orders_state
        .fulfillment_service
        .get_order(user_id, order_id)
        .await
        .map_err(|e: FulfillmentError| -> (StatusCode, Json<serde_json::Value>) { e.into() })?;

    Ok(Json(order))
}

/// 주문 취소 핸들러
/// Cancel order handler
///
/// 아직 완료되지 않은 (PENDING/PROCESSING) 본인 주문을 취소합니다.
/// 차감된 금액은 자동으로 되돌려집니다. 이미 취소된 주문은 현재 상태를 그대로 돌려줍니다.
#[utoipa::path(
    post,
    path = "/api/orders/{id}/cancel",
    params(
        ("id" = Uuid, Path, description = "Order ID")
    ),
    request_body = CancelOrderRequest,
    responses(
        (status = 200, description = "Order cancelled", body = OrderDetails),
        (status = 401, description = "Unauthorized (authentication required)"),
        (status = 404, description = "Order not found"),
        (status = 409, description = "Order already completed")
    ),
    tag = "Orders",
    security(
        ("BearerAuth" = [])
    )
)]
pub async fn cancel_order(
    State(app_state): State<AppState>,
    AuthenticatedUser { user_id, .. }: AuthenticatedUser,
    Path(order_id): Path<Uuid>,
    body: Option<Json<CancelOrderRequest>>,
) -> Result<Json<OrderDetails>, (StatusCode, Json<serde_json::Value>)> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let reason = request.reason.as_deref().unwrap_or("cancelled by user");

    let order = app_state
        .orders_state
        .fulfillment_service
        .cancel_order(order_id, reason, Some(user_id))
        .await
        .map_err(|e: FulfillmentError| -> (StatusCode, Json<serde_json::Value>) { e.into() })?;

    Ok(Json(order))
}
