use crate::domains::ledger::models::{
    BalanceChangeResponse, BalanceResponse, LedgerHistoryResponse, TopUpRequest,
};
use crate::shared::errors::FulfillmentError;
use crate::shared::middleware::auth::AuthenticatedUser;
use crate::shared::services::AppState;
use axum::{extract::State, http::StatusCode, Json};

/// 잔고 조회 핸들러
/// Get balance handler
#[utoipa::path(
    get,
    path = "/api/balance",
    responses(
        (status = 200, description = "Balance retrieved successfully", body = BalanceResponse),
        (status = 401, description = "Unauthorized (authentication required)"),
        (status = 404, description = "User not found")
    ),
    tag = "Balance",
    security(
        ("BearerAuth" = [])
    )
)]
pub async fn get_balance(
    State(app_state): State<AppState>,
    AuthenticatedUser { user_id, .. }: AuthenticatedUser,
) -> Result<Json<BalanceResponse>, (StatusCode, Json<serde_json::Value>)> {
    let balance = app_state
        .ledger_state
        .balance_service
        .get_balance(user_id)
        .await
        .map_err(|e: FulfillmentError| -> (StatusCode, Json<serde_json::Value>) { e.into() })?;

    Ok(Json(balance))
}

/// 원장 내역 조회 핸들러 (최신순)
/// Get ledger history handler
#[utoipa::path(
    get,
    path = "/api/balance/history",
    responses(
        (status = 200, description = "History retrieved successfully", body = LedgerHistoryResponse),
        (status = 401, description = "Unauthorized (authentication required)")
    ),
    tag = "Balance",
    security(
        ("BearerAuth" = [])
    )
)]
pub async fn get_history(
    State(app_state): State<AppState>,
    AuthenticatedUser { user_id, .. }: AuthenticatedUser,
) -> Result<Json<LedgerHistoryResponse>, (StatusCode, Json<serde_json::Value>)> {
    let entries = app_state
        .ledger_state
        .balance_service
        .get_history(user_id)
        .await
        .map_err(|e: FulfillmentError| -> (StatusCode, Json<serde_json::Value>) { e.into() })?;

    Ok(Json(LedgerHistoryResponse { entries }))
}

/// 잔고 충전 핸들러
/// Top-up handler
///
/// 카드 결제는 이 서버 앞단에서 끝난 상태라고 가정합니다.
#[utoipa::path(
    post,
    path = "/api/balance/top-up",
    request_body = TopUpRequest,
    responses(
        (status = 200, description = "Balance topped up", body = BalanceChangeResponse),
        (status = 400, description = "Invalid amount"),
        (status = 401, description = "Unauthorized (authentication required)"),
        (status = 404, description = "User not found")
    ),
    tag = "Balance",
    security(
        ("BearerAuth" = [])
    )
)]
pub async fn top_up(
    State(app_state): State<AppState>,
    AuthenticatedUser { user_id, .. }: AuthenticatedUser,
    Json(request): Json<TopUpRequest>,
) -> Result<Json<BalanceChangeResponse>, (StatusCode, Json<serde_json::Value>)> {
    let response = app_state
        .ledger_state
        .balance_service
        .top_up(user_id, request.amount)
        .await
        .map_err(|e: FulfillmentError| -> (StatusCode, Json<serde_json::Value>) { e.into() })?;

    Ok(Json(response))
}
