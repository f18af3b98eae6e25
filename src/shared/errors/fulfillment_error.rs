use axum::{http::StatusCode, Json};
use rust_decimal::Decimal;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::shared::errors::StoreError;
use crate::shared::utils::retry::Transient;

/// 결제/주문 처리 에러
/// Payment and fulfillment errors
///
/// 클라이언트가 어떤 조치를 해야 하는지(잔고 충전, 장바구니에서 제거, 재시도)
/// 구분할 수 있도록 종류별로 분리한다. 일반적인 실패로 뭉개지 않는다.
#[derive(Error, Debug)]
pub enum FulfillmentError {
    /// 잔고 부족
    /// Insufficient balance
    #[error("Insufficient balance: available {balance}, required {required}")]
    InsufficientFunds { balance: Decimal, required: Decimal },

    /// 재고 없음
    /// Out of stock
    #[error("Game {game_id} is out of stock")]
    OutOfStock { game_id: Uuid },

    /// 가격 변경됨 (클라이언트 가격과 현재 가격 불일치)
    /// Price changed since the cart was built
    #[error("Price changed for game {game_id}: expected {expected}, current {current}")]
    PriceMismatch {
        game_id: Uuid,
        expected: Decimal,
        current: Decimal,
    },

    /// 공급사 일시 장애 (재시도 가능)
    /// Key supplier temporarily unavailable
    #[error("Key supplier temporarily unavailable: {0}")]
    SupplierUnavailable(String),

    /// 공급사 홀드 만료
    /// Supplier hold expired
    #[error("Reservation {reservation_id} expired")]
    ReservationExpired { reservation_id: Uuid },

    #[error("Game not found: {game_id}")]
    GameNotFound { game_id: Uuid },

    /// 저장소 충돌 (재시도 가능)
    #[error("Storage conflict, please retry: {0}")]
    StorageConflict(String),

    #[error("Invalid cart: {0}")]
    InvalidCart(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid promo code: {code}")]
    InvalidPromoCode { code: String },

    #[error("Order not found: {order_id}")]
    OrderNotFound { order_id: Uuid },

    /// 현재 주문 상태에서 허용되지 않는 작업
    #[error("Order {order_id} is {status}, cannot {action}")]
    InvalidOrderState {
        order_id: Uuid,
        status: String,
        action: &'static str,
    },

    #[error("Refund of {requested} exceeds refundable amount {refundable}")]
    RefundExceedsTotal {
        requested: Decimal,
        refundable: Decimal,
    },

    #[error("Reservation not found: {reservation_id}")]
    ReservationNotFound { reservation_id: Uuid },

    #[error("User not found: id={user_id}")]
    UserNotFound { user_id: u64 },

    /// 복구 불가능한 저장소 에러
    #[error("Storage error: {0}")]
    Storage(String),
}

impl FulfillmentError {
    /// 기계가 읽을 수 있는 에러 코드 (프론트엔드 분기용)
    pub fn code(&self) -> &'static str {
        match self {
            FulfillmentError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            FulfillmentError::OutOfStock { .. } => "OUT_OF_STOCK",
            FulfillmentError::PriceMismatch { .. } => "PRICE_MISMATCH",
            FulfillmentError::SupplierUnavailable(_) => "SUPPLIER_UNAVAILABLE",
            FulfillmentError::ReservationExpired { .. } => "RESERVATION_EXPIRED",
            FulfillmentError::GameNotFound { .. } => "GAME_NOT_FOUND",
            FulfillmentError::StorageConflict(_) => "STORAGE_CONFLICT",
            FulfillmentError::InvalidCart(_) => "INVALID_CART",
            FulfillmentError::InvalidAmount(_) => "INVALID_AMOUNT",
            FulfillmentError::InvalidPromoCode { .. } => "INVALID_PROMO_CODE",
            FulfillmentError::OrderNotFound { .. } => "ORDER_NOT_FOUND",
            FulfillmentError::InvalidOrderState { .. } => "INVALID_ORDER_STATE",
            FulfillmentError::RefundExceedsTotal { .. } => "REFUND_EXCEEDS_TOTAL",
            FulfillmentError::ReservationNotFound { .. } => "RESERVATION_NOT_FOUND",
            FulfillmentError::UserNotFound { .. } => "USER_NOT_FOUND",
            FulfillmentError::Storage(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            FulfillmentError::InsufficientFunds { .. } => StatusCode::PAYMENT_REQUIRED,
            FulfillmentError::OutOfStock { .. }
            | FulfillmentError::PriceMismatch { .. }
            | FulfillmentError::InvalidOrderState { .. } => StatusCode::CONFLICT,
            FulfillmentError::SupplierUnavailable(_) | FulfillmentError::StorageConflict(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            FulfillmentError::ReservationExpired { .. } => StatusCode::GONE,
            FulfillmentError::GameNotFound { .. }
            | FulfillmentError::OrderNotFound { .. }
            | FulfillmentError::ReservationNotFound { .. }
            | FulfillmentError::UserNotFound { .. } => StatusCode::NOT_FOUND,
            FulfillmentError::InvalidCart(_)
            | FulfillmentError::InvalidAmount(_)
            | FulfillmentError::InvalidPromoCode { .. } => StatusCode::BAD_REQUEST,
            FulfillmentError::RefundExceedsTotal { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            FulfillmentError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl Transient for FulfillmentError {
    fn is_transient(&self) -> bool {
        matches!(
            self,
            FulfillmentError::SupplierUnavailable(_) | FulfillmentError::StorageConflict(_)
        )
    }
}

impl From<StoreError> for FulfillmentError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(msg) | StoreError::Unavailable(msg) => {
                FulfillmentError::StorageConflict(msg)
            }
            StoreError::NotFound(what) => FulfillmentError::Storage(format!("not found: {}", what)),
            StoreError::Database(msg) => FulfillmentError::Storage(msg),
        }
    }
}

/// FulfillmentError를 HTTP 응답으로 변환
impl From<FulfillmentError> for (StatusCode, Json<serde_json::Value>) {
    fn from(err: FulfillmentError) -> Self {
        let status = err.status_code();
        if status.is_server_error() {
            tracing::error!(code = err.code(), error = %err, "request failed");
        }
        (
            status,
            Json(json!({
                "error": err.to_string(),
                "code": err.code(),
            })),
        )
    }
}
