use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domains::ledger::models::LedgerEntryStatus;
use crate::domains::orders::models::{CatalogGame, PromoCode};

// =====================================================
// Checkout 요청/응답 모델
// =====================================================

/// 장바구니 라인
/// Cart line
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub game_id: Uuid,

    #[schema(example = 1)]
    pub quantity: u32,

    /// 클라이언트가 화면에서 본 단가 (있으면 현재 가격과 비교)
    /// Unit price the client displayed, checked against the current price
    #[schema(value_type = Option<String>, example = "19.99")]
    pub expected_price: Option<Decimal>,
}

/// 결제 요청
/// Checkout request
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub items: Vec<CartItem>,

    #[schema(example = "SPRING10")]
    pub promo_code: Option<String>,
}

/// 검증된 라인 (권위 있는 가격 기준)
#[derive(Debug, Clone)]
pub struct QuotedLine {
    pub game: CatalogGame,
    pub quantity: u32,
    pub unit_price: Decimal,
}

impl QuotedLine {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// 검증 결과: 결제할 금액 확정
/// Validated cart with the amount to charge
#[derive(Debug, Clone)]
pub struct Quote {
    pub lines: Vec<QuotedLine>,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
    pub promo: Option<PromoCode>,
}

/// 주문 취소 요청
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct CancelOrderRequest {
    pub reason: Option<String>,
}

/// 관리자 환불 요청 (amount 생략 시 남은 환불 가능 금액 전체)
/// Admin refund request
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RefundRequest {
    #[schema(value_type = Option<String>, example = "5.00")]
    pub amount: Option<Decimal>,
    pub reason: String,
}

/// 환불 결과
/// Refund result
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefundResult {
    pub transaction_id: Uuid,
    pub order_id: Uuid,
    #[schema(value_type = String)]
    pub amount: Decimal,
    pub status: LedgerEntryStatus,
    #[schema(value_type = String)]
    pub balance_before: Decimal,
    #[schema(value_type = String)]
    pub balance_after: Decimal,
    /// 이 환불 후 주문의 누적 환불 금액
    #[schema(value_type = String)]
    pub refunded_total: Decimal,
}
