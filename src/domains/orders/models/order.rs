use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

// =====================================================
// Order 모델
// =====================================================
// 역할: 장바구니 스냅샷 + 원장 debit + 예약(reservation)을 하나로 묶는 주문
//
// 주문 상태:
// - pending: 생성됨, 아직 결제(debit) 전
// - processing: debit 완료, 예약/확정 진행 중
// - completed: 키 지급 완료 (최종)
// - cancelled: 취소됨, debit 이 있었다면 상쇄 credit 존재 (최종)
//
// 상태 전이:
// pending -> processing -> completed | cancelled
// pending -> cancelled (debit 이 없었던 경우)
// =====================================================

/// 주문 상태
/// Order status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Processing,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// 최종 상태 여부 (더 이상 전이 불가)
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(OrderStatus::Pending),
            "processing" => Ok(OrderStatus::Processing),
            "completed" => Ok(OrderStatus::Completed),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(format!("unknown order status: {}", other)),
        }
    }
}

/// 키 출처
/// Where an assigned key came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KeySource {
    /// 자체 보유 키 풀 (game_keys)
    Local,
    /// 외부 공급사 (G2A)
    Supplier,
}

impl KeySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeySource::Local => "local",
            KeySource::Supplier => "supplier",
        }
    }
}

impl FromStr for KeySource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(KeySource::Local),
            "supplier" => Ok(KeySource::Supplier),
            other => Err(format!("unknown key source: {}", other)),
        }
    }
}

/// 주문 정보 (데이터베이스에서 조회한 주문)
/// Order as persisted
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,

    pub user_id: u64,

    pub status: OrderStatus,

    /// 실제 결제 금액 (할인 적용 후)
    /// Amount actually debited
    #[schema(value_type = String, example = "35.98")]
    pub total: Decimal,

    /// 프로모션 할인 금액
    #[schema(value_type = String, example = "4.00")]
    pub discount: Decimal,

    #[schema(example = "EUR")]
    pub currency: String,

    pub promo_code: Option<String>,

    /// 누적 환불 금액 (부분 환불 포함, total 을 넘지 않음)
    #[schema(value_type = String, example = "0.00")]
    pub refunded_amount: Decimal,

    pub cancel_reason: Option<String>,

    pub created_at: DateTime<Utc>,

    /// 상태가 바뀔 때마다 갱신
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// 아직 환불 가능한 금액
    pub fn refundable(&self) -> Decimal {
        (self.total - self.refunded_amount).max(Decimal::ZERO)
    }
}

/// 주문 라인 (구매 시점 단가)
/// Order line with the unit price charged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub game_id: Uuid,
    pub quantity: u32,
    #[schema(value_type = String, example = "19.99")]
    pub price: Decimal,
}

/// 사용자에게 지급된 키
/// Key assigned to a sold unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssignedKey {
    pub game_id: Uuid,
    #[schema(example = "AAAAA-BBBBB-CCCCC")]
    pub key: String,
    pub source: KeySource,
}

/// 주문 상세 (라인 + 지급된 키)
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetails {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub keys: Vec<AssignedKey>,
}

/// 주문 생성 시 사용하는 내부 모델
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: u64,
    pub total: Decimal,
    pub discount: Decimal,
    pub currency: String,
    pub promo_code: Option<String>,
}

impl NewOrder {
    /// PENDING 상태의 Order 생성 (in-memory store / 테스트용)
    pub fn into_order(self) -> Order {
        let now = Utc::now();
        Order {
            id: Uuid::new_v4(),
            user_id: self.user_id,
            status: OrderStatus::Pending,
            total: self.total,
            discount: self.discount,
            currency: self.currency,
            promo_code: self.promo_code,
            refunded_amount: Decimal::ZERO,
            cancel_reason: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// 관리자 통계 요약
/// Admin statistics summary
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderStats {
    pub pending_orders: i64,
    pub processing_orders: i64,
    pub completed_orders: i64,
    pub cancelled_orders: i64,
    /// 완료 주문 매출 합계 (환불 차감 전)
    #[schema(value_type = String)]
    pub completed_revenue: Decimal,
    #[schema(value_type = String)]
    pub refunded_total: Decimal,
    pub held_reservations: i64,
}

/// 주문 목록 응답
#[derive(Debug, Serialize, ToSchema)]
pub struct OrderListResponse {
    pub orders: Vec<Order>,
}
