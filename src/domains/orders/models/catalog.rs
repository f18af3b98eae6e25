use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domains::orders::models::KeySource;
use crate::shared::utils::money::apply_percent_discount;

// =====================================================
// 카탈로그 (읽기 전용)
// =====================================================
// 게임 가격/재고/키 출처는 카탈로그가 소유한다.
// 결제 엔진은 결제 시점에 항상 여기서 가격을 다시 읽는다.
// =====================================================

/// 결제에 필요한 게임 정보
/// Authoritative catalog view of a game
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogGame {
    pub id: Uuid,
    pub title: String,
    /// 정가
    pub price: Decimal,
    /// 저장된 상시 할인율 (0 이상 100 미만)
    pub discount_percent: Decimal,
    pub currency: String,
    pub active: bool,
    pub key_source: KeySource,
    /// 공급사 상품 ID (key_source = Supplier 인 경우)
    pub supplier_product_id: Option<String>,
    /// 카탈로그 동기화 시점의 공급사 재고
    pub supplier_stock: i64,
}

impl CatalogGame {
    /// 실제 판매 단가 (상시 할인 적용)
    pub fn unit_price(&self) -> Decimal {
        apply_percent_discount(self.price, self.discount_percent)
    }
}

/// 프로모션 코드
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromoCode {
    pub code: String,
    pub discount_percent: Decimal,
    pub active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub max_uses: Option<i64>,
    pub used_count: i64,
}

impl PromoCode {
    /// 지금 사용할 수 있는 코드인지
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.active
            && self.expires_at.is_none_or(|at| at > now)
            && self.max_uses.is_none_or(|max| self.used_count < max)
            && self.discount_percent > Decimal::ZERO
            && self.discount_percent < Decimal::ONE_HUNDRED
    }
}
