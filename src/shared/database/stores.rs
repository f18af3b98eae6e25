use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domains::ledger::models::{
    DebitOutcome, LedgerEntry, NewLedgerEntry, ReverseOutcome, TransactionFilter,
};
use crate::domains::orders::models::{
    AssignedKey, CatalogGame, NewOrder, Order, OrderDetails, OrderItem, OrderStats, OrderStatus,
    PromoCode,
};
use crate::domains::reservation::models::{Reservation, ReservationFilter, ReservationStatus};
use crate::shared::errors::StoreError;

// =====================================================
// 저장소 추상화
// =====================================================
// 서비스 계층은 이 trait 들에만 의존한다.
// - PostgreSQL 구현: shared/database/repositories/billing
// - In-memory 구현: shared/database/memory.rs (테스트용)
//
// 잔고와 로컬 키 풀은 오직 단일 조건부 UPDATE 로만 변경한다.
// (read-modify-write 금지)
// =====================================================

/// 원장 저장소
/// Ledger storage
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// 조건부 차감 (잔고 >= amount 일 때만) + COMPLETED entry 기록을 하나의 트랜잭션으로.
    /// 잔고 부족이면 FAILED entry 를 감사용으로 남기고 `InsufficientFunds` 반환.
    /// 사용자가 없으면 `StoreError::NotFound`.
    async fn debit(&self, entry: NewLedgerEntry) -> Result<DebitOutcome, StoreError>;

    /// 무조건 증가 + COMPLETED entry 기록
    async fn credit(&self, entry: NewLedgerEntry) -> Result<LedgerEntry, StoreError>;

    /// `original` 을 상쇄하는 REFUND credit. 한 entry 는 최대 한 번만 상쇄된다.
    async fn reverse(
        &self,
        original: &LedgerEntry,
        description: String,
    ) -> Result<ReverseOutcome, StoreError>;

    /// 현재 잔고 (사용자가 없으면 None)
    async fn balance(&self, user_id: u64) -> Result<Option<Decimal>, StoreError>;

    /// 사용자 원장 (최신순)
    async fn history(&self, user_id: u64, limit: i64) -> Result<Vec<LedgerEntry>, StoreError>;

    /// 관리자 거래 내역 (최신순)
    async fn list(&self, filter: &TransactionFilter) -> Result<Vec<LedgerEntry>, StoreError>;

    /// 주문의 COMPLETED PURCHASE entry
    async fn purchase_for_order(&self, order_id: Uuid) -> Result<Option<LedgerEntry>, StoreError>;

    /// COMPLETED entry 합계 (잔고 불변식 검증용)
    async fn completed_sum(&self, user_id: u64) -> Result<Decimal, StoreError>;
}

/// 주문 저장소
/// Order storage
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// PENDING 주문 생성
    async fn create(&self, order: NewOrder) -> Result<Order, StoreError>;

    async fn get(&self, order_id: Uuid) -> Result<Option<OrderDetails>, StoreError>;

    /// 사용자 주문 목록 (최신순)
    async fn list_by_user(&self, user_id: u64) -> Result<Vec<Order>, StoreError>;

    /// 조건부 상태 전이. 현재 상태가 `from` 중 하나일 때만 `to` 로 바꾸고 true.
    async fn transition(
        &self,
        order_id: Uuid,
        from: &[OrderStatus],
        to: OrderStatus,
        reason: Option<&str>,
    ) -> Result<bool, StoreError>;

    /// 라인/키 저장 + PROCESSING -> COMPLETED 를 하나의 트랜잭션으로.
    /// 주문이 더 이상 PROCESSING 이 아니면 아무것도 쓰지 않고 false.
    async fn complete(
        &self,
        order_id: Uuid,
        items: &[OrderItem],
        keys: &[AssignedKey],
    ) -> Result<bool, StoreError>;

    /// COMPLETED 주문의 누적 환불액에 `amount` 를 더한다 (total 을 넘으면 거부).
    /// 성공 시 새 누적 환불액, 거부 시 None.
    async fn add_refund(&self, order_id: Uuid, amount: Decimal) -> Result<Option<Decimal>, StoreError>;

    /// `add_refund` 취소 (원장 기록 실패 시)
    async fn revert_refund(&self, order_id: Uuid, amount: Decimal) -> Result<(), StoreError>;

    /// 상태별 주문 수 / 매출 / 환불 합계
    async fn stats(&self) -> Result<OrderStats, StoreError>;
}

/// 공급사 예약 저장소
/// Reservation storage
#[async_trait]
pub trait ReservationStore: Send + Sync {
    async fn insert(&self, reservation: &Reservation) -> Result<(), StoreError>;

    async fn get(&self, reservation_id: Uuid) -> Result<Option<Reservation>, StoreError>;

    async fn list(&self, filter: &ReservationFilter) -> Result<Vec<Reservation>, StoreError>;

    async fn list_by_order(&self, order_id: Uuid) -> Result<Vec<Reservation>, StoreError>;

    /// HELD -> CONFIRMED + 키 저장 (조건부)
    async fn mark_confirmed(&self, reservation_id: Uuid, keys: &[String]) -> Result<bool, StoreError>;

    /// HELD -> RELEASED | EXPIRED (조건부)
    async fn mark_terminal(
        &self,
        reservation_id: Uuid,
        to: ReservationStatus,
    ) -> Result<bool, StoreError>;

    /// 만료 시각이 지난 HELD 예약을 EXPIRED 로
    async fn expire_overdue(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;

    async fn count_held(&self) -> Result<i64, StoreError>;
}

/// 카탈로그 (읽기 전용 + 프로모션 사용 횟수)
/// Catalog access
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn game(&self, game_id: Uuid) -> Result<Option<CatalogGame>, StoreError>;

    async fn promo(&self, code: &str) -> Result<Option<PromoCode>, StoreError>;

    /// 사용 가능할 때만 used_count + 1 (조건부)
    async fn redeem_promo(&self, code: &str, now: DateTime<Utc>) -> Result<bool, StoreError>;

    async fn unredeem_promo(&self, code: &str) -> Result<(), StoreError>;
}

/// 자체 보유 키 풀
/// Local key pool
#[async_trait]
pub trait KeyPool: Send + Sync {
    /// 미지급 키 수
    async fn available(&self, game_id: Uuid) -> Result<i64, StoreError>;

    /// 미지급 키 하나를 주문에 할당 (단일 조건부 UPDATE). 없으면 None.
    async fn claim(&self, game_id: Uuid, order_id: Uuid) -> Result<Option<String>, StoreError>;

    /// 주문에 할당된 키를 모두 풀로 되돌림 (보상)
    async fn unclaim_order(&self, order_id: Uuid) -> Result<u64, StoreError>;
}
