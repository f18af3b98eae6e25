use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domains::ledger::models::{
    DebitOutcome, LedgerEntry, LedgerEntryKind, LedgerEntryStatus, NewLedgerEntry, ReverseOutcome,
    TransactionFilter,
};
use crate::domains::orders::models::{
    AssignedKey, CatalogGame, NewOrder, Order, OrderDetails, OrderItem, OrderStats, OrderStatus,
    PromoCode,
};
use crate::domains::reservation::models::{Reservation, ReservationFilter, ReservationStatus};
use crate::shared::database::stores::{CatalogStore, KeyPool, LedgerStore, OrderStore, ReservationStore};
use crate::shared::errors::StoreError;

// =====================================================
// In-memory 저장소
// =====================================================
// PostgreSQL 없이 서비스 계층을 테스트하기 위한 구현.
// 하나의 Mutex 가 DB 트랜잭션 역할을 한다 (각 메서드는 원자적).
//
// 장애 주입:
// - inject_ledger_conflicts(n): 다음 n 번의 debit/credit/reverse 가 Conflict
// =====================================================

#[derive(Debug, Clone)]
struct LocalKey {
    game_id: Uuid,
    key: String,
    order_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
struct OrderRecord {
    order: Order,
    items: Vec<OrderItem>,
    keys: Vec<AssignedKey>,
}

#[derive(Default)]
struct MemoryState {
    users: HashMap<u64, Decimal>,
    ledger: Vec<LedgerEntry>,
    orders: HashMap<Uuid, OrderRecord>,
    reservations: HashMap<Uuid, Reservation>,
    games: HashMap<Uuid, CatalogGame>,
    keys: Vec<LocalKey>,
    promos: HashMap<String, PromoCode>,
}

/// In-memory 저장소 (모든 store trait 구현)
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    ledger_conflicts: AtomicU32,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 잔고 0 인 사용자 등록
    pub fn add_user(&self, user_id: u64) {
        self.state.lock().users.entry(user_id).or_insert(Decimal::ZERO);
    }

    pub fn add_game(&self, game: CatalogGame) {
        self.state.lock().games.insert(game.id, game);
    }

    pub fn add_keys<I, S>(&self, game_id: Uuid, keys: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut state = self.state.lock();
        for key in keys {
            state.keys.push(LocalKey {
                game_id,
                key: key.into(),
                order_id: None,
            });
        }
    }

    pub fn add_promo(&self, promo: PromoCode) {
        self.state.lock().promos.insert(promo.code.clone(), promo);
    }

    /// 다음 n 번의 원장 쓰기를 직렬화 충돌로 실패시킨다
    pub fn inject_ledger_conflicts(&self, n: u32) {
        self.ledger_conflicts.store(n, Ordering::SeqCst);
    }

    /// 주문에 할당된 로컬 키
    pub fn claimed_keys(&self, order_id: Uuid) -> Vec<String> {
        self.state
            .lock()
            .keys
            .iter()
            .filter(|k| k.order_id == Some(order_id))
            .map(|k| k.key.clone())
            .collect()
    }

    pub fn promo_used_count(&self, code: &str) -> Option<i64> {
        self.state.lock().promos.get(code).map(|p| p.used_count)
    }

    /// 테스트에서 예약 만료 시각 조작
    pub fn set_reservation_expiry(&self, reservation_id: Uuid, expires_at: DateTime<Utc>) {
        if let Some(r) = self.state.lock().reservations.get_mut(&reservation_id) {
            r.expires_at = expires_at;
        }
    }

    fn take_conflict(&self) -> Result<(), StoreError> {
        let injected = self
            .ledger_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        match injected {
            Ok(_) => Err(StoreError::Conflict("injected serialization failure".to_string())),
            Err(_) => Ok(()),
        }
    }
}

fn newest_first(entries: &mut [LedgerEntry]) {
    entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn debit(&self, entry: NewLedgerEntry) -> Result<DebitOutcome, StoreError> {
        self.take_conflict()?;
        let mut state = self.state.lock();
        let balance = *state
            .users
            .get(&entry.user_id)
            .ok_or_else(|| StoreError::NotFound(format!("user {}", entry.user_id)))?;

        if balance < entry.amount {
            let required = entry.amount;
            let failed = entry.into_entry(LedgerEntryStatus::Failed, None);
            state.ledger.push(failed);
            return Ok(DebitOutcome::InsufficientFunds { balance, required });
        }

        let after = balance - entry.amount;
        state.users.insert(entry.user_id, after);
        let completed = entry.into_entry(LedgerEntryStatus::Completed, Some(after));
        state.ledger.push(completed.clone());
        Ok(DebitOutcome::Debited(completed))
    }

    async fn credit(&self, entry: NewLedgerEntry) -> Result<LedgerEntry, StoreError> {
        self.take_conflict()?;
        let mut state = self.state.lock();
        let balance = state
            .users
            .get_mut(&entry.user_id)
            .ok_or_else(|| StoreError::NotFound(format!("user {}", entry.user_id)))?;

        *balance += entry.amount;
        let after = *balance;
        let completed = entry.into_entry(LedgerEntryStatus::Completed, Some(after));
        state.ledger.push(completed.clone());
        Ok(completed)
    }

    async fn reverse(
        &self,
        original: &LedgerEntry,
        description: String,
    ) -> Result<ReverseOutcome, StoreError> {
        self.take_conflict()?;
        let mut state = self.state.lock();
        if state.ledger.iter().any(|e| e.reverses == Some(original.id)) {
            return Ok(ReverseOutcome::AlreadyReversed);
        }

        let amount = -original.amount;
        let balance = state
            .users
            .get_mut(&original.user_id)
            .ok_or_else(|| StoreError::NotFound(format!("user {}", original.user_id)))?;
        *balance += amount;
        let after = *balance;

        let entry = NewLedgerEntry {
            user_id: original.user_id,
            kind: LedgerEntryKind::Refund,
            amount,
            currency: original.currency.clone(),
            order_id: original.order_id,
            reverses: Some(original.id),
            description,
        }
        .into_entry(LedgerEntryStatus::Completed, Some(after));
        state.ledger.push(entry.clone());
        Ok(ReverseOutcome::Reversed(entry))
    }

    async fn balance(&self, user_id: u64) -> Result<Option<Decimal>, StoreError> {
        Ok(self.state.lock().users.get(&user_id).copied())
    }

    async fn history(&self, user_id: u64, limit: i64) -> Result<Vec<LedgerEntry>, StoreError> {
        let mut entries: Vec<LedgerEntry> = self
            .state
            .lock()
            .ledger
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect();
        newest_first(&mut entries);
        entries.truncate(limit.max(0) as usize);
        Ok(entries)
    }

    async fn list(&self, filter: &TransactionFilter) -> Result<Vec<LedgerEntry>, StoreError> {
        let mut entries: Vec<LedgerEntry> = self
            .state
            .lock()
            .ledger
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        newest_first(&mut entries);
        Ok(entries
            .into_iter()
            .skip(filter.offset() as usize)
            .take(filter.limit() as usize)
            .collect())
    }

    async fn purchase_for_order(&self, order_id: Uuid) -> Result<Option<LedgerEntry>, StoreError> {
        Ok(self
            .state
            .lock()
            .ledger
            .iter()
            .find(|e| {
                e.order_id == Some(order_id)
                    && e.kind == LedgerEntryKind::Purchase
                    && e.status == LedgerEntryStatus::Completed
            })
            .cloned())
    }

    async fn completed_sum(&self, user_id: u64) -> Result<Decimal, StoreError> {
        Ok(self
            .state
            .lock()
            .ledger
            .iter()
            .filter(|e| e.user_id == user_id && e.is_settled())
            .map(|e| e.amount)
            .sum())
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn create(&self, order: NewOrder) -> Result<Order, StoreError> {
        let order = order.into_order();
        self.state.lock().orders.insert(
            order.id,
            OrderRecord {
                order: order.clone(),
                items: Vec::new(),
                keys: Vec::new(),
            },
        );
        Ok(order)
    }

    async fn get(&self, order_id: Uuid) -> Result<Option<OrderDetails>, StoreError> {
        Ok(self.state.lock().orders.get(&order_id).map(|r| OrderDetails {
            order: r.order.clone(),
            items: r.items.clone(),
            keys: r.keys.clone(),
        }))
    }

    async fn list_by_user(&self, user_id: u64) -> Result<Vec<Order>, StoreError> {
        let mut orders: Vec<Order> = self
            .state
            .lock()
            .orders
            .values()
            .filter(|r| r.order.user_id == user_id)
            .map(|r| r.order.clone())
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn transition(
        &self,
        order_id: Uuid,
        from: &[OrderStatus],
        to: OrderStatus,
        reason: Option<&str>,
    ) -> Result<bool, StoreError> {
        let mut state = self.state.lock();
        let Some(record) = state.orders.get_mut(&order_id) else {
            return Ok(false);
        };
        if !from.contains(&record.order.status) {
            return Ok(false);
        }
        record.order.status = to;
        record.order.updated_at = Utc::now();
        if let Some(reason) = reason {
            record.order.cancel_reason = Some(reason.to_string());
        }
        Ok(true)
    }

    async fn complete(
        &self,
        order_id: Uuid,
        items: &[OrderItem],
        keys: &[AssignedKey],
    ) -> Result<bool, StoreError> {
        let mut state = self.state.lock();
        let Some(record) = state.orders.get_mut(&order_id) else {
            return Ok(false);
        };
        if record.order.status != OrderStatus::Processing {
            return Ok(false);
        }
        record.items = items.to_vec();
        record.keys = keys.to_vec();
        record.order.status = OrderStatus::Completed;
        record.order.updated_at = Utc::now();
        Ok(true)
    }

    async fn add_refund(&self, order_id: Uuid, amount: Decimal) -> Result<Option<Decimal>, StoreError> {
        let mut state = self.state.lock();
        let Some(record) = state.orders.get_mut(&order_id) else {
            return Ok(None);
        };
        let order = &mut record.order;
        if order.status != OrderStatus::Completed || order.refunded_amount + amount > order.total {
            return Ok(None);
        }
        order.refunded_amount += amount;
        order.updated_at = Utc::now();
        Ok(Some(order.refunded_amount))
    }

    async fn revert_refund(&self, order_id: Uuid, amount: Decimal) -> Result<(), StoreError> {
        if let Some(record) = self.state.lock().orders.get_mut(&order_id) {
            record.order.refunded_amount = (record.order.refunded_amount - amount).max(Decimal::ZERO);
        }
        Ok(())
    }

    async fn stats(&self) -> Result<OrderStats, StoreError> {
        let state = self.state.lock();
        let mut stats = OrderStats::default();
        for record in state.orders.values() {
            let order = &record.order;
            match order.status {
                OrderStatus::Pending => stats.pending_orders += 1,
                OrderStatus::Processing => stats.processing_orders += 1,
                OrderStatus::Completed => {
                    stats.completed_orders += 1;
                    stats.completed_revenue += order.total;
                }
                OrderStatus::Cancelled => stats.cancelled_orders += 1,
            }
            stats.refunded_total += order.refunded_amount;
        }
        Ok(stats)
    }
}

#[async_trait]
impl ReservationStore for MemoryStore {
    async fn insert(&self, reservation: &Reservation) -> Result<(), StoreError> {
        self.state
            .lock()
            .reservations
            .insert(reservation.id, reservation.clone());
        Ok(())
    }

    async fn get(&self, reservation_id: Uuid) -> Result<Option<Reservation>, StoreError> {
        Ok(self.state.lock().reservations.get(&reservation_id).cloned())
    }

    async fn list(&self, filter: &ReservationFilter) -> Result<Vec<Reservation>, StoreError> {
        let mut reservations: Vec<Reservation> = self
            .state
            .lock()
            .reservations
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        reservations.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        reservations.truncate(filter.limit() as usize);
        Ok(reservations)
    }

    async fn list_by_order(&self, order_id: Uuid) -> Result<Vec<Reservation>, StoreError> {
        let mut reservations: Vec<Reservation> = self
            .state
            .lock()
            .reservations
            .values()
            .filter(|r| r.order_id == order_id)
            .cloned()
            .collect();
        reservations.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(reservations)
    }

    async fn mark_confirmed(&self, reservation_id: Uuid, keys: &[String]) -> Result<bool, StoreError> {
        let mut state = self.state.lock();
        match state.reservations.get_mut(&reservation_id) {
            Some(r) if r.status == ReservationStatus::Held => {
                r.status = ReservationStatus::Confirmed;
                r.delivered_keys = keys.to_vec();
                r.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_terminal(
        &self,
        reservation_id: Uuid,
        to: ReservationStatus,
    ) -> Result<bool, StoreError> {
        let mut state = self.state.lock();
        match state.reservations.get_mut(&reservation_id) {
            Some(r) if r.status == ReservationStatus::Held => {
                r.status = to;
                r.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn expire_overdue(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut state = self.state.lock();
        let mut expired = 0;
        for r in state.reservations.values_mut() {
            if r.status == ReservationStatus::Held && r.is_expired_at(now) {
                r.status = ReservationStatus::Expired;
                r.updated_at = now;
                expired += 1;
            }
        }
        Ok(expired)
    }

    async fn count_held(&self) -> Result<i64, StoreError> {
        Ok(self
            .state
            .lock()
            .reservations
            .values()
            .filter(|r| r.status == ReservationStatus::Held)
            .count() as i64)
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn game(&self, game_id: Uuid) -> Result<Option<CatalogGame>, StoreError> {
        Ok(self.state.lock().games.get(&game_id).cloned())
    }

    async fn promo(&self, code: &str) -> Result<Option<PromoCode>, StoreError> {
        Ok(self.state.lock().promos.get(code).cloned())
    }

    async fn redeem_promo(&self, code: &str, now: DateTime<Utc>) -> Result<bool, StoreError> {
        let mut state = self.state.lock();
        match state.promos.get_mut(code) {
            Some(promo) if promo.is_usable(now) => {
                promo.used_count += 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn unredeem_promo(&self, code: &str) -> Result<(), StoreError> {
        if let Some(promo) = self.state.lock().promos.get_mut(code) {
            promo.used_count = (promo.used_count - 1).max(0);
        }
        Ok(())
    }
}

#[async_trait]
impl KeyPool for MemoryStore {
    async fn available(&self, game_id: Uuid) -> Result<i64, StoreError> {
        Ok(self
            .state
            .lock()
            .keys
            .iter()
            .filter(|k| k.game_id == game_id && k.order_id.is_none())
            .count() as i64)
    }

    async fn claim(&self, game_id: Uuid, order_id: Uuid) -> Result<Option<String>, StoreError> {
        let mut state = self.state.lock();
        Ok(state
            .keys
            .iter_mut()
            .find(|k| k.game_id == game_id && k.order_id.is_none())
            .map(|k| {
                k.order_id = Some(order_id);
                k.key.clone()
            }))
    }

    async fn unclaim_order(&self, order_id: Uuid) -> Result<u64, StoreError> {
        let mut state = self.state.lock();
        let mut released = 0;
        for k in state.keys.iter_mut().filter(|k| k.order_id == Some(order_id)) {
            k.order_id = None;
            released += 1;
        }
        Ok(released)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn top_up(user_id: u64, amount: i64) -> NewLedgerEntry {
        NewLedgerEntry {
            user_id,
            kind: LedgerEntryKind::TopUp,
            amount: Decimal::new(amount, 0),
            currency: "EUR".to_string(),
            order_id: None,
            reverses: None,
            description: "top up".to_string(),
        }
    }

    #[tokio::test]
    async fn injected_conflicts_are_consumed() {
        let store = MemoryStore::new();
        store.add_user(1);
        store.inject_ledger_conflicts(1);

        assert!(matches!(store.credit(top_up(1, 5)).await, Err(StoreError::Conflict(_))));
        assert!(store.credit(top_up(1, 5)).await.is_ok());
        assert_eq!(store.balance(1).await.unwrap(), Some(Decimal::new(5, 0)));
    }

    #[tokio::test]
    async fn reverse_is_applied_at_most_once() {
        let store = MemoryStore::new();
        store.add_user(1);
        let entry = store.credit(top_up(1, 10)).await.unwrap();

        assert!(matches!(
            store.reverse(&entry, "undo".to_string()).await.unwrap(),
            ReverseOutcome::Reversed(_)
        ));
        assert!(matches!(
            store.reverse(&entry, "undo".to_string()).await.unwrap(),
            ReverseOutcome::AlreadyReversed
        ));
        assert_eq!(store.balance(1).await.unwrap(), Some(Decimal::ZERO));
    }
}
