use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domains::ledger::models::{
    BalanceAdjustmentRequest, BalanceChangeResponse, DebitOutcome, LedgerEntry, LedgerEntryKind,
    TransactionFilter,
};
use crate::domains::ledger::services::Ledger;
use crate::domains::orders::models::{OrderDetails, OrderStats, RefundRequest, RefundResult};
use crate::domains::orders::services::{FulfillmentService, RefundService};
use crate::domains::reservation::models::{ReleaseResponse, Reservation, ReservationFilter};
use crate::domains::reservation::services::ReservationGateway;
use crate::shared::cache::{invalidate_best_effort, keys, CacheInvalidator};
use crate::shared::database::{OrderStore, ReservationStore};
use crate::shared::errors::FulfillmentError;

/// 통계 요약 캐시 유지 시간
const STATS_TTL: Duration = Duration::from_secs(60);

/// 관리자 서비스
/// Back-office façade over the ledger, orchestrator and reservation gateway
///
/// 관리자 권한 확인은 HTTP 계층(AdminUser extractor)에서 끝난다.
#[derive(Clone)]
pub struct AdminService {
    ledger: Arc<dyn Ledger>,
    gateway: Arc<dyn ReservationGateway>,
    cache: Arc<dyn CacheInvalidator>,
    orders: Arc<dyn OrderStore>,
    reservations: Arc<dyn ReservationStore>,
    fulfillment: FulfillmentService,
    refunds: RefundService,
}

impl AdminService {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        gateway: Arc<dyn ReservationGateway>,
        cache: Arc<dyn CacheInvalidator>,
        orders: Arc<dyn OrderStore>,
        reservations: Arc<dyn ReservationStore>,
        fulfillment: FulfillmentService,
        refunds: RefundService,
    ) -> Self {
        Self {
            ledger,
            gateway,
            cache,
            orders,
            reservations,
            fulfillment,
            refunds,
        }
    }

    /// 거래 내역 조회 (필터)
    pub async fn transactions(
        &self,
        filter: &TransactionFilter,
    ) -> Result<Vec<LedgerEntry>, FulfillmentError> {
        self.ledger.transactions(filter).await
    }

    /// 완료 주문 환불 (부분 환불 가능)
    pub async fn refund(
        &self,
        order_id: Uuid,
        request: RefundRequest,
    ) -> Result<RefundResult, FulfillmentError> {
        self.refunds.refund(order_id, request).await
    }

    /// 미완료 주문 취소 (소유자 확인 없음)
    pub async fn cancel_order(
        &self,
        order_id: Uuid,
        reason: &str,
    ) -> Result<OrderDetails, FulfillmentError> {
        self.fulfillment.cancel_order(order_id, reason, None).await
    }

    /// 잔고 수동 조정
    /// Manual balance adjustment
    ///
    /// 양수는 DEPOSIT 으로 입금, 음수는 WITHDRAWAL 로 출금한다.
    /// 출금은 잔고를 음수로 만들 수 없다 (`InsufficientFunds`).
    #[tracing::instrument(skip(self, request), fields(amount = %request.amount))]
    pub async fn adjust_balance(
        &self,
        user_id: u64,
        request: BalanceAdjustmentRequest,
    ) -> Result<BalanceChangeResponse, FulfillmentError> {
        let reason = request.reason.trim();
        if reason.is_empty() {
            return Err(FulfillmentError::InvalidAmount(
                "an adjustment reason is required".to_string(),
            ));
        }
        let description = format!("Admin adjustment: {}", reason);

        let entry = if request.amount > Decimal::ZERO {
            self.ledger
                .credit(user_id, request.amount, LedgerEntryKind::Deposit, &description, None)
                .await?
        } else if request.amount < Decimal::ZERO {
            match self
                .ledger
                .debit(user_id, -request.amount, LedgerEntryKind::Withdrawal, &description, None)
                .await?
            {
                DebitOutcome::Debited(entry) => entry,
                DebitOutcome::InsufficientFunds { balance, required } => {
                    return Err(FulfillmentError::InsufficientFunds { balance, required });
                }
            }
        } else {
            return Err(FulfillmentError::InvalidAmount(
                "adjustment amount must not be zero".to_string(),
            ));
        };

        tracing::info!(user_id, entry_id = %entry.id, kind = entry.kind.as_str(), "balance adjusted by admin");
        invalidate_best_effort(self.cache.as_ref(), &keys::after_balance_change(user_id)).await;

        let balance_after = entry.balance_after.unwrap_or_default();
        Ok(BalanceChangeResponse {
            balance_before: balance_after - entry.amount,
            balance_after,
            entry,
        })
    }

    /// 예약 목록 (필터)
    pub async fn reservations(
        &self,
        filter: &ReservationFilter,
    ) -> Result<Vec<Reservation>, FulfillmentError> {
        self.gateway.list(filter).await
    }

    /// 예약 강제 해제
    pub async fn cancel_reservation(
        &self,
        reservation_id: Uuid,
    ) -> Result<ReleaseResponse, FulfillmentError> {
        let outcome = self.gateway.release(reservation_id).await?;
        invalidate_best_effort(self.cache.as_ref(), &[keys::ADMIN.to_string()]).await;
        Ok(ReleaseResponse {
            reservation_id,
            outcome,
        })
    }

    /// 통계 요약 (60초 캐시)
    /// Statistics summary, served from the read cache when fresh
    pub async fn stats(&self) -> Result<OrderStats, FulfillmentError> {
        match self.cache.get(keys::ADMIN_STATS).await {
            Ok(Some(cached)) => match serde_json::from_str::<OrderStats>(&cached) {
                Ok(stats) => return Ok(stats),
                Err(e) => tracing::warn!(error = %e, "discarding unreadable cached stats"),
            },
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "stats cache read failed"),
        }

        let mut stats = self.orders.stats().await?;
        stats.held_reservations = self.reservations.count_held().await?;

        match serde_json::to_string(&stats) {
            Ok(json) => {
                if let Err(e) = self.cache.set_ex(keys::ADMIN_STATS, &json, STATS_TTL).await {
                    tracing::warn!(error = %e, "stats cache write failed");
                }
            }
            Err(e) => tracing::warn!(error = %e, "failed to serialize stats"),
        }

        Ok(stats)
    }
}
