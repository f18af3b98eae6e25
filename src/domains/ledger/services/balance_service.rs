use std::sync::Arc;

use rust_decimal::Decimal;

use crate::domains::ledger::models::{
    BalanceChangeResponse, BalanceResponse, LedgerEntry, LedgerEntryKind,
};
use crate::domains::ledger::services::Ledger;
use crate::shared::cache::{invalidate_best_effort, keys, CacheInvalidator};
use crate::shared::errors::FulfillmentError;

/// 사용자 잔고 서비스
/// User-facing balance operations (view, history, top-up)
#[derive(Clone)]
pub struct BalanceService {
    ledger: Arc<dyn Ledger>,
    cache: Arc<dyn CacheInvalidator>,
    currency: String,
    max_top_up: Decimal,
}

impl BalanceService {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        cache: Arc<dyn CacheInvalidator>,
        currency: impl Into<String>,
        max_top_up: Decimal,
    ) -> Self {
        Self {
            ledger,
            cache,
            currency: currency.into(),
            max_top_up,
        }
    }

    /// 현재 잔고 조회
    pub async fn get_balance(&self, user_id: u64) -> Result<BalanceResponse, FulfillmentError> {
        let balance = self.ledger.balance(user_id).await?;
        Ok(BalanceResponse {
            user_id,
            balance,
            currency: self.currency.clone(),
        })
    }

    /// 원장 내역 (최신순)
    pub async fn get_history(&self, user_id: u64) -> Result<Vec<LedgerEntry>, FulfillmentError> {
        self.ledger.history(user_id).await
    }

    /// 잔고 충전
    /// Top up the balance (card processing happens upstream)
    ///
    /// # Returns
    /// * 충전 entry 와 충전 전/후 잔고
    pub async fn top_up(
        &self,
        user_id: u64,
        amount: Decimal,
    ) -> Result<BalanceChangeResponse, FulfillmentError> {
        if amount > self.max_top_up {
            return Err(FulfillmentError::InvalidAmount(format!(
                "top-up of {} exceeds the limit of {}",
                amount, self.max_top_up
            )));
        }

        let entry = self
            .ledger
            .credit(user_id, amount, LedgerEntryKind::TopUp, "Balance top-up", None)
            .await?;

        invalidate_best_effort(self.cache.as_ref(), &keys::after_balance_change(user_id)).await;

        let balance_after = entry.balance_after.unwrap_or_default();
        Ok(BalanceChangeResponse {
            balance_before: balance_after - entry.amount,
            balance_after,
            entry,
        })
    }
}
