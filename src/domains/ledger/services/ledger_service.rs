use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domains::ledger::models::{
    DebitOutcome, LedgerEntry, LedgerEntryKind, NewLedgerEntry, ReverseOutcome, TransactionFilter,
};
use crate::shared::database::LedgerStore;
use crate::shared::errors::{FulfillmentError, StoreError};
use crate::shared::utils::money::MONEY_SCALE;
use crate::shared::utils::retry::{retry_with_backoff, RetryPolicy};

/// 원장 내역 조회 최대 개수
const HISTORY_LIMIT: i64 = 200;

/// 원장 인터페이스
/// Ledger: append-only balance events with an authoritative running balance
///
/// 모든 금액 인자는 양수(magnitude)이며, 부호는 종류에 따라 붙는다.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// 조건부 차감. 잔고 부족은 에러가 아니라 `DebitOutcome::InsufficientFunds`.
    async fn debit(
        &self,
        user_id: u64,
        amount: Decimal,
        kind: LedgerEntryKind,
        reason: &str,
        order_id: Option<Uuid>,
    ) -> Result<DebitOutcome, FulfillmentError>;

    /// 무조건 증가
    async fn credit(
        &self,
        user_id: u64,
        amount: Decimal,
        kind: LedgerEntryKind,
        reason: &str,
        order_id: Option<Uuid>,
    ) -> Result<LedgerEntry, FulfillmentError>;

    /// `entry` 를 상쇄하는 REFUND (한 번만 적용됨)
    async fn reverse(&self, entry: &LedgerEntry, reason: &str) -> Result<ReverseOutcome, FulfillmentError>;

    async fn balance(&self, user_id: u64) -> Result<Decimal, FulfillmentError>;

    /// 최신순
    async fn history(&self, user_id: u64) -> Result<Vec<LedgerEntry>, FulfillmentError>;

    async fn purchase_for(&self, order_id: Uuid) -> Result<Option<LedgerEntry>, FulfillmentError>;

    async fn transactions(&self, filter: &TransactionFilter) -> Result<Vec<LedgerEntry>, FulfillmentError>;
}

/// 저장소 기반 원장 서비스
/// Store-backed ledger with bounded retry on storage conflicts
#[derive(Clone)]
pub struct LedgerService {
    store: Arc<dyn LedgerStore>,
    retry: RetryPolicy,
    currency: String,
}

impl LedgerService {
    pub fn new(store: Arc<dyn LedgerStore>, retry: RetryPolicy, currency: impl Into<String>) -> Self {
        Self {
            store,
            retry,
            currency: currency.into(),
        }
    }

    fn new_entry(
        &self,
        user_id: u64,
        amount: Decimal,
        kind: LedgerEntryKind,
        reason: &str,
        order_id: Option<Uuid>,
    ) -> NewLedgerEntry {
        NewLedgerEntry {
            user_id,
            kind,
            amount,
            currency: self.currency.clone(),
            order_id,
            reverses: None,
            description: reason.to_string(),
        }
    }
}

/// 금액 검증: 0 보다 크고 통화 단위(센트) 이하의 소수점이 없어야 한다
pub fn validate_amount(amount: Decimal) -> Result<(), FulfillmentError> {
    if amount <= Decimal::ZERO {
        return Err(FulfillmentError::InvalidAmount(format!(
            "amount must be positive, got {}",
            amount
        )));
    }
    if amount.normalize().scale() > MONEY_SCALE {
        return Err(FulfillmentError::InvalidAmount(format!(
            "amount {} has more than {} decimal places",
            amount, MONEY_SCALE
        )));
    }
    Ok(())
}

fn for_user(user_id: u64) -> impl Fn(StoreError) -> FulfillmentError {
    move |err| match err {
        StoreError::NotFound(_) => FulfillmentError::UserNotFound { user_id },
        other => other.into(),
    }
}

#[async_trait]
impl Ledger for LedgerService {
    async fn debit(
        &self,
        user_id: u64,
        amount: Decimal,
        kind: LedgerEntryKind,
        reason: &str,
        order_id: Option<Uuid>,
    ) -> Result<DebitOutcome, FulfillmentError> {
        validate_amount(amount)?;
        let entry = self.new_entry(user_id, amount, kind, reason, order_id);

        let outcome = retry_with_backoff(self.retry, "ledger.debit", || {
            self.store.debit(entry.clone())
        })
        .await
        .map_err(for_user(user_id))?;

        match &outcome {
            DebitOutcome::Debited(recorded) => tracing::info!(
                user_id,
                entry_id = %recorded.id,
                ?order_id,
                %amount,
                kind = kind.as_str(),
                "ledger debit completed"
            ),
            DebitOutcome::InsufficientFunds { balance, required } => tracing::info!(
                user_id,
                ?order_id,
                %balance,
                %required,
                "ledger debit rejected: insufficient funds"
            ),
        }
        Ok(outcome)
    }

    async fn credit(
        &self,
        user_id: u64,
        amount: Decimal,
        kind: LedgerEntryKind,
        reason: &str,
        order_id: Option<Uuid>,
    ) -> Result<LedgerEntry, FulfillmentError> {
        validate_amount(amount)?;
        if kind.is_debit() {
            return Err(FulfillmentError::InvalidAmount(format!(
                "{} is not a credit kind",
                kind.as_str()
            )));
        }
        let entry = self.new_entry(user_id, amount, kind, reason, order_id);

        let recorded = retry_with_backoff(self.retry, "ledger.credit", || {
            self.store.credit(entry.clone())
        })
        .await
        .map_err(for_user(user_id))?;

        tracing::info!(
            user_id,
            entry_id = %recorded.id,
            ?order_id,
            %amount,
            kind = kind.as_str(),
            "ledger credit completed"
        );
        Ok(recorded)
    }

    async fn reverse(&self, entry: &LedgerEntry, reason: &str) -> Result<ReverseOutcome, FulfillmentError> {
        if !entry.is_settled() || entry.amount >= Decimal::ZERO {
            return Err(FulfillmentError::InvalidAmount(format!(
                "ledger entry {} is not a settled debit",
                entry.id
            )));
        }

        let outcome = retry_with_backoff(self.retry, "ledger.reverse", || {
            self.store.reverse(entry, reason.to_string())
        })
        .await
        .map_err(for_user(entry.user_id))?;

        match &outcome {
            ReverseOutcome::Reversed(recorded) => tracing::info!(
                user_id = entry.user_id,
                entry_id = %recorded.id,
                reverses = %entry.id,
                order_id = ?entry.order_id,
                amount = %recorded.amount,
                "ledger entry reversed"
            ),
            ReverseOutcome::AlreadyReversed => tracing::debug!(
                reverses = %entry.id,
                "ledger entry already reversed"
            ),
        }
        Ok(outcome)
    }

    async fn balance(&self, user_id: u64) -> Result<Decimal, FulfillmentError> {
        self.store
            .balance(user_id)
            .await?
            .ok_or(FulfillmentError::UserNotFound { user_id })
    }

    async fn history(&self, user_id: u64) -> Result<Vec<LedgerEntry>, FulfillmentError> {
        Ok(self.store.history(user_id, HISTORY_LIMIT).await?)
    }

    async fn purchase_for(&self, order_id: Uuid) -> Result<Option<LedgerEntry>, FulfillmentError> {
        Ok(self.store.purchase_for_order(order_id).await?)
    }

    async fn transactions(&self, filter: &TransactionFilter) -> Result<Vec<LedgerEntry>, FulfillmentError> {
        Ok(self.store.list(filter).await?)
    }
}
