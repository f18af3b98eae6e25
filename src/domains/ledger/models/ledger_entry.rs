use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

// =====================================================
// LedgerEntry 모델
// =====================================================
// 역할: 잔고에 영향을 주는 모든 이벤트의 append-only 기록
//
// 부호 규칙:
// - credit (충전, 환불, 입금): amount > 0
// - debit (구매, 출금): amount < 0
//
// 불변식:
// users.balance == SUM(amount WHERE status = 'completed')
//
// 상태 전이:
// pending -> completed (성공) | failed (잔고 부족 등으로 거절)
// completed / failed 이후에는 절대 수정하지 않는다.
// 되돌릴 때는 새로운 상쇄(offsetting) entry 를 추가한다.
// =====================================================

/// 원장 항목 종류
/// Ledger entry kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LedgerEntryKind {
    TopUp,
    Purchase,
    Refund,
    Deposit,
    Withdrawal,
}

impl LedgerEntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerEntryKind::TopUp => "top_up",
            LedgerEntryKind::Purchase => "purchase",
            LedgerEntryKind::Refund => "refund",
            LedgerEntryKind::Deposit => "deposit",
            LedgerEntryKind::Withdrawal => "withdrawal",
        }
    }

    /// debit 종류인지 (amount 음수)
    pub fn is_debit(&self) -> bool {
        matches!(self, LedgerEntryKind::Purchase | LedgerEntryKind::Withdrawal)
    }
}

impl FromStr for LedgerEntryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "top_up" => Ok(LedgerEntryKind::TopUp),
            "purchase" => Ok(LedgerEntryKind::Purchase),
            "refund" => Ok(LedgerEntryKind::Refund),
            "deposit" => Ok(LedgerEntryKind::Deposit),
            "withdrawal" => Ok(LedgerEntryKind::Withdrawal),
            other => Err(format!("unknown ledger entry kind: {}", other)),
        }
    }
}

/// 원장 항목 상태
/// Ledger entry status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LedgerEntryStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl LedgerEntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerEntryStatus::Pending => "pending",
            LedgerEntryStatus::Processing => "processing",
            LedgerEntryStatus::Completed => "completed",
            LedgerEntryStatus::Failed => "failed",
            LedgerEntryStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for LedgerEntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LedgerEntryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(LedgerEntryStatus::Pending),
            "processing" => Ok(LedgerEntryStatus::Processing),
            "completed" => Ok(LedgerEntryStatus::Completed),
            "failed" => Ok(LedgerEntryStatus::Failed),
            "cancelled" => Ok(LedgerEntryStatus::Cancelled),
            other => Err(format!("unknown ledger entry status: {}", other)),
        }
    }
}

/// 원장 항목 (DB 에서 조회한 값)
/// Ledger entry as persisted
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub id: Uuid,

    pub user_id: u64,

    pub kind: LedgerEntryKind,

    /// 부호 있는 금액 (credit 양수 / debit 음수)
    /// Signed amount (credit positive, debit negative)
    #[schema(value_type = String, example = "-20.00")]
    pub amount: Decimal,

    #[schema(example = "EUR")]
    pub currency: String,

    pub status: LedgerEntryStatus,

    pub order_id: Option<Uuid>,

    /// 이 항목이 상쇄하는 원 항목 (보상 credit 에만 존재)
    /// Entry this one offsets (compensation credits only)
    pub reverses: Option<Uuid>,

    pub description: String,

    /// 이 항목 반영 직후 잔고 (failed 항목은 None)
    #[schema(value_type = Option<String>, example = "30.00")]
    pub balance_after: Option<Decimal>,

    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// 잔고 합계에 포함되는 항목인지 (settled)
    pub fn is_settled(&self) -> bool {
        self.status == LedgerEntryStatus::Completed
    }
}

// =====================================================
// 원장 기록 요청 (Store 에서 사용)
// =====================================================
/// 원장 기록 시 사용하는 내부 모델
/// `amount` 는 항상 양수(magnitude)이며 부호는 store 가 종류에 따라 붙인다.
#[derive(Debug, Clone)]
pub struct NewLedgerEntry {
    pub user_id: u64,
    pub kind: LedgerEntryKind,
    pub amount: Decimal,
    pub currency: String,
    pub order_id: Option<Uuid>,
    pub reverses: Option<Uuid>,
    pub description: String,
}

impl NewLedgerEntry {
    /// 부호가 적용된 금액
    pub fn signed_amount(&self) -> Decimal {
        if self.kind.is_debit() {
            -self.amount
        } else {
            self.amount
        }
    }

    /// 확정된 LedgerEntry 생성 (in-memory store / 테스트용)
    pub fn into_entry(self, status: LedgerEntryStatus, balance_after: Option<Decimal>) -> LedgerEntry {
        let amount = self.signed_amount();
        LedgerEntry {
            id: Uuid::new_v4(),
            user_id: self.user_id,
            kind: self.kind,
            amount,
            currency: self.currency,
            status,
            order_id: self.order_id,
            reverses: self.reverses,
            description: self.description,
            balance_after,
            created_at: Utc::now(),
        }
    }
}

/// Debit 결과
/// Debit outcome
///
/// 잔고 부족은 예외가 아니라 예상 가능한 결과이므로 별도 variant 로 표현한다.
/// 호출자는 반드시 분기해야 한다.
#[must_use]
#[derive(Debug, Clone)]
pub enum DebitOutcome {
    Debited(LedgerEntry),
    InsufficientFunds { balance: Decimal, required: Decimal },
}

/// 보상(역분개) credit 결과
#[must_use]
#[derive(Debug, Clone)]
pub enum ReverseOutcome {
    Reversed(LedgerEntry),
    /// 이미 다른 경로(관리자 취소 등)에서 상쇄됨
    AlreadyReversed,
}

/// 관리자 거래 내역 조회 필터
/// Admin transaction filter
#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct TransactionFilter {
    pub user_id: Option<u64>,
    pub kind: Option<LedgerEntryKind>,
    pub status: Option<LedgerEntryStatus>,
    pub order_id: Option<Uuid>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl TransactionFilter {
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(100).clamp(1, 500)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }

    pub fn matches(&self, entry: &LedgerEntry) -> bool {
        self.user_id.is_none_or(|u| entry.user_id == u)
            && self.kind.is_none_or(|k| entry.kind == k)
            && self.status.is_none_or(|s| entry.status == s)
            && self.order_id.is_none_or(|o| entry.order_id == Some(o))
    }
}

// =====================================================
// API 요청/응답 모델
// =====================================================

/// 잔고 응답
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BalanceResponse {
    pub user_id: u64,
    #[schema(value_type = String, example = "50.00")]
    pub balance: Decimal,
    pub currency: String,
}

/// 원장 내역 응답 (최신순)
#[derive(Debug, Serialize, ToSchema)]
pub struct LedgerHistoryResponse {
    pub entries: Vec<LedgerEntry>,
}

/// 잔고 충전 요청
#[derive(Debug, Deserialize, ToSchema)]
pub struct TopUpRequest {
    #[schema(value_type = String, example = "25.00")]
    pub amount: Decimal,
}

/// 잔고 변경 결과 (충전, 관리자 조정)
/// Balance change result with before/after balance for auditability
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BalanceChangeResponse {
    pub entry: LedgerEntry,
    #[schema(value_type = String)]
    pub balance_before: Decimal,
    #[schema(value_type = String)]
    pub balance_after: Decimal,
}

/// 관리자 잔고 조정 요청 (양수: 입금, 음수: 출금)
#[derive(Debug, Deserialize, ToSchema)]
pub struct BalanceAdjustmentRequest {
    #[schema(value_type = String, example = "-5.00")]
    pub amount: Decimal,
    pub reason: String,
}

/// 거래 내역 목록 응답
#[derive(Debug, Serialize, ToSchema)]
pub struct TransactionsResponse {
    pub transactions: Vec<LedgerEntry>,
}
