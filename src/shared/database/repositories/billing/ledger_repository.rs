use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{postgres::PgRow, PgPool, Row};
use uuid::Uuid;

use super::parse_column;
use crate::domains::ledger::models::{
    DebitOutcome, LedgerEntry, LedgerEntryKind, LedgerEntryStatus, NewLedgerEntry, ReverseOutcome,
    TransactionFilter,
};
use crate::shared::database::stores::LedgerStore;
use crate::shared::errors::StoreError;

const LEDGER_COLUMNS: &str = "id, user_id, kind, amount, currency, status, order_id, reverses, \
                              description, balance_after, created_at";

/// 원장 Repository (PostgreSQL)
/// Ledger repository
///
/// 잔고 변경과 entry 기록은 항상 같은 트랜잭션에서 커밋된다.
pub struct LedgerRepository {
    pool: PgPool,
}

impl LedgerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn entry_from_row(row: &PgRow) -> Result<LedgerEntry, StoreError> {
        Ok(LedgerEntry {
            id: row.get("id"),
            user_id: row.get::<i64, _>("user_id") as u64,
            kind: parse_column(row.get::<&str, _>("kind"))?,
            amount: row.get("amount"),
            currency: row.get("currency"),
            status: parse_column(row.get::<&str, _>("status"))?,
            order_id: row.get("order_id"),
            reverses: row.get("reverses"),
            description: row.get("description"),
            balance_after: row.get("balance_after"),
            created_at: row.get("created_at"),
        })
    }

    fn entries_from_rows(rows: Vec<PgRow>) -> Result<Vec<LedgerEntry>, StoreError> {
        rows.iter().map(Self::entry_from_row).collect()
    }
}

/// entry INSERT (트랜잭션 안에서 사용)
async fn insert_entry(
    conn: &mut sqlx::PgConnection,
    entry: &NewLedgerEntry,
    status: LedgerEntryStatus,
    balance_after: Option<Decimal>,
) -> Result<Option<LedgerEntry>, StoreError> {
    let query = format!(
        r#"
        INSERT INTO ledger_entries
            (id, user_id, kind, amount, currency, status, order_id, reverses, description, balance_after, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, NOW())
        ON CONFLICT (reverses) DO NOTHING
        RETURNING {}
        "#,
        LEDGER_COLUMNS
    );

    let row = sqlx::query(&query)
        .bind(Uuid::new_v4())
        .bind(entry.user_id as i64)
        .bind(entry.kind.as_str())
        .bind(entry.signed_amount())
        .bind(&entry.currency)
        .bind(status.as_str())
        .bind(entry.order_id)
        .bind(entry.reverses)
        .bind(&entry.description)
        .bind(balance_after)
        .fetch_optional(conn)
        .await?;

    row.as_ref().map(LedgerRepository::entry_from_row).transpose()
}

#[async_trait]
impl LedgerStore for LedgerRepository {
    async fn debit(&self, entry: NewLedgerEntry) -> Result<DebitOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;

        // 조건부 차감: 잔고가 충분할 때만 1 row 갱신
        let updated = sqlx::query(
            r#"
            UPDATE users
            SET balance = balance - $1, updated_at = NOW()
            WHERE id = $2 AND balance >= $1
            RETURNING balance
            "#,
        )
        .bind(entry.amount)
        .bind(entry.user_id as i64)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = updated else {
            let balance: Option<Decimal> =
                sqlx::query_scalar("SELECT balance FROM users WHERE id = $1")
                    .bind(entry.user_id as i64)
                    .fetch_optional(&mut *tx)
                    .await?;
            let balance =
                balance.ok_or_else(|| StoreError::NotFound(format!("user {}", entry.user_id)))?;

            // 감사용 FAILED entry (잔고 합계에는 포함되지 않음)
            insert_entry(&mut *tx, &entry, LedgerEntryStatus::Failed, None).await?;
            tx.commit().await?;

            return Ok(DebitOutcome::InsufficientFunds {
                balance,
                required: entry.amount,
            });
        };

        let balance_after: Decimal = row.get("balance");
        let recorded = insert_entry(&mut *tx, &entry, LedgerEntryStatus::Completed, Some(balance_after))
            .await?
            .ok_or_else(|| StoreError::Database("ledger entry not recorded".to_string()))?;
        tx.commit().await?;

        Ok(DebitOutcome::Debited(recorded))
    }

    async fn credit(&self, entry: NewLedgerEntry) -> Result<LedgerEntry, StoreError> {
        let mut tx = self.pool.begin().await?;

        let balance_after: Option<Decimal> = sqlx::query_scalar(
            r#"
            UPDATE users
            SET balance = balance + $1, updated_at = NOW()
            WHERE id = $2
            RETURNING balance
            "#,
        )
        .bind(entry.amount)
        .bind(entry.user_id as i64)
        .fetch_optional(&mut *tx)
        .await?;
        let balance_after =
            balance_after.ok_or_else(|| StoreError::NotFound(format!("user {}", entry.user_id)))?;

        let recorded = insert_entry(&mut *tx, &entry, LedgerEntryStatus::Completed, Some(balance_after))
            .await?
            .ok_or_else(|| StoreError::Database("ledger entry not recorded".to_string()))?;
        tx.commit().await?;

        Ok(recorded)
    }

    async fn reverse(
        &self,
        original: &LedgerEntry,
        description: String,
    ) -> Result<ReverseOutcome, StoreError> {
        let entry = NewLedgerEntry {
            user_id: original.user_id,
            kind: LedgerEntryKind::Refund,
            amount: -original.amount,
            currency: original.currency.clone(),
            order_id: original.order_id,
            reverses: Some(original.id),
            description,
        };

        let mut tx = self.pool.begin().await?;

        let balance_after: Option<Decimal> = sqlx::query_scalar(
            r#"
            UPDATE users
            SET balance = balance + $1, updated_at = NOW()
            WHERE id = $2
            RETURNING balance
            "#,
        )
        .bind(entry.signed_amount())
        .bind(entry.user_id as i64)
        .fetch_optional(&mut *tx)
        .await?;
        let balance_after =
            balance_after.ok_or_else(|| StoreError::NotFound(format!("user {}", entry.user_id)))?;

        // reverses UNIQUE 충돌 = 이미 상쇄됨 -> 잔고 변경까지 롤백
        match insert_entry(&mut *tx, &entry, LedgerEntryStatus::Completed, Some(balance_after)).await? {
            Some(recorded) => {
                tx.commit().await?;
                Ok(ReverseOutcome::Reversed(recorded))
            }
            None => {
                tx.rollback().await?;
                Ok(ReverseOutcome::AlreadyReversed)
            }
        }
    }

    async fn balance(&self, user_id: u64) -> Result<Option<Decimal>, StoreError> {
        let balance = sqlx::query_scalar("SELECT balance FROM users WHERE id = $1")
            .bind(user_id as i64)
            .fetch_optional(&self.pool)
            .await?;
        Ok(balance)
    }

    async fn history(&self, user_id: u64, limit: i64) -> Result<Vec<LedgerEntry>, StoreError> {
        let query = format!(
            "SELECT {} FROM ledger_entries WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2",
            LEDGER_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(user_id as i64)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Self::entries_from_rows(rows)
    }

    async fn list(&self, filter: &TransactionFilter) -> Result<Vec<LedgerEntry>, StoreError> {
        let query = format!(
            r#"
            SELECT {}
            FROM ledger_entries
            WHERE ($1::BIGINT IS NULL OR user_id = $1)
              AND ($2::VARCHAR IS NULL OR kind = $2)
              AND ($3::VARCHAR IS NULL OR status = $3)
              AND ($4::UUID IS NULL OR order_id = $4)
            ORDER BY created_at DESC
            LIMIT $5 OFFSET $6
            "#,
            LEDGER_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(filter.user_id.map(|u| u as i64))
            .bind(filter.kind.map(|k| k.as_str()))
            .bind(filter.status.map(|s| s.as_str()))
            .bind(filter.order_id)
            .bind(filter.limit())
            .bind(filter.offset())
            .fetch_all(&self.pool)
            .await?;
        Self::entries_from_rows(rows)
    }

    async fn purchase_for_order(&self, order_id: Uuid) -> Result<Option<LedgerEntry>, StoreError> {
        let query = format!(
            r#"
            SELECT {}
            FROM ledger_entries
            WHERE order_id = $1 AND kind = 'purchase' AND status = 'completed'
            LIMIT 1
            "#,
            LEDGER_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::entry_from_row).transpose()
    }

    async fn completed_sum(&self, user_id: u64) -> Result<Decimal, StoreError> {
        let sum: Option<Decimal> = sqlx::query_scalar(
            "SELECT SUM(amount) FROM ledger_entries WHERE user_id = $1 AND status = 'completed'",
        )
        .bind(user_id as i64)
        .fetch_one(&self.pool)
        .await?;
        Ok(sum.unwrap_or(Decimal::ZERO))
    }
}
