use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::parse_column;
use crate::domains::orders::models::{CatalogGame, PromoCode};
use crate::shared::database::stores::{CatalogStore, KeyPool};
use crate::shared::errors::StoreError;

/// 카탈로그 Repository (PostgreSQL, 읽기 전용 + 프로모션 카운터)
/// Catalog repository
pub struct CatalogRepository {
    pool: PgPool,
}

impl CatalogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatalogStore for CatalogRepository {
    async fn game(&self, game_id: Uuid) -> Result<Option<CatalogGame>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, title, price, discount_percent, currency, active, key_source,
                   supplier_product_id, supplier_stock
            FROM games
            WHERE id = $1
            "#,
        )
        .bind(game_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(CatalogGame {
            id: row.get("id"),
            title: row.get("title"),
            price: row.get("price"),
            discount_percent: row.get("discount_percent"),
            currency: row.get("currency"),
            active: row.get("active"),
            key_source: parse_column(row.get::<&str, _>("key_source"))?,
            supplier_product_id: row.get("supplier_product_id"),
            supplier_stock: row.get("supplier_stock"),
        }))
    }

    async fn promo(&self, code: &str) -> Result<Option<PromoCode>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT code, discount_percent, active, expires_at, max_uses, used_count
            FROM promo_codes
            WHERE code = $1
            "#,
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| PromoCode {
            code: row.get("code"),
            discount_percent: row.get("discount_percent"),
            active: row.get("active"),
            expires_at: row.get("expires_at"),
            max_uses: row.get::<Option<i32>, _>("max_uses").map(i64::from),
            used_count: row.get::<i32, _>("used_count") as i64,
        }))
    }

    async fn redeem_promo(&self, code: &str, now: DateTime<Utc>) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE promo_codes
            SET used_count = used_count + 1
            WHERE code = $1
              AND active
              AND (expires_at IS NULL OR expires_at > $2)
              AND (max_uses IS NULL OR used_count < max_uses)
            "#,
        )
        .bind(code)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn unredeem_promo(&self, code: &str) -> Result<(), StoreError> {
        sqlx::query("UPDATE promo_codes SET used_count = used_count - 1 WHERE code = $1 AND used_count > 0")
            .bind(code)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// 로컬 키 풀 Repository (PostgreSQL)
/// Local key pool repository
pub struct GameKeyRepository {
    pool: PgPool,
}

impl GameKeyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl KeyPool for GameKeyRepository {
    async fn available(&self, game_id: Uuid) -> Result<i64, StoreError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM game_keys WHERE game_id = $1 AND order_id IS NULL")
                .bind(game_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    async fn claim(&self, game_id: Uuid, order_id: Uuid) -> Result<Option<String>, StoreError> {
        // 단일 조건부 UPDATE: 잠긴 row 는 건너뛰므로 두 주문이 같은 키를 받을 수 없다
        let key: Option<String> = sqlx::query_scalar(
            r#"
            UPDATE game_keys
            SET order_id = $2, claimed_at = NOW()
            WHERE id = (
                SELECT id FROM game_keys
                WHERE game_id = $1 AND order_id IS NULL
                ORDER BY id
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            AND order_id IS NULL
            RETURNING key_value
            "#,
        )
        .bind(game_id)
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(key)
    }

    async fn unclaim_order(&self, order_id: Uuid) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "UPDATE game_keys SET order_id = NULL, claimed_at = NULL WHERE order_id = $1",
        )
        .bind(order_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
