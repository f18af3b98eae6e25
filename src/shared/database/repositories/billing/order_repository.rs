use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{postgres::PgRow, PgPool, Row};
use uuid::Uuid;

use super::parse_column;
use crate::domains::orders::models::{
    AssignedKey, NewOrder, Order, OrderDetails, OrderItem, OrderStats, OrderStatus,
};
use crate::shared::database::stores::OrderStore;
use crate::shared::errors::StoreError;

const ORDER_COLUMNS: &str = "id, user_id, status, total, discount, currency, promo_code, \
                             refunded_amount, cancel_reason, created_at, updated_at";

/// 주문 Repository (PostgreSQL)
/// Order repository
pub struct OrderRepository {
    pool: PgPool,
}

impl OrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn order_from_row(row: &PgRow) -> Result<Order, StoreError> {
        Ok(Order {
            id: row.get("id"),
            user_id: row.get::<i64, _>("user_id") as u64,
            status: parse_column(row.get::<&str, _>("status"))?,
            total: row.get("total"),
            discount: row.get("discount"),
            currency: row.get("currency"),
            promo_code: row.get("promo_code"),
            refunded_amount: row.get("refunded_amount"),
            cancel_reason: row.get("cancel_reason"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }
}

#[async_trait]
impl OrderStore for OrderRepository {
    async fn create(&self, order: NewOrder) -> Result<Order, StoreError> {
        let query = format!(
            r#"
            INSERT INTO orders (id, user_id, status, total, discount, currency, promo_code, created_at, updated_at)
            VALUES ($1, $2, 'pending', $3, $4, $5, $6, NOW(), NOW())
            RETURNING {}
            "#,
            ORDER_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(Uuid::new_v4())
            .bind(order.user_id as i64)
            .bind(order.total)
            .bind(order.discount)
            .bind(&order.currency)
            .bind(&order.promo_code)
            .fetch_one(&self.pool)
            .await?;
        Self::order_from_row(&row)
    }

    async fn get(&self, order_id: Uuid) -> Result<Option<OrderDetails>, StoreError> {
        let query = format!("SELECT {} FROM orders WHERE id = $1", ORDER_COLUMNS);
        let Some(row) = sqlx::query(&query)
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await?
        else {
            return Ok(None);
        };
        let order = Self::order_from_row(&row)?;

        let items = sqlx::query(
            "SELECT game_id, quantity, price FROM order_items WHERE order_id = $1 ORDER BY id",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|row| OrderItem {
            game_id: row.get("game_id"),
            quantity: row.get::<i32, _>("quantity") as u32,
            price: row.get("price"),
        })
        .collect();

        let keys = sqlx::query(
            "SELECT game_id, key_value, source FROM order_keys WHERE order_id = $1 ORDER BY id",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(|row| {
            Ok(AssignedKey {
                game_id: row.get("game_id"),
                key: row.get("key_value"),
                source: parse_column(row.get::<&str, _>("source"))?,
            })
        })
        .collect::<Result<Vec<_>, StoreError>>()?;

        Ok(Some(OrderDetails { order, items, keys }))
    }

    async fn list_by_user(&self, user_id: u64) -> Result<Vec<Order>, StoreError> {
        let query = format!(
            "SELECT {} FROM orders WHERE user_id = $1 ORDER BY created_at DESC",
            ORDER_COLUMNS
        );
        sqlx::query(&query)
            .bind(user_id as i64)
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(Self::order_from_row)
            .collect()
    }

    async fn transition(
        &self,
        order_id: Uuid,
        from: &[OrderStatus],
        to: OrderStatus,
        reason: Option<&str>,
    ) -> Result<bool, StoreError> {
        let from: Vec<&str> = from.iter().map(|s| s.as_str()).collect();
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = $1,
                cancel_reason = COALESCE($2, cancel_reason),
                updated_at = NOW()
            WHERE id = $3 AND status = ANY($4)
            "#,
        )
        .bind(to.as_str())
        .bind(reason)
        .bind(order_id)
        .bind(&from)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn complete(
        &self,
        order_id: Uuid,
        items: &[OrderItem],
        keys: &[AssignedKey],
    ) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;

        // 상태 전이가 먼저: 동시 취소가 이겼다면 아무것도 쓰지 않는다
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = 'completed', updated_at = NOW()
            WHERE id = $1 AND status = 'processing'
            "#,
        )
        .bind(order_id)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() != 1 {
            tx.rollback().await?;
            return Ok(false);
        }

        for item in items {
            sqlx::query(
                "INSERT INTO order_items (order_id, game_id, quantity, price) VALUES ($1, $2, $3, $4)",
            )
            .bind(order_id)
            .bind(item.game_id)
            .bind(item.quantity as i32)
            .bind(item.price)
            .execute(&mut *tx)
            .await?;
        }

        for key in keys {
            sqlx::query(
                "INSERT INTO order_keys (order_id, game_id, key_value, source) VALUES ($1, $2, $3, $4)",
            )
            .bind(order_id)
            .bind(key.game_id)
            .bind(&key.key)
            .bind(key.source.as_str())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(true)
    }

    async fn add_refund(&self, order_id: Uuid, amount: Decimal) -> Result<Option<Decimal>, StoreError> {
        let refunded: Option<Decimal> = sqlx::query_scalar(
            r#"
            UPDATE orders
            SET refunded_amount = refunded_amount + $1, updated_at = NOW()
            WHERE id = $2 AND status = 'completed' AND refunded_amount + $1 <= total
            RETURNING refunded_amount
            "#,
        )
        .bind(amount)
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(refunded)
    }

    async fn revert_refund(&self, order_id: Uuid, amount: Decimal) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE orders
            SET refunded_amount = GREATEST(refunded_amount - $1, 0), updated_at = NOW()
            WHERE id = $2
            "#,
        )
        .bind(amount)
        .bind(order_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn stats(&self) -> Result<OrderStats, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT status,
                   COUNT(*) AS order_count,
                   COALESCE(SUM(total), 0) AS total_sum,
                   COALESCE(SUM(refunded_amount), 0) AS refunded_sum
            FROM orders
            GROUP BY status
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut stats = OrderStats::default();
        for row in rows {
            let status: OrderStatus = parse_column(row.get::<&str, _>("status"))?;
            let count: i64 = row.get("order_count");
            match status {
                OrderStatus::Pending => stats.pending_orders = count,
                OrderStatus::Processing => stats.processing_orders = count,
                OrderStatus::Completed => {
                    stats.completed_orders = count;
                    stats.completed_revenue = row.get("total_sum");
                }
                OrderStatus::Cancelled => stats.cancelled_orders = count,
            }
            stats.refunded_total += row.get::<Decimal, _>("refunded_sum");
        }
        Ok(stats)
    }
}
