use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, PgPool, Row};
use uuid::Uuid;

use super::parse_column;
use crate::domains::reservation::models::{Reservation, ReservationFilter, ReservationStatus};
use crate::shared::database::stores::ReservationStore;
use crate::shared::errors::StoreError;

const RESERVATION_COLUMNS: &str = "id, order_id, game_id, product_id, supplier_reservation_id, \
                                   quantity, status, expires_at, delivered_keys, created_at, updated_at";

/// 공급사 예약 Repository (PostgreSQL)
/// Reservation repository
pub struct ReservationRepository {
    pool: PgPool,
}

impl ReservationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn reservation_from_row(row: &PgRow) -> Result<Reservation, StoreError> {
        Ok(Reservation {
            id: row.get("id"),
            order_id: row.get("order_id"),
            game_id: row.get("game_id"),
            product_id: row.get("product_id"),
            supplier_reservation_id: row.get("supplier_reservation_id"),
            quantity: row.get::<i32, _>("quantity") as u32,
            status: parse_column(row.get::<&str, _>("status"))?,
            expires_at: row.get("expires_at"),
            delivered_keys: row.get("delivered_keys"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }
}

#[async_trait]
impl ReservationStore for ReservationRepository {
    async fn insert(&self, reservation: &Reservation) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO reservations
                (id, order_id, game_id, product_id, supplier_reservation_id, quantity, status,
                 expires_at, delivered_keys, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(reservation.id)
        .bind(reservation.order_id)
        .bind(reservation.game_id)
        .bind(&reservation.product_id)
        .bind(&reservation.supplier_reservation_id)
        .bind(reservation.quantity as i32)
        .bind(reservation.status.as_str())
        .bind(reservation.expires_at)
        .bind(&reservation.delivered_keys)
        .bind(reservation.created_at)
        .bind(reservation.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, reservation_id: Uuid) -> Result<Option<Reservation>, StoreError> {
        let query = format!("SELECT {} FROM reservations WHERE id = $1", RESERVATION_COLUMNS);
        let row = sqlx::query(&query)
            .bind(reservation_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::reservation_from_row).transpose()
    }

    async fn list(&self, filter: &ReservationFilter) -> Result<Vec<Reservation>, StoreError> {
        let query = format!(
            r#"
            SELECT {}
            FROM reservations
            WHERE ($1::VARCHAR IS NULL OR status = $1)
              AND ($2::UUID IS NULL OR order_id = $2)
            ORDER BY created_at DESC
            LIMIT $3
            "#,
            RESERVATION_COLUMNS
        );
        sqlx::query(&query)
            .bind(filter.status.map(|s| s.as_str()))
            .bind(filter.order_id)
            .bind(filter.limit())
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(Self::reservation_from_row)
            .collect()
    }

    async fn list_by_order(&self, order_id: Uuid) -> Result<Vec<Reservation>, StoreError> {
        let query = format!(
            "SELECT {} FROM reservations WHERE order_id = $1 ORDER BY created_at ASC",
            RESERVATION_COLUMNS
        );
        sqlx::query(&query)
            .bind(order_id)
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(Self::reservation_from_row)
            .collect()
    }

    async fn mark_confirmed(&self, reservation_id: Uuid, keys: &[String]) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE reservations
            SET status = 'confirmed', delivered_keys = $1, updated_at = NOW()
            WHERE id = $2 AND status = 'held'
            "#,
        )
        .bind(keys)
        .bind(reservation_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn mark_terminal(
        &self,
        reservation_id: Uuid,
        to: ReservationStatus,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE reservations
            SET status = $1, updated_at = NOW()
            WHERE id = $2 AND status = 'held'
            "#,
        )
        .bind(to.as_str())
        .bind(reservation_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn expire_overdue(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE reservations
            SET status = 'expired', updated_at = $1
            WHERE status = 'held' AND expires_at <= $1
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn count_held(&self) -> Result<i64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reservations WHERE status = 'held'")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
