use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::domains::orders::models::{AssignedKey, KeySource};
use crate::domains::reservation::models::{
    ReleaseOutcome, Reservation, ReservationFilter, ReservationStatus,
};
use crate::shared::clients::{SupplierApi, SupplierError};
use crate::shared::database::ReservationStore;
use crate::shared::errors::FulfillmentError;
use crate::shared::utils::retry::{retry_with_backoff, RetryPolicy};

/// 재고 예약 게이트웨이
/// Inventory reservation gateway in front of the key supplier
#[async_trait]
pub trait ReservationGateway: Send + Sync {
    /// 공급사에 홀드 요청 후 HELD 예약 저장
    async fn reserve(
        &self,
        order_id: Uuid,
        game_id: Uuid,
        product_id: &str,
        quantity: u32,
    ) -> Result<Reservation, FulfillmentError>;

    /// 홀드 확정 -> 키 수령. 이미 확정된 예약은 저장된 키를 그대로 돌려준다.
    async fn confirm(&self, reservation_id: Uuid) -> Result<Vec<AssignedKey>, FulfillmentError>;

    /// 홀드 해제 (best effort)
    async fn release(&self, reservation_id: Uuid) -> Result<ReleaseOutcome, FulfillmentError>;

    async fn get(&self, reservation_id: Uuid) -> Result<Reservation, FulfillmentError>;

    async fn for_order(&self, order_id: Uuid) -> Result<Vec<Reservation>, FulfillmentError>;

    async fn list(&self, filter: &ReservationFilter) -> Result<Vec<Reservation>, FulfillmentError>;

    /// 만료된 HELD 예약 정리
    async fn expire_overdue(&self, now: DateTime<Utc>) -> Result<u64, FulfillmentError>;
}

/// 공급사 API 기반 게이트웨이
pub struct SupplierReservationGateway {
    supplier: Arc<dyn SupplierApi>,
    store: Arc<dyn ReservationStore>,
    retry: RetryPolicy,
    /// 공급사 만료 시각에서 빼는 안전 마진
    safety_margin: Duration,
}

impl SupplierReservationGateway {
    pub fn new(
        supplier: Arc<dyn SupplierApi>,
        store: Arc<dyn ReservationStore>,
        retry: RetryPolicy,
        safety_margin: Duration,
    ) -> Self {
        Self {
            supplier,
            store,
            retry,
            safety_margin: safety_margin.max(Duration::zero()),
        }
    }

    /// 공급사 홀드를 조용히 해제 (예약 저장 전에 실패한 경우)
    async fn abandon_hold(&self, supplier_reservation_id: &str) {
        if let Err(e) = self.supplier.release(supplier_reservation_id).await {
            tracing::warn!(
                supplier_reservation_id,
                error = %e,
                "failed to release abandoned supplier hold"
            );
        }
    }

    fn delivered(reservation: &Reservation) -> Vec<AssignedKey> {
        reservation
            .delivered_keys
            .iter()
            .map(|key| AssignedKey {
                game_id: reservation.game_id,
                key: key.clone(),
                source: KeySource::Supplier,
            })
            .collect()
    }

    async fn mark_expired(&self, reservation: &Reservation) -> FulfillmentError {
        if let Err(e) = self
            .store
            .mark_terminal(reservation.id, ReservationStatus::Expired)
            .await
        {
            tracing::warn!(reservation_id = %reservation.id, error = %e, "failed to mark reservation expired");
        }
        tracing::info!(
            reservation_id = %reservation.id,
            order_id = %reservation.order_id,
            "reservation expired"
        );
        FulfillmentError::ReservationExpired {
            reservation_id: reservation.id,
        }
    }
}

#[async_trait]
impl ReservationGateway for SupplierReservationGateway {
    async fn reserve(
        &self,
        order_id: Uuid,
        game_id: Uuid,
        product_id: &str,
        quantity: u32,
    ) -> Result<Reservation, FulfillmentError> {
        let hold = retry_with_backoff(self.retry, "supplier.reserve", || {
            self.supplier.reserve(product_id, quantity)
        })
        .await
        .map_err(|e| match e {
            SupplierError::NotFound(_) | SupplierError::Conflict(_) | SupplierError::Gone(_) => {
                FulfillmentError::OutOfStock { game_id }
            }
            other => FulfillmentError::SupplierUnavailable(other.to_string()),
        })?;

        let Some(supplier_expiry) = hold.expires_at else {
            self.abandon_hold(&hold.reservation_id).await;
            return Err(FulfillmentError::SupplierUnavailable(
                "supplier hold has no expiry".to_string(),
            ));
        };

        let now = Utc::now();
        // 공급사 만료 시각보다 늦어지는 일은 없다
        let expires_at = supplier_expiry - self.safety_margin;
        if expires_at <= now {
            self.abandon_hold(&hold.reservation_id).await;
            return Err(FulfillmentError::SupplierUnavailable(
                "supplier hold expires too soon".to_string(),
            ));
        }

        let reservation = Reservation {
            id: Uuid::new_v4(),
            order_id,
            game_id,
            product_id: product_id.to_string(),
            supplier_reservation_id: hold.reservation_id,
            quantity,
            status: ReservationStatus::Held,
            expires_at,
            delivered_keys: Vec::new(),
            created_at: now,
            updated_at: now,
        };

        if let Err(e) = self.store.insert(&reservation).await {
            self.abandon_hold(&reservation.supplier_reservation_id).await;
            return Err(e.into());
        }

        tracing::info!(
            reservation_id = %reservation.id,
            %order_id,
            %game_id,
            quantity,
            expires_at = %reservation.expires_at,
            "supplier stock reserved"
        );
        Ok(reservation)
    }

    async fn confirm(&self, reservation_id: Uuid) -> Result<Vec<AssignedKey>, FulfillmentError> {
        let reservation = self.get(reservation_id).await?;

        match reservation.status {
            ReservationStatus::Confirmed => return Ok(Self::delivered(&reservation)),
            ReservationStatus::Released | ReservationStatus::Expired => {
                return Err(FulfillmentError::ReservationExpired { reservation_id });
            }
            ReservationStatus::Held => {}
        }

        if reservation.is_expired_at(Utc::now()) {
            return Err(self.mark_expired(&reservation).await);
        }

        let supplier_id = reservation.supplier_reservation_id.as_str();
        let keys = match retry_with_backoff(self.retry, "supplier.confirm", || {
            self.supplier.confirm(supplier_id)
        })
        .await
        {
            Ok(keys) => keys,
            Err(SupplierError::Gone(_)) | Err(SupplierError::NotFound(_)) => {
                return Err(self.mark_expired(&reservation).await);
            }
            Err(e) => return Err(FulfillmentError::SupplierUnavailable(e.to_string())),
        };

        if keys.len() != reservation.quantity as usize {
            tracing::error!(
                %reservation_id,
                expected = reservation.quantity,
                delivered = keys.len(),
                "supplier delivered wrong number of keys"
            );
            return Err(FulfillmentError::SupplierUnavailable(format!(
                "supplier delivered {} keys, expected {}",
                keys.len(),
                reservation.quantity
            )));
        }

        if !self.store.mark_confirmed(reservation_id, &keys).await? {
            // 동시에 다른 호출이 상태를 바꿈: 확정이면 그 키를 돌려준다
            let current = self.get(reservation_id).await?;
            if current.status == ReservationStatus::Confirmed {
                return Ok(Self::delivered(&current));
            }
            // 공급사는 이미 키를 넘겼지만 로컬 홀드는 해제/만료됨
            tracing::error!(
                %reservation_id,
                order_id = %reservation.order_id,
                supplier_reservation_id = %reservation.supplier_reservation_id,
                status = %current.status,
                keys = ?keys,
                "supplier delivered keys for a hold that is no longer held"
            );
            return Err(FulfillmentError::ReservationExpired { reservation_id });
        }

        tracing::info!(
            %reservation_id,
            order_id = %reservation.order_id,
            keys = keys.len(),
            "reservation confirmed"
        );
        Ok(keys
            .into_iter()
            .map(|key| AssignedKey {
                game_id: reservation.game_id,
                key,
                source: KeySource::Supplier,
            })
            .collect())
    }

    async fn release(&self, reservation_id: Uuid) -> Result<ReleaseOutcome, FulfillmentError> {
        let reservation = self.get(reservation_id).await?;
        if reservation.status.is_terminal() {
            return Ok(ReleaseOutcome::AlreadyTerminal);
        }

        // 로컬 상태는 공급사 응답과 무관하게 HELD 를 벗어난다
        if !self
            .store
            .mark_terminal(reservation_id, ReservationStatus::Released)
            .await?
        {
            return Ok(ReleaseOutcome::AlreadyTerminal);
        }

        let supplier_id = reservation.supplier_reservation_id.as_str();
        let outcome = match retry_with_backoff(self.retry, "supplier.release", || {
            self.supplier.release(supplier_id)
        })
        .await
        {
            Ok(()) | Err(SupplierError::NotFound(_)) | Err(SupplierError::Gone(_)) => {
                ReleaseOutcome::Released
            }
            Err(e) => {
                tracing::warn!(
                    %reservation_id,
                    supplier_reservation_id = supplier_id,
                    error = %e,
                    "supplier did not acknowledge release; hold will lapse at expiry"
                );
                ReleaseOutcome::Unacknowledged
            }
        };

        tracing::info!(%reservation_id, order_id = %reservation.order_id, ?outcome, "reservation released");
        Ok(outcome)
    }

    async fn get(&self, reservation_id: Uuid) -> Result<Reservation, FulfillmentError> {
        self.store
            .get(reservation_id)
            .await?
            .ok_or(FulfillmentError::ReservationNotFound { reservation_id })
    }

    async fn for_order(&self, order_id: Uuid) -> Result<Vec<Reservation>, FulfillmentError> {
        Ok(self.store.list_by_order(order_id).await?)
    }

    async fn list(&self, filter: &ReservationFilter) -> Result<Vec<Reservation>, FulfillmentError> {
        Ok(self.store.list(filter).await?)
    }

    async fn expire_overdue(&self, now: DateTime<Utc>) -> Result<u64, FulfillmentError> {
        Ok(self.store.expire_overdue(now).await?)
    }
}
