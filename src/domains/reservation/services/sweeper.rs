use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::domains::reservation::services::ReservationGateway;
use crate::shared::errors::FulfillmentError;

/// 예약 만료 스위퍼
/// Reservation expiry sweeper
///
/// 역할:
/// - 주기적으로 만료 시각이 지난 HELD 예약을 EXPIRED 로 표시
/// - 공급사 쪽 홀드는 만료 시 자연 소멸하므로 API 호출은 하지 않는다
#[derive(Clone)]
pub struct ReservationSweeper {
    gateway: Arc<dyn ReservationGateway>,
    period: Duration,
}

impl ReservationSweeper {
    pub fn new(gateway: Arc<dyn ReservationGateway>, period: Duration) -> Self {
        Self { gateway, period }
    }

    /// 한 번 실행, 만료 처리한 예약 수 반환
    pub async fn sweep_once(&self) -> Result<u64, FulfillmentError> {
        let expired = self.gateway.expire_overdue(Utc::now()).await?;
        if expired > 0 {
            tracing::info!(expired, "expired overdue reservations");
        }
        Ok(expired)
    }

    /// 백그라운드 태스크 시작
    /// Start the background task
    pub fn start(&self) -> JoinHandle<()> {
        let sweeper = self.clone();

        tokio::spawn(async move {
            let mut ticker = interval(sweeper.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;

                if let Err(e) = sweeper.sweep_once().await {
                    tracing::warn!(error = %e, "reservation sweep failed");
                }
            }
        })
    }
}
