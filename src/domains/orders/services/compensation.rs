use uuid::Uuid;

use crate::domains::ledger::models::ReverseOutcome;
use crate::domains::orders::models::{Order, OrderDetails, OrderStatus};
use crate::domains::orders::services::FulfillmentService;
use crate::shared::cache::{invalidate_best_effort, keys};
use crate::shared::errors::FulfillmentError;

/// 보상(compensation) + 주문 취소
/// Undo everything an order acquired and move it to CANCELLED
///
/// 순서:
/// 1. PENDING/PROCESSING -> CANCELLED 전이 (가드)
/// 2. HELD 예약 해제
/// 3. 로컬 키 반납
/// 4. 구매 차감 상쇄 (REFUND, 한 번만)
/// 5. 전이에서 이긴 쪽만 프로모션 사용 횟수 반환
///
/// 전이에서 졌더라도 주문이 이미 CANCELLED 이면 2~4 단계를 다시 수행한다.
/// 각 단계는 멱등이므로 중복 실행해도 결과는 같다.
/// 주문이 COMPLETED 이면 아무것도 되돌리지 않는다.
impl FulfillmentService {
    /// 보상 실행
    ///
    /// # Returns
    /// * `Ok(true)` - 이번 호출이 주문을 CANCELLED 로 전이함
    /// * `Ok(false)` - 이미 취소됐거나(재정리만 수행) 완료된 주문
    /// * `Err(FulfillmentError)` - 어느 단계든 실패 (나머지 단계는 계속 시도함)
    #[tracing::instrument(skip(self, order), fields(order_id = %order.id))]
    pub async fn compensate(&self, order: &Order, reason: &str) -> Result<bool, FulfillmentError> {
        let won = self
            .orders
            .transition(
                order.id,
                &[OrderStatus::Pending, OrderStatus::Processing],
                OrderStatus::Cancelled,
                Some(reason),
            )
            .await?;

        if !won {
            let current = self.orders.get(order.id).await?.map(|d| d.order.status);
            if current != Some(OrderStatus::Cancelled) {
                tracing::info!(status = ?current, "order not cancellable, nothing to undo");
                return Ok(false);
            }
        }

        let mut first_error: Option<FulfillmentError> = None;

        // 예약 해제
        match self.gateway.for_order(order.id).await {
            Ok(reservations) => {
                for reservation in reservations.iter().filter(|r| !r.status.is_terminal()) {
                    if let Err(e) = self.gateway.release(reservation.id).await {
                        tracing::warn!(reservation_id = %reservation.id, error = %e, "release failed");
                        first_error.get_or_insert(e);
                    }
                }
            }
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }

        // 로컬 키 반납
        match self.keys.unclaim_order(order.id).await {
            Ok(returned) if returned > 0 => tracing::info!(returned, "local keys returned to pool"),
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, "failed to return local keys");
                first_error.get_or_insert(e.into());
            }
        }

        // 구매 차감 상쇄
        match self.ledger.purchase_for(order.id).await {
            Ok(Some(purchase)) => {
                match self
                    .ledger
                    .reverse(&purchase, &format!("Order {} cancelled: {}", order.id, reason))
                    .await
                {
                    Ok(ReverseOutcome::Reversed(entry)) => {
                        tracing::info!(refund_id = %entry.id, amount = %entry.amount, "purchase reversed");
                    }
                    Ok(ReverseOutcome::AlreadyReversed) => {}
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to reverse purchase");
                        first_error.get_or_insert(e);
                    }
                }
            }
            Ok(None) => {}
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }

        if won {
            if let Some(code) = &order.promo_code {
                self.unredeem_promo(code).await;
            }
            tracing::info!(reason, "order cancelled");
        }

        invalidate_best_effort(self.cache.as_ref(), &keys::after_order_change(order.user_id)).await;

        match first_error {
            Some(e) => Err(e),
            None => Ok(won),
        }
    }

    /// 결제 경로용: 실패를 로그로만 남긴다 (원래 에러를 돌려줘야 하므로)
    pub(super) async fn compensate_logged(&self, order: &Order, reason: &str) {
        if let Err(e) = self.compensate(order, reason).await {
            tracing::error!(
                order_id = %order.id,
                user_id = order.user_id,
                reason,
                error = %e,
                "compensation incomplete; cancel the order again to finish cleanup"
            );
        }
    }

    pub(super) async fn unredeem_promo(&self, code: &str) {
        if let Err(e) = self.catalog.unredeem_promo(code).await {
            tracing::warn!(code, error = %e, "failed to return promo code use");
        }
    }

    /// 주문 취소
    /// Cancel an order that has not completed
    ///
    /// `requester` 가 있으면 본인 주문만 취소 가능 (관리자는 `None`).
    /// 이미 취소된 주문은 남은 정리를 다시 수행하고 현재 상태를 돌려준다.
    ///
    /// # Errors
    /// * `OrderNotFound` - 없는 주문 또는 다른 사용자의 주문
    /// * `InvalidOrderState` - COMPLETED 주문 (환불을 사용해야 함)
    pub async fn cancel_order(
        &self,
        order_id: Uuid,
        reason: &str,
        requester: Option<u64>,
    ) -> Result<OrderDetails, FulfillmentError> {
        let details = self
            .orders
            .get(order_id)
            .await?
            .filter(|d| requester.is_none_or(|user_id| d.order.user_id == user_id))
            .ok_or(FulfillmentError::OrderNotFound { order_id })?;

        if details.order.status == OrderStatus::Completed {
            return Err(FulfillmentError::InvalidOrderState {
                order_id,
                status: details.order.status.to_string(),
                action: "cancel",
            });
        }

        self.compensate(&details.order, reason).await?;

        let current = self
            .orders
            .get(order_id)
            .await?
            .ok_or(FulfillmentError::OrderNotFound { order_id })?;

        if current.order.status != OrderStatus::Cancelled {
            // 결제 경로가 먼저 완료함
            return Err(FulfillmentError::InvalidOrderState {
                order_id,
                status: current.order.status.to_string(),
                action: "cancel",
            });
        }

        Ok(current)
    }
}
