use std::sync::Arc;

use uuid::Uuid;

use crate::domains::ledger::models::LedgerEntryKind;
use crate::domains::ledger::services::{validate_amount, Ledger};
use crate::domains::orders::models::{OrderStatus, RefundRequest, RefundResult};
use crate::shared::cache::{invalidate_best_effort, keys, CacheInvalidator};
use crate::shared::database::OrderStore;
use crate::shared::errors::FulfillmentError;

/// 완료 주문 환불 서비스
/// Refunds (full or partial) for COMPLETED orders
///
/// 키는 회수하지 않고 주문 상태도 바꾸지 않는다.
/// 누적 환불액 상한은 `orders.refunded_amount` 조건부 갱신으로 지킨다.
#[derive(Clone)]
pub struct RefundService {
    ledger: Arc<dyn Ledger>,
    orders: Arc<dyn OrderStore>,
    cache: Arc<dyn CacheInvalidator>,
}

impl RefundService {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        orders: Arc<dyn OrderStore>,
        cache: Arc<dyn CacheInvalidator>,
    ) -> Self {
        Self {
            ledger,
            orders,
            cache,
        }
    }

    /// 환불 처리
    ///
    /// # Arguments
    /// * `order_id` - 주문 ID
    /// * `request` - 금액 (생략 시 남은 환불 가능 금액 전체) + 사유
    ///
    /// # Errors
    /// * `OrderNotFound` - 없는 주문
    /// * `InvalidOrderState` - COMPLETED 가 아닌 주문
    /// * `RefundExceedsTotal` - 누적 환불액이 결제 금액을 넘음
    /// * `InvalidAmount` - 0 이하 또는 소수점 자리 초과
    #[tracing::instrument(skip(self, request), fields(amount = tracing::field::Empty))]
    pub async fn refund(
        &self,
        order_id: Uuid,
        request: RefundRequest,
    ) -> Result<RefundResult, FulfillmentError> {
        let details = self
            .orders
            .get(order_id)
            .await?
            .ok_or(FulfillmentError::OrderNotFound { order_id })?;
        let order = details.order;

        if order.status != OrderStatus::Completed {
            return Err(FulfillmentError::InvalidOrderState {
                order_id,
                status: order.status.to_string(),
                action: "refund",
            });
        }

        let refundable = order.refundable();
        if refundable.is_zero() {
            // 이미 전액 환불됨
            return Err(FulfillmentError::RefundExceedsTotal {
                requested: request.amount.unwrap_or(refundable),
                refundable,
            });
        }
        let amount = request.amount.unwrap_or(refundable);
        if amount > refundable {
            return Err(FulfillmentError::RefundExceedsTotal {
                requested: amount,
                refundable,
            });
        }
        validate_amount(amount)?;
        tracing::Span::current().record("amount", tracing::field::display(amount));

        // 상한 선점 (동시 환불끼리 경쟁)
        let Some(refunded_total) = self.orders.add_refund(order_id, amount).await? else {
            let refundable = match self.orders.get(order_id).await? {
                Some(current) => current.order.refundable(),
                None => return Err(FulfillmentError::OrderNotFound { order_id }),
            };
            return Err(FulfillmentError::RefundExceedsTotal {
                requested: amount,
                refundable,
            });
        };

        let reason = format!("Refund for order {}: {}", order_id, request.reason.trim());
        let entry = match self
            .ledger
            .credit(order.user_id, amount, LedgerEntryKind::Refund, &reason, Some(order_id))
            .await
        {
            Ok(entry) => entry,
            Err(e) => {
                if let Err(revert) = self.orders.revert_refund(order_id, amount).await {
                    tracing::error!(
                        %order_id,
                        %amount,
                        error = %revert,
                        "failed to revert refund cap after ledger failure"
                    );
                }
                return Err(e);
            }
        };

        tracing::info!(
            %order_id,
            user_id = order.user_id,
            %amount,
            %refunded_total,
            transaction_id = %entry.id,
            "order refunded"
        );

        invalidate_best_effort(self.cache.as_ref(), &keys::after_order_change(order.user_id)).await;

        let balance_after = entry.balance_after.unwrap_or_default();
        Ok(RefundResult {
            transaction_id: entry.id,
            order_id,
            amount,
            status: entry.status,
            balance_before: balance_after - entry.amount,
            balance_after,
            refunded_total,
        })
    }
}
