use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::domains::ledger::models::{DebitOutcome, LedgerEntryKind};
use crate::domains::ledger::services::Ledger;
use crate::domains::orders::models::{
    AssignedKey, CheckoutRequest, KeySource, NewOrder, Order, OrderDetails, OrderItem, OrderStatus,
    Quote, QuotedLine,
};
use crate::domains::orders::services::CartValidator;
use crate::domains::reservation::models::{Reservation, ReservationStatus};
use crate::domains::reservation::services::ReservationGateway;
use crate::shared::cache::{invalidate_best_effort, keys, CacheInvalidator};
use crate::shared::database::{CatalogStore, KeyPool, OrderStore};
use crate::shared::errors::FulfillmentError;

/// 주문 처리 설정
#[derive(Debug, Clone)]
pub struct FulfillmentSettings {
    pub currency: String,
    pub max_line_quantity: u32,
    /// 만료된 홀드를 다시 예약하는 최대 횟수
    pub rereserve_attempts: u32,
}

impl Default for FulfillmentSettings {
    fn default() -> Self {
        Self {
            currency: "EUR".to_string(),
            max_line_quantity: 10,
            rereserve_attempts: 1,
        }
    }
}

/// 주문 처리 오케스트레이터
/// Order fulfillment orchestrator
///
/// 처리 흐름 (checkout):
/// 1. 장바구니 검증 (가격/재고/프로모션)
/// 2. 주문 생성 (PENDING)
/// 3. 원장 차감 (PENDING -> PROCESSING)
/// 4. 공급사 라인 예약
/// 5. 예약 확정 + 로컬 키 할당
/// 6. 커밋 (PROCESSING -> COMPLETED, 라인/키 저장)
/// 7. 캐시 무효화
///
/// 차감 이후의 어떤 실패든 에러를 돌려주기 전에 보상(compensation)을 수행한다.
/// 보상은 CANCELLED 전이를 먼저 잡고 나서 자원을 되돌린다 (`compensation.rs`).
/// 저장소 트랜잭션은 공급사 호출 동안 열려 있지 않다.
#[derive(Clone)]
pub struct FulfillmentService {
    pub(super) ledger: Arc<dyn Ledger>,
    pub(super) gateway: Arc<dyn ReservationGateway>,
    pub(super) cache: Arc<dyn CacheInvalidator>,
    pub(super) orders: Arc<dyn OrderStore>,
    pub(super) catalog: Arc<dyn CatalogStore>,
    pub(super) keys: Arc<dyn KeyPool>,
    validator: CartValidator,
    settings: FulfillmentSettings,
}

impl FulfillmentService {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        gateway: Arc<dyn ReservationGateway>,
        cache: Arc<dyn CacheInvalidator>,
        orders: Arc<dyn OrderStore>,
        catalog: Arc<dyn CatalogStore>,
        keys: Arc<dyn KeyPool>,
        settings: FulfillmentSettings,
    ) -> Self {
        let validator = CartValidator::new(
            catalog.clone(),
            keys.clone(),
            settings.currency.clone(),
            settings.max_line_quantity,
        );
        Self {
            ledger,
            gateway,
            cache,
            orders,
            catalog,
            keys,
            validator,
            settings,
        }
    }

    /// 결제 (장바구니 -> 완료된 주문)
    /// Checkout: turn a cart into a completed order
    ///
    /// # Returns
    /// * `Ok(OrderDetails)` - COMPLETED 주문, 라인, 지급된 키
    /// * `Err(FulfillmentError)` - 실패 종류별 에러 (차감이 있었다면 이미 보상됨)
    #[tracing::instrument(skip(self, request), fields(order_id = tracing::field::Empty))]
    pub async fn checkout(
        &self,
        user_id: u64,
        request: CheckoutRequest,
    ) -> Result<OrderDetails, FulfillmentError> {
        // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
        // 1. Validate
        // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
        let quote = self.validator.quote(&request).await?;
        let promo_code = quote.promo.as_ref().map(|p| p.code.clone());

        // 프로모션 사용 횟수는 주문을 열기 전에 선점한다
        if let Some(code) = &promo_code {
            if !self.catalog.redeem_promo(code, Utc::now()).await? {
                return Err(FulfillmentError::InvalidPromoCode { code: code.clone() });
            }
        }

        // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
        // 2. Open
        // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
        let order = match self
            .orders
            .create(NewOrder {
                user_id,
                total: quote.total,
                discount: quote.discount,
                currency: self.settings.currency.clone(),
                promo_code: promo_code.clone(),
            })
            .await
        {
            Ok(order) => order,
            Err(e) => {
                if let Some(code) = &promo_code {
                    self.unredeem_promo(code).await;
                }
                return Err(e.into());
            }
        };
        tracing::Span::current().record("order_id", tracing::field::display(order.id));
        tracing::info!(order_id = %order.id, user_id, total = %order.total, "order opened");

        // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
        // 3. Debit
        // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
        if !self
            .orders
            .transition(order.id, &[OrderStatus::Pending], OrderStatus::Processing, None)
            .await?
        {
            // 관리자가 PENDING 주문을 먼저 취소함
            return Err(self.cancelled_meanwhile(&order, "process").await);
        }

        let debit = self
            .ledger
            .debit(
                user_id,
                quote.total,
                LedgerEntryKind::Purchase,
                &format!("Order {}", order.id),
                Some(order.id),
            )
            .await;

        match debit {
            Ok(DebitOutcome::Debited(_)) => {}
            Ok(DebitOutcome::InsufficientFunds { balance, required }) => {
                self.compensate_logged(&order, "insufficient funds").await;
                return Err(FulfillmentError::InsufficientFunds { balance, required });
            }
            Err(e) => {
                // 결과가 불확실하므로 보상 경로로 정리 (차감이 없었다면 상쇄할 것도 없음)
                self.compensate_logged(&order, "payment failed").await;
                return Err(e);
            }
        }

        // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
        // 4-5. Reserve + Confirm
        // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
        let assigned = match self.acquire_keys(&order, &quote).await {
            Ok(assigned) => assigned,
            Err(e) => {
                self.compensate_logged(&order, &format!("fulfillment failed: {}", e.code()))
                    .await;
                return Err(e);
            }
        };

        // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
        // 6. Commit
        // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
        let items: Vec<OrderItem> = quote
            .lines
            .iter()
            .map(|line| OrderItem {
                game_id: line.game.id,
                quantity: line.quantity,
                price: line.unit_price,
            })
            .collect();

        match self.orders.complete(order.id, &items, &assigned).await {
            Ok(true) => {}
            Ok(false) => {
                // 동시 취소가 이김: 이번 시도에서 잡은 자원도 되돌린다
                self.compensate_logged(&order, "cancelled during fulfillment").await;
                return Err(self.cancelled_meanwhile(&order, "complete").await);
            }
            Err(e) => {
                // 커밋 결과가 불확실: 이미 COMPLETED 면 보상은 아무것도 하지 않는다
                self.compensate_logged(&order, "commit failed").await;
                match self.orders.get(order.id).await {
                    Ok(Some(details)) if details.order.status == OrderStatus::Completed => {
                        invalidate_best_effort(self.cache.as_ref(), &keys::after_order_change(user_id))
                            .await;
                        return Ok(details);
                    }
                    _ => return Err(e.into()),
                }
            }
        }

        tracing::info!(
            order_id = %order.id,
            user_id,
            total = %order.total,
            keys = assigned.len(),
            "order completed"
        );

        // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
        // 7. Invalidate
        // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
        invalidate_best_effort(self.cache.as_ref(), &keys::after_order_change(user_id)).await;

        match self.orders.get(order.id).await {
            Ok(Some(details)) => Ok(details),
            _ => Ok(OrderDetails {
                order: Order {
                    status: OrderStatus::Completed,
                    ..order
                },
                items,
                keys: assigned,
            }),
        }
    }

    /// 공급사 라인 예약/확정 + 로컬 키 할당
    async fn acquire_keys(
        &self,
        order: &Order,
        quote: &Quote,
    ) -> Result<Vec<AssignedKey>, FulfillmentError> {
        // 4. 공급사 라인을 모두 먼저 예약
        let mut holds: Vec<(&QuotedLine, Reservation)> = Vec::new();
        for line in quote
            .lines
            .iter()
            .filter(|l| l.game.key_source == KeySource::Supplier)
        {
            self.ensure_processing(order, "reserve").await?;
            let reservation = self.reserve_line(order.id, line).await?;
            holds.push((line, reservation));
        }

        // 5. 확정
        let mut keys = Vec::new();
        for (line, reservation) in holds {
            keys.extend(self.confirm_with_rereserve(order, line, reservation).await?);
        }

        for line in quote
            .lines
            .iter()
            .filter(|l| l.game.key_source == KeySource::Local)
        {
            for _ in 0..line.quantity {
                let key = self
                    .keys
                    .claim(line.game.id, order.id)
                    .await?
                    .ok_or(FulfillmentError::OutOfStock { game_id: line.game.id })?;
                keys.push(AssignedKey {
                    game_id: line.game.id,
                    key,
                    source: KeySource::Local,
                });
            }
        }

        Ok(keys)
    }

    async fn reserve_line(
        &self,
        order_id: Uuid,
        line: &QuotedLine,
    ) -> Result<Reservation, FulfillmentError> {
        let product_id = line
            .game
            .supplier_product_id
            .as_deref()
            .ok_or(FulfillmentError::OutOfStock { game_id: line.game.id })?;
        self.gateway
            .reserve(order_id, line.game.id, product_id, line.quantity)
            .await
    }

    /// 확정 시 홀드가 만료됐으면 다시 예약해서 한 번 더 시도
    ///
    /// 해제된(RELEASED) 홀드는 다시 예약하지 않는다: 취소가 이미 진행 중이다.
    async fn confirm_with_rereserve(
        &self,
        order: &Order,
        line: &QuotedLine,
        mut reservation: Reservation,
    ) -> Result<Vec<AssignedKey>, FulfillmentError> {
        let mut attempts_left = self.settings.rereserve_attempts;
        loop {
            self.ensure_processing(order, "confirm").await?;
            match self.gateway.confirm(reservation.id).await {
                Ok(keys) => return Ok(keys),
                Err(FulfillmentError::ReservationExpired { reservation_id }) if attempts_left > 0 => {
                    if !self.hold_lapsed(reservation_id).await? {
                        tracing::warn!(
                            order_id = %order.id,
                            %reservation_id,
                            "hold released before confirm, not re-reserving"
                        );
                        return Err(FulfillmentError::ReservationExpired { reservation_id });
                    }
                    tracing::info!(order_id = %order.id, %reservation_id, "hold expired before confirm, re-reserving");
                    attempts_left -= 1;
                    self.ensure_processing(order, "reserve").await?;
                    reservation = self.reserve_line(order.id, line).await?;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// 홀드가 시간 초과로 끝났는지 (EXPIRED 이거나 만료 시각 경과)
    async fn hold_lapsed(&self, reservation_id: Uuid) -> Result<bool, FulfillmentError> {
        let current = self.gateway.get(reservation_id).await?;
        Ok(match current.status {
            ReservationStatus::Expired => true,
            ReservationStatus::Held => current.is_expired_at(Utc::now()),
            ReservationStatus::Released | ReservationStatus::Confirmed => false,
        })
    }

    /// 공급사 호출 전에 주문이 아직 PROCESSING 인지 확인
    async fn ensure_processing(&self, order: &Order, action: &'static str) -> Result<(), FulfillmentError> {
        match self.orders.get(order.id).await? {
            Some(details) if details.order.status == OrderStatus::Processing => Ok(()),
            _ => {
                tracing::info!(order_id = %order.id, action, "order left PROCESSING, stopping fulfillment");
                Err(self.cancelled_meanwhile(order, action).await)
            }
        }
    }

    /// 다른 경로가 주문을 먼저 취소했을 때의 에러
    async fn cancelled_meanwhile(&self, order: &Order, action: &'static str) -> FulfillmentError {
        let status = match self.orders.get(order.id).await {
            Ok(Some(details)) => details.order.status,
            _ => OrderStatus::Cancelled,
        };
        FulfillmentError::InvalidOrderState {
            order_id: order.id,
            status: status.to_string(),
            action,
        }
    }

    /// 주문 상세 조회 (본인 주문만)
    pub async fn get_order(&self, user_id: u64, order_id: Uuid) -> Result<OrderDetails, FulfillmentError> {
        self.orders
            .get(order_id)
            .await?
            .filter(|d| d.order.user_id == user_id)
            .ok_or(FulfillmentError::OrderNotFound { order_id })
    }

    /// 내 주문 목록 (최신순)
    pub async fn list_orders(&self, user_id: u64) -> Result<Vec<Order>, FulfillmentError> {
        Ok(self.orders.list_by_user(user_id).await?)
    }
}
