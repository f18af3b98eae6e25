use std::sync::Arc;

use crate::domains::admin::services::{AdminService, AdminState};
use crate::domains::auth::services::JwtService;
use crate::domains::ledger::services::{BalanceService, Ledger, LedgerService, LedgerState};
use crate::domains::orders::services::{
    FulfillmentService, FulfillmentSettings, OrdersState, RefundService,
};
use crate::domains::reservation::services::{
    ReservationGateway, ReservationSweeper, SupplierReservationGateway,
};
use crate::shared::cache::CacheInvalidator;
use crate::shared::clients::SupplierApi;
use crate::shared::config::Config;
use crate::shared::database::{
    CatalogRepository, CatalogStore, Database, GameKeyRepository, KeyPool, LedgerRepository,
    LedgerStore, MemoryStore, OrderRepository, OrderStore, ReservationRepository,
    ReservationStore,
};

/// 저장소 묶음
/// Storage backends behind the store traits
#[derive(Clone)]
pub struct Stores {
    pub ledger: Arc<dyn LedgerStore>,
    pub orders: Arc<dyn OrderStore>,
    pub reservations: Arc<dyn ReservationStore>,
    pub catalog: Arc<dyn CatalogStore>,
    pub keys: Arc<dyn KeyPool>,
}

impl Stores {
    /// PostgreSQL 저장소
    pub fn postgres(db: &Database) -> Self {
        let pool = db.pool().clone();
        Self {
            ledger: Arc::new(LedgerRepository::new(pool.clone())),
            orders: Arc::new(OrderRepository::new(pool.clone())),
            reservations: Arc::new(ReservationRepository::new(pool.clone())),
            catalog: Arc::new(CatalogRepository::new(pool.clone())),
            keys: Arc::new(GameKeyRepository::new(pool)),
        }
    }

    /// In-memory 저장소 (테스트용)
    pub fn memory(store: Arc<MemoryStore>) -> Self {
        Self {
            ledger: store.clone(),
            orders: store.clone(),
            reservations: store.clone(),
            catalog: store.clone(),
            keys: store,
        }
    }
}

/// Application state (combines all domain states)
/// 애플리케이션 상태 (모든 도메인 상태를 조합)
///
/// 각 도메인의 State를 조합하여 전체 애플리케이션 상태를 관리.
/// 원장, 예약 게이트웨이, 캐시는 trait object 로 생성자에서 주입한다.
#[derive(Clone)]
pub struct AppState {
    pub ledger_state: LedgerState,
    pub orders_state: OrdersState,
    pub admin_state: AdminState,
    pub gateway: Arc<dyn ReservationGateway>,
    pub jwt_service: JwtService,
    pub cache: Arc<dyn CacheInvalidator>,
    /// 예약 만료 스위퍼 (시작은 main 에서)
    pub sweeper: ReservationSweeper,
}

impl AppState {
    /// 모든 도메인 State를 초기화하고 조합
    pub fn new(
        config: &Config,
        stores: Stores,
        supplier: Arc<dyn SupplierApi>,
        cache: Arc<dyn CacheInvalidator>,
    ) -> Self {
        // 1. 공유 서비스 생성
        let jwt_service = JwtService::new(&config.jwt_secret);

        let ledger: Arc<dyn Ledger> = Arc::new(LedgerService::new(
            stores.ledger.clone(),
            config.ledger_retry(),
            config.currency.clone(),
        ));

        let gateway: Arc<dyn ReservationGateway> = Arc::new(SupplierReservationGateway::new(
            supplier,
            stores.reservations.clone(),
            config.supplier.retry(),
            chrono::Duration::milliseconds(config.supplier.hold_safety_margin_ms),
        ));

        // 2. 각 도메인 State 생성
        let balance_service = BalanceService::new(
            ledger.clone(),
            cache.clone(),
            config.currency.clone(),
            config.max_top_up,
        );
        let ledger_state = LedgerState::new(ledger.clone(), balance_service);

        let fulfillment_service = FulfillmentService::new(
            ledger.clone(),
            gateway.clone(),
            cache.clone(),
            stores.orders.clone(),
            stores.catalog.clone(),
            stores.keys.clone(),
            FulfillmentSettings {
                currency: config.currency.clone(),
                max_line_quantity: config.max_line_quantity,
                rereserve_attempts: config.supplier.rereserve_attempts,
            },
        );
        let refund_service = RefundService::new(ledger.clone(), stores.orders.clone(), cache.clone());
        let orders_state = OrdersState::new(fulfillment_service.clone(), refund_service.clone());

        let admin_service = AdminService::new(
            ledger,
            gateway.clone(),
            cache.clone(),
            stores.orders.clone(),
            stores.reservations.clone(),
            fulfillment_service,
            refund_service,
        );
        let admin_state = AdminState::new(admin_service);

        let sweeper = ReservationSweeper::new(
            gateway.clone(),
            std::time::Duration::from_secs(config.reservation_sweep_secs.max(1)),
        );

        // 3. AppState 조합
        Self {
            ledger_state,
            orders_state,
            admin_state,
            gateway,
            jwt_service,
            cache,
            sweeper,
        }
    }
}
