use std::sync::Arc;

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use keyshop_api::routes::create_router;
use keyshop_api::shared::cache::connect_cache;
use keyshop_api::shared::clients::{G2aClient, SupplierApi};
use keyshop_api::shared::config::Config;
use keyshop_api::shared::database::Database;
use keyshop_api::shared::logging::init_logger;
use keyshop_api::shared::services::{AppState, Stores};

// Import models for OpenAPI schema
use keyshop_api::domains::ledger::models::*;
use keyshop_api::domains::orders::models::*;
use keyshop_api::domains::reservation::models::*;

// OpenAPI 스키마 정의: Swagger 문서 자동 생성
#[derive(OpenApi)]
#[openapi(
    paths(
        keyshop_api::domains::orders::handlers::order_handler::checkout,
        keyshop_api::domains::orders::handlers::order_handler::get_my_orders,
        keyshop_api::domains::orders::handlers::order_handler::get_order,
        keyshop_api::domains::orders::handlers::order_handler::cancel_order,
        keyshop_api::domains::ledger::handlers::balance_handler::get_balance,
        keyshop_api::domains::ledger::handlers::balance_handler::get_history,
        keyshop_api::domains::ledger::handlers::balance_handler::top_up,
        keyshop_api::domains::admin::handlers::admin_handler::get_transactions,
        keyshop_api::domains::admin::handlers::admin_handler::refund_order,
        keyshop_api::domains::admin::handlers::admin_handler::cancel_order,
        keyshop_api::domains::admin::handlers::admin_handler::adjust_balance,
        keyshop_api::domains::admin::handlers::admin_handler::get_reservations,
        keyshop_api::domains::admin::handlers::admin_handler::cancel_reservation,
        keyshop_api::domains::admin::handlers::admin_handler::get_stats
    ),
    components(schemas(
        CartItem,
        CheckoutRequest,
        CancelOrderRequest,
        RefundRequest,
        RefundResult,
        Order,
        OrderStatus,
        OrderItem,
        OrderDetails,
        OrderListResponse,
        OrderStats,
        AssignedKey,
        KeySource,
        LedgerEntry,
        LedgerEntryKind,
        LedgerEntryStatus,
        BalanceResponse,
        LedgerHistoryResponse,
        TopUpRequest,
        BalanceChangeResponse,
        BalanceAdjustmentRequest,
        TransactionsResponse,
        Reservation,
        ReservationStatus,
        ReservationListResponse,
        ReleaseOutcome,
        ReleaseResponse
    )),
    modifiers(
        &SecurityAddon
    ),
    tags(
        (name = "Orders", description = "Checkout and order endpoints"),
        (name = "Balance", description = "Balance and ledger history endpoints"),
        (name = "Admin", description = "Back-office endpoints (admin role required)")
    ),
    info(
        title = "Keyshop API Server",
        description = "Payment and fulfillment engine for the game-key storefront",
        version = "1.0.0"
    )
)]
struct ApiDoc;

// Security scheme 정의: Swagger UI에서 "Authorize" 버튼 추가
struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "BearerAuth",
                utoipa::openapi::security::SecurityScheme::Http(
                    utoipa::openapi::security::HttpBuilder::new()
                        .scheme(utoipa::openapi::security::HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            )
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let config = Config::from_env();
    init_logger(&config.log_level, config.log_json)?;

    // DB 연결
    let db = Database::connect(&config).await?;
    db.initialize().await?;

    // 캐시 (없거나 연결 실패 시 no-op)
    let cache = connect_cache(config.redis_url.as_deref()).await;

    // 공급사 클라이언트
    let supplier: Arc<dyn SupplierApi> = Arc::new(G2aClient::new(&config.supplier)?);

    // AppState 생성 (모든 Service 초기화)
    let app_state = AppState::new(&config, Stores::postgres(&db), supplier, cache);

    // 예약 만료 스위퍼 시작
    let _sweeper = app_state.sweeper.start();

    // CORS 설정
    let origin = config
        .cors_origin
        .parse::<HeaderValue>()
        .with_context(|| format!("invalid CORS_ORIGIN: {}", config.cors_origin))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
            axum::http::header::ACCEPT,
        ])
        .allow_credentials(true);

    // Router 생성
    let app = Router::new()
        .merge(create_router())
        .merge(
            SwaggerUi::new("/swagger-ui")
                .url("/api-docs/openapi.json", ApiDoc::openapi())
        )
        .layer(cors)
        .with_state(app_state);

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(addr = %config.bind_addr, "server running");
    tracing::info!("Swagger UI available at /swagger-ui");

    // 서버 실행
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
