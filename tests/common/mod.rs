// =====================================================
// 통합 테스트 공통 헬퍼
// =====================================================
// 목적: 모든 통합 테스트에서 공통으로 사용하는 셋업 함수 제공
//
// - MemoryStore (PostgreSQL 없이 서비스 계층 실행)
// - ScriptedSupplier (공급사 응답을 스크립트로 지정, 호출을 게이트로 멈춤)
// - RecordingCache (무효화 패턴 기록)
//
// 사용법:
// ```rust
// mod common;
// use common::*;
//
// #[tokio::test]
// async fn test_something() {
//     let app = setup_test();
//     // 테스트 코드...
// }
// ```
// =====================================================
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use tokio::sync::Notify;
use uuid::Uuid;

use keyshop_api::domains::auth::models::Claims;
use keyshop_api::domains::ledger::models::LedgerEntryKind;
use keyshop_api::domains::orders::models::{
    CartItem, CatalogGame, CheckoutRequest, KeySource, PromoCode,
};
use keyshop_api::shared::cache::{CacheError, CacheInvalidator};
use keyshop_api::shared::clients::{SupplierApi, SupplierError, SupplierHold};
use keyshop_api::shared::config::{Config, SupplierConfig};
use keyshop_api::shared::database::MemoryStore;
use keyshop_api::shared::services::{AppState, Stores};

// 테스트용 상수
pub const TEST_USER_ID: u64 = 1;
pub const OTHER_USER_ID: u64 = 2;
pub const ADMIN_USER_ID: u64 = 99;
pub const TEST_JWT_SECRET: &str = "test-secret";

/// 금액 헬퍼: eur("19.99")
pub fn eur(value: &str) -> Decimal {
    value.parse().expect("valid decimal literal")
}

// =====================================================
// ScriptedSupplier
// =====================================================

/// 스크립트 가능한 공급사
///
/// 큐에 응답이 없으면 기본 동작:
/// - reserve: 10분짜리 홀드
/// - confirm: 홀드 수량만큼 키 발급 (두 번째 confirm 은 같은 키)
/// - release: 성공
#[derive(Default)]
pub struct ScriptedSupplier {
    reserve_script: Mutex<VecDeque<Result<SupplierHold, SupplierError>>>,
    confirm_script: Mutex<VecDeque<Result<Vec<String>, SupplierError>>>,
    release_script: Mutex<VecDeque<Result<(), SupplierError>>>,
    holds: Mutex<HashMap<String, u32>>,
    released: Mutex<Vec<String>>,
    reserve_gate: Mutex<Option<Arc<SupplierGate>>>,
    confirm_gate: Mutex<Option<Arc<SupplierGate>>>,
    next_id: AtomicU32,
    pub reserve_calls: AtomicU32,
    pub confirm_calls: AtomicU32,
    pub release_calls: AtomicU32,
}

impl ScriptedSupplier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_reserve(&self, result: Result<SupplierHold, SupplierError>) {
        self.reserve_script.lock().push_back(result);
    }

    pub fn push_confirm(&self, result: Result<Vec<String>, SupplierError>) {
        self.confirm_script.lock().push_back(result);
    }

    pub fn push_release(&self, result: Result<(), SupplierError>) {
        self.release_script.lock().push_back(result);
    }

    /// 다음 reserve 호출을 게이트가 열릴 때까지 멈춘다
    pub fn gate_reserve(&self) -> Arc<SupplierGate> {
        let gate = Arc::new(SupplierGate::default());
        *self.reserve_gate.lock() = Some(gate.clone());
        gate
    }

    /// 다음 confirm 호출을 게이트가 열릴 때까지 멈춘다
    pub fn gate_confirm(&self) -> Arc<SupplierGate> {
        let gate = Arc::new(SupplierGate::default());
        *self.confirm_gate.lock() = Some(gate.clone());
        gate
    }

    /// 공급사가 해제를 확인한 홀드 ID
    pub fn released(&self) -> Vec<String> {
        self.released.lock().clone()
    }

    pub fn reserve_count(&self) -> u32 {
        self.reserve_calls.load(Ordering::SeqCst)
    }

    pub fn confirm_count(&self) -> u32 {
        self.confirm_calls.load(Ordering::SeqCst)
    }

    fn keys_for(hold_id: &str, quantity: u32) -> Vec<String> {
        (0..quantity).map(|i| format!("SUP-{}-{}", hold_id, i)).collect()
    }
}

#[async_trait]
impl SupplierApi for ScriptedSupplier {
    async fn reserve(&self, _product_id: &str, quantity: u32) -> Result<SupplierHold, SupplierError> {
        self.reserve_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.reserve_gate.lock().take();
        if let Some(gate) = gate {
            gate.hold().await;
        }
        if let Some(scripted) = self.reserve_script.lock().pop_front() {
            if let Ok(hold) = &scripted {
                self.holds.lock().insert(hold.reservation_id.clone(), quantity);
            }
            return scripted;
        }

        let id = format!("hold-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.holds.lock().insert(id.clone(), quantity);
        Ok(SupplierHold {
            reservation_id: id,
            expires_at: Some(Utc::now() + chrono::Duration::minutes(10)),
        })
    }

    async fn confirm(&self, reservation_id: &str) -> Result<Vec<String>, SupplierError> {
        self.confirm_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.confirm_gate.lock().take();
        if let Some(gate) = gate {
            gate.hold().await;
        }
        if let Some(scripted) = self.confirm_script.lock().pop_front() {
            return scripted;
        }

        let quantity = self
            .holds
            .lock()
            .get(reservation_id)
            .copied()
            .ok_or_else(|| SupplierError::NotFound(reservation_id.to_string()))?;
        Ok(Self::keys_for(reservation_id, quantity))
    }

    async fn release(&self, reservation_id: &str) -> Result<(), SupplierError> {
        self.release_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(scripted) = self.release_script.lock().pop_front() {
            scripted?;
        }
        self.holds.lock().remove(reservation_id);
        self.released.lock().push(reservation_id.to_string());
        Ok(())
    }
}

/// 공급사 호출 한 번을 붙잡아 두는 게이트
#[derive(Default)]
pub struct SupplierGate {
    entered: Notify,
    opened: Notify,
}

impl SupplierGate {
    async fn hold(&self) {
        self.entered.notify_one();
        self.opened.notified().await;
    }

    /// 호출이 게이트에 도착할 때까지 대기
    pub async fn wait_entered(&self) {
        self.entered.notified().await;
    }

    pub fn open(&self) {
        self.opened.notify_one();
    }
}

// =====================================================
// RecordingCache
// =====================================================

/// 무효화 패턴을 기록하는 캐시 (get/set_ex 도 메모리에 저장)
#[derive(Default)]
pub struct RecordingCache {
    invalidated: Mutex<Vec<String>>,
    values: Mutex<HashMap<String, String>>,
    pub fail: std::sync::atomic::AtomicBool,
}

impl RecordingCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn invalidated(&self) -> Vec<String> {
        self.invalidated.lock().clone()
    }

    pub fn value(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).cloned()
    }

    /// 이후 모든 호출을 실패시킨다
    pub fn break_backend(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), CacheError> {
        if self.fail.load(Ordering::SeqCst) {
            Err(CacheError::Backend("connection refused".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl CacheInvalidator for RecordingCache {
    async fn invalidate(&self, patterns: &[String]) -> Result<u64, CacheError> {
        self.check()?;
        self.invalidated.lock().extend(patterns.iter().cloned());
        let mut values = self.values.lock();
        let before = values.len();
        values.retain(|key, _| {
            !patterns.iter().any(|p| match p.strip_suffix('*') {
                Some(prefix) => key.starts_with(prefix),
                None => key == p,
            })
        });
        Ok((before - values.len()) as u64)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.check()?;
        Ok(self.values.lock().get(key).cloned())
    }

    async fn set_ex(&self, key: &str, value: &str, _ttl: Duration) -> Result<(), CacheError> {
        self.check()?;
        self.values.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

// =====================================================
// TestApp
// =====================================================

pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub supplier: Arc<ScriptedSupplier>,
    pub cache: Arc<RecordingCache>,
    pub state: AppState,
}

/// 테스트 설정 (백오프 0, 재시도 2회)
pub fn test_config() -> Config {
    Config {
        database_url: String::new(),
        database_max_connections: 5,
        bind_addr: "127.0.0.1:0".to_string(),
        jwt_secret: TEST_JWT_SECRET.to_string(),
        redis_url: None,
        cors_origin: "http://localhost:3003".to_string(),
        currency: "EUR".to_string(),
        max_top_up: eur("1000"),
        max_line_quantity: 10,
        ledger_max_retries: 3,
        reservation_sweep_secs: 30,
        log_level: "debug".to_string(),
        log_json: false,
        supplier: SupplierConfig {
            max_retries: 2,
            backoff_ms: 0,
            hold_safety_margin_ms: 0,
            ..SupplierConfig::default()
        },
    }
}

/// 테스트 전 초기화
///
/// 사용자 1, 2 를 잔고 0 으로 등록한다.
pub fn setup_test() -> TestApp {
    setup_with_config(test_config())
}

pub fn setup_with_config(config: Config) -> TestApp {
    let store = Arc::new(MemoryStore::new());
    store.add_user(TEST_USER_ID);
    store.add_user(OTHER_USER_ID);

    let supplier = Arc::new(ScriptedSupplier::new());
    let cache = Arc::new(RecordingCache::new());

    let state = AppState::new(
        &config,
        Stores::memory(store.clone()),
        supplier.clone(),
        cache.clone(),
    );

    TestApp {
        store,
        supplier,
        cache,
        state,
    }
}

impl TestApp {
    /// 잔고 충전 (TOP_UP)
    pub async fn fund(&self, user_id: u64, amount: &str) {
        self.state
            .ledger_state
            .ledger
            .credit(user_id, eur(amount), LedgerEntryKind::TopUp, "test funding", None)
            .await
            .expect("funding succeeds");
    }

    pub async fn balance(&self, user_id: u64) -> Decimal {
        self.state
            .ledger_state
            .ledger
            .balance(user_id)
            .await
            .expect("balance readable")
    }

    /// 로컬 키 게임 등록 (키 n 개)
    pub fn local_game(&self, price: &str, keys: usize) -> Uuid {
        let id = Uuid::new_v4();
        self.store.add_game(game(id, price, KeySource::Local, None, 0));
        self.store
            .add_keys(id, (0..keys).map(|i| format!("LOCAL-{}-{}", id, i)));
        id
    }

    /// 공급사 게임 등록
    pub fn supplier_game(&self, price: &str, stock: i64) -> Uuid {
        let id = Uuid::new_v4();
        self.store.add_game(game(
            id,
            price,
            KeySource::Supplier,
            Some(format!("g2a-{}", id)),
            stock,
        ));
        id
    }

    pub fn promo(&self, code: &str, percent: &str, max_uses: Option<i64>) {
        self.store.add_promo(PromoCode {
            code: code.to_string(),
            discount_percent: eur(percent),
            active: true,
            expires_at: None,
            max_uses,
            used_count: 0,
        });
    }
}

pub fn game(
    id: Uuid,
    price: &str,
    key_source: KeySource,
    supplier_product_id: Option<String>,
    supplier_stock: i64,
) -> CatalogGame {
    CatalogGame {
        id,
        title: format!("Game {}", id),
        price: eur(price),
        discount_percent: Decimal::ZERO,
        currency: "EUR".to_string(),
        active: true,
        key_source,
        supplier_product_id,
        supplier_stock,
    }
}

/// 장바구니 헬퍼
pub fn cart(lines: &[(Uuid, u32)]) -> CheckoutRequest {
    CheckoutRequest {
        items: lines
            .iter()
            .map(|(game_id, quantity)| CartItem {
                game_id: *game_id,
                quantity: *quantity,
                expected_price: None,
            })
            .collect(),
        promo_code: None,
    }
}

/// 테스트용 JWT 발급 (인증 서비스 대신)
pub fn token(user_id: u64, role: &str) -> String {
    let claims = Claims::new(user_id, format!("user{}@example.com", user_id), role, 1);
    jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes()),
    )
    .expect("token encodes")
}
