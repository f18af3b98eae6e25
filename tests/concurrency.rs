// =====================================================
// 동시성 통합 테스트
// =====================================================

mod common;
use common::*;

use std::collections::HashSet;

use rust_decimal::Decimal;

use keyshop_api::domains::ledger::models::{LedgerEntryKind, LedgerEntryStatus, TransactionFilter};
use keyshop_api::domains::orders::models::OrderStatus;
use keyshop_api::shared::database::LedgerStore;
use keyshop_api::shared::errors::FulfillmentError;

/// 완료된 원장 항목 합계 (저장소 집계)
async fn settled_sum(app: &TestApp, user_id: u64) -> Decimal {
    LedgerStore::completed_sum(&*app.store, user_id)
        .await
        .unwrap()
}

/// 테스트: 이중 지출 방지
///
/// 잔고 50 인 사용자가 20 짜리 결제를 동시에 10 번 요청하면
/// 정확히 2 건만 성공하고 잔고는 10 이 남아야 합니다.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_checkouts_never_overspend() {
    let app = setup_test();
    app.fund(TEST_USER_ID, "50.00").await;
    let local = app.local_game("20.00", 20);

    let mut handles = Vec::new();
    for _ in 0..10 {
        let service = app.state.orders_state.fulfillment_service.clone();
        let request = cart(&[(local, 1)]);
        handles.push(tokio::spawn(async move {
            service.checkout(TEST_USER_ID, request).await
        }));
    }

    let mut completed = 0;
    let mut rejected = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(details) => {
                assert_eq!(details.order.status, OrderStatus::Completed);
                completed += 1;
            }
            Err(FulfillmentError::InsufficientFunds { .. }) => rejected += 1,
            Err(e) => panic!("unexpected error: {:?}", e),
        }
    }

    assert_eq!(completed, 2);
    assert_eq!(rejected, 8);
    assert_eq!(app.balance(TEST_USER_ID).await, eur("10.00"));
    assert_eq!(settled_sum(&app, TEST_USER_ID).await, eur("10.00"));
}

/// 테스트: 같은 키가 두 주문에 배정되지 않음
///
/// 키 5 개에 2 개씩 사려는 사용자 6 명: 최대 2 건 성공,
/// 실패한 사용자는 재고 부족 + 잔고 원상 복구.
/// 동시 할당이 엇갈리면 성공이 2 건보다 적을 수 있다.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_checkouts_never_share_a_key() {
    let app = setup_test();
    let local = app.local_game("3.00", 5);

    let buyers: Vec<u64> = (10..16).collect();
    for user_id in &buyers {
        app.store.add_user(*user_id);
        app.fund(*user_id, "10.00").await;
    }

    let mut handles = Vec::new();
    for user_id in buyers.clone() {
        let service = app.state.orders_state.fulfillment_service.clone();
        let request = cart(&[(local, 2)]);
        handles.push(tokio::spawn(async move {
            (user_id, service.checkout(user_id, request).await)
        }));
    }

    let mut keys = HashSet::new();
    let mut winners = 0;
    for handle in handles {
        let (user_id, result) = handle.await.unwrap();
        match result {
            Ok(details) => {
                winners += 1;
                assert_eq!(details.keys.len(), 2);
                for key in details.keys {
                    assert!(keys.insert(key.key), "key handed out twice");
                }
                assert_eq!(app.balance(user_id).await, eur("4.00"));
            }
            Err(FulfillmentError::OutOfStock { .. }) => {
                assert_eq!(app.balance(user_id).await, eur("10.00"));
            }
            Err(e) => panic!("unexpected error: {:?}", e),
        }
    }

    assert!(winners <= 2);
    assert_eq!(keys.len(), winners * 2);
}

/// 테스트: 잔고가 딱 한 건 값일 때 동시 결제 2 건
///
/// 하나는 COMPLETED, 하나는 잔고 부족으로 CANCELLED 되어야 합니다.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_exact_balance_allows_only_one_of_two_checkouts() {
    let app = setup_test();
    app.fund(TEST_USER_ID, "25.00").await;
    let local = app.local_game("25.00", 4);

    let mut handles = Vec::new();
    for _ in 0..2 {
        let service = app.state.orders_state.fulfillment_service.clone();
        let request = cart(&[(local, 1)]);
        handles.push(tokio::spawn(async move {
            service.checkout(TEST_USER_ID, request).await
        }));
    }

    let mut completed = 0;
    let mut rejected = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => completed += 1,
            Err(FulfillmentError::InsufficientFunds { .. }) => rejected += 1,
            Err(e) => panic!("unexpected error: {:?}", e),
        }
    }
    assert_eq!((completed, rejected), (1, 1));

    let mut statuses: Vec<OrderStatus> = app
        .state
        .orders_state
        .fulfillment_service
        .list_orders(TEST_USER_ID)
        .await
        .unwrap()
        .into_iter()
        .map(|order| order.status)
        .collect();
    statuses.sort_by_key(|status| status.to_string());
    assert_eq!(statuses, vec![OrderStatus::Cancelled, OrderStatus::Completed]);

    assert_eq!(app.balance(TEST_USER_ID).await, Decimal::ZERO);
    assert_eq!(settled_sum(&app, TEST_USER_ID).await, Decimal::ZERO);
}

/// 테스트: 키 N 개에 1 개짜리 주문 N+1 건
///
/// 정확히 N 건 성공, 1 건 재고 부족, 배정된 키는 모두 다름.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_n_keys_n_plus_one_single_unit_orders() {
    const KEYS: usize = 5;
    let app = setup_test();
    let local = app.local_game("3.00", KEYS);

    let buyers: Vec<u64> = (20..20 + KEYS as u64 + 1).collect();
    for user_id in &buyers {
        app.store.add_user(*user_id);
        app.fund(*user_id, "10.00").await;
    }

    let mut handles = Vec::new();
    for user_id in buyers.clone() {
        let service = app.state.orders_state.fulfillment_service.clone();
        let request = cart(&[(local, 1)]);
        handles.push(tokio::spawn(async move {
            (user_id, service.checkout(user_id, request).await)
        }));
    }

    let mut keys = HashSet::new();
    let mut out_of_stock = 0;
    for handle in handles {
        let (user_id, result) = handle.await.unwrap();
        match result {
            Ok(details) => {
                assert_eq!(details.keys.len(), 1);
                assert!(keys.insert(details.keys[0].key.clone()), "key handed out twice");
                assert_eq!(app.balance(user_id).await, eur("7.00"));
            }
            Err(FulfillmentError::OutOfStock { .. }) => {
                out_of_stock += 1;
                assert_eq!(app.balance(user_id).await, eur("10.00"));
            }
            Err(e) => panic!("unexpected error: {:?}", e),
        }
    }

    assert_eq!(keys.len(), KEYS);
    assert_eq!(out_of_stock, 1);
}

/// 테스트: 잔고 = 완료 항목 합계 (혼합 부하 이후)
///
/// 실패한 결제와 부분 환불이 섞여도 성립해야 합니다.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_balance_matches_settled_entries_under_mixed_load() {
    let app = setup_test();
    app.fund(TEST_USER_ID, "30.00").await;
    let local = app.local_game("7.50", 30);
    let remote = app.supplier_game("4.00", 100);

    let mut handles = Vec::new();
    for i in 0..12 {
        let service = app.state.orders_state.fulfillment_service.clone();
        let request = if i % 2 == 0 {
            cart(&[(local, 1)])
        } else {
            cart(&[(remote, 1), (local, 1)])
        };
        handles.push(tokio::spawn(async move {
            service.checkout(TEST_USER_ID, request).await
        }));
    }

    let mut orders = Vec::new();
    for handle in handles {
        if let Ok(details) = handle.await.unwrap() {
            orders.push(details.order);
        }
    }
    assert!(!orders.is_empty());

    // 첫 완료 주문을 일부 환불
    app.state
        .orders_state
        .refund_service
        .refund(
            orders[0].id,
            keyshop_api::domains::orders::models::RefundRequest {
                amount: Some(eur("1.25")),
                reason: "partial".to_string(),
            },
        )
        .await
        .unwrap();

    let balance = app.balance(TEST_USER_ID).await;
    assert!(balance >= Decimal::ZERO);
    assert_eq!(balance, settled_sum(&app, TEST_USER_ID).await);

    let purchases = app
        .state
        .ledger_state
        .ledger
        .transactions(&TransactionFilter {
            user_id: Some(TEST_USER_ID),
            kind: Some(LedgerEntryKind::Purchase),
            status: Some(LedgerEntryStatus::Completed),
            limit: Some(500),
            ..TransactionFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(purchases.len(), orders.len());
}
