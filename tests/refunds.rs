// =====================================================
// 환불 통합 테스트
// =====================================================

mod common;
use common::*;

use uuid::Uuid;

use keyshop_api::domains::ledger::models::{LedgerEntryKind, LedgerEntryStatus, TransactionFilter};
use keyshop_api::domains::orders::models::{OrderDetails, OrderStatus, RefundRequest};
use keyshop_api::shared::errors::FulfillmentError;

fn refund_of(amount: Option<&str>, reason: &str) -> RefundRequest {
    RefundRequest {
        amount: amount.map(eur),
        reason: reason.to_string(),
    }
}

/// 20.00 짜리 완료 주문 하나 (잔고 30 -> 10)
async fn completed_order(app: &TestApp) -> OrderDetails {
    app.fund(TEST_USER_ID, "30.00").await;
    let local = app.local_game("20.00", 3);
    app.state
        .orders_state
        .fulfillment_service
        .checkout(TEST_USER_ID, cart(&[(local, 1)]))
        .await
        .expect("checkout succeeds")
}

/// 테스트: 부분 환불 후 나머지 전액 환불
///
/// 주문은 COMPLETED 로 남고 키도 회수하지 않습니다.
#[tokio::test]
async fn test_partial_then_remaining_refund() {
    let app = setup_test();
    let details = completed_order(&app).await;
    let order_id = details.order.id;
    let admin = &app.state.admin_state.admin_service;

    let first = admin
        .refund(order_id, refund_of(Some("5.00"), "late delivery"))
        .await
        .unwrap();
    assert_eq!(first.amount, eur("5.00"));
    assert_eq!(first.status, LedgerEntryStatus::Completed);
    assert_eq!(first.balance_before, eur("10.00"));
    assert_eq!(first.balance_after, eur("15.00"));
    assert_eq!(first.refunded_total, eur("5.00"));

    // 금액 생략 = 남은 전액
    let rest = admin.refund(order_id, refund_of(None, "goodwill")).await.unwrap();
    assert_eq!(rest.amount, eur("15.00"));
    assert_eq!(rest.refunded_total, eur("20.00"));
    assert_eq!(app.balance(TEST_USER_ID).await, eur("30.00"));

    match admin.refund(order_id, refund_of(Some("0.01"), "one more")).await {
        Err(FulfillmentError::RefundExceedsTotal { requested, refundable }) => {
            assert_eq!(requested, eur("0.01"));
            assert_eq!(refundable, eur("0"));
        }
        other => panic!("unexpected result: {:?}", other),
    }

    let order = app
        .state
        .orders_state
        .fulfillment_service
        .get_order(TEST_USER_ID, order_id)
        .await
        .unwrap();
    assert_eq!(order.order.status, OrderStatus::Completed);
    assert_eq!(order.order.refunded_amount, eur("20.00"));
    assert_eq!(order.keys.len(), 1);
    assert_eq!(app.store.claimed_keys(order_id).len(), 1);

    let refunds = admin
        .transactions(&TransactionFilter {
            order_id: Some(order_id),
            kind: Some(LedgerEntryKind::Refund),
            ..TransactionFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(refunds.len(), 2);
    assert!(refunds.iter().all(|e| e.description.contains("Refund for order")));

    assert!(app
        .cache
        .invalidated()
        .iter()
        .any(|pattern| pattern.starts_with("admin")));
}

/// 테스트: 결제 금액을 넘는 환불 거부
#[tokio::test]
async fn test_refund_over_total_is_rejected() {
    let app = setup_test();
    let details = completed_order(&app).await;

    let result = app
        .state
        .orders_state
        .refund_service
        .refund(details.order.id, refund_of(Some("20.01"), "too much"))
        .await;

    assert!(matches!(result, Err(FulfillmentError::RefundExceedsTotal { .. })));
    assert_eq!(app.balance(TEST_USER_ID).await, eur("10.00"));
}

/// 테스트: 전액 환불된 주문에 금액 없이 다시 환불
///
/// 남은 금액이 0 이므로 REFUND_EXCEEDS_TOTAL 이어야 합니다.
#[tokio::test]
async fn test_default_refund_of_fully_refunded_order_exceeds_total() {
    let app = setup_test();
    let details = completed_order(&app).await;
    let refunds = &app.state.orders_state.refund_service;

    refunds
        .refund(details.order.id, refund_of(None, "full"))
        .await
        .unwrap();
    assert_eq!(app.balance(TEST_USER_ID).await, eur("30.00"));

    match refunds.refund(details.order.id, refund_of(None, "again")).await {
        Err(FulfillmentError::RefundExceedsTotal { requested, refundable }) => {
            assert_eq!(requested, eur("0"));
            assert_eq!(refundable, eur("0"));
        }
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(app.balance(TEST_USER_ID).await, eur("30.00"));
}

/// 테스트: 잘못된 금액 / 없는 주문 / 취소된 주문
#[tokio::test]
async fn test_refund_rejects_invalid_requests() {
    let app = setup_test();
    let details = completed_order(&app).await;
    let refunds = &app.state.orders_state.refund_service;

    for amount in ["0", "-1.00", "1.001"] {
        assert!(
            matches!(
                refunds.refund(details.order.id, refund_of(Some(amount), "bad")).await,
                Err(FulfillmentError::InvalidAmount(_))
            ),
            "amount {} should be rejected",
            amount
        );
    }

    assert!(matches!(
        refunds.refund(Uuid::new_v4(), refund_of(None, "missing")).await,
        Err(FulfillmentError::OrderNotFound { .. })
    ));

    // 잔고 부족으로 취소된 주문
    let local = app.local_game("99.00", 1);
    let cancelled = app
        .state
        .orders_state
        .fulfillment_service
        .checkout(TEST_USER_ID, cart(&[(local, 1)]))
        .await;
    assert!(matches!(cancelled, Err(FulfillmentError::InsufficientFunds { .. })));

    let orders = app
        .state
        .orders_state
        .fulfillment_service
        .list_orders(TEST_USER_ID)
        .await
        .unwrap();
    let cancelled = orders
        .iter()
        .find(|o| o.status == OrderStatus::Cancelled)
        .expect("cancelled order listed");

    match refunds.refund(cancelled.id, refund_of(None, "nothing to refund")).await {
        Err(FulfillmentError::InvalidOrderState { action, .. }) => assert_eq!(action, "refund"),
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(app.balance(TEST_USER_ID).await, eur("10.00"));
}

/// 테스트: 동시 환불도 결제 금액을 넘지 않음
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_refunds_are_capped() {
    let app = setup_test();
    let details = completed_order(&app).await;

    let mut handles = Vec::new();
    for _ in 0..6 {
        let refunds = app.state.orders_state.refund_service.clone();
        let order_id = details.order.id;
        handles.push(tokio::spawn(async move {
            refunds.refund(order_id, refund_of(Some("7.00"), "race")).await
        }));
    }

    let mut accepted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => accepted += 1,
            Err(FulfillmentError::RefundExceedsTotal { .. }) => {}
            Err(e) => panic!("unexpected error: {:?}", e),
        }
    }

    // 7 + 7 = 14 <= 20 < 21
    assert_eq!(accepted, 2);
    assert_eq!(app.balance(TEST_USER_ID).await, eur("24.00"));
}
