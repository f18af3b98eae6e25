// =====================================================
// 재고 예약 게이트웨이 통합 테스트
// =====================================================

mod common;
use common::*;

use chrono::{Duration, Utc};
use uuid::Uuid;

use keyshop_api::domains::reservation::models::{
    ReleaseOutcome, ReservationFilter, ReservationStatus,
};
use keyshop_api::shared::clients::{SupplierError, SupplierHold};
use keyshop_api::shared::errors::FulfillmentError;

/// 테스트: 확정은 멱등 (공급사 호출 1 회)
#[tokio::test]
async fn test_confirm_is_idempotent() {
    let app = setup_test();
    let game_id = Uuid::new_v4();
    let gateway = &app.state.gateway;

    let reservation = gateway
        .reserve(Uuid::new_v4(), game_id, "g2a-idem", 2)
        .await
        .unwrap();
    assert_eq!(reservation.status, ReservationStatus::Held);
    assert!(reservation.expires_at > Utc::now());

    let first = gateway.confirm(reservation.id).await.unwrap();
    let second = gateway.confirm(reservation.id).await.unwrap();

    assert_eq!(first.len(), 2);
    assert_eq!(
        first.iter().map(|k| &k.key).collect::<Vec<_>>(),
        second.iter().map(|k| &k.key).collect::<Vec<_>>()
    );
    assert!(first.iter().all(|k| k.game_id == game_id));
    assert_eq!(app.supplier.confirm_count(), 1);

    let stored = gateway.get(reservation.id).await.unwrap();
    assert_eq!(stored.status, ReservationStatus::Confirmed);
    assert_eq!(stored.delivered_keys.len(), 2);

    // 확정된 예약은 해제할 수 없다
    assert_eq!(
        gateway.release(reservation.id).await.unwrap(),
        ReleaseOutcome::AlreadyTerminal
    );
}

/// 테스트: 스위퍼가 만료된 홀드를 정리하고, 이후 확정은 실패
#[tokio::test]
async fn test_sweeper_expires_overdue_holds() {
    let app = setup_test();
    let gateway = &app.state.gateway;

    let overdue = gateway
        .reserve(Uuid::new_v4(), Uuid::new_v4(), "g2a-old", 1)
        .await
        .unwrap();
    let fresh = gateway
        .reserve(Uuid::new_v4(), Uuid::new_v4(), "g2a-new", 1)
        .await
        .unwrap();
    app.store
        .set_reservation_expiry(overdue.id, Utc::now() - Duration::seconds(5));

    assert_eq!(app.state.sweeper.sweep_once().await.unwrap(), 1);
    assert_eq!(app.state.sweeper.sweep_once().await.unwrap(), 0);

    assert_eq!(
        gateway.get(overdue.id).await.unwrap().status,
        ReservationStatus::Expired
    );
    assert_eq!(
        gateway.get(fresh.id).await.unwrap().status,
        ReservationStatus::Held
    );

    assert!(matches!(
        gateway.confirm(overdue.id).await,
        Err(FulfillmentError::ReservationExpired { .. })
    ));
    assert_eq!(app.supplier.confirm_count(), 0);
}

/// 테스트: 만료 시각이 지난 홀드는 스위퍼 없이도 확정 거부
#[tokio::test]
async fn test_confirm_rejects_lapsed_hold() {
    let app = setup_test();
    let gateway = &app.state.gateway;

    let reservation = gateway
        .reserve(Uuid::new_v4(), Uuid::new_v4(), "g2a-lapsed", 1)
        .await
        .unwrap();
    app.store
        .set_reservation_expiry(reservation.id, Utc::now() - Duration::milliseconds(1));

    assert!(matches!(
        gateway.confirm(reservation.id).await,
        Err(FulfillmentError::ReservationExpired { .. })
    ));
    assert_eq!(
        gateway.get(reservation.id).await.unwrap().status,
        ReservationStatus::Expired
    );
    assert_eq!(app.supplier.confirm_count(), 0);
}

/// 테스트: 만료 시각 없는 홀드는 저장하지 않고 공급사에 돌려준다
#[tokio::test]
async fn test_hold_without_expiry_is_abandoned() {
    let app = setup_test();
    app.supplier.push_reserve(Ok(SupplierHold {
        reservation_id: "no-expiry".to_string(),
        expires_at: None,
    }));
    let order_id = Uuid::new_v4();

    let result = app
        .state
        .gateway
        .reserve(order_id, Uuid::new_v4(), "g2a-x", 1)
        .await;

    assert!(matches!(result, Err(FulfillmentError::SupplierUnavailable(_))));
    assert_eq!(app.supplier.released(), vec!["no-expiry".to_string()]);
    assert!(app.state.gateway.for_order(order_id).await.unwrap().is_empty());
}

/// 테스트: 안전 마진보다 짧은 홀드도 거부
#[tokio::test]
async fn test_hold_shorter_than_safety_margin_is_abandoned() {
    let mut config = test_config();
    config.supplier.hold_safety_margin_ms = 60_000;
    let app = setup_with_config(config);

    app.supplier.push_reserve(Ok(SupplierHold {
        reservation_id: "short".to_string(),
        expires_at: Some(Utc::now() + Duration::seconds(30)),
    }));

    let result = app
        .state
        .gateway
        .reserve(Uuid::new_v4(), Uuid::new_v4(), "g2a-short", 1)
        .await;

    assert!(matches!(result, Err(FulfillmentError::SupplierUnavailable(_))));
    assert_eq!(app.supplier.released(), vec!["short".to_string()]);

    // 마진만큼 앞당겨 저장
    let supplier_expiry = Utc::now() + Duration::minutes(10);
    let reservation = app
        .state
        .gateway
        .reserve(Uuid::new_v4(), Uuid::new_v4(), "g2a-long", 1)
        .await
        .unwrap();
    assert!(reservation.expires_at < supplier_expiry - Duration::seconds(59));
}

/// 테스트: 공급사 재고 없음 -> OutOfStock (재시도 없음)
#[tokio::test]
async fn test_supplier_not_found_maps_to_out_of_stock() {
    let app = setup_test();
    app.supplier
        .push_reserve(Err(SupplierError::NotFound("g2a-gone".to_string())));
    let game_id = Uuid::new_v4();

    match app
        .state
        .gateway
        .reserve(Uuid::new_v4(), game_id, "g2a-gone", 1)
        .await
    {
        Err(FulfillmentError::OutOfStock { game_id: reported }) => assert_eq!(reported, game_id),
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(app.supplier.reserve_count(), 1);
}

/// 테스트: 관리자 예약 해제
///
/// 첫 호출은 Released, 두 번째는 AlreadyTerminal.
#[tokio::test]
async fn test_admin_cancels_held_reservation() {
    let app = setup_test();
    let order_id = Uuid::new_v4();
    let reservation = app
        .state
        .gateway
        .reserve(order_id, Uuid::new_v4(), "g2a-admin", 1)
        .await
        .unwrap();
    let admin = &app.state.admin_state.admin_service;

    let held = admin
        .reservations(&ReservationFilter {
            status: Some(ReservationStatus::Held),
            ..ReservationFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(held.len(), 1);
    assert_eq!(held[0].order_id, order_id);

    let first = admin.cancel_reservation(reservation.id).await.unwrap();
    assert_eq!(first.reservation_id, reservation.id);
    assert_eq!(first.outcome, ReleaseOutcome::Released);

    let second = admin.cancel_reservation(reservation.id).await.unwrap();
    assert_eq!(second.outcome, ReleaseOutcome::AlreadyTerminal);

    assert_eq!(app.supplier.released().len(), 1);
    assert!(admin
        .reservations(&ReservationFilter {
            status: Some(ReservationStatus::Held),
            ..ReservationFilter::default()
        })
        .await
        .unwrap()
        .is_empty());

    assert!(matches!(
        admin.cancel_reservation(Uuid::new_v4()).await,
        Err(FulfillmentError::ReservationNotFound { .. })
    ));
}
