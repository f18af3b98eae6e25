use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

// =====================================================
// Reservation 모델
// =====================================================
// 역할: 공급사(G2A)에 일정 시간 동안 잡아둔 재고 홀드
//
// 상태 전이:
// held -> confirmed (키 수령) | released (취소) | expired (만료)
// 모든 최종 상태는 되돌릴 수 없다.
//
// expires_at 은 공급사가 준 값에서 안전 마진만큼 앞당긴 값이다.
// (절대 늘리지 않는다)
// =====================================================

/// 예약 상태
/// Reservation status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationStatus {
    Held,
    Confirmed,
    Released,
    Expired,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Held => "held",
            ReservationStatus::Confirmed => "confirmed",
            ReservationStatus::Released => "released",
            ReservationStatus::Expired => "expired",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ReservationStatus::Held)
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReservationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "held" => Ok(ReservationStatus::Held),
            "confirmed" => Ok(ReservationStatus::Confirmed),
            "released" => Ok(ReservationStatus::Released),
            "expired" => Ok(ReservationStatus::Expired),
            other => Err(format!("unknown reservation status: {}", other)),
        }
    }
}

/// 공급사 재고 예약
/// Supplier stock reservation
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    pub id: Uuid,

    /// 소속 주문 (하나의 주문은 여러 예약을 가질 수 있다)
    pub order_id: Uuid,

    pub game_id: Uuid,

    /// 공급사 상품 ID
    pub product_id: String,

    /// 공급사가 발급한 예약 ID
    pub supplier_reservation_id: String,

    pub quantity: u32,

    pub status: ReservationStatus,

    pub expires_at: DateTime<Utc>,

    /// confirm 시 받은 키 (재확정 시 동일한 키를 돌려주기 위해 저장)
    pub delivered_keys: Vec<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// 예약 해제 결과
/// Outcome of a best-effort release
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReleaseOutcome {
    /// 공급사도 해제를 확인함
    Released,
    /// 이미 최종 상태 (confirmed/released/expired)
    AlreadyTerminal,
    /// 로컬에서는 해제했지만 공급사 응답을 받지 못함 (만료로 자연 소멸)
    Unacknowledged,
}

/// 예약 목록 조회 필터 (관리자)
#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ReservationFilter {
    pub status: Option<ReservationStatus>,
    pub order_id: Option<Uuid>,
    pub limit: Option<i64>,
}

impl ReservationFilter {
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(100).clamp(1, 500)
    }

    pub fn matches(&self, reservation: &Reservation) -> bool {
        self.status.is_none_or(|s| reservation.status == s)
            && self.order_id.is_none_or(|o| reservation.order_id == o)
    }
}

/// 예약 목록 응답
#[derive(Debug, Serialize, ToSchema)]
pub struct ReservationListResponse {
    pub reservations: Vec<Reservation>,
}

/// 관리자 예약 취소 응답
#[derive(Debug, Serialize, ToSchema)]
pub struct ReleaseResponse {
    pub reservation_id: Uuid,
    pub outcome: ReleaseOutcome,
}
