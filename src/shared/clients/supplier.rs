use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::shared::config::SupplierConfig;
use crate::shared::utils::retry::Transient;

// =====================================================
// 키 공급사(G2A) API 클라이언트
// =====================================================
// POST   /reservations                {productId, quantity} -> {reservationId, expiresAt}
// POST   /reservations/{id}/confirm   -> {keys: [...]}
// DELETE /reservations/{id}           -> {}
//
// 인증 헤더: Authorization: <clientId>, <apiKey>
//
// 이 클라이언트는 요청을 한 번만 보낸다.
// 재시도는 상위 ReservationGateway 가 SupplierError::is_transient 기준으로 한다.
// =====================================================

/// 공급사 API 에러
/// Supplier API errors, classified for retry decisions
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SupplierError {
    #[error("supplier request timed out: {0}")]
    Timeout(String),

    #[error("supplier connection failed: {0}")]
    Connection(String),

    /// 5xx
    #[error("supplier server error {status}: {body}")]
    Server { status: u16, body: String },

    /// 429
    #[error("supplier rate limit exceeded")]
    RateLimited,

    /// 404: 상품 또는 예약이 없음
    #[error("supplier resource not found: {0}")]
    NotFound(String),

    /// 409: 재고 부족 / 상태 충돌
    #[error("supplier conflict: {0}")]
    Conflict(String),

    /// 410: 예약 만료
    #[error("supplier reservation gone: {0}")]
    Gone(String),

    /// 그 밖의 4xx
    #[error("supplier rejected request {status}: {body}")]
    Rejected { status: u16, body: String },

    /// 응답 형식이 잘못됨 (필수 필드 누락 등)
    #[error("malformed supplier response: {0}")]
    Malformed(String),
}

impl SupplierError {
    /// HTTP 상태 코드로 에러 분류
    /// Classify a non-success HTTP status
    pub fn from_status(status: StatusCode, body: String) -> Self {
        match status.as_u16() {
            404 => SupplierError::NotFound(body),
            409 => SupplierError::Conflict(body),
            410 => SupplierError::Gone(body),
            429 => SupplierError::RateLimited,
            code if status.is_server_error() => SupplierError::Server { status: code, body },
            code => SupplierError::Rejected { status: code, body },
        }
    }
}

impl Transient for SupplierError {
    fn is_transient(&self) -> bool {
        matches!(
            self,
            SupplierError::Timeout(_)
                | SupplierError::Connection(_)
                | SupplierError::Server { .. }
                | SupplierError::RateLimited
        )
    }
}

impl From<reqwest::Error> for SupplierError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SupplierError::Timeout(err.to_string())
        } else if err.is_decode() {
            SupplierError::Malformed(err.to_string())
        } else if let Some(status) = err.status() {
            SupplierError::from_status(status, err.to_string())
        } else {
            SupplierError::Connection(err.to_string())
        }
    }
}

/// 공급사 홀드 (reserve 응답)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplierHold {
    pub reservation_id: String,
    /// 공급사가 약속한 만료 시각 (누락되면 게이트웨이가 거부한다)
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct ConfirmResponse {
    keys: Vec<String>,
}

/// 키 공급사 API
/// Key supplier API surface used by the reservation gateway
#[async_trait]
pub trait SupplierApi: Send + Sync {
    async fn reserve(&self, product_id: &str, quantity: u32) -> Result<SupplierHold, SupplierError>;

    async fn confirm(&self, reservation_id: &str) -> Result<Vec<String>, SupplierError>;

    async fn release(&self, reservation_id: &str) -> Result<(), SupplierError>;
}

/// G2A HTTP 클라이언트
/// G2A HTTP client
pub struct G2aClient {
    http_client: reqwest::Client,
    base_url: String,
    authorization: String,
}

impl G2aClient {
    /// 클라이언트 생성 (모든 요청에 타임아웃 적용)
    /// Create client; every request carries the configured timeout
    pub fn new(config: &SupplierConfig) -> anyhow::Result<Self> {
        use anyhow::Context;

        let http_client = reqwest::Client::builder()
            .timeout(config.timeout())
            .connect_timeout(config.timeout())
            .build()
            .context("Failed to create supplier HTTP client")?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            authorization: format!("{}, {}", config.client_id, config.api_key),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// 응답 상태 확인, 실패면 분류된 에러로 변환
    async fn check(response: reqwest::Response) -> Result<reqwest::Response, SupplierError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(SupplierError::from_status(status, body))
    }
}

#[async_trait]
impl SupplierApi for G2aClient {
    async fn reserve(&self, product_id: &str, quantity: u32) -> Result<SupplierHold, SupplierError> {
        tracing::debug!(product_id, quantity, "supplier reserve");

        let response = self
            .http_client
            .post(self.url("/reservations"))
            .header("Authorization", &self.authorization)
            .json(&serde_json::json!({
                "productId": product_id,
                "quantity": quantity,
            }))
            .send()
            .await?;

        let hold: SupplierHold = Self::check(response).await?.json().await?;
        if hold.reservation_id.is_empty() {
            return Err(SupplierError::Malformed("empty reservationId".to_string()));
        }
        Ok(hold)
    }

    async fn confirm(&self, reservation_id: &str) -> Result<Vec<String>, SupplierError> {
        tracing::debug!(reservation_id, "supplier confirm");

        let response = self
            .http_client
            .post(self.url(&format!("/reservations/{}/confirm", reservation_id)))
            .header("Authorization", &self.authorization)
            .send()
            .await?;

        let body: ConfirmResponse = Self::check(response).await?.json().await?;
        Ok(body.keys)
    }

    async fn release(&self, reservation_id: &str) -> Result<(), SupplierError> {
        tracing::debug!(reservation_id, "supplier release");

        let response = self
            .http_client
            .delete(self.url(&format!("/reservations/{}", reservation_id)))
            .header("Authorization", &self.authorization)
            .send()
            .await?;

        Self::check(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_http_statuses() {
        assert_eq!(
            SupplierError::from_status(StatusCode::NOT_FOUND, String::new()),
            SupplierError::NotFound(String::new())
        );
        assert_eq!(
            SupplierError::from_status(StatusCode::TOO_MANY_REQUESTS, String::new()),
            SupplierError::RateLimited
        );
        assert!(matches!(
            SupplierError::from_status(StatusCode::BAD_GATEWAY, String::new()),
            SupplierError::Server { status: 502, .. }
        ));
        assert!(matches!(
            SupplierError::from_status(StatusCode::UNPROCESSABLE_ENTITY, String::new()),
            SupplierError::Rejected { status: 422, .. }
        ));
    }

    #[test]
    fn only_timeouts_5xx_and_429_are_transient() {
        assert!(SupplierError::Timeout("t".into()).is_transient());
        assert!(SupplierError::Connection("c".into()).is_transient());
        assert!(SupplierError::RateLimited.is_transient());
        assert!(SupplierError::Server { status: 503, body: String::new() }.is_transient());

        assert!(!SupplierError::NotFound(String::new()).is_transient());
        assert!(!SupplierError::Conflict(String::new()).is_transient());
        assert!(!SupplierError::Gone(String::new()).is_transient());
        assert!(!SupplierError::Rejected { status: 400, body: String::new() }.is_transient());
        assert!(!SupplierError::Malformed(String::new()).is_transient());
    }

    #[test]
    fn hold_without_expiry_deserializes_as_none() {
        let hold: SupplierHold = serde_json::from_str(r#"{"reservationId":"r-1"}"#).unwrap();
        assert_eq!(hold.reservation_id, "r-1");
        assert!(hold.expires_at.is_none());
    }

    #[test]
    fn authorization_header_joins_client_id_and_key() {
        let config = SupplierConfig {
            base_url: "http://supplier.local/v1/".to_string(),
            client_id: "client".to_string(),
            api_key: "secret".to_string(),
            ..SupplierConfig::default()
        };
        let client = G2aClient::new(&config).unwrap();
        assert_eq!(client.authorization, "client, secret");
        assert_eq!(client.url("/reservations"), "http://supplier.local/v1/reservations");
    }
}
