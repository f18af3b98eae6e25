use thiserror::Error;
use axum::{http::StatusCode, Json};
use serde_json::json;

/// 인증/인가 관련 에러
/// Authentication and authorization errors
///
/// 토큰 발급은 인증 서비스 담당이고, 이 서비스는 검증만 한다.
#[derive(Error, Debug)]
pub enum AuthError {
    /// 잘못된 또는 만료된 토큰
    /// Invalid or expired token
    #[error("Invalid or expired token")]
    InvalidToken,

    /// 토큰이 제공되지 않음
    /// Token not provided
    #[error("Token not provided")]
    MissingToken,

    /// 관리자 권한 필요
    /// Admin role required
    #[error("Admin privileges required")]
    Forbidden,
}

impl AuthError {
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::InvalidToken | AuthError::MissingToken => "UNAUTHORIZED",
            AuthError::Forbidden => "FORBIDDEN",
        }
    }
}

/// AuthError를 HTTP 응답으로 변환
impl From<AuthError> for (StatusCode, Json<serde_json::Value>) {
    fn from(err: AuthError) -> Self {
        let status = match &err {
            AuthError::InvalidToken | AuthError::MissingToken => StatusCode::UNAUTHORIZED,
            AuthError::Forbidden => StatusCode::FORBIDDEN,
        };

        (status, Json(json!({ "error": err.to_string(), "code": err.code() })))
    }
}
