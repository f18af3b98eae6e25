use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};
use crate::shared::services::AppState;
use crate::shared::errors::AuthError;
use serde_json::json;

/// 인증된 사용자 정보 (JWT 토큰에서 추출)
/// Authenticated user information (extracted from JWT token)
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: u64,
    pub email: String,
    pub role: String,
}

/// 관리자 사용자 (role = admin 인 토큰만 통과)
/// Authenticated user carrying the admin role
#[derive(Debug, Clone)]
pub struct AdminUser {
    pub user_id: u64,
    pub email: String,
}

/// AuthenticatedUser를 Axum Extractor로 구현
///
/// 사용법:
/// ```rust,ignore
/// pub async fn checkout(
///     State(app_state): State<AppState>,
///     authenticated_user: AuthenticatedUser,  // <- 이렇게 사용!
/// ) -> Result<...> {
///     let user_id = authenticated_user.user_id;
///     // ...
/// }
/// ```
#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = (StatusCode, axum::Json<serde_json::Value>);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // 1. Authorization 헤더에서 토큰 추출
        let headers = &parts.headers;
        let auth_header = headers
            .get("Authorization")
            .ok_or_else(|| -> Self::Rejection { AuthError::MissingToken.into() })?
            .to_str()
            .map_err(|_| -> Self::Rejection { AuthError::InvalidToken.into() })?;

        // 2. "Bearer <token>" 형식 파싱
        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| {
                (
                    StatusCode::UNAUTHORIZED,
                    axum::Json(json!({
                        "error": "Invalid authorization format. Expected: 'Bearer <token>'",
                        "code": AuthError::InvalidToken.code(),
                    })),
                )
            })?;

        // 3. JWT Service로 토큰 검증 (AppState에서 가져옴)
        let claims = state
            .jwt_service
            .verify_access_token(token)
            .map_err(|e| -> Self::Rejection { e.into() })?;

        // 4. AuthenticatedUser 반환
        Ok(AuthenticatedUser {
            user_id: claims.user_id,
            email: claims.email,
            role: claims.role,
        })
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = (StatusCode, axum::Json<serde_json::Value>);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthenticatedUser::from_request_parts(parts, state).await?;

        if user.role != crate::domains::auth::models::ADMIN_ROLE {
            tracing::warn!(user_id = user.user_id, role = %user.role, "admin endpoint refused");
            return Err(AuthError::Forbidden.into());
        }

        Ok(AdminUser {
            user_id: user.user_id,
            email: user.email,
        })
    }
}
