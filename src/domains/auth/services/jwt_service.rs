use crate::shared::errors::AuthError;
use crate::domains::auth::models::jwt::Claims;
use jsonwebtoken::{decode, DecodingKey, Validation};

/// JWT 서비스 (검증 전용)
/// JWT service; tokens are issued by the authentication service, this one only verifies
#[derive(Clone)]
pub struct JwtService {
    decoding_key: DecodingKey,
}

impl JwtService {
    /// JWT Service 생성
    /// Create JWT Service
    pub fn new(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Access Token 검증
    /// Verify Access Token
    pub fn verify_access_token(&self, token: &str) -> Result<Claims, AuthError> {
        let validation = Validation::default();

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            tracing::debug!(error = %e, "access token rejected");
            AuthError::InvalidToken
        })?;

        Ok(token_data.claims)
    }
}
