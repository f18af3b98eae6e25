use serde::{Deserialize, Serialize};

/// 관리자 역할 이름
pub const ADMIN_ROLE: &str = "admin";

/// JWT Claims (인증 서비스가 발급한 토큰의 내용)
/// JWT claims issued by the authentication service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// 사용자 ID
    /// User ID
    pub user_id: u64,

    /// 이메일
    /// Email
    pub email: String,

    /// 역할 ("user" | "admin"), 구버전 토큰에는 없을 수 있음
    /// Role, absent on tokens issued before roles existed
    #[serde(default = "default_role")]
    pub role: String,

    /// 만료 시간 (Unix timestamp)
    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// 발급 시간 (Unix timestamp)
    /// Issued at (Unix timestamp)
    pub iat: i64,
}

fn default_role() -> String {
    "user".to_string()
}

impl Claims {
    /// 새 Claims 생성 (만료 시간 자동 계산)
    /// Create new Claims (expiration time automatically calculated)
    pub fn new(user_id: u64, email: String, role: &str, expiration_hours: i64) -> Self {
        let now = chrono::Utc::now().timestamp();
        let exp = now + (expiration_hours * 3600);

        Self {
            user_id,
            email,
            role: role.to_string(),
            exp,
            iat: now,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == ADMIN_ROLE
    }
}
