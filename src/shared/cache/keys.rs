// 캐시 키 패밀리
// Cache key families shared with the storefront's read side

pub const HOME: &str = "home:*";
pub const GAMES: &str = "game:*";
pub const CATALOG: &str = "catalog:*";
pub const ADMIN: &str = "admin:*";

/// 관리자 통계 요약 캐시 키
pub const ADMIN_STATS: &str = "admin:stats";

pub fn user_family(user_id: u64) -> String {
    format!("user:{}:*", user_id)
}

/// 주문/재고가 바뀐 뒤 무효화할 패밀리
pub fn after_order_change(user_id: u64) -> Vec<String> {
    vec![
        user_family(user_id),
        GAMES.to_string(),
        CATALOG.to_string(),
        HOME.to_string(),
        ADMIN.to_string(),
    ]
}

/// 잔고만 바뀐 뒤 무효화할 패밀리
pub fn after_balance_change(user_id: u64) -> Vec<String> {
    vec![user_family(user_id), ADMIN.to_string()]
}
