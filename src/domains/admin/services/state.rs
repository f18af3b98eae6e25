// Admin domain state
// 관리자 도메인 상태
use crate::domains::admin::services::AdminService;

/// Admin domain state
#[derive(Clone)]
pub struct AdminState {
    pub admin_service: AdminService,
}

impl AdminState {
    pub fn new(admin_service: AdminService) -> Self {
        Self { admin_service }
    }
}
