// Ledger domain state
// 원장 도메인 상태
use std::sync::Arc;

use crate::domains::ledger::services::{BalanceService, Ledger};

/// Ledger domain state
/// 원장 도메인에서 필요한 서비스들을 포함하는 상태
#[derive(Clone)]
pub struct LedgerState {
    pub ledger: Arc<dyn Ledger>,
    pub balance_service: BalanceService,
}

impl LedgerState {
    pub fn new(ledger: Arc<dyn Ledger>, balance_service: BalanceService) -> Self {
        Self {
            ledger,
            balance_service,
        }
    }
}
