/// 공유 유틸리티 모듈
/// Shared Utilities Module
///
/// 역할:
/// - 재시도 / 백오프 (원장 충돌, 공급사 일시 장애)
/// - 금액 반올림
pub mod money;
pub mod retry;

pub use money::*;
pub use retry::*;
