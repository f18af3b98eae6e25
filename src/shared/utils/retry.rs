//! 재시도 유틸리티
//! Retry helper with bounded exponential backoff
//!
//! 사용처:
//! - 원장(ledger) 조건부 UPDATE 의 직렬화 충돌 (StorageConflict)
//! - 공급사 API 의 일시적 오류 (timeout, 5xx, 429)
//!
//! 일시적(transient) 오류만 재시도하고, 확정적 오류(잔고 부족, 품절, 4xx)는
//! 즉시 호출자에게 돌려준다.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

/// 재시도 정책
/// `max_retries` 는 첫 시도 이후의 추가 시도 횟수
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay: Duration::from_secs(5),
        }
    }

    /// n 번째 재시도 전 대기 시간: base * 2^n (+ 최대 25% jitter), max_delay 로 제한
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if self.base_delay.is_zero() {
            return Duration::ZERO;
        }
        let exp = self
            .base_delay
            .saturating_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX));
        let capped = exp.min(self.max_delay);
        let jitter_ms = rand::thread_rng().gen_range(0..=(capped.as_millis() as u64 / 4).max(1));
        capped + Duration::from_millis(jitter_ms)
    }
}

/// 일시적 오류인지 판별하는 trait
/// Errors that know whether another attempt may succeed
pub trait Transient {
    fn is_transient(&self) -> bool;
}

/// `op` 를 정책에 따라 재시도하며 실행
///
/// # Returns
/// * 성공 결과, 또는 확정적 오류 / 재시도 소진 후 마지막 오류
pub async fn retry_with_backoff<T, E, F, Fut>(
    policy: RetryPolicy,
    operation: &str,
    mut op: F,
) -> Result<T, E>
where
    E: Transient + std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < policy.max_retries => {
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    operation,
                    attempt = attempt + 1,
                    max_retries = policy.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient failure, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    struct TestError {
        transient: bool,
    }

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "test error (transient={})", self.transient)
        }
    }

    impl Transient for TestError {
        fn is_transient(&self) -> bool {
            self.transient
        }
    }

    #[tokio::test]
    async fn retries_transient_errors_until_success() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, TestError> =
            retry_with_backoff(RetryPolicy::new(3, Duration::ZERO), "test", || async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(TestError { transient: true })
                } else {
                    Ok(n)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let calls = AtomicU32::new(0);
        let result: Result<(), TestError> =
            retry_with_backoff(RetryPolicy::new(2, Duration::ZERO), "test", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(TestError { transient: true })
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn definitive_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), TestError> =
            retry_with_backoff(RetryPolicy::new(5, Duration::ZERO), "test", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(TestError { transient: false })
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn delay_grows_and_is_capped() {
        let policy = RetryPolicy::new(10, Duration::from_millis(100));
        assert!(policy.delay_for(0) >= Duration::from_millis(100));
        assert!(policy.delay_for(1) >= Duration::from_millis(200));
        assert!(policy.delay_for(20) <= Duration::from_millis(6250));
    }
}
