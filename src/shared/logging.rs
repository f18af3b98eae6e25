use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// 로깅 초기화
/// Initialize structured logging
///
/// `RUST_LOG` 가 설정되어 있으면 그 값을, 아니면 `level` 을 필터로 사용한다.
/// 운영 환경에서는 `json = true` 로 JSON 라인 출력.
pub fn init_logger(level: &str, json: bool) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let registry = tracing_subscriber::registry().with(env_filter);

    if json {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_current_span(true)
                    .with_thread_ids(true),
            )
            .try_init()?;
    } else {
        registry
            .with(fmt::layer().with_target(true))
            .try_init()?;
    }

    Ok(())
}
