use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::shared::config::Config;

// 데이터베이스 연결 풀
// PostgreSQL pool shared by the billing repositories
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    // 설정의 DATABASE_URL / DATABASE_MAX_CONNECTIONS 로 풀 생성
    pub async fn connect(config: &Config) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections.max(1))
            .acquire_timeout(Duration::from_secs(5))
            .connect(&config.database_url)
            .await
            .with_context(|| {
                format!(
                    "Failed to connect to database (max_connections={})",
                    config.database_max_connections
                )
            })?;

        tracing::info!(
            max_connections = config.database_max_connections,
            "database pool ready"
        );
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    // migrations/ 의 원장, 카탈로그, 주문 테이블 생성
    pub async fn initialize(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(self.pool())
            .await
            .context("Failed to run billing migrations")?;

        tracing::info!("database migrations completed");
        Ok(())
    }
}
