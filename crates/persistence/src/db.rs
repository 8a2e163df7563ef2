//! Database connection pool management.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

/// Database configuration.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    /// Per-statement timeout applied to every connection, 0 disables it.
    pub statement_timeout_secs: u64,
}

/// Creates a PostgreSQL connection pool with the given configuration.
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    let timeout_ms = statement_timeout_ms(config.statement_timeout_secs);

    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .after_connect(move |conn, _meta| {
            Box::pin(async move {
                if timeout_ms > 0 {
                    sqlx::query(&format!("SET statement_timeout = {}", timeout_ms))
                        .execute(conn)
                        .await?;
                }
                Ok(())
            })
        })
        .connect(&config.url)
        .await
}

/// `statement_timeout` in milliseconds, capped at the largest value
/// PostgreSQL accepts.
fn statement_timeout_ms(secs: u64) -> u64 {
    secs.saturating_mul(1000).min(i32::MAX as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statement_timeout_ms() {
        assert_eq!(statement_timeout_ms(0), 0);
        assert_eq!(statement_timeout_ms(3600), 3_600_000);
    }

    #[test]
    fn test_statement_timeout_ms_does_not_overflow() {
        assert_eq!(statement_timeout_ms(u64::MAX), i32::MAX as u64);
        assert_eq!(statement_timeout_ms(u64::MAX / 1000 + 1), i32::MAX as u64);
    }
}
