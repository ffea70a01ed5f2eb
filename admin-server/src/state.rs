//! Application state

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::config::Config;
use crate::db::ordering::OrderingContext;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// PostgreSQL connection pool
    pub pool: PgPool,
    /// JWT secret for admin authentication
    pub jwt_secret: String,
    /// Pool, reorder strategy and flagged scopes used by the catalog facades
    pub ordering: OrderingContext,
}

impl AppState {
    /// Connect to PostgreSQL and run pending migrations
    pub async fn new(config: &Config) -> Result<Self, BoxError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .connect(&config.database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!(strategy = %config.reorder_strategy, "Database ready");

        Ok(Self::with_pool(pool, config))
    }

    pub fn with_pool(pool: PgPool, config: &Config) -> Self {
        Self {
            ordering: OrderingContext::new(pool.clone(), config.reorder_strategy),
            pool,
            jwt_secret: config.jwt_secret.clone(),
        }
    }
}
