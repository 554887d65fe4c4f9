//! Database client and connection pool management.

use std::fmt;
use std::sync::Arc;

use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::pooled_connection::deadpool::Pool;

use super::migrate;
use crate::{PgConfig, PgConnection, PgError, PgResult, PooledConnection, TRACING_TARGET_CONNECTION};

/// Connection pool status information.
#[derive(Debug, Clone)]
pub struct PgPoolStatus {
    /// Maximum number of connections in the pool
    pub max_size: usize,
    /// Current number of connections in the pool
    pub size: usize,
    /// Number of available connections
    pub available: usize,
    /// Number of requests waiting for connections
    pub waiting: usize,
}

impl PgPoolStatus {
    /// Returns the utilization of the pool (0.0 to 1.0).
    #[inline]
    pub fn utilization(&self) -> f64 {
        if self.max_size == 0 {
            0.0
        } else {
            (self.size - self.available) as f64 / self.max_size as f64
        }
    }
}

/// High-level database client that manages connections and migrations.
#[derive(Clone)]
pub struct PgClient {
    inner: Arc<PgClientInner>,
}

struct PgClientInner {
    pool: Pool<PgConnection>,
    config: PgConfig,
}

impl fmt::Debug for PgClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgClient")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl PgClient {
    /// Creates a new database client with the provided configuration.
    ///
    /// This establishes the connection pool without touching the database;
    /// use [`connect`](Self::connect) to also verify connectivity and apply
    /// pending migrations.
    pub fn new(config: PgConfig) -> PgResult<Self> {
        tracing::info!(
            target: TRACING_TARGET_CONNECTION,
            database_url = %config.database_url_masked(),
            max_connections = config.postgres_max_connections,
            "Initializing database client"
        );

        let manager = AsyncDieselConnectionManager::new(&config.postgres_url);

        let mut builder = Pool::builder(manager)
            .max_size(config.postgres_max_connections as usize)
            .runtime(deadpool::Runtime::Tokio1);
        if let Some(timeout) = config.connection_timeout() {
            builder = builder.wait_timeout(Some(timeout)).create_timeout(Some(timeout));
        }
        if let Some(idle) = config.idle_timeout() {
            builder = builder.recycle_timeout(Some(idle));
        }

        let pool = builder.build().map_err(|e| {
            tracing::error!(
                target: TRACING_TARGET_CONNECTION,
                error = %e,
                "Failed to create connection pool"
            );
            PgError::Unexpected(format!("Failed to build connection pool: {e}").into())
        })?;

        Ok(Self {
            inner: Arc::new(PgClientInner { pool, config }),
        })
    }

    /// Creates a client, verifies connectivity, and applies pending
    /// migrations.
    pub async fn connect(config: PgConfig) -> PgResult<Self> {
        let this = Self::new(config)?;

        let applied = migrate::run_pending_migrations(&this.inner.config.postgres_url).await?;
        if !applied.is_empty() {
            tracing::info!(
                target: TRACING_TARGET_CONNECTION,
                migrations = applied.len(),
                "Applied pending database migrations"
            );
        }

        // Verify that the pool can actually hand out a connection.
        let _conn = this.get_connection().await?;
        tracing::info!(target: TRACING_TARGET_CONNECTION, "Database connectivity verified");

        Ok(this)
    }

    /// Checks out a pooled connection.
    pub async fn get_connection(&self) -> PgResult<PooledConnection> {
        self.inner.pool.get().await.map_err(PgError::from)
    }

    /// Returns the client configuration.
    pub fn config(&self) -> &PgConfig {
        &self.inner.config
    }

    /// Returns a snapshot of the pool state.
    pub fn pool_status(&self) -> PgPoolStatus {
        let status = self.inner.pool.status();
        PgPoolStatus {
            max_size: status.max_size,
            size: status.size,
            available: status.available,
            waiting: status.waiting,
        }
    }

    /// Closes the pool; outstanding connections are dropped on return.
    pub fn close(&self) {
        tracing::info!(target: TRACING_TARGET_CONNECTION, "Closing database connection pool");
        self.inner.pool.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_status_utilization() {
        let status = PgPoolStatus {
            max_size: 10,
            size: 6,
            available: 2,
            waiting: 0,
        };
        assert!((status.utilization() - 0.4).abs() < f64::EPSILON);

        let empty = PgPoolStatus {
            max_size: 0,
            size: 0,
            available: 0,
            waiting: 0,
        };
        assert_eq!(empty.utilization(), 0.0);
    }
}
