//! Embedded migration execution.

use diesel::Connection;
use diesel_async::async_connection_wrapper::AsyncConnectionWrapper;
use diesel_migrations::MigrationHarness;

use crate::{MIGRATIONS, PgConnection, PgError, PgResult, TRACING_TARGET_MIGRATION};

/// Applies all pending embedded migrations, returning the applied versions.
///
/// Runs on a blocking thread; the migration harness is synchronous.
pub async fn run_pending_migrations(database_url: &str) -> PgResult<Vec<String>> {
    let database_url = database_url.to_owned();

    tokio::task::spawn_blocking(move || {
        let mut conn: AsyncConnectionWrapper<PgConnection> =
            AsyncConnectionWrapper::establish(&database_url).map_err(PgError::from)?;

        let applied = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(PgError::Migration)?;

        let versions: Vec<String> = applied.iter().map(ToString::to_string).collect();
        for version in &versions {
            tracing::info!(
                target: TRACING_TARGET_MIGRATION,
                migration = %version,
                "Applied migration"
            );
        }
        Ok(versions)
    })
    .await
    .map_err(|e| PgError::Unexpected(format!("migration task panicked: {e}").into()))?
}
