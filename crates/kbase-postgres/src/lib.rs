#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

/// Embeds all migrations into the final binary.
pub(crate) const MIGRATIONS: diesel_migrations::EmbeddedMigrations =
    diesel_migrations::embed_migrations!();

// Tracing target constants for consistent logging.

/// Tracing target for database connection operations.
pub const TRACING_TARGET_CONNECTION: &str = "kbase_postgres::connection";

/// Tracing target for database query operations.
pub const TRACING_TARGET_QUERY: &str = "kbase_postgres::queries";

/// Tracing target for database migration operations.
pub const TRACING_TARGET_MIGRATION: &str = "kbase_postgres::migrations";

mod client;
mod error;
pub mod model;
pub mod query;
mod schema;
pub mod types;

pub use diesel_async::AsyncPgConnection as PgConnection;

/// A connection checked out of the deadpool pool.
pub type PooledConnection = diesel_async::pooled_connection::deadpool::Object<PgConnection>;

pub use crate::client::{PgClient, PgConfig, PgPoolStatus, run_pending_migrations};
pub use crate::error::{BoxError, PgError, PgResult};
pub use crate::query::{
    ChatRepository, DocPageRepository, DocumentRepository, PermissionRepository, SegmentRepository,
};
