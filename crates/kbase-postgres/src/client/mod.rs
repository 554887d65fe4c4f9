//! Client, pool, and migration management.

mod migrate;
mod pg_client;
mod pg_config;

pub use migrate::run_pending_migrations;
pub use pg_client::{PgClient, PgPoolStatus};
pub use pg_config::PgConfig;
