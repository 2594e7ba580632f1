//! Postgres persistence collaborator.
//!
//! Row models and repositories for runs, variants, and assets, plus
//! [`store::PgRunStore`] which adapts them to the engine's write-mostly
//! store contract. The schema is assumed provisioned; migrations are
//! not this crate's concern.

pub mod models;
pub mod repositories;
pub mod store;

use sqlx::postgres::PgPoolOptions;

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
}
