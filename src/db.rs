use std::time::Duration;

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::warn;

/// Builds the pool without connecting. The first query opens a connection.
pub fn connect(database_url: &str) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(3))
        .connect_lazy(database_url)
        .context("parse DATABASE_URL")
}

pub async fn ping(db: &PgPool) -> bool {
    match sqlx::query("SELECT 1").execute(db).await {
        Ok(_) => true,
        Err(e) => {
            warn!(error = %e, "database ping failed");
            false
        }
    }
}
