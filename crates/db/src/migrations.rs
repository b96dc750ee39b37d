pub use sqlx::migrate::MigrateError;
use sqlx::migrate::Migrator;

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

/// Number of migrations known to the binary that have not been applied yet.
pub async fn pending_count(pool: &DbPool) -> Result<usize, MigrateError> {
    let applied: Vec<i64> = match sqlx::query_scalar(
        "SELECT version FROM _sqlx_migrations WHERE success = 1",
    )
    .fetch_all(pool)
    .await
    {
        Ok(versions) => versions,
        // fresh database: the bookkeeping table does not exist yet
        Err(sqlx::Error::Database(_)) => Vec::new(),
        Err(error) => return Err(MigrateError::Execute(error)),
    };

    Ok(MIGRATOR
        .iter()
        .filter(|migration| migration.migration_type.is_up_migration())
        .filter(|migration| !applied.contains(&migration.version))
        .count())
}
