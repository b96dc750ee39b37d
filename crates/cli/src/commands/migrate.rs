use crate::commands::{
    load_config, runtime, CommandResult, StepFailure, EXIT_DB_CONNECT, EXIT_MIGRATION,
};
use smartcrop_db::migrations::{self, MigrateError};
use smartcrop_db::{connect_with_config, DbPool};

pub fn run() -> CommandResult {
    let config = match load_config("migrate") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match runtime("migrate") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = connect_with_config(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), EXIT_DB_CONNECT))?;
        let outcome = apply(&pool).await;
        pool.close().await;
        outcome
    });

    match result {
        Ok(applied) => CommandResult::success("migrate", applied_message(applied)),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("migrate", error_class, message, exit_code)
        }
    }
}

async fn apply(pool: &DbPool) -> Result<usize, StepFailure> {
    let migration_failure =
        |error: MigrateError| ("migration", error.to_string(), EXIT_MIGRATION);
    let pending = migrations::pending_count(pool).await.map_err(migration_failure)?;
    migrations::run_pending(pool).await.map_err(migration_failure)?;
    Ok(pending)
}

fn applied_message(applied: usize) -> String {
    match applied {
        0 => "schema is up to date; no migrations applied".to_string(),
        1 => "applied 1 pending migration".to_string(),
        count => format!("applied {count} pending migrations"),
    }
}

#[cfg(test)]
mod tests {
    use super::applied_message;

    #[test]
    fn message_reports_how_many_migrations_ran() {
        assert_eq!(applied_message(0), "schema is up to date; no migrations applied");
        assert_eq!(applied_message(1), "applied 1 pending migration");
        assert_eq!(applied_message(3), "applied 3 pending migrations");
    }
}
