use crate::commands::{
    load_config, runtime, CommandResult, StepFailure, EXIT_DB_CONNECT, EXIT_MIGRATION, EXIT_SEED,
    EXIT_SEED_VERIFY,
};
use smartcrop_db::{connect_with_config, migrations, DbPool, DemoSeedDataset, SeedResult};

pub fn run() -> CommandResult {
    let config = match load_config("seed") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match runtime("seed") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = connect_with_config(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), EXIT_DB_CONNECT))?;
        let outcome = seed(&pool).await;
        pool.close().await;
        outcome
    });

    match result {
        Ok(seeded) => CommandResult::success(
            "seed",
            format!(
                "demo dataset loaded: {} farmers, {} recommendations",
                seeded.farmers, seeded.recommendations
            ),
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}

async fn seed(pool: &DbPool) -> Result<SeedResult, StepFailure> {
    migrations::run_pending(pool)
        .await
        .map_err(|error| ("migration", error.to_string(), EXIT_MIGRATION))?;

    let seeded = DemoSeedDataset::load(pool)
        .await
        .map_err(|error| ("seed_execution", error.to_string(), EXIT_SEED))?;

    let verification = DemoSeedDataset::verify(pool)
        .await
        .map_err(|error| ("seed_verification", error.to_string(), EXIT_SEED_VERIFY))?;
    if !verification.all_present {
        let message = failed_checks_message(&verification.missing());
        return Err(("seed_verification", message, EXIT_SEED_VERIFY));
    }

    Ok(seeded)
}

fn failed_checks_message(missing: &[&str]) -> String {
    if missing.is_empty() {
        "Some seed data failed to load".to_string()
    } else {
        format!("Seed verification failed for checks: {}", missing.join(", "))
    }
}
