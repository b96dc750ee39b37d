use smartcrop_core::advisory::classifier::{ClassifierError, ClassifierState, ModelBundle};
use smartcrop_core::advisory::districts::DistrictFeatureTable;
use smartcrop_core::advisory::engine::DecisionEngine;
use smartcrop_core::advisory::soil_reference::{SoilReferenceTable, SoilTableError};
use smartcrop_core::config::{AdvisoryConfig, AppConfig, ConfigError, LoadOptions};
use smartcrop_db::{connect_with_config, migrations, DbPool};
use smartcrop_gateway::{provider_from_config, ChannelError, Notifier, WeatherError};
use thiserror::Error;
use tracing::{info, warn};

use crate::state::AppState;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub state: AppState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error(transparent)]
    SoilTable(#[from] SoilTableError),
    #[error("notification channels could not be built: {0}")]
    Notifier(#[source] ChannelError),
    #[error("weather provider could not be built: {0}")]
    Weather(#[source] WeatherError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool =
        connect_with_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let soils = load_soil_table(&config.advisory)?;
    let engine =
        DecisionEngine::new(DistrictFeatureTable::default(), load_classifier(&config.advisory));
    let notifier =
        Notifier::from_config(&config.notifications).map_err(BootstrapError::Notifier)?;
    let weather = provider_from_config(&config.weather).map_err(BootstrapError::Weather)?;

    info!(
        event_name = "system.bootstrap.advisory_ready",
        correlation_id = "bootstrap",
        districts = soils.entries().len(),
        model_loaded = engine.has_model(),
        weather_source = weather.source(),
        channels = ?notifier.modes(),
        "advisory services initialized"
    );

    let state = AppState::with_pool(db_pool.clone(), engine, soils, notifier, weather);
    Ok(Application { config, db_pool, state })
}

fn load_soil_table(config: &AdvisoryConfig) -> Result<SoilReferenceTable, SoilTableError> {
    match &config.soil_table_path {
        Some(path) => SoilReferenceTable::from_csv_path(path),
        None => Ok(SoilReferenceTable::default()),
    }
}

// Artifacts are optional: without them every request is served by the rule tier.
fn load_classifier(config: &AdvisoryConfig) -> ClassifierState {
    match ModelBundle::load(&config.artifact_paths()) {
        Ok(bundle) => {
            info!(
                event_name = "system.bootstrap.model_loaded",
                correlation_id = "bootstrap",
                model_dir = %config.model_dir.display(),
                "crop classifier loaded"
            );
            ClassifierState::loaded(bundle)
        }
        Err(ClassifierError::ArtifactMissing(path)) => {
            info!(
                event_name = "system.bootstrap.model_absent",
                correlation_id = "bootstrap",
                missing = %path.display(),
                "no classifier artifacts; using rule-based recommendations"
            );
            ClassifierState::Unloaded
        }
        Err(error) => {
            warn!(
                event_name = "system.bootstrap.model_invalid",
                correlation_id = "bootstrap",
                error = %error,
                "classifier artifacts could not be loaded; using rule-based recommendations"
            );
            ClassifierState::Unloaded
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use smartcrop_core::config::{AppConfig, ConfigOverrides, LoadOptions};
    use tempfile::TempDir;

    use crate::bootstrap::{bootstrap, bootstrap_with_config, BootstrapError};

    fn file_config(dir: &TempDir) -> AppConfig {
        let mut config = AppConfig::default();
        config.database.url =
            format!("sqlite://{}?mode=rwc", dir.path().join("smartcrop.db").display());
        config.advisory.model_dir = dir.path().join("models");
        config
    }

    #[tokio::test]
    async fn bootstrap_applies_schema_and_serves_rule_tier_without_artifacts() {
        let dir = TempDir::new().expect("tempdir");

        let app = bootstrap_with_config(file_config(&dir)).await.expect("bootstrap succeeds");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' AND name IN ('farmers', 'recommendations', 'weather_alerts')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("schema query");
        assert_eq!(table_count, 3);
        assert!(!app.state.engine.has_model());
        assert_eq!(app.state.soils.entries().len(), 10);
        assert_eq!(app.state.weather.source(), "mock_data");

        app.db_pool.close().await;
    }

    #[tokio::test]
    async fn broken_artifacts_degrade_to_rule_tier() {
        let dir = TempDir::new().expect("tempdir");
        let config = file_config(&dir);
        fs::create_dir_all(&config.advisory.model_dir).expect("model dir");
        for file in ["crop_model.json", "scaler.json", "label_encoder.json"] {
            fs::write(config.advisory.model_dir.join(file), "{ not json").expect("artifact");
        }

        let app = bootstrap_with_config(config).await.expect("bootstrap still succeeds");

        assert!(!app.state.engine.has_model());
        app.db_pool.close().await;
    }

    #[tokio::test]
    async fn custom_soil_table_replaces_builtin_districts() {
        let dir = TempDir::new().expect("tempdir");
        let csv = dir.path().join("soil_data.csv");
        fs::write(&csv, "district,region,soil_type\nMansa,Malwa,sandy\n").expect("csv");
        let mut config = file_config(&dir);
        config.advisory.soil_table_path = Some(csv);

        let app = bootstrap_with_config(config).await.expect("bootstrap succeeds");

        assert_eq!(app.state.soils.entries().len(), 1);
        assert!(app.state.soils.lookup("mansa").is_ok());
        assert!(app.state.soils.lookup("ludhiana").is_err());
        app.db_pool.close().await;
    }

    #[tokio::test]
    async fn missing_soil_table_fails_fast() {
        let dir = TempDir::new().expect("tempdir");
        let mut config = file_config(&dir);
        config.advisory.soil_table_path = Some(dir.path().join("absent.csv"));

        let result = bootstrap_with_config(config).await;

        assert!(matches!(result, Err(BootstrapError::SoilTable(_))));
    }

    #[tokio::test]
    async fn missing_required_config_file_is_reported() {
        let dir = TempDir::new().expect("tempdir");

        let result = bootstrap(LoadOptions {
            config_path: Some(dir.path().join("absent.toml")),
            require_file: true,
            overrides: ConfigOverrides::default(),
        })
        .await;

        let message = result.err().expect("config error").to_string();
        assert!(message.contains("absent.toml"));
    }
}
