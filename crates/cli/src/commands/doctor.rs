use serde::Serialize;
use smartcrop_core::advisory::classifier::{ClassifierError, ModelBundle};
use smartcrop_core::advisory::soil_reference::SoilReferenceTable;
use smartcrop_core::config::{AppConfig, LoadOptions};
use smartcrop_db::{connect_with_config, migrations};
use smartcrop_gateway::{DeliveryMode, Notifier};

use crate::commands::{escape_json, CommandResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

impl DoctorCheck {
    fn pass(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Pass, details: details.into() }
    }

    fn fail(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Fail, details: details.into() }
    }

    fn skipped(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Skipped, details: details.into() }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

const CONFIG_DEPENDENT_CHECKS: [&str; 5] = [
    "database_connectivity",
    "schema_migrations",
    "soil_reference",
    "model_artifacts",
    "notification_channels",
];

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = if report.overall_status == CheckStatus::Fail { 1 } else { 0 };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\
                 \"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck::pass(
                "config_validation",
                "configuration loaded and validated",
            ));
            checks.extend(check_database(&config));
            checks.push(check_soil_reference(&config));
            checks.push(check_model_artifacts(&config));
            checks.push(check_notification_channels(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck::fail("config_validation", error.to_string()));
            for name in CONFIG_DEPENDENT_CHECKS {
                checks.push(DoctorCheck::skipped(
                    name,
                    "skipped because configuration did not load",
                ));
            }
        }
    }

    summarize(checks)
}

// Skipped checks do not fail the report; only an explicit failure does.
fn summarize(checks: Vec<DoctorCheck>) -> DoctorReport {
    let any_failed = checks.iter().any(|check| check.status == CheckStatus::Fail);
    let overall_status = if any_failed { CheckStatus::Fail } else { CheckStatus::Pass };
    let summary = if any_failed {
        "doctor: one or more readiness checks failed".to_string()
    } else {
        "doctor: all readiness checks passed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_database(config: &AppConfig) -> Vec<DoctorCheck> {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            let details = format!("failed to initialize async runtime: {error}");
            return vec![
                DoctorCheck::fail("database_connectivity", details),
                DoctorCheck::skipped("schema_migrations", "skipped because runtime did not start"),
            ];
        }
    };

    runtime.block_on(async {
        let pool = match connect_with_config(&config.database).await {
            Ok(pool) => pool,
            Err(error) => {
                return vec![
                    DoctorCheck::fail(
                        "database_connectivity",
                        format!("failed to connect to database: {error}"),
                    ),
                    DoctorCheck::skipped(
                        "schema_migrations",
                        "skipped because the database is unreachable",
                    ),
                ];
            }
        };

        let connectivity = DoctorCheck::pass(
            "database_connectivity",
            format!("connected using `{}`", config.database.url),
        );
        let schema = match migrations::pending_count(&pool).await {
            Ok(0) => DoctorCheck::pass("schema_migrations", "schema is up to date"),
            Ok(pending) => DoctorCheck::fail(
                "schema_migrations",
                format!("{pending} pending migration(s); run `smartcrop migrate`"),
            ),
            Err(error) => DoctorCheck::fail(
                "schema_migrations",
                format!("could not read migration state: {error}"),
            ),
        };

        pool.close().await;
        vec![connectivity, schema]
    })
}

fn check_soil_reference(config: &AppConfig) -> DoctorCheck {
    match &config.advisory.soil_table_path {
        Some(path) => match SoilReferenceTable::from_csv_path(path) {
            Ok(table) => DoctorCheck::pass(
                "soil_reference",
                format!("{} districts loaded from `{}`", table.entries().len(), path.display()),
            ),
            Err(error) => DoctorCheck::fail("soil_reference", error.to_string()),
        },
        None => DoctorCheck::pass(
            "soil_reference",
            format!("{} builtin districts", SoilReferenceTable::default().entries().len()),
        ),
    }
}

fn check_model_artifacts(config: &AppConfig) -> DoctorCheck {
    match ModelBundle::load(&config.advisory.artifact_paths()) {
        Ok(_) => DoctorCheck::pass(
            "model_artifacts",
            format!("classifier loaded from `{}`", config.advisory.model_dir.display()),
        ),
        Err(ClassifierError::ArtifactMissing(path)) => DoctorCheck::skipped(
            "model_artifacts",
            format!("`{}` not found; rule-based recommendations will be served", path.display()),
        ),
        Err(error) => DoctorCheck::fail("model_artifacts", error.to_string()),
    }
}

fn check_notification_channels(config: &AppConfig) -> DoctorCheck {
    match Notifier::from_config(&config.notifications) {
        Ok(notifier) => {
            let modes = notifier
                .modes()
                .into_iter()
                .map(|(kind, mode)| format!("{kind}={}", mode_label(mode)))
                .collect::<Vec<_>>()
                .join(", ");
            DoctorCheck::pass("notification_channels", modes)
        }
        Err(error) => DoctorCheck::fail("notification_channels", error.to_string()),
    }
}

fn mode_label(mode: DeliveryMode) -> &'static str {
    match mode {
        DeliveryMode::Live => "live",
        DeliveryMode::Mock => "mock",
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}
