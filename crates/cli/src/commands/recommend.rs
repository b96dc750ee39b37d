use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use smartcrop_core::advisory::classifier::{ClassifierState, ModelBundle};
use smartcrop_core::advisory::districts::DistrictFeatureTable;
use smartcrop_core::advisory::engine::DecisionEngine;
use smartcrop_core::advisory::soil_reference::SoilReferenceTable;
use smartcrop_core::advisory::{assess, build_record, RecommendationRequest};
use smartcrop_core::config::AppConfig;
use smartcrop_core::domain::recommendation::RecommendationRecord;

use crate::commands::{
    escape_json, load_config, CommandResult, EXIT_CONFIG, EXIT_INVALID_INPUT,
};
use crate::RecommendArgs;

#[derive(Debug, Serialize)]
struct RecommendReport {
    command: &'static str,
    status: &'static str,
    recommendation: RecommendationRecord,
    /// Tiers that were skipped or failed before the answer was produced.
    degradations: Vec<String>,
}

pub fn run(args: &RecommendArgs) -> CommandResult {
    let config = match load_config("recommend") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    evaluate(&config, args)
}

pub(crate) fn evaluate(config: &AppConfig, args: &RecommendArgs) -> CommandResult {
    let soils = match &config.advisory.soil_table_path {
        Some(path) => match SoilReferenceTable::from_csv_path(path) {
            Ok(table) => table,
            Err(error) => {
                return CommandResult::failure(
                    "recommend",
                    "soil_reference",
                    error.to_string(),
                    EXIT_CONFIG,
                );
            }
        },
        None => SoilReferenceTable::default(),
    };
    let classifier = ModelBundle::load(&config.advisory.artifact_paths())
        .map(ClassifierState::loaded)
        .unwrap_or_default();
    let engine = DecisionEngine::new(DistrictFeatureTable::default(), classifier);

    let request = RecommendationRequest {
        district: Some(args.district.clone()),
        nitrogen: Some(Value::from(args.nitrogen)),
        phosphorus: Some(Value::from(args.phosphorus)),
        potassium: Some(Value::from(args.potassium)),
        ph: Some(Value::from(args.ph)),
        last_crop: args.last_crop.clone(),
        phone: None,
    };

    let assessment = match request.validate().and_then(|valid| assess(&engine, &soils, &valid)) {
        Ok(assessment) => assessment,
        Err(error) => {
            return CommandResult::failure(
                "recommend",
                "invalid_input",
                error.to_string(),
                EXIT_INVALID_INPUT,
            );
        }
    };

    let report = RecommendReport {
        command: "recommend",
        status: "ok",
        degradations: assessment
            .evaluation
            .degradations
            .iter()
            .map(|degradation| format!("{}: {}", degradation.tier, degradation.reason))
            .collect(),
        recommendation: build_record(&assessment, None, Utc::now()),
    };

    let output = serde_json::to_string(&report).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"recommend\",\"status\":\"error\",\
             \"error_class\":\"serialization\",\"message\":\"{}\"}}",
            escape_json(&error.to_string())
        )
    });
    CommandResult { exit_code: 0, output }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;
    use smartcrop_core::config::AppConfig;
    use tempfile::TempDir;

    use super::evaluate;
    use crate::commands::EXIT_INVALID_INPUT;
    use crate::RecommendArgs;

    fn args(district: &str, ph: f64, last_crop: Option<&str>) -> RecommendArgs {
        RecommendArgs {
            district: district.to_string(),
            nitrogen: 25.0,
            phosphorus: 18.0,
            potassium: 220.0,
            ph,
            last_crop: last_crop.map(str::to_string),
        }
    }

    fn offline_config(dir: &TempDir) -> AppConfig {
        let mut config = AppConfig::default();
        config.advisory.model_dir = dir.path().to_path_buf();
        config
    }

    #[test]
    fn rule_tier_answers_when_no_model_is_present() {
        let dir = TempDir::new().expect("tempdir");

        let result = evaluate(&offline_config(&dir), &args("Sangrur", 7.8, None));

        assert_eq!(result.exit_code, 0);
        let payload: Value = serde_json::from_str(&result.output).expect("json report");
        assert_eq!(payload["status"], "ok");
        assert_eq!(payload["recommendation"]["crop"], "Wheat");
        assert_eq!(payload["recommendation"]["method"], "rule_based");
        assert_eq!(payload["recommendation"]["farmer_id"], Value::Null);
        assert!(payload["degradations"][0]
            .as_str()
            .is_some_and(|line| line.starts_with("ml_model:")));
    }

    #[test]
    fn wheat_rotation_is_applied_offline() {
        let dir = TempDir::new().expect("tempdir");

        let result =
            evaluate(&offline_config(&dir), &args("Patiala", 7.9, Some("wheat last rabi")));

        let payload: Value = serde_json::from_str(&result.output).expect("json report");
        assert_eq!(payload["recommendation"]["crop"], "Rice");
    }

    #[test]
    fn unknown_district_is_invalid_input() {
        let dir = TempDir::new().expect("tempdir");

        let result = evaluate(&offline_config(&dir), &args("Atlantis", 7.0, None));

        assert_eq!(result.exit_code, EXIT_INVALID_INPUT);
        let payload: Value = serde_json::from_str(&result.output).expect("json payload");
        assert_eq!(payload["error_class"], "invalid_input");
        assert_eq!(payload["message"], "District not found in database: Atlantis");
    }

    #[test]
    fn non_finite_reading_is_rejected() {
        let dir = TempDir::new().expect("tempdir");

        let result = evaluate(&offline_config(&dir), &args("Moga", f64::NAN, None));

        assert_eq!(result.exit_code, EXIT_INVALID_INPUT);
    }
}
