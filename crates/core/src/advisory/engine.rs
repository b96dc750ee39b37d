//! Three-tier crop decision engine.
//!
//! Every call walks `ml_model -> rule_based -> default` and stops at the first tier that
//! produces a result. Tier failures are returned as data in [`Evaluation::degradations`]
//! so callers can log or assert on them; nothing escapes as an error.

use std::collections::BTreeMap;
use std::fmt;

use crate::advisory::classifier::{
    arg_max, CategoricalFeature, ClassifierError, ClassifierState, ModelBundle,
};
use crate::advisory::districts::DistrictFeatureTable;
use crate::domain::recommendation::{
    CropRecommendation, MethodTier, MAIZE, PEARL_MILLET, RICE, WHEAT,
};
use crate::domain::soil::{SoilSample, SoilType};

pub const RULE_BASED_CONFIDENCE: f64 = 0.75;
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

const ALLUVIAL_WHEAT_PH: f64 = 7.5;
const DEFAULT_REASONING: &str = "Default recommendation due to prediction error";

#[derive(Debug)]
pub enum DegradeReason {
    ModelUnavailable,
    Model(ClassifierError),
    InvalidReading { field: &'static str },
}

impl DegradeReason {
    /// True when the tier was skipped rather than failing.
    pub fn is_expected(&self) -> bool {
        matches!(self, Self::ModelUnavailable)
    }
}

impl fmt::Display for DegradeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ModelUnavailable => f.write_str("no classifier artifacts loaded"),
            Self::Model(error) => write!(f, "classifier failed: {error}"),
            Self::InvalidReading { field } => write!(f, "reading `{field}` is not a finite number"),
        }
    }
}

#[derive(Debug)]
pub enum TierOutcome {
    Ok(CropRecommendation),
    Degraded(DegradeReason),
}

#[derive(Debug)]
pub struct Degradation {
    pub tier: MethodTier,
    pub reason: DegradeReason,
}

#[derive(Debug)]
pub struct Evaluation {
    pub recommendation: CropRecommendation,
    pub degradations: Vec<Degradation>,
}

/// Explicitly constructed and shared read-only by request handlers.
#[derive(Debug, Default)]
pub struct DecisionEngine {
    districts: DistrictFeatureTable,
    classifier: ClassifierState,
}

impl DecisionEngine {
    pub fn new(districts: DistrictFeatureTable, classifier: ClassifierState) -> Self {
        Self { districts, classifier }
    }

    pub fn rule_based() -> Self {
        Self::default()
    }

    pub fn has_model(&self) -> bool {
        self.classifier.is_loaded()
    }

    pub fn recommend(&self, sample: &SoilSample) -> CropRecommendation {
        self.evaluate(sample).recommendation
    }

    pub fn evaluate(&self, sample: &SoilSample) -> Evaluation {
        let mut degradations = Vec::new();

        let model_outcome = match &self.classifier {
            ClassifierState::Unloaded => TierOutcome::Degraded(DegradeReason::ModelUnavailable),
            ClassifierState::Loaded(bundle) => self.model_tier(bundle, sample),
        };
        let rule_outcome = match model_outcome {
            TierOutcome::Ok(recommendation) => {
                return Evaluation { recommendation, degradations };
            }
            TierOutcome::Degraded(reason) => {
                degradations.push(Degradation { tier: MethodTier::MlModel, reason });
                rule_tier(sample)
            }
        };

        let recommendation = match rule_outcome {
            TierOutcome::Ok(recommendation) => recommendation,
            TierOutcome::Degraded(reason) => {
                degradations.push(Degradation { tier: MethodTier::RuleBased, reason });
                default_tier()
            }
        };

        Evaluation { recommendation, degradations }
    }

    fn model_tier(&self, bundle: &ModelBundle, sample: &SoilSample) -> TierOutcome {
        match self.predict_with_model(bundle, sample) {
            Ok(recommendation) => TierOutcome::Ok(recommendation),
            Err(error) => TierOutcome::Degraded(DegradeReason::Model(error)),
        }
    }

    fn predict_with_model(
        &self,
        bundle: &ModelBundle,
        sample: &SoilSample,
    ) -> Result<CropRecommendation, ClassifierError> {
        let agro = self.districts.features_for(&sample.district);
        let district_code =
            bundle.encoder.encode(CategoricalFeature::District, &sample.district)?;
        let soil_code =
            bundle.encoder.encode(CategoricalFeature::SoilType, sample.soil_type.as_str())?;

        let features = [
            sample.nitrogen,
            sample.phosphorus,
            sample.potassium,
            sample.ph,
            agro.rainfall,
            agro.temperature,
            district_code,
            soil_code,
        ];
        let scaled = bundle.scaler.transform(&features)?;
        let probabilities = bundle.classifier.predict_proba(&scaled)?;

        let classes = bundle.classifier.classes();
        if probabilities.len() != classes.len() {
            return Err(ClassifierError::ShapeMismatch {
                expected: classes.len(),
                actual: probabilities.len(),
            });
        }
        if probabilities.iter().any(|value| !value.is_finite()) {
            return Err(ClassifierError::DegenerateOutput);
        }

        let (index, confidence) = arg_max(&probabilities).ok_or(ClassifierError::DegenerateOutput)?;
        let crop = classes.get(index).cloned().ok_or(ClassifierError::DegenerateOutput)?;
        let probability_map: BTreeMap<String, f64> =
            classes.iter().cloned().zip(probabilities.iter().copied()).collect();

        Ok(CropRecommendation {
            reasoning: Some(format!(
                "Predicted by trained model from soil nutrients and {} climate",
                sample.district.trim()
            )),
            crop,
            confidence: confidence.clamp(0.0, 1.0),
            method: MethodTier::MlModel,
            probabilities: Some(probability_map),
        })
    }
}

fn rule_tier(sample: &SoilSample) -> TierOutcome {
    if !sample.ph.is_finite() {
        return TierOutcome::Degraded(DegradeReason::InvalidReading { field: "ph" });
    }

    let base = match &sample.soil_type {
        SoilType::Sandy => PEARL_MILLET,
        SoilType::Loamy => RICE,
        SoilType::Alluvial if sample.ph > ALLUVIAL_WHEAT_PH => WHEAT,
        SoilType::Alluvial | SoilType::Other(_) => MAIZE,
    };

    // rotation: never follow wheat with another wheat crop
    let crop = if sample.last_crop_mentions("wheat") {
        if base == WHEAT {
            RICE
        } else {
            MAIZE
        }
    } else {
        base
    };

    TierOutcome::Ok(CropRecommendation {
        crop: crop.to_string(),
        confidence: RULE_BASED_CONFIDENCE,
        method: MethodTier::RuleBased,
        reasoning: Some(format!(
            "Based on {} soil type and regional patterns",
            sample.soil_type
        )),
        probabilities: None,
    })
}

fn default_tier() -> CropRecommendation {
    CropRecommendation {
        crop: MAIZE.to_string(),
        confidence: DEFAULT_CONFIDENCE,
        method: MethodTier::Default,
        reasoning: Some(DEFAULT_REASONING.to_string()),
        probabilities: None,
    }
}

#[cfg(test)]
mod tests {
    use super::{DecisionEngine, DegradeReason, DEFAULT_CONFIDENCE, RULE_BASED_CONFIDENCE};
    use crate::advisory::classifier::{
        ClassifierState, LabelEncoder, ModelBundle, SoftmaxClassifier, StandardScaler,
    };
    use crate::advisory::districts::DistrictFeatureTable;
    use crate::domain::recommendation::{MethodTier, MAIZE, PEARL_MILLET, RICE, WHEAT};
    use crate::domain::soil::{SoilSample, SoilType};

    fn sample(soil_type: SoilType, ph: f64, last_crop: Option<&str>) -> SoilSample {
        SoilSample {
            nitrogen: 25.0,
            phosphorus: 18.0,
            potassium: 220.0,
            ph,
            district: "Ludhiana".to_string(),
            soil_type,
            last_crop: last_crop.map(str::to_string),
        }
    }

    fn engine_with_model() -> DecisionEngine {
        // Weight only the nitrogen feature: high N favours Wheat, low N favours Rice.
        let mut wheat_row = vec![0.0; 8];
        wheat_row[0] = 1.0;
        let mut rice_row = vec![0.0; 8];
        rice_row[0] = -1.0;

        let bundle = ModelBundle::new(
            Box::new(SoftmaxClassifier {
                classes: vec![WHEAT.to_string(), RICE.to_string()],
                weights: vec![wheat_row, rice_row],
                intercepts: vec![0.0, 0.0],
            }),
            Box::new(StandardScaler { mean: vec![50.0; 8], scale: vec![25.0; 8] }),
            Box::new(LabelEncoder {
                districts: vec!["ludhiana".to_string(), "patiala".to_string()],
                soil_types: vec!["loamy".to_string(), "alluvial".to_string()],
            }),
        );
        DecisionEngine::new(DistrictFeatureTable::default(), ClassifierState::loaded(bundle))
    }

    #[test]
    fn loamy_sample_without_model_is_rule_based_rice() {
        let engine = DecisionEngine::rule_based();
        let evaluation = engine.evaluate(&sample(SoilType::Loamy, 7.2, None));

        assert_eq!(evaluation.recommendation.crop, RICE);
        assert_eq!(evaluation.recommendation.method, MethodTier::RuleBased);
        assert_eq!(evaluation.recommendation.confidence, RULE_BASED_CONFIDENCE);
        assert_eq!(evaluation.degradations.len(), 1);
        assert!(evaluation.degradations[0].reason.is_expected());
    }

    #[test]
    fn base_crop_follows_soil_type() {
        let engine = DecisionEngine::rule_based();

        assert_eq!(engine.recommend(&sample(SoilType::Sandy, 7.0, None)).crop, PEARL_MILLET);
        assert_eq!(engine.recommend(&sample(SoilType::Alluvial, 8.0, None)).crop, WHEAT);
        assert_eq!(
            engine.recommend(&sample(SoilType::Other("black".to_string()), 7.0, None)).crop,
            MAIZE
        );
    }

    #[test]
    fn alluvial_at_exact_threshold_is_maize() {
        let recommendation =
            DecisionEngine::rule_based().recommend(&sample(SoilType::Alluvial, 7.5, None));

        assert_eq!(recommendation.crop, MAIZE);
    }

    #[test]
    fn wheat_history_remaps_wheat_to_rice() {
        let recommendation = DecisionEngine::rule_based()
            .recommend(&sample(SoilType::Alluvial, 8.0, Some("Wheat harvested")));

        assert_eq!(recommendation.crop, RICE);
    }

    #[test]
    fn wheat_history_remaps_other_crops_to_maize() {
        let engine = DecisionEngine::rule_based();

        assert_eq!(engine.recommend(&sample(SoilType::Loamy, 7.0, Some("WHEAT"))).crop, MAIZE);
        assert_eq!(
            engine.recommend(&sample(SoilType::Sandy, 7.0, Some("winter wheat"))).crop,
            MAIZE
        );
        assert_eq!(engine.recommend(&sample(SoilType::Loamy, 7.0, Some("cotton"))).crop, RICE);
    }

    #[test]
    fn non_finite_ph_falls_through_to_default() {
        let evaluation =
            DecisionEngine::rule_based().evaluate(&sample(SoilType::Alluvial, f64::NAN, None));

        assert_eq!(evaluation.recommendation.crop, MAIZE);
        assert_eq!(evaluation.recommendation.method, MethodTier::Default);
        assert_eq!(evaluation.recommendation.confidence, DEFAULT_CONFIDENCE);
        assert_eq!(evaluation.degradations.len(), 2);
        assert_eq!(evaluation.degradations[1].tier, MethodTier::RuleBased);
        assert!(matches!(
            evaluation.degradations[1].reason,
            DegradeReason::InvalidReading { field: "ph" }
        ));
    }

    #[test]
    fn repeated_calls_are_identical() {
        let engine = DecisionEngine::rule_based();
        let input = sample(SoilType::Alluvial, 7.9, Some("rice"));

        assert_eq!(engine.recommend(&input), engine.recommend(&input));
    }

    #[test]
    fn confidence_stays_in_unit_interval_across_inputs() {
        let engines = [DecisionEngine::rule_based(), engine_with_model()];
        let soils = [
            SoilType::Sandy,
            SoilType::Loamy,
            SoilType::Alluvial,
            SoilType::Other("clay".to_string()),
        ];
        let readings = [-50.0, 0.0, 7.5, 120.0, 1.0e6, f64::INFINITY];

        for engine in &engines {
            for soil in &soils {
                for value in readings {
                    let mut input = sample(soil.clone(), value, None);
                    input.nitrogen = value;
                    let recommendation = engine.recommend(&input);
                    assert!((0.0..=1.0).contains(&recommendation.confidence));
                }
            }
        }
    }

    #[test]
    fn loaded_model_produces_ml_recommendation_with_probabilities() {
        let engine = engine_with_model();
        let mut input = sample(SoilType::Loamy, 7.0, None);
        input.nitrogen = 200.0;

        let evaluation = engine.evaluate(&input);
        let recommendation = evaluation.recommendation;

        assert!(evaluation.degradations.is_empty());
        assert_eq!(recommendation.method, MethodTier::MlModel);
        assert_eq!(recommendation.crop, WHEAT);
        assert!(recommendation.confidence > 0.5 && recommendation.confidence <= 1.0);
        let probabilities = recommendation.probabilities.expect("probabilities present");
        let total: f64 = probabilities.values().sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn unseen_category_degrades_to_rule_tier() {
        let engine = engine_with_model();
        let mut input = sample(SoilType::Sandy, 7.0, None);
        input.district = "Bathinda".to_string();

        let evaluation = engine.evaluate(&input);

        assert_eq!(evaluation.recommendation.method, MethodTier::RuleBased);
        assert_eq!(evaluation.recommendation.crop, PEARL_MILLET);
        assert_eq!(evaluation.degradations[0].tier, MethodTier::MlModel);
        assert!(matches!(evaluation.degradations[0].reason, DegradeReason::Model(_)));
        assert!(!evaluation.degradations[0].reason.is_expected());
    }
}
