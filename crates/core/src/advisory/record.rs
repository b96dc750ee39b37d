use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::advisory::engine::{DecisionEngine, Evaluation};
use crate::advisory::fertilizer::fertilizer_gap;
use crate::advisory::soil_reference::{DistrictSoil, SoilReferenceTable};
use crate::domain::farmer::FarmerId;
use crate::domain::recommendation::{FertilizerGap, RecommendationRecord};
use crate::domain::soil::SoilSample;
use crate::errors::DomainError;

/// Raw `/recommend` payload. Numeric fields accept JSON numbers or numeric strings.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RecommendationRequest {
    #[serde(default)]
    pub district: Option<String>,
    #[serde(default)]
    pub nitrogen: Option<Value>,
    #[serde(default)]
    pub phosphorus: Option<Value>,
    #[serde(default)]
    pub potassium: Option<Value>,
    #[serde(default)]
    pub ph: Option<Value>,
    #[serde(default, alias = "lastCrop")]
    pub last_crop: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ValidatedRequest {
    pub district: String,
    pub nitrogen: f64,
    pub phosphorus: f64,
    pub potassium: f64,
    pub ph: f64,
    pub last_crop: Option<String>,
    pub phone: Option<String>,
}

impl RecommendationRequest {
    pub fn validate(&self) -> Result<ValidatedRequest, DomainError> {
        let district = self
            .district
            .as_deref()
            .map(str::trim)
            .filter(|district| !district.is_empty())
            .ok_or(DomainError::MissingField("district"))?;

        Ok(ValidatedRequest {
            district: district.to_string(),
            nitrogen: required_number("nitrogen", self.nitrogen.as_ref())?,
            phosphorus: required_number("phosphorus", self.phosphorus.as_ref())?,
            potassium: required_number("potassium", self.potassium.as_ref())?,
            ph: required_number("ph", self.ph.as_ref())?,
            last_crop: non_blank(self.last_crop.as_deref()),
            phone: non_blank(self.phone.as_deref()),
        })
    }
}

/// Raw `/fertilizer` payload. A missing or unknown crop sizes the gap against the
/// generic target.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct FertilizerRequest {
    #[serde(default)]
    pub nitrogen: Option<Value>,
    #[serde(default)]
    pub phosphorus: Option<Value>,
    #[serde(default)]
    pub potassium: Option<Value>,
    #[serde(default)]
    pub crop: Option<String>,
}

impl FertilizerRequest {
    pub fn estimate(&self) -> Result<FertilizerGap, DomainError> {
        let nitrogen = required_number("nitrogen", self.nitrogen.as_ref())?;
        let phosphorus = required_number("phosphorus", self.phosphorus.as_ref())?;
        let potassium = required_number("potassium", self.potassium.as_ref())?;
        let crop = non_blank(self.crop.as_deref()).unwrap_or_default();

        Ok(fertilizer_gap(nitrogen, phosphorus, potassium, &crop))
    }
}

fn required_number(field: &'static str, value: Option<&Value>) -> Result<f64, DomainError> {
    let value = match value {
        None | Some(Value::Null) => return Err(DomainError::MissingField(field)),
        Some(value) => value,
    };

    let number = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(raw) => raw.trim().parse::<f64>().ok(),
        _ => None,
    };

    match number {
        Some(number) if number.is_finite() => Ok(number),
        _ => Err(DomainError::InvalidField {
            field,
            reason: format!("expected a number, got {value}"),
        }),
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|value| !value.is_empty()).map(str::to_string)
}

impl ValidatedRequest {
    pub fn to_sample(&self, soil: &DistrictSoil) -> SoilSample {
        SoilSample {
            nitrogen: self.nitrogen,
            phosphorus: self.phosphorus,
            potassium: self.potassium,
            ph: self.ph,
            district: soil.district.clone(),
            soil_type: soil.soil_type.clone(),
            last_crop: self.last_crop.clone(),
        }
    }
}

/// Engine output for one request, before it is tied to a farmer and timestamped.
#[derive(Debug)]
pub struct Assessment {
    pub sample: SoilSample,
    pub evaluation: Evaluation,
    pub fertilizer_gap: FertilizerGap,
}

/// Resolves the district, runs the engine and sizes the fertilizer gap. The district
/// lookup is the only failure; everything after it always yields a result.
pub fn assess(
    engine: &DecisionEngine,
    soils: &SoilReferenceTable,
    request: &ValidatedRequest,
) -> Result<Assessment, DomainError> {
    let soil = soils.lookup(&request.district)?;
    let sample = request.to_sample(soil);
    let evaluation = engine.evaluate(&sample);
    let fertilizer_gap = fertilizer_gap(
        sample.nitrogen,
        sample.phosphorus,
        sample.potassium,
        &evaluation.recommendation.crop,
    );

    Ok(Assessment { sample, evaluation, fertilizer_gap })
}

pub fn build_record(
    assessment: &Assessment,
    farmer_id: Option<FarmerId>,
    created_at: DateTime<Utc>,
) -> RecommendationRecord {
    let sample = &assessment.sample;
    let recommendation = &assessment.evaluation.recommendation;

    RecommendationRecord {
        farmer_id,
        district: sample.district.clone(),
        soil_type: sample.soil_type.clone(),
        nitrogen: sample.nitrogen,
        phosphorus: sample.phosphorus,
        potassium: sample.potassium,
        ph: sample.ph,
        last_crop: sample.last_crop.clone(),
        crop: recommendation.crop.clone(),
        confidence: recommendation.confidence,
        method: recommendation.method,
        reasoning: recommendation.reasoning.clone().unwrap_or_default(),
        probabilities: recommendation.probabilities.clone(),
        fertilizer_gap: assessment.fertilizer_gap.clone(),
        created_at,
    }
}
