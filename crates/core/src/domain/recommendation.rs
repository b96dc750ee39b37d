use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::farmer::FarmerId;
use crate::domain::soil::SoilType;

pub const PEARL_MILLET: &str = "Pearl Millet (Bajra)";
pub const RICE: &str = "Rice";
pub const MAIZE: &str = "Maize";
pub const WHEAT: &str = "Wheat";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodTier {
    MlModel,
    RuleBased,
    Default,
}

impl MethodTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MlModel => "ml_model",
            Self::RuleBased => "rule_based",
            Self::Default => "default",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "ml_model" => Some(Self::MlModel),
            "rule_based" => Some(Self::RuleBased),
            "default" => Some(Self::Default),
            _ => None,
        }
    }
}

impl fmt::Display for MethodTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CropRecommendation {
    pub crop: String,
    pub confidence: f64,
    pub method: MethodTier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probabilities: Option<BTreeMap<String, f64>>,
}

/// Commercial product quantities (kg/ha) covering a nutrient gap.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductEstimate {
    pub urea: f64,
    pub dap: f64,
    pub mop: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FertilizerGap {
    pub nitrogen_gap: f64,
    pub phosphorus_gap: f64,
    pub potassium_gap: f64,
    pub total_fertilizer: f64,
    pub recommendations: ProductEstimate,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecommendationId(pub i64);

/// Flat row persisted once per recommend call and echoed back to the caller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecommendationRecord {
    pub farmer_id: Option<FarmerId>,
    pub district: String,
    pub soil_type: SoilType,
    pub nitrogen: f64,
    pub phosphorus: f64,
    pub potassium: f64,
    pub ph: f64,
    pub last_crop: Option<String>,
    pub crop: String,
    pub confidence: f64,
    pub method: MethodTier,
    pub reasoning: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probabilities: Option<BTreeMap<String, f64>>,
    pub fertilizer_gap: FertilizerGap,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredRecommendation {
    pub id: RecommendationId,
    #[serde(flatten)]
    pub record: RecommendationRecord,
}
