use std::fmt;

use serde::{Deserialize, Serialize};

/// Baseline soil classification used by the rule tier.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SoilType {
    Sandy,
    Loamy,
    Alluvial,
    Other(String),
}

impl SoilType {
    pub fn parse(label: &str) -> Self {
        let normalized = label.trim().to_ascii_lowercase().replace(['-', '_'], " ");
        match normalized.as_str() {
            "sandy" | "sandy loam" => Self::Sandy,
            "loamy" | "loam" | "loam to clay loam" => Self::Loamy,
            "alluvial" => Self::Alluvial,
            _ => Self::Other(label.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Sandy => "sandy",
            Self::Loamy => "loamy",
            Self::Alluvial => "alluvial",
            Self::Other(label) => label.as_str(),
        }
    }
}

impl fmt::Display for SoilType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for SoilType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SoilType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let label = String::deserialize(deserializer)?;
        Ok(Self::parse(&label))
    }
}

/// Inputs to one recommendation request, with the soil type already resolved from the
/// district reference table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SoilSample {
    pub nitrogen: f64,
    pub phosphorus: f64,
    pub potassium: f64,
    pub ph: f64,
    pub district: String,
    pub soil_type: SoilType,
    pub last_crop: Option<String>,
}

impl SoilSample {
    pub fn last_crop_mentions(&self, needle: &str) -> bool {
        self.last_crop
            .as_deref()
            .map(|crop| crop.to_ascii_lowercase().contains(&needle.to_ascii_lowercase()))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::{SoilSample, SoilType};

    #[test]
    fn soil_labels_collapse_into_closed_set() {
        assert_eq!(SoilType::parse("Sandy Loam"), SoilType::Sandy);
        assert_eq!(SoilType::parse("sandy-loam"), SoilType::Sandy);
        assert_eq!(SoilType::parse("Loam to Clay Loam"), SoilType::Loamy);
        assert_eq!(SoilType::parse(" ALLUVIAL "), SoilType::Alluvial);
        assert_eq!(SoilType::parse("Black Cotton"), SoilType::Other("Black Cotton".to_string()));
    }

    #[test]
    fn last_crop_match_is_case_insensitive_substring() {
        let sample = SoilSample {
            nitrogen: 0.0,
            phosphorus: 0.0,
            potassium: 0.0,
            ph: 7.0,
            district: "patiala".to_string(),
            soil_type: SoilType::Alluvial,
            last_crop: Some("Wheat harvested".to_string()),
        };

        assert!(sample.last_crop_mentions("wheat"));
        assert!(!sample.last_crop_mentions("rice"));
    }
}
