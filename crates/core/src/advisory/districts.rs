use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Long-run agro-climatic features for a district.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgroFeatures {
    pub rainfall: f64,
    pub temperature: f64,
}

pub const DEFAULT_AGRO_FEATURES: AgroFeatures = AgroFeatures { rainfall: 600.0, temperature: 28.0 };

const PUNJAB_FEATURES: &[(&str, f64, f64)] = &[
    ("patiala", 650.0, 28.0),
    ("ludhiana", 600.0, 29.0),
    ("amritsar", 700.0, 27.0),
    ("jalandhar", 650.0, 28.0),
    ("fazilka", 400.0, 32.0),
    ("bathinda", 450.0, 31.0),
    ("moga", 600.0, 29.0),
    ("sangrur", 550.0, 30.0),
    ("firozpur", 400.0, 32.0),
    ("hoshiarpur", 800.0, 26.0),
];

/// Read-only district -> features lookup. Unknown districts resolve to
/// [`DEFAULT_AGRO_FEATURES`]; the features are advisory, not authoritative.
#[derive(Clone, Debug)]
pub struct DistrictFeatureTable {
    features: HashMap<String, AgroFeatures>,
}

impl Default for DistrictFeatureTable {
    fn default() -> Self {
        Self::new(PUNJAB_FEATURES.iter().map(|(district, rainfall, temperature)| {
            (district.to_string(), AgroFeatures { rainfall: *rainfall, temperature: *temperature })
        }))
    }
}

impl DistrictFeatureTable {
    pub fn new(entries: impl IntoIterator<Item = (String, AgroFeatures)>) -> Self {
        let features = entries
            .into_iter()
            .map(|(district, features)| (normalize_district(&district), features))
            .collect();
        Self { features }
    }

    pub fn features_for(&self, district: &str) -> AgroFeatures {
        self.features.get(&normalize_district(district)).copied().unwrap_or(DEFAULT_AGRO_FEATURES)
    }

    pub fn contains(&self, district: &str) -> bool {
        self.features.contains_key(&normalize_district(district))
    }
}

pub fn normalize_district(district: &str) -> String {
    district.trim().to_lowercase()
}
