use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::advisory::districts::normalize_district;
use crate::domain::soil::SoilType;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DistrictSoil {
    pub district: String,
    pub region: String,
    pub soil_type: SoilType,
}

#[derive(Debug, Error)]
pub enum SoilTableError {
    #[error("could not read soil reference table `{path}`: {source}")]
    Read { path: PathBuf, source: csv::Error },
    #[error("soil reference table `{path}` has no rows")]
    Empty { path: PathBuf },
}

const PUNJAB_SOILS: &[(&str, &str, &str)] = &[
    ("Amritsar", "Majha", "alluvial"),
    ("Bathinda", "Malwa", "sandy"),
    ("Fazilka", "Malwa", "sandy"),
    ("Firozpur", "Malwa", "sandy loam"),
    ("Hoshiarpur", "Doaba", "loam to clay loam"),
    ("Jalandhar", "Doaba", "loamy"),
    ("Ludhiana", "Malwa", "loamy"),
    ("Moga", "Malwa", "loamy"),
    ("Patiala", "Malwa", "alluvial"),
    ("Sangrur", "Malwa", "alluvial"),
];

/// District -> soil type reference. A lookup miss is a hard error for the recommend path.
#[derive(Clone, Debug)]
pub struct SoilReferenceTable {
    entries: Vec<DistrictSoil>,
}

impl Default for SoilReferenceTable {
    fn default() -> Self {
        Self::new(
            PUNJAB_SOILS
                .iter()
                .map(|(district, region, soil)| DistrictSoil {
                    district: district.to_string(),
                    region: region.to_string(),
                    soil_type: SoilType::parse(soil),
                })
                .collect(),
        )
    }
}

#[derive(Debug, Deserialize)]
struct SoilRow {
    district: String,
    #[serde(default)]
    region: String,
    soil_type: String,
}

impl SoilReferenceTable {
    pub fn new(entries: Vec<DistrictSoil>) -> Self {
        Self { entries }
    }

    /// Loads `district,region,soil_type` rows; extra columns are ignored.
    pub fn from_csv_path(path: &Path) -> Result<Self, SoilTableError> {
        let read_error = |source| SoilTableError::Read { path: path.to_path_buf(), source };
        let mut reader =
            csv::ReaderBuilder::new().trim(csv::Trim::All).from_path(path).map_err(read_error)?;

        let mut entries = Vec::new();
        for row in reader.deserialize::<SoilRow>() {
            let row = row.map_err(read_error)?;
            entries.push(DistrictSoil {
                district: row.district,
                region: row.region,
                soil_type: SoilType::parse(&row.soil_type),
            });
        }

        if entries.is_empty() {
            return Err(SoilTableError::Empty { path: path.to_path_buf() });
        }
        Ok(Self::new(entries))
    }

    pub fn lookup(&self, district: &str) -> Result<&DistrictSoil, DomainError> {
        let key = normalize_district(district);
        self.entries
            .iter()
            .find(|entry| normalize_district(&entry.district) == key)
            .ok_or_else(|| DomainError::UnknownDistrict(district.trim().to_string()))
    }

    pub fn entries(&self) -> &[DistrictSoil] {
        &self.entries
    }
}
