//! Pre-trained crop classifier artifacts.
//!
//! The bundle is three JSON documents produced by the offline training job:
//! a categorical encoder, a standard scaler and a multinomial logistic model.
//! They are loaded once at startup and never mutated afterwards, so a loaded
//! bundle can be shared freely across request handlers.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("artifact `{0}` does not exist")]
    ArtifactMissing(PathBuf),
    #[error("could not read artifact `{path}`: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("could not parse artifact `{path}`: {source}")]
    Parse { path: PathBuf, source: serde_json::Error },
    #[error("invalid artifact: {0}")]
    InvalidArtifact(String),
    #[error("unseen {feature} category `{label}`")]
    UnseenCategory { feature: &'static str, label: String },
    #[error("feature shape mismatch: expected {expected} values, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },
    #[error("classifier produced no usable probabilities")]
    DegenerateOutput,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CategoricalFeature {
    District,
    SoilType,
}

impl CategoricalFeature {
    fn as_str(&self) -> &'static str {
        match self {
            Self::District => "district",
            Self::SoilType => "soil_type",
        }
    }
}

pub trait CategoryEncoder: Send + Sync {
    fn encode(&self, feature: CategoricalFeature, label: &str) -> Result<f64, ClassifierError>;
}

pub trait FeatureScaler: Send + Sync {
    fn transform(&self, features: &[f64]) -> Result<Vec<f64>, ClassifierError>;
}

pub trait CropClassifier: Send + Sync {
    fn classes(&self) -> &[String];

    fn predict_proba(&self, features: &[f64]) -> Result<Vec<f64>, ClassifierError>;
}

/// Index and value of the largest finite entry.
pub fn arg_max(values: &[f64]) -> Option<(usize, f64)> {
    values
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, value)| value.is_finite())
        .fold(None, |best, (index, value)| match best {
            Some((_, best_value)) if best_value >= value => best,
            _ => Some((index, value)),
        })
}

/// Per-feature vocabularies; a label encodes to its index in the vocabulary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LabelEncoder {
    pub districts: Vec<String>,
    pub soil_types: Vec<String>,
}

impl CategoryEncoder for LabelEncoder {
    fn encode(&self, feature: CategoricalFeature, label: &str) -> Result<f64, ClassifierError> {
        let vocabulary = match feature {
            CategoricalFeature::District => &self.districts,
            CategoricalFeature::SoilType => &self.soil_types,
        };
        let needle = label.trim().to_lowercase();
        vocabulary
            .iter()
            .position(|known| known.trim().to_lowercase() == needle)
            .map(|index| index as f64)
            .ok_or_else(|| ClassifierError::UnseenCategory {
                feature: feature.as_str(),
                label: label.to_string(),
            })
    }
}

/// Standardizes each feature as `(x - mean) / scale`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl FeatureScaler for StandardScaler {
    fn transform(&self, features: &[f64]) -> Result<Vec<f64>, ClassifierError> {
        if features.len() != self.mean.len() || self.mean.len() != self.scale.len() {
            return Err(ClassifierError::ShapeMismatch {
                expected: self.mean.len(),
                actual: features.len(),
            });
        }

        Ok(features
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(value, (mean, scale))| {
                // constant features were fitted with zero variance
                let scale = if *scale == 0.0 { 1.0 } else { *scale };
                (value - mean) / scale
            })
            .collect())
    }
}

/// Multinomial logistic regression: one weight row and intercept per class.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SoftmaxClassifier {
    pub classes: Vec<String>,
    pub weights: Vec<Vec<f64>>,
    pub intercepts: Vec<f64>,
}

impl SoftmaxClassifier {
    fn validate(&self) -> Result<(), ClassifierError> {
        if self.classes.is_empty() {
            return Err(ClassifierError::InvalidArtifact("classifier has no classes".to_string()));
        }
        if self.weights.len() != self.classes.len() || self.intercepts.len() != self.classes.len()
        {
            return Err(ClassifierError::InvalidArtifact(format!(
                "classifier has {} classes but {} weight rows and {} intercepts",
                self.classes.len(),
                self.weights.len(),
                self.intercepts.len()
            )));
        }
        Ok(())
    }
}

impl CropClassifier for SoftmaxClassifier {
    fn classes(&self) -> &[String] {
        &self.classes
    }

    fn predict_proba(&self, features: &[f64]) -> Result<Vec<f64>, ClassifierError> {
        let mut scores = Vec::with_capacity(self.classes.len());
        for (row, intercept) in self.weights.iter().zip(&self.intercepts) {
            if row.len() != features.len() {
                return Err(ClassifierError::ShapeMismatch {
                    expected: row.len(),
                    actual: features.len(),
                });
            }
            let score: f64 = row.iter().zip(features).map(|(w, x)| w * x).sum::<f64>() + intercept;
            scores.push(score);
        }

        let max_score = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if !max_score.is_finite() {
            return Err(ClassifierError::DegenerateOutput);
        }

        let exps: Vec<f64> = scores.iter().map(|score| (score - max_score).exp()).collect();
        let total: f64 = exps.iter().sum();
        if !total.is_finite() || total <= 0.0 {
            return Err(ClassifierError::DegenerateOutput);
        }

        Ok(exps.into_iter().map(|value| value / total).collect())
    }
}

/// File locations of the three artifacts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub classifier: PathBuf,
    pub scaler: PathBuf,
    pub encoder: PathBuf,
}

impl ArtifactPaths {
    pub fn in_dir(dir: &Path, classifier: &str, scaler: &str, encoder: &str) -> Self {
        Self {
            classifier: dir.join(classifier),
            scaler: dir.join(scaler),
            encoder: dir.join(encoder),
        }
    }
}

pub struct ModelBundle {
    pub classifier: Box<dyn CropClassifier>,
    pub scaler: Box<dyn FeatureScaler>,
    pub encoder: Box<dyn CategoryEncoder>,
}

impl std::fmt::Debug for ModelBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelBundle").field("classes", &self.classifier.classes()).finish()
    }
}

impl ModelBundle {
    pub fn new(
        classifier: Box<dyn CropClassifier>,
        scaler: Box<dyn FeatureScaler>,
        encoder: Box<dyn CategoryEncoder>,
    ) -> Self {
        Self { classifier, scaler, encoder }
    }

    /// Loads all three artifacts. Any missing file yields
    /// [`ClassifierError::ArtifactMissing`] so callers can tell "never trained" apart
    /// from "trained but broken".
    pub fn load(paths: &ArtifactPaths) -> Result<Self, ClassifierError> {
        for path in [&paths.classifier, &paths.scaler, &paths.encoder] {
            if !path.exists() {
                return Err(ClassifierError::ArtifactMissing(path.clone()));
            }
        }

        let classifier: SoftmaxClassifier = read_json(&paths.classifier)?;
        classifier.validate()?;
        let scaler: StandardScaler = read_json(&paths.scaler)?;
        let encoder: LabelEncoder = read_json(&paths.encoder)?;

        Ok(Self::new(Box::new(classifier), Box::new(scaler), Box::new(encoder)))
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ClassifierError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ClassifierError::Read { path: path.to_path_buf(), source })?;
    serde_json::from_str(&raw)
        .map_err(|source| ClassifierError::Parse { path: path.to_path_buf(), source })
}

/// Whether a trained model is available to the decision engine.
#[derive(Debug, Default)]
pub enum ClassifierState {
    #[default]
    Unloaded,
    Loaded(Box<ModelBundle>),
}

impl ClassifierState {
    pub fn loaded(bundle: ModelBundle) -> Self {
        Self::Loaded(Box::new(bundle))
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded(_))
    }
}
