pub mod advisory;
pub mod alerts;
pub mod config;
pub mod domain;
pub mod errors;
pub mod market;

pub use advisory::classifier::{ArtifactPaths, ClassifierError, ClassifierState, ModelBundle};
pub use advisory::districts::DistrictFeatureTable;
pub use advisory::engine::{DecisionEngine, Degradation, DegradeReason, Evaluation};
pub use advisory::fertilizer::fertilizer_gap;
pub use advisory::record::{
    assess, build_record, Assessment, FertilizerRequest, RecommendationRequest,
};
pub use advisory::soil_reference::{DistrictSoil, SoilReferenceTable, SoilTableError};
pub use alerts::{evaluate_alerts, format_crop_alert, format_weather_alert, CropAlert};
pub use domain::farmer::{Farmer, FarmerId, NewFarmer};
pub use domain::recommendation::{
    CropRecommendation, FertilizerGap, MethodTier, RecommendationId, RecommendationRecord,
    StoredRecommendation,
};
pub use domain::soil::{SoilSample, SoilType};
pub use domain::weather::{
    AlertKind, AlertLogEntry, AlertType, Severity, WeatherAlert, WeatherSnapshot,
};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use market::{market_prices, MarketPrice};
