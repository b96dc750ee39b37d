//! Crop advisory: reference tables, the decision engine and the record builder.

pub mod classifier;
pub mod districts;
pub mod engine;
pub mod fertilizer;
pub mod record;
pub mod soil_reference;

pub use engine::{DecisionEngine, Evaluation};
pub use record::{
    assess, build_record, FertilizerRequest, RecommendationRequest, ValidatedRequest,
};
