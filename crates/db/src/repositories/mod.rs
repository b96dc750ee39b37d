use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use smartcrop_core::domain::farmer::{Farmer, FarmerId, NewFarmer};
use smartcrop_core::domain::recommendation::{
    RecommendationId, RecommendationRecord, StoredRecommendation,
};
use smartcrop_core::domain::weather::AlertLogEntry;

pub mod alert_log;
pub mod farmer;
pub mod memory;
pub mod recommendation;

pub use alert_log::SqlAlertLogRepository;
pub use farmer::SqlFarmerRepository;
pub use memory::{
    InMemoryAlertLogRepository, InMemoryFarmerRepository, InMemoryRecommendationRepository,
};
pub use recommendation::SqlRecommendationRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("phone number `{0}` is already registered")]
    DuplicatePhone(String),
}

pub(crate) fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[async_trait]
pub trait FarmerRepository: Send + Sync {
    /// Inserts a new farmer. A phone already on file yields
    /// [`RepositoryError::DuplicatePhone`] and leaves the existing row untouched.
    async fn register(
        &self,
        farmer: NewFarmer,
        created_at: DateTime<Utc>,
    ) -> Result<Farmer, RepositoryError>;

    async fn find_by_phone(&self, phone: &str) -> Result<Option<Farmer>, RepositoryError>;

    /// Returns the farmer for `phone`, creating a minimal row first when none exists.
    async fn get_or_create(
        &self,
        farmer: NewFarmer,
        created_at: DateTime<Utc>,
    ) -> Result<Farmer, RepositoryError>;

    async fn count(&self) -> Result<i64, RepositoryError>;
}

#[async_trait]
pub trait RecommendationRepository: Send + Sync {
    async fn insert(
        &self,
        record: &RecommendationRecord,
    ) -> Result<RecommendationId, RepositoryError>;

    async fn latest_for_farmer(
        &self,
        farmer_id: FarmerId,
    ) -> Result<Option<StoredRecommendation>, RepositoryError>;

    async fn latest_for_district(
        &self,
        district: &str,
    ) -> Result<Option<StoredRecommendation>, RepositoryError>;

    async fn count(&self) -> Result<i64, RepositoryError>;
}

#[async_trait]
pub trait AlertLogRepository: Send + Sync {
    async fn record(&self, entry: &AlertLogEntry) -> Result<i64, RepositoryError>;

    async fn list_for_farmer(
        &self,
        farmer_id: FarmerId,
    ) -> Result<Vec<AlertLogEntry>, RepositoryError>;
}

pub(crate) fn parse_timestamp(field: &str, raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|value| value.with_timezone(&Utc))
        .map_err(|error| RepositoryError::Decode(format!("{field}: {error}")))
}
