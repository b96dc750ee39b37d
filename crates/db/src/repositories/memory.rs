use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use smartcrop_core::domain::farmer::{Farmer, FarmerId, NewFarmer};
use smartcrop_core::domain::recommendation::{
    RecommendationId, RecommendationRecord, StoredRecommendation,
};
use smartcrop_core::domain::weather::AlertLogEntry;

use super::{AlertLogRepository, FarmerRepository, RecommendationRepository, RepositoryError};

#[derive(Default)]
pub struct InMemoryFarmerRepository {
    farmers: RwLock<HashMap<String, Farmer>>,
}

impl InMemoryFarmerRepository {
    fn build(farmers: &HashMap<String, Farmer>, farmer: NewFarmer, at: DateTime<Utc>) -> Farmer {
        Farmer {
            id: FarmerId(farmers.len() as i64 + 1),
            phone: farmer.phone,
            district: farmer.district,
            taluk: farmer.taluk,
            name: farmer.name,
            created_at: at,
        }
    }
}

#[async_trait::async_trait]
impl FarmerRepository for InMemoryFarmerRepository {
    async fn register(
        &self,
        farmer: NewFarmer,
        created_at: DateTime<Utc>,
    ) -> Result<Farmer, RepositoryError> {
        let mut farmers = self.farmers.write().await;
        if farmers.contains_key(&farmer.phone) {
            return Err(RepositoryError::DuplicatePhone(farmer.phone));
        }
        let stored = Self::build(&farmers, farmer, created_at);
        farmers.insert(stored.phone.clone(), stored.clone());
        Ok(stored)
    }

    async fn find_by_phone(&self, phone: &str) -> Result<Option<Farmer>, RepositoryError> {
        let farmers = self.farmers.read().await;
        Ok(farmers.get(phone).cloned())
    }

    async fn get_or_create(
        &self,
        farmer: NewFarmer,
        created_at: DateTime<Utc>,
    ) -> Result<Farmer, RepositoryError> {
        let mut farmers = self.farmers.write().await;
        if let Some(existing) = farmers.get(&farmer.phone) {
            return Ok(existing.clone());
        }
        let stored = Self::build(&farmers, farmer, created_at);
        farmers.insert(stored.phone.clone(), stored.clone());
        Ok(stored)
    }

    async fn count(&self) -> Result<i64, RepositoryError> {
        Ok(self.farmers.read().await.len() as i64)
    }
}

#[derive(Default)]
pub struct InMemoryRecommendationRepository {
    rows: RwLock<Vec<StoredRecommendation>>,
}

impl InMemoryRecommendationRepository {
    async fn latest_matching(
        &self,
        predicate: impl Fn(&RecommendationRecord) -> bool,
    ) -> Option<StoredRecommendation> {
        let rows = self.rows.read().await;
        rows.iter()
            .filter(|row| predicate(&row.record))
            .max_by_key(|row| (row.record.created_at, row.id.0))
            .cloned()
    }
}

#[async_trait::async_trait]
impl RecommendationRepository for InMemoryRecommendationRepository {
    async fn insert(
        &self,
        record: &RecommendationRecord,
    ) -> Result<RecommendationId, RepositoryError> {
        let mut rows = self.rows.write().await;
        let id = RecommendationId(rows.len() as i64 + 1);
        rows.push(StoredRecommendation { id, record: record.clone() });
        Ok(id)
    }

    async fn latest_for_farmer(
        &self,
        farmer_id: FarmerId,
    ) -> Result<Option<StoredRecommendation>, RepositoryError> {
        Ok(self.latest_matching(|record| record.farmer_id == Some(farmer_id)).await)
    }

    async fn latest_for_district(
        &self,
        district: &str,
    ) -> Result<Option<StoredRecommendation>, RepositoryError> {
        let district = district.trim();
        Ok(self.latest_matching(|record| record.district.eq_ignore_ascii_case(district)).await)
    }

    async fn count(&self) -> Result<i64, RepositoryError> {
        Ok(self.rows.read().await.len() as i64)
    }
}

#[derive(Default)]
pub struct InMemoryAlertLogRepository {
    entries: RwLock<Vec<AlertLogEntry>>,
}

#[async_trait::async_trait]
impl AlertLogRepository for InMemoryAlertLogRepository {
    async fn record(&self, entry: &AlertLogEntry) -> Result<i64, RepositoryError> {
        let mut entries = self.entries.write().await;
        entries.push(entry.clone());
        Ok(entries.len() as i64)
    }

    async fn list_for_farmer(
        &self,
        farmer_id: FarmerId,
    ) -> Result<Vec<AlertLogEntry>, RepositoryError> {
        let entries = self.entries.read().await;
        let mut matching: Vec<AlertLogEntry> =
            entries.iter().filter(|entry| entry.farmer_id == Some(farmer_id)).cloned().collect();
        matching.sort_by_key(|entry| entry.sent_at);
        Ok(matching)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use smartcrop_core::advisory::fertilizer::fertilizer_gap;
    use smartcrop_core::domain::farmer::NewFarmer;
    use smartcrop_core::domain::recommendation::{MethodTier, RecommendationRecord};
    use smartcrop_core::domain::soil::SoilType;

    use crate::repositories::{
        FarmerRepository, InMemoryFarmerRepository, InMemoryRecommendationRepository,
        RecommendationRepository, RepositoryError,
    };

    #[tokio::test]
    async fn in_memory_farmer_repo_enforces_unique_phone() {
        let repo = InMemoryFarmerRepository::default();
        let farmer = NewFarmer { phone: "+911".to_string(), ..NewFarmer::default() };

        let first = repo.register(farmer.clone(), Utc::now()).await.expect("register");
        let error = repo.register(farmer.clone(), Utc::now()).await.expect_err("duplicate");
        let reused = repo.get_or_create(farmer, Utc::now()).await.expect("get or create");

        assert!(matches!(error, RepositoryError::DuplicatePhone(_)));
        assert_eq!(reused.id, first.id);
        assert_eq!(repo.count().await.expect("count"), 1);
    }

    #[tokio::test]
    async fn in_memory_recommendation_repo_returns_newest_for_district() {
        let repo = InMemoryRecommendationRepository::default();
        let now = Utc::now();
        let record = |crop: &str, offset: i64| RecommendationRecord {
            farmer_id: None,
            district: "Moga".to_string(),
            soil_type: SoilType::Loamy,
            nitrogen: 10.0,
            phosphorus: 10.0,
            potassium: 10.0,
            ph: 7.0,
            last_crop: None,
            crop: crop.to_string(),
            confidence: 0.75,
            method: MethodTier::RuleBased,
            reasoning: String::new(),
            probabilities: None,
            fertilizer_gap: fertilizer_gap(10.0, 10.0, 10.0, crop),
            created_at: now + Duration::minutes(offset),
        };

        repo.insert(&record("Rice", 5)).await.expect("insert");
        repo.insert(&record("Maize", 1)).await.expect("insert");

        let latest = repo.latest_for_district("moga").await.expect("lookup").expect("row");
        assert_eq!(latest.record.crop, "Rice");
    }
}
