use std::collections::BTreeMap;

use sqlx::Row;

use smartcrop_core::domain::farmer::FarmerId;
use smartcrop_core::domain::recommendation::{
    FertilizerGap, MethodTier, RecommendationId, RecommendationRecord, StoredRecommendation,
};
use smartcrop_core::domain::soil::SoilType;

use super::{parse_timestamp, RecommendationRepository, RepositoryError};
use crate::DbPool;

const SELECT_COLUMNS: &str = "SELECT id, farmer_id, district, soil_type, nitrogen, phosphorus,
        potassium, ph, last_crop, crop, confidence, method, reasoning, probabilities_json,
        fertilizer_gap_json, created_at
 FROM recommendations";

pub struct SqlRecommendationRepository {
    pool: DbPool,
}

impl SqlRecommendationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn decode<T>(result: Result<T, sqlx::Error>) -> Result<T, RepositoryError> {
    result.map_err(|e| RepositoryError::Decode(e.to_string()))
}

fn row_to_recommendation(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<StoredRecommendation, RepositoryError> {
    let id: i64 = decode(row.try_get("id"))?;
    let farmer_id: Option<i64> = decode(row.try_get("farmer_id"))?;
    let soil_type: String = decode(row.try_get("soil_type"))?;
    let method_str: String = decode(row.try_get("method"))?;
    let probabilities_json: Option<String> = decode(row.try_get("probabilities_json"))?;
    let gap_json: String = decode(row.try_get("fertilizer_gap_json"))?;
    let created_at_str: String = decode(row.try_get("created_at"))?;

    let method = MethodTier::parse(&method_str)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown method tier `{method_str}`")))?;
    let probabilities = probabilities_json
        .map(|raw| serde_json::from_str::<BTreeMap<String, f64>>(&raw))
        .transpose()
        .map_err(|error| RepositoryError::Decode(error.to_string()))?;
    let fertilizer_gap: FertilizerGap = serde_json::from_str(&gap_json)
        .map_err(|error| RepositoryError::Decode(error.to_string()))?;

    Ok(StoredRecommendation {
        id: RecommendationId(id),
        record: RecommendationRecord {
            farmer_id: farmer_id.map(FarmerId),
            district: decode(row.try_get("district"))?,
            soil_type: SoilType::parse(&soil_type),
            nitrogen: decode(row.try_get("nitrogen"))?,
            phosphorus: decode(row.try_get("phosphorus"))?,
            potassium: decode(row.try_get("potassium"))?,
            ph: decode(row.try_get("ph"))?,
            last_crop: decode(row.try_get("last_crop"))?,
            crop: decode(row.try_get("crop"))?,
            confidence: decode(row.try_get("confidence"))?,
            method,
            reasoning: decode(row.try_get("reasoning"))?,
            probabilities,
            fertilizer_gap,
            created_at: parse_timestamp("recommendations.created_at", &created_at_str)?,
        },
    })
}

#[async_trait::async_trait]
impl RecommendationRepository for SqlRecommendationRepository {
    async fn insert(
        &self,
        record: &RecommendationRecord,
    ) -> Result<RecommendationId, RepositoryError> {
        let probabilities_json = record
            .probabilities
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|error| RepositoryError::Decode(error.to_string()))?;
        let gap_json = serde_json::to_string(&record.fertilizer_gap)
            .map_err(|error| RepositoryError::Decode(error.to_string()))?;

        let result = sqlx::query(
            "INSERT INTO recommendations (
                 farmer_id, district, soil_type, nitrogen, phosphorus, potassium, ph, last_crop,
                 crop, confidence, method, reasoning, probabilities_json, fertilizer_gap_json,
                 created_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.farmer_id.map(|id| id.0))
        .bind(&record.district)
        .bind(record.soil_type.as_str())
        .bind(record.nitrogen)
        .bind(record.phosphorus)
        .bind(record.potassium)
        .bind(record.ph)
        .bind(&record.last_crop)
        .bind(&record.crop)
        .bind(record.confidence)
        .bind(record.method.as_str())
        .bind(&record.reasoning)
        .bind(&probabilities_json)
        .bind(&gap_json)
        .bind(record.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(RecommendationId(result.last_insert_rowid()))
    }

    async fn latest_for_farmer(
        &self,
        farmer_id: FarmerId,
    ) -> Result<Option<StoredRecommendation>, RepositoryError> {
        let row = sqlx::query(&format!(
            "{SELECT_COLUMNS} WHERE farmer_id = ? ORDER BY created_at DESC, id DESC LIMIT 1"
        ))
        .bind(farmer_id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_recommendation).transpose()
    }

    async fn latest_for_district(
        &self,
        district: &str,
    ) -> Result<Option<StoredRecommendation>, RepositoryError> {
        let row = sqlx::query(&format!(
            "{SELECT_COLUMNS} WHERE district = ? COLLATE NOCASE
             ORDER BY created_at DESC, id DESC LIMIT 1"
        ))
        .bind(district.trim())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_recommendation).transpose()
    }

    async fn count(&self) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM recommendations")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::{Duration, TimeZone, Utc};

    use smartcrop_core::advisory::fertilizer::fertilizer_gap;
    use smartcrop_core::domain::farmer::NewFarmer;
    use smartcrop_core::domain::recommendation::{MethodTier, RecommendationRecord};
    use smartcrop_core::domain::soil::SoilType;

    use super::SqlRecommendationRepository;
    use crate::repositories::{FarmerRepository, RecommendationRepository, SqlFarmerRepository};
    use crate::{connect_with_settings, migrations, DbPool};

    async fn setup() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    fn record(district: &str, crop: &str, minutes: i64) -> RecommendationRecord {
        let base = Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).single().expect("timestamp");
        RecommendationRecord {
            farmer_id: None,
            district: district.to_string(),
            soil_type: SoilType::Loamy,
            nitrogen: 25.0,
            phosphorus: 18.0,
            potassium: 220.0,
            ph: 7.2,
            last_crop: None,
            crop: crop.to_string(),
            confidence: 0.75,
            method: MethodTier::RuleBased,
            reasoning: "Based on loamy soil type and regional patterns".to_string(),
            probabilities: None,
            fertilizer_gap: fertilizer_gap(25.0, 18.0, 220.0, crop),
            created_at: base + Duration::minutes(minutes),
        }
    }

    #[tokio::test]
    async fn insert_without_farmer_round_trips() {
        let repo = SqlRecommendationRepository::new(setup().await);
        let mut stored = record("Ludhiana", "Rice", 0);
        stored.last_crop = Some("wheat".to_string());
        stored.method = MethodTier::MlModel;
        stored.probabilities = Some(BTreeMap::from([("Rice".to_string(), 0.9)]));

        let id = repo.insert(&stored).await.expect("insert");
        let latest =
            repo.latest_for_district("ludhiana").await.expect("lookup").expect("row exists");

        assert_eq!(latest.id, id);
        assert_eq!(latest.record, stored);
        assert_eq!(repo.count().await.expect("count"), 1);
    }

    #[tokio::test]
    async fn latest_lookups_pick_newest_row() {
        let pool = setup().await;
        let farmers = SqlFarmerRepository::new(pool.clone());
        let repo = SqlRecommendationRepository::new(pool);
        let farmer = farmers
            .register(NewFarmer { phone: "+911".to_string(), ..NewFarmer::default() }, Utc::now())
            .await
            .expect("farmer");

        let mut older = record("Patiala", "Wheat", 0);
        older.farmer_id = Some(farmer.id);
        let mut newer = record("Patiala", "Maize", 10);
        newer.farmer_id = Some(farmer.id);
        repo.insert(&newer).await.expect("insert newer");
        repo.insert(&older).await.expect("insert older");
        repo.insert(&record("Patiala", "Rice", 5)).await.expect("insert anonymous");

        let for_farmer =
            repo.latest_for_farmer(farmer.id).await.expect("lookup").expect("farmer row");
        let for_district =
            repo.latest_for_district("PATIALA").await.expect("lookup").expect("district row");

        assert_eq!(for_farmer.record.crop, "Maize");
        assert_eq!(for_district.record.crop, "Maize");
        assert!(repo.latest_for_district("Moga").await.expect("lookup").is_none());
    }
}
