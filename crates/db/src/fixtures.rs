use sqlx::Executor;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

/// Phones of the demo farmers in `config/fixtures/demo_seed_data.sql`.
pub const DEMO_FARMER_PHONES: &[&str] = &["+919800000001", "+919800000002", "+919800000003"];

const DEMO_RECOMMENDATION_PHONE: &str = "+919800000002";
const DEMO_RECOMMENDATION_AT: &str = "2025-01-15T06:30:00+00:00";

/// Deterministic demo dataset: three Punjab farmers and one stored Rice recommendation.
///
/// Loading is idempotent; farmers conflict on phone and the recommendation is
/// guarded by its timestamp.
pub struct DemoSeedDataset;

impl DemoSeedDataset {
    pub const SQL: &str = include_str!("../../../config/fixtures/demo_seed_data.sql");

    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;
        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        let farmers: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(1) FROM farmers WHERE phone IN {}",
            sql_array(DEMO_FARMER_PHONES)
        ))
        .fetch_one(pool)
        .await?;
        let recommendations = Self::demo_recommendation_count(pool).await?;

        Ok(SeedResult { farmers, recommendations })
    }

    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        for phone in DEMO_FARMER_PHONES {
            let exists: i64 =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM farmers WHERE phone = ?1)")
                    .bind(*phone)
                    .fetch_one(pool)
                    .await?;
            checks.push((*phone, exists == 1));
        }

        let recommendations = Self::demo_recommendation_count(pool).await?;
        checks.push(("demo-recommendation", recommendations == 1));

        let all_present = checks.iter().all(|(_, present)| *present);
        Ok(VerificationResult { all_present, checks })
    }

    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let phones = sql_array(DEMO_FARMER_PHONES);
        let mut tx = pool.begin().await?;

        sqlx::query(&format!(
            "DELETE FROM weather_alerts WHERE farmer_id IN \
             (SELECT id FROM farmers WHERE phone IN {phones})"
        ))
        .execute(&mut *tx)
        .await?;
        sqlx::query(&format!(
            "DELETE FROM recommendations WHERE farmer_id IN \
             (SELECT id FROM farmers WHERE phone IN {phones})"
        ))
        .execute(&mut *tx)
        .await?;
        sqlx::query(&format!("DELETE FROM farmers WHERE phone IN {phones}"))
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn demo_recommendation_count(pool: &DbPool) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar(
            "SELECT COUNT(1) FROM recommendations r
             JOIN farmers f ON f.id = r.farmer_id
             WHERE f.phone = ?1 AND r.created_at = ?2",
        )
        .bind(DEMO_RECOMMENDATION_PHONE)
        .bind(DEMO_RECOMMENDATION_AT)
        .fetch_one(pool)
        .await?;
        Ok(count)
    }
}

fn sql_array(values: &[&str]) -> String {
    let quoted = values
        .iter()
        .map(|value| format!("'{}'", value.replace('\'', "''")))
        .collect::<Vec<_>>()
        .join(", ");
    format!("({quoted})")
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeedResult {
    pub farmers: i64,
    pub recommendations: i64,
}

#[derive(Clone, Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}

impl VerificationResult {
    pub fn missing(&self) -> Vec<&'static str> {
        self.checks.iter().filter(|(_, present)| !present).map(|(label, _)| *label).collect()
    }
}
