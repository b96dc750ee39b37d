use chrono::{DateTime, Utc};
use sqlx::Row;

use smartcrop_core::domain::farmer::{Farmer, FarmerId, NewFarmer};

use super::{is_unique_violation, parse_timestamp, FarmerRepository, RepositoryError};
use crate::DbPool;

pub struct SqlFarmerRepository {
    pool: DbPool,
}

impl SqlFarmerRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_farmer(row: &sqlx::sqlite::SqliteRow) -> Result<Farmer, RepositoryError> {
    let id: i64 = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let phone: String = row.try_get("phone").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let district: String =
        row.try_get("district").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let taluk: String = row.try_get("taluk").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let name: String = row.try_get("name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(Farmer {
        id: FarmerId(id),
        phone,
        district,
        taluk,
        name,
        created_at: parse_timestamp("farmers.created_at", &created_at_str)?,
    })
}

#[async_trait::async_trait]
impl FarmerRepository for SqlFarmerRepository {
    async fn register(
        &self,
        farmer: NewFarmer,
        created_at: DateTime<Utc>,
    ) -> Result<Farmer, RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO farmers (phone, district, taluk, name, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&farmer.phone)
        .bind(&farmer.district)
        .bind(&farmer.taluk)
        .bind(&farmer.name)
        .bind(created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            if is_unique_violation(&error) {
                RepositoryError::DuplicatePhone(farmer.phone.clone())
            } else {
                RepositoryError::Database(error)
            }
        })?;

        Ok(Farmer {
            id: FarmerId(result.last_insert_rowid()),
            phone: farmer.phone,
            district: farmer.district,
            taluk: farmer.taluk,
            name: farmer.name,
            created_at,
        })
    }

    async fn find_by_phone(&self, phone: &str) -> Result<Option<Farmer>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, phone, district, taluk, name, created_at FROM farmers WHERE phone = ?",
        )
        .bind(phone)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_farmer).transpose()
    }

    async fn get_or_create(
        &self,
        farmer: NewFarmer,
        created_at: DateTime<Utc>,
    ) -> Result<Farmer, RepositoryError> {
        // Concurrent callers race on the unique phone constraint; the loser's insert is a no-op.
        sqlx::query(
            "INSERT INTO farmers (phone, district, taluk, name, created_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(phone) DO NOTHING",
        )
        .bind(&farmer.phone)
        .bind(&farmer.district)
        .bind(&farmer.taluk)
        .bind(&farmer.name)
        .bind(created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        self.find_by_phone(&farmer.phone).await?.ok_or_else(|| {
            RepositoryError::Decode(format!("farmer `{}` missing after upsert", farmer.phone))
        })
    }

    async fn count(&self) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM farmers")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use smartcrop_core::domain::farmer::NewFarmer;

    use super::SqlFarmerRepository;
    use crate::repositories::{FarmerRepository, RepositoryError};
    use crate::{connect_with_settings, migrations};

    async fn setup() -> SqlFarmerRepository {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        SqlFarmerRepository::new(pool)
    }

    fn new_farmer(phone: &str, name: &str) -> NewFarmer {
        NewFarmer {
            phone: phone.to_string(),
            district: "Patiala".to_string(),
            taluk: "Rajpura".to_string(),
            name: name.to_string(),
        }
    }

    #[tokio::test]
    async fn register_then_find_by_phone() {
        let repo = setup().await;
        let created_at = Utc.with_ymd_and_hms(2025, 2, 1, 9, 0, 0).single().expect("timestamp");

        let farmer =
            repo.register(new_farmer("+911", "Gurpreet"), created_at).await.expect("register");
        let found = repo.find_by_phone("+911").await.expect("lookup").expect("farmer exists");

        assert_eq!(found, farmer);
        assert_eq!(found.created_at, created_at);
        assert!(repo.find_by_phone("+999").await.expect("lookup").is_none());
    }

    #[tokio::test]
    async fn duplicate_phone_is_rejected_and_first_row_kept() {
        let repo = setup().await;
        let first = repo.register(new_farmer("+911", "First"), Utc::now()).await.expect("first");

        let error = repo
            .register(new_farmer("+911", "Second"), Utc::now())
            .await
            .expect_err("duplicate phone");

        assert!(matches!(error, RepositoryError::DuplicatePhone(ref phone) if phone == "+911"));
        assert_eq!(repo.count().await.expect("count"), 1);
        let stored = repo.find_by_phone("+911").await.expect("lookup").expect("farmer exists");
        assert_eq!(stored.name, "First");
        assert_eq!(stored.id, first.id);
    }

    #[tokio::test]
    async fn get_or_create_reuses_existing_farmer() {
        let repo = setup().await;
        let registered =
            repo.register(new_farmer("+911", "Harjit"), Utc::now()).await.expect("register");

        let reused = repo
            .get_or_create(
                NewFarmer { phone: "+911".to_string(), ..NewFarmer::default() },
                Utc::now(),
            )
            .await
            .expect("get or create");
        let created = repo
            .get_or_create(new_farmer("+922", ""), Utc::now())
            .await
            .expect("get or create");

        assert_eq!(reused.id, registered.id);
        assert_eq!(reused.name, "Harjit");
        assert_ne!(created.id, registered.id);
        assert_eq!(repo.count().await.expect("count"), 2);
    }
}
