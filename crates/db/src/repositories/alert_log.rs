use sqlx::Row;

use smartcrop_core::domain::farmer::FarmerId;
use smartcrop_core::domain::weather::{AlertKind, AlertLogEntry};

use super::{parse_timestamp, AlertLogRepository, RepositoryError};
use crate::DbPool;

pub struct SqlAlertLogRepository {
    pool: DbPool,
}

impl SqlAlertLogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_entry(row: &sqlx::sqlite::SqliteRow) -> Result<AlertLogEntry, RepositoryError> {
    let farmer_id: Option<i64> =
        row.try_get("farmer_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let district: String =
        row.try_get("district").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let kind_str: String =
        row.try_get("alert_type").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let message: String =
        row.try_get("message").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let sent_at_str: String =
        row.try_get("sent_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let kind = AlertKind::parse(&kind_str)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown alert type `{kind_str}`")))?;

    Ok(AlertLogEntry {
        farmer_id: farmer_id.map(FarmerId),
        district,
        kind,
        message,
        sent_at: parse_timestamp("weather_alerts.sent_at", &sent_at_str)?,
    })
}

#[async_trait::async_trait]
impl AlertLogRepository for SqlAlertLogRepository {
    async fn record(&self, entry: &AlertLogEntry) -> Result<i64, RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO weather_alerts (farmer_id, district, alert_type, message, sent_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(entry.farmer_id.map(|id| id.0))
        .bind(&entry.district)
        .bind(entry.kind.as_str())
        .bind(&entry.message)
        .bind(entry.sent_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn list_for_farmer(
        &self,
        farmer_id: FarmerId,
    ) -> Result<Vec<AlertLogEntry>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT farmer_id, district, alert_type, message, sent_at
             FROM weather_alerts WHERE farmer_id = ? ORDER BY sent_at ASC, id ASC",
        )
        .bind(farmer_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_entry).collect::<Result<Vec<_>, _>>()
    }
}
