//! Measurement attempt repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::database::models::MeasurementInfoDbModel;
use crate::database::retry::retry_on_sqlite_busy;
use crate::database::time::datetime_to_ms;
use crate::domain::MeasurementAttempt;
use crate::{Error, Result};

/// Persistence for measurement attempts. Listings are most recent first.
#[async_trait]
pub trait MeasurementRepository: Send + Sync {
    async fn save_attempt(&self, attempt: &MeasurementAttempt) -> Result<MeasurementAttempt>;
    async fn latest_attempts(&self, limit: u32) -> Result<Vec<MeasurementAttempt>>;
    async fn get_attempt(&self, id: &str) -> Result<MeasurementAttempt>;
    /// Attempts with `start <= date_time <= end`.
    async fn attempts_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<MeasurementAttempt>>;
    async fn list_attempts(&self, limit: u32, offset: u32) -> Result<Vec<MeasurementAttempt>>;
    async fn count_attempts(&self) -> Result<u64>;
}

/// SQLx implementation of MeasurementRepository.
pub struct SqlxMeasurementRepository {
    pool: SqlitePool,
}

impl SqlxMeasurementRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn insert(&self, row: &MeasurementInfoDbModel) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO measurement_info (
                id, date_time, rgb_camera, multispectral_camera,
                number_of_sensors, length_of_ae, scheduled, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&row.id)
        .bind(row.date_time)
        .bind(row.rgb_camera)
        .bind(row.multispectral_camera)
        .bind(row.number_of_sensors)
        .bind(row.length_of_ae)
        .bind(row.scheduled)
        .bind(row.created_at)
        .bind(row.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl MeasurementRepository for SqlxMeasurementRepository {
    async fn save_attempt(&self, attempt: &MeasurementAttempt) -> Result<MeasurementAttempt> {
        let row = MeasurementInfoDbModel::from(attempt);
        retry_on_sqlite_busy("save_attempt", || self.insert(&row)).await?;
        self.get_attempt(&row.id).await
    }

    async fn latest_attempts(&self, limit: u32) -> Result<Vec<MeasurementAttempt>> {
        self.list_attempts(limit, 0).await
    }

    async fn get_attempt(&self, id: &str) -> Result<MeasurementAttempt> {
        sqlx::query_as::<_, MeasurementInfoDbModel>("SELECT * FROM measurement_info WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(MeasurementAttempt::from)
            .ok_or_else(|| Error::not_found("MeasurementInfo", id))
    }

    async fn attempts_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<MeasurementAttempt>> {
        let rows = sqlx::query_as::<_, MeasurementInfoDbModel>(
            r#"
            SELECT * FROM measurement_info
            WHERE date_time >= ? AND date_time <= ?
            ORDER BY date_time DESC, rowid DESC
            "#,
        )
        .bind(datetime_to_ms(start))
        .bind(datetime_to_ms(end))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(MeasurementAttempt::from).collect())
    }

    async fn list_attempts(&self, limit: u32, offset: u32) -> Result<Vec<MeasurementAttempt>> {
        let rows = sqlx::query_as::<_, MeasurementInfoDbModel>(
            "SELECT * FROM measurement_info ORDER BY date_time DESC, rowid DESC LIMIT ? OFFSET ?",
        )
        .bind(i64::from(limit))
        .bind(i64::from(offset))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(MeasurementAttempt::from).collect())
    }

    async fn count_attempts(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM measurement_info")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }
}
