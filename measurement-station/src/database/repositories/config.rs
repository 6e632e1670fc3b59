//! Measurement configuration repository.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::Result;
use crate::database::models::{MEASUREMENT_CONFIG_ID, MeasurementConfigDbModel};
use crate::database::time::now_ms;
use crate::domain::MeasurementConfig;

/// Persistence for the single measurement configuration.
#[async_trait]
pub trait ConfigRepository: Send + Sync {
    /// Read the stored configuration, creating the default row on first use.
    async fn get_measurement_config(&self) -> Result<MeasurementConfig>;

    /// Overwrite the stored configuration.
    async fn replace_measurement_config(
        &self,
        config: &MeasurementConfig,
    ) -> Result<MeasurementConfig>;
}

/// SQLx implementation of ConfigRepository.
pub struct SqlxConfigRepository {
    pool: SqlitePool,
}

impl SqlxConfigRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn fetch(&self) -> Result<Option<MeasurementConfigDbModel>> {
        let row = sqlx::query_as::<_, MeasurementConfigDbModel>(
            "SELECT * FROM measurement_config WHERE id = ?",
        )
        .bind(MEASUREMENT_CONFIG_ID)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}

#[async_trait]
impl ConfigRepository for SqlxConfigRepository {
    async fn get_measurement_config(&self) -> Result<MeasurementConfig> {
        if let Some(row) = self.fetch().await? {
            return Ok(row.into_domain());
        }

        let default_row = MeasurementConfigDbModel::default();
        // A concurrent first read may have inserted already.
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO measurement_config (
                id, frequency_minutes, first_measurement, rgb_camera,
                multispectral_camera, number_of_sensors, length_of_ae,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&default_row.id)
        .bind(default_row.frequency_minutes)
        .bind(default_row.first_measurement)
        .bind(default_row.rgb_camera)
        .bind(default_row.multispectral_camera)
        .bind(default_row.number_of_sensors)
        .bind(default_row.length_of_ae)
        .bind(default_row.created_at)
        .bind(default_row.updated_at)
        .execute(&self.pool)
        .await?;

        tracing::info!("Created default measurement configuration");

        Ok(self
            .fetch()
            .await?
            .map(MeasurementConfigDbModel::into_domain)
            .unwrap_or_else(|| default_row.into_domain()))
    }

    async fn replace_measurement_config(
        &self,
        config: &MeasurementConfig,
    ) -> Result<MeasurementConfig> {
        let row = MeasurementConfigDbModel::from_domain(config);
        sqlx::query(
            r#"
            INSERT INTO measurement_config (
                id, frequency_minutes, first_measurement, rgb_camera,
                multispectral_camera, number_of_sensors, length_of_ae,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                frequency_minutes = excluded.frequency_minutes,
                first_measurement = excluded.first_measurement,
                rgb_camera = excluded.rgb_camera,
                multispectral_camera = excluded.multispectral_camera,
                number_of_sensors = excluded.number_of_sensors,
                length_of_ae = excluded.length_of_ae,
                updated_at = ?
            "#,
        )
        .bind(&row.id)
        .bind(row.frequency_minutes)
        .bind(row.first_measurement)
        .bind(row.rgb_camera)
        .bind(row.multispectral_camera)
        .bind(row.number_of_sensors)
        .bind(row.length_of_ae)
        .bind(row.created_at)
        .bind(row.updated_at)
        .bind(now_ms())
        .execute(&self.pool)
        .await?;

        Ok(row.into_domain())
    }
}
