use crate::db::DbPool;
use crate::error::AppError;
use crate::models::LiveReading;
use chrono::{DateTime, Utc};

pub struct ReadingRepository;

impl ReadingRepository {
    /// Serials that reported at or after `since`.
    pub async fn devices_since(
        pool: &DbPool,
        since: DateTime<Utc>,
    ) -> Result<Vec<String>, AppError> {
        sqlx::query_scalar::<_, String>(
            r#"
            SELECT DISTINCT device_serial
            FROM live_readings
            WHERE ts >= $1
            ORDER BY device_serial
            "#,
        )
        .bind(since)
        .fetch_all(pool)
        .await
        .map_err(AppError::Db)
    }

    /// Readings of one device with `from <= ts < to`, oldest first.
    pub async fn between(
        pool: &DbPool,
        device_serial: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<LiveReading>, AppError> {
        sqlx::query_as::<_, LiveReading>(
            r#"
            SELECT
                device_serial,
                ts,
                CAST(generation_today_kwh AS DOUBLE PRECISION) AS generation_today_kwh,
                CAST(power_kw AS DOUBLE PRECISION) AS power_kw
            FROM live_readings
            WHERE device_serial = $1 AND ts >= $2 AND ts < $3
            ORDER BY ts
            "#,
        )
        .bind(device_serial)
        .bind(from)
        .bind(to)
        .fetch_all(pool)
        .await
        .map_err(AppError::Db)
    }
}
