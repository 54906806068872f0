use crate::config::DbConfig;
use crate::error::AppError;
use sqlx::{postgres::PgPoolOptions, Pool, Postgres};

pub type DbPool = Pool<Postgres>;

pub async fn connect(cfg: &DbConfig) -> Result<DbPool, AppError> {
    let pool = PgPoolOptions::new()
        .max_connections(cfg.max_connections)
        .connect(&cfg.url)
        .await?;
    Ok(pool)
}

/// Create the summary tables when missing. `live_readings` belongs to the
/// ingestion pipeline and is left alone.
pub async fn ensure_schema(pool: &DbPool) -> Result<(), AppError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS daily_summaries (
            device_serial TEXT NOT NULL,
            summary_date DATE NOT NULL,
            total_generation_kwh DOUBLE PRECISION NOT NULL,
            peak_power_kw DOUBLE PRECISION NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            PRIMARY KEY (device_serial, summary_date)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS monthly_summaries (
            device_serial TEXT NOT NULL,
            summary_month TEXT NOT NULL,
            total_generation_kwh DOUBLE PRECISION NOT NULL,
            peak_power_kw DOUBLE PRECISION NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            PRIMARY KEY (device_serial, summary_month)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
