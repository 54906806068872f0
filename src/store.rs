//! Datastore handle passed into the aggregators and HTTP handlers.

use crate::db::DbPool;
use crate::error::AppError;
use crate::models::{DailySummary, LiveReading, MonthlySummary};
use crate::repositories::{ReadingRepository, SummaryRepository};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

#[async_trait]
pub trait SummaryStore: Send + Sync {
    /// Distinct serials with readings at or after `since`.
    async fn reading_devices(&self, since: DateTime<Utc>) -> Result<Vec<String>, AppError>;

    /// Distinct serials with at least one daily summary.
    async fn summary_devices(&self) -> Result<Vec<String>, AppError>;

    /// Readings with `from <= ts < to`, oldest first.
    async fn readings_between(
        &self,
        device_serial: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<LiveReading>, AppError>;

    /// Daily rows ordered by date; `None` bounds are open, others inclusive.
    async fn daily_summaries(
        &self,
        device_serial: &str,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<DailySummary>, AppError>;

    async fn monthly_summaries(&self, device_serial: &str)
        -> Result<Vec<MonthlySummary>, AppError>;

    /// Insert or overwrite by `(device_serial, summary_date)`.
    async fn upsert_daily(&self, row: &DailySummary) -> Result<(), AppError>;

    /// Insert or overwrite by `(device_serial, summary_month)`, atomically per call.
    async fn upsert_monthly(&self, rows: &[MonthlySummary]) -> Result<(), AppError>;
}

#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SummaryStore for PgStore {
    async fn reading_devices(&self, since: DateTime<Utc>) -> Result<Vec<String>, AppError> {
        ReadingRepository::devices_since(&self.pool, since).await
    }

    async fn summary_devices(&self) -> Result<Vec<String>, AppError> {
        SummaryRepository::daily_devices(&self.pool).await
    }

    async fn readings_between(
        &self,
        device_serial: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<LiveReading>, AppError> {
        ReadingRepository::between(&self.pool, device_serial, from, to).await
    }

    async fn daily_summaries(
        &self,
        device_serial: &str,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<DailySummary>, AppError> {
        SummaryRepository::daily(&self.pool, device_serial, from, to).await
    }

    async fn monthly_summaries(
        &self,
        device_serial: &str,
    ) -> Result<Vec<MonthlySummary>, AppError> {
        SummaryRepository::monthly(&self.pool, device_serial).await
    }

    async fn upsert_daily(&self, row: &DailySummary) -> Result<(), AppError> {
        SummaryRepository::upsert_daily(&self.pool, row).await
    }

    async fn upsert_monthly(&self, rows: &[MonthlySummary]) -> Result<(), AppError> {
        SummaryRepository::upsert_monthly(&self.pool, rows).await
    }
}
