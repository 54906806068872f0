use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One telemetry sample as written by the ingestion pipeline.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct LiveReading {
    pub device_serial: String,
    pub ts: DateTime<Utc>,
    /// Running counter that resets at device-local midnight.
    pub generation_today_kwh: Option<f64>,
    pub power_kw: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct DailySummary {
    pub device_serial: String,
    pub summary_date: NaiveDate,
    pub total_generation_kwh: f64,
    pub peak_power_kw: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct MonthlySummary {
    pub device_serial: String,
    /// `YYYY-MM`
    pub summary_month: String,
    pub total_generation_kwh: f64,
    pub peak_power_kw: f64,
}

impl DailySummary {
    /// True when both measurements match. Row identity is not compared.
    pub fn same_totals(&self, other: &DailySummary) -> bool {
        self.total_generation_kwh == other.total_generation_kwh
            && self.peak_power_kw == other.peak_power_kw
    }
}
