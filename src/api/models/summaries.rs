use crate::models::{DailySummary, MonthlySummary};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct DailySummaryQuery {
    pub device: String,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct MonthlySummaryQuery {
    pub device: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct DailySummaryResponse {
    pub date: NaiveDate,
    pub total_generation_kwh: f64,
    pub peak_power_kw: f64,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct MonthlySummaryResponse {
    pub month: String,
    pub total_generation_kwh: f64,
    pub peak_power_kw: f64,
}

impl From<DailySummary> for DailySummaryResponse {
    fn from(row: DailySummary) -> Self {
        Self {
            date: row.summary_date,
            total_generation_kwh: row.total_generation_kwh,
            peak_power_kw: row.peak_power_kw,
        }
    }
}

impl From<MonthlySummary> for MonthlySummaryResponse {
    fn from(row: MonthlySummary) -> Self {
        Self {
            month: row.summary_month,
            total_generation_kwh: row.total_generation_kwh,
            peak_power_kw: row.peak_power_kw,
        }
    }
}
