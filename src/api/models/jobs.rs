use chrono::NaiveDate;
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct DailyJobRequest {
    #[serde(default)]
    pub include_today: bool,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BackfillJobRequest {
    pub days: Option<u32>,
}
