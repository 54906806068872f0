pub mod daily;
pub mod monthly;
pub mod report;

pub use daily::{DailyAggregator, DailyWindow};
pub use monthly::MonthlyAggregator;
pub use report::{DailyRunReport, DayOutcome, MonthlyRunReport, RunSummary, UnitError};

use crate::config::AggregationConfig;
use crate::error::AppError;
use crate::local_time::parse_timezone;
use chrono::NaiveTime;
use chrono_tz::Tz;
use std::collections::HashMap;

/// Validated aggregation parameters shared by both passes.
#[derive(Debug, Clone)]
pub struct AggregationSettings {
    pub cutoff: NaiveTime,
    pub backfill_days: u32,
    pub default_timezone: Tz,
    pub device_timezones: HashMap<String, Tz>,
    pub device_concurrency: usize,
    pub max_window_days: u32,
}

impl AggregationSettings {
    pub fn from_config(cfg: &AggregationConfig) -> Result<Self, AppError> {
        let mut device_timezones = HashMap::with_capacity(cfg.device_timezones.len());
        for (serial, name) in &cfg.device_timezones {
            device_timezones.insert(serial.clone(), parse_timezone(name)?);
        }
        Ok(Self {
            cutoff: cfg.cutoff_time()?,
            backfill_days: cfg.backfill_days,
            default_timezone: parse_timezone(&cfg.default_timezone)?,
            device_timezones,
            device_concurrency: cfg.device_concurrency.max(1),
            max_window_days: cfg.max_window_days,
        })
    }

    pub fn timezone_for(&self, device_serial: &str) -> Tz {
        self.device_timezones
            .get(device_serial)
            .copied()
            .unwrap_or(self.default_timezone)
    }
}

impl Default for AggregationSettings {
    fn default() -> Self {
        Self {
            cutoff: NaiveTime::from_hms_opt(23, 0, 0).unwrap_or(NaiveTime::MIN),
            backfill_days: 30,
            default_timezone: Tz::UTC,
            device_timezones: HashMap::new(),
            device_concurrency: 1,
            max_window_days: 366,
        }
    }
}
