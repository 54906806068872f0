use super::report::{DailyRunReport, DayOutcome};
use super::AggregationSettings;
use crate::bucket::{bucket_and_reduce, Totals};
use crate::error::AppError;
use crate::local_time::{day_bounds, is_finalized, local_date};
use crate::models::{DailySummary, LiveReading};
use crate::store::SummaryStore;
use chrono::{DateTime, Days, Duration, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;
use futures::stream::{self, StreamExt};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Which device-local dates a daily run covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DailyWindow {
    /// The scheduled run: yesterday, plus today when the schedule fires
    /// shortly before local midnight.
    Yesterday { include_today: bool },
    /// Backfill: `days` dates ending with (and including) today.
    Trailing { days: u32 },
    /// Explicit inclusive range, independent of the device clock.
    Range { from: NaiveDate, to: NaiveDate },
}

impl DailyWindow {
    /// Reject windows that are empty, inverted or span more than `max_days`.
    pub fn check(&self, max_days: u32) -> Result<(), AppError> {
        match *self {
            DailyWindow::Yesterday { .. } => Ok(()),
            DailyWindow::Trailing { days } => {
                if days == 0 || days > max_days {
                    return Err(AppError::Config(format!(
                        "backfill window must be 1..={} days, got {}",
                        max_days, days
                    )));
                }
                Ok(())
            }
            DailyWindow::Range { from, to } => {
                if from > to {
                    return Err(AppError::Config(format!(
                        "date range {} .. {} ends before it starts",
                        from, to
                    )));
                }
                let span = to.signed_duration_since(from).num_days() + 1;
                if span > i64::from(max_days) {
                    return Err(AppError::Config(format!(
                        "date range {} .. {} covers {} days, limit is {}",
                        from, to, span, max_days
                    )));
                }
                Ok(())
            }
        }
    }

    /// Dates to process for a device whose local date is `today`, ascending.
    pub fn dates(&self, today: NaiveDate) -> Result<Vec<NaiveDate>, AppError> {
        let (from, to) = match *self {
            DailyWindow::Yesterday { include_today } => {
                let yesterday = today.pred_opt().ok_or_else(|| out_of_range(today))?;
                (yesterday, if include_today { today } else { yesterday })
            }
            DailyWindow::Trailing { days } => {
                if days == 0 {
                    return Ok(Vec::new());
                }
                let first = today
                    .checked_sub_days(Days::new(u64::from(days) - 1))
                    .ok_or_else(|| out_of_range(today))?;
                (first, today)
            }
            DailyWindow::Range { from, to } => (from, to),
        };
        Ok(from.iter_days().take_while(|d| *d <= to).collect())
    }

    /// Lower bound for device discovery: comfortably before any device's
    /// first local midnight in the window.
    fn discovery_since(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, AppError> {
        let today = now.date_naive();
        let first = self.dates(today)?.first().copied().unwrap_or(today);
        first
            .and_time(NaiveTime::MIN)
            .and_utc()
            .checked_sub_signed(Duration::days(2))
            .ok_or_else(|| out_of_range(first))
    }
}

fn out_of_range(date: NaiveDate) -> AppError {
    AppError::Time(format!("date window around {} is out of range", date))
}

/// Reduce one device's readings to the summary of `date`.
///
/// Readings whose device-local date is not `date` are ignored. Returns `None`
/// when nothing falls on `date`.
pub fn summarize_day(
    device_serial: &str,
    date: NaiveDate,
    tz: Tz,
    readings: Vec<LiveReading>,
) -> Option<DailySummary> {
    let mut buckets = bucket_and_reduce(
        readings,
        |r| local_date(r.ts, tz),
        |_| Totals::default(),
        |acc, r| acc.absorb_reading(&r),
    );
    buckets.remove(&date).map(|totals| DailySummary {
        device_serial: device_serial.to_string(),
        summary_date: date,
        total_generation_kwh: totals.total_generation_kwh,
        peak_power_kw: totals.peak_power_kw,
    })
}

/// Rolls live readings into one row per (device, device-local day).
#[derive(Clone)]
pub struct DailyAggregator {
    store: Arc<dyn SummaryStore>,
    settings: Arc<AggregationSettings>,
}

impl DailyAggregator {
    pub fn new(store: Arc<dyn SummaryStore>, settings: Arc<AggregationSettings>) -> Self {
        Self { store, settings }
    }

    /// Process every known device over `window` as seen at `now`.
    ///
    /// Only an invalid window or failed device discovery can fail the run as
    /// a whole; per-device and
    /// per-date errors are counted in the report.
    pub async fn run(
        &self,
        window: &DailyWindow,
        now: DateTime<Utc>,
    ) -> Result<DailyRunReport, AppError> {
        window.check(self.settings.max_window_days)?;
        let devices = self.devices(window, now).await?;
        if devices.is_empty() {
            info!(window = ?window, "no devices to aggregate");
            return Ok(DailyRunReport::default());
        }
        info!(devices = devices.len(), window = ?window, "starting daily aggregation");

        let reports: Vec<DailyRunReport> = stream::iter(devices)
            .map(|device| self.run_device(device, window, now))
            .buffer_unordered(self.settings.device_concurrency)
            .collect()
            .await;

        let mut total = DailyRunReport::default();
        for report in reports {
            total.merge(report);
        }

        info!(
            devices = total.devices,
            inserted = total.inserted,
            updated = total.updated,
            unchanged = total.unchanged,
            skipped_no_data = total.skipped_no_data,
            skipped_not_final = total.skipped_not_final,
            failed = total.failed,
            "daily aggregation finished"
        );
        Ok(total)
    }

    /// Serials seen in telemetry during the window or in existing summaries.
    async fn devices(
        &self,
        window: &DailyWindow,
        now: DateTime<Utc>,
    ) -> Result<Vec<String>, AppError> {
        let mut devices: BTreeSet<String> = self
            .store
            .reading_devices(window.discovery_since(now)?)
            .await?
            .into_iter()
            .collect();
        devices.extend(self.store.summary_devices().await?);
        Ok(devices.into_iter().collect())
    }

    async fn run_device(
        &self,
        device: String,
        window: &DailyWindow,
        now: DateTime<Utc>,
    ) -> DailyRunReport {
        let mut report = DailyRunReport {
            devices: 1,
            ..Default::default()
        };
        let tz = self.settings.timezone_for(&device);
        let dates = match window.dates(local_date(now, tz)) {
            Ok(dates) => dates,
            Err(e) => {
                warn!(device = %device, error = %e, "cannot resolve window dates");
                report.record_failure(&device, None, e.to_string());
                return report;
            }
        };
        let (Some(&first), Some(&last)) = (dates.first(), dates.last()) else {
            return report;
        };

        let existing: HashMap<NaiveDate, DailySummary> = match self
            .store
            .daily_summaries(&device, Some(first), Some(last))
            .await
        {
            Ok(rows) => rows.into_iter().map(|r| (r.summary_date, r)).collect(),
            Err(e) => {
                warn!(device = %device, error = %e, "failed to load existing daily summaries");
                for date in dates {
                    report.record_failure(&device, Some(date), e.to_string());
                }
                return report;
            }
        };

        for date in dates {
            match self
                .process_date(&device, tz, date, now, existing.get(&date))
                .await
            {
                Ok(outcome) => {
                    debug!(device = %device, date = %date, outcome = ?outcome, "processed day");
                    report.record(outcome);
                }
                Err(e) => {
                    warn!(device = %device, date = %date, error = %e, "daily aggregation failed");
                    report.record_failure(&device, Some(date), e.to_string());
                }
            }
        }
        report
    }

    async fn process_date(
        &self,
        device: &str,
        tz: Tz,
        date: NaiveDate,
        now: DateTime<Utc>,
        existing: Option<&DailySummary>,
    ) -> Result<DayOutcome, AppError> {
        if !is_finalized(date, now, tz, self.settings.cutoff) {
            return Ok(DayOutcome::NotFinal);
        }

        let (from, to) = day_bounds(date, tz)?;
        let readings = self.store.readings_between(device, from, to).await?;
        if readings.is_empty() {
            info!(device = %device, date = %date, "no readings for day; skipping");
            return Ok(DayOutcome::NoData);
        }

        let Some(summary) = summarize_day(device, date, tz, readings) else {
            return Ok(DayOutcome::NoData);
        };

        match existing {
            Some(current) if current.same_totals(&summary) => Ok(DayOutcome::Unchanged),
            Some(_) => {
                self.store.upsert_daily(&summary).await?;
                Ok(DayOutcome::Updated)
            }
            None => {
                self.store.upsert_daily(&summary).await?;
                Ok(DayOutcome::Inserted)
            }
        }
    }
}
