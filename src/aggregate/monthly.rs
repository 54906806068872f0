use super::report::MonthlyRunReport;
use super::AggregationSettings;
use crate::bucket::{bucket_and_reduce, Totals};
use crate::error::AppError;
use crate::local_time::month_key;
use crate::models::{DailySummary, MonthlySummary};
use crate::store::SummaryStore;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Fold one device's daily rows into calendar months.
///
/// `summary_date` is already device-local, so grouping is by its `YYYY-MM`
/// label only. Months come back in ascending order.
pub fn roll_up_months(device_serial: &str, days: Vec<DailySummary>) -> Vec<MonthlySummary> {
    bucket_and_reduce(
        days,
        |d| month_key(d.summary_date),
        |_| Totals::default(),
        |acc, d| acc.absorb_day(&d),
    )
    .into_iter()
    .map(|(summary_month, totals)| MonthlySummary {
        device_serial: device_serial.to_string(),
        summary_month,
        total_generation_kwh: totals.total_generation_kwh,
        peak_power_kw: totals.peak_power_kw,
    })
    .collect()
}

/// Recomputes every month of every device from daily summaries.
#[derive(Clone)]
pub struct MonthlyAggregator {
    store: Arc<dyn SummaryStore>,
    settings: Arc<AggregationSettings>,
}

impl MonthlyAggregator {
    pub fn new(store: Arc<dyn SummaryStore>, settings: Arc<AggregationSettings>) -> Self {
        Self { store, settings }
    }

    pub async fn run(&self) -> Result<MonthlyRunReport, AppError> {
        let devices = self.store.summary_devices().await?;
        if devices.is_empty() {
            info!("no daily summaries to roll up");
            return Ok(MonthlyRunReport::default());
        }
        info!(devices = devices.len(), "starting monthly aggregation");

        let reports: Vec<MonthlyRunReport> = stream::iter(devices)
            .map(|device| self.run_device(device))
            .buffer_unordered(self.settings.device_concurrency)
            .collect()
            .await;

        let mut total = MonthlyRunReport::default();
        for report in reports {
            total.merge(report);
        }

        info!(
            devices = total.devices,
            months_written = total.months_written,
            inserted = total.inserted,
            updated = total.updated,
            unchanged = total.unchanged,
            failed_devices = total.failed_devices,
            "monthly aggregation finished"
        );
        Ok(total)
    }

    async fn run_device(&self, device: String) -> MonthlyRunReport {
        let mut report = MonthlyRunReport {
            devices: 1,
            ..Default::default()
        };
        if let Err(e) = self.roll_up_device(&device, &mut report).await {
            warn!(device = %device, error = %e, "monthly aggregation failed");
            report = MonthlyRunReport {
                devices: 1,
                ..Default::default()
            };
            report.record_failure(&device, e.to_string());
        }
        report
    }

    async fn roll_up_device(
        &self,
        device: &str,
        report: &mut MonthlyRunReport,
    ) -> Result<(), AppError> {
        let days = self.store.daily_summaries(device, None, None).await?;
        if days.is_empty() {
            info!(device = %device, "no daily summaries for device");
            return Ok(());
        }

        let months = roll_up_months(device, days);
        let existing: HashMap<String, MonthlySummary> = self
            .store
            .monthly_summaries(device)
            .await?
            .into_iter()
            .map(|m| (m.summary_month.clone(), m))
            .collect();

        for month in &months {
            match existing.get(&month.summary_month) {
                None => report.inserted += 1,
                Some(current) if current == month => report.unchanged += 1,
                Some(_) => report.updated += 1,
            }
        }

        // Always overwrite the full set so late daily corrections propagate
        self.store.upsert_monthly(&months).await?;
        report.months_written = months.len();
        info!(device = %device, months = months.len(), "monthly summaries written");
        Ok(())
    }
}
