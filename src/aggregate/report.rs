use chrono::NaiveDate;
use serde::Serialize;

/// One failed unit of work, kept for the run log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitError {
    pub device_serial: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    pub message: String,
}

/// What happened to one (device, date) bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayOutcome {
    Inserted,
    Updated,
    /// Existing row already holds the computed values; nothing written.
    Unchanged,
    NoData,
    NotFinal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DailyRunReport {
    pub devices: usize,
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub skipped_no_data: usize,
    pub skipped_not_final: usize,
    pub failed: usize,
    pub errors: Vec<UnitError>,
}

impl DailyRunReport {
    pub fn record(&mut self, outcome: DayOutcome) {
        match outcome {
            DayOutcome::Inserted => self.inserted += 1,
            DayOutcome::Updated => self.updated += 1,
            DayOutcome::Unchanged => self.unchanged += 1,
            DayOutcome::NoData => self.skipped_no_data += 1,
            DayOutcome::NotFinal => self.skipped_not_final += 1,
        }
    }

    pub fn record_failure(&mut self, device_serial: &str, date: Option<NaiveDate>, message: String) {
        self.failed += 1;
        self.errors.push(UnitError {
            device_serial: device_serial.to_string(),
            date,
            message,
        });
    }

    pub fn merge(&mut self, other: DailyRunReport) {
        self.devices += other.devices;
        self.inserted += other.inserted;
        self.updated += other.updated;
        self.unchanged += other.unchanged;
        self.skipped_no_data += other.skipped_no_data;
        self.skipped_not_final += other.skipped_not_final;
        self.failed += other.failed;
        self.errors.extend(other.errors);
    }

    pub fn is_ok(&self) -> bool {
        self.failed == 0
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary::new(self.inserted, self.updated, self.failed, &self.errors)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MonthlyRunReport {
    pub devices: usize,
    pub months_written: usize,
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub failed_devices: usize,
    pub errors: Vec<UnitError>,
}

impl MonthlyRunReport {
    pub fn record_failure(&mut self, device_serial: &str, message: String) {
        self.failed_devices += 1;
        self.errors.push(UnitError {
            device_serial: device_serial.to_string(),
            date: None,
            message,
        });
    }

    pub fn merge(&mut self, other: MonthlyRunReport) {
        self.devices += other.devices;
        self.months_written += other.months_written;
        self.inserted += other.inserted;
        self.updated += other.updated;
        self.unchanged += other.unchanged;
        self.failed_devices += other.failed_devices;
        self.errors.extend(other.errors);
    }

    pub fn is_ok(&self) -> bool {
        self.failed_devices == 0
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary::new(self.inserted, self.updated, self.failed_devices, &self.errors)
    }
}

/// The one-line result consumed by the scheduler or the HTTP caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub ok: bool,
    pub total_inserted: usize,
    pub total_updated: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunSummary {
    fn new(inserted: usize, updated: usize, failed: usize, errors: &[UnitError]) -> Self {
        let error = errors.first().map(|first| {
            format!(
                "{} unit(s) failed; first: {}: {}",
                failed, first.device_serial, first.message
            )
        });
        Self {
            ok: failed == 0,
            total_inserted: inserted,
            total_updated: updated,
            error,
        }
    }

    /// Summary for a run that could not start (e.g. device enumeration failed).
    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            total_inserted: 0,
            total_updated: 0,
            error: Some(message.into()),
        }
    }
}
