// Shared fixtures for the integration tests: an in-memory SummaryStore with
// per-device failure injection, plus small builders.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use solar_summary::error::AppError;
use solar_summary::models::{DailySummary, LiveReading, MonthlySummary};
use solar_summary::store::SummaryStore;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Mutex;

#[derive(Default)]
struct Inner {
    readings: Vec<LiveReading>,
    daily: BTreeMap<(String, NaiveDate), DailySummary>,
    monthly: BTreeMap<(String, String), MonthlySummary>,
    daily_writes: usize,
    monthly_writes: usize,
    fail_discovery: bool,
    fail_readings: HashSet<String>,
    fail_existing: HashSet<String>,
    fail_upsert_daily: HashSet<(String, NaiveDate)>,
    fail_upsert_monthly: HashSet<String>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

fn injected(what: &str, device: &str) -> AppError {
    AppError::Store(format!("injected {} failure for {}", what, device))
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_reading(&self, device: &str, ts: DateTime<Utc>, kwh: f64, kw: f64) {
        self.inner.lock().unwrap().readings.push(LiveReading {
            device_serial: device.to_string(),
            ts,
            generation_today_kwh: Some(kwh),
            power_kw: Some(kw),
        });
    }

    pub fn add_raw_reading(&self, reading: LiveReading) {
        self.inner.lock().unwrap().readings.push(reading);
    }

    /// Seed a daily row without counting it as a write.
    pub fn put_daily(&self, device: &str, date: NaiveDate, total: f64, peak: f64) {
        self.inner.lock().unwrap().daily.insert(
            (device.to_string(), date),
            DailySummary {
                device_serial: device.to_string(),
                summary_date: date,
                total_generation_kwh: total,
                peak_power_kw: peak,
            },
        );
    }

    pub fn daily_row(&self, device: &str, date: NaiveDate) -> Option<DailySummary> {
        self.inner
            .lock()
            .unwrap()
            .daily
            .get(&(device.to_string(), date))
            .cloned()
    }

    pub fn daily_rows(&self, device: &str) -> Vec<DailySummary> {
        self.inner
            .lock()
            .unwrap()
            .daily
            .values()
            .filter(|r| r.device_serial == device)
            .cloned()
            .collect()
    }

    pub fn monthly_rows(&self, device: &str) -> Vec<MonthlySummary> {
        self.inner
            .lock()
            .unwrap()
            .monthly
            .values()
            .filter(|r| r.device_serial == device)
            .cloned()
            .collect()
    }

    pub fn daily_writes(&self) -> usize {
        self.inner.lock().unwrap().daily_writes
    }

    pub fn monthly_writes(&self) -> usize {
        self.inner.lock().unwrap().monthly_writes
    }

    pub fn fail_discovery(&self) {
        self.inner.lock().unwrap().fail_discovery = true;
    }

    pub fn fail_readings_for(&self, device: &str) {
        self.inner
            .lock()
            .unwrap()
            .fail_readings
            .insert(device.to_string());
    }

    pub fn fail_existing_for(&self, device: &str) {
        self.inner
            .lock()
            .unwrap()
            .fail_existing
            .insert(device.to_string());
    }

    pub fn fail_daily_upsert(&self, device: &str, date: NaiveDate) {
        self.inner
            .lock()
            .unwrap()
            .fail_upsert_daily
            .insert((device.to_string(), date));
    }

    pub fn fail_monthly_upsert(&self, device: &str) {
        self.inner
            .lock()
            .unwrap()
            .fail_upsert_monthly
            .insert(device.to_string());
    }
}

#[async_trait]
impl SummaryStore for MemoryStore {
    async fn reading_devices(&self, since: DateTime<Utc>) -> Result<Vec<String>, AppError> {
        let inner = self.inner.lock().unwrap();
        if inner.fail_discovery {
            return Err(injected("discovery", "live_readings"));
        }
        let devices: BTreeSet<String> = inner
            .readings
            .iter()
            .filter(|r| r.ts >= since)
            .map(|r| r.device_serial.clone())
            .collect();
        Ok(devices.into_iter().collect())
    }

    async fn summary_devices(&self) -> Result<Vec<String>, AppError> {
        let inner = self.inner.lock().unwrap();
        if inner.fail_discovery {
            return Err(injected("discovery", "daily_summaries"));
        }
        let devices: BTreeSet<String> = inner.daily.keys().map(|(d, _)| d.clone()).collect();
        Ok(devices.into_iter().collect())
    }

    async fn readings_between(
        &self,
        device_serial: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<LiveReading>, AppError> {
        let inner = self.inner.lock().unwrap();
        if inner.fail_readings.contains(device_serial) {
            return Err(injected("readings", device_serial));
        }
        let mut rows: Vec<LiveReading> = inner
            .readings
            .iter()
            .filter(|r| r.device_serial == device_serial && r.ts >= from && r.ts < to)
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.ts);
        Ok(rows)
    }

    async fn daily_summaries(
        &self,
        device_serial: &str,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<DailySummary>, AppError> {
        let inner = self.inner.lock().unwrap();
        if inner.fail_existing.contains(device_serial) {
            return Err(injected("daily fetch", device_serial));
        }
        Ok(inner
            .daily
            .values()
            .filter(|r| r.device_serial == device_serial)
            .filter(|r| from.map_or(true, |f| r.summary_date >= f))
            .filter(|r| to.map_or(true, |t| r.summary_date <= t))
            .cloned()
            .collect())
    }

    async fn monthly_summaries(
        &self,
        device_serial: &str,
    ) -> Result<Vec<MonthlySummary>, AppError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .monthly
            .values()
            .filter(|r| r.device_serial == device_serial)
            .cloned()
            .collect())
    }

    async fn upsert_daily(&self, row: &DailySummary) -> Result<(), AppError> {
        let mut inner = self.inner.lock().unwrap();
        let key = (row.device_serial.clone(), row.summary_date);
        if inner.fail_upsert_daily.contains(&key) {
            return Err(injected("daily upsert", &row.device_serial));
        }
        inner.daily.insert(key, row.clone());
        inner.daily_writes += 1;
        Ok(())
    }

    async fn upsert_monthly(&self, rows: &[MonthlySummary]) -> Result<(), AppError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(row) = rows
            .iter()
            .find(|r| inner.fail_upsert_monthly.contains(&r.device_serial))
        {
            return Err(injected("monthly upsert", &row.device_serial));
        }
        for row in rows {
            inner.monthly.insert(
                (row.device_serial.clone(), row.summary_month.clone()),
                row.clone(),
            );
        }
        inner.monthly_writes += 1;
        Ok(())
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
}
