//! Group-then-reduce shared by the daily and monthly passes.

use crate::models::{DailySummary, LiveReading};
use std::collections::BTreeMap;

/// Partition `records` by `key`, start each bucket with `init`, and fold every
/// record of the bucket into it with `fold`.
///
/// Buckets come back ordered by key. Records are folded in iteration order.
pub fn bucket_and_reduce<T, K, A, KF, IF, FF>(
    records: impl IntoIterator<Item = T>,
    mut key: KF,
    mut init: IF,
    mut fold: FF,
) -> BTreeMap<K, A>
where
    K: Ord,
    KF: FnMut(&T) -> K,
    IF: FnMut(&K) -> A,
    FF: FnMut(&mut A, T),
{
    let mut buckets: BTreeMap<K, A> = BTreeMap::new();
    for record in records {
        let k = key(&record);
        let acc = match buckets.entry(k) {
            std::collections::btree_map::Entry::Occupied(e) => e.into_mut(),
            std::collections::btree_map::Entry::Vacant(e) => {
                let seed = init(e.key());
                e.insert(seed)
            }
        };
        fold(acc, record);
    }
    buckets
}

/// Energy total and power peak of one bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Totals {
    pub total_generation_kwh: f64,
    pub peak_power_kw: f64,
}

impl Totals {
    /// Fold one raw reading. The generation field is a running daily counter,
    /// so the day's total is its maximum rather than a sum.
    pub fn absorb_reading(&mut self, reading: &LiveReading) {
        if let Some(kwh) = reading.generation_today_kwh {
            self.total_generation_kwh = self.total_generation_kwh.max(kwh);
        }
        if let Some(kw) = reading.power_kw {
            self.peak_power_kw = self.peak_power_kw.max(kw);
        }
    }

    /// Fold one finalized day into a longer period.
    pub fn absorb_day(&mut self, day: &DailySummary) {
        self.total_generation_kwh += day.total_generation_kwh;
        self.peak_power_kw = self.peak_power_kw.max(day.peak_power_kw);
    }
}
