//! Price-history chart pipeline: fixed-width time bins averaged per bin,
//! then median-absolute-deviation outlier trimming.
//!
//! Independent of the aggregation engine; it only shares [`EventRecord`] as
//! an input type.

use serde::{Deserialize, Serialize};

use crate::types::EventRecord;

// ─── Constants ───────────────────────────────────────────────────────

const MINUTE_MS: i64 = 60 * 1000;
const HOUR_MS: i64 = 60 * MINUTE_MS;
const DAY_MS: i64 = 24 * HOUR_MS;
const WEEK_MS: i64 = 7 * DAY_MS;

/// Default number of bins per sample when deriving a bin size.
pub const DEFAULT_SAMPLE_RATE: f64 = 2.0;

/// Upper bound on the bins of one series; wider spans are returned unbinned.
pub const MAX_BINS: i64 = 1_000_000;

/// Default multiplier of the MAD in the outlier threshold.
pub const DEFAULT_OUTLIER_SCALE: f64 = 0.75;

// ─── Data Point ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    /// Epoch milliseconds.
    pub timestamp: i64,
    pub value: f64,
}

/// Build a point from an event timestamp and its integer metadata.
///
/// Returns `None` when `meta` is not an integer.
pub fn to_data_point(timestamp: i64, meta: &str) -> Option<DataPoint> {
    let value = meta.trim().parse::<i128>().ok()?;
    #[expect(clippy::cast_precision_loss)]
    let value = value as f64;
    Some(DataPoint { timestamp, value })
}

/// Points for every event carrying an integer price, oldest first.
pub fn data_points(events: &[EventRecord]) -> Vec<DataPoint> {
    let mut points: Vec<DataPoint> = events
        .iter()
        .filter_map(|e| {
            e.price_meta
                .as_deref()
                .and_then(|meta| to_data_point(e.unix_millis(), meta))
        })
        .collect();
    sort_asc(&mut points);
    points
}

pub fn sort_asc(points: &mut [DataPoint]) {
    points.sort_by_key(|p| p.timestamp);
}

/// Scale a raw integer amount by `10^-decimals`, rounded to 4 places.
pub fn display_value(value: f64, decimals: u32) -> f64 {
    #[expect(clippy::cast_possible_wrap)]
    let scaled = value * 10f64.powi(-(decimals as i32));
    (scaled * 10_000.0).round() / 10_000.0
}

/// Integers print bare, anything else with four decimals.
pub fn format_value(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{value}")
    } else {
        format!("{value:.4}")
    }
}

// ─── Bin Size ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinSize {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weeks: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hours: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minutes: Option<u32>,
}

impl BinSize {
    pub fn minutes(minutes: u32) -> Self {
        Self {
            minutes: Some(minutes),
            ..Self::default()
        }
    }

    /// Width in milliseconds. An all-zero size means one day.
    pub fn to_millis(self) -> i64 {
        let part = |n: Option<u32>, unit: i64| i64::from(n.unwrap_or(0)) * unit;
        let millis = part(self.weeks, WEEK_MS)
            + part(self.days, DAY_MS)
            + part(self.hours, HOUR_MS)
            + part(self.minutes, MINUTE_MS);
        if millis == 0 { DAY_MS } else { millis }
    }

    /// Decompose a width into whole weeks, days and hours; the remainder is
    /// rounded up to whole minutes. Zero components are left out.
    #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn from_millis(millis: f64) -> Self {
        let mut rest = millis.max(0.0);
        let mut take = |unit: i64| {
            let n = (rest / unit as f64).floor();
            rest -= n * unit as f64;
            n as u32
        };
        let weeks = take(WEEK_MS);
        let days = take(DAY_MS);
        let hours = take(HOUR_MS);
        let minutes = (rest / MINUTE_MS as f64).ceil() as u32;

        let non_zero = |n: u32| (n != 0).then_some(n);
        Self {
            weeks: non_zero(weeks),
            days: non_zero(days),
            hours: non_zero(hours),
            minutes: non_zero(minutes),
        }
    }
}

/// Derive a bin width giving roughly `sample_rate` bins per timestamp.
///
/// Without `sort`, the first and last timestamps are taken as the range.
#[expect(clippy::cast_precision_loss)]
pub fn bin_size_for_range(timestamps: &[i64], sample_rate: f64, sort: bool) -> BinSize {
    if timestamps.len() < 2 {
        return BinSize::minutes(1);
    }
    let (min, max) = if sort {
        let min = timestamps.iter().copied().min().unwrap_or_default();
        let max = timestamps.iter().copied().max().unwrap_or_default();
        (min, max)
    } else {
        (timestamps[0], timestamps[timestamps.len() - 1])
    };
    let total = max as f64 - min as f64;
    BinSize::from_millis(total / (timestamps.len() as f64 * sample_rate))
}

// ─── Binning ─────────────────────────────────────────────────────────

/// Average ascending `data` into fixed-width bins starting at the first
/// point. Each bin is reported at its midpoint; empty bins are dropped.
///
/// Bins cover `[first, first + n·width)` with `n = ceil(span / width)`, so a
/// last point lying exactly on that boundary is not counted.
pub fn bin(data: &[DataPoint], bin_size: BinSize) -> Vec<DataPoint> {
    if data.len() < 2 {
        return data.to_vec();
    }
    let width = bin_size.to_millis();
    let first = data[0].timestamp;
    let last = data[data.len() - 1].timestamp;
    let Some(span) = last.checked_sub(first).filter(|span| *span > 0) else {
        return data.to_vec();
    };
    let num_bins = span.div_euclid(width) + i64::from(span.rem_euclid(width) != 0);
    if num_bins > MAX_BINS {
        return data.to_vec();
    }

    let Ok(len) = usize::try_from(num_bins) else {
        return data.to_vec();
    };
    let mut sums = vec![(0.0_f64, 0_u32); len];
    for point in data {
        let Some(offset) = point.timestamp.checked_sub(first).filter(|o| *o >= 0) else {
            continue;
        };
        if let Ok(idx) = usize::try_from(offset / width) {
            if let Some(slot) = sums.get_mut(idx) {
                slot.0 += point.value;
                slot.1 += 1;
            }
        }
    }

    sums.into_iter()
        .enumerate()
        .filter(|(_, (_, count))| *count > 0)
        .map(|(idx, (sum, count))| {
            #[expect(clippy::cast_possible_wrap)]
            let start = first + idx as i64 * width;
            DataPoint {
                timestamp: start + width / 2,
                value: sum / f64::from(count),
            }
        })
        .collect()
}

// ─── Outliers ────────────────────────────────────────────────────────

/// Median of `values`; `None` when empty. Even counts average the middle two.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Median of absolute deviations from the median.
pub fn median_absolute_deviation(values: &[f64]) -> Option<f64> {
    let med = median(values)?;
    let deviations: Vec<f64> = values.iter().map(|v| (v - med).abs()).collect();
    median(&deviations)
}

/// Keep the points whose distance to the median is below
/// `median + scale × MAD`.
pub fn remove_outliers(data: &[DataPoint], scale: f64) -> Vec<DataPoint> {
    let values: Vec<f64> = data.iter().map(|p| p.value).collect();
    let (Some(med), Some(mad)) = (median(&values), median_absolute_deviation(&values)) else {
        return Vec::new();
    };
    let threshold = med + scale * mad;
    data.iter()
        .filter(|p| (p.value - med).abs() < threshold)
        .copied()
        .collect()
}

// ─── Tests ───────────────────────────────────────────────────────────
