//! Day-indexed count series and the numeric transforms applied to them
//! before charting.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::models::ReviewRecord;

/// One slot per UTC calendar day, oldest first, zero-filled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountSeries {
    pub start: NaiveDate,
    pub counts: Vec<u32>,
}

impl CountSeries {
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().map(|c| u64::from(*c)).sum()
    }

    pub fn values(&self) -> Vec<f64> {
        self.counts.iter().map(|c| f64::from(*c)).collect()
    }
}

/// `days` before `at`, saturating at the earliest representable instant.
pub fn days_before(at: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    Duration::try_days(days)
        .and_then(|span| at.checked_sub_signed(span))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Counts reviews per UTC day over the `window_days` days ending on `now`'s
/// date, both ends inclusive. Reviews outside the window are ignored. A
/// window reaching past the earliest representable date starts there.
pub fn counts_by_day(
    reviews: &[ReviewRecord],
    window_days: u32,
    now: DateTime<Utc>,
) -> CountSeries {
    let today = now.date_naive();
    let start = today
        .checked_sub_signed(Duration::days(i64::from(window_days.saturating_sub(1))))
        .unwrap_or(NaiveDate::MIN);
    let len = if window_days == 0 {
        0
    } else {
        (today - start).num_days() as usize + 1
    };
    let mut counts = vec![0u32; len];

    for review in reviews {
        let day = review.submitted_at.date_naive();
        if day < start || day > today {
            continue;
        }
        if let Some(slot) = counts.get_mut((day - start).num_days() as usize) {
            *slot += 1;
        }
    }

    CountSeries { start, counts }
}

/// Trailing simple moving average. The first `window - 1` points average
/// over the values available so far.
pub fn moving_average(series: &[f64], window: usize) -> Vec<f64> {
    if window <= 1 || series.is_empty() {
        return series.to_vec();
    }
    let mut out = Vec::with_capacity(series.len());
    let mut sum = 0.0;
    for (i, value) in series.iter().enumerate() {
        sum += value;
        if i >= window {
            sum -= series[i - window];
        }
        let span = (i + 1).min(window);
        out.push(sum / span as f64);
    }
    out
}

pub fn cumulative(series: &[f64]) -> Vec<f64> {
    series
        .iter()
        .scan(0.0, |acc, value| {
            *acc += value;
            Some(*acc)
        })
        .collect()
}

/// Sums consecutive groups of `bucket_size`; the last group may be shorter.
pub fn bucket_counts(series: &[f64], bucket_size: usize) -> Vec<f64> {
    if bucket_size <= 1 {
        return series.to_vec();
    }
    series
        .chunks(bucket_size)
        .map(|chunk| chunk.iter().sum())
        .collect()
}

/// Smoothing window used by [`TrendMode::Smoothed`]: a week, never below 3.
pub fn smoothing_window(len: usize) -> usize {
    len.clamp(3, 7)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TrendMode {
    Raw,
    #[default]
    Smoothed,
    Weekly,
    Cumulative,
}

impl TrendMode {
    pub fn apply(&self, series: &CountSeries) -> Vec<f64> {
        let values = series.values();
        match self {
            TrendMode::Raw => values,
            TrendMode::Smoothed => moving_average(&values, smoothing_window(values.len())),
            TrendMode::Weekly => bucket_counts(&values, 7),
            TrendMode::Cumulative => cumulative(&values),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ReviewStatus;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn review_at(at: DateTime<Utc>) -> ReviewRecord {
        ReviewRecord {
            id: Uuid::new_v4(),
            property_id: Uuid::nil(),
            text: String::new(),
            submitted_at: at,
            rating_overall: Some(9.0),
            categories: Vec::new(),
            approval: None,
            channel: None,
            status: ReviewStatus::Published,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 30, 15, 0, 0).unwrap()
    }

    #[test]
    fn series_has_one_slot_per_day_even_without_data() {
        let series = counts_by_day(&[], 30, now());
        assert_eq!(series.len(), 30);
        assert!(series.counts.iter().all(|c| *c == 0));
        assert_eq!(series.start, NaiveDate::from_ymd_opt(2026, 6, 1).unwrap());
    }

    #[test]
    fn counts_land_on_utc_days_and_ignore_out_of_window() {
        let reviews = vec![
            review_at(Utc.with_ymd_and_hms(2026, 6, 30, 23, 59, 0).unwrap()),
            review_at(Utc.with_ymd_and_hms(2026, 6, 30, 0, 0, 0).unwrap()),
            review_at(Utc.with_ymd_and_hms(2026, 6, 24, 8, 0, 0).unwrap()),
            review_at(Utc.with_ymd_and_hms(2026, 6, 23, 8, 0, 0).unwrap()),
            review_at(Utc.with_ymd_and_hms(2026, 7, 1, 0, 0, 0).unwrap()),
        ];
        let series = counts_by_day(&reviews, 7, now());
        assert_eq!(series.counts, vec![1, 0, 0, 0, 0, 0, 2]);
        assert_eq!(series.total(), 3);
    }

    #[test]
    fn window_past_the_calendar_start_is_truncated() {
        let early = DateTime::<Utc>::MIN_UTC + Duration::days(3);
        let series = counts_by_day(&[review_at(early)], 10, early);
        assert_eq!(series.start, NaiveDate::MIN);
        assert_eq!(series.counts, vec![0, 0, 0, 1]);
    }

    #[test]
    fn days_before_saturates() {
        assert_eq!(days_before(now(), 200_000_000), DateTime::<Utc>::MIN_UTC);
        assert_eq!(days_before(now(), i64::MAX), DateTime::<Utc>::MIN_UTC);
        assert_eq!(days_before(now(), 1), now() - Duration::days(1));
    }

    #[test]
    fn zero_day_window_is_empty() {
        let series = counts_by_day(&[review_at(now())], 0, now());
        assert!(series.is_empty());
    }

    #[test]
    fn moving_average_of_constant_series_is_constant() {
        let series = vec![4.0; 10];
        assert_eq!(moving_average(&series, 7), series);
    }

    #[test]
    fn moving_average_is_trailing() {
        let out = moving_average(&[3.0, 0.0, 0.0, 6.0], 3);
        assert_eq!(out, vec![3.0, 1.5, 1.0, 2.0]);
        assert_eq!(moving_average(&[1.0, 2.0], 1), vec![1.0, 2.0]);
        assert!(moving_average(&[], 3).is_empty());
    }

    #[test]
    fn cumulative_is_a_running_sum() {
        assert_eq!(cumulative(&[1.0, 2.0, 3.0]), vec![1.0, 3.0, 6.0]);
    }

    #[test]
    fn buckets_sum_consecutive_groups() {
        assert_eq!(bucket_counts(&[1.0; 5], 2), vec![2.0, 2.0, 1.0]);
        assert_eq!(bucket_counts(&[1.0, 2.0], 0), vec![1.0, 2.0]);
    }

    #[test]
    fn smoothing_window_is_clamped() {
        assert_eq!(smoothing_window(1), 3);
        assert_eq!(smoothing_window(5), 5);
        assert_eq!(smoothing_window(90), 7);
    }

    #[test]
    fn trend_modes() {
        let series = CountSeries {
            start: NaiveDate::from_ymd_opt(2026, 6, 1).unwrap(),
            counts: vec![1; 14],
        };
        assert_eq!(TrendMode::Raw.apply(&series), vec![1.0; 14]);
        assert_eq!(TrendMode::Smoothed.apply(&series), vec![1.0; 14]);
        assert_eq!(TrendMode::Weekly.apply(&series), vec![7.0, 7.0]);
        assert_eq!(TrendMode::Cumulative.apply(&series).last(), Some(&14.0));
    }
}
