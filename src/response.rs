//! Approval turnaround metrics.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::models::ReviewRecord;
use crate::rating::{percent, round1};

const SECONDS_PER_DAY: f64 = 86_400.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyResponse {
    pub day: NaiveDate,
    pub avg_time: f64,
    pub count: usize,
}

/// Turnaround figures are in days, rounded to one decimal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseTimeMetrics {
    pub avg_response_time: Option<f64>,
    pub median_response_time: Option<f64>,
    pub fastest_response: Option<f64>,
    pub slowest_response: Option<f64>,
    pub responses_by_day: Vec<DailyResponse>,
    pub approval_rate: u32,
}

impl ResponseTimeMetrics {
    pub fn empty() -> Self {
        Self {
            avg_response_time: None,
            median_response_time: None,
            fastest_response: None,
            slowest_response: None,
            responses_by_day: Vec::new(),
            approval_rate: 0,
        }
    }
}

/// Fractional days between submission and approval.
pub fn turnaround_days(submitted_at: DateTime<Utc>, approved_at: DateTime<Utc>) -> f64 {
    (approved_at - submitted_at).num_milliseconds() as f64 / 1000.0 / SECONDS_PER_DAY
}

/// Only reviews that are approved and carry an approval timestamp count as
/// responded to.
pub fn calculate_response_time_metrics(reviews: &[ReviewRecord]) -> ResponseTimeMetrics {
    let responded: Vec<(DateTime<Utc>, f64)> = reviews
        .iter()
        .filter_map(|review| {
            let approved_at = review.approval.as_ref()?.approval_event()?;
            Some((approved_at, turnaround_days(review.submitted_at, approved_at)))
        })
        .filter(|(_, days)| days.is_finite())
        .collect();

    if responded.is_empty() {
        return ResponseTimeMetrics::empty();
    }

    let mut times: Vec<f64> = responded.iter().map(|(_, days)| *days).collect();
    times.sort_by(|a, b| a.total_cmp(b));
    let avg = times.iter().sum::<f64>() / times.len() as f64;

    let mut by_day: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
    for (approved_at, days) in &responded {
        let entry = by_day.entry(approved_at.date_naive()).or_insert((0.0, 0));
        entry.0 = (entry.0 * entry.1 as f64 + days) / (entry.1 + 1) as f64;
        entry.1 += 1;
    }

    ResponseTimeMetrics {
        avg_response_time: Some(round1(avg)),
        median_response_time: Some(round1(times[times.len() / 2])),
        fastest_response: times.first().copied().map(round1),
        slowest_response: times.last().copied().map(round1),
        responses_by_day: by_day
            .into_iter()
            .map(|(day, (avg_time, count))| DailyResponse {
                day,
                avg_time,
                count,
            })
            .collect(),
        approval_rate: percent(responded.len(), reviews.len()),
    }
}
