//! Spike detection: low category ratings in a recent window compared with
//! the weekly rate over a longer baseline.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use crate::issues::Severity;
use crate::models::ReviewRecord;
use crate::series::days_before;

/// Category ratings strictly below this count as low (10-point scale).
pub const LOW_RATING_THRESHOLD: f64 = 7.0;
pub const MIN_LIFT: f64 = 1.5;
pub const MEDIUM_LIFT: f64 = 2.0;
pub const HIGH_LIFT: f64 = 3.0;
/// Recent low ratings needed to flag a category with no baseline.
pub const NEW_ISSUE_MIN_COUNT: usize = 3;
pub const MAX_SPIKES: usize = 8;
/// Upper bound accepted for configured or requested window lengths.
pub const MAX_WINDOW_DAYS: u32 = 36_500;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Lift {
    Finite(f64),
    /// No historical baseline to compare against.
    Unbounded,
}

impl Lift {
    pub fn is_unbounded(&self) -> bool {
        matches!(self, Lift::Unbounded)
    }
}

impl Serialize for Lift {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Lift::Finite(value) => serializer.serialize_f64(*value),
            Lift::Unbounded => serializer.serialize_str("unbounded"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IssueSpike {
    pub category: String,
    pub recent_low_count: usize,
    pub baseline_weekly_avg: f64,
    pub lift_ratio: Lift,
    pub severity: Severity,
}

/// Splits `reviews` into the `recent_days` ending at `now` and the
/// `baseline_days` immediately before that. Anything older is dropped.
pub fn split_windows(
    reviews: &[ReviewRecord],
    now: DateTime<Utc>,
    recent_days: u32,
    baseline_days: u32,
) -> (Vec<ReviewRecord>, Vec<ReviewRecord>) {
    let recent_start = days_before(now, i64::from(recent_days));
    let baseline_start = days_before(recent_start, i64::from(baseline_days));

    let mut recent = Vec::new();
    let mut baseline = Vec::new();
    for review in reviews {
        if review.submitted_at >= recent_start {
            recent.push(review.clone());
        } else if review.submitted_at >= baseline_start {
            baseline.push(review.clone());
        }
    }
    (recent, baseline)
}

fn low_rating_tally(reviews: &[ReviewRecord]) -> BTreeMap<&str, usize> {
    let mut tally = BTreeMap::new();
    for category in reviews.iter().flat_map(|r| r.categories.iter()) {
        if category.rating < LOW_RATING_THRESHOLD {
            *tally.entry(category.category.as_str()).or_insert(0) += 1;
        }
    }
    tally
}

pub fn detect_issue_spikes(
    recent: &[ReviewRecord],
    baseline: &[ReviewRecord],
    baseline_days: u32,
) -> Vec<IssueSpike> {
    let weeks = baseline_days.div_ceil(7).max(1) as f64;
    let baseline_tally = low_rating_tally(baseline);

    let mut spikes: Vec<IssueSpike> = low_rating_tally(recent)
        .into_iter()
        .filter_map(|(category, now_count)| {
            let base_avg = baseline_tally.get(category).copied().unwrap_or(0) as f64 / weeks;
            let (lift, severity) = if base_avg >= 1.0 && now_count > 0 {
                let lift = now_count as f64 / base_avg;
                if lift < MIN_LIFT {
                    return None;
                }
                let severity = if lift >= HIGH_LIFT {
                    Severity::High
                } else if lift >= MEDIUM_LIFT {
                    Severity::Medium
                } else {
                    Severity::Low
                };
                (Lift::Finite(lift), severity)
            } else if base_avg < 1.0 && now_count >= NEW_ISSUE_MIN_COUNT {
                (Lift::Unbounded, Severity::Medium)
            } else {
                return None;
            };

            Some(IssueSpike {
                category: category.to_string(),
                recent_low_count: now_count,
                baseline_weekly_avg: base_avg,
                lift_ratio: lift,
                severity,
            })
        })
        .collect();

    spikes.sort_by(|a, b| match (a.lift_ratio, b.lift_ratio) {
        (Lift::Unbounded, Lift::Unbounded) => b.recent_low_count.cmp(&a.recent_low_count),
        (Lift::Unbounded, Lift::Finite(_)) => std::cmp::Ordering::Less,
        (Lift::Finite(_), Lift::Unbounded) => std::cmp::Ordering::Greater,
        (Lift::Finite(x), Lift::Finite(y)) => y.total_cmp(&x),
    });
    spikes.truncate(MAX_SPIKES);
    spikes
}
