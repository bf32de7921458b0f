//! Dashboard overview: trailing-window KPIs, week-over-week deltas, volume
//! trends and the most-mentioned categories.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::kpi::{kpis_for, kpis_with_deltas, KpiSnapshot, KpisWithDeltas};
use crate::models::ReviewRecord;
use crate::series::{counts_by_day, days_before, TrendMode};

pub const SHORT_WINDOW_DAYS: u32 = 30;
pub const LONG_WINDOW_DAYS: u32 = 90;
pub const WEEK_DAYS: i64 = 7;
pub const TOP_CATEGORIES: usize = 8;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryCount {
    pub category: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardOverview {
    pub trend_mode: TrendMode,
    pub kpis_30: KpiSnapshot,
    pub kpis_90: KpiSnapshot,
    pub week_over_week: KpisWithDeltas,
    pub trend_30: Vec<f64>,
    pub trend_90: Vec<f64>,
    pub top_categories: Vec<CategoryCount>,
}

/// `reviews` are expected to cover the trailing 90 days; older reviews only
/// affect the 90-day KPIs and category counts.
pub fn overview(
    reviews: &[ReviewRecord],
    now: DateTime<Utc>,
    mode: TrendMode,
) -> DashboardOverview {
    let week_start = days_before(now, WEEK_DAYS);
    let last_30 = between(reviews, days_before(now, i64::from(SHORT_WINDOW_DAYS)), None);
    let this_week = between(reviews, week_start, None);
    let last_week = between(reviews, days_before(week_start, WEEK_DAYS), Some(week_start));

    DashboardOverview {
        trend_mode: mode,
        kpis_30: kpis_for(&last_30),
        kpis_90: kpis_for(reviews),
        week_over_week: kpis_with_deltas(&this_week, &last_week),
        trend_30: mode.apply(&counts_by_day(&last_30, SHORT_WINDOW_DAYS, now)),
        trend_90: mode.apply(&counts_by_day(reviews, LONG_WINDOW_DAYS, now)),
        top_categories: top_categories(reviews, TOP_CATEGORIES),
    }
}

/// Reviews submitted at or after `from` and, when given, before `until`.
fn between(
    reviews: &[ReviewRecord],
    from: DateTime<Utc>,
    until: Option<DateTime<Utc>>,
) -> Vec<ReviewRecord> {
    reviews
        .iter()
        .filter(|r| r.submitted_at >= from && until.map_or(true, |end| r.submitted_at < end))
        .cloned()
        .collect()
}

/// Categories by number of ratings received, most frequent first.
pub fn top_categories(reviews: &[ReviewRecord], limit: usize) -> Vec<CategoryCount> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for category in reviews.iter().flat_map(|r| r.categories.iter()) {
        *counts.entry(category.category.as_str()).or_insert(0) += 1;
    }
    let mut ranked: Vec<CategoryCount> = counts
        .into_iter()
        .map(|(category, count)| CategoryCount {
            category: category.to_string(),
            count,
        })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count));
    ranked.truncate(limit);
    ranked
}
