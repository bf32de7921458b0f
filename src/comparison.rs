//! Per-property rollup used by the comparison table.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::{PropertyReviews, ReviewRecord};
use crate::rating::{effective_rating, mean, percent, round1, round_to};
use crate::response::turnaround_days;
use crate::series::days_before;

pub const TOP_ISSUES: usize = 5;
pub const RECENT_DAYS: i64 = 30;
/// Half-over-half rating change needed to call a trend.
pub const TREND_THRESHOLD: f64 = 0.3;
pub const MIN_TREND_REVIEWS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RatingTrend {
    Up,
    Down,
    Stable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryTally {
    pub category: String,
    pub count: usize,
    pub avg_rating: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentSummary {
    pub reviews: usize,
    pub avg_rating: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertySummary {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub total_reviews: usize,
    pub avg_rating: Option<f64>,
    pub approved_count: usize,
    pub approval_rate: u32,
    /// Mean days from submission to approval.
    pub avg_response_time: Option<f64>,
    pub top_issues: Vec<CategoryTally>,
    pub recent_trend: RatingTrend,
    pub last_30_days: RecentSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonMeta {
    pub total_properties: usize,
    pub total_reviews: usize,
    pub avg_approval_rate: u32,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonReport {
    pub data: Vec<PropertySummary>,
    pub meta: ComparisonMeta,
}

/// Ranked per-property summaries, most reviewed first. Each property's
/// reviews must be ordered newest-first.
pub fn compare_properties(
    properties: &[PropertyReviews],
    now: DateTime<Utc>,
) -> Vec<PropertySummary> {
    let mut summaries: Vec<PropertySummary> = properties
        .iter()
        .map(|p| summarize_property(p, now))
        .collect();
    summaries.sort_by(|a, b| b.total_reviews.cmp(&a.total_reviews));
    summaries
}

pub fn summarize(properties: &[PropertyReviews], now: DateTime<Utc>) -> ComparisonReport {
    let data = compare_properties(properties, now);
    let avg_approval_rate = if data.is_empty() {
        0
    } else {
        let sum: u32 = data.iter().map(|p| p.approval_rate).sum();
        round_to(f64::from(sum) / data.len() as f64, 0) as u32
    };

    ComparisonReport {
        meta: ComparisonMeta {
            total_properties: data.len(),
            total_reviews: data.iter().map(|p| p.total_reviews).sum(),
            avg_approval_rate,
            generated_at: now,
        },
        data,
    }
}

pub fn summarize_property(property: &PropertyReviews, now: DateTime<Utc>) -> PropertySummary {
    let reviews = &property.reviews;
    let recent_cutoff = days_before(now, RECENT_DAYS);
    let recent: Vec<&ReviewRecord> = reviews
        .iter()
        .filter(|r| r.submitted_at >= recent_cutoff)
        .collect();

    let approved_count = reviews.iter().filter(|r| r.is_approved()).count();
    let turnarounds: Vec<f64> = reviews
        .iter()
        .filter_map(|r| {
            let approved_at = r.approval.as_ref()?.approval_event()?;
            Some(turnaround_days(r.submitted_at, approved_at))
        })
        .collect();

    PropertySummary {
        id: property.property.id,
        name: property.property.name.clone(),
        slug: property.property.slug.clone(),
        total_reviews: reviews.len(),
        avg_rating: average_rating(reviews.iter()).map(round1),
        approved_count,
        approval_rate: percent(approved_count, reviews.len()),
        avg_response_time: mean(&turnarounds).map(round1),
        top_issues: worst_categories(reviews, TOP_ISSUES),
        recent_trend: classify_trend(reviews),
        last_30_days: RecentSummary {
            reviews: recent.len(),
            avg_rating: average_rating(recent.into_iter()).map(round1),
        },
    }
}

fn average_rating<'a>(reviews: impl Iterator<Item = &'a ReviewRecord>) -> Option<f64> {
    let ratings: Vec<f64> = reviews.filter_map(effective_rating).collect();
    mean(&ratings)
}

/// Category tallies sorted worst average first, capped at `limit`.
pub fn worst_categories(reviews: &[ReviewRecord], limit: usize) -> Vec<CategoryTally> {
    let mut totals: BTreeMap<&str, (usize, f64)> = BTreeMap::new();
    for category in reviews.iter().flat_map(|r| r.categories.iter()) {
        if !category.rating.is_finite() {
            continue;
        }
        let entry = totals.entry(category.category.as_str()).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += category.rating;
    }

    let mut tallies: Vec<CategoryTally> = totals
        .into_iter()
        .map(|(category, (count, total))| CategoryTally {
            category: category.to_string(),
            count,
            avg_rating: total / count as f64,
        })
        .collect();
    tallies.sort_by(|a, b| a.avg_rating.total_cmp(&b.avg_rating));
    tallies.truncate(limit);
    tallies
}

/// Compares the newer half of a newest-first list with the older half.
/// The split is by position, not by elapsed time.
pub fn classify_trend(reviews: &[ReviewRecord]) -> RatingTrend {
    if reviews.len() < MIN_TREND_REVIEWS {
        return RatingTrend::Stable;
    }
    let (recent, older) = reviews.split_at(reviews.len() / 2);
    let (Some(recent_avg), Some(older_avg)) =
        (average_rating(recent.iter()), average_rating(older.iter()))
    else {
        return RatingTrend::Stable;
    };

    let difference = recent_avg - older_avg;
    if difference > TREND_THRESHOLD {
        RatingTrend::Up
    } else if difference < -TREND_THRESHOLD {
        RatingTrend::Down
    } else {
        RatingTrend::Stable
    }
}
