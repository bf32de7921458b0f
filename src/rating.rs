use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::models::{ReviewRecord, ReviewStatus};

/// Ratings at or above this value (10-point scale) count as positive.
pub const POSITIVE_THRESHOLD: f64 = 8.0;

/// Overall rating if present and finite, else the mean of the category
/// ratings, else `None`.
///
/// Zero is a valid rating. Non-finite values are never returned.
pub fn effective_rating(review: &ReviewRecord) -> Option<f64> {
    if let Some(overall) = review.rating_overall.filter(|v| v.is_finite()) {
        return Some(overall);
    }
    let values: Vec<f64> = review.categories.iter().map(|c| c.rating).collect();
    mean(&values)
}

/// Arithmetic mean, `None` for empty input or a non-finite result.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let avg = values.iter().sum::<f64>() / values.len() as f64;
    avg.is_finite().then_some(avg)
}

/// Half-up rounding to `places` decimals (`-2.5` rounds to `-2`).
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor + 0.5).floor() / factor
}

pub fn round1(value: f64) -> f64 {
    round_to(value, 1)
}

/// Integer percentage of `part` in `whole`, 0 when `whole` is 0.
pub fn percent(part: usize, whole: usize) -> u32 {
    if whole == 0 {
        return 0;
    }
    round_to(part as f64 / whole as f64 * 100.0, 0) as u32
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ReviewSort {
    #[default]
    DateDesc,
    DateAsc,
    RatingDesc,
    RatingAsc,
    /// Removed reviews first, then worst-rated, unratable last.
    Attention,
}

pub fn sort_reviews(reviews: &mut [ReviewRecord], order: ReviewSort) {
    match order {
        ReviewSort::DateDesc => reviews.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at)),
        ReviewSort::DateAsc => reviews.sort_by(|a, b| a.submitted_at.cmp(&b.submitted_at)),
        ReviewSort::RatingDesc => reviews.sort_by(|a, b| {
            rating_or(b, f64::NEG_INFINITY).total_cmp(&rating_or(a, f64::NEG_INFINITY))
        }),
        ReviewSort::RatingAsc => reviews.sort_by(|a, b| {
            rating_or(a, f64::NEG_INFINITY).total_cmp(&rating_or(b, f64::NEG_INFINITY))
        }),
        ReviewSort::Attention => reviews.sort_by(|a, b| {
            status_rank(a.status)
                .cmp(&status_rank(b.status))
                .then_with(|| rating_or(a, 11.0).total_cmp(&rating_or(b, 11.0)))
        }),
    }
}

fn rating_or(review: &ReviewRecord, fallback: f64) -> f64 {
    effective_rating(review).unwrap_or(fallback)
}

fn status_rank(status: ReviewStatus) -> u8 {
    match status {
        ReviewStatus::Removed => 0,
        ReviewStatus::Published => 1,
    }
}
