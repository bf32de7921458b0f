use serde::Serialize;

use crate::models::ReviewRecord;
use crate::rating::{effective_rating, mean, percent, round1, POSITIVE_THRESHOLD};

/// Percent changes inside this band (exclusive) are reported as flat.
pub const FLAT_DEADBAND_PCT: f64 = 1.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiSnapshot {
    pub count: usize,
    /// `None` when no review in the set is ratable.
    pub avg_rating: Option<f64>,
    pub percent_positive: Option<u32>,
    pub percent_approved: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Flat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorHint {
    Favorable,
    Unfavorable,
    Neutral,
}

impl Direction {
    /// Treats a raw increase as favorable; callers invert for lower-is-better metrics.
    pub fn color_hint(&self) -> ColorHint {
        match self {
            Direction::Up => ColorHint::Favorable,
            Direction::Down => ColorHint::Unfavorable,
            Direction::Flat => ColorHint::Neutral,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WowDelta {
    pub absolute_change: f64,
    pub percent_change: f64,
    pub direction: Direction,
    pub color_hint: ColorHint,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpisWithDeltas {
    #[serde(flatten)]
    pub current: KpiSnapshot,
    pub avg_delta: Option<WowDelta>,
    pub count_delta: Option<WowDelta>,
    pub pos_pct_delta: Option<WowDelta>,
}

pub fn kpis_for(reviews: &[ReviewRecord]) -> KpiSnapshot {
    let ratings: Vec<f64> = reviews.iter().filter_map(effective_rating).collect();
    let positive = ratings.iter().filter(|r| **r >= POSITIVE_THRESHOLD).count();
    let approved = reviews.iter().filter(|r| r.is_approved()).count();

    KpiSnapshot {
        count: reviews.len(),
        avg_rating: mean(&ratings),
        percent_positive: (!ratings.is_empty()).then(|| percent(positive, ratings.len())),
        percent_approved: percent(approved, reviews.len()),
    }
}

/// KPIs for `current` with per-metric deltas against `previous`. A missing
/// baseline on one metric leaves the others unaffected.
pub fn kpis_with_deltas(current: &[ReviewRecord], previous: &[ReviewRecord]) -> KpisWithDeltas {
    let now = kpis_for(current);
    let before = kpis_for(previous);

    KpisWithDeltas {
        avg_delta: delta(now.avg_rating, before.avg_rating),
        count_delta: delta(Some(now.count as f64), Some(before.count as f64)),
        pos_pct_delta: delta(
            now.percent_positive.map(f64::from),
            before.percent_positive.map(f64::from),
        ),
        current: now,
    }
}

/// Week-over-week change. `None` when either side is missing or non-finite,
/// or when `previous` is zero.
pub fn delta(current: Option<f64>, previous: Option<f64>) -> Option<WowDelta> {
    let (current, previous) = (current?, previous?);
    if !current.is_finite() || !previous.is_finite() || previous == 0.0 {
        return None;
    }

    let absolute_change = current - previous;
    let percent_change = round1(absolute_change / previous.abs() * 100.0);
    let direction = if percent_change.abs() < FLAT_DEADBAND_PCT {
        Direction::Flat
    } else if percent_change > 0.0 {
        Direction::Up
    } else {
        Direction::Down
    };

    Some(WowDelta {
        absolute_change,
        percent_change,
        direction,
        color_hint: direction.color_hint(),
    })
}
