use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    Published,
    Removed,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::Published => "published",
            ReviewStatus::Removed => "removed",
        }
    }

    /// Only an explicit `published` counts as published. Any other upstream
    /// status (`awaiting`, `removed`, ...) is not eligible for the website.
    pub fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("published") {
            ReviewStatus::Published
        } else {
            ReviewStatus::Removed
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRating {
    pub category: String,
    pub rating: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalState {
    pub approved: bool,
    pub approved_at: Option<DateTime<Utc>>,
}

impl ApprovalState {
    /// The approval timestamp, only when the review is actually approved.
    pub fn approval_event(&self) -> Option<DateTime<Utc>> {
        if self.approved {
            self.approved_at
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyRef {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
}

/// Canonical review shape consumed by every analytics module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub id: Uuid,
    pub property_id: Uuid,
    pub text: String,
    pub submitted_at: DateTime<Utc>,
    pub rating_overall: Option<f64>,
    pub categories: Vec<CategoryRating>,
    pub approval: Option<ApprovalState>,
    pub channel: Option<String>,
    pub status: ReviewStatus,
}

impl ReviewRecord {
    pub fn is_approved(&self) -> bool {
        self.approval.as_ref().is_some_and(|a| a.approved)
    }
}

/// A property with its reviews ordered newest-first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyReviews {
    pub property: PropertyRef,
    pub reviews: Vec<ReviewRecord>,
}

/// Predicates for the persistence collaborator. Every field is optional; an
/// empty filter matches every review.
#[derive(Debug, Clone, Default)]
pub struct ReviewFilter {
    pub property_slug: Option<String>,
    pub channel: Option<String>,
    pub status: Option<ReviewStatus>,
    pub submitted_from: Option<DateTime<Utc>>,
    pub submitted_to: Option<DateTime<Utc>>,
    pub min_rating: Option<f64>,
    pub max_rating: Option<f64>,
    pub text: Option<String>,
    pub categories: Vec<String>,
    pub approved: Option<bool>,
    pub limit: Option<usize>,
}

impl ReviewFilter {
    pub fn for_property(slug: Option<&str>) -> Self {
        Self {
            property_slug: slug.map(str::to_string),
            ..Self::default()
        }
    }

    pub fn since(mut self, from: DateTime<Utc>) -> Self {
        self.submitted_from = Some(from);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Evaluates every predicate except the property slug, which needs the
    /// property table and is resolved by the store.
    pub fn matches(&self, review: &ReviewRecord) -> bool {
        if let Some(channel) = &self.channel {
            if review.channel.as_deref() != Some(channel.as_str()) {
                return false;
            }
        }
        if let Some(status) = self.status {
            if review.status != status {
                return false;
            }
        }
        if self.submitted_from.is_some_and(|from| review.submitted_at < from) {
            return false;
        }
        if self.submitted_to.is_some_and(|to| review.submitted_at > to) {
            return false;
        }
        // Rating bounds apply to the overall rating only; reviews without one never match.
        if self.min_rating.is_some() || self.max_rating.is_some() {
            let Some(rating) = review.rating_overall else {
                return false;
            };
            if self.min_rating.is_some_and(|min| rating < min) {
                return false;
            }
            if self.max_rating.is_some_and(|max| rating > max) {
                return false;
            }
        }
        if let Some(needle) = &self.text {
            if !review.text.to_lowercase().contains(&needle.to_lowercase()) {
                return false;
            }
        }
        if !self.categories.is_empty()
            && !review
                .categories
                .iter()
                .any(|c| self.categories.contains(&c.category))
        {
            return false;
        }
        if let Some(approved) = self.approved {
            if review.is_approved() != approved {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Facets {
    pub categories: Vec<String>,
    pub channels: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn review(rating: Option<f64>, channel: &str) -> ReviewRecord {
        ReviewRecord {
            id: Uuid::new_v4(),
            property_id: Uuid::new_v4(),
            text: "Lovely flat, but the WiFi dropped".to_string(),
            submitted_at: Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap(),
            rating_overall: rating,
            categories: vec![CategoryRating {
                category: "cleanliness".to_string(),
                rating: 9.0,
            }],
            approval: None,
            channel: Some(channel.to_string()),
            status: ReviewStatus::Published,
        }
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(ReviewFilter::default().matches(&review(None, "hostaway")));
    }

    #[test]
    fn rating_bounds_exclude_unrated_reviews() {
        let filter = ReviewFilter {
            min_rating: Some(5.0),
            ..ReviewFilter::default()
        };
        assert!(!filter.matches(&review(None, "hostaway")));
        assert!(filter.matches(&review(Some(8.0), "hostaway")));
        assert!(!filter.matches(&review(Some(4.0), "hostaway")));
    }

    #[test]
    fn text_and_category_predicates() {
        let filter = ReviewFilter {
            text: Some("wifi".to_string()),
            categories: vec!["cleanliness".to_string(), "noise".to_string()],
            ..ReviewFilter::default()
        };
        assert!(filter.matches(&review(None, "hostaway")));

        let filter = ReviewFilter {
            categories: vec!["noise".to_string()],
            ..ReviewFilter::default()
        };
        assert!(!filter.matches(&review(None, "hostaway")));
    }

    #[test]
    fn approval_and_channel_predicates() {
        let mut approved = review(None, "google");
        approved.approval = Some(ApprovalState {
            approved: true,
            approved_at: None,
        });
        let filter = ReviewFilter {
            approved: Some(true),
            channel: Some("google".to_string()),
            ..ReviewFilter::default()
        };
        assert!(filter.matches(&approved));
        assert!(!filter.matches(&review(None, "google")));
        assert!(!filter.matches(&review(None, "hostaway")));
    }

    #[test]
    fn approval_event_requires_flag_and_timestamp() {
        let at = Utc.with_ymd_and_hms(2026, 3, 11, 0, 0, 0).unwrap();
        let state = ApprovalState {
            approved: false,
            approved_at: Some(at),
        };
        assert_eq!(state.approval_event(), None);
        let state = ApprovalState {
            approved: true,
            approved_at: Some(at),
        };
        assert_eq!(state.approval_event(), Some(at));
    }

    #[test]
    fn only_published_status_parses_as_published() {
        assert_eq!(ReviewStatus::parse("published"), ReviewStatus::Published);
        assert_eq!(ReviewStatus::parse("Published"), ReviewStatus::Published);
        assert_eq!(ReviewStatus::parse("removed"), ReviewStatus::Removed);
        assert_eq!(ReviewStatus::parse("awaiting"), ReviewStatus::Removed);
        assert_eq!(ReviewStatus::parse(""), ReviewStatus::Removed);
    }
}
