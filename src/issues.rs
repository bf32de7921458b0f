//! Recurring-issue detection over free review text.
//!
//! Matching is literal, case-insensitive substring containment against a
//! fixed keyword table. A review can match any number of keywords.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::models::ReviewRecord;
use crate::rating::{effective_rating, mean, round1};

pub const ISSUE_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "cleanliness",
        &["dirty", "unclean", "messy", "filthy", "stained", "smell", "odor"],
    ),
    (
        "maintenance",
        &["broken", "damaged", "repair", "fix", "not working", "faulty", "leak"],
    ),
    (
        "noise",
        &["loud", "noisy", "noise", "sound", "music", "party", "quiet"],
    ),
    (
        "amenities",
        &["wifi", "internet", "tv", "air conditioning", "heating", "hot water"],
    ),
    (
        "service",
        &["rude", "unhelpful", "slow response", "poor service", "unfriendly"],
    ),
    (
        "location",
        &["far", "distance", "transport", "parking", "access", "unsafe"],
    ),
];

/// Groups mentioned fewer times than this are dropped as noise.
pub const MIN_MATCHES: usize = 2;
pub const MAX_EXAMPLES: usize = 3;
pub const EXCERPT_CHARS: usize = 100;

const HIGH_SHARE: f64 = 0.15;
const HIGH_RATING: f64 = 3.0;
const MEDIUM_SHARE: f64 = 0.08;
const MEDIUM_RATING: f64 = 3.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectedIssue {
    pub category: String,
    pub keyword: String,
    pub frequency: usize,
    /// Mean effective rating of the matching reviews, one decimal.
    pub avg_rating: Option<f64>,
    pub severity: Severity,
    pub examples: Vec<String>,
}

#[derive(Default)]
struct KeywordTally {
    count: usize,
    ratings: Vec<f64>,
    examples: Vec<String>,
}

pub fn detect_recurring_issues(reviews: &[ReviewRecord]) -> Vec<DetectedIssue> {
    let mut tallies: BTreeMap<(&str, &str), KeywordTally> = BTreeMap::new();

    for review in reviews {
        let text = review.text.to_lowercase();
        let rating = effective_rating(review);

        for (category, keywords) in ISSUE_KEYWORDS {
            for keyword in keywords.iter().filter(|k| text.contains(*k)) {
                let tally = tallies.entry((*category, *keyword)).or_default();
                tally.count += 1;
                tally.ratings.extend(rating);
                if tally.examples.len() < MAX_EXAMPLES {
                    tally.examples.push(excerpt(&review.text));
                }
            }
        }
    }

    let total = reviews.len();
    let mut issues: Vec<DetectedIssue> = tallies
        .into_iter()
        .filter(|(_, tally)| tally.count >= MIN_MATCHES)
        .map(|((category, keyword), tally)| {
            let avg = mean(&tally.ratings);
            DetectedIssue {
                category: category.to_string(),
                keyword: keyword.to_string(),
                frequency: tally.count,
                avg_rating: avg.map(round1),
                severity: severity(tally.count, total, avg),
                examples: tally.examples,
            }
        })
        .collect();

    issues.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then_with(|| b.frequency.cmp(&a.frequency))
    });
    issues
}

/// `avg_rating` thresholds are literal and do not scale with the rating range.
fn severity(matches: usize, total: usize, avg_rating: Option<f64>) -> Severity {
    if total == 0 {
        return Severity::Low;
    }
    let share = matches as f64 / total as f64;
    let below = |limit: f64| avg_rating.is_some_and(|avg| avg < limit);

    if share > HIGH_SHARE && below(HIGH_RATING) {
        Severity::High
    } else if share > MEDIUM_SHARE || below(MEDIUM_RATING) {
        Severity::Medium
    } else {
        Severity::Low
    }
}

fn excerpt(text: &str) -> String {
    let head: String = text.chars().take(EXCERPT_CHARS).collect();
    format!("{head}...")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ReviewStatus;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn review(text: &str, rating: Option<f64>) -> ReviewRecord {
        ReviewRecord {
            id: Uuid::new_v4(),
            property_id: Uuid::nil(),
            text: text.to_string(),
            submitted_at: Utc.with_ymd_and_hms(2026, 2, 14, 8, 30, 0).unwrap(),
            rating_overall: rating,
            categories: Vec::new(),
            approval: None,
            channel: None,
            status: ReviewStatus::Published,
        }
    }

    fn filler(n: usize) -> Vec<ReviewRecord> {
        (0..n).map(|_| review("Great stay, would book again", Some(9.0))).collect()
    }

    #[test]
    fn frequent_low_rated_keyword_is_high_severity() {
        let mut reviews = filler(16);
        reviews.push(review("The bathroom was DIRTY", Some(2.0)));
        reviews.push(review("dirty sheets", Some(3.0)));
        reviews.push(review("Dirty kitchen", Some(2.0)));
        reviews.push(review("a bit dirty overall", Some(3.0)));

        let issues = detect_recurring_issues(&reviews);
        let dirty = issues
            .iter()
            .find(|i| i.category == "cleanliness" && i.keyword == "dirty")
            .unwrap();
        assert_eq!(dirty.frequency, 4);
        assert_eq!(dirty.avg_rating, Some(2.5));
        assert_eq!(dirty.severity, Severity::High);
        assert_eq!(dirty.examples.len(), 3);
        assert_eq!(issues[0].keyword, "dirty");
    }

    #[test]
    fn single_mentions_are_dropped() {
        let mut reviews = filler(5);
        reviews.push(review("It was noisy at night", Some(4.0)));
        assert!(detect_recurring_issues(&reviews)
            .iter()
            .all(|i| i.keyword != "noisy"));
    }

    #[test]
    fn one_review_can_match_many_keywords() {
        let reviews = vec![
            review("noisy party next door, wifi broken", Some(6.0)),
            review("noisy party again, wifi broken", Some(6.0)),
        ];
        let issues = detect_recurring_issues(&reviews);
        let keywords: Vec<&str> = issues.iter().map(|i| i.keyword.as_str()).collect();
        for expected in ["noisy", "party", "wifi", "broken"] {
            assert!(keywords.contains(&expected), "missing {expected}");
        }
        assert!(issues.iter().all(|i| i.frequency == 2));
    }

    #[test]
    fn severity_sorts_before_frequency() {
        let mut reviews = filler(40);
        // 3/45 share with high ratings
        for _ in 0..3 {
            reviews.push(review("parking was tight", Some(9.0)));
        }
        // 2/45 share with poor ratings
        for _ in 0..2 {
            reviews.push(review("staff were rude", Some(3.2)));
        }
        let issues = detect_recurring_issues(&reviews);
        assert_eq!(issues[0].keyword, "rude");
        assert_eq!(issues[0].severity, Severity::Medium);
        assert_eq!(issues[1].keyword, "parking");
        assert_eq!(issues[1].severity, Severity::Low);
    }

    #[test]
    fn repeated_detection_is_identical() {
        let mut reviews = filler(10);
        reviews.push(review("noisy party next door", Some(4.0)));
        reviews.push(review("noisy street, parking was tight", Some(5.0)));
        reviews.push(review("parking was a pain", Some(7.0)));

        let first = detect_recurring_issues(&reviews);
        let second = detect_recurring_issues(&reviews);
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn unratable_matches_only_count_toward_frequency() {
        let reviews = vec![review("leak under sink", None), review("leak again", None)];
        let issues = detect_recurring_issues(&reviews);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].avg_rating, None);
        // 100% share without a rating is medium, not high
        assert_eq!(issues[0].severity, Severity::Medium);
    }

    #[test]
    fn excerpts_are_truncated_by_characters() {
        let long = "é".repeat(150);
        let text = format!("dirty {long}");
        let reviews = vec![review(&text, Some(5.0)), review(&text, Some(5.0))];
        let issues = detect_recurring_issues(&reviews);
        assert_eq!(issues[0].examples[0].chars().count(), EXCERPT_CHARS + 3);
    }

    #[test]
    fn empty_input_detects_nothing() {
        assert!(detect_recurring_issues(&[]).is_empty());
    }
}
