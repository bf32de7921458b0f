//! Normalization of channel payloads into the shape the ingestion upsert
//! expects. This is the only place that knows about raw Hostaway and Google
//! field names.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewSource {
    Hostaway,
    Google,
}

impl ReviewSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewSource::Hostaway => "hostaway",
            ReviewSource::Google => "google",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedProperty {
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedReview {
    pub source: ReviewSource,
    pub property: NormalizedProperty,
    pub review_type: String,
    pub channel: Option<String>,
    pub rating_overall: Option<f64>,
    pub categories: BTreeMap<String, f64>,
    pub text: String,
    pub guest_name: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub source_review_id: String,
    pub status: String,
}

#[derive(Debug, Deserialize)]
struct HostawayResponse {
    result: Vec<HostawayReview>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HostawayReview {
    id: i64,
    #[serde(rename = "type")]
    review_type: String,
    status: Option<String>,
    rating: Option<f64>,
    public_review: Option<String>,
    #[serde(default)]
    review_category: Vec<HostawayCategory>,
    submitted_at: String,
    guest_name: Option<String>,
    listing_name: String,
}

#[derive(Debug, Deserialize)]
struct HostawayCategory {
    category: String,
    rating: f64,
}

/// Lowercases and collapses every run of non-alphanumerics into one `-`.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;
    for ch in input.chars().flat_map(char::to_lowercase) {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch);
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// Accepts `YYYY-MM-DD HH:MM:SS` (assumed UTC) as sent by Hostaway, or RFC 3339.
fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(&raw.replace('T', " "), "%Y-%m-%d %H:%M:%S")
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(|e| Error::Normalize {
            source_name: "hostaway".to_string(),
            message: format!("invalid submittedAt {raw:?}: {e}"),
        })
}

pub fn normalize_hostaway(json: &str) -> Result<Vec<NormalizedReview>> {
    let response: HostawayResponse = serde_json::from_str(json)?;
    response
        .result
        .into_iter()
        .map(|review| {
            Ok(NormalizedReview {
                source: ReviewSource::Hostaway,
                property: NormalizedProperty {
                    slug: slugify(&review.listing_name),
                    name: review.listing_name,
                },
                review_type: review.review_type,
                channel: Some(ReviewSource::Hostaway.as_str().to_string()),
                rating_overall: review.rating,
                categories: review
                    .review_category
                    .into_iter()
                    .map(|c| (c.category, c.rating))
                    .collect(),
                text: review.public_review.unwrap_or_default(),
                guest_name: review.guest_name,
                submitted_at: parse_timestamp(&review.submitted_at)?,
                source_review_id: review.id.to_string(),
                status: review.status.unwrap_or_else(|| "published".to_string()),
            })
        })
        .collect::<Result<Vec<_>>>()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GoogleSummary {
    pub name: String,
    pub rating: Option<f64>,
    pub user_ratings_total: Option<u64>,
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GooglePlaceResponse {
    status: String,
    #[serde(default)]
    result: Option<GooglePlace>,
}

#[derive(Debug, Deserialize)]
struct GooglePlace {
    #[serde(default)]
    name: String,
    rating: Option<f64>,
    user_ratings_total: Option<u64>,
    url: Option<String>,
    #[serde(default)]
    reviews: Vec<GoogleReview>,
}

#[derive(Debug, Deserialize)]
struct GoogleReview {
    author_name: Option<String>,
    #[serde(default)]
    rating: f64,
    #[serde(default)]
    text: String,
    time: i64,
}

/// Normalizes a Places "details" payload. A non-`OK` status is an empty
/// result rather than an error, matching how the API reports missing places.
pub fn normalize_google(
    json: &str,
    place_id: &str,
    property: &NormalizedProperty,
) -> Result<(GoogleSummary, Vec<NormalizedReview>)> {
    let response: GooglePlaceResponse = serde_json::from_str(json)?;
    let place = match (response.status.as_str(), response.result) {
        ("OK", Some(place)) => place,
        (status, _) => {
            tracing::warn!(place_id, status, "google place lookup returned no result");
            return Ok((GoogleSummary::default(), Vec::new()));
        }
    };

    let summary = GoogleSummary {
        name: place.name,
        rating: place.rating,
        user_ratings_total: place.user_ratings_total,
        url: place.url,
    };

    let reviews = place
        .reviews
        .into_iter()
        .map(|review| {
            let submitted_at = Utc.timestamp_opt(review.time, 0).single().ok_or_else(|| {
                Error::Normalize {
                    source_name: "google".to_string(),
                    message: format!("invalid review time {}", review.time),
                }
            })?;
            Ok(NormalizedReview {
                source: ReviewSource::Google,
                property: property.clone(),
                review_type: "guest-to-host".to_string(),
                channel: Some(ReviewSource::Google.as_str().to_string()),
                rating_overall: Some(review.rating),
                categories: BTreeMap::new(),
                text: review.text,
                guest_name: review.author_name,
                submitted_at,
                source_review_id: format!("google:{place_id}:{}", review.time),
                status: "published".to_string(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok((summary, reviews))
}
