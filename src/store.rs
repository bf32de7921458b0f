//! The persistence seam. Analytics code receives plain review collections;
//! anything that can answer these queries can feed it.

use std::collections::{BTreeSet, HashMap};

use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    ApprovalState, CategoryRating, Facets, PropertyRef, PropertyReviews, ReviewFilter,
    ReviewRecord, ReviewStatus,
};
use crate::normalize::NormalizedReview;

#[allow(async_fn_in_trait)]
pub trait ReviewStore {
    /// Reviews matching `filter`, newest first, with categories and approval loaded.
    async fn fetch_reviews(&self, filter: &ReviewFilter) -> Result<Vec<ReviewRecord>>;

    /// Every property with its reviews, newest first, properties ordered by name.
    async fn fetch_properties(&self) -> Result<Vec<PropertyReviews>>;

    /// Distinct category and channel names, sorted.
    async fn facets(&self) -> Result<Facets>;
}

/// In-memory store, used for offline analysis of an exported payload.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    properties: Vec<PropertyRef>,
    reviews: Vec<ReviewRecord>,
    keys: HashMap<(String, String), usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.reviews.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reviews.is_empty()
    }

    /// Upserts by `(source, source_review_id)`, creating properties by slug.
    pub fn ingest(&mut self, normalized: Vec<NormalizedReview>) -> usize {
        let mut inserted = 0usize;
        for review in normalized {
            let property_id = self.property_id(&review.property.slug, &review.property.name);
            let record = ReviewRecord {
                id: Uuid::new_v4(),
                property_id,
                text: review.text,
                submitted_at: review.submitted_at,
                rating_overall: review.rating_overall,
                categories: review
                    .categories
                    .into_iter()
                    .map(|(category, rating)| CategoryRating { category, rating })
                    .collect(),
                approval: None,
                channel: review.channel,
                status: ReviewStatus::parse(&review.status),
            };

            let key = (review.source.as_str().to_string(), review.source_review_id);
            match self.keys.get(&key) {
                Some(&index) => {
                    let existing = &mut self.reviews[index];
                    existing.text = record.text;
                    existing.submitted_at = record.submitted_at;
                    existing.rating_overall = record.rating_overall;
                    existing.categories = record.categories;
                    existing.channel = record.channel;
                    existing.status = record.status;
                }
                None => {
                    self.keys.insert(key, self.reviews.len());
                    self.reviews.push(record);
                    inserted += 1;
                }
            }
        }
        inserted
    }

    fn property_id(&mut self, slug: &str, name: &str) -> Uuid {
        if let Some(existing) = self.properties.iter().find(|p| p.slug == slug) {
            return existing.id;
        }
        let id = Uuid::new_v4();
        self.properties.push(PropertyRef {
            id,
            name: name.to_string(),
            slug: slug.to_string(),
        });
        id
    }

    /// Replaces the approval state of one review.
    pub fn set_approval(&mut self, review_id: Uuid, approval: ApprovalState) -> bool {
        match self.reviews.iter_mut().find(|r| r.id == review_id) {
            Some(review) => {
                review.approval = Some(approval);
                true
            }
            None => false,
        }
    }

    fn newest_first(mut reviews: Vec<ReviewRecord>) -> Vec<ReviewRecord> {
        reviews.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        reviews
    }
}

impl ReviewStore for MemoryStore {
    async fn fetch_reviews(&self, filter: &ReviewFilter) -> Result<Vec<ReviewRecord>> {
        let property_id = match &filter.property_slug {
            Some(slug) => match self.properties.iter().find(|p| &p.slug == slug) {
                Some(property) => Some(property.id),
                None => return Ok(Vec::new()),
            },
            None => None,
        };

        let matching: Vec<ReviewRecord> = self
            .reviews
            .iter()
            .filter(|r| property_id.map_or(true, |id| r.property_id == id))
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();

        let mut reviews = Self::newest_first(matching);
        if let Some(limit) = filter.limit {
            reviews.truncate(limit);
        }
        Ok(reviews)
    }

    async fn fetch_properties(&self) -> Result<Vec<PropertyReviews>> {
        let mut properties = self.properties.clone();
        properties.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(properties
            .into_iter()
            .map(|property| {
                let reviews = self
                    .reviews
                    .iter()
                    .filter(|r| r.property_id == property.id)
                    .cloned()
                    .collect();
                PropertyReviews {
                    property,
                    reviews: Self::newest_first(reviews),
                }
            })
            .collect())
    }

    async fn facets(&self) -> Result<Facets> {
        let categories: BTreeSet<&str> = self
            .reviews
            .iter()
            .flat_map(|r| r.categories.iter().map(|c| c.category.as_str()))
            .collect();
        let channels: BTreeSet<&str> = self
            .reviews
            .iter()
            .filter_map(|r| r.channel.as_deref())
            .collect();
        Ok(Facets {
            categories: categories.into_iter().map(str::to_string).collect(),
            channels: channels.into_iter().map(str::to_string).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::{NormalizedProperty, ReviewSource};
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use std::collections::BTreeMap;

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 9, 20, 10, 0, 0).unwrap()
    }

    fn normalized(id: &str, listing: &str, days_ago: i64, rating: Option<f64>) -> NormalizedReview {
        NormalizedReview {
            source: ReviewSource::Hostaway,
            property: NormalizedProperty {
                name: listing.to_string(),
                slug: crate::normalize::slugify(listing),
            },
            review_type: "guest-to-host".to_string(),
            channel: Some("hostaway".to_string()),
            rating_overall: rating,
            categories: BTreeMap::from([("cleanliness".to_string(), 9.0)]),
            text: format!("review {id}"),
            guest_name: None,
            submitted_at: base() - Duration::days(days_ago),
            source_review_id: id.to_string(),
            status: "published".to_string(),
        }
    }

    fn store() -> MemoryStore {
        let mut store = MemoryStore::new();
        store.ingest(vec![
            normalized("1", "Camden Flat", 3, Some(9.0)),
            normalized("2", "Camden Flat", 1, Some(6.0)),
            normalized("3", "Brixton Loft", 2, None),
        ]);
        store
    }

    #[test]
    fn reingest_updates_instead_of_duplicating() {
        let mut store = store();
        let inserted = store.ingest(vec![normalized("2", "Camden Flat", 1, Some(7.0))]);
        assert_eq!(inserted, 0);
        assert_eq!(store.len(), 3);
    }

    #[tokio::test]
    async fn fetch_reviews_filters_by_property_and_orders_newest_first() {
        let store = store();
        let filter = ReviewFilter::for_property(Some("camden-flat"));
        let reviews = store.fetch_reviews(&filter).await.unwrap();
        assert_eq!(reviews.len(), 2);
        assert_eq!(reviews[0].rating_overall, Some(6.0));

        let unknown = ReviewFilter::for_property(Some("nowhere"));
        assert!(store.fetch_reviews(&unknown).await.unwrap().is_empty());

        let limited = ReviewFilter::default().with_limit(1);
        assert_eq!(store.fetch_reviews(&limited).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn properties_are_grouped_and_sorted_by_name() {
        let properties = store().fetch_properties().await.unwrap();
        let names: Vec<&str> = properties.iter().map(|p| p.property.name.as_str()).collect();
        assert_eq!(names, vec!["Brixton Loft", "Camden Flat"]);
        assert_eq!(properties[1].reviews.len(), 2);
        assert!(properties[1].reviews[0].submitted_at > properties[1].reviews[1].submitted_at);
    }

    #[tokio::test]
    async fn approval_filter_sees_updated_state() {
        let mut store = store();
        let id = store.fetch_reviews(&ReviewFilter::default()).await.unwrap()[0].id;
        assert!(store.set_approval(
            id,
            ApprovalState {
                approved: true,
                approved_at: Some(base()),
            }
        ));
        let filter = ReviewFilter {
            approved: Some(true),
            ..ReviewFilter::default()
        };
        let approved = store.fetch_reviews(&filter).await.unwrap();
        assert_eq!(approved.len(), 1);
        assert_eq!(approved[0].id, id);
    }

    #[tokio::test]
    async fn facets_are_distinct_and_sorted() {
        let facets = store().facets().await.unwrap();
        assert_eq!(facets.categories, vec!["cleanliness".to_string()]);
        assert_eq!(facets.channels, vec!["hostaway".to_string()]);
    }
}
