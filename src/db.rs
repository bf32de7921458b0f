//! Postgres persistence: schema migration, ingestion upserts, approval
//! writes and the `ReviewStore` queries.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use uuid::Uuid;

use crate::approval;
use crate::config::DatabaseConfig;
use crate::error::{Error, Result};
use crate::models::{
    ApprovalState, CategoryRating, Facets, PropertyRef, PropertyReviews, ReviewFilter,
    ReviewRecord, ReviewStatus,
};
use crate::normalize::{NormalizedReview, ReviewSource};
use crate::store::ReviewStore;

pub const APPROVED_BY: &str = "manager";

pub async fn connect(url: &str, config: &DatabaseConfig) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(url)
        .await?;
    tracing::debug!(max_connections = config.max_connections, "connected to postgres");
    Ok(pool)
}

pub async fn init_db(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("schema migrations applied");
    Ok(())
}

/// Counts from one ingestion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertSummary {
    pub inserted: usize,
    pub updated: usize,
}

/// Upserts normalized reviews keyed by `(source, source_review_id)`,
/// creating properties by slug and replacing each review's category ratings.
pub async fn upsert_reviews(pool: &PgPool, reviews: &[NormalizedReview]) -> Result<UpsertSummary> {
    let mut summary = UpsertSummary::default();
    let mut tx = pool.begin().await?;

    for review in reviews {
        let hostaway_name =
            (review.source == ReviewSource::Hostaway).then_some(review.property.name.as_str());
        let property_id: Uuid = sqlx::query(
            r#"
            INSERT INTO review_pulse.properties (id, name, slug, hostaway_name)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (slug) DO UPDATE
            SET hostaway_name = COALESCE(EXCLUDED.hostaway_name, properties.hostaway_name)
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&review.property.name)
        .bind(&review.property.slug)
        .bind(hostaway_name)
        .fetch_one(&mut *tx)
        .await?
        .try_get("id")?;

        let row = sqlx::query(
            r#"
            INSERT INTO review_pulse.reviews
            (id, property_id, source, source_review_id, review_type, channel,
             rating_overall, text, guest_name, submitted_at, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (source, source_review_id) DO UPDATE
            SET property_id = EXCLUDED.property_id,
                review_type = EXCLUDED.review_type,
                channel = EXCLUDED.channel,
                rating_overall = EXCLUDED.rating_overall,
                text = EXCLUDED.text,
                guest_name = EXCLUDED.guest_name,
                submitted_at = EXCLUDED.submitted_at,
                status = EXCLUDED.status
            RETURNING id, (xmax = 0) AS inserted
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(property_id)
        .bind(review.source.as_str())
        .bind(&review.source_review_id)
        .bind(&review.review_type)
        .bind(review.channel.as_deref())
        .bind(review.rating_overall)
        .bind(&review.text)
        .bind(review.guest_name.as_deref())
        .bind(review.submitted_at)
        .bind(&review.status)
        .fetch_one(&mut *tx)
        .await?;

        let review_id: Uuid = row.try_get("id")?;
        if row.try_get::<bool, _>("inserted")? {
            summary.inserted += 1;
        } else {
            summary.updated += 1;
        }

        sqlx::query("DELETE FROM review_pulse.review_categories WHERE review_id = $1")
            .bind(review_id)
            .execute(&mut *tx)
            .await?;

        for (category, rating) in &review.categories {
            sqlx::query(
                r#"
                INSERT INTO review_pulse.review_categories (review_id, category, rating)
                VALUES ($1, $2, $3)
                "#,
            )
            .bind(review_id)
            .bind(category)
            .bind(rating)
            .execute(&mut *tx)
            .await?;
        }
    }

    tx.commit().await?;
    tracing::info!(
        inserted = summary.inserted,
        updated = summary.updated,
        "reviews upserted"
    );
    Ok(summary)
}

/// Records the Google place a property is linked to.
pub async fn set_google_place_id(pool: &PgPool, slug: &str, place_id: &str) -> Result<()> {
    sqlx::query("UPDATE review_pulse.properties SET google_place_id = $2 WHERE slug = $1")
        .bind(slug)
        .bind(place_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Approves or revokes one review for the website. Only published reviews
/// can be approved; revoking always succeeds.
pub async fn set_approval(
    pool: &PgPool,
    review_id: Uuid,
    approved: bool,
    now: DateTime<Utc>,
) -> Result<ApprovalState> {
    let status: String = sqlx::query("SELECT status FROM review_pulse.reviews WHERE id = $1")
        .bind(review_id)
        .fetch_optional(pool)
        .await?
        .ok_or(Error::ReviewNotFound(review_id))?
        .try_get("status")?;

    let state = approval::decide(ReviewStatus::parse(&status), approved, now)?;

    sqlx::query(
        r#"
        INSERT INTO review_pulse.selections
        (review_id, approved_for_website, approved_at, approved_by)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (review_id) DO UPDATE
        SET approved_for_website = EXCLUDED.approved_for_website,
            approved_at = EXCLUDED.approved_at,
            approved_by = EXCLUDED.approved_by
        "#,
    )
    .bind(review_id)
    .bind(state.approved)
    .bind(state.approved_at)
    .bind(state.approved.then_some(APPROVED_BY))
    .execute(pool)
    .await?;

    tracing::info!(%review_id, approved, "approval updated");
    Ok(state)
}

/// Postgres-backed `ReviewStore`.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn load_categories(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<CategoryRating>>> {
        let mut by_review: HashMap<Uuid, Vec<CategoryRating>> = HashMap::new();
        if ids.is_empty() {
            return Ok(by_review);
        }

        let rows = sqlx::query(
            r#"
            SELECT review_id, category, rating
            FROM review_pulse.review_categories
            WHERE review_id = ANY($1)
            ORDER BY category
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        for row in rows {
            by_review
                .entry(row.try_get("review_id")?)
                .or_default()
                .push(CategoryRating {
                    category: row.try_get("category")?,
                    rating: row.try_get("rating")?,
                });
        }
        Ok(by_review)
    }
}

fn push_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &ReviewFilter) {
    if let Some(slug) = &filter.property_slug {
        query.push(" AND p.slug = ").push_bind(slug.clone());
    }
    if let Some(channel) = &filter.channel {
        query.push(" AND r.channel = ").push_bind(channel.clone());
    }
    if let Some(status) = filter.status {
        query
            .push(" AND (LOWER(r.status) = 'published') = ")
            .push_bind(status == ReviewStatus::Published);
    }
    if let Some(from) = filter.submitted_from {
        query.push(" AND r.submitted_at >= ").push_bind(from);
    }
    if let Some(to) = filter.submitted_to {
        query.push(" AND r.submitted_at <= ").push_bind(to);
    }
    if let Some(min) = filter.min_rating {
        query.push(" AND r.rating_overall >= ").push_bind(min);
    }
    if let Some(max) = filter.max_rating {
        query.push(" AND r.rating_overall <= ").push_bind(max);
    }
    if let Some(text) = &filter.text {
        query
            .push(" AND r.text ILIKE ")
            .push_bind(format!("%{}%", escape_like(text)));
    }
    if !filter.categories.is_empty() {
        query
            .push(
                " AND EXISTS (SELECT 1 FROM review_pulse.review_categories c \
                 WHERE c.review_id = r.id AND c.category = ANY(",
            )
            .push_bind(filter.categories.clone())
            .push("))");
    }
    if let Some(approved) = filter.approved {
        query
            .push(" AND COALESCE(s.approved_for_website, FALSE) = ")
            .push_bind(approved);
    }
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn review_from_row(row: &PgRow) -> Result<ReviewRecord> {
    let approved: Option<bool> = row.try_get("approved_for_website")?;
    let status: String = row.try_get("status")?;
    Ok(ReviewRecord {
        id: row.try_get("id")?,
        property_id: row.try_get("property_id")?,
        text: row.try_get("text")?,
        submitted_at: row.try_get("submitted_at")?,
        rating_overall: row.try_get("rating_overall")?,
        categories: Vec::new(),
        approval: match approved {
            Some(approved) => Some(ApprovalState {
                approved,
                approved_at: row.try_get("approved_at")?,
            }),
            None => None,
        },
        channel: row.try_get("channel")?,
        status: ReviewStatus::parse(&status),
    })
}

impl ReviewStore for PgStore {
    async fn fetch_reviews(&self, filter: &ReviewFilter) -> Result<Vec<ReviewRecord>> {
        let mut query = QueryBuilder::<Postgres>::new(
            "SELECT r.id, r.property_id, r.text, r.submitted_at, r.rating_overall, \
             r.channel, r.status, s.approved_for_website, s.approved_at \
             FROM review_pulse.reviews r \
             JOIN review_pulse.properties p ON p.id = r.property_id \
             LEFT JOIN review_pulse.selections s ON s.review_id = r.id \
             WHERE TRUE",
        );
        push_filters(&mut query, filter);
        query.push(" ORDER BY r.submitted_at DESC, r.id");
        if let Some(limit) = filter.limit {
            query.push(" LIMIT ").push_bind(limit as i64);
        }

        let rows = query.build().fetch_all(&self.pool).await?;
        let mut reviews = rows
            .iter()
            .map(review_from_row)
            .collect::<Result<Vec<_>>>()?;

        let ids: Vec<Uuid> = reviews.iter().map(|r| r.id).collect();
        let mut categories = self.load_categories(&ids).await?;
        for review in &mut reviews {
            review.categories = categories.remove(&review.id).unwrap_or_default();
        }

        tracing::debug!(count = reviews.len(), "fetched reviews");
        Ok(reviews)
    }

    async fn fetch_properties(&self) -> Result<Vec<PropertyReviews>> {
        let rows = sqlx::query("SELECT id, name, slug FROM review_pulse.properties ORDER BY name")
            .fetch_all(&self.pool)
            .await?;

        let mut by_property: HashMap<Uuid, Vec<ReviewRecord>> = HashMap::new();
        for review in self.fetch_reviews(&ReviewFilter::default()).await? {
            by_property.entry(review.property_id).or_default().push(review);
        }

        rows.iter()
            .map(|row| -> Result<PropertyReviews> {
                let property = PropertyRef {
                    id: row.try_get("id")?,
                    name: row.try_get("name")?,
                    slug: row.try_get("slug")?,
                };
                let reviews = by_property.remove(&property.id).unwrap_or_default();
                Ok(PropertyReviews { property, reviews })
            })
            .collect()
    }

    async fn facets(&self) -> Result<Facets> {
        let categories = sqlx::query(
            "SELECT DISTINCT category FROM review_pulse.review_categories ORDER BY category",
        )
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(|row| row.try_get("category"))
        .collect::<std::result::Result<Vec<String>, _>>()?;

        let channels = sqlx::query(
            "SELECT DISTINCT channel FROM review_pulse.reviews \
             WHERE channel IS NOT NULL ORDER BY channel",
        )
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(|row| row.try_get("channel"))
        .collect::<std::result::Result<Vec<String>, _>>()?;

        Ok(Facets {
            categories,
            channels,
        })
    }
}
