use crate::domain::listing::{Listing, ViewEvent};
use crate::domain::recommendation::CandidateQuery;
use crate::storage::ListingStore;
use anyhow::Context;
use chrono::{DateTime, Utc};
use uuid::Uuid;

type ListingRow = (
    Uuid,
    String,
    Option<Uuid>,
    Option<String>,
    Option<f64>,
    Vec<String>,
    Option<f64>,
    i64,
);

type ViewRow = (
    Uuid,
    DateTime<Utc>,
    Uuid,
    String,
    Option<Uuid>,
    Option<String>,
    Option<f64>,
    Vec<String>,
    Option<f64>,
    i64,
);

#[derive(Debug, Clone)]
pub struct PgListingStore {
    pool: sqlx::PgPool,
}

impl PgListingStore {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ListingStore for PgListingStore {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    async fn recent_views(&self, user_id: Uuid, limit: usize) -> anyhow::Result<Vec<ViewEvent>> {
        let rows = sqlx::query_as::<_, ViewRow>(
            "SELECT v.user_id, v.viewed_at, \
                    l.id, l.name, l.school_id, l.address, l.price_min, l.amenities, l.rating, l.view_count \
             FROM listing_views v \
             JOIN listings l ON l.id = v.listing_id \
             WHERE v.user_id = $1 \
             ORDER BY v.viewed_at DESC \
             LIMIT $2",
        )
        .persistent(false)
        .bind(user_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .context("select listing_views failed")?;

        Ok(rows
            .into_iter()
            .map(
                |(user_id, viewed_at, id, name, school_id, address, price_min, amenities, rating, view_count)| {
                    ViewEvent {
                        user_id,
                        viewed_at,
                        listing: listing_from_row((
                            id, name, school_id, address, price_min, amenities, rating, view_count,
                        )),
                    }
                },
            )
            .collect())
    }

    async fn candidates(&self, query: &CandidateQuery) -> anyhow::Result<Vec<Listing>> {
        let mut qb = sqlx::QueryBuilder::<sqlx::Postgres>::new(
            "SELECT id, name, school_id, address, price_min, amenities, rating, view_count \
             FROM listings \
             WHERE status = 'active' AND rating >= ",
        );
        qb.push_bind(query.min_rating);

        if !query.school_ids.is_empty() {
            qb.push(" AND school_id = ANY(");
            qb.push_bind(query.school_ids.clone());
            qb.push(")");
        }

        if let Some(band) = query.price_band {
            qb.push(" AND price_min BETWEEN ");
            qb.push_bind(band.min);
            qb.push(" AND ");
            qb.push_bind(band.max);
        }

        if !query.exclude_ids.is_empty() {
            qb.push(" AND NOT (id = ANY(");
            qb.push_bind(query.exclude_ids.clone());
            qb.push("))");
        }

        qb.push(" ORDER BY rating DESC, view_count DESC, created_at DESC LIMIT ");
        qb.push_bind(query.limit as i64);

        let rows = qb
            .build_query_as::<ListingRow>()
            .persistent(false)
            .fetch_all(&self.pool)
            .await
            .context("select candidate listings failed")?;

        Ok(rows.into_iter().map(listing_from_row).collect())
    }

    async fn record_view(&self, user_id: Uuid, listing_id: Uuid) -> anyhow::Result<()> {
        // view_count is bumped by the listing_views insert trigger.
        sqlx::query("INSERT INTO listing_views (user_id, listing_id) VALUES ($1, $2)")
            .persistent(false)
            .bind(user_id)
            .bind(listing_id)
            .execute(&self.pool)
            .await
            .with_context(|| format!("insert listing_views failed (listing_id={listing_id})"))?;
        Ok(())
    }
}

pub async fn count_views_before(pool: &sqlx::PgPool, cutoff: DateTime<Utc>) -> anyhow::Result<i64> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM listing_views WHERE viewed_at < $1")
        .persistent(false)
        .bind(cutoff)
        .fetch_one(pool)
        .await
        .context("count listing_views failed")?;
    Ok(count)
}

pub async fn prune_views_before(
    conn: &mut sqlx::PgConnection,
    cutoff: DateTime<Utc>,
) -> anyhow::Result<u64> {
    let res = sqlx::query("DELETE FROM listing_views WHERE viewed_at < $1")
        .persistent(false)
        .bind(cutoff)
        .execute(&mut *conn)
        .await
        .context("delete listing_views failed")?;
    Ok(res.rows_affected())
}

fn listing_from_row(row: ListingRow) -> Listing {
    let (id, name, school_id, address, price_min, amenities, rating, view_count) = row;
    Listing {
        id,
        name,
        school_id,
        address,
        price_min,
        amenities,
        rating,
        view_count,
    }
}
