pub mod error;
pub mod lock;
pub mod postgres;
pub mod supabase;

use crate::config::Settings;
use crate::domain::listing::{Listing, ViewEvent};
use crate::domain::recommendation::CandidateQuery;
use anyhow::Context;
use std::sync::Arc;
use uuid::Uuid;

const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Persistence seam for the recommender: view history in, candidates out.
#[async_trait::async_trait]
pub trait ListingStore: Send + Sync {
    fn backend_name(&self) -> &'static str;

    /// Up to `limit` views by `user_id`, most recent first.
    async fn recent_views(&self, user_id: Uuid, limit: usize) -> anyhow::Result<Vec<ViewEvent>>;

    /// Active listings matching `query`, ordered by rating then view count, both descending.
    async fn candidates(&self, query: &CandidateQuery) -> anyhow::Result<Vec<Listing>>;

    async fn record_view(&self, user_id: Uuid, listing_id: Uuid) -> anyhow::Result<()>;
}

pub async fn migrate(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("sqlx migrations failed")?;
    Ok(())
}

pub async fn connect(settings: &Settings) -> anyhow::Result<sqlx::PgPool> {
    let db_url = settings.require_database_url()?;
    let max_connections = std::env::var("DB_MAX_CONNECTIONS")
        .ok()
        .and_then(|s| s.parse::<u32>().ok())
        .unwrap_or(DEFAULT_MAX_CONNECTIONS);

    sqlx::postgres::PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(db_url)
        .await
        .context("connect DATABASE_URL failed")
}

/// Postgres when `DATABASE_URL` is set, otherwise the Supabase REST API.
pub async fn open_store(settings: &Settings) -> anyhow::Result<Arc<dyn ListingStore>> {
    if settings.database_url.is_some() {
        let pool = connect(settings).await?;
        migrate(&pool).await?;
        return Ok(Arc::new(postgres::PgListingStore::new(pool)));
    }

    if settings.supabase_url.is_some() {
        let store = supabase::SupabaseListingStore::from_settings(settings)?;
        return Ok(Arc::new(store));
    }

    anyhow::bail!("no listing store configured: set DATABASE_URL or SUPABASE_URL")
}
