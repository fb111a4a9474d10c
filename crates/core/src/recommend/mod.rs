pub mod rank;
pub mod score;

use crate::domain::recommendation::RecommendedListing;
use crate::storage::error::StoreDiagnosticsError;
use crate::storage::ListingStore;
use anyhow::Context;
use rank::{rank_candidates, History, CANDIDATE_LIMIT, RECENT_VIEW_LIMIT};
use std::sync::Arc;
use uuid::Uuid;

pub use rank::DEFAULT_LIMIT;

/// "Students who viewed these hostels may also like…" over a [`ListingStore`].
#[derive(Clone)]
pub struct Recommender {
    store: Arc<dyn ListingStore>,
}

impl Recommender {
    pub fn new(store: Arc<dyn ListingStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn ListingStore> {
        &self.store
    }

    /// Like [`Recommender::try_recommend`], but a failed retrieval yields an
    /// empty list so the caller's page still renders.
    pub async fn recommend(&self, user_id: Uuid, limit: usize) -> Vec<RecommendedListing> {
        match self.try_recommend(user_id, limit).await {
            Ok(out) => out,
            Err(err) => {
                let raw_body = err
                    .downcast_ref::<StoreDiagnosticsError>()
                    .and_then(|diag| diag.raw_body.as_deref());
                tracing::warn!(
                    %user_id,
                    backend = self.store.backend_name(),
                    error = %format!("{err:#}"),
                    raw_body,
                    "recommendation retrieval failed; returning no recommendations"
                );
                Vec::new()
            }
        }
    }

    pub async fn try_recommend(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> anyhow::Result<Vec<RecommendedListing>> {
        let limit = limit.min(CANDIDATE_LIMIT);
        if limit == 0 {
            return Ok(Vec::new());
        }

        let t0 = std::time::Instant::now();
        let views = self
            .store
            .recent_views(user_id, RECENT_VIEW_LIMIT)
            .await
            .context("fetch recent views failed")?;

        let history = History::from_views(views);
        if history.is_empty() {
            tracing::debug!(%user_id, "no view history; nothing to recommend");
            return Ok(Vec::new());
        }

        // Filter parameters depend on the history, so this cannot overlap the first fetch.
        let query = history.candidate_query();
        let candidates = self
            .store
            .candidates(&query)
            .await
            .context("fetch recommendation candidates failed")?;

        let candidates_len = candidates.len();
        let out = rank_candidates(history.references(), candidates, &history.viewed_ids(), limit);

        tracing::debug!(
            %user_id,
            references = history.references().len(),
            candidates_len,
            recommended = out.len(),
            elapsed_ms = t0.elapsed().as_millis(),
            "recommendations ranked"
        );
        Ok(out)
    }
}
