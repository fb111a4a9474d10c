use crate::domain::listing::Listing;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A listing augmented with the score and reasons of its best match against
/// the requester's recent views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendedListing {
    #[serde(flatten)]
    pub listing: Listing,
    #[serde(rename = "recommendationScore")]
    pub score: f64,
    #[serde(rename = "recommendationReasons")]
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceBand {
    pub min: f64,
    pub max: f64,
}

/// Coarse pre-filter handed to the candidate fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateQuery {
    /// Empty means "any school".
    pub school_ids: Vec<Uuid>,
    pub price_band: Option<PriceBand>,
    pub min_rating: f64,
    pub exclude_ids: Vec<Uuid>,
    pub limit: usize,
}
