use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// A hostel listing as the recommender sees it. Every attribute other than the
/// id may be missing; missing attributes simply never match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: Uuid,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default)]
    pub school_id: Option<Uuid>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub price_min: Option<f64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub amenities: Vec<String>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub view_count: i64,
}

impl Listing {
    pub fn new(id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            school_id: None,
            address: None,
            price_min: None,
            amenities: Vec::new(),
            rating: None,
            view_count: 0,
        }
    }
}

/// One "requester looked at listing" record, carrying a denormalized copy of
/// the listing as it was fetched alongside the view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewEvent {
    pub user_id: Uuid,
    pub listing: Listing,
    pub viewed_at: DateTime<Utc>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
