//! Read/write access to the listing tables through Supabase's PostgREST API.

use crate::config::Settings;
use crate::domain::listing::{Listing, ViewEvent};
use crate::domain::recommendation::CandidateQuery;
use crate::storage::error::StoreDiagnosticsError;
use crate::storage::ListingStore;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use uuid::Uuid;

const DEFAULT_TIMEOUT_SECS: u64 = 10;
const BACKEND: &str = "supabase";
const LISTING_COLUMNS: &str = "id,name,school_id,address,price_min,amenities,rating,view_count";

#[derive(Debug, Clone)]
pub struct SupabaseListingStore {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct ViewRow {
    user_id: Uuid,
    viewed_at: DateTime<Utc>,
    listing: Option<Listing>,
}

impl SupabaseListingStore {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let base_url = settings.require_supabase_url()?.to_string();
        let api_key = settings.require_supabase_service_role_key()?.to_string();

        let timeout_secs = std::env::var("SUPABASE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build supabase http client")?;

        Ok(Self {
            http,
            base_url,
            api_key,
        })
    }

    fn url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.base_url.trim_end_matches('/'))
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert("apikey", HeaderValue::from_str(&self.api_key)?);
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.api_key))?,
        );
        Ok(headers)
    }

    async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        params: &[(String, String)],
    ) -> Result<Vec<T>> {
        let res = self
            .http
            .get(self.url(table))
            .headers(self.headers()?)
            .query(params)
            .send()
            .await
            .with_context(|| format!("supabase request failed (table={table})"))?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read supabase response")?;
        let text = check_status("select", format!("table={table}"), status, text)?;

        serde_json::from_str::<Vec<T>>(&text)
            .with_context(|| format!("supabase response for {table} has unexpected shape: {text}"))
    }
}

#[async_trait::async_trait]
impl ListingStore for SupabaseListingStore {
    fn backend_name(&self) -> &'static str {
        BACKEND
    }

    async fn recent_views(&self, user_id: Uuid, limit: usize) -> Result<Vec<ViewEvent>> {
        let rows: Vec<ViewRow> = self
            .select("listing_views", &recent_view_params(user_id, limit))
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                Some(ViewEvent {
                    user_id: row.user_id,
                    viewed_at: row.viewed_at,
                    listing: row.listing?,
                })
            })
            .collect())
    }

    async fn candidates(&self, query: &CandidateQuery) -> Result<Vec<Listing>> {
        self.select("listings", &candidate_params(query)).await
    }

    async fn record_view(&self, user_id: Uuid, listing_id: Uuid) -> Result<()> {
        let res = self
            .http
            .post(self.url("listing_views"))
            .headers(self.headers()?)
            .header("Prefer", "return=minimal")
            .json(&serde_json::json!({"user_id": user_id, "listing_id": listing_id}))
            .send()
            .await
            .context("supabase insert listing_views failed")?;

        let status = res.status();
        let text = res.text().await.unwrap_or_default();
        check_status(
            "insert",
            format!("table=listing_views listing_id={listing_id}"),
            status,
            text,
        )?;
        Ok(())
    }
}

/// Passes the body through on 2xx; otherwise keeps it on the error for diagnostics.
fn check_status(
    stage: &'static str,
    detail: String,
    status: StatusCode,
    text: String,
) -> Result<String> {
    if status.is_success() {
        return Ok(text);
    }
    Err(StoreDiagnosticsError {
        backend: BACKEND,
        stage,
        detail: format!("{detail} status={status}"),
        raw_body: Some(text),
    }
    .into())
}

fn recent_view_params(user_id: Uuid, limit: usize) -> Vec<(String, String)> {
    vec![
        (
            "select".to_string(),
            format!("user_id,viewed_at,listing:listings({LISTING_COLUMNS})"),
        ),
        ("user_id".to_string(), format!("eq.{user_id}")),
        ("order".to_string(), "viewed_at.desc".to_string()),
        ("limit".to_string(), limit.to_string()),
    ]
}

fn candidate_params(query: &CandidateQuery) -> Vec<(String, String)> {
    let mut params = vec![
        ("select".to_string(), LISTING_COLUMNS.to_string()),
        ("status".to_string(), "eq.active".to_string()),
        ("rating".to_string(), format!("gte.{}", query.min_rating)),
    ];

    if !query.school_ids.is_empty() {
        params.push(("school_id".to_string(), format!("in.({})", join_ids(&query.school_ids))));
    }

    if let Some(band) = query.price_band {
        params.push(("price_min".to_string(), format!("gte.{}", band.min)));
        params.push(("price_min".to_string(), format!("lte.{}", band.max)));
    }

    if !query.exclude_ids.is_empty() {
        params.push(("id".to_string(), format!("not.in.({})", join_ids(&query.exclude_ids))));
    }

    params.push(("order".to_string(), "rating.desc,view_count.desc,created_at.desc".to_string()));
    params.push(("limit".to_string(), query.limit.to_string()));
    params
}

fn join_ids(ids: &[Uuid]) -> String {
    ids.iter().map(Uuid::to_string).collect::<Vec<_>>().join(",")
}
