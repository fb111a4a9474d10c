use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use hostel_core::domain::recommendation::RecommendedListing;
use hostel_core::recommend::{Recommender, DEFAULT_LIMIT};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = hostel_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let recommender = match hostel_core::storage::open_store(&settings).await {
        Ok(store) => {
            tracing::info!(backend = store.backend_name(), "listing store ready");
            Some(Recommender::new(store))
        }
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %format!("{e:#}"), "listing store unavailable; starting API in degraded mode");
            None
        }
    };

    let app = router(AppState { recommender });

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/users/:user_id/recommendations", get(get_recommendations))
        .route("/users/:user_id/views/:listing_id", post(record_view))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Clone)]
struct AppState {
    recommender: Option<Recommender>,
}

#[derive(Debug, Deserialize)]
struct RecommendationParams {
    limit: Option<usize>,
}

async fn get_recommendations(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(params): Query<RecommendationParams>,
) -> Result<Json<Vec<RecommendedListing>>, StatusCode> {
    let user_id = Uuid::parse_str(&user_id).map_err(|_| StatusCode::BAD_REQUEST)?;
    let Some(recommender) = &state.recommender else {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    };

    let limit = params.limit.unwrap_or(DEFAULT_LIMIT);

    // Retrieval failures degrade to an empty list inside the recommender.
    Ok(Json(recommender.recommend(user_id, limit).await))
}

async fn record_view(
    State(state): State<AppState>,
    Path((user_id, listing_id)): Path<(String, String)>,
) -> Result<StatusCode, StatusCode> {
    let user_id = Uuid::parse_str(&user_id).map_err(|_| StatusCode::BAD_REQUEST)?;
    let listing_id = Uuid::parse_str(&listing_id).map_err(|_| StatusCode::BAD_REQUEST)?;
    let Some(recommender) = &state.recommender else {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    };

    recommender
        .store()
        .record_view(user_id, listing_id)
        .await
        .map_err(|e| {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(%user_id, %listing_id, error = %format!("{e:#}"), "record view failed");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    Ok(StatusCode::NO_CONTENT)
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &hostel_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
