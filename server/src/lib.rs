use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use time::{Duration, OffsetDateTime};
use tower_http::cors::{Any, AllowOrigin, CorsLayer};

use search_core::analytics::{self, QueryStats, VariantMetrics};
use search_core::{SearchEngine, SearchRequest, Variant};

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SearchEngine>,
    pub admin_token: Option<String>,
}

/// Build the router, reading the admin token from `ADMIN_TOKEN`.
pub fn build_app(engine: Arc<SearchEngine>) -> Router {
    let admin_token = std::env::var("ADMIN_TOKEN").ok();
    build_app_with(AppState {
        engine,
        admin_token,
    })
}

pub fn build_app_with(state: AppState) -> Router {
    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any)
            } else {
                CorsLayer::new()
                    .allow_origin(AllowOrigin::list(origins))
                    .allow_methods(Any)
                    .allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    };

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/click", post(click_handler))
        .route("/metrics/ab", get(ab_metrics_handler))
        .route("/metrics/queries", get(query_metrics_handler))
        .route("/admin/config", get(get_config).post(update_config))
        .route("/admin/weights", get(get_weights).post(set_weights))
        .route("/admin/train", post(train_handler))
        .with_state(state)
        .layer(cors)
}

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    pub category: Option<String>,
    pub session: Option<String>,
    #[serde(default)]
    pub page: usize,
    #[serde(default = "default_page_size")]
    pub size: usize,
}

fn default_page_size() -> usize {
    10
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub variant: Variant,
    pub took_ms: u64,
    pub total_hits: usize,
    pub results: Vec<SearchHit>,
}

#[derive(Serialize)]
pub struct SearchHit {
    pub id: String,
    pub headline: String,
    pub category: Option<String>,
    pub link: Option<String>,
    pub score: f64,
}

pub async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Json<SearchResponse> {
    let start = std::time::Instant::now();
    let outcome = state.engine.search(&SearchRequest {
        query: &params.q,
        category: params.category.as_deref(),
        session_id: params.session.as_deref(),
        page: params.page,
        page_size: params.size.clamp(1, 100),
    });

    let results = outcome
        .hits
        .into_iter()
        .map(|hit| SearchHit {
            id: hit.article.id,
            headline: hit.article.headline,
            category: hit.article.category,
            link: hit.article.link,
            score: hit.score,
        })
        .collect();

    Json(SearchResponse {
        query: params.q,
        variant: outcome.variant,
        took_ms: start.elapsed().as_millis() as u64,
        total_hits: outcome.total_hits,
        results,
    })
}

#[derive(Deserialize)]
pub struct ClickRequest {
    pub session_id: Option<String>,
    pub query: String,
    pub article_id: String,
    pub position: Option<u32>,
    pub variant: Variant,
    pub time_to_click_ms: Option<u64>,
}

pub async fn click_handler(
    State(state): State<AppState>,
    Json(click): Json<ClickRequest>,
) -> StatusCode {
    state.engine.record_click(
        click.session_id.as_deref(),
        &click.query,
        &click.article_id,
        click.position,
        click.variant,
        click.time_to_click_ms,
    );
    StatusCode::NO_CONTENT
}

#[derive(Deserialize)]
pub struct MetricsParams {
    #[serde(default = "default_hours")]
    pub hours: i64,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_hours() -> i64 {
    24
}

fn default_limit() -> usize {
    20
}

pub async fn ab_metrics_handler(
    State(state): State<AppState>,
    Query(params): Query<MetricsParams>,
) -> Json<HashMap<Variant, VariantMetrics>> {
    let until = OffsetDateTime::now_utc();
    let since = until - Duration::hours(params.hours.max(0));
    Json(analytics::variant_metrics(
        state.engine.events(),
        since,
        until,
    ))
}

/// Queries with at least 3 searches and the lowest CTR first.
pub async fn query_metrics_handler(
    State(state): State<AppState>,
    Query(params): Query<MetricsParams>,
) -> Json<Vec<QueryStats>> {
    let until = OffsetDateTime::now_utc();
    let since = until - Duration::hours(params.hours.max(0));
    Json(analytics::low_ctr_queries(
        state.engine.events(),
        since,
        until,
        3,
        params.limit,
    ))
}

// --- Admin endpoints ---

#[derive(Deserialize)]
pub struct ConfigUpdate {
    pub relevance_weight: Option<f64>,
    pub popularity_weight: Option<f64>,
    pub freshness_weight: Option<f64>,
    pub category_match_boost: Option<f64>,
    pub freshness_decay_days: Option<f64>,
    pub rerank_pool_size: Option<usize>,
    pub b_traffic_fraction: Option<f64>,
    pub ltr_enabled: Option<bool>,
}

pub async fn get_config(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<search_core::RankingConfig>, (StatusCode, String)> {
    authorize(&state, &headers)?;
    Ok(Json((*state.engine.config().snapshot()).clone()))
}

/// Partial update: only the provided fields change, applied as one
/// atomic snapshot swap.
pub async fn update_config(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(update): Json<ConfigUpdate>,
) -> Result<Json<search_core::RankingConfig>, (StatusCode, String)> {
    authorize(&state, &headers)?;
    state.engine.config().update(|config| {
        if let Some(v) = update.relevance_weight {
            config.relevance_weight = v;
        }
        if let Some(v) = update.popularity_weight {
            config.popularity_weight = v;
        }
        if let Some(v) = update.freshness_weight {
            config.freshness_weight = v;
        }
        if let Some(v) = update.category_match_boost {
            config.category_match_boost = v;
        }
        if let Some(v) = update.freshness_decay_days {
            config.freshness_decay_days = v;
        }
        if let Some(v) = update.rerank_pool_size {
            config.rerank_pool_size = v;
        }
        if let Some(v) = update.b_traffic_fraction {
            config.b_traffic_fraction = v;
        }
        if let Some(v) = update.ltr_enabled {
            config.ltr_enabled = v;
        }
    });
    Ok(Json((*state.engine.config().snapshot()).clone()))
}

#[derive(Serialize)]
pub struct WeightsResponse {
    pub weights: Vec<f64>,
    pub bias: f64,
}

#[derive(Deserialize)]
pub struct WeightsRequest {
    pub weights: Vec<f64>,
    pub bias: f64,
}

pub async fn get_weights(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<WeightsResponse>, (StatusCode, String)> {
    authorize(&state, &headers)?;
    let (weights, bias) = state.engine.model_weights();
    Ok(Json(WeightsResponse { weights, bias }))
}

pub async fn set_weights(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<WeightsRequest>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    authorize(&state, &headers)?;
    match state
        .engine
        .set_model_weights(request.weights, request.bias)
    {
        Ok(persisted) => Ok(Json(serde_json::json!({
            "status": "ok",
            "persisted": persisted,
        }))),
        Err(err) => Err((StatusCode::BAD_REQUEST, err.to_string())),
    }
}

#[derive(Deserialize)]
pub struct TrainParams {
    #[serde(default = "default_epochs")]
    pub epochs: usize,
}

fn default_epochs() -> usize {
    100
}

#[derive(Serialize)]
pub struct TrainResponse {
    pub success: bool,
    pub message: String,
}

pub async fn train_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<TrainParams>,
) -> Result<Json<TrainResponse>, (StatusCode, String)> {
    authorize(&state, &headers)?;
    let outcome = state.engine.train_model(params.epochs);
    Ok(Json(TrainResponse {
        success: outcome.success,
        message: outcome.message,
    }))
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), (StatusCode, String)> {
    let required = match &state.admin_token {
        Some(token) => token,
        None => return Err((StatusCode::UNAUTHORIZED, "ADMIN_TOKEN not set".into())),
    };
    let provided = headers
        .get("X-ADMIN-TOKEN")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err((StatusCode::UNAUTHORIZED, "invalid admin token".into()))
    }
}
