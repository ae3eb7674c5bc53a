//! Web router using Axum

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use iplboard_core::models::{
    BatsmanSummary, BowlerSummary, DashboardReport, KeyMetrics, PhaseSummary, ScenarioOutcome,
    TeamStandings,
};
use iplboard_core::{CoreError, Dashboard, FilterState, SectionError};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

type AppState = Arc<Dashboard>;

/// Create the web router
pub fn create_router(dashboard: Arc<Dashboard>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(index_handler))
        .route("/api/health", get(health_handler))
        .route("/api/seasons", get(seasons_handler))
        .route("/api/dashboard", get(dashboard_handler))
        .route("/api/metrics", get(metrics_handler))
        .route("/api/batting", get(batting_handler))
        .route("/api/bowling", get(bowling_handler))
        .route("/api/phases", get(phases_handler))
        .route("/api/outcomes", get(outcomes_handler))
        .route("/api/teams", get(teams_handler))
        .route("/api/templates", get(templates_handler))
        .route("/api/sql/{template}", get(sql_handler))
        .route("/api/cache/clear", post(cache_clear_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(dashboard)
}

/// A core error rendered as a JSON body with a matching status
#[derive(Debug)]
pub struct ApiError(CoreError);

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        Self(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            CoreError::InvalidFilter { .. } => StatusCode::BAD_REQUEST,
            CoreError::InvalidTemplate { .. } => StatusCode::NOT_FOUND,
            CoreError::Connection { .. } | CoreError::Query { .. } => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), error = %self.0, "API request failed");
        }
        let body = SectionError::from_core_error("request", &self.0);
        (
            status,
            Json(json!({
                "error": body.message,
                "suggestion": body.suggestion,
            })),
        )
            .into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// `?seasons=` query parameter
///
/// Absent selects the default window, empty selects every season, otherwise
/// a comma-separated list.
#[derive(Debug, Default, Deserialize)]
pub struct SeasonsQuery {
    pub seasons: Option<String>,
}

impl SeasonsQuery {
    async fn resolve(&self, dashboard: &Dashboard) -> Result<FilterState, CoreError> {
        match &self.seasons {
            Some(list) => FilterState::parse_list(list),
            None => {
                let available = dashboard.available_seasons().await?;
                Ok(dashboard.default_filter(&available))
            }
        }
    }
}

async fn index_handler() -> Html<&'static str> {
    Html(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <title>iplboard - IPL Analytics</title>
    <style>
        body { font-family: system-ui, -apple-system, sans-serif; margin: 2rem; color: #1a1a1a; }
        code { background: #f0f0f0; padding: 0.1rem 0.3rem; border-radius: 4px; }
        a { color: #0066cc; text-decoration: none; }
    </style>
</head>
<body>
    <h1>iplboard</h1>
    <p>Season filters take <code>?seasons=2019,2020</code>; an empty value selects every season.</p>
    <ul>
        <li><a href="/api/health">/api/health</a> - Health and cache counters</li>
        <li><a href="/api/seasons">/api/seasons</a> - Available seasons</li>
        <li><a href="/api/dashboard">/api/dashboard</a> - Every section</li>
        <li><a href="/api/metrics">/api/metrics</a> - Key metrics</li>
        <li><a href="/api/batting">/api/batting</a> - Top run scorers</li>
        <li><a href="/api/bowling">/api/bowling</a> - Top wicket takers</li>
        <li><a href="/api/phases">/api/phases</a> - Scoring by phase</li>
        <li><a href="/api/outcomes">/api/outcomes</a> - Batting first vs chasing</li>
        <li><a href="/api/teams">/api/teams</a> - Team standings</li>
        <li><a href="/api/templates">/api/templates</a> - Query templates</li>
    </ul>
</body>
</html>"#,
    )
}

async fn health_handler(State(dashboard): State<AppState>) -> Json<Value> {
    let executor = dashboard.executor();
    Json(json!({
        "status": "ok",
        "dialect": executor.dialect(),
        "connected": executor.is_connected().await,
        "cache": executor.stats().await,
    }))
}

async fn seasons_handler(State(dashboard): State<AppState>) -> ApiResult<Value> {
    let seasons = dashboard.available_seasons().await?;
    let default = dashboard.default_filter(&seasons);
    Ok(Json(json!({
        "seasons": seasons,
        "default": default.seasons().collect::<Vec<_>>(),
    })))
}

async fn dashboard_handler(
    State(dashboard): State<AppState>,
    Query(query): Query<SeasonsQuery>,
) -> ApiResult<DashboardReport> {
    let filter = query.resolve(&dashboard).await?;
    Ok(Json(dashboard.render(&filter).await))
}

async fn metrics_handler(
    State(dashboard): State<AppState>,
    Query(query): Query<SeasonsQuery>,
) -> ApiResult<KeyMetrics> {
    let filter = query.resolve(&dashboard).await?;
    Ok(Json(dashboard.key_metrics(&filter).await?))
}

async fn batting_handler(
    State(dashboard): State<AppState>,
    Query(query): Query<SeasonsQuery>,
) -> ApiResult<Vec<BatsmanSummary>> {
    let filter = query.resolve(&dashboard).await?;
    Ok(Json(dashboard.top_run_scorers(&filter).await?))
}

async fn bowling_handler(
    State(dashboard): State<AppState>,
    Query(query): Query<SeasonsQuery>,
) -> ApiResult<Vec<BowlerSummary>> {
    let filter = query.resolve(&dashboard).await?;
    Ok(Json(dashboard.top_wicket_takers(&filter).await?))
}

async fn phases_handler(
    State(dashboard): State<AppState>,
    Query(query): Query<SeasonsQuery>,
) -> ApiResult<Vec<PhaseSummary>> {
    let filter = query.resolve(&dashboard).await?;
    Ok(Json(dashboard.phase_scoring(&filter).await?))
}

async fn outcomes_handler(
    State(dashboard): State<AppState>,
    Query(query): Query<SeasonsQuery>,
) -> ApiResult<Vec<ScenarioOutcome>> {
    let filter = query.resolve(&dashboard).await?;
    Ok(Json(dashboard.match_outcomes(&filter).await?))
}

async fn teams_handler(
    State(dashboard): State<AppState>,
    Query(query): Query<SeasonsQuery>,
) -> ApiResult<TeamStandings> {
    let filter = query.resolve(&dashboard).await?;
    Ok(Json(dashboard.team_standings(&filter).await?))
}

async fn templates_handler(State(dashboard): State<AppState>) -> Json<Value> {
    let templates: Vec<_> = dashboard.builder().catalog().iter().collect();
    Json(json!({ "count": templates.len(), "templates": templates }))
}

async fn sql_handler(
    State(dashboard): State<AppState>,
    Path(template): Path<String>,
    Query(query): Query<SeasonsQuery>,
) -> ApiResult<Value> {
    // Resolve the template first so an unknown id is a 404 even offline
    dashboard.builder().catalog().get(&template)?;
    let filter = query.resolve(&dashboard).await?;
    let statement = dashboard.statement(&template, &filter)?;
    let executor = dashboard.executor();

    Ok(Json(json!({
        "template": template,
        "sql": statement.sql(),
        "params": statement.params(),
        "inline": statement.to_inline_sql(executor.dialect()),
        "cached_at": executor.cached_at(&statement).await,
    })))
}

async fn cache_clear_handler(State(dashboard): State<AppState>) -> Json<Value> {
    let executor = dashboard.executor();
    executor.invalidate_all();
    Json(json!({ "cleared": true, "cache": executor.stats().await }))
}
