//! HTTP surface over the snapshot cache.
//!
//! Routes:
//! - `GET /jobs` running then pending jobs, filtered by query string
//! - `GET /hosts` queue instances with their resources
//! - `POST /refresh` force a fetch and publish it
//! - `GET /health` cache status
//! - `GET /metrics` Prometheus text format

use crate::cache::SnapshotCache;
use crate::error::GridError;
use crate::grid::filters::{self, JobFilter};
use crate::grid::{Host, Job, JobInfo};
use crate::metrics::SharedMetrics;
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<SnapshotCache<JobInfo>>,
    pub metrics: SharedMetrics,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/jobs", get(jobs_handler))
        .route("/hosts", get(hosts_handler))
        .route("/refresh", post(refresh_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Job selection shared by `GET /jobs` and the `jobs` subcommand.
///
/// List values are comma separated, timestamps use `YYYY-MM-DDTHH:MM:SS`.
#[derive(Debug, Clone, Default, Deserialize, clap::Args)]
pub struct JobQuery {
    /// Only jobs owned by these users
    #[arg(long)]
    pub owners: Option<String>,

    /// Only jobs whose state code contains one of these states
    #[arg(long)]
    pub states: Option<String>,

    /// Only jobs numbered at or above this id
    #[arg(long)]
    pub min_job_id: Option<i64>,

    #[arg(long)]
    pub submitted_after: Option<String>,

    #[arg(long)]
    pub submitted_before: Option<String>,

    #[arg(long)]
    pub started_after: Option<String>,

    #[arg(long)]
    pub started_before: Option<String>,
}

impl JobQuery {
    /// Combine every requested criterion into one predicate
    pub fn to_filter(&self) -> Result<JobFilter, GridError> {
        let mut selected = Vec::new();

        if let Some(owners) = &self.owners {
            selected.push(filters::owner_filter(&split_list(owners))?);
        }
        if let Some(states) = &self.states {
            selected.push(filters::state_filter(&split_list(states))?);
        }
        if let Some(first) = self.min_job_id {
            selected.push(filters::starting_job_number_filter(first));
        }

        let times = [
            (&self.submitted_after, filters::submitted_after as fn(NaiveDateTime) -> JobFilter),
            (&self.submitted_before, filters::submitted_before),
            (&self.started_after, filters::started_after),
            (&self.started_before, filters::started_before),
        ];
        for (value, build) in times {
            if let Some(value) = value {
                selected.push(build(filters::parse_timestamp(value)?));
            }
        }

        Ok(filters::all_of(selected))
    }
}

fn split_list(input: &str) -> Vec<String> {
    input.split(',').map(|s| s.trim().to_string()).collect()
}

/// Error response carrying a `GridError`
#[derive(Debug)]
pub struct ApiError(GridError);

impl From<GridError> for ApiError {
    fn from(err: GridError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            GridError::InvalidFilter(_) | GridError::Parse(_) => StatusCode::BAD_REQUEST,
            GridError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            GridError::Stopped => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::BAD_GATEWAY,
        };

        if status.is_server_error() {
            warn!(error = %self.0, status = status.as_u16(), "Request failed");
        } else {
            debug!(error = %self.0, "Rejected request");
        }

        let body = Json(serde_json::json!({ "error": self.0.to_string() }));
        (status, body).into_response()
    }
}

async fn jobs_handler(
    State(state): State<AppState>,
    Query(query): Query<JobQuery>,
) -> Result<Json<Vec<Job>>, ApiError> {
    let filter = query.to_filter()?;
    let snapshot = state.cache.get().await?;
    Ok(Json(snapshot.jobs().filter(filter).into_inner()))
}

async fn hosts_handler(State(state): State<AppState>) -> Result<Json<Vec<Host>>, ApiError> {
    let snapshot = state.cache.get().await?;
    Ok(Json(snapshot.hosts().to_vec()))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub generation: u64,
    pub hosts: usize,
    pub jobs: usize,
    pub pending: usize,
}

async fn refresh_handler(State(state): State<AppState>) -> Result<Json<RefreshResponse>, ApiError> {
    let snapshot = state.cache.update().await?;
    Ok(Json(RefreshResponse {
        generation: state.cache.generation().await,
        hosts: snapshot.hosts().len(),
        jobs: snapshot.jobs().len(),
        pending: snapshot.pending().len(),
    }))
}

/// Health check endpoint
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let generation = state.cache.generation().await;
    let age_secs = snapshot_age_secs(&state.cache).await;

    let status = if !state.cache.is_active() {
        "stopped"
    } else if generation > 0 {
        "healthy"
    } else {
        "degraded"
    };

    let body = serde_json::json!({
        "status": status,
        "generation": generation,
        "snapshot_age_seconds": age_secs,
        "version": env!("CARGO_PKG_VERSION"),
    });

    (
        [(header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
}

/// Prometheus metrics endpoint
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

async fn snapshot_age_secs(cache: &SnapshotCache<JobInfo>) -> Option<f64> {
    cache
        .last_refreshed()
        .await
        .map(|at| (Utc::now() - at).num_milliseconds().max(0) as f64 / 1000.0)
}

/// Periodically copy snapshot statistics into the metrics registry until the
/// cache stops.
pub fn spawn_metrics_updater(
    cache: Arc<SnapshotCache<JobInfo>>,
    metrics: SharedMetrics,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(every).await;
            if !cache.is_active() {
                break;
            }

            let snapshot = cache.get_or_empty().await;
            let age = snapshot_age_secs(&cache).await.unwrap_or(0.0);
            metrics.update_snapshot_metrics(&snapshot, age);
        }
    })
}
