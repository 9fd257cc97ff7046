//! HTTP API handlers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use crate::dispatch::PriorityQueue;
use crate::metrics::{PipelineStats, StatsSnapshot};

/// Application state shared with handlers.
#[derive(Clone)]
pub struct AppState {
    /// Whether the pipeline is polling.
    pub ready: Arc<AtomicBool>,
    /// Pipeline counters.
    pub stats: Arc<PipelineStats>,
    /// Dispatch queue, for depth reporting.
    pub queue: Arc<PriorityQueue>,
}

impl AppState {
    /// Create new app state around the shared pipeline structures.
    pub fn new(stats: Arc<PipelineStats>, queue: Arc<PriorityQueue>) -> Self {
        Self {
            ready: Arc::new(AtomicBool::new(false)),
            stats,
            queue,
        }
    }

    /// Set ready state.
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Check if ready.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Status: "ok".
    pub status: &'static str,
}

/// Readiness check response.
#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    /// Whether the pipeline is running.
    pub ready: bool,
}

/// Status response.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// Service status.
    pub status: &'static str,
    /// Dispatch queue depth.
    pub queue_depth: usize,
    /// Counter snapshot.
    pub stats: StatsSnapshot,
}

/// Health check handler - always returns 200.
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

/// Readiness check handler - returns 200 if ready, 503 otherwise.
pub async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    let is_ready = state.is_ready();
    let response = ReadyResponse { ready: is_ready };

    if is_ready {
        (StatusCode::OK, Json(response))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(response))
    }
}

/// Status handler - returns pipeline counters.
pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let status = if state.is_ready() { "running" } else { "starting" };
    let queue_depth = state.queue.len().await;

    Json(StatusResponse {
        status,
        queue_depth,
        stats: state.stats.snapshot(),
    })
}
