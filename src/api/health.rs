use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use crate::state::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    timestamp: chrono::DateTime<chrono::Utc>,
    checks: HealthChecks,
}

#[derive(Debug, Serialize)]
pub struct HealthChecks {
    store: StoreHealth,
}

#[derive(Debug, Serialize)]
pub struct StoreHealth {
    status: String,
    recordings: usize,
    capacity: usize,
}

/// GET /healthz - service and cache status
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let response = HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now(),
        checks: HealthChecks {
            store: StoreHealth {
                status: "healthy".to_string(),
                recordings: state.store.len(),
                capacity: state.store.capacity(),
            },
        },
    };
    (StatusCode::OK, Json(response))
}

/// GET /_stcore/health - liveness probe polled by the container health check
pub async fn liveness_check() -> &'static str {
    "ok"
}
