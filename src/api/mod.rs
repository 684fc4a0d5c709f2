pub mod error;
pub mod health;
pub mod page;
pub mod v1;
pub mod xsrf;

use axum::{extract::DefaultBodyLimit, middleware, routing::get, Router};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::{config::Config, state::AppState};

pub fn router(state: AppState, cfg: &Config) -> Router {
    let mut api = v1::router(state.clone());
    if cfg.server.enable_xsrf_protection {
        api = api.layer(middleware::from_fn(xsrf::require_token));
    }

    let mut router = Router::new()
        .route("/", get(page::index))
        .route("/healthz", get(health::health_check))
        .route("/_stcore/health", get(health::liveness_check))
        .with_state(state)
        .nest("/api/v1", api);

    if cfg.server.enable_cors {
        router = router.layer(CorsLayer::permissive());
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(DefaultBodyLimit::max(cfg.server.max_upload_bytes()))
                .layer(TimeoutLayer::new(Duration::from_secs(cfg.server.request_timeout_secs))),
        )
        .layer(TraceLayer::new_for_http())
}
