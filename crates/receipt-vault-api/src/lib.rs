//! # receipt-vault-api
//!
//! Axum HTTP surface for the receipt vault.
//!
//! ## Endpoints
//!
//! | Method | Path | Purpose |
//! |---|---|---|
//! | `POST` | `/events` | Signed provider webhook; `200`, `400` or `503` |
//! | `GET` | `/receipts/{token_id}` | Verification; `200`, `401` or `404` |
//! | `GET` | `/health/liveness` | Process is up |
//! | `GET` | `/health/readiness` | Ready to serve |

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

pub use config::ApiConfig;
pub use error::ApiError;
pub use state::AppState;

/// Build the application router.
pub fn app(state: AppState) -> Router {
    let health = Router::new()
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness));

    Router::new()
        .merge(health)
        .merge(routes::router().with_state(state))
        .layer(TraceLayer::new_for_http())
}

/// Liveness probe.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe. The vault is fully wired before the router exists.
async fn readiness() -> &'static str {
    "ready"
}
