pub mod health;
pub mod jobs;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /jobs                POST   submit a generation job
/// /jobs/{id}           GET    fetch one job with asset URLs
/// /jobs/{id}/cancel    POST   request cancellation
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/jobs", jobs::router())
}
