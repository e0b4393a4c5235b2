//! Handlers for the `/jobs` resource.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use validator::Validate;

use vitrine_core::error::CoreError;
use vitrine_core::params::JobParams;
use vitrine_core::status::JobStatus;
use vitrine_core::types::{JobId, JobKind, OwnerId, Timestamp};
use vitrine_store::{AssetRef, AssetStore, FailedUnit, JobAssets, JobRecord};

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response DTOs
// ---------------------------------------------------------------------------

/// POST /jobs request body.
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitJobRequest {
    /// The entity the generated content belongs to.
    pub owner_id: OwnerId,
    pub kind: JobKind,
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[validate(length(min = 1, max = 2000))]
    pub description: String,
    #[validate(length(max = 200))]
    pub style: Option<String>,
    pub screens_total: Option<u32>,
}

/// A job record as returned by the API, with asset references resolved
/// to fetchable URLs.
#[derive(Debug, Serialize)]
pub struct JobView {
    pub id: JobId,
    pub owner_id: OwnerId,
    pub kind: JobKind,
    pub status: JobStatus,
    pub current_step: String,
    pub progress_percentage: u8,
    pub screens_generated: u32,
    pub screens_total: u32,
    pub failed_units: Vec<FailedUnit>,
    pub error: Option<String>,
    pub assets: JobAssetsView,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Kind-shaped asset URLs; mirrors the stored payload with references
/// resolved.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobAssetsView {
    Concept {
        concept: Option<String>,
    },
    Icon {
        icon: Option<String>,
    },
    Screens {
        screens: Vec<Option<String>>,
    },
    CoverImage {
        variants: Vec<Option<String>>,
    },
    CoverVideo {
        video: Option<String>,
    },
    FullApp {
        concept: Option<String>,
        icon: Option<String>,
        screens: Vec<Option<String>>,
    },
}

impl JobView {
    /// Resolve every asset reference on `record` against the asset
    /// store. Unknown references render as `null` rather than failing
    /// the whole view.
    pub async fn render(record: JobRecord, assets: &dyn AssetStore) -> Self {
        let asset_view = match &record.assets {
            JobAssets::Concept { concept } => JobAssetsView::Concept {
                concept: resolve(assets, concept).await,
            },
            JobAssets::Icon { icon } => JobAssetsView::Icon {
                icon: resolve(assets, icon).await,
            },
            JobAssets::Screens { screens } => JobAssetsView::Screens {
                screens: resolve_slots(assets, screens).await,
            },
            JobAssets::CoverImage { variants } => JobAssetsView::CoverImage {
                variants: resolve_slots(assets, variants).await,
            },
            JobAssets::CoverVideo { video } => JobAssetsView::CoverVideo {
                video: resolve(assets, video).await,
            },
            JobAssets::FullApp {
                concept,
                icon,
                screens,
            } => JobAssetsView::FullApp {
                concept: resolve(assets, concept).await,
                icon: resolve(assets, icon).await,
                screens: resolve_slots(assets, screens).await,
            },
        };

        Self {
            id: record.id,
            owner_id: record.owner_id,
            kind: record.kind,
            status: record.status,
            current_step: record.current_step,
            progress_percentage: record.progress_percentage,
            screens_generated: record.screens_generated,
            screens_total: record.screens_total,
            failed_units: record.failed_units,
            error: record.error,
            assets: asset_view,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

async fn resolve(assets: &dyn AssetStore, reference: &Option<AssetRef>) -> Option<String> {
    match reference {
        Some(asset) => assets.get_url(asset).await,
        None => None,
    }
}

async fn resolve_slots(
    assets: &dyn AssetStore,
    slots: &[Option<AssetRef>],
) -> Vec<Option<String>> {
    let mut urls = Vec::with_capacity(slots.len());
    for slot in slots {
        urls.push(resolve(assets, slot).await);
    }
    urls
}

// ---------------------------------------------------------------------------
// Submit
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs
///
/// Submit a new generation job. Returns 201 with the created job in
/// `pending` status; generation proceeds in the background.
pub async fn submit_job(
    State(state): State<AppState>,
    Json(input): Json<SubmitJobRequest>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;

    let job_params = JobParams {
        name: input.name,
        description: input.description,
        style: input.style,
        screens_total: input.screens_total,
    };
    let record = state
        .orchestrator
        .submit(input.owner_id, input.kind, job_params)
        .await?;

    let view = JobView::render(record, state.assets.as_ref()).await;
    Ok((StatusCode::CREATED, Json(DataResponse { data: view })))
}

// ---------------------------------------------------------------------------
// Get
// ---------------------------------------------------------------------------

/// GET /api/v1/jobs/{id}
///
/// Get a single job by ID, with asset references resolved to URLs.
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> AppResult<impl IntoResponse> {
    let record = state
        .store
        .get(job_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Job",
            id: job_id.to_string(),
        }))?;

    let view = JobView::render(record, state.assets.as_ref()).await;
    Ok(Json(DataResponse { data: view }))
}

// ---------------------------------------------------------------------------
// Cancel
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs/{id}/cancel
///
/// Request cancellation of a job. Returns 204; cancelling a job that
/// already reached a terminal status is a no-op, not an error.
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> AppResult<impl IntoResponse> {
    state.orchestrator.cancel(job_id).await?;
    tracing::info!(job_id = %job_id, "Job cancellation accepted");
    Ok(StatusCode::NO_CONTENT)
}
