//! Trigger handlers.
//!
//! | Method | Path | Guard |
//! |--------|------|-------|
//! | `POST` | `/api/tenants/{tenant_id}/runs` | operator |
//! | `POST` | `/api/cron/runs[?tenant_id=]` | cron secret |
//! | `POST` | `/api/tenants/{tenant_id}/places/{place_id}/backfill` | operator |

use axum::{
  Json,
  extract::{Path, Query, State},
};
use revwatch_core::{notify::Notifier, source::ReviewSource, store::ReviewStore};
use revwatch_engine::{BackfillRun, ScheduledRun, TenantRun};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::{
  AppState,
  auth::{CronCaller, Operator},
  error::ApiError,
};

// ─── Manual run ───────────────────────────────────────────────────────────────

/// `POST /api/tenants/{tenant_id}/runs`
pub async fn tenant<S, C, N>(
  _: Operator,
  State(state): State<AppState<S, C, N>>,
  Path(tenant_id): Path<Uuid>,
) -> Result<Json<TenantRun>, ApiError>
where
  S: ReviewStore + 'static,
  C: ReviewSource + 'static,
  N: Notifier + 'static,
{
  let run = state.runner.run_tenant(tenant_id).await?;
  Ok(Json(run))
}

// ─── Scheduled run ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CronParams {
  pub tenant_id: Option<Uuid>,
}

/// `POST /api/cron/runs[?tenant_id=<uuid>]`
///
/// Tenant failures are reported in the body, never as an error status.
pub async fn cron<S, C, N>(
  _: CronCaller,
  State(state): State<AppState<S, C, N>>,
  Query(params): Query<CronParams>,
) -> Result<Json<ScheduledRun>, ApiError>
where
  S: ReviewStore + 'static,
  C: ReviewSource + 'static,
  N: Notifier + 'static,
{
  let run = state.runner.run_scheduled(params.tenant_id).await?;
  Ok(Json(run))
}

// ─── Backfill ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct BackfillBody {
  pub reviews: Vec<Value>,
}

/// `POST /api/tenants/{tenant_id}/places/{place_id}/backfill`
///
/// Body: `{"reviews":[{…}, …]}`
pub async fn backfill<S, C, N>(
  _: Operator,
  State(state): State<AppState<S, C, N>>,
  Path((tenant_id, place_id)): Path<(Uuid, String)>,
  Json(body): Json<BackfillBody>,
) -> Result<Json<BackfillRun>, ApiError>
where
  S: ReviewStore + 'static,
  C: ReviewSource + 'static,
  N: Notifier + 'static,
{
  if place_id.trim().is_empty() {
    return Err(ApiError::BadRequest("place_id must not be empty".into()));
  }
  let run = state
    .runner
    .backfill(tenant_id, &place_id, &body.reviews)
    .await?;
  Ok(Json(run))
}
