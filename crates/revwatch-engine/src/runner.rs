//! Tenant-level orchestration: ingestion followed by alert evaluation.

use chrono::TimeDelta;
use revwatch_core::{notify::Notifier, source::ReviewSource, store::ReviewStore};
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info};
use uuid::Uuid;

use crate::{
  alert::{AlertEvaluator, AlertReport, DEFAULT_CLAIM_LEASE},
  error::{Result, RunError, Stage},
  ingest::{BackfillReport, IngestConfig, IngestReport, IngestionEngine},
};

#[derive(Debug, Clone)]
pub struct EngineConfig {
  pub ingest:      IngestConfig,
  pub claim_lease: TimeDelta,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self { ingest: IngestConfig::default(), claim_lease: DEFAULT_CLAIM_LEASE }
  }
}

/// Result of a manual single-tenant run.
#[derive(Debug, Clone, Serialize)]
pub struct TenantRun {
  #[serde(flatten)]
  pub ingest: IngestReport,
  pub alerts: AlertReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct BackfillRun {
  #[serde(flatten)]
  pub backfill: BackfillReport,
  pub alerts:   AlertReport,
}

/// One tenant's line in a scheduled run.
#[derive(Debug, Clone, Serialize)]
pub struct TenantSummary {
  pub tenant_id:    Uuid,
  pub ok:           bool,
  pub ingested:     usize,
  pub critical_new: usize,
  pub places:       usize,
  pub alerts_sent:  usize,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub stage:        Option<Stage>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub place_id:     Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error:        Option<String>,
}

impl TenantSummary {
  fn succeeded(run: &TenantRun) -> Self {
    Self {
      tenant_id:    run.ingest.tenant_id,
      ok:           true,
      ingested:     run.ingest.ingested,
      critical_new: run.ingest.critical_new,
      places:       run.ingest.places,
      alerts_sent:  run.alerts.sent,
      stage:        None,
      place_id:     None,
      error:        None,
    }
  }

  fn failed(err: &RunError) -> Self {
    Self {
      tenant_id:    err.tenant_id,
      ok:           false,
      ingested:     0,
      critical_new: 0,
      places:       0,
      alerts_sent:  0,
      stage:        Some(err.stage),
      place_id:     err.place_id.clone(),
      error:        Some(err.source.to_string()),
    }
  }
}

/// Aggregate of a scheduled (possibly multi-tenant) run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScheduledRun {
  pub ingested:     usize,
  pub critical_new: usize,
  pub succeeded:    usize,
  pub failed:       usize,
  pub tenants:      Vec<TenantSummary>,
}

/// Owns the collaborators and hands borrowed engines out per run.
pub struct Runner<S, C, N> {
  store:    S,
  source:   C,
  notifier: N,
  config:   EngineConfig,
}

impl<S, C, N> Runner<S, C, N>
where
  S: ReviewStore,
  C: ReviewSource,
  N: Notifier,
{
  pub fn new(store: S, source: C, notifier: N, config: EngineConfig) -> Self {
    Self { store, source, notifier, config }
  }

  pub fn store(&self) -> &S { &self.store }

  fn ingestion(&self) -> IngestionEngine<'_, S, C> {
    IngestionEngine::new(&self.store, &self.source, &self.config.ingest)
  }

  fn evaluator(&self) -> AlertEvaluator<'_, S, N> {
    AlertEvaluator::new(&self.store, &self.notifier).with_claim_lease(self.config.claim_lease)
  }

  /// Ingest one tenant, then evaluate alerts over that run's window.
  pub async fn run_tenant(&self, tenant_id: Uuid) -> Result<TenantRun> {
    let ingest = self.ingestion().run_ingestion(tenant_id).await?;
    let alerts = self
      .evaluator()
      .evaluate_and_alert(tenant_id, ingest.run_started_at)
      .await?;
    Ok(TenantRun { ingest, alerts })
  }

  /// Run one tenant, or every tenant with an active place, one after the
  /// other. A failing tenant is recorded and the rest still run.
  pub async fn run_scheduled(&self, tenant_id: Option<Uuid>) -> Result<ScheduledRun> {
    let tenants = match tenant_id {
      Some(id) => vec![id],
      None => self
        .store
        .tenants_with_active_places()
        .await
        .map_err(|e| RunError::new(Uuid::nil(), Stage::ListTenants, e))?,
    };

    let mut summary = ScheduledRun::default();
    for tenant_id in tenants {
      match self.run_tenant(tenant_id).await {
        Ok(run) => {
          summary.ingested += run.ingest.ingested;
          summary.critical_new += run.ingest.critical_new;
          summary.succeeded += 1;
          summary.tenants.push(TenantSummary::succeeded(&run));
        }
        Err(err) => {
          error!(%tenant_id, stage = %err.stage, error = %err, "tenant run failed");
          summary.failed += 1;
          summary.tenants.push(TenantSummary::failed(&err));
        }
      }
    }

    info!(
      succeeded = summary.succeeded,
      failed = summary.failed,
      ingested = summary.ingested,
      critical_new = summary.critical_new,
      "scheduled run finished"
    );
    Ok(summary)
  }

  /// Merge operator-supplied items for one place, then evaluate alerts.
  pub async fn backfill(
    &self,
    tenant_id: Uuid,
    place_id: &str,
    items: &[Value],
  ) -> Result<BackfillRun> {
    let backfill = self.ingestion().backfill(tenant_id, place_id, items).await?;
    let alerts = self
      .evaluator()
      .evaluate_and_alert(tenant_id, backfill.run_started_at)
      .await?;
    Ok(BackfillRun { backfill, alerts })
  }
}
