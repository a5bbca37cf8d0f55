use std::{fmt, time::Duration};

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The step of a run at which a storage call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
  ListTenants,
  LoadPlaces,
  Upsert,
  RecordVersion,
  AppendAction,
  LoadSettings,
  SelectCandidates,
  RegisterAlerts,
  RequeueAlerts,
  SelectPending,
  ClaimAlert,
  UpdateAlert,
}

impl Stage {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::ListTenants => "list_tenants",
      Self::LoadPlaces => "load_places",
      Self::Upsert => "upsert",
      Self::RecordVersion => "record_version",
      Self::AppendAction => "append_action",
      Self::LoadSettings => "load_settings",
      Self::SelectCandidates => "select_candidates",
      Self::RegisterAlerts => "register_alerts",
      Self::RequeueAlerts => "requeue_alerts",
      Self::SelectPending => "select_pending",
      Self::ClaimAlert => "claim_alert",
      Self::UpdateAlert => "update_alert",
    }
  }
}

impl fmt::Display for Stage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A storage failure that aborted a tenant run.
#[derive(Debug, Error)]
#[error("{stage} failed for tenant {tenant_id}{}: {source}", PlaceSuffix(.place_id))]
pub struct RunError {
  pub tenant_id: Uuid,
  pub place_id:  Option<String>,
  pub stage:     Stage,
  pub source:    BoxError,
}

impl RunError {
  pub fn new(tenant_id: Uuid, stage: Stage, source: impl Into<BoxError>) -> Self {
    Self { tenant_id, place_id: None, stage, source: source.into() }
  }

  pub fn with_place(mut self, place_id: impl Into<String>) -> Self {
    self.place_id = Some(place_id.into());
    self
  }
}

struct PlaceSuffix<'a>(&'a Option<String>);

impl fmt::Display for PlaceSuffix<'_> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.0 {
      Some(place_id) => write!(f, " at place {place_id}"),
      None => Ok(()),
    }
  }
}

/// Why a single place was skipped. Never fatal to the run.
#[derive(Debug, Error)]
pub enum ConnectorError {
  #[error("fetch timed out after {0:?}")]
  Timeout(Duration),

  #[error("fetch failed: {0}")]
  Source(#[source] BoxError),
}

pub type Result<T, E = RunError> = std::result::Result<T, E>;
