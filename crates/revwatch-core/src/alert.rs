//! Alert settings and the alert log.
//!
//! The alert log holds at most one row per `(tenant_id, alert_type,
//! review_id)`. A row is born `pending` and moves to `sent` or `error`
//! exactly once; the only way back is the opt-in `retry_failed` requeue.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Error;

// ─── Settings ────────────────────────────────────────────────────────────────

/// Per-tenant alerting configuration. Missing rows resolve to
/// [`AlertSettings::defaults_for`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertSettings {
  pub tenant_id:        Uuid,
  pub enabled:          bool,
  /// Reviews rated at or below this value are alerted on.
  pub rating_max:       u8,
  /// Raw recipient list as entered by the tenant, `;` or `,` separated.
  pub notify_email:     Option<String>,
  /// Stored and returned but not enforced; the per-review dedup key is the
  /// only suppression applied.
  pub cooldown_minutes: u32,
  /// Requeue `error` rows for candidate reviews on the next evaluation.
  pub retry_failed:     bool,
}

impl AlertSettings {
  pub const DEFAULT_RATING_MAX: u8 = 3;
  pub const DEFAULT_COOLDOWN_MINUTES: u32 = 60;

  pub fn defaults_for(tenant_id: Uuid) -> Self {
    Self {
      tenant_id,
      enabled: true,
      rating_max: Self::DEFAULT_RATING_MAX,
      notify_email: None,
      cooldown_minutes: Self::DEFAULT_COOLDOWN_MINUTES,
      retry_failed: false,
    }
  }

  /// The single recipient alerts are sent to, if any.
  pub fn recipient(&self) -> Option<String> {
    self.notify_email.as_deref().and_then(resolve_recipient)
  }
}

/// First non-empty trimmed entry of a `;`/`,` separated address list.
///
/// Only one recipient is ever resolved; fan-out is not supported.
pub fn resolve_recipient(raw: &str) -> Option<String> {
  raw
    .split([';', ','])
    .map(str::trim)
    .find(|s| !s.is_empty())
    .map(str::to_owned)
}

// ─── Alert type ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
  NewLowRatingReview,
}

impl AlertType {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::NewLowRatingReview => "new_low_rating_review",
    }
  }
}

impl fmt::Display for AlertType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for AlertType {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "new_low_rating_review" => Ok(Self::NewLowRatingReview),
      other => Err(Error::UnknownAlertType(other.to_owned())),
    }
  }
}

// ─── Send status ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SendStatus {
  Pending,
  Sent,
  Error,
}

impl SendStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Pending => "pending",
      Self::Sent => "sent",
      Self::Error => "error",
    }
  }
}

impl fmt::Display for SendStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for SendStatus {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "pending" => Ok(Self::Pending),
      "sent" => Ok(Self::Sent),
      "error" => Ok(Self::Error),
      other => Err(Error::UnknownSendStatus(other.to_owned())),
    }
  }
}

// ─── Log rows ────────────────────────────────────────────────────────────────

/// A persisted alert log row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertLogEntry {
  pub alert_id:    Uuid,
  pub tenant_id:   Uuid,
  pub alert_type:  AlertType,
  pub review_id:   Uuid,
  pub payload:     serde_json::Value,
  pub send_status: SendStatus,
  pub created_at:  DateTime<Utc>,
  pub sent_at:     Option<DateTime<Utc>>,
  pub send_error:  Option<String>,
  /// The evaluation that claimed this row for sending, if any.
  pub claimed_by:  Option<Uuid>,
  pub claimed_at:  Option<DateTime<Utc>>,
}

/// Input to [`crate::store::ReviewStore::register_alert`].
#[derive(Debug, Clone)]
pub struct NewAlert {
  pub tenant_id:  Uuid,
  pub alert_type: AlertType,
  pub review_id:  Uuid,
  pub payload:    serde_json::Value,
}
