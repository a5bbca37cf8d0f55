//! Review actions: the append-only audit trail.
//!
//! Only [`ActionType::IngestedCritical`] is written by the pipeline; the rest
//! of the vocabulary belongs to triage tooling that shares the table.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Error;

/// Actor recorded on actions written by the pipeline itself.
pub const SYSTEM_ACTOR: &str = "system";

/// The closed vocabulary of audit actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
  /// A critical review was inserted by an ingestion run.
  IngestedCritical,
  StatusChanged,
  NoteAdded,
  ReplyPosted,
  TaskCreated,
}

impl ActionType {
  /// The discriminant stored in the `action_type` column.
  pub fn as_str(self) -> &'static str {
    match self {
      Self::IngestedCritical => "ingested_critical",
      Self::StatusChanged => "status_changed",
      Self::NoteAdded => "note_added",
      Self::ReplyPosted => "reply_posted",
      Self::TaskCreated => "task_created",
    }
  }
}

impl fmt::Display for ActionType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for ActionType {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "ingested_critical" => Ok(Self::IngestedCritical),
      "status_changed" => Ok(Self::StatusChanged),
      "note_added" => Ok(Self::NoteAdded),
      "reply_posted" => Ok(Self::ReplyPosted),
      "task_created" => Ok(Self::TaskCreated),
      other => Err(Error::UnknownActionType(other.to_owned())),
    }
  }
}

/// A persisted audit record. Never updated or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewAction {
  pub action_id:   Uuid,
  pub tenant_id:   Uuid,
  pub review_id:   Uuid,
  pub action_type: ActionType,
  pub payload:     serde_json::Value,
  pub created_by:  String,
  /// Server-assigned.
  pub created_at:  DateTime<Utc>,
}

/// Input to [`crate::store::ReviewStore::append_action`].
#[derive(Debug, Clone)]
pub struct NewReviewAction {
  pub tenant_id:   Uuid,
  pub review_id:   Uuid,
  pub action_type: ActionType,
  pub payload:     serde_json::Value,
  pub created_by:  String,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn discriminants_match_serde_names() {
    for ty in [
      ActionType::IngestedCritical,
      ActionType::StatusChanged,
      ActionType::NoteAdded,
      ActionType::ReplyPosted,
      ActionType::TaskCreated,
    ] {
      let json = serde_json::to_value(ty).unwrap();
      assert_eq!(json, ty.as_str());
      assert_eq!(ty.as_str().parse::<ActionType>().unwrap(), ty);
    }
  }

  #[test]
  fn unknown_discriminant_is_rejected() {
    assert!(matches!(
      "deleted".parse::<ActionType>(),
      Err(Error::UnknownActionType(s)) if s == "deleted"
    ));
  }
}
