//! Reviews and their content versions.
//!
//! A review row is keyed by its natural key `(tenant_id, place_id,
//! external_review_id)` and is never deleted. Content edits observed across
//! runs are captured as append-only [`ReviewVersion`] rows.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Error;

// ─── Status ──────────────────────────────────────────────────────────────────

/// Workflow status of a review. Set to [`ReviewStatus::New`] at first insert;
/// later transitions belong to the (external) triage tooling.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
  #[default]
  New,
  Acknowledged,
  Resolved,
}

impl ReviewStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::New => "new",
      Self::Acknowledged => "acknowledged",
      Self::Resolved => "resolved",
    }
  }
}

impl fmt::Display for ReviewStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for ReviewStatus {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "new" => Ok(Self::New),
      "acknowledged" => Ok(Self::Acknowledged),
      "resolved" => Ok(Self::Resolved),
      other => Err(Error::UnknownReviewStatus(other.to_owned())),
    }
  }
}

// ─── Content ─────────────────────────────────────────────────────────────────

/// The validated, hashable content of a review as reported by a source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewContent {
  pub place_id:           String,
  pub external_review_id: String,
  pub author_name:        Option<String>,
  /// Star rating, always within `1..=5`.
  pub rating:             u8,
  pub comment:            Option<String>,
  pub published_at:       Option<DateTime<Utc>>,
}

// ─── Upsert ──────────────────────────────────────────────────────────────────

/// Input to [`crate::store::ReviewStore::upsert_reviews`].
///
/// `is_critical` is only written when the row is first inserted; an existing
/// row keeps the value it was classified with.
#[derive(Debug, Clone)]
pub struct ReviewUpsert {
  pub tenant_id:   Uuid,
  pub content:     ReviewContent,
  pub is_critical: bool,
  pub raw_payload: serde_json::Value,
}

/// The row as it stands after an upsert, plus whether this call created it.
#[derive(Debug, Clone)]
pub struct UpsertedReview {
  pub review:   Review,
  pub inserted: bool,
}

// ─── Review ──────────────────────────────────────────────────────────────────

/// A persisted review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
  pub review_id:          Uuid,
  pub tenant_id:          Uuid,
  pub place_id:           String,
  pub external_review_id: String,
  pub author_name:        Option<String>,
  pub rating:             u8,
  pub comment:            Option<String>,
  pub published_at:       Option<DateTime<Utc>>,
  /// Classified once, at first ingestion.
  pub is_critical:        bool,
  pub status:             ReviewStatus,
  /// Set once at first insert; never changes afterwards.
  pub ingested_at:        DateTime<Utc>,
  pub last_seen_at:       DateTime<Utc>,
  /// Source payload as last seen. Not part of the content hash.
  pub raw_payload:        serde_json::Value,
}

impl Review {
  /// The hashable content currently stored for this review.
  pub fn content(&self) -> ReviewContent {
    ReviewContent {
      place_id:           self.place_id.clone(),
      external_review_id: self.external_review_id.clone(),
      author_name:        self.author_name.clone(),
      rating:             self.rating,
      comment:            self.comment.clone(),
      published_at:       self.published_at,
    }
  }
}

// ─── Versions ────────────────────────────────────────────────────────────────

/// One distinct content state of a review. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewVersion {
  pub version_id:   Uuid,
  pub tenant_id:    Uuid,
  pub review_id:    Uuid,
  pub content_hash: String,
  pub snapshot:     serde_json::Value,
  pub created_at:   DateTime<Utc>,
}

/// Input to [`crate::store::ReviewStore::record_version`].
#[derive(Debug, Clone)]
pub struct NewReviewVersion {
  pub tenant_id:    Uuid,
  pub review_id:    Uuid,
  pub content_hash: String,
  pub snapshot:     serde_json::Value,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn status_round_trips_through_str() {
    for status in [
      ReviewStatus::New,
      ReviewStatus::Acknowledged,
      ReviewStatus::Resolved,
    ] {
      assert_eq!(status.as_str().parse::<ReviewStatus>().unwrap(), status);
    }
    assert!("archived".parse::<ReviewStatus>().is_err());
  }
}
