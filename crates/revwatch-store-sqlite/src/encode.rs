//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 UTC strings with exactly six fractional
//! digits and a `Z` suffix. The fixed width keeps lexical order equal to
//! chronological order, which the `ingested_at >= ?` window queries rely on.
//! UUIDs are stored as hyphenated lowercase strings; JSON as compact text.

use chrono::{DateTime, SecondsFormat, Utc};
use revwatch_core::{
  action::ReviewAction,
  alert::{AlertLogEntry, AlertSettings},
  place::Place,
  review::{Review, ReviewVersion},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

fn decode_opt_uuid(s: Option<String>) -> Result<Option<Uuid>> {
  s.as_deref().map(decode_uuid).transpose()
}

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

fn decode_opt_dt(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
  s.as_deref().map(decode_dt).transpose()
}

// ─── Column lists ────────────────────────────────────────────────────────────

pub const PLACE_COLUMNS: &str = "tenant_id, place_id, display_name, is_active";

pub const SETTINGS_COLUMNS: &str =
  "tenant_id, enabled, rating_max, notify_email, cooldown_minutes, retry_failed";

pub const REVIEW_COLUMNS: &str = "review_id, tenant_id, place_id, external_review_id, \
   author_name, rating, comment, published_at, is_critical, status, \
   ingested_at, last_seen_at, raw_payload";

pub const VERSION_COLUMNS: &str =
  "version_id, tenant_id, review_id, content_hash, snapshot, created_at";

pub const ACTION_COLUMNS: &str =
  "action_id, tenant_id, review_id, action_type, payload, created_by, created_at";

pub const ALERT_COLUMNS: &str = "alert_id, tenant_id, alert_type, review_id, payload, \
   send_status, created_at, sent_at, send_error, claimed_by, claimed_at";

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read from a `places` row.
pub struct RawPlace {
  pub tenant_id:    String,
  pub place_id:     String,
  pub display_name: String,
  pub is_active:    bool,
}

impl RawPlace {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      tenant_id:    row.get(0)?,
      place_id:     row.get(1)?,
      display_name: row.get(2)?,
      is_active:    row.get(3)?,
    })
  }

  pub fn into_place(self) -> Result<Place> {
    Ok(Place {
      tenant_id:    decode_uuid(&self.tenant_id)?,
      place_id:     self.place_id,
      display_name: self.display_name,
      is_active:    self.is_active,
    })
  }
}

/// Raw values read from an `alert_settings` row.
pub struct RawSettings {
  pub tenant_id:        String,
  pub enabled:          bool,
  pub rating_max:       i64,
  pub notify_email:     Option<String>,
  pub cooldown_minutes: i64,
  pub retry_failed:     bool,
}

impl RawSettings {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      tenant_id:        row.get(0)?,
      enabled:          row.get(1)?,
      rating_max:       row.get(2)?,
      notify_email:     row.get(3)?,
      cooldown_minutes: row.get(4)?,
      retry_failed:     row.get(5)?,
    })
  }

  pub fn into_settings(self) -> Result<AlertSettings> {
    Ok(AlertSettings {
      tenant_id:        decode_uuid(&self.tenant_id)?,
      enabled:          self.enabled,
      rating_max:       u8::try_from(self.rating_max)
        .map_err(|_| Error::Rating(self.rating_max))?,
      notify_email:     self.notify_email,
      cooldown_minutes: u32::try_from(self.cooldown_minutes).unwrap_or(u32::MAX),
      retry_failed:     self.retry_failed,
    })
  }
}

/// Raw values read from a `reviews` row, in [`REVIEW_COLUMNS`] order.
pub struct RawReview {
  pub review_id:          String,
  pub tenant_id:          String,
  pub place_id:           String,
  pub external_review_id: String,
  pub author_name:        Option<String>,
  pub rating:             i64,
  pub comment:            Option<String>,
  pub published_at:       Option<String>,
  pub is_critical:        bool,
  pub status:             String,
  pub ingested_at:        String,
  pub last_seen_at:       String,
  pub raw_payload:        String,
}

impl RawReview {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      review_id:          row.get(0)?,
      tenant_id:          row.get(1)?,
      place_id:           row.get(2)?,
      external_review_id: row.get(3)?,
      author_name:        row.get(4)?,
      rating:             row.get(5)?,
      comment:            row.get(6)?,
      published_at:       row.get(7)?,
      is_critical:        row.get(8)?,
      status:             row.get(9)?,
      ingested_at:        row.get(10)?,
      last_seen_at:       row.get(11)?,
      raw_payload:        row.get(12)?,
    })
  }

  pub fn into_review(self) -> Result<Review> {
    let rating = u8::try_from(self.rating)
      .ok()
      .filter(|r| (1..=5).contains(r))
      .ok_or(Error::Rating(self.rating))?;

    Ok(Review {
      review_id:          decode_uuid(&self.review_id)?,
      tenant_id:          decode_uuid(&self.tenant_id)?,
      place_id:           self.place_id,
      external_review_id: self.external_review_id,
      author_name:        self.author_name,
      rating,
      comment:            self.comment,
      published_at:       decode_opt_dt(self.published_at)?,
      is_critical:        self.is_critical,
      status:             self.status.parse()?,
      ingested_at:        decode_dt(&self.ingested_at)?,
      last_seen_at:       decode_dt(&self.last_seen_at)?,
      raw_payload:        serde_json::from_str(&self.raw_payload)?,
    })
  }
}

/// Raw values read from a `review_versions` row.
pub struct RawVersion {
  pub version_id:   String,
  pub tenant_id:    String,
  pub review_id:    String,
  pub content_hash: String,
  pub snapshot:     String,
  pub created_at:   String,
}

impl RawVersion {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      version_id:   row.get(0)?,
      tenant_id:    row.get(1)?,
      review_id:    row.get(2)?,
      content_hash: row.get(3)?,
      snapshot:     row.get(4)?,
      created_at:   row.get(5)?,
    })
  }

  pub fn into_version(self) -> Result<ReviewVersion> {
    Ok(ReviewVersion {
      version_id:   decode_uuid(&self.version_id)?,
      tenant_id:    decode_uuid(&self.tenant_id)?,
      review_id:    decode_uuid(&self.review_id)?,
      content_hash: self.content_hash,
      snapshot:     serde_json::from_str(&self.snapshot)?,
      created_at:   decode_dt(&self.created_at)?,
    })
  }
}

/// Raw values read from a `review_actions` row.
pub struct RawAction {
  pub action_id:   String,
  pub tenant_id:   String,
  pub review_id:   String,
  pub action_type: String,
  pub payload:     String,
  pub created_by:  String,
  pub created_at:  String,
}

impl RawAction {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      action_id:   row.get(0)?,
      tenant_id:   row.get(1)?,
      review_id:   row.get(2)?,
      action_type: row.get(3)?,
      payload:     row.get(4)?,
      created_by:  row.get(5)?,
      created_at:  row.get(6)?,
    })
  }

  pub fn into_action(self) -> Result<ReviewAction> {
    Ok(ReviewAction {
      action_id:   decode_uuid(&self.action_id)?,
      tenant_id:   decode_uuid(&self.tenant_id)?,
      review_id:   decode_uuid(&self.review_id)?,
      action_type: self.action_type.parse()?,
      payload:     serde_json::from_str(&self.payload)?,
      created_by:  self.created_by,
      created_at:  decode_dt(&self.created_at)?,
    })
  }
}

/// Raw values read from an `alert_log` row, in [`ALERT_COLUMNS`] order.
pub struct RawAlert {
  pub alert_id:    String,
  pub tenant_id:   String,
  pub alert_type:  String,
  pub review_id:   String,
  pub payload:     String,
  pub send_status: String,
  pub created_at:  String,
  pub sent_at:     Option<String>,
  pub send_error:  Option<String>,
  pub claimed_by:  Option<String>,
  pub claimed_at:  Option<String>,
}

impl RawAlert {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      alert_id:    row.get(0)?,
      tenant_id:   row.get(1)?,
      alert_type:  row.get(2)?,
      review_id:   row.get(3)?,
      payload:     row.get(4)?,
      send_status: row.get(5)?,
      created_at:  row.get(6)?,
      sent_at:     row.get(7)?,
      send_error:  row.get(8)?,
      claimed_by:  row.get(9)?,
      claimed_at:  row.get(10)?,
    })
  }

  pub fn into_entry(self) -> Result<AlertLogEntry> {
    Ok(AlertLogEntry {
      alert_id:    decode_uuid(&self.alert_id)?,
      tenant_id:   decode_uuid(&self.tenant_id)?,
      alert_type:  self.alert_type.parse()?,
      review_id:   decode_uuid(&self.review_id)?,
      payload:     serde_json::from_str(&self.payload)?,
      send_status: self.send_status.parse()?,
      created_at:  decode_dt(&self.created_at)?,
      sent_at:     decode_opt_dt(self.sent_at)?,
      send_error:  self.send_error,
      claimed_by:  decode_opt_uuid(self.claimed_by)?,
      claimed_at:  decode_opt_dt(self.claimed_at)?,
    })
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  #[test]
  fn timestamps_are_fixed_width_and_sortable() {
    let whole = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
    let frac = whole + chrono::Duration::microseconds(7);
    let a = encode_dt(whole);
    let b = encode_dt(frac);
    assert_eq!(a, "2026-01-02T03:04:05.000000Z");
    assert_eq!(a.len(), b.len());
    assert!(a < b);
    assert_eq!(decode_dt(&b).unwrap(), frac);
  }
}
