//! The `ReviewStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g. `revwatch-store-sqlite`).
//! The engine depends on this abstraction, not on any concrete backend.
//!
//! Every write that must be idempotent under concurrent runs is expressed as
//! a conditional insert or update against a uniqueness constraint. Backends
//! must implement them atomically, never as a read followed by a write.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  action::{NewReviewAction, ReviewAction},
  alert::{AlertLogEntry, AlertSettings, AlertType, NewAlert},
  place::Place,
  review::{NewReviewVersion, Review, ReviewUpsert, ReviewVersion, UpsertedReview},
};

// ─── Query type ──────────────────────────────────────────────────────────────

/// Parameters for [`ReviewStore::reviews_ingested_since`].
#[derive(Debug, Clone)]
pub struct IngestedSince {
  pub tenant_id:     Uuid,
  /// Inclusive lower bound on `ingested_at`.
  pub since:         DateTime<Utc>,
  /// Only reviews classified critical at ingestion.
  pub critical_only: bool,
  /// Only reviews rated at or below this value.
  pub rating_max:    Option<u8>,
}

impl IngestedSince {
  pub fn new(tenant_id: Uuid, since: DateTime<Utc>) -> Self {
    Self { tenant_id, since, critical_only: false, rating_max: None }
  }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over the durable store shared by every run.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait ReviewStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Places ────────────────────────────────────────────────────────────

  /// Insert or replace a place. Place management is owned elsewhere; this
  /// exists for provisioning and tests.
  fn put_place(
    &self,
    place: Place,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Active places for a tenant, ordered by `place_id`.
  fn list_active_places(
    &self,
    tenant_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Place>, Self::Error>> + Send + '_;

  /// Every tenant with at least one active place.
  fn tenants_with_active_places(
    &self,
  ) -> impl Future<Output = Result<Vec<Uuid>, Self::Error>> + Send + '_;

  // ── Alert settings ────────────────────────────────────────────────────

  /// Stored settings for a tenant; `None` means defaults apply.
  fn get_alert_settings(
    &self,
    tenant_id: Uuid,
  ) -> impl Future<Output = Result<Option<AlertSettings>, Self::Error>> + Send + '_;

  fn put_alert_settings(
    &self,
    settings: AlertSettings,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Reviews ───────────────────────────────────────────────────────────

  /// Merge a batch of reviews in one transaction.
  ///
  /// Absent rows are inserted with `ingested_at = last_seen_at = seen_at`.
  /// Present rows get their content fields, raw payload and `last_seen_at`
  /// updated; `ingested_at`, `is_critical` and `status` are never touched.
  fn upsert_reviews(
    &self,
    rows: Vec<ReviewUpsert>,
    seen_at: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<UpsertedReview>, Self::Error>> + Send + '_;

  fn get_review(
    &self,
    review_id: Uuid,
  ) -> impl Future<Output = Result<Option<Review>, Self::Error>> + Send + '_;

  /// Reviews for a tenant, optionally restricted to one place.
  fn list_reviews(
    &self,
    tenant_id: Uuid,
    place_id: Option<String>,
  ) -> impl Future<Output = Result<Vec<Review>, Self::Error>> + Send + '_;

  /// Reviews first inserted at or after `query.since`.
  fn reviews_ingested_since<'a>(
    &'a self,
    query: &'a IngestedSince,
  ) -> impl Future<Output = Result<Vec<Review>, Self::Error>> + Send + 'a;

  // ── Versions ──────────────────────────────────────────────────────────

  /// Record a content version. Returns `false` (and writes nothing) if the
  /// `(review_id, content_hash)` pair already exists.
  fn record_version(
    &self,
    version: NewReviewVersion,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Versions for a review, oldest first.
  fn list_versions(
    &self,
    review_id: Uuid,
  ) -> impl Future<Output = Result<Vec<ReviewVersion>, Self::Error>> + Send + '_;

  // ── Audit log ─────────────────────────────────────────────────────────

  /// Append an action. Returns `None` when the store's dedup rule for that
  /// action type (one `ingested_critical` per review) swallowed it.
  fn append_action(
    &self,
    action: NewReviewAction,
  ) -> impl Future<Output = Result<Option<ReviewAction>, Self::Error>> + Send + '_;

  /// Actions for a review, oldest first.
  fn list_actions(
    &self,
    review_id: Uuid,
  ) -> impl Future<Output = Result<Vec<ReviewAction>, Self::Error>> + Send + '_;

  // ── Alert log ─────────────────────────────────────────────────────────

  /// Insert a `pending` row unless one already exists for
  /// `(tenant_id, alert_type, review_id)`. Returns whether a row was created.
  fn register_alert(
    &self,
    alert: NewAlert,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Move `error` rows for the given reviews back to `pending`, clearing
  /// their error and claim. Returns the number of rows requeued.
  fn requeue_failed_alerts(
    &self,
    tenant_id: Uuid,
    alert_type: AlertType,
    review_ids: Vec<Uuid>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  /// Rows for the given reviews whose status is currently `pending`.
  fn pending_alerts(
    &self,
    tenant_id: Uuid,
    alert_type: AlertType,
    review_ids: Vec<Uuid>,
  ) -> impl Future<Output = Result<Vec<AlertLogEntry>, Self::Error>> + Send + '_;

  /// Claim a pending row for `claim`. A row already claimed at or after
  /// `stale_before` is left alone; an older claim is taken over. Returns
  /// `true` only for the single caller whose update took effect.
  fn claim_alert(
    &self,
    alert_id: Uuid,
    claim: Uuid,
    claimed_at: DateTime<Utc>,
    stale_before: DateTime<Utc>,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// `pending` → `sent`. Returns `false` if the row was no longer pending.
  fn mark_alert_sent(
    &self,
    alert_id: Uuid,
    sent_at: DateTime<Utc>,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// `pending` → `error`. Returns `false` if the row was no longer pending.
  fn mark_alert_failed(
    &self,
    alert_id: Uuid,
    error: String,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// All alert rows for a tenant, oldest first.
  fn list_alerts(
    &self,
    tenant_id: Uuid,
  ) -> impl Future<Output = Result<Vec<AlertLogEntry>, Self::Error>> + Send + '_;
}
