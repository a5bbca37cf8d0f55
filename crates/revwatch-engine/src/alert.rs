//! The alert evaluator.
//!
//! Alerting is at-most-once without locks. Each candidate review gets one
//! alert row, guarded by the store's `(tenant_id, alert_type, review_id)`
//! key. A pending row must then be claimed by a conditional update before
//! anything is sent, so of several concurrent evaluators only one calls the
//! notifier for a given row.

use std::collections::HashMap;

use chrono::{DateTime, TimeDelta, Utc};
use revwatch_core::{
  alert::{AlertSettings, AlertType, NewAlert},
  notify::{Notification, Notifier, SendOutcome},
  review::Review,
  store::{IngestedSince, ReviewStore},
};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Result, RunError, Stage};

/// How long a claim blocks other evaluators before it is considered
/// abandoned.
pub const DEFAULT_CLAIM_LEASE: TimeDelta = TimeDelta::minutes(10);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AlertReport {
  /// Reviews in the window at or below the tenant's threshold.
  pub candidates: usize,
  /// Alert rows created by this evaluation.
  pub registered: usize,
  /// Pending rows this evaluation claimed.
  pub eligible:   usize,
  pub sent:       usize,
  pub failed:     usize,
  /// `error` rows moved back to `pending` under `retry_failed`.
  pub requeued:   usize,
}

pub struct AlertEvaluator<'a, S, N> {
  store:       &'a S,
  notifier:    &'a N,
  claim_lease: TimeDelta,
}

impl<'a, S, N> AlertEvaluator<'a, S, N>
where
  S: ReviewStore,
  N: Notifier,
{
  pub fn new(store: &'a S, notifier: &'a N) -> Self {
    Self { store, notifier, claim_lease: DEFAULT_CLAIM_LEASE }
  }

  pub fn with_claim_lease(mut self, claim_lease: TimeDelta) -> Self {
    self.claim_lease = claim_lease;
    self
  }

  pub async fn evaluate_and_alert(
    &self,
    tenant_id: Uuid,
    run_started_at: DateTime<Utc>,
  ) -> Result<AlertReport> {
    let mut report = AlertReport::default();
    let alert_type = AlertType::NewLowRatingReview;

    let settings = self
      .store
      .get_alert_settings(tenant_id)
      .await
      .map_err(|e| RunError::new(tenant_id, Stage::LoadSettings, e))?
      .unwrap_or_else(|| AlertSettings::defaults_for(tenant_id));

    if !settings.enabled {
      debug!(%tenant_id, "alerts disabled");
      return Ok(report);
    }

    let query = IngestedSince {
      rating_max: Some(settings.rating_max),
      ..IngestedSince::new(tenant_id, run_started_at)
    };
    let candidates = self
      .store
      .reviews_ingested_since(&query)
      .await
      .map_err(|e| RunError::new(tenant_id, Stage::SelectCandidates, e))?;
    report.candidates = candidates.len();
    if candidates.is_empty() {
      return Ok(report);
    }

    for review in &candidates {
      let created = self
        .store
        .register_alert(NewAlert {
          tenant_id,
          alert_type,
          review_id: review.review_id,
          payload: alert_payload(review),
        })
        .await
        .map_err(|e| RunError::new(tenant_id, Stage::RegisterAlerts, e))?;
      if created {
        report.registered += 1;
      }
    }

    let review_ids: Vec<Uuid> = candidates.iter().map(|r| r.review_id).collect();

    if settings.retry_failed {
      report.requeued = self
        .store
        .requeue_failed_alerts(tenant_id, alert_type, review_ids.clone())
        .await
        .map_err(|e| RunError::new(tenant_id, Stage::RequeueAlerts, e))?;
    }

    let pending = self
      .store
      .pending_alerts(tenant_id, alert_type, review_ids)
      .await
      .map_err(|e| RunError::new(tenant_id, Stage::SelectPending, e))?;

    let by_id: HashMap<Uuid, &Review> =
      candidates.iter().map(|r| (r.review_id, r)).collect();
    let recipient = settings.recipient();
    let evaluation_id = Uuid::new_v4();

    for entry in pending {
      let Some(review) = by_id.get(&entry.review_id) else {
        continue;
      };

      let now = Utc::now();
      let claimed = self
        .store
        .claim_alert(entry.alert_id, evaluation_id, now, now - self.claim_lease)
        .await
        .map_err(|e| RunError::new(tenant_id, Stage::ClaimAlert, e))?;
      if !claimed {
        debug!(%tenant_id, alert_id = %entry.alert_id, "alert claimed elsewhere");
        continue;
      }
      report.eligible += 1;

      let message = notification(review, recipient.clone());
      match self.notifier.send(&message).await {
        Ok(outcome) => {
          if outcome == SendOutcome::Skipped {
            debug!(%tenant_id, alert_id = %entry.alert_id, "notifier skipped alert");
          }
          self
            .store
            .mark_alert_sent(entry.alert_id, Utc::now())
            .await
            .map_err(|e| RunError::new(tenant_id, Stage::UpdateAlert, e))?;
          report.sent += 1;
        }
        Err(e) => {
          warn!(%tenant_id, alert_id = %entry.alert_id, error = %e, "alert send failed");
          self
            .store
            .mark_alert_failed(entry.alert_id, e.to_string())
            .await
            .map_err(|e| RunError::new(tenant_id, Stage::UpdateAlert, e))?;
          report.failed += 1;
        }
      }
    }

    info!(
      %tenant_id,
      candidates = report.candidates,
      registered = report.registered,
      eligible = report.eligible,
      sent = report.sent,
      failed = report.failed,
      requeued = report.requeued,
      "alert evaluation finished"
    );
    Ok(report)
  }
}

fn alert_payload(review: &Review) -> serde_json::Value {
  json!({
    "place_id": review.place_id,
    "external_review_id": review.external_review_id,
    "rating": review.rating,
    "author_name": review.author_name,
    "comment": review.comment,
  })
}

fn notification(review: &Review, to: Option<String>) -> Notification {
  let stars = "★".repeat(usize::from(review.rating));
  let author = review.author_name.as_deref().unwrap_or("Anonymous");
  let comment = review.comment.as_deref().unwrap_or("(no comment)");

  let mut body = format!(
    "A new {}-star review was posted for {}.\n\n{stars}\nBy: {author}\n\n{comment}\n",
    review.rating, review.place_id
  );
  if let Some(published_at) = review.published_at {
    body.push_str(&format!("\nPublished: {}\n", published_at.to_rfc3339()));
  }

  Notification {
    to,
    subject: format!("New {}-star review for {}", review.rating, review.place_id),
    body,
  }
}

#[cfg(test)]
mod tests {
  use chrono::Utc;
  use revwatch_core::review::ReviewStatus;
  use serde_json::json;

  use super::*;

  fn review(rating: u8) -> Review {
    Review {
      review_id: Uuid::new_v4(),
      tenant_id: Uuid::new_v4(),
      place_id: "cafe-central".into(),
      external_review_id: "r1".into(),
      author_name: None,
      rating,
      comment: Some("bad".into()),
      published_at: None,
      is_critical: rating <= 3,
      status: ReviewStatus::New,
      ingested_at: Utc::now(),
      last_seen_at: Utc::now(),
      raw_payload: json!({}),
    }
  }

  #[test]
  fn notification_names_place_rating_and_comment() {
    let msg = notification(&review(2), Some("a@x.com".into()));
    assert_eq!(msg.to.as_deref(), Some("a@x.com"));
    assert_eq!(msg.subject, "New 2-star review for cafe-central");
    assert!(msg.body.contains("★★\n"));
    assert!(msg.body.contains("By: Anonymous"));
    assert!(msg.body.contains("bad"));
  }

  #[test]
  fn payload_carries_review_identity() {
    let r = review(1);
    let payload = alert_payload(&r);
    assert_eq!(payload["external_review_id"], "r1");
    assert_eq!(payload["rating"], 1);
  }
}
