//! The ingestion engine: fetch, validate, classify, merge, version, audit.

use std::time::Duration;

use chrono::{DateTime, Utc};
use revwatch_core::{
  action::{ActionType, NewReviewAction, SYSTEM_ACTOR},
  classify,
  content::{content_hash, snapshot},
  place::Place,
  review::{NewReviewVersion, ReviewUpsert},
  source::{RawReview, ReviewSource},
  store::{IngestedSince, ReviewStore},
  validate::{parse_raw_review, validate_content},
};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{ConnectorError, Result, RunError, Stage};

/// Knobs for one ingestion run.
#[derive(Debug, Clone)]
pub struct IngestConfig {
  /// Upper bound passed to every connector call.
  pub fetch_limit:   usize,
  /// Per-place connector deadline.
  pub fetch_timeout: Duration,
}

impl IngestConfig {
  pub const DEFAULT_FETCH_LIMIT: usize = 50;
  pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(20);
}

impl Default for IngestConfig {
  fn default() -> Self {
    Self {
      fetch_limit:   Self::DEFAULT_FETCH_LIMIT,
      fetch_timeout: Self::DEFAULT_FETCH_TIMEOUT,
    }
  }
}

/// A place skipped because its connector call failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaceFailure {
  pub place_id: String,
  pub reason:   String,
}

/// One item refused by validation, by its position in the input batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rejection {
  pub index:  usize,
  pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
  pub tenant_id:      Uuid,
  pub run_started_at: DateTime<Utc>,
  /// Active places attempted.
  pub places:         usize,
  /// Reviews merged, new or already known.
  pub ingested:       usize,
  /// Reviews seen for the first time.
  pub new_reviews:    usize,
  /// Critical reviews first ingested within this run's window.
  pub critical_new:   usize,
  /// Connector items refused by validation.
  pub rejected:       usize,
  pub place_failures: Vec<PlaceFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BackfillReport {
  pub tenant_id:      Uuid,
  pub place_id:       String,
  pub run_started_at: DateTime<Utc>,
  pub accepted:       usize,
  pub rejected:       Vec<Rejection>,
  pub ingested:       usize,
  pub new_reviews:    usize,
  pub critical_new:   usize,
}

/// What happened to one place's batch.
#[derive(Debug, Default)]
struct BatchOutcome {
  ingested:    usize,
  new_reviews: usize,
  rejected:    Vec<Rejection>,
}

/// Runs ingestion for a single tenant against borrowed collaborators.
pub struct IngestionEngine<'a, S, C> {
  store:  &'a S,
  source: &'a C,
  config: &'a IngestConfig,
}

impl<'a, S, C> IngestionEngine<'a, S, C>
where
  S: ReviewStore,
  C: ReviewSource,
{
  pub fn new(store: &'a S, source: &'a C, config: &'a IngestConfig) -> Self {
    Self { store, source, config }
  }

  /// Ingest every active place of `tenant_id`.
  ///
  /// The run window opens before the first connector call. Connector
  /// failures skip their place; storage failures abort the run.
  pub async fn run_ingestion(&self, tenant_id: Uuid) -> Result<IngestReport> {
    let run_started_at = Utc::now();

    let places = self
      .store
      .list_active_places(tenant_id)
      .await
      .map_err(|e| RunError::new(tenant_id, Stage::LoadPlaces, e))?;

    let mut report = IngestReport {
      tenant_id,
      run_started_at,
      places: places.len(),
      ingested: 0,
      new_reviews: 0,
      critical_new: 0,
      rejected: 0,
      place_failures: Vec::new(),
    };

    for place in &places {
      let raws = match self.fetch(place).await {
        Ok(raws) => raws,
        Err(e) => {
          warn!(%tenant_id, place_id = %place.place_id, error = %e, "connector failed; skipping place");
          report.place_failures.push(PlaceFailure {
            place_id: place.place_id.clone(),
            reason:   e.to_string(),
          });
          continue;
        }
      };

      let outcome = self
        .ingest_batch(tenant_id, &place.place_id, raws.into_iter().enumerate().collect())
        .await?;
      for rejection in &outcome.rejected {
        warn!(
          %tenant_id,
          place_id = %place.place_id,
          index = rejection.index,
          reason = %rejection.reason,
          "rejected connector item"
        );
      }

      report.ingested += outcome.ingested;
      report.new_reviews += outcome.new_reviews;
      report.rejected += outcome.rejected.len();
    }

    report.critical_new = self.record_critical_actions(tenant_id, run_started_at).await?;

    info!(
      %tenant_id,
      places = report.places,
      ingested = report.ingested,
      new_reviews = report.new_reviews,
      critical_new = report.critical_new,
      failed_places = report.place_failures.len(),
      "ingestion finished"
    );
    Ok(report)
  }

  /// Ingest operator-supplied items for one place, bypassing the connector.
  /// Each item is validated on its own; the valid subset is merged exactly
  /// like connector results.
  pub async fn backfill(
    &self,
    tenant_id: Uuid,
    place_id: &str,
    items: &[Value],
  ) -> Result<BackfillReport> {
    let run_started_at = Utc::now();

    let mut rejected = Vec::new();
    let mut parsed = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
      match parse_raw_review(item) {
        Ok(raw) => parsed.push((index, raw)),
        Err(e) => rejected.push(Rejection { index, reason: e.to_string() }),
      }
    }

    let outcome = self.ingest_batch(tenant_id, place_id, parsed).await?;
    rejected.extend(outcome.rejected);
    rejected.sort_by_key(|r| r.index);

    let critical_new = self.record_critical_actions(tenant_id, run_started_at).await?;

    info!(
      %tenant_id,
      place_id,
      accepted = outcome.ingested,
      rejected = rejected.len(),
      critical_new,
      "backfill finished"
    );

    Ok(BackfillReport {
      tenant_id,
      place_id: place_id.to_owned(),
      run_started_at,
      accepted: outcome.ingested,
      rejected,
      ingested: outcome.ingested,
      new_reviews: outcome.new_reviews,
      critical_new,
    })
  }

  async fn fetch(&self, place: &Place) -> std::result::Result<Vec<RawReview>, ConnectorError> {
    let call = self.source.fetch(&place.place_id, self.config.fetch_limit);
    match tokio::time::timeout(self.config.fetch_timeout, call).await {
      Ok(Ok(raws)) => Ok(raws),
      Ok(Err(e)) => Err(ConnectorError::Source(e.into())),
      Err(_) => Err(ConnectorError::Timeout(self.config.fetch_timeout)),
    }
  }

  /// Validate, classify, merge and version one place's items.
  async fn ingest_batch(
    &self,
    tenant_id: Uuid,
    place_id: &str,
    raws: Vec<(usize, RawReview)>,
  ) -> Result<BatchOutcome> {
    let mut outcome = BatchOutcome::default();
    let mut rows = Vec::with_capacity(raws.len());

    for (index, raw) in raws {
      match validate_content(place_id, &raw) {
        Ok(content) => rows.push(ReviewUpsert {
          tenant_id,
          is_critical: classify::is_critical(raw.rating),
          content,
          raw_payload: raw.raw_payload,
        }),
        Err(e) => outcome.rejected.push(Rejection { index, reason: e.to_string() }),
      }
    }

    if rows.is_empty() {
      debug!(%tenant_id, place_id, "no valid reviews to merge");
      return Ok(outcome);
    }

    let merged = self
      .store
      .upsert_reviews(rows, Utc::now())
      .await
      .map_err(|e| RunError::new(tenant_id, Stage::Upsert, e).with_place(place_id))?;

    for upserted in &merged {
      let review = &upserted.review;
      let content = review.content();
      let recorded = self
        .store
        .record_version(NewReviewVersion {
          tenant_id,
          review_id: review.review_id,
          content_hash: content_hash(&content),
          snapshot: snapshot(&content),
        })
        .await
        .map_err(|e| RunError::new(tenant_id, Stage::RecordVersion, e).with_place(place_id))?;
      if recorded {
        debug!(%tenant_id, place_id, review_id = %review.review_id, "recorded new version");
      }
    }

    outcome.ingested = merged.len();
    outcome.new_reviews = merged.iter().filter(|u| u.inserted).count();
    Ok(outcome)
  }

  /// Append `ingested_critical` for every critical review first seen since
  /// `since`. Returns how many such reviews exist.
  async fn record_critical_actions(
    &self,
    tenant_id: Uuid,
    since: DateTime<Utc>,
  ) -> Result<usize> {
    let query = IngestedSince { critical_only: true, ..IngestedSince::new(tenant_id, since) };
    let critical = self
      .store
      .reviews_ingested_since(&query)
      .await
      .map_err(|e| RunError::new(tenant_id, Stage::AppendAction, e))?;

    for review in &critical {
      self
        .store
        .append_action(NewReviewAction {
          tenant_id,
          review_id: review.review_id,
          action_type: ActionType::IngestedCritical,
          payload: json!({
            "place_id": review.place_id,
            "external_review_id": review.external_review_id,
            "rating": review.rating,
            "run_started_at": since,
          }),
          created_by: SYSTEM_ACTOR.to_owned(),
        })
        .await
        .map_err(|e| {
          RunError::new(tenant_id, Stage::AppendAction, e).with_place(review.place_id.clone())
        })?;
    }

    Ok(critical.len())
  }
}
