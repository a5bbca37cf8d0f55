//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::{Duration, TimeZone, Utc};
use revwatch_core::{
  action::{ActionType, NewReviewAction, SYSTEM_ACTOR},
  alert::{AlertSettings, AlertType, NewAlert, SendStatus},
  content::{content_hash, snapshot},
  place::Place,
  review::{NewReviewVersion, ReviewContent, ReviewStatus, ReviewUpsert},
  store::{IngestedSince, ReviewStore},
};
use serde_json::json;
use uuid::Uuid;

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn content(external_id: &str, rating: u8) -> ReviewContent {
  ReviewContent {
    place_id:           "place-1".into(),
    external_review_id: external_id.into(),
    author_name:        Some("Ana".into()),
    rating,
    comment:            Some("cold soup".into()),
    published_at:       None,
  }
}

fn upsert(tenant_id: Uuid, external_id: &str, rating: u8) -> ReviewUpsert {
  ReviewUpsert {
    tenant_id,
    content: content(external_id, rating),
    is_critical: rating <= 3,
    raw_payload: json!({ "id": external_id, "rating": rating }),
  }
}

// ─── Places ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn active_places_are_listed_per_tenant() {
  let s = store().await;
  let tenant = Uuid::new_v4();
  let other = Uuid::new_v4();

  for (t, id, active) in [
    (tenant, "b", true),
    (tenant, "a", true),
    (tenant, "c", false),
    (other, "z", false),
  ] {
    s.put_place(Place {
      tenant_id:    t,
      place_id:     id.into(),
      display_name: id.to_uppercase(),
      is_active:    active,
    })
    .await
    .unwrap();
  }

  let places = s.list_active_places(tenant).await.unwrap();
  let ids: Vec<_> = places.iter().map(|p| p.place_id.as_str()).collect();
  assert_eq!(ids, ["a", "b"]);

  let tenants = s.tenants_with_active_places().await.unwrap();
  assert_eq!(tenants, vec![tenant]);
}

// ─── Alert settings ──────────────────────────────────────────────────────────

#[tokio::test]
async fn alert_settings_round_trip_and_overwrite() {
  let s = store().await;
  let tenant = Uuid::new_v4();
  assert!(s.get_alert_settings(tenant).await.unwrap().is_none());

  let mut settings = AlertSettings::defaults_for(tenant);
  settings.notify_email = Some("ops@example.com".into());
  s.put_alert_settings(settings.clone()).await.unwrap();
  assert_eq!(s.get_alert_settings(tenant).await.unwrap(), Some(settings.clone()));

  settings.enabled = false;
  settings.retry_failed = true;
  s.put_alert_settings(settings.clone()).await.unwrap();
  assert_eq!(s.get_alert_settings(tenant).await.unwrap(), Some(settings));
}

// ─── Reviews ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn upsert_inserts_then_updates_without_touching_ingested_at() {
  let s = store().await;
  let tenant = Uuid::new_v4();
  let t0 = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
  let t1 = t0 + Duration::hours(1);

  let first = s.upsert_reviews(vec![upsert(tenant, "r1", 2)], t0).await.unwrap();
  assert_eq!(first.len(), 1);
  assert!(first[0].inserted);
  let original = first[0].review.clone();
  assert_eq!(original.ingested_at, t0);
  assert_eq!(original.last_seen_at, t0);
  assert_eq!(original.status, ReviewStatus::New);
  assert!(original.is_critical);

  // Same review, now edited up to five stars and marked non-critical by the
  // caller. Content changes; classification and first-seen time do not.
  let mut edited = upsert(tenant, "r1", 5);
  edited.content.comment = Some("actually great".into());
  let second = s.upsert_reviews(vec![edited], t1).await.unwrap();
  assert!(!second[0].inserted);
  let updated = &second[0].review;
  assert_eq!(updated.review_id, original.review_id);
  assert_eq!(updated.rating, 5);
  assert_eq!(updated.comment.as_deref(), Some("actually great"));
  assert_eq!(updated.ingested_at, t0);
  assert_eq!(updated.last_seen_at, t1);
  assert!(updated.is_critical);

  let all = s.list_reviews(tenant, None).await.unwrap();
  assert_eq!(all.len(), 1);
}

#[tokio::test]
async fn last_seen_at_never_moves_backwards() {
  let s = store().await;
  let tenant = Uuid::new_v4();
  let t0 = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();

  s.upsert_reviews(vec![upsert(tenant, "r1", 4)], t0).await.unwrap();
  let back = s
    .upsert_reviews(vec![upsert(tenant, "r1", 4)], t0 - Duration::minutes(5))
    .await
    .unwrap();
  assert_eq!(back[0].review.last_seen_at, t0);
}

#[tokio::test]
async fn same_external_id_at_two_places_is_two_reviews() {
  let s = store().await;
  let tenant = Uuid::new_v4();
  let mut elsewhere = upsert(tenant, "r1", 4);
  elsewhere.content.place_id = "place-2".into();

  let out = s
    .upsert_reviews(vec![upsert(tenant, "r1", 4), elsewhere], Utc::now())
    .await
    .unwrap();
  assert!(out.iter().all(|u| u.inserted));
  assert_ne!(out[0].review.review_id, out[1].review.review_id);

  let at_two = s.list_reviews(tenant, Some("place-2".into())).await.unwrap();
  assert_eq!(at_two.len(), 1);
}

#[tokio::test]
async fn ingested_since_filters_window_criticality_and_rating() {
  let s = store().await;
  let tenant = Uuid::new_v4();
  let t0 = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();

  s.upsert_reviews(vec![upsert(tenant, "old", 1)], t0 - Duration::seconds(1))
    .await
    .unwrap();
  s.upsert_reviews(
    vec![upsert(tenant, "one", 1), upsert(tenant, "three", 3), upsert(tenant, "five", 5)],
    t0,
  )
  .await
  .unwrap();

  let all = s.reviews_ingested_since(&IngestedSince::new(tenant, t0)).await.unwrap();
  assert_eq!(all.len(), 3);

  let critical = s
    .reviews_ingested_since(&IngestedSince { critical_only: true, ..IngestedSince::new(tenant, t0) })
    .await
    .unwrap();
  assert_eq!(critical.len(), 2);

  let at_most_two = s
    .reviews_ingested_since(&IngestedSince {
      critical_only: true,
      rating_max: Some(2),
      ..IngestedSince::new(tenant, t0)
    })
    .await
    .unwrap();
  assert_eq!(at_most_two.len(), 1);
  assert_eq!(at_most_two[0].external_review_id, "one");
}

#[tokio::test]
async fn get_review_missing_returns_none() {
  let s = store().await;
  assert!(s.get_review(Uuid::new_v4()).await.unwrap().is_none());
}

// ─── Versions ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn identical_content_records_one_version() {
  let s = store().await;
  let tenant = Uuid::new_v4();
  let review = s
    .upsert_reviews(vec![upsert(tenant, "r1", 2)], Utc::now())
    .await
    .unwrap()
    .remove(0)
    .review;

  let version = |c: &ReviewContent| NewReviewVersion {
    tenant_id:    tenant,
    review_id:    review.review_id,
    content_hash: content_hash(c),
    snapshot:     snapshot(c),
  };

  let c = review.content();
  assert!(s.record_version(version(&c)).await.unwrap());
  assert!(!s.record_version(version(&c)).await.unwrap());

  let mut changed = c.clone();
  changed.rating = 4;
  assert!(s.record_version(version(&changed)).await.unwrap());

  let versions = s.list_versions(review.review_id).await.unwrap();
  assert_eq!(versions.len(), 2);
  assert_eq!(versions[0].content_hash, content_hash(&c));
  assert_eq!(versions[0].snapshot["rating"], json!(2));
}

// ─── Audit log ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn ingested_critical_is_recorded_once_other_actions_append() {
  let s = store().await;
  let tenant = Uuid::new_v4();
  let review = s
    .upsert_reviews(vec![upsert(tenant, "r1", 1)], Utc::now())
    .await
    .unwrap()
    .remove(0)
    .review;

  let action = |action_type| NewReviewAction {
    tenant_id: tenant,
    review_id: review.review_id,
    action_type,
    payload: json!({ "rating": 1 }),
    created_by: SYSTEM_ACTOR.into(),
  };

  let first = s.append_action(action(ActionType::IngestedCritical)).await.unwrap();
  assert!(first.is_some());
  assert!(s.append_action(action(ActionType::IngestedCritical)).await.unwrap().is_none());
  assert!(s.append_action(action(ActionType::NoteAdded)).await.unwrap().is_some());
  assert!(s.append_action(action(ActionType::NoteAdded)).await.unwrap().is_some());

  let actions = s.list_actions(review.review_id).await.unwrap();
  assert_eq!(actions.len(), 3);
  assert_eq!(actions[0].action_type, ActionType::IngestedCritical);
  assert_eq!(actions[0].created_by, SYSTEM_ACTOR);
}

// ─── Alert log ───────────────────────────────────────────────────────────────

async fn critical_review(s: &SqliteStore, tenant: Uuid, external_id: &str) -> Uuid {
  s.upsert_reviews(vec![upsert(tenant, external_id, 1)], Utc::now())
    .await
    .unwrap()
    .remove(0)
    .review
    .review_id
}

fn new_alert(tenant: Uuid, review_id: Uuid) -> NewAlert {
  NewAlert {
    tenant_id:  tenant,
    alert_type: AlertType::NewLowRatingReview,
    review_id,
    payload:    json!({ "rating": 1 }),
  }
}

#[tokio::test]
async fn alert_registration_is_idempotent() {
  let s = store().await;
  let tenant = Uuid::new_v4();
  let review_id = critical_review(&s, tenant, "r1").await;

  assert!(s.register_alert(new_alert(tenant, review_id)).await.unwrap());
  assert!(!s.register_alert(new_alert(tenant, review_id)).await.unwrap());

  let alerts = s.list_alerts(tenant).await.unwrap();
  assert_eq!(alerts.len(), 1);
  assert_eq!(alerts[0].send_status, SendStatus::Pending);
  assert!(alerts[0].claimed_by.is_none());
}

#[tokio::test]
async fn only_one_claimant_wins_until_the_claim_goes_stale() {
  let s = store().await;
  let tenant = Uuid::new_v4();
  let review_id = critical_review(&s, tenant, "r1").await;
  s.register_alert(new_alert(tenant, review_id)).await.unwrap();
  let alert_id = s
    .pending_alerts(tenant, AlertType::NewLowRatingReview, vec![review_id])
    .await
    .unwrap()[0]
    .alert_id;

  let now = Utc::now();
  let lease = Duration::minutes(5);
  let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

  assert!(s.claim_alert(alert_id, a, now, now - lease).await.unwrap());
  assert!(!s.claim_alert(alert_id, b, now, now - lease).await.unwrap());

  // Later, a's claim is older than the lease and b may take over.
  let later = now + lease + Duration::seconds(1);
  assert!(s.claim_alert(alert_id, b, later, later - lease).await.unwrap());

  let entry = s.list_alerts(tenant).await.unwrap().remove(0);
  assert_eq!(entry.claimed_by, Some(b));
}

#[tokio::test]
async fn sent_and_failed_transitions_only_leave_pending() {
  let s = store().await;
  let tenant = Uuid::new_v4();
  let r1 = critical_review(&s, tenant, "r1").await;
  let r2 = critical_review(&s, tenant, "r2").await;
  s.register_alert(new_alert(tenant, r1)).await.unwrap();
  s.register_alert(new_alert(tenant, r2)).await.unwrap();

  let pending = s
    .pending_alerts(tenant, AlertType::NewLowRatingReview, vec![r1, r2])
    .await
    .unwrap();
  assert_eq!(pending.len(), 2);
  let by_review = |id| pending.iter().find(|e| e.review_id == id).unwrap().alert_id;
  let (a1, a2) = (by_review(r1), by_review(r2));

  let sent_at = Utc::now();
  assert!(s.mark_alert_sent(a1, sent_at).await.unwrap());
  assert!(!s.mark_alert_sent(a1, sent_at).await.unwrap());
  assert!(!s.mark_alert_failed(a1, "late".into()).await.unwrap());

  assert!(s.mark_alert_failed(a2, "relay down".into()).await.unwrap());
  assert!(!s.mark_alert_sent(a2, sent_at).await.unwrap());

  let alerts = s.list_alerts(tenant).await.unwrap();
  let sent = alerts.iter().find(|e| e.alert_id == a1).unwrap();
  assert_eq!(sent.send_status, SendStatus::Sent);
  assert!(sent.sent_at.is_some());
  let failed = alerts.iter().find(|e| e.alert_id == a2).unwrap();
  assert_eq!(failed.send_status, SendStatus::Error);
  assert_eq!(failed.send_error.as_deref(), Some("relay down"));

  let still_pending = s
    .pending_alerts(tenant, AlertType::NewLowRatingReview, vec![r1, r2])
    .await
    .unwrap();
  assert!(still_pending.is_empty());
}

#[tokio::test]
async fn requeue_moves_only_failed_rows_back_to_pending() {
  let s = store().await;
  let tenant = Uuid::new_v4();
  let r1 = critical_review(&s, tenant, "r1").await;
  let r2 = critical_review(&s, tenant, "r2").await;
  s.register_alert(new_alert(tenant, r1)).await.unwrap();
  s.register_alert(new_alert(tenant, r2)).await.unwrap();

  for entry in s
    .pending_alerts(tenant, AlertType::NewLowRatingReview, vec![r1, r2])
    .await
    .unwrap()
  {
    if entry.review_id == r1 {
      s.mark_alert_sent(entry.alert_id, Utc::now()).await.unwrap();
    } else {
      s.claim_alert(entry.alert_id, Uuid::new_v4(), Utc::now(), Utc::now())
        .await
        .unwrap();
      s.mark_alert_failed(entry.alert_id, "boom".into()).await.unwrap();
    }
  }

  let requeued = s
    .requeue_failed_alerts(tenant, AlertType::NewLowRatingReview, vec![r1, r2])
    .await
    .unwrap();
  assert_eq!(requeued, 1);

  let pending = s
    .pending_alerts(tenant, AlertType::NewLowRatingReview, vec![r1, r2])
    .await
    .unwrap();
  assert_eq!(pending.len(), 1);
  assert_eq!(pending[0].review_id, r2);
  assert!(pending[0].send_error.is_none());
  assert!(pending[0].claimed_by.is_none());
}

#[tokio::test]
async fn review_id_lists_beyond_the_bind_limit_are_chunked() {
  let s = store().await;
  let tenant = Uuid::new_v4();
  let kind = AlertType::NewLowRatingReview;

  let rows = (0..crate::store::IN_LIST_CHUNK * 2 + 7)
    .map(|i| upsert(tenant, &format!("r{i}"), 2))
    .collect();
  let merged = s.upsert_reviews(rows, Utc::now()).await.unwrap();
  let mut ids: Vec<Uuid> = merged.iter().map(|u| u.review.review_id).collect();
  for id in &ids {
    s.register_alert(new_alert(tenant, *id)).await.unwrap();
  }
  let registered = ids.len();

  // Far more ids than SQLite allows bound in one statement.
  ids.extend((0..40_000).map(|_| Uuid::new_v4()));

  let pending = s.pending_alerts(tenant, kind, ids.clone()).await.unwrap();
  assert_eq!(pending.len(), registered);
  assert!(pending.windows(2).all(|w| w[0].created_at <= w[1].created_at));

  for entry in [&pending[0], &pending[registered - 1]] {
    s.mark_alert_failed(entry.alert_id, "relay down".into()).await.unwrap();
  }
  assert_eq!(s.requeue_failed_alerts(tenant, kind, ids).await.unwrap(), 2);
}

#[tokio::test]
async fn empty_review_lists_short_circuit() {
  let s = store().await;
  let tenant = Uuid::new_v4();
  let kind = AlertType::NewLowRatingReview;
  assert!(s.pending_alerts(tenant, kind, vec![]).await.unwrap().is_empty());
  assert_eq!(s.requeue_failed_alerts(tenant, kind, vec![]).await.unwrap(), 0);
  assert!(s.upsert_reviews(vec![], Utc::now()).await.unwrap().is_empty());
}

// ─── Migrations ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn fresh_store_is_at_latest_schema() {
  let s = store().await;
  assert_eq!(
    s.schema_version().await.unwrap(),
    crate::schema::MIGRATIONS.len() as i64
  );
}

#[tokio::test]
async fn reopening_a_file_store_keeps_data_and_refuses_newer_schemas() {
  let path = std::env::temp_dir().join(format!("revwatch-{}.db", Uuid::new_v4()));
  let tenant = Uuid::new_v4();

  {
    let s = SqliteStore::open(&path).await.unwrap();
    s.upsert_reviews(vec![upsert(tenant, "r1", 2)], Utc::now())
      .await
      .unwrap();
  }

  let s = SqliteStore::open(&path).await.unwrap();
  assert_eq!(s.list_reviews(tenant, None).await.unwrap().len(), 1);

  let future = crate::schema::MIGRATIONS.len() as i64 + 1;
  rusqlite::Connection::open(&path)
    .unwrap()
    .pragma_update(None, "user_version", future)
    .unwrap();
  drop(s);

  match SqliteStore::open(&path).await {
    Err(Error::SchemaTooNew { found, .. }) => assert_eq!(found, future),
    Err(other) => panic!("unexpected error: {other}"),
    Ok(_) => panic!("opened a database with a newer schema"),
  }

  let _ = std::fs::remove_file(&path);
}
