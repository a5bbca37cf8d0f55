//! [`SqliteStore`], the SQLite implementation of [`ReviewStore`].

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use revwatch_core::{
  action::{NewReviewAction, ReviewAction},
  alert::{AlertLogEntry, AlertSettings, AlertType, NewAlert},
  place::Place,
  review::{NewReviewVersion, Review, ReviewUpsert, ReviewVersion, UpsertedReview},
  store::{IngestedSince, ReviewStore},
};

use crate::{
  encode::{
    decode_uuid, encode_dt, encode_uuid, RawAction, RawAlert, RawPlace, RawReview, RawSettings,
    RawVersion, ACTION_COLUMNS, ALERT_COLUMNS, PLACE_COLUMNS, REVIEW_COLUMNS,
    SETTINGS_COLUMNS, VERSION_COLUMNS,
  },
  schema::{MIGRATIONS, PRAGMAS},
  Error, Result,
};

// ─── Statements ──────────────────────────────────────────────────────────────

/// The merge. The UPDATE arm deliberately omits `ingested_at`, `is_critical`
/// and `status`; `last_seen_at` only ever moves forward.
fn upsert_review_sql() -> String {
  format!(
    "INSERT INTO reviews (
       review_id, tenant_id, place_id, external_review_id, author_name,
       rating, comment, published_at, is_critical, status,
       ingested_at, last_seen_at, raw_payload
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 'new', ?10, ?10, ?11)
     ON CONFLICT (tenant_id, place_id, external_review_id) DO UPDATE SET
       author_name  = excluded.author_name,
       rating       = excluded.rating,
       comment      = excluded.comment,
       published_at = excluded.published_at,
       raw_payload  = excluded.raw_payload,
       last_seen_at = MAX(last_seen_at, excluded.last_seen_at)
     RETURNING {REVIEW_COLUMNS}"
  )
}

/// Review ids bound per `IN (...)` statement, well under SQLite's
/// bound-variable limit.
pub(crate) const IN_LIST_CHUNK: usize = 500;

/// `?3, ?4, …` placeholders for an `IN (...)` list following `offset` fixed
/// parameters.
fn in_list(len: usize, offset: usize) -> String {
  (0..len)
    .map(|i| format!("?{}", i + offset + 1))
    .collect::<Vec<_>>()
    .join(", ")
}

/// A review upsert with every column already encoded.
struct EncodedUpsert {
  review_id:          String,
  tenant_id:          String,
  place_id:           String,
  external_review_id: String,
  author_name:        Option<String>,
  rating:             i64,
  comment:            Option<String>,
  published_at:       Option<String>,
  is_critical:        bool,
  raw_payload:        String,
}

impl EncodedUpsert {
  fn new(row: ReviewUpsert) -> Result<Self> {
    Ok(Self {
      review_id:          encode_uuid(Uuid::new_v4()),
      tenant_id:          encode_uuid(row.tenant_id),
      place_id:           row.content.place_id,
      external_review_id: row.content.external_review_id,
      author_name:        row.content.author_name,
      rating:             i64::from(row.content.rating),
      comment:            row.content.comment,
      published_at:       row.content.published_at.map(encode_dt),
      is_critical:        row.is_critical,
      raw_payload:        serde_json::to_string(&row.raw_payload)?,
    })
  }
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A revwatch store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and bring its schema up to date.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.migrate().await?;
    Ok(store)
  }

  /// Open an in-memory store, mainly for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.migrate().await?;
    Ok(store)
  }

  /// The number of migrations applied to this database.
  pub async fn schema_version(&self) -> Result<i64> {
    let version = self
      .conn
      .call(|conn| Ok(conn.query_row("PRAGMA user_version", [], |r| r.get(0))?))
      .await?;
    Ok(version)
  }

  async fn migrate(&self) -> Result<()> {
    let supported = MIGRATIONS.len() as i64;

    let (found, applied): (i64, i64) = self
      .conn
      .call(move |conn| {
        conn.execute_batch(PRAGMAS)?;
        let found: i64 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
        if found > supported {
          return Ok((found, 0));
        }

        let mut applied = 0;
        for (idx, sql) in MIGRATIONS.iter().enumerate().skip(found as usize) {
          let tx = conn.transaction()?;
          tx.execute_batch(sql)?;
          tx.pragma_update(None, "user_version", idx as i64 + 1)?;
          tx.commit()?;
          applied += 1;
        }
        Ok((found, applied))
      })
      .await?;

    if found > supported {
      return Err(Error::SchemaTooNew { found, supported });
    }
    if applied > 0 {
      tracing::info!(from = found, to = found + applied, "applied schema migrations");
    }
    Ok(())
  }

  async fn query_reviews(&self, sql: String, params: Vec<String>) -> Result<Vec<Review>> {
    let raws: Vec<RawReview> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params.iter()), RawReview::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawReview::into_review).collect()
  }

  async fn query_alerts(&self, sql: String, params: Vec<String>) -> Result<Vec<AlertLogEntry>> {
    let raws: Vec<RawAlert> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params.iter()), RawAlert::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawAlert::into_entry).collect()
  }

  /// Run a single-row conditional `UPDATE`; `true` if it changed a row.
  async fn update_one(&self, sql: &'static str, params: Vec<Option<String>>) -> Result<bool> {
    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(sql, rusqlite::params_from_iter(params.iter()))?)
      })
      .await?;
    Ok(changed == 1)
  }
}

// ─── ReviewStore impl ────────────────────────────────────────────────────────

impl ReviewStore for SqliteStore {
  type Error = Error;

  // ── Places ────────────────────────────────────────────────────────────────

  async fn put_place(&self, place: Place) -> Result<()> {
    let tenant_str = encode_uuid(place.tenant_id);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO places (tenant_id, place_id, display_name, is_active)
           VALUES (?1, ?2, ?3, ?4)
           ON CONFLICT (tenant_id, place_id) DO UPDATE SET
             display_name = excluded.display_name,
             is_active    = excluded.is_active",
          rusqlite::params![tenant_str, place.place_id, place.display_name, place.is_active],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn list_active_places(&self, tenant_id: Uuid) -> Result<Vec<Place>> {
    let tenant_str = encode_uuid(tenant_id);

    let raws: Vec<RawPlace> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {PLACE_COLUMNS} FROM places
           WHERE tenant_id = ?1 AND is_active = 1
           ORDER BY place_id"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![tenant_str], RawPlace::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawPlace::into_place).collect()
  }

  async fn tenants_with_active_places(&self) -> Result<Vec<Uuid>> {
    let ids: Vec<String> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT DISTINCT tenant_id FROM places WHERE is_active = 1 ORDER BY tenant_id",
        )?;
        let rows = stmt
          .query_map([], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    ids.iter().map(|s| decode_uuid(s)).collect()
  }

  // ── Alert settings ────────────────────────────────────────────────────────

  async fn get_alert_settings(&self, tenant_id: Uuid) -> Result<Option<AlertSettings>> {
    let tenant_str = encode_uuid(tenant_id);

    let raw: Option<RawSettings> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {SETTINGS_COLUMNS} FROM alert_settings WHERE tenant_id = ?1"),
            rusqlite::params![tenant_str],
            RawSettings::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawSettings::into_settings).transpose()
  }

  async fn put_alert_settings(&self, settings: AlertSettings) -> Result<()> {
    let tenant_str = encode_uuid(settings.tenant_id);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO alert_settings (
             tenant_id, enabled, rating_max, notify_email, cooldown_minutes, retry_failed
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
           ON CONFLICT (tenant_id) DO UPDATE SET
             enabled          = excluded.enabled,
             rating_max       = excluded.rating_max,
             notify_email     = excluded.notify_email,
             cooldown_minutes = excluded.cooldown_minutes,
             retry_failed     = excluded.retry_failed",
          rusqlite::params![
            tenant_str,
            settings.enabled,
            settings.rating_max,
            settings.notify_email,
            settings.cooldown_minutes,
            settings.retry_failed,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Reviews ───────────────────────────────────────────────────────────────

  async fn upsert_reviews(
    &self,
    rows:    Vec<ReviewUpsert>,
    seen_at: DateTime<Utc>,
  ) -> Result<Vec<UpsertedReview>> {
    if rows.is_empty() {
      return Ok(Vec::new());
    }

    let encoded = rows
      .into_iter()
      .map(EncodedUpsert::new)
      .collect::<Result<Vec<_>>>()?;
    let seen_str = encode_dt(seen_at);
    let sql = upsert_review_sql();

    let results: Vec<(String, RawReview)> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut out = Vec::with_capacity(encoded.len());
        {
          let mut stmt = tx.prepare_cached(&sql)?;
          for row in &encoded {
            let raw = stmt.query_row(
              rusqlite::params![
                row.review_id,
                row.tenant_id,
                row.place_id,
                row.external_review_id,
                row.author_name,
                row.rating,
                row.comment,
                row.published_at,
                row.is_critical,
                seen_str,
                row.raw_payload,
              ],
              RawReview::from_row,
            )?;
            out.push((row.review_id.clone(), raw));
          }
        }
        tx.commit()?;
        Ok(out)
      })
      .await?;

    // The INSERT arm keeps our freshly generated id; the UPDATE arm returns
    // the existing one.
    results
      .into_iter()
      .map(|(attempted_id, raw)| {
        let inserted = raw.review_id == attempted_id;
        Ok(UpsertedReview { review: raw.into_review()?, inserted })
      })
      .collect()
  }

  async fn get_review(&self, review_id: Uuid) -> Result<Option<Review>> {
    let mut found = self
      .query_reviews(
        format!("SELECT {REVIEW_COLUMNS} FROM reviews WHERE review_id = ?1"),
        vec![encode_uuid(review_id)],
      )
      .await?;
    Ok(found.pop())
  }

  async fn list_reviews(&self, tenant_id: Uuid, place_id: Option<String>) -> Result<Vec<Review>> {
    let mut params = vec![encode_uuid(tenant_id)];
    let place_clause = match place_id {
      Some(p) => {
        params.push(p);
        "AND place_id = ?2"
      }
      None => "",
    };

    self
      .query_reviews(
        format!(
          "SELECT {REVIEW_COLUMNS} FROM reviews
           WHERE tenant_id = ?1 {place_clause}
           ORDER BY ingested_at, review_id"
        ),
        params,
      )
      .await
  }

  async fn reviews_ingested_since<'a>(
    &'a self,
    query: &'a IngestedSince,
  ) -> Result<Vec<Review>> {
    let mut conds = vec!["tenant_id = ?1", "ingested_at >= ?2"];
    let mut params = vec![encode_uuid(query.tenant_id), encode_dt(query.since)];
    if query.critical_only {
      conds.push("is_critical = 1");
    }
    if let Some(max) = query.rating_max {
      conds.push("rating <= CAST(?3 AS INTEGER)");
      params.push(max.to_string());
    }

    self
      .query_reviews(
        format!(
          "SELECT {REVIEW_COLUMNS} FROM reviews
           WHERE {}
           ORDER BY ingested_at, review_id",
          conds.join(" AND ")
        ),
        params,
      )
      .await
  }

  // ── Versions ──────────────────────────────────────────────────────────────

  async fn record_version(&self, version: NewReviewVersion) -> Result<bool> {
    let id_str       = encode_uuid(Uuid::new_v4());
    let tenant_str   = encode_uuid(version.tenant_id);
    let review_str   = encode_uuid(version.review_id);
    let snapshot_str = version.snapshot.to_string();
    let at_str       = encode_dt(Utc::now());

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "INSERT INTO review_versions (
             version_id, tenant_id, review_id, content_hash, snapshot, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
           ON CONFLICT (review_id, content_hash) DO NOTHING",
          rusqlite::params![
            id_str,
            tenant_str,
            review_str,
            version.content_hash,
            snapshot_str,
            at_str,
          ],
        )?)
      })
      .await?;

    Ok(changed == 1)
  }

  async fn list_versions(&self, review_id: Uuid) -> Result<Vec<ReviewVersion>> {
    let review_str = encode_uuid(review_id);

    let raws: Vec<RawVersion> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {VERSION_COLUMNS} FROM review_versions
           WHERE review_id = ?1
           ORDER BY created_at, version_id"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![review_str], RawVersion::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawVersion::into_version).collect()
  }

  // ── Audit log ─────────────────────────────────────────────────────────────

  async fn append_action(&self, input: NewReviewAction) -> Result<Option<ReviewAction>> {
    let action = ReviewAction {
      action_id:   Uuid::new_v4(),
      tenant_id:   input.tenant_id,
      review_id:   input.review_id,
      action_type: input.action_type,
      payload:     input.payload,
      created_by:  input.created_by,
      created_at:  Utc::now(),
    };

    let id_str      = encode_uuid(action.action_id);
    let tenant_str  = encode_uuid(action.tenant_id);
    let review_str  = encode_uuid(action.review_id);
    let type_str    = action.action_type.as_str();
    let payload_str = action.payload.to_string();
    let by_str      = action.created_by.clone();
    let at_str      = encode_dt(action.created_at);

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "INSERT INTO review_actions (
             action_id, tenant_id, review_id, action_type, payload, created_by, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
           ON CONFLICT DO NOTHING",
          rusqlite::params![
            id_str, tenant_str, review_str, type_str, payload_str, by_str, at_str,
          ],
        )?)
      })
      .await?;

    Ok((changed == 1).then_some(action))
  }

  async fn list_actions(&self, review_id: Uuid) -> Result<Vec<ReviewAction>> {
    let review_str = encode_uuid(review_id);

    let raws: Vec<RawAction> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {ACTION_COLUMNS} FROM review_actions
           WHERE review_id = ?1
           ORDER BY created_at, action_id"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![review_str], RawAction::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawAction::into_action).collect()
  }

  // ── Alert log ─────────────────────────────────────────────────────────────

  async fn register_alert(&self, alert: NewAlert) -> Result<bool> {
    let id_str      = encode_uuid(Uuid::new_v4());
    let tenant_str  = encode_uuid(alert.tenant_id);
    let type_str    = alert.alert_type.as_str();
    let review_str  = encode_uuid(alert.review_id);
    let payload_str = alert.payload.to_string();
    let at_str      = encode_dt(Utc::now());

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "INSERT INTO alert_log (
             alert_id, tenant_id, alert_type, review_id, payload, send_status, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, 'pending', ?6)
           ON CONFLICT (tenant_id, alert_type, review_id) DO NOTHING",
          rusqlite::params![id_str, tenant_str, type_str, review_str, payload_str, at_str],
        )?)
      })
      .await?;

    Ok(changed == 1)
  }

  async fn requeue_failed_alerts(
    &self,
    tenant_id:  Uuid,
    alert_type: AlertType,
    review_ids: Vec<Uuid>,
  ) -> Result<usize> {
    if review_ids.is_empty() {
      return Ok(0);
    }

    let tenant_id = encode_uuid(tenant_id);
    let alert_type = alert_type.as_str().to_owned();
    let chunks: Vec<Vec<String>> = review_ids
      .chunks(IN_LIST_CHUNK)
      .map(|chunk| chunk.iter().copied().map(encode_uuid).collect())
      .collect();

    let changed = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut changed = 0;
        for ids in chunks {
          let sql = format!(
            "UPDATE alert_log
             SET send_status = 'pending', send_error = NULL, sent_at = NULL,
                 claimed_by = NULL, claimed_at = NULL
             WHERE tenant_id = ?1 AND alert_type = ?2 AND send_status = 'error'
               AND review_id IN ({})",
            in_list(ids.len(), 2)
          );
          let params = [tenant_id.as_str(), alert_type.as_str()]
            .into_iter()
            .chain(ids.iter().map(String::as_str));
          changed += tx.execute(&sql, rusqlite::params_from_iter(params))?;
        }
        tx.commit()?;
        Ok(changed)
      })
      .await?;
    Ok(changed)
  }

  async fn pending_alerts(
    &self,
    tenant_id:  Uuid,
    alert_type: AlertType,
    review_ids: Vec<Uuid>,
  ) -> Result<Vec<AlertLogEntry>> {
    if review_ids.is_empty() {
      return Ok(Vec::new());
    }

    let mut pending = Vec::new();
    for chunk in review_ids.chunks(IN_LIST_CHUNK) {
      let sql = format!(
        "SELECT {ALERT_COLUMNS} FROM alert_log
         WHERE tenant_id = ?1 AND alert_type = ?2 AND send_status = 'pending'
           AND review_id IN ({})",
        in_list(chunk.len(), 2)
      );
      let mut params = vec![encode_uuid(tenant_id), alert_type.as_str().to_owned()];
      params.extend(chunk.iter().copied().map(encode_uuid));
      pending.extend(self.query_alerts(sql, params).await?);
    }

    pending.sort_by(|a, b| {
      a.created_at
        .cmp(&b.created_at)
        .then_with(|| a.alert_id.cmp(&b.alert_id))
    });
    Ok(pending)
  }

  async fn claim_alert(
    &self,
    alert_id:     Uuid,
    claim:        Uuid,
    claimed_at:   DateTime<Utc>,
    stale_before: DateTime<Utc>,
  ) -> Result<bool> {
    self
      .update_one(
        "UPDATE alert_log SET claimed_by = ?2, claimed_at = ?3
         WHERE alert_id = ?1 AND send_status = 'pending'
           AND (claimed_by IS NULL OR claimed_at < ?4)",
        vec![
          Some(encode_uuid(alert_id)),
          Some(encode_uuid(claim)),
          Some(encode_dt(claimed_at)),
          Some(encode_dt(stale_before)),
        ],
      )
      .await
  }

  async fn mark_alert_sent(&self, alert_id: Uuid, sent_at: DateTime<Utc>) -> Result<bool> {
    self
      .update_one(
        "UPDATE alert_log SET send_status = 'sent', sent_at = ?2, send_error = NULL
         WHERE alert_id = ?1 AND send_status = 'pending'",
        vec![Some(encode_uuid(alert_id)), Some(encode_dt(sent_at))],
      )
      .await
  }

  async fn mark_alert_failed(&self, alert_id: Uuid, error: String) -> Result<bool> {
    self
      .update_one(
        "UPDATE alert_log SET send_status = 'error', send_error = ?2
         WHERE alert_id = ?1 AND send_status = 'pending'",
        vec![Some(encode_uuid(alert_id)), Some(error)],
      )
      .await
  }

  async fn list_alerts(&self, tenant_id: Uuid) -> Result<Vec<AlertLogEntry>> {
    self
      .query_alerts(
        format!(
          "SELECT {ALERT_COLUMNS} FROM alert_log
           WHERE tenant_id = ?1
           ORDER BY created_at, alert_id"
        ),
        vec![encode_uuid(tenant_id)],
      )
      .await
  }
}
