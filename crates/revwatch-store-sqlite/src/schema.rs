//! SQL schema for the revwatch SQLite store.
//!
//! Migrations are applied in order at connection startup, each in its own
//! transaction, and the applied count is recorded in `PRAGMA user_version`.
//! Never edit a shipped migration; append a new one.

/// Connection-level settings; run on every open, outside any transaction.
pub const PRAGMAS: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;
PRAGMA busy_timeout = 5000;
";

/// Ordered migrations. `user_version = n` means the first `n` are applied.
pub const MIGRATIONS: &[&str] = &[V1_BASE, V2_ALERT_CLAIMS];

const V1_BASE: &str = "
CREATE TABLE places (
    tenant_id    TEXT NOT NULL,
    place_id     TEXT NOT NULL,
    display_name TEXT NOT NULL,
    is_active    INTEGER NOT NULL DEFAULT 1,
    PRIMARY KEY (tenant_id, place_id)
);

CREATE TABLE alert_settings (
    tenant_id        TEXT PRIMARY KEY,
    enabled          INTEGER NOT NULL DEFAULT 1,
    rating_max       INTEGER NOT NULL DEFAULT 3,
    notify_email     TEXT,
    cooldown_minutes INTEGER NOT NULL DEFAULT 60
);

-- Reviews are never deleted. ingested_at is written by the INSERT arm of the
-- upsert only; the UPDATE arm must not mention it, nor is_critical.
CREATE TABLE reviews (
    review_id          TEXT PRIMARY KEY,
    tenant_id          TEXT NOT NULL,
    place_id           TEXT NOT NULL,
    external_review_id TEXT NOT NULL,
    author_name        TEXT,
    rating             INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 5),
    comment            TEXT,
    published_at       TEXT,
    is_critical        INTEGER NOT NULL,
    status             TEXT NOT NULL DEFAULT 'new',
    ingested_at        TEXT NOT NULL,   -- fixed-width RFC 3339 UTC
    last_seen_at       TEXT NOT NULL,
    raw_payload        TEXT NOT NULL DEFAULT '{}',
    UNIQUE (tenant_id, place_id, external_review_id)
);

-- One row per distinct content state.
CREATE TABLE review_versions (
    version_id   TEXT PRIMARY KEY,
    tenant_id    TEXT NOT NULL,
    review_id    TEXT NOT NULL REFERENCES reviews(review_id),
    content_hash TEXT NOT NULL,
    snapshot     TEXT NOT NULL,
    created_at   TEXT NOT NULL,
    UNIQUE (review_id, content_hash)
);

-- Append-only audit trail. No UPDATE or DELETE is ever issued against it.
CREATE TABLE review_actions (
    action_id   TEXT PRIMARY KEY,
    tenant_id   TEXT NOT NULL,
    review_id   TEXT NOT NULL REFERENCES reviews(review_id),
    action_type TEXT NOT NULL,
    payload     TEXT NOT NULL DEFAULT '{}',
    created_by  TEXT NOT NULL,
    created_at  TEXT NOT NULL
);

-- At most one ingested_critical action per review, even across overlapping runs.
CREATE UNIQUE INDEX review_actions_ingested_critical_uq
    ON review_actions(review_id) WHERE action_type = 'ingested_critical';

CREATE TABLE alert_log (
    alert_id    TEXT PRIMARY KEY,
    tenant_id   TEXT NOT NULL,
    alert_type  TEXT NOT NULL,
    review_id   TEXT NOT NULL REFERENCES reviews(review_id),
    payload     TEXT NOT NULL DEFAULT '{}',
    send_status TEXT NOT NULL DEFAULT 'pending'
                CHECK (send_status IN ('pending', 'sent', 'error')),
    created_at  TEXT NOT NULL,
    sent_at     TEXT,
    send_error  TEXT,
    UNIQUE (tenant_id, alert_type, review_id)
);

CREATE INDEX reviews_tenant_ingested_idx ON reviews(tenant_id, ingested_at);
CREATE INDEX review_versions_review_idx  ON review_versions(review_id, created_at);
CREATE INDEX review_actions_review_idx   ON review_actions(review_id, created_at);
CREATE INDEX places_active_idx           ON places(is_active, tenant_id);
";

const V2_ALERT_CLAIMS: &str = "
ALTER TABLE alert_log      ADD COLUMN claimed_by TEXT;
ALTER TABLE alert_log      ADD COLUMN claimed_at TEXT;
ALTER TABLE alert_settings ADD COLUMN retry_failed INTEGER NOT NULL DEFAULT 0;
";
