//! The revwatch pipeline: per-tenant ingestion runs and alert evaluation,
//! written against the `revwatch-core` seams only.

pub mod alert;
pub mod error;
pub mod ingest;
pub mod runner;

pub use alert::{AlertEvaluator, AlertReport};
pub use error::{ConnectorError, Result, RunError, Stage};
pub use ingest::{BackfillReport, IngestConfig, IngestReport, IngestionEngine, Rejection};
pub use runner::{BackfillRun, EngineConfig, Runner, ScheduledRun, TenantRun, TenantSummary};
