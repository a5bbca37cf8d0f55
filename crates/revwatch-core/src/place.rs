//! Place: an external listing monitored on behalf of a tenant.
//!
//! Place CRUD lives outside this workspace; the pipeline only reads the
//! active set at the start of every run.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A monitored listing. `place_id` is the identifier understood by the
/// review source (e.g. a maps listing id), not a store-assigned key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Place {
  pub tenant_id:    Uuid,
  pub place_id:     String,
  pub display_name: String,
  pub is_active:    bool,
}
