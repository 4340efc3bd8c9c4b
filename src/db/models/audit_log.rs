use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A minimal best-effort audit trail entry written by the Dispatcher on
/// ingress. Query surfaces over this table belong to the admin UI and are
/// out of scope here.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: String,
    pub action: String,
    pub entity_id: String,
    pub created_at: DateTime<Utc>,
}
