use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct MessageTemplate {
    pub id: String,
    pub code: String,
    pub name: String,
    pub channel: String,
    pub subject_template: Option<String>,
    pub body_template: String,
    /// JSON-encoded ordered array of required variable names.
    pub variables: String,
    pub active: bool,
}

impl MessageTemplate {
    pub fn variables(&self) -> Vec<String> {
        serde_json::from_str(&self.variables).unwrap_or_default()
    }
}
