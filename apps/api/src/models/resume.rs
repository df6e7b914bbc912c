use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ResumeRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub jd_text: String,
    /// Generated sections as structured JSON (summary, bullets, keywords).
    pub content: Value,
    pub is_demo: bool,
    pub status: String,
    pub created_at: DateTime<Utc>,
}
