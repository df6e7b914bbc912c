//! Resume persistence seam.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::generation::ResumeContent;
use crate::models::resume::ResumeRow;

/// New resume to persist. `is_demo` covers both requested demo runs and
/// degraded fallback output.
#[derive(Debug, Clone)]
pub struct NewResume {
    pub id: Uuid,
    pub user_id: Uuid,
    pub jd_text: String,
    pub content: ResumeContent,
    pub is_demo: bool,
}

#[async_trait]
pub trait ResumeStore: Send + Sync {
    async fn save(&self, resume: &NewResume) -> Result<(), AppError>;
    async fn find_for_user(
        &self,
        resume_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<ResumeRow>, AppError>;
}

#[derive(Clone)]
pub struct PgResumeStore {
    pool: PgPool,
}

impl PgResumeStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResumeStore for PgResumeStore {
    async fn save(&self, resume: &NewResume) -> Result<(), AppError> {
        let content = serde_json::to_value(&resume.content)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to serialize content: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO resumes (id, user_id, jd_text, content, is_demo, status)
            VALUES ($1, $2, $3, $4, $5, 'generated')
            "#,
        )
        .bind(resume.id)
        .bind(resume.user_id)
        .bind(&resume.jd_text)
        .bind(&content)
        .bind(resume.is_demo)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Owner-scoped lookup. A resume belonging to another user is simply
    /// absent from the caller's perspective.
    async fn find_for_user(
        &self,
        resume_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<ResumeRow>, AppError> {
        Ok(
            sqlx::query_as::<_, ResumeRow>(
                "SELECT * FROM resumes WHERE id = $1 AND user_id = $2",
            )
            .bind(resume_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?,
        )
    }
}
