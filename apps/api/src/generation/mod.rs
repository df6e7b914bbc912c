pub mod fallback;
pub mod gate;
pub mod handlers;
pub mod pipeline;
pub mod prompts;
pub mod store;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// Generated resume sections. Persisted as the resume row's JSON content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResumeContent {
    pub summary: String,
    pub keywords: Vec<String>,
    pub bullets: Vec<String>,
}

/// Output of a generation backend. `degraded` marks fallback content so it
/// is never silently presented as AI-personalized.
#[derive(Debug, Clone)]
pub struct GeneratedResume {
    pub content: ResumeContent,
    pub degraded: bool,
}

/// Generation backend seam. The gate treats generation as opaque: it only
/// cares that this either succeeds or fails before any credit is spent.
#[async_trait]
pub trait ResumeGenerator: Send + Sync {
    async fn generate(&self, jd_text: &str) -> Result<GeneratedResume, AppError>;
}
