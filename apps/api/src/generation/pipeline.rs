//! LLM generation pipeline: keyword extraction, then tailored content.
//!
//! Aggregator failures degrade to the static fallback rather than failing
//! the request; the result is flagged `degraded` so the caller can label it.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, warn};

use crate::errors::AppError;
use crate::generation::fallback::demo_content;
use crate::generation::prompts::{
    GENERATION_PROMPT_TEMPLATE, GENERATION_SYSTEM, KEYWORD_PROMPT_TEMPLATE, KEYWORD_SYSTEM,
};
use crate::generation::{GeneratedResume, ResumeContent, ResumeGenerator};
use crate::llm_client::LlmClient;

const MAX_KEYWORDS: usize = 15;

#[derive(Debug, Deserialize)]
struct ContentDraft {
    summary: String,
    bullets: Vec<String>,
}

/// Production generator over the LLM aggregator.
pub struct LlmGenerator {
    llm: LlmClient,
}

impl LlmGenerator {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }

    async fn run_pipeline(&self, jd_text: &str) -> Result<ResumeContent, AppError> {
        // Step 1: keyword extraction
        let keyword_prompt = KEYWORD_PROMPT_TEMPLATE.replace("{jd_text}", jd_text);
        let mut keywords: Vec<String> = self
            .llm
            .call_json(&keyword_prompt, KEYWORD_SYSTEM)
            .await
            .map_err(|e| AppError::ExternalService(format!("Keyword extraction failed: {e}")))?;
        keywords.truncate(MAX_KEYWORDS);
        info!("Extracted {} keywords from JD", keywords.len());

        // Step 2: summary + bullets referencing those keywords
        let keywords_json = serde_json::to_string(&keywords)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to serialize keywords: {e}")))?;
        let generation_prompt = GENERATION_PROMPT_TEMPLATE
            .replace("{keywords_json}", &keywords_json)
            .replace("{jd_text}", jd_text);

        let draft: ContentDraft = self
            .llm
            .call_json(&generation_prompt, GENERATION_SYSTEM)
            .await
            .map_err(|e| AppError::ExternalService(format!("Content generation failed: {e}")))?;

        if draft.summary.trim().is_empty() || draft.bullets.is_empty() {
            return Err(AppError::ExternalService(
                "LLM returned empty resume content".to_string(),
            ));
        }

        Ok(ResumeContent {
            summary: draft.summary,
            keywords,
            bullets: draft.bullets,
        })
    }
}

#[async_trait]
impl ResumeGenerator for LlmGenerator {
    async fn generate(&self, jd_text: &str) -> Result<GeneratedResume, AppError> {
        match self.run_pipeline(jd_text).await {
            Ok(content) => Ok(GeneratedResume {
                content,
                degraded: false,
            }),
            Err(AppError::ExternalService(msg)) => {
                // Aggregator unavailable: degrade to labeled fallback content
                // instead of failing the whole request.
                warn!("Generation degraded to fallback: {msg}");
                Ok(GeneratedResume {
                    content: demo_content(),
                    degraded: true,
                })
            }
            Err(e) => Err(e),
        }
    }
}
