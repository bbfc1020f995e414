use crate::domain::models::{
    AiFeedback, AiSettings, AiSettingsPatch, ApiKeyTestResult, GeneratedFeedback, MessageResponse,
};
use crate::infrastructure::api_client::AiApi;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::query_cache::{CacheKey, QueryCache, QueryKey};
use std::sync::Arc;

pub const DEFAULT_FEEDBACK_TYPE: &str = "daily_summary";
pub const DEFAULT_FEEDBACK_LIMIT: u32 = 10;
const MAX_FEEDBACK_LIMIT: u32 = 100;

pub struct AiService<A>
where
    A: AiApi,
{
    api: Arc<A>,
    cache: Arc<QueryCache>,
}

impl<A> AiService<A>
where
    A: AiApi,
{
    pub fn new(api: Arc<A>, cache: Arc<QueryCache>) -> Self {
        Self { api, cache }
    }

    pub async fn settings(&self) -> Result<AiSettings, InfraError> {
        let api = Arc::clone(&self.api);
        self.cache
            .get_or_fetch(CacheKey::new(QueryKey::AiSettings), || async move {
                api.ai_settings().await
            })
            .await
    }

    pub async fn update_settings(&self, patch: AiSettingsPatch) -> Result<MessageResponse, InfraError> {
        let patch = AiSettingsPatch {
            openai_api_key: patch
                .openai_api_key
                .map(|key| key.trim().to_string())
                .filter(|key| !key.is_empty()),
            ..patch
        };
        if patch == AiSettingsPatch::default() {
            return Err(InfraError::Validation(
                "settings update must change at least one field".to_string(),
            ));
        }
        let response = self.api.update_ai_settings(&patch).await?;
        self.cache.invalidate(QueryKey::AiSettings)?;
        Ok(response)
    }

    pub async fn test_api_key(&self, api_key: &str) -> Result<ApiKeyTestResult, InfraError> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(InfraError::Validation("api key must not be empty".to_string()));
        }
        self.api.test_api_key(api_key).await
    }

    pub async fn generate_feedback(
        &self,
        feedback_type: Option<&str>,
    ) -> Result<GeneratedFeedback, InfraError> {
        let feedback_type = feedback_type
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(DEFAULT_FEEDBACK_TYPE);
        let generated = self.api.generate_feedback(feedback_type).await?;
        self.cache.invalidate(QueryKey::AiFeedbacks)?;
        Ok(generated)
    }

    pub async fn feedbacks(&self, limit: u32) -> Result<Vec<AiFeedback>, InfraError> {
        if !(1..=MAX_FEEDBACK_LIMIT).contains(&limit) {
            return Err(InfraError::Validation(format!(
                "limit must be between 1 and {MAX_FEEDBACK_LIMIT}"
            )));
        }
        let api = Arc::clone(&self.api);
        self.cache
            .get_or_fetch(
                CacheKey::with_params(QueryKey::AiFeedbacks, format!("limit={limit}")),
                || async move { api.feedbacks(limit).await },
            )
            .await
    }
}
