use super::{params_key, validate_stats_days};
use crate::domain::models::{EmotionQuery, EmotionRecord, EmotionStats, NewEmotionRecord, validate_scale};
use crate::infrastructure::api_client::EmotionApi;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::query_cache::{CacheKey, QueryCache, QueryKey};
use std::sync::Arc;

const EMOTION_MUTATION_SCOPES: [QueryKey; 2] = [QueryKey::Emotions, QueryKey::EmotionStats];

pub struct EmotionService<A>
where
    A: EmotionApi,
{
    api: Arc<A>,
    cache: Arc<QueryCache>,
}

impl<A> EmotionService<A>
where
    A: EmotionApi,
{
    pub fn new(api: Arc<A>, cache: Arc<QueryCache>) -> Self {
        Self { api, cache }
    }

    pub async fn create(&self, record: NewEmotionRecord) -> Result<EmotionRecord, InfraError> {
        validate_scale(record.emotion_level, "emotion_level").map_err(InfraError::Validation)?;
        if !record.emotion_type.is_selectable() {
            return Err(InfraError::Validation(format!(
                "unknown emotion type '{}'",
                record.emotion_type
            )));
        }
        let record = NewEmotionRecord {
            note: record
                .note
                .map(|note| note.trim().to_string())
                .filter(|note| !note.is_empty()),
            ..record
        };
        let created = self.api.create_emotion(&record).await?;
        self.cache.invalidate_all(&EMOTION_MUTATION_SCOPES)?;
        Ok(created)
    }

    pub async fn list(&self, query: &EmotionQuery) -> Result<Vec<EmotionRecord>, InfraError> {
        let key = CacheKey::with_params(QueryKey::Emotions, params_key(&query.to_pairs()));
        let api = Arc::clone(&self.api);
        let query = query.clone();
        self.cache
            .get_or_fetch(key, || async move { api.list_emotions(&query).await })
            .await
    }

    pub async fn stats(&self, days: u32) -> Result<EmotionStats, InfraError> {
        let days = validate_stats_days(days)?;
        let api = Arc::clone(&self.api);
        self.cache
            .get_or_fetch(
                CacheKey::with_params(QueryKey::EmotionStats, format!("days={days}")),
                || async move { api.emotion_stats(days).await },
            )
            .await
    }

    pub async fn delete(&self, emotion_id: &str) -> Result<(), InfraError> {
        self.api.delete_emotion(emotion_id).await?;
        self.cache.invalidate_all(&EMOTION_MUTATION_SCOPES)?;
        Ok(())
    }
}
