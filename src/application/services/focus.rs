use super::{NowProvider, params_key, system_now, validate_stats_days};
use crate::domain::models::{
    EndFocusSession, FocusSession, FocusStats, NewFocusSession, SessionQuery, SessionType,
};
use crate::domain::timer::TimerPreset;
use crate::infrastructure::api_client::FocusApi;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::query_cache::{CacheKey, QueryCache, QueryKey};
use std::sync::Arc;

pub const DEFAULT_SESSION_MINUTES: u32 = 25;

const FOCUS_MUTATION_SCOPES: [QueryKey; 3] = [
    QueryKey::CurrentFocusSession,
    QueryKey::FocusSessions,
    QueryKey::FocusStats,
];

pub struct FocusService<A>
where
    A: FocusApi,
{
    api: Arc<A>,
    cache: Arc<QueryCache>,
    now_provider: NowProvider,
}

impl<A> Clone for FocusService<A>
where
    A: FocusApi,
{
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
            cache: Arc::clone(&self.cache),
            now_provider: Arc::clone(&self.now_provider),
        }
    }
}

impl<A> FocusService<A>
where
    A: FocusApi,
{
    pub fn new(api: Arc<A>, cache: Arc<QueryCache>) -> Self {
        Self {
            api,
            cache,
            now_provider: system_now(),
        }
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    /// Opens a server-side session starting now.
    pub async fn start(
        &self,
        duration_minutes: u32,
        session_type: SessionType,
    ) -> Result<FocusSession, InfraError> {
        if duration_minutes == 0 {
            return Err(InfraError::Validation(
                "duration_minutes must be at least 1".to_string(),
            ));
        }
        let request = NewFocusSession {
            duration_minutes,
            session_type,
            start_time: (self.now_provider)(),
        };
        let created = self.api.start_session(&request).await?;
        self.cache.invalidate_all(&FOCUS_MUTATION_SCOPES)?;
        Ok(created)
    }

    pub async fn start_preset(&self, preset: TimerPreset) -> Result<FocusSession, InfraError> {
        self.start(preset.duration_minutes, preset.session_type).await
    }

    pub async fn current(&self) -> Result<Option<FocusSession>, InfraError> {
        let api = Arc::clone(&self.api);
        self.cache
            .get_or_fetch(CacheKey::new(QueryKey::CurrentFocusSession), || async move {
                api.current_session().await
            })
            .await
    }

    /// Bypasses the cache and stores whatever the server reports now.
    pub async fn refresh_current(&self) -> Result<Option<FocusSession>, InfraError> {
        let current = self.api.current_session().await?;
        self.cache
            .put(CacheKey::new(QueryKey::CurrentFocusSession), &current)?;
        Ok(current)
    }

    pub async fn end(
        &self,
        session_id: &str,
        review: &EndFocusSession,
    ) -> Result<FocusSession, InfraError> {
        review.validate().map_err(InfraError::Validation)?;
        let ended = self.api.end_session(session_id, review).await?;
        self.cache.invalidate_all(&FOCUS_MUTATION_SCOPES)?;
        Ok(ended)
    }

    pub async fn list(&self, query: &SessionQuery) -> Result<Vec<FocusSession>, InfraError> {
        let key = CacheKey::with_params(QueryKey::FocusSessions, params_key(&query.to_pairs()));
        let api = Arc::clone(&self.api);
        let query = query.clone();
        self.cache
            .get_or_fetch(key, || async move { api.list_sessions(&query).await })
            .await
    }

    pub async fn stats(&self, days: u32) -> Result<FocusStats, InfraError> {
        let days = validate_stats_days(days)?;
        let api = Arc::clone(&self.api);
        self.cache
            .get_or_fetch(
                CacheKey::with_params(QueryKey::FocusStats, format!("days={days}")),
                || async move { api.focus_stats(days).await },
            )
            .await
    }
}
