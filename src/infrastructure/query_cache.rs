use crate::infrastructure::error::InfraError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKey {
    CurrentUser,
    Emotions,
    EmotionStats,
    FocusSessions,
    CurrentFocusSession,
    FocusStats,
    Todos,
    TodoStats,
    AiSettings,
    AiFeedbacks,
}

impl QueryKey {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CurrentUser => "currentUser",
            Self::Emotions => "emotions",
            Self::EmotionStats => "emotionStats",
            Self::FocusSessions => "focusSessions",
            Self::CurrentFocusSession => "currentFocusSession",
            Self::FocusStats => "focusStats",
            Self::Todos => "todos",
            Self::TodoStats => "todoStats",
            Self::AiSettings => "aiSettings",
            Self::AiFeedbacks => "aiFeedbacks",
        }
    }
}

/// A scope plus the query parameters that distinguish entries inside it
/// (`days=30`, `completed=false`, ...). Invalidation drops a whole scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub scope: QueryKey,
    pub params: String,
}

impl CacheKey {
    pub fn new(scope: QueryKey) -> Self {
        Self {
            scope,
            params: String::new(),
        }
    }

    pub fn with_params(scope: QueryKey, params: impl Into<String>) -> Self {
        Self {
            scope,
            params: params.into(),
        }
    }
}

#[derive(Debug, Default)]
pub struct QueryCache {
    entries: Mutex<HashMap<CacheKey, serde_json::Value>>,
}

impl QueryCache {
    fn lock(&self) -> Result<MutexGuard<'_, HashMap<CacheKey, serde_json::Value>>, InfraError> {
        self.entries
            .lock()
            .map_err(|error| InfraError::Cache(format!("lock poisoned: {error}")))
    }

    pub fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Result<Option<T>, InfraError> {
        let entries = self.lock()?;
        match entries.get(key) {
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
            None => Ok(None),
        }
    }

    pub fn put<T: Serialize>(&self, key: CacheKey, value: &T) -> Result<(), InfraError> {
        let encoded = serde_json::to_value(value)?;
        self.lock()?.insert(key, encoded);
        Ok(())
    }

    pub fn invalidate(&self, scope: QueryKey) -> Result<(), InfraError> {
        self.lock()?.retain(|key, _| key.scope != scope);
        Ok(())
    }

    pub fn invalidate_all(&self, scopes: &[QueryKey]) -> Result<(), InfraError> {
        self.lock()?.retain(|key, _| !scopes.contains(&key.scope));
        Ok(())
    }

    pub fn clear(&self) -> Result<(), InfraError> {
        self.lock()?.clear();
        Ok(())
    }

    pub fn contains(&self, key: &CacheKey) -> Result<bool, InfraError> {
        Ok(self.lock()?.contains_key(key))
    }

    /// Returns the cached value or runs `fetch` and stores its result. The
    /// lock is not held across the fetch, so concurrent misses both fetch.
    pub async fn get_or_fetch<T, F, Fut>(&self, key: CacheKey, fetch: F) -> Result<T, InfraError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, InfraError>>,
    {
        if let Some(cached) = self.get::<T>(&key)? {
            return Ok(cached);
        }
        let fresh = fetch().await?;
        self.put(key, &fresh)?;
        Ok(fresh)
    }
}
