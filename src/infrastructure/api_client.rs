use crate::domain::models::{
    AiFeedback, AiSettings, AiSettingsPatch, ApiKeyTestResult, AuthTokens, EmotionQuery,
    EmotionRecord, EmotionStats, EndFocusSession, FocusSession, FocusStats, GeneratedFeedback,
    LoginRequest, MessageResponse, NewEmotionRecord, NewFocusSession, NewTodoItem,
    RefreshRequest, RegisterRequest, SessionQuery, TodoItem, TodoPatch, TodoStats, User,
};
use crate::infrastructure::credential_store::CredentialStore;
use crate::infrastructure::error::InfraError;
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

const API_VERSION_SEGMENT: &str = "v1";

#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn login(&self, request: &LoginRequest) -> Result<AuthTokens, InfraError>;
    async fn register(&self, request: &RegisterRequest) -> Result<User, InfraError>;
    async fn current_user(&self) -> Result<User, InfraError>;
    async fn refresh(&self, refresh_token: &str) -> Result<AuthTokens, InfraError>;
}

#[async_trait]
pub trait EmotionApi: Send + Sync {
    async fn create_emotion(&self, record: &NewEmotionRecord) -> Result<EmotionRecord, InfraError>;
    async fn list_emotions(&self, query: &EmotionQuery) -> Result<Vec<EmotionRecord>, InfraError>;
    async fn emotion_stats(&self, days: u32) -> Result<EmotionStats, InfraError>;
    async fn delete_emotion(&self, emotion_id: &str) -> Result<(), InfraError>;
}

#[async_trait]
pub trait FocusApi: Send + Sync {
    async fn start_session(&self, session: &NewFocusSession) -> Result<FocusSession, InfraError>;
    async fn current_session(&self) -> Result<Option<FocusSession>, InfraError>;
    async fn end_session(
        &self,
        session_id: &str,
        review: &EndFocusSession,
    ) -> Result<FocusSession, InfraError>;
    async fn list_sessions(&self, query: &SessionQuery) -> Result<Vec<FocusSession>, InfraError>;
    async fn focus_stats(&self, days: u32) -> Result<FocusStats, InfraError>;
}

#[async_trait]
pub trait TodoApi: Send + Sync {
    async fn create_todo(&self, todo: &NewTodoItem) -> Result<TodoItem, InfraError>;
    async fn list_todos(&self, completed: Option<bool>) -> Result<Vec<TodoItem>, InfraError>;
    async fn update_todo(&self, todo_id: &str, patch: &TodoPatch) -> Result<TodoItem, InfraError>;
    async fn delete_todo(&self, todo_id: &str) -> Result<(), InfraError>;
    async fn todo_stats(&self) -> Result<TodoStats, InfraError>;
}

#[async_trait]
pub trait AiApi: Send + Sync {
    async fn ai_settings(&self) -> Result<AiSettings, InfraError>;
    async fn update_ai_settings(&self, patch: &AiSettingsPatch) -> Result<MessageResponse, InfraError>;
    async fn test_api_key(&self, api_key: &str) -> Result<ApiKeyTestResult, InfraError>;
    async fn generate_feedback(&self, feedback_type: &str) -> Result<GeneratedFeedback, InfraError>;
    async fn feedbacks(&self, limit: u32) -> Result<Vec<AiFeedback>, InfraError>;
}

#[derive(Debug)]
struct ApiRequest {
    method: Method,
    segments: Vec<String>,
    query: Vec<(&'static str, String)>,
    body: Option<serde_json::Value>,
    authenticated: bool,
}

impl ApiRequest {
    fn new(method: Method, segments: &[&str]) -> Self {
        Self {
            method,
            segments: segments.iter().map(|segment| (*segment).to_string()).collect(),
            query: Vec::new(),
            body: None,
            authenticated: true,
        }
    }

    fn get(segments: &[&str]) -> Self {
        Self::new(Method::GET, segments)
    }

    fn post(segments: &[&str]) -> Self {
        Self::new(Method::POST, segments)
    }

    fn put(segments: &[&str]) -> Self {
        Self::new(Method::PUT, segments)
    }

    fn delete(segments: &[&str]) -> Self {
        Self::new(Method::DELETE, segments)
    }

    fn anonymous(mut self) -> Self {
        self.authenticated = false;
        self
    }

    fn query(mut self, pairs: Vec<(&'static str, String)>) -> Self {
        self.query.extend(pairs);
        self
    }

    fn json<T: Serialize>(mut self, body: &T) -> Result<Self, InfraError> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    fn path(&self) -> String {
        format!("/{}/{}", API_VERSION_SEGMENT, self.segments.join("/"))
    }
}

/// HTTP client for the `/v1` REST API. Attaches the stored bearer token and,
/// on a 401, refreshes it once and replays the request.
#[derive(Clone)]
pub struct ReqwestApiClient {
    client: Client,
    base_url: Url,
    credential_store: Arc<dyn CredentialStore>,
}

impl ReqwestApiClient {
    pub fn new(base_url: &str, credential_store: Arc<dyn CredentialStore>) -> Result<Self, InfraError> {
        Self::ensure_non_empty(base_url, "api base url")?;
        let base_url = Url::parse(base_url.trim())
            .map_err(|error| InfraError::InvalidConfig(format!("invalid api base url: {error}")))?;
        if base_url.cannot_be_a_base() {
            return Err(InfraError::InvalidConfig(format!(
                "api base url cannot be a base: {base_url}"
            )));
        }
        Ok(Self {
            client: Client::new(),
            base_url,
            credential_store,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn ensure_non_empty(value: &str, field: &str) -> Result<(), InfraError> {
        if value.trim().is_empty() {
            return Err(InfraError::Validation(format!("{field} must not be empty")));
        }
        Ok(())
    }

    fn endpoint(&self, segments: &[String]) -> Result<Url, InfraError> {
        let mut url = self.base_url.clone();
        {
            let mut path = url.path_segments_mut().map_err(|_| {
                InfraError::InvalidConfig("api base url cannot be a base".to_string())
            })?;
            path.pop_if_empty();
            path.push(API_VERSION_SEGMENT);
            for segment in segments {
                path.push(segment);
            }
        }
        Ok(url)
    }

    async fn send_once(
        &self,
        request: &ApiRequest,
        access_token: Option<&str>,
    ) -> Result<(StatusCode, String), InfraError> {
        let url = self.endpoint(&request.segments)?;
        let mut builder = self.client.request(request.method.clone(), url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = request.body.as_ref() {
            builder = builder.json(body);
        }
        if let Some(token) = access_token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await.map_err(|error| {
            InfraError::Network(format!("{} {}: {error}", request.method, request.path()))
        })?;
        let status = response.status();
        let body = response.text().await.map_err(|error| {
            InfraError::Network(format!(
                "failed reading response of {} {}: {error}",
                request.method,
                request.path()
            ))
        })?;
        debug!(method = %request.method, path = %request.path(), status = status.as_u16(), "api response");
        Ok((status, body))
    }

    async fn execute<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, InfraError> {
        let access_token = if request.authenticated {
            Some(self.credential_store.access_token()?.ok_or_else(|| {
                InfraError::Unauthorized("not signed in".to_string())
            })?)
        } else {
            None
        };

        let (mut status, mut body) = self.send_once(&request, access_token.as_deref()).await?;
        if status == StatusCode::UNAUTHORIZED && request.authenticated {
            if let Some(refreshed) = self.try_refresh().await? {
                (status, body) = self.send_once(&request, Some(&refreshed)).await?;
            }
        }

        if !status.is_success() {
            return Err(http_error(status, &body));
        }
        decode_body(&body)
    }

    /// Exchanges the stored refresh token for a new access token. `None` when
    /// there is nothing to refresh with or the server refused.
    async fn try_refresh(&self) -> Result<Option<String>, InfraError> {
        let Some(stored) = self.credential_store.load_tokens()? else {
            return Ok(None);
        };
        let Some(refresh_token) = stored
            .refresh_token
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
        else {
            return Ok(None);
        };

        match AuthApi::refresh(self, refresh_token).await {
            Ok(tokens) => {
                let merged = tokens.merged_with(&stored);
                self.credential_store.save_tokens(&merged)?;
                debug!("access token refreshed");
                Ok(Some(merged.access_token))
            }
            Err(error) => {
                warn!(error = %error, "token refresh failed");
                Ok(None)
            }
        }
    }
}

fn decode_body<T: DeserializeOwned>(body: &str) -> Result<T, InfraError> {
    let trimmed = body.trim();
    let payload = if trimmed.is_empty() { "null" } else { trimmed };
    Ok(serde_json::from_str(payload)?)
}

pub(crate) fn http_error(status: StatusCode, body: &str) -> InfraError {
    let detail = extract_detail(status, body);
    if status == StatusCode::UNAUTHORIZED {
        return InfraError::Unauthorized(detail);
    }
    InfraError::Http {
        status: status.as_u16(),
        detail,
    }
}

/// Reads the server's `detail` field: a string, or a list of validation
/// entries whose `msg` values are joined with `; `.
pub(crate) fn extract_detail(status: StatusCode, body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return format!("http {}", status.as_u16());
    }
    let Ok(serde_json::Value::Object(object)) = serde_json::from_str::<serde_json::Value>(trimmed)
    else {
        return trimmed.to_string();
    };
    match object.get("detail") {
        Some(serde_json::Value::String(detail)) => detail.clone(),
        Some(serde_json::Value::Array(items)) if !items.is_empty() => items
            .iter()
            .map(|item| {
                item.get("msg")
                    .and_then(serde_json::Value::as_str)
                    .map(ToOwned::to_owned)
                    .unwrap_or_else(|| item.to_string())
            })
            .collect::<Vec<_>>()
            .join("; "),
        Some(other) if !other.is_null() => other.to_string(),
        _ => trimmed.to_string(),
    }
}

#[async_trait]
impl AuthApi for ReqwestApiClient {
    async fn login(&self, request: &LoginRequest) -> Result<AuthTokens, InfraError> {
        Self::ensure_non_empty(&request.email, "email")?;
        self.execute(ApiRequest::post(&["auth", "login"]).anonymous().json(request)?)
            .await
    }

    async fn register(&self, request: &RegisterRequest) -> Result<User, InfraError> {
        Self::ensure_non_empty(&request.email, "email")?;
        self.execute(ApiRequest::post(&["auth", "register"]).anonymous().json(request)?)
            .await
    }

    async fn current_user(&self) -> Result<User, InfraError> {
        self.execute(ApiRequest::get(&["auth", "me"])).await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AuthTokens, InfraError> {
        Self::ensure_non_empty(refresh_token, "refresh token")?;
        let body = RefreshRequest {
            refresh_token: refresh_token.to_string(),
        };
        self.execute(ApiRequest::post(&["auth", "refresh"]).anonymous().json(&body)?)
            .await
    }
}

#[async_trait]
impl EmotionApi for ReqwestApiClient {
    async fn create_emotion(&self, record: &NewEmotionRecord) -> Result<EmotionRecord, InfraError> {
        self.execute(ApiRequest::post(&["emotions"]).json(record)?).await
    }

    async fn list_emotions(&self, query: &EmotionQuery) -> Result<Vec<EmotionRecord>, InfraError> {
        self.execute(ApiRequest::get(&["emotions"]).query(query.to_pairs()))
            .await
    }

    async fn emotion_stats(&self, days: u32) -> Result<EmotionStats, InfraError> {
        self.execute(
            ApiRequest::get(&["emotions", "stats", "summary"]).query(vec![("days", days.to_string())]),
        )
        .await
    }

    async fn delete_emotion(&self, emotion_id: &str) -> Result<(), InfraError> {
        Self::ensure_non_empty(emotion_id, "emotion id")?;
        let _: serde_json::Value = self
            .execute(ApiRequest::delete(&["emotions", emotion_id.trim()]))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl FocusApi for ReqwestApiClient {
    async fn start_session(&self, session: &NewFocusSession) -> Result<FocusSession, InfraError> {
        self.execute(ApiRequest::post(&["focus"]).json(session)?).await
    }

    async fn current_session(&self) -> Result<Option<FocusSession>, InfraError> {
        self.execute(ApiRequest::get(&["focus", "current"])).await
    }

    async fn end_session(
        &self,
        session_id: &str,
        review: &EndFocusSession,
    ) -> Result<FocusSession, InfraError> {
        Self::ensure_non_empty(session_id, "session id")?;
        self.execute(ApiRequest::put(&["focus", session_id.trim(), "end"]).json(review)?)
            .await
    }

    async fn list_sessions(&self, query: &SessionQuery) -> Result<Vec<FocusSession>, InfraError> {
        self.execute(ApiRequest::get(&["focus"]).query(query.to_pairs()))
            .await
    }

    async fn focus_stats(&self, days: u32) -> Result<FocusStats, InfraError> {
        self.execute(
            ApiRequest::get(&["focus", "stats", "summary"]).query(vec![("days", days.to_string())]),
        )
        .await
    }
}

#[async_trait]
impl TodoApi for ReqwestApiClient {
    async fn create_todo(&self, todo: &NewTodoItem) -> Result<TodoItem, InfraError> {
        self.execute(ApiRequest::post(&["todos"]).json(todo)?).await
    }

    async fn list_todos(&self, completed: Option<bool>) -> Result<Vec<TodoItem>, InfraError> {
        let query = completed
            .map(|value| vec![("completed", value.to_string())])
            .unwrap_or_default();
        self.execute(ApiRequest::get(&["todos"]).query(query)).await
    }

    async fn update_todo(&self, todo_id: &str, patch: &TodoPatch) -> Result<TodoItem, InfraError> {
        Self::ensure_non_empty(todo_id, "todo id")?;
        self.execute(ApiRequest::put(&["todos", todo_id.trim()]).json(patch)?)
            .await
    }

    async fn delete_todo(&self, todo_id: &str) -> Result<(), InfraError> {
        Self::ensure_non_empty(todo_id, "todo id")?;
        let _: serde_json::Value = self
            .execute(ApiRequest::delete(&["todos", todo_id.trim()]))
            .await?;
        Ok(())
    }

    async fn todo_stats(&self) -> Result<TodoStats, InfraError> {
        self.execute(ApiRequest::get(&["todos", "stats", "summary"]))
            .await
    }
}

#[async_trait]
impl AiApi for ReqwestApiClient {
    async fn ai_settings(&self) -> Result<AiSettings, InfraError> {
        self.execute(ApiRequest::get(&["ai", "settings"])).await
    }

    async fn update_ai_settings(&self, patch: &AiSettingsPatch) -> Result<MessageResponse, InfraError> {
        self.execute(ApiRequest::post(&["ai", "settings"]).json(patch)?)
            .await
    }

    async fn test_api_key(&self, api_key: &str) -> Result<ApiKeyTestResult, InfraError> {
        Self::ensure_non_empty(api_key, "api key")?;
        self.execute(
            ApiRequest::post(&["ai", "test-api-key"]).query(vec![("api_key", api_key.trim().to_string())]),
        )
        .await
    }

    async fn generate_feedback(&self, feedback_type: &str) -> Result<GeneratedFeedback, InfraError> {
        Self::ensure_non_empty(feedback_type, "feedback type")?;
        self.execute(
            ApiRequest::post(&["ai", "generate-feedback"])
                .query(vec![("feedback_type", feedback_type.trim().to_string())]),
        )
        .await
    }

    async fn feedbacks(&self, limit: u32) -> Result<Vec<AiFeedback>, InfraError> {
        self.execute(ApiRequest::get(&["ai", "feedbacks"]).query(vec![("limit", limit.to_string())]))
            .await
    }
}
