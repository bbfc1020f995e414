use crate::application::auth_store::{AuthState, AuthStore};
use crate::application::bootstrap::BootstrapResult;
use crate::application::focus_timer::{
    CurrentSessionPoller, FocusTimerController, RunOutcome, SessionReviewer, TimerCommand,
};
use crate::application::forms::{
    AiSettingsForm, EmotionForm, RegistrationForm, SessionReviewForm, TodoForm,
};
use crate::application::services::{
    AiService, AuthService, DEFAULT_STATS_DAYS, EmotionService, FocusService, TodoService,
    ai::DEFAULT_FEEDBACK_LIMIT, focus::DEFAULT_SESSION_MINUTES,
};
use crate::application::stats::{StatsCard, load_summaries, overview_cards};
use crate::domain::models::{
    AiFeedback, AiSettings, ApiKeyTestResult, EmotionQuery, EmotionRecord, EmotionStats,
    EmotionType, FocusSession, FocusStats, GeneratedFeedback, MessageResponse, SessionQuery,
    SessionType, TodoItem, TodoPatch, TodoStats, User, flexible_timestamp,
};
use crate::domain::routes::{Route, fallback_route};
use crate::domain::timer::{TimerPreset, TimerSnapshot};
use crate::infrastructure::api_client::{
    AiApi, AuthApi, EmotionApi, FocusApi, ReqwestApiClient, TodoApi,
};
use crate::infrastructure::config::{AppConfig, TokenStoreKind};
use crate::infrastructure::credential_store::{
    CredentialStore, InMemoryCredentialStore, KeyringCredentialStore,
};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::query_cache::QueryCache;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tracing::{error, info};

/// Everything the commands need from the REST API.
pub trait BackendApi: AuthApi + EmotionApi + FocusApi + TodoApi + AiApi + 'static {}

impl<T> BackendApi for T where T: AuthApi + EmotionApi + FocusApi + TodoApi + AiApi + 'static {}

pub struct AppState<A = ReqwestApiClient>
where
    A: BackendApi,
{
    workspace_root: PathBuf,
    config: AppConfig,
    cache: Arc<QueryCache>,
    auth: Mutex<AuthStore<A>>,
    emotions: EmotionService<A>,
    focus: FocusService<A>,
    todos: TodoService<A>,
    ai: AiService<A>,
}

impl AppState<ReqwestApiClient> {
    pub fn new(bootstrap: BootstrapResult) -> Result<Self, InfraError> {
        let credential_store: Arc<dyn CredentialStore> = match bootstrap.config.token_store {
            TokenStoreKind::Keyring => Arc::new(KeyringCredentialStore::default()),
            TokenStoreKind::Memory => Arc::new(InMemoryCredentialStore::default()),
        };
        let api = Arc::new(ReqwestApiClient::new(
            &bootstrap.config.api_base_url,
            Arc::clone(&credential_store),
        )?);
        Ok(Self::with_api(bootstrap, api, credential_store))
    }
}

impl<A> AppState<A>
where
    A: BackendApi,
{
    pub fn with_api(
        bootstrap: BootstrapResult,
        api: Arc<A>,
        credential_store: Arc<dyn CredentialStore>,
    ) -> Self {
        let cache = Arc::new(QueryCache::default());
        let auth_service = AuthService::new(Arc::clone(&api), credential_store, Arc::clone(&cache));
        let default_timezone = bootstrap.config.timezone.clone();

        Self {
            workspace_root: bootstrap.workspace_root,
            auth: Mutex::new(AuthStore::new(auth_service, default_timezone)),
            emotions: EmotionService::new(Arc::clone(&api), Arc::clone(&cache)),
            focus: FocusService::new(Arc::clone(&api), Arc::clone(&cache)),
            todos: TodoService::new(Arc::clone(&api), Arc::clone(&cache)),
            ai: AiService::new(api, Arc::clone(&cache)),
            config: bootstrap.config,
            cache,
        }
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    /// The signed-in user's zone, else the configured one.
    pub async fn display_zone(&self) -> Tz {
        let auth = self.auth.lock().await;
        auth.state()
            .user
            .as_ref()
            .map(User::zone)
            .unwrap_or_else(|| self.config.zone())
    }

    pub fn command_error(&self, command: &str, error: &InfraError) -> String {
        self.log_error(command, &error.to_string());
        error.user_message()
    }

    pub fn log_info(&self, command: &str, message: &str) {
        info!(command, "{message}");
    }

    pub fn log_error(&self, command: &str, message: &str) {
        error!(command, "{message}");
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RoutesResponse {
    pub authenticated: bool,
    pub routes: Vec<String>,
    pub resolved: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OverviewResponse {
    pub days: u32,
    pub cards: Vec<StatsCard>,
    pub emotion: EmotionStats,
    pub focus: FocusStats,
    pub todo: TodoStats,
}

pub async fn login_impl<A>(state: &AppState<A>, email: String, password: String) -> Result<User, InfraError>
where
    A: BackendApi,
{
    let mut auth = state.auth.lock().await;
    let user = auth.login(&email, &password).await?;
    state.log_info("login", &format!("signed in user_id={}", user.id));
    Ok(user)
}

pub async fn register_impl<A>(state: &AppState<A>, form: RegistrationForm) -> Result<User, InfraError>
where
    A: BackendApi,
{
    let mut auth = state.auth.lock().await;
    let user = auth.register(&form).await?;
    state.log_info("register", &format!("registered email={}", user.email));
    Ok(user)
}

pub async fn logout_impl<A>(state: &AppState<A>) -> Result<AuthState, InfraError>
where
    A: BackendApi,
{
    let mut auth = state.auth.lock().await;
    auth.logout()?;
    state.log_info("logout", "signed out");
    Ok(auth.state().clone())
}

pub async fn whoami_impl<A>(state: &AppState<A>) -> Result<User, InfraError>
where
    A: BackendApi,
{
    let mut auth = state.auth.lock().await;
    if !auth.check_auth().await? {
        return Err(InfraError::Unauthorized("not signed in".to_string()));
    }
    auth.state()
        .user
        .clone()
        .ok_or_else(|| InfraError::Unauthorized("not signed in".to_string()))
}

pub async fn routes_impl<A>(state: &AppState<A>, requested: Option<String>) -> Result<RoutesResponse, InfraError>
where
    A: BackendApi,
{
    let mut auth = state.auth.lock().await;
    let authenticated = auth.check_auth().await?;
    let resolved = match requested.as_deref().map(str::trim).filter(|value| !value.is_empty()) {
        Some(raw) => auth.resolve(raw.parse::<Route>().map_err(InfraError::Validation)?),
        None => fallback_route(authenticated),
    };

    Ok(RoutesResponse {
        authenticated,
        routes: auth.routes().iter().map(|route| route.path()).collect(),
        resolved: resolved.path(),
    })
}

pub async fn add_emotion_impl<A>(
    state: &AppState<A>,
    level: u8,
    emotion_type: String,
    note: Option<String>,
) -> Result<EmotionRecord, InfraError>
where
    A: BackendApi,
{
    let emotion_type = emotion_type
        .parse::<EmotionType>()
        .map_err(InfraError::Validation)?;
    let record = EmotionForm {
        level,
        emotion_type,
        note: note.unwrap_or_default(),
    }
    .validate()
    .map_err(InfraError::Validation)?;

    let created = state.emotions.create(record).await?;
    state.log_info("add_emotion", &format!("recorded emotion_id={}", created.id));
    Ok(created)
}

pub async fn list_emotions_impl<A>(
    state: &AppState<A>,
    skip: Option<u32>,
    limit: Option<u32>,
    start_date: Option<String>,
    end_date: Option<String>,
) -> Result<Vec<EmotionRecord>, InfraError>
where
    A: BackendApi,
{
    let query = EmotionQuery {
        skip,
        limit,
        start_date: parse_optional_timestamp(start_date, "start_date")?,
        end_date: parse_optional_timestamp(end_date, "end_date")?,
    };
    state.emotions.list(&query).await
}

pub async fn emotion_stats_impl<A>(state: &AppState<A>, days: Option<u32>) -> Result<EmotionStats, InfraError>
where
    A: BackendApi,
{
    state.emotions.stats(days.unwrap_or(DEFAULT_STATS_DAYS)).await
}

pub async fn delete_emotion_impl<A>(state: &AppState<A>, emotion_id: String) -> Result<bool, InfraError>
where
    A: BackendApi,
{
    let emotion_id = required_id(&emotion_id, "emotion_id")?;
    state.emotions.delete(emotion_id).await?;
    state.log_info("delete_emotion", &format!("deleted emotion_id={emotion_id}"));
    Ok(true)
}

pub fn focus_presets_impl<A>(state: &AppState<A>) -> Vec<TimerPreset>
where
    A: BackendApi,
{
    state.config.presets.clone()
}

/// Picks the configured preset for `session_type` (first preset when none is
/// named); `minutes` overrides its duration.
pub fn resolve_preset(
    config: &AppConfig,
    session_type: Option<&str>,
    minutes: Option<u32>,
) -> Result<TimerPreset, InfraError> {
    let base = match session_type.map(str::trim).filter(|value| !value.is_empty()) {
        Some(raw) => {
            let session_type = raw.parse::<SessionType>().map_err(InfraError::Validation)?;
            config
                .presets
                .iter()
                .copied()
                .find(|preset| preset.session_type == session_type)
                .unwrap_or(TimerPreset::new(session_type, DEFAULT_SESSION_MINUTES))
        }
        None => config.presets.first().copied().ok_or_else(|| {
            InfraError::InvalidConfig("presets must not be empty".to_string())
        })?,
    };

    match minutes {
        Some(0) => Err(InfraError::Validation(
            "duration must be at least one minute".to_string(),
        )),
        Some(minutes) => Ok(TimerPreset::new(base.session_type, minutes)),
        None => Ok(base),
    }
}

/// Opens a server session for `preset` and returns the running controller.
pub async fn start_focus_impl<A, R>(
    state: &AppState<A>,
    preset: TimerPreset,
    reviewer: Arc<R>,
) -> Result<(FocusTimerController<A, R>, FocusSession), InfraError>
where
    A: BackendApi,
    R: SessionReviewer,
{
    let mut controller = FocusTimerController::new(state.focus.clone(), reviewer, preset);
    let session = controller.start().await?;
    state.log_info(
        "start_focus",
        &format!(
            "started session_id={} type={} minutes={}",
            session.id,
            session.session_type.as_str(),
            session.duration_minutes
        ),
    );
    Ok((controller, session))
}

pub async fn run_focus_impl<A, R, F>(
    state: &AppState<A>,
    controller: &mut FocusTimerController<A, R>,
    commands: &mut mpsc::Receiver<TimerCommand>,
    on_update: F,
) -> Result<RunOutcome, InfraError>
where
    A: BackendApi,
    R: SessionReviewer,
    F: FnMut(&TimerSnapshot),
{
    let outcome = controller.run(commands, on_update).await?;
    let message = match &outcome {
        RunOutcome::Completed(session) => format!("completed session_id={}", session.id),
        RunOutcome::Stopped(Some(session)) => format!("stopped session_id={}", session.id),
        RunOutcome::Stopped(None) => "stopped before start".to_string(),
    };
    state.log_info("run_focus", &message);
    Ok(outcome)
}

pub async fn retry_close_impl<A, R>(
    state: &AppState<A>,
    controller: &mut FocusTimerController<A, R>,
) -> Result<Option<FocusSession>, InfraError>
where
    A: BackendApi,
    R: SessionReviewer,
{
    let closed = controller.retry_close().await?;
    if let Some(session) = &closed {
        state.log_info("retry_close", &format!("closed session_id={}", session.id));
    }
    Ok(closed)
}

pub async fn current_focus_impl<A>(state: &AppState<A>) -> Result<Option<FocusSession>, InfraError>
where
    A: BackendApi,
{
    state.focus.current().await
}

pub async fn end_focus_impl<A>(
    state: &AppState<A>,
    session_id: String,
    rating: Option<u8>,
    notes: Option<String>,
) -> Result<FocusSession, InfraError>
where
    A: BackendApi,
{
    let session_id = required_id(&session_id, "session_id")?;
    let review = SessionReviewForm {
        rating,
        notes: notes.unwrap_or_default(),
    }
    .validate()
    .map_err(InfraError::Validation)?;

    let session = state.focus.end(session_id, &review).await?;
    state.log_info("end_focus", &format!("ended session_id={session_id}"));
    Ok(session)
}

pub async fn list_focus_impl<A>(
    state: &AppState<A>,
    skip: Option<u32>,
    limit: Option<u32>,
    start_date: Option<String>,
    end_date: Option<String>,
) -> Result<Vec<FocusSession>, InfraError>
where
    A: BackendApi,
{
    let query = SessionQuery {
        skip,
        limit,
        start_date: parse_optional_timestamp(start_date, "start_date")?,
        end_date: parse_optional_timestamp(end_date, "end_date")?,
    };
    state.focus.list(&query).await
}

pub async fn focus_stats_impl<A>(state: &AppState<A>, days: Option<u32>) -> Result<FocusStats, InfraError>
where
    A: BackendApi,
{
    state.focus.stats(days.unwrap_or(DEFAULT_STATS_DAYS)).await
}

pub fn watch_focus_impl<A>(state: &AppState<A>) -> CurrentSessionPoller
where
    A: BackendApi,
{
    let period = Duration::from_secs(state.config.poll_interval_seconds.max(1));
    state.log_info(
        "watch_focus",
        &format!("polling every {}s", period.as_secs()),
    );
    CurrentSessionPoller::spawn(state.focus.clone(), period)
}

pub async fn add_todo_impl<A>(
    state: &AppState<A>,
    title: String,
    description: Option<String>,
    priority: Option<u8>,
    due_date: Option<String>,
) -> Result<TodoItem, InfraError>
where
    A: BackendApi,
{
    let todo = TodoForm {
        title,
        description,
        priority,
        due_date: parse_optional_timestamp(due_date, "due_date")?,
    }
    .validate()
    .map_err(InfraError::Validation)?;

    let created = state.todos.create(todo).await?;
    state.log_info("add_todo", &format!("created todo_id={}", created.id));
    Ok(created)
}

pub async fn list_todos_impl<A>(state: &AppState<A>, completed: Option<bool>) -> Result<Vec<TodoItem>, InfraError>
where
    A: BackendApi,
{
    state.todos.list(completed).await
}

pub async fn update_todo_impl<A>(
    state: &AppState<A>,
    todo_id: String,
    title: Option<String>,
    description: Option<String>,
    priority: Option<u8>,
    due_date: Option<String>,
    completed: Option<bool>,
) -> Result<TodoItem, InfraError>
where
    A: BackendApi,
{
    let todo_id = required_id(&todo_id, "todo_id")?;
    let patch = TodoPatch {
        title,
        description,
        completed,
        priority,
        due_date: parse_optional_timestamp(due_date, "due_date")?,
    };
    if patch.is_empty() {
        return Err(InfraError::Validation("nothing to update".to_string()));
    }

    let updated = state.todos.update(todo_id, patch).await?;
    state.log_info("update_todo", &format!("updated todo_id={todo_id}"));
    Ok(updated)
}

pub async fn toggle_todo_impl<A>(state: &AppState<A>, todo_id: String) -> Result<TodoItem, InfraError>
where
    A: BackendApi,
{
    let todo_id = required_id(&todo_id, "todo_id")?;
    let updated = state.todos.toggle(todo_id).await?;
    state.log_info(
        "toggle_todo",
        &format!("todo_id={todo_id} completed={}", updated.completed),
    );
    Ok(updated)
}

pub async fn delete_todo_impl<A>(state: &AppState<A>, todo_id: String) -> Result<bool, InfraError>
where
    A: BackendApi,
{
    let todo_id = required_id(&todo_id, "todo_id")?;
    state.todos.delete(todo_id).await?;
    state.log_info("delete_todo", &format!("deleted todo_id={todo_id}"));
    Ok(true)
}

pub async fn todo_stats_impl<A>(state: &AppState<A>) -> Result<TodoStats, InfraError>
where
    A: BackendApi,
{
    state.todos.stats().await
}

pub async fn ai_settings_impl<A>(state: &AppState<A>) -> Result<AiSettings, InfraError>
where
    A: BackendApi,
{
    state.ai.settings().await
}

pub async fn update_ai_settings_impl<A>(
    state: &AppState<A>,
    form: AiSettingsForm,
) -> Result<MessageResponse, InfraError>
where
    A: BackendApi,
{
    let patch = form.validate().map_err(InfraError::Validation)?;
    let response = state.ai.update_settings(patch).await?;
    state.log_info("update_ai_settings", "updated ai settings");
    Ok(response)
}

pub async fn test_api_key_impl<A>(state: &AppState<A>, api_key: String) -> Result<ApiKeyTestResult, InfraError>
where
    A: BackendApi,
{
    let result = state.ai.test_api_key(&api_key).await?;
    state.log_info("test_api_key", &format!("valid={}", result.valid));
    Ok(result)
}

pub async fn generate_feedback_impl<A>(
    state: &AppState<A>,
    feedback_type: Option<String>,
) -> Result<GeneratedFeedback, InfraError>
where
    A: BackendApi,
{
    let generated = state.ai.generate_feedback(feedback_type.as_deref()).await?;
    state.log_info("generate_feedback", "generated feedback");
    Ok(generated)
}

pub async fn feedbacks_impl<A>(state: &AppState<A>, limit: Option<u32>) -> Result<Vec<AiFeedback>, InfraError>
where
    A: BackendApi,
{
    state.ai.feedbacks(limit.unwrap_or(DEFAULT_FEEDBACK_LIMIT)).await
}

pub async fn overview_impl<A>(state: &AppState<A>, days: Option<u32>) -> Result<OverviewResponse, InfraError>
where
    A: BackendApi,
{
    let days = days.unwrap_or(DEFAULT_STATS_DAYS);
    let summaries = load_summaries(&state.emotions, &state.focus, &state.todos, days).await?;
    let cards = overview_cards(&summaries);
    Ok(OverviewResponse {
        days,
        cards,
        emotion: summaries.emotion.unwrap_or_default(),
        focus: summaries.focus.unwrap_or_default(),
        todo: summaries.todo.unwrap_or_default(),
    })
}

fn required_id<'a>(value: &'a str, field_name: &str) -> Result<&'a str, InfraError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(InfraError::Validation(format!("{field_name} must not be empty")));
    }
    Ok(value)
}

fn parse_optional_timestamp(
    value: Option<String>,
    field_name: &str,
) -> Result<Option<DateTime<Utc>>, InfraError> {
    let Some(value) = value.filter(|value| !value.trim().is_empty()) else {
        return Ok(None);
    };
    flexible_timestamp::parse(&value).map(Some).ok_or_else(|| {
        InfraError::Validation(format!(
            "{field_name} must be RFC3339 or YYYY-MM-DD, got '{}'",
            value.trim()
        ))
    })
}
