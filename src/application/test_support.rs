use crate::domain::models::{
    AiFeedback, AiSettings, AiSettingsPatch, ApiKeyTestResult, AuthTokens, EmotionQuery,
    EmotionRecord, EmotionStats, EmotionType, EndFocusSession, FeedbackFrequency, FocusSession,
    FocusStats, GeneratedFeedback, LoginRequest, MessageResponse, NewEmotionRecord,
    NewFocusSession, NewTodoItem, RegisterRequest, SessionQuery, TodoItem, TodoPatch, TodoStats,
    User,
};
use crate::infrastructure::api_client::{AiApi, AuthApi, EmotionApi, FocusApi, TodoApi};
use crate::infrastructure::error::InfraError;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Clone, Copy)]
pub enum FakeFailure {
    Status(u16, &'static str),
    Network,
}

impl FakeFailure {
    fn into_error(self) -> InfraError {
        match self {
            Self::Status(401, detail) => InfraError::Unauthorized(detail.to_string()),
            Self::Status(status, detail) => InfraError::Http {
                status,
                detail: detail.to_string(),
            },
            Self::Network => InfraError::Network("connection refused".to_string()),
        }
    }
}

/// In-memory stand-in for the REST API. Records every call by endpoint name
/// and fails on demand.
#[derive(Debug, Default)]
pub struct FakeApi {
    calls: Mutex<Vec<&'static str>>,
    failures: Mutex<HashMap<&'static str, VecDeque<FakeFailure>>>,
    todos: Mutex<Vec<TodoItem>>,
    current_session: Mutex<Option<FocusSession>>,
    started: Mutex<Vec<NewFocusSession>>,
    ended: Mutex<Vec<(String, EndFocusSession)>>,
    next_id: AtomicUsize,
}

pub fn sample_user() -> User {
    User {
        id: "user-1".to_string(),
        email: "min@example.com".to_string(),
        name: "Min".to_string(),
        timezone: "Asia/Seoul".to_string(),
        is_active: true,
        is_verified: false,
        settings: None,
        created_at: None,
    }
}

pub fn sample_tokens(access: &str) -> AuthTokens {
    AuthTokens {
        access_token: access.to_string(),
        refresh_token: Some(format!("{access}-refresh")),
        token_type: "bearer".to_string(),
    }
}

pub fn sample_todo(id: &str, title: &str, completed: bool) -> TodoItem {
    TodoItem {
        id: id.to_string(),
        user_id: "user-1".to_string(),
        title: title.to_string(),
        description: None,
        completed,
        priority: 1,
        due_date: None,
        completed_at: None,
        created_at: None,
    }
}

impl FakeApi {
    pub fn fail_next(&self, endpoint: &'static str, failure: FakeFailure) {
        self.failures
            .lock()
            .expect("failures mutex poisoned")
            .entry(endpoint)
            .or_default()
            .push_back(failure);
    }

    pub fn count(&self, endpoint: &str) -> usize {
        self.calls
            .lock()
            .expect("calls mutex poisoned")
            .iter()
            .filter(|name| **name == endpoint)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().expect("calls mutex poisoned").len()
    }

    pub fn seed_todos(&self, todos: Vec<TodoItem>) {
        *self.todos.lock().expect("todos mutex poisoned") = todos;
    }

    pub fn todos(&self) -> Vec<TodoItem> {
        self.todos.lock().expect("todos mutex poisoned").clone()
    }

    pub fn started_sessions(&self) -> Vec<NewFocusSession> {
        self.started.lock().expect("started mutex poisoned").clone()
    }

    pub fn ended_sessions(&self) -> Vec<(String, EndFocusSession)> {
        self.ended.lock().expect("ended mutex poisoned").clone()
    }

    pub fn set_current_session(&self, session: Option<FocusSession>) {
        *self.current_session.lock().expect("session mutex poisoned") = session;
    }

    fn call(&self, endpoint: &'static str) -> Result<(), InfraError> {
        self.calls.lock().expect("calls mutex poisoned").push(endpoint);
        let failure = self
            .failures
            .lock()
            .expect("failures mutex poisoned")
            .get_mut(endpoint)
            .and_then(VecDeque::pop_front);
        match failure {
            Some(failure) => Err(failure.into_error()),
            None => Ok(()),
        }
    }

    fn next_id(&self, prefix: &str) -> String {
        format!("{prefix}-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

#[async_trait]
impl AuthApi for FakeApi {
    async fn login(&self, request: &LoginRequest) -> Result<AuthTokens, InfraError> {
        self.call("login")?;
        if request.password != "correct-horse" {
            return Err(InfraError::Unauthorized(
                "Incorrect email or password".to_string(),
            ));
        }
        Ok(sample_tokens("access"))
    }

    async fn register(&self, request: &RegisterRequest) -> Result<User, InfraError> {
        self.call("register")?;
        Ok(User {
            email: request.email.clone(),
            name: request.name.clone(),
            timezone: request
                .timezone
                .clone()
                .unwrap_or_else(|| "Asia/Seoul".to_string()),
            ..sample_user()
        })
    }

    async fn current_user(&self) -> Result<User, InfraError> {
        self.call("me")?;
        Ok(sample_user())
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AuthTokens, InfraError> {
        self.call("refresh")?;
        Ok(AuthTokens {
            access_token: format!("{refresh_token}-renewed"),
            refresh_token: None,
            token_type: "bearer".to_string(),
        })
    }
}

#[async_trait]
impl EmotionApi for FakeApi {
    async fn create_emotion(&self, record: &NewEmotionRecord) -> Result<EmotionRecord, InfraError> {
        self.call("create_emotion")?;
        Ok(EmotionRecord {
            id: self.next_id("emotion"),
            user_id: "user-1".to_string(),
            emotion_level: record.emotion_level,
            emotion_type: record.emotion_type.clone(),
            note: record.note.clone(),
            ai_analysis: None,
            recorded_at: record
                .recorded_at
                .unwrap_or_else(|| Utc.with_ymd_and_hms(2026, 2, 16, 9, 0, 0).unwrap()),
            created_at: None,
        })
    }

    async fn list_emotions(&self, _query: &EmotionQuery) -> Result<Vec<EmotionRecord>, InfraError> {
        self.call("list_emotions")?;
        Ok(Vec::new())
    }

    async fn emotion_stats(&self, days: u32) -> Result<EmotionStats, InfraError> {
        self.call("emotion_stats")?;
        Ok(EmotionStats {
            total_records: 4,
            average_level: 3.25,
            most_common_emotion: Some(EmotionType::Calm),
            emotion_distribution: [("calm".to_string(), 3), ("sad".to_string(), 1)]
                .into_iter()
                .collect(),
            period_days: Some(days),
        })
    }

    async fn delete_emotion(&self, _emotion_id: &str) -> Result<(), InfraError> {
        self.call("delete_emotion")
    }
}

#[async_trait]
impl FocusApi for FakeApi {
    async fn start_session(&self, session: &NewFocusSession) -> Result<FocusSession, InfraError> {
        self.call("start_session")?;
        self.started
            .lock()
            .expect("started mutex poisoned")
            .push(session.clone());
        let created = FocusSession {
            id: self.next_id("session"),
            user_id: "user-1".to_string(),
            start_time: session.start_time,
            end_time: None,
            duration_minutes: session.duration_minutes,
            session_type: session.session_type,
            productivity_rating: None,
            notes: None,
            created_at: None,
        };
        self.set_current_session(Some(created.clone()));
        Ok(created)
    }

    async fn current_session(&self) -> Result<Option<FocusSession>, InfraError> {
        self.call("current_session")?;
        Ok(self.current_session.lock().expect("session mutex poisoned").clone())
    }

    async fn end_session(
        &self,
        session_id: &str,
        review: &EndFocusSession,
    ) -> Result<FocusSession, InfraError> {
        self.call("end_session")?;
        self.ended
            .lock()
            .expect("ended mutex poisoned")
            .push((session_id.to_string(), review.clone()));
        let mut current = self.current_session.lock().expect("session mutex poisoned");
        let start_time = current
            .as_ref()
            .map(|session| session.start_time)
            .unwrap_or_else(Utc::now);
        *current = None;
        Ok(FocusSession {
            id: session_id.to_string(),
            user_id: "user-1".to_string(),
            start_time,
            end_time: Some(Utc::now()),
            duration_minutes: 25,
            session_type: crate::domain::models::SessionType::Pomodoro,
            productivity_rating: review.productivity_rating,
            notes: review.notes.clone(),
            created_at: None,
        })
    }

    async fn list_sessions(&self, _query: &SessionQuery) -> Result<Vec<FocusSession>, InfraError> {
        self.call("list_sessions")?;
        Ok(Vec::new())
    }

    async fn focus_stats(&self, days: u32) -> Result<FocusStats, InfraError> {
        self.call("focus_stats")?;
        Ok(FocusStats {
            total_sessions: 6,
            total_minutes: 150,
            average_duration: 25.0,
            average_productivity: 3.8,
            period_days: Some(days),
        })
    }
}

#[async_trait]
impl TodoApi for FakeApi {
    async fn create_todo(&self, todo: &NewTodoItem) -> Result<TodoItem, InfraError> {
        self.call("create_todo")?;
        let mut created = sample_todo(&self.next_id("todo"), &todo.title, false);
        created.description = todo.description.clone();
        created.priority = todo.priority.unwrap_or(1);
        created.due_date = todo.due_date;
        self.todos
            .lock()
            .expect("todos mutex poisoned")
            .push(created.clone());
        Ok(created)
    }

    async fn list_todos(&self, completed: Option<bool>) -> Result<Vec<TodoItem>, InfraError> {
        self.call("list_todos")?;
        Ok(self
            .todos()
            .into_iter()
            .filter(|todo| completed.is_none_or(|value| todo.completed == value))
            .collect())
    }

    async fn update_todo(&self, todo_id: &str, patch: &TodoPatch) -> Result<TodoItem, InfraError> {
        self.call("update_todo")?;
        let mut todos = self.todos.lock().expect("todos mutex poisoned");
        let todo = todos
            .iter_mut()
            .find(|todo| todo.id == todo_id)
            .ok_or_else(|| InfraError::Http {
                status: 404,
                detail: "Todo not found".to_string(),
            })?;
        if let Some(title) = patch.title.clone() {
            todo.title = title;
        }
        if let Some(completed) = patch.completed {
            todo.completed = completed;
        }
        if let Some(priority) = patch.priority {
            todo.priority = priority;
        }
        Ok(todo.clone())
    }

    async fn delete_todo(&self, todo_id: &str) -> Result<(), InfraError> {
        self.call("delete_todo")?;
        self.todos
            .lock()
            .expect("todos mutex poisoned")
            .retain(|todo| todo.id != todo_id);
        Ok(())
    }

    async fn todo_stats(&self) -> Result<TodoStats, InfraError> {
        self.call("todo_stats")?;
        let todos = self.todos();
        let total = todos.len() as u32;
        let completed = todos.iter().filter(|todo| todo.completed).count() as u32;
        Ok(TodoStats {
            total,
            completed,
            pending: total - completed,
            overdue: 0,
            completion_rate: if total == 0 {
                0.0
            } else {
                f64::from(completed) / f64::from(total) * 100.0
            },
        })
    }
}

#[async_trait]
impl AiApi for FakeApi {
    async fn ai_settings(&self) -> Result<AiSettings, InfraError> {
        self.call("ai_settings")?;
        Ok(AiSettings {
            openai_api_key: Some("**********".to_string()),
            enable_ai_analysis: true,
            ai_feedback_frequency: FeedbackFrequency::Daily,
        })
    }

    async fn update_ai_settings(&self, _patch: &AiSettingsPatch) -> Result<MessageResponse, InfraError> {
        self.call("update_ai_settings")?;
        Ok(MessageResponse {
            message: Some("updated".to_string()),
        })
    }

    async fn test_api_key(&self, api_key: &str) -> Result<ApiKeyTestResult, InfraError> {
        self.call("test_api_key")?;
        Ok(ApiKeyTestResult {
            valid: api_key.starts_with("sk-"),
            message: None,
        })
    }

    async fn generate_feedback(&self, feedback_type: &str) -> Result<GeneratedFeedback, InfraError> {
        self.call("generate_feedback")?;
        Ok(GeneratedFeedback {
            feedback: format!("{feedback_type}: steady week"),
            generated_at: None,
        })
    }

    async fn feedbacks(&self, _limit: u32) -> Result<Vec<AiFeedback>, InfraError> {
        self.call("feedbacks")?;
        Ok(Vec::new())
    }
}
