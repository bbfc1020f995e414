use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_TIMEZONE: &str = "Asia/Seoul";
pub const MAX_TODO_TITLE_CHARS: usize = 255;
pub const MAX_SESSION_NOTES_CHARS: usize = 500;

/// Timestamps from the API are RFC3339, but the server also emits naive
/// `datetime.utcnow()` values without an offset. Those are read as UTC.
pub mod flexible_timestamp {
    use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        let raw = raw.trim();
        if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
            return Some(parsed.with_timezone(&Utc));
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
            return Some(naive.and_utc());
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
    }

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}")))
    }

    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            value: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(value) => serializer.serialize_str(&value.to_rfc3339()),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            let raw = Option::<String>::deserialize(deserializer)?;
            match raw.as_deref().map(str::trim).filter(|value| !value.is_empty()) {
                Some(value) => super::parse(value)
                    .map(Some)
                    .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {value}"))),
                None => Ok(None),
            }
        }
    }
}

fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}

fn default_true() -> bool {
    true
}

fn default_priority() -> u8 {
    1
}

fn default_token_type() -> String {
    "bearer".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<serde_json::Value>,
    #[serde(default, with = "flexible_timestamp::option")]
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    /// The user's IANA zone, falling back to UTC when the server sent something unknown.
    pub fn zone(&self) -> Tz {
        self.timezone.trim().parse::<Tz>().unwrap_or(Tz::UTC)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthTokens {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

impl AuthTokens {
    /// Keeps the stored refresh token when a refresh response omits one.
    pub fn merged_with(self, previous: &AuthTokens) -> AuthTokens {
        AuthTokens {
            access_token: self.access_token,
            refresh_token: self.refresh_token.or_else(|| previous.refresh_token.clone()),
            token_type: self.token_type,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EmotionType {
    Happy,
    Sad,
    Anxious,
    Calm,
    Excited,
    Angry,
    Neutral,
    Other(String),
}

impl EmotionType {
    pub const SELECTABLE: [EmotionType; 7] = [
        EmotionType::Happy,
        EmotionType::Sad,
        EmotionType::Anxious,
        EmotionType::Calm,
        EmotionType::Excited,
        EmotionType::Angry,
        EmotionType::Neutral,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            Self::Happy => "happy",
            Self::Sad => "sad",
            Self::Anxious => "anxious",
            Self::Calm => "calm",
            Self::Excited => "excited",
            Self::Angry => "angry",
            Self::Neutral => "neutral",
            Self::Other(value) => value.as_str(),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Happy => "Happy",
            Self::Sad => "Sad",
            Self::Anxious => "Anxious",
            Self::Calm => "Calm",
            Self::Excited => "Excited",
            Self::Angry => "Angry",
            Self::Neutral => "Neutral",
            Self::Other(value) => value.as_str(),
        }
    }

    pub fn is_selectable(&self) -> bool {
        !matches!(self, Self::Other(_))
    }

    fn from_wire(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "happy" => Self::Happy,
            "sad" => Self::Sad,
            "anxious" => Self::Anxious,
            "calm" => Self::Calm,
            "excited" => Self::Excited,
            "angry" => Self::Angry,
            "neutral" => Self::Neutral,
            _ => Self::Other(raw.trim().to_string()),
        }
    }
}

impl fmt::Display for EmotionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmotionType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let parsed = Self::from_wire(value);
        if parsed.is_selectable() {
            Ok(parsed)
        } else {
            let options = Self::SELECTABLE
                .iter()
                .map(EmotionType::as_str)
                .collect::<Vec<_>>()
                .join(", ");
            Err(format!("unknown emotion type '{}' (expected one of: {options})", value.trim()))
        }
    }
}

impl Serialize for EmotionType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EmotionType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from_wire(&raw))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmotionRecord {
    pub id: String,
    #[serde(default)]
    pub user_id: String,
    pub emotion_level: u8,
    pub emotion_type: EmotionType,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_analysis: Option<serde_json::Value>,
    #[serde(with = "flexible_timestamp")]
    pub recorded_at: DateTime<Utc>,
    #[serde(default, with = "flexible_timestamp::option")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewEmotionRecord {
    pub emotion_level: u8,
    pub emotion_type: EmotionType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "flexible_timestamp::option"
    )]
    pub recorded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmotionQuery {
    pub skip: Option<u32>,
    pub limit: Option<u32>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

impl EmotionQuery {
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(skip) = self.skip {
            pairs.push(("skip", skip.to_string()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        if let Some(start) = self.start_date {
            pairs.push(("start_date", start.to_rfc3339()));
        }
        if let Some(end) = self.end_date {
            pairs.push(("end_date", end.to_rfc3339()));
        }
        pairs
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EmotionStats {
    #[serde(default)]
    pub total_records: u32,
    #[serde(default)]
    pub average_level: f64,
    #[serde(default)]
    pub most_common_emotion: Option<EmotionType>,
    #[serde(default)]
    pub emotion_distribution: BTreeMap<String, u32>,
    #[serde(default)]
    pub period_days: Option<u32>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SessionType {
    Pomodoro,
    DeepWork,
    Break,
    Custom,
}

impl SessionType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pomodoro => "pomodoro",
            Self::DeepWork => "deep_work",
            Self::Break => "break",
            Self::Custom => "custom",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Pomodoro => "Pomodoro",
            Self::DeepWork => "Deep Work",
            Self::Break => "Short Break",
            Self::Custom => "Custom",
        }
    }
}

impl fmt::Display for SessionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "pomodoro" => Ok(Self::Pomodoro),
            "deep_work" | "deepwork" => Ok(Self::DeepWork),
            "break" => Ok(Self::Break),
            "custom" => Ok(Self::Custom),
            other => Err(format!(
                "unknown session type '{other}' (expected pomodoro, deep_work, break or custom)"
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FocusSession {
    pub id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(with = "flexible_timestamp")]
    pub start_time: DateTime<Utc>,
    #[serde(default, with = "flexible_timestamp::option")]
    pub end_time: Option<DateTime<Utc>>,
    pub duration_minutes: u32,
    pub session_type: SessionType,
    #[serde(default)]
    pub productivity_rating: Option<u8>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default, with = "flexible_timestamp::option")]
    pub created_at: Option<DateTime<Utc>>,
}

impl FocusSession {
    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewFocusSession {
    pub duration_minutes: u32,
    pub session_type: SessionType,
    #[serde(with = "flexible_timestamp")]
    pub start_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EndFocusSession {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub productivity_rating: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl EndFocusSession {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(rating) = self.productivity_rating {
            validate_scale(rating, "productivity_rating")?;
        }
        if let Some(notes) = self.notes.as_deref() {
            if notes.chars().count() > MAX_SESSION_NOTES_CHARS {
                return Err(format!(
                    "notes must be at most {MAX_SESSION_NOTES_CHARS} characters"
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionQuery {
    pub skip: Option<u32>,
    pub limit: Option<u32>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

impl SessionQuery {
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        EmotionQuery {
            skip: self.skip,
            limit: self.limit,
            start_date: self.start_date,
            end_date: self.end_date,
        }
        .to_pairs()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FocusStats {
    #[serde(default)]
    pub total_sessions: u32,
    #[serde(default)]
    pub total_minutes: u64,
    #[serde(default)]
    pub average_duration: f64,
    #[serde(default)]
    pub average_productivity: f64,
    #[serde(default)]
    pub period_days: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TodoItem {
    pub id: String,
    #[serde(default)]
    pub user_id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default = "default_priority")]
    pub priority: u8,
    #[serde(default, with = "flexible_timestamp::option")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default, with = "flexible_timestamp::option")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, with = "flexible_timestamp::option")]
    pub created_at: Option<DateTime<Utc>>,
}

impl TodoItem {
    pub fn is_overdue_at(&self, now: DateTime<Utc>) -> bool {
        !self.completed && self.due_date.is_some_and(|due| due < now)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewTodoItem {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<u8>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "flexible_timestamp::option"
    )]
    pub due_date: Option<DateTime<Utc>>,
}

impl NewTodoItem {
    pub fn validate(&self) -> Result<(), String> {
        validate_title(&self.title)?;
        if let Some(priority) = self.priority {
            validate_scale(priority, "priority")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TodoPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<u8>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "flexible_timestamp::option"
    )]
    pub due_date: Option<DateTime<Utc>>,
}

impl TodoPatch {
    pub fn is_empty(&self) -> bool {
        self == &TodoPatch::default()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.is_empty() {
            return Err("todo update must change at least one field".to_string());
        }
        if let Some(title) = self.title.as_deref() {
            validate_title(title)?;
        }
        if let Some(priority) = self.priority {
            validate_scale(priority, "priority")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TodoStats {
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub completed: u32,
    #[serde(default)]
    pub pending: u32,
    #[serde(default)]
    pub overdue: u32,
    #[serde(default)]
    pub completion_rate: f64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackFrequency {
    #[default]
    Daily,
    Weekly,
    Never,
}

impl FromStr for FeedbackFrequency {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "never" => Ok(Self::Never),
            other => Err(format!(
                "unknown feedback frequency '{other}' (expected daily, weekly or never)"
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AiSettings {
    #[serde(default)]
    pub openai_api_key: Option<String>,
    #[serde(default = "default_true")]
    pub enable_ai_analysis: bool,
    #[serde(default)]
    pub ai_feedback_frequency: FeedbackFrequency,
}

impl AiSettings {
    /// The server masks the key, so this only says whether one is set.
    pub fn has_api_key(&self) -> bool {
        self.openai_api_key
            .as_deref()
            .is_some_and(|value| !value.trim().is_empty())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AiSettingsPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub openai_api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_ai_analysis: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_feedback_frequency: Option<FeedbackFrequency>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiKeyTestResult {
    pub valid: bool,
    #[serde(default, alias = "messasge")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GeneratedFeedback {
    pub feedback: String,
    #[serde(default, with = "flexible_timestamp::option")]
    pub generated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AiFeedback {
    pub id: String,
    pub feedback_text: String,
    #[serde(default)]
    pub feedback_type: Option<String>,
    #[serde(default)]
    pub sentiment_score: Option<f64>,
    #[serde(default, with = "flexible_timestamp::option")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: Option<String>,
}

pub fn validate_non_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field_name} must not be empty"));
    }
    Ok(())
}

/// Levels, priorities and ratings all share the 1-5 scale.
pub fn validate_scale(value: u8, field_name: &str) -> Result<(), String> {
    if !(1..=5).contains(&value) {
        return Err(format!("{field_name} must be between 1 and 5"));
    }
    Ok(())
}

fn validate_title(title: &str) -> Result<(), String> {
    validate_non_empty(title, "title")?;
    if title.trim().chars().count() > MAX_TODO_TITLE_CHARS {
        return Err(format!(
            "title must be at most {MAX_TODO_TITLE_CHARS} characters"
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn naive_server_timestamps_are_read_as_utc() {
        let parsed = flexible_timestamp::parse("2026-02-16T09:30:00.123456").expect("naive timestamp");
        assert_eq!(parsed.to_rfc3339(), "2026-02-16T09:30:00.123456+00:00");

        let with_offset = flexible_timestamp::parse("2026-02-16T18:30:00+09:00").expect("offset timestamp");
        assert_eq!(with_offset.to_rfc3339(), "2026-02-16T09:30:00+00:00");

        let date_only = flexible_timestamp::parse("2026-02-16").expect("date");
        assert_eq!(date_only.to_rfc3339(), "2026-02-16T00:00:00+00:00");

        assert!(flexible_timestamp::parse("yesterday").is_none());
    }

    #[test]
    fn focus_session_deserializes_from_server_payload() {
        let payload = r#"{
            "id": "5b1c",
            "user_id": "u-1",
            "start_time": "2026-02-16T09:00:00",
            "end_time": null,
            "duration_minutes": 25,
            "session_type": "deep_work",
            "productivity_rating": null,
            "notes": null,
            "created_at": "2026-02-16T09:00:00"
        }"#;
        let session: FocusSession = serde_json::from_str(payload).expect("focus session");
        assert_eq!(session.session_type, SessionType::DeepWork);
        assert!(session.is_open());
        assert_eq!(session.duration_minutes, 25);
    }

    #[test]
    fn unknown_emotion_types_are_kept_instead_of_failing() {
        let payload = r#"{
            "id": "e-1",
            "emotion_level": 4,
            "emotion_type": "frustrated",
            "recorded_at": "2026-02-16T09:00:00",
            "ai_analysis": {}
        }"#;
        let record: EmotionRecord = serde_json::from_str(payload).expect("emotion record");
        assert_eq!(record.emotion_type, EmotionType::Other("frustrated".to_string()));
        assert!(!record.emotion_type.is_selectable());
        assert!("frustrated".parse::<EmotionType>().is_err());
        assert_eq!("Calm".parse::<EmotionType>(), Ok(EmotionType::Calm));
    }

    #[test]
    fn end_session_request_omits_missing_rating() {
        let body = serde_json::to_value(EndFocusSession::default()).expect("serialize");
        assert_eq!(body, serde_json::json!({}));

        let rated = EndFocusSession {
            productivity_rating: Some(4),
            notes: Some("good flow".to_string()),
        };
        assert_eq!(
            serde_json::to_value(&rated).expect("serialize"),
            serde_json::json!({"productivity_rating": 4, "notes": "good flow"})
        );
    }

    #[test]
    fn end_session_validation_checks_rating_and_notes() {
        let invalid_rating = EndFocusSession {
            productivity_rating: Some(6),
            notes: None,
        };
        assert!(invalid_rating.validate().is_err());

        let long_notes = EndFocusSession {
            productivity_rating: None,
            notes: Some("x".repeat(MAX_SESSION_NOTES_CHARS + 1)),
        };
        assert!(long_notes.validate().is_err());
        assert!(EndFocusSession::default().validate().is_ok());
    }

    #[test]
    fn todo_patch_requires_a_change() {
        assert!(TodoPatch::default().validate().is_err());
        let toggle = TodoPatch {
            completed: Some(true),
            ..TodoPatch::default()
        };
        assert!(toggle.validate().is_ok());
        assert_eq!(
            serde_json::to_value(&toggle).expect("serialize"),
            serde_json::json!({"completed": true})
        );
    }

    #[test]
    fn refresh_response_keeps_previous_refresh_token() {
        let previous = AuthTokens {
            access_token: "old".to_string(),
            refresh_token: Some("refresh".to_string()),
            token_type: "bearer".to_string(),
        };
        let refreshed: AuthTokens =
            serde_json::from_str(r#"{"access_token":"new","token_type":"bearer"}"#).expect("tokens");
        let merged = refreshed.merged_with(&previous);
        assert_eq!(merged.access_token, "new");
        assert_eq!(merged.refresh_token.as_deref(), Some("refresh"));
    }

    #[test]
    fn api_key_test_result_accepts_misspelled_message_field() {
        let result: ApiKeyTestResult =
            serde_json::from_str(r#"{"valid": true, "messasge": "key is valid"}"#).expect("result");
        assert!(result.valid);
        assert_eq!(result.message.as_deref(), Some("key is valid"));
    }

    #[test]
    fn emotion_stats_tolerate_empty_period_payload() {
        let stats: EmotionStats = serde_json::from_str(
            r#"{"total_records":0,"average_level":0,"most_common_emotion":null,"emotion_distribution":{}}"#,
        )
        .expect("stats");
        assert_eq!(stats.total_records, 0);
        assert!(stats.most_common_emotion.is_none());
        assert!(stats.period_days.is_none());
    }

    #[test]
    fn overdue_only_counts_open_todos_past_due() {
        let now = flexible_timestamp::parse("2026-02-16T12:00:00Z").expect("now");
        let mut todo = TodoItem {
            id: "t-1".to_string(),
            user_id: "u-1".to_string(),
            title: "File taxes".to_string(),
            description: None,
            completed: false,
            priority: 3,
            due_date: flexible_timestamp::parse("2026-02-15T12:00:00Z"),
            completed_at: None,
            created_at: None,
        };
        assert!(todo.is_overdue_at(now));
        todo.completed = true;
        assert!(!todo.is_overdue_at(now));
    }

    #[test]
    fn user_zone_falls_back_to_utc() {
        let mut user = User {
            id: "u-1".to_string(),
            email: "a@b.c".to_string(),
            name: "Min".to_string(),
            timezone: "Asia/Seoul".to_string(),
            is_active: true,
            is_verified: false,
            settings: None,
            created_at: None,
        };
        assert_eq!(user.zone(), chrono_tz::Asia::Seoul);
        user.timezone = "Mars/Olympus".to_string();
        assert_eq!(user.zone(), Tz::UTC);
    }

    proptest! {
        #[test]
        fn scale_accepts_exactly_one_through_five(value in 0u8..=255u8) {
            prop_assert_eq!(validate_scale(value, "level").is_ok(), (1..=5).contains(&value));
        }
    }
}
