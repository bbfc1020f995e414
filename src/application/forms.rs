use crate::domain::models::{
    AiSettingsPatch, EmotionType, EndFocusSession, FeedbackFrequency, LoginRequest,
    NewEmotionRecord, NewTodoItem, RegisterRequest, validate_non_empty, validate_scale,
};
use chrono::{DateTime, Utc};

pub const MIN_PASSWORD_CHARS: usize = 8;
pub const DEFAULT_EMOTION_LEVEL: u8 = 3;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

impl LoginForm {
    pub fn validate(&self) -> Result<LoginRequest, String> {
        validate_email(&self.email)?;
        if self.password.is_empty() {
            return Err("password must not be empty".to_string());
        }
        Ok(LoginRequest {
            email: self.email.trim().to_string(),
            password: self.password.clone(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationForm {
    pub email: String,
    pub name: String,
    pub password: String,
    pub confirm_password: String,
    pub timezone: Option<String>,
}

impl RegistrationForm {
    /// Mismatch is reported before length, like the sign-up page does.
    pub fn validate(&self, default_timezone: &str) -> Result<RegisterRequest, String> {
        if self.password != self.confirm_password {
            return Err("passwords do not match".to_string());
        }
        if self.password.chars().count() < MIN_PASSWORD_CHARS {
            return Err(format!(
                "password must be at least {MIN_PASSWORD_CHARS} characters"
            ));
        }
        validate_email(&self.email)?;
        validate_non_empty(&self.name, "name")?;
        let timezone = self
            .timezone
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(default_timezone)
            .to_string();
        Ok(RegisterRequest {
            email: self.email.trim().to_string(),
            password: self.password.clone(),
            name: self.name.trim().to_string(),
            timezone: Some(timezone),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TodoForm {
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<u8>,
    pub due_date: Option<DateTime<Utc>>,
}

impl TodoForm {
    pub fn validate(&self) -> Result<NewTodoItem, String> {
        let todo = NewTodoItem {
            title: self.title.trim().to_string(),
            description: self
                .description
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(ToOwned::to_owned),
            priority: self.priority,
            due_date: self.due_date,
        };
        todo.validate()?;
        Ok(todo)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmotionForm {
    pub level: u8,
    pub emotion_type: EmotionType,
    pub note: String,
}

impl Default for EmotionForm {
    fn default() -> Self {
        Self {
            level: DEFAULT_EMOTION_LEVEL,
            emotion_type: EmotionType::Neutral,
            note: String::new(),
        }
    }
}

impl EmotionForm {
    pub fn validate(&self) -> Result<NewEmotionRecord, String> {
        validate_scale(self.level, "emotion level")?;
        if !self.emotion_type.is_selectable() {
            return Err(format!("unknown emotion type '{}'", self.emotion_type));
        }
        let note = self.note.trim();
        Ok(NewEmotionRecord {
            emotion_level: self.level,
            emotion_type: self.emotion_type.clone(),
            note: (!note.is_empty()).then(|| note.to_string()),
            recorded_at: None,
        })
    }
}

/// Review collected when a focus session ends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionReviewForm {
    pub rating: Option<u8>,
    pub notes: String,
}

impl SessionReviewForm {
    pub fn validate(&self) -> Result<EndFocusSession, String> {
        let notes = self.notes.trim();
        let review = EndFocusSession {
            productivity_rating: self.rating,
            notes: (!notes.is_empty()).then(|| notes.to_string()),
        };
        review.validate()?;
        Ok(review)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AiSettingsForm {
    pub api_key: Option<String>,
    pub enable_ai_analysis: Option<bool>,
    pub feedback_frequency: Option<String>,
}

impl AiSettingsForm {
    /// Only filled fields are sent. A blank key is left untouched.
    pub fn validate(&self) -> Result<AiSettingsPatch, String> {
        let ai_feedback_frequency = self
            .feedback_frequency
            .as_deref()
            .map(str::parse::<FeedbackFrequency>)
            .transpose()?;
        let patch = AiSettingsPatch {
            openai_api_key: self
                .api_key
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(ToOwned::to_owned),
            enable_ai_analysis: self.enable_ai_analysis,
            ai_feedback_frequency,
        };
        if patch == AiSettingsPatch::default() {
            return Err("nothing to update".to_string());
        }
        Ok(patch)
    }
}

/// Reads a 1-5 rating. Blank input means "no rating".
pub fn parse_rating(raw: &str) -> Result<Option<u8>, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let value = trimmed
        .parse::<u8>()
        .map_err(|_| format!("rating must be a number between 1 and 5, got '{trimmed}'"))?;
    validate_scale(value, "rating")?;
    Ok(Some(value))
}

fn validate_email(email: &str) -> Result<(), String> {
    validate_non_empty(email, "email")?;
    if !email.contains('@') {
        return Err("email must contain '@'".to_string());
    }
    Ok(())
}
