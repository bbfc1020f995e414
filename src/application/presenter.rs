use crate::domain::models::{AiFeedback, EmotionRecord, FocusSession, TodoItem, User};
use crate::domain::timer::TimerSnapshot;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;

pub fn format_timestamp(value: DateTime<Utc>, zone: Tz) -> String {
    value.with_timezone(&zone).format("%Y-%m-%d %H:%M").to_string()
}

pub fn user_line(user: &User) -> String {
    format!("{} <{}> ({})", user.name, user.email, user.timezone)
}

pub fn emotion_line(record: &EmotionRecord, zone: Tz) -> String {
    let mut line = format!(
        "{}  {} {}/5  [{}]",
        format_timestamp(record.recorded_at, zone),
        record.emotion_type.label(),
        record.emotion_level,
        record.id
    );
    if let Some(note) = record.note.as_deref().filter(|note| !note.is_empty()) {
        line.push_str("  ");
        line.push_str(note);
    }
    line
}

pub fn session_line(session: &FocusSession, zone: Tz) -> String {
    let status = match (session.end_time, session.productivity_rating) {
        (None, _) => "open".to_string(),
        (Some(_), Some(rating)) => format!("rated {rating}/5"),
        (Some(_), None) => "ended".to_string(),
    };
    format!(
        "{}  {} {} min  {}  [{}]",
        format_timestamp(session.start_time, zone),
        session.session_type.label(),
        session.duration_minutes,
        status,
        session.id
    )
}

pub fn todo_line(todo: &TodoItem, zone: Tz, now: DateTime<Utc>) -> String {
    let mark = if todo.completed { "[x]" } else { "[ ]" };
    let mut line = format!("{mark} {}  (p{})  [{}]", todo.title, todo.priority, todo.id);
    if let Some(due) = todo.due_date {
        line.push_str(&format!("  due {}", format_timestamp(due, zone)));
        if todo.is_overdue_at(now) {
            line.push_str(" overdue");
        }
    }
    line
}

pub fn feedback_line(feedback: &AiFeedback, zone: Tz) -> String {
    let when = feedback
        .created_at
        .map(|created| format_timestamp(created, zone))
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{when}  {}  {}",
        feedback.feedback_type.as_deref().unwrap_or("feedback"),
        feedback.feedback_text
    )
}

pub fn timer_line(snapshot: &TimerSnapshot) -> String {
    format!(
        "{} {}  {:>5.1}%  {}",
        snapshot.display,
        snapshot.session_type.label(),
        snapshot.progress_percent,
        snapshot.phase
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::sample_todo;
    use crate::domain::models::{EmotionType, SessionType};
    use chrono::TimeZone;

    #[test]
    fn timestamps_render_in_user_zone() {
        let value = Utc.with_ymd_and_hms(2026, 2, 16, 23, 30, 0).unwrap();
        assert_eq!(format_timestamp(value, chrono_tz::Asia::Seoul), "2026-02-17 08:30");
        assert_eq!(format_timestamp(value, Tz::UTC), "2026-02-16 23:30");
    }

    #[test]
    fn emotion_line_includes_note() {
        let record = EmotionRecord {
            id: "e-1".to_string(),
            user_id: "u-1".to_string(),
            emotion_level: 2,
            emotion_type: EmotionType::Sad,
            note: Some("rainy".to_string()),
            ai_analysis: None,
            recorded_at: Utc.with_ymd_and_hms(2026, 2, 16, 0, 0, 0).unwrap(),
            created_at: None,
        };
        assert_eq!(
            emotion_line(&record, Tz::UTC),
            "2026-02-16 00:00  Sad 2/5  [e-1]  rainy"
        );
    }

    #[test]
    fn session_line_shows_rating() {
        let session = FocusSession {
            id: "s-1".to_string(),
            user_id: "u-1".to_string(),
            start_time: Utc.with_ymd_and_hms(2026, 2, 16, 9, 0, 0).unwrap(),
            end_time: Some(Utc.with_ymd_and_hms(2026, 2, 16, 9, 25, 0).unwrap()),
            duration_minutes: 25,
            session_type: SessionType::Pomodoro,
            productivity_rating: Some(4),
            notes: None,
            created_at: None,
        };
        assert_eq!(
            session_line(&session, Tz::UTC),
            "2026-02-16 09:00  Pomodoro 25 min  rated 4/5  [s-1]"
        );
    }

    #[test]
    fn overdue_todos_are_marked() {
        let mut todo = sample_todo("t-1", "taxes", false);
        todo.due_date = Some(Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap());
        let now = Utc.with_ymd_and_hms(2026, 2, 16, 0, 0, 0).unwrap();
        assert_eq!(
            todo_line(&todo, Tz::UTC, now),
            "[ ] taxes  (p1)  [t-1]  due 2026-02-01 00:00 overdue"
        );
    }
}
