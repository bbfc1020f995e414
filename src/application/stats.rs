use crate::application::services::{EmotionService, FocusService, TodoService};
use crate::domain::models::{EmotionStats, FocusStats, TodoStats};
use crate::infrastructure::api_client::{EmotionApi, FocusApi, TodoApi};
use crate::infrastructure::error::InfraError;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StatsCard {
    pub title: &'static str,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suffix: Option<&'static str>,
}

impl fmt::Display for StatsCard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.suffix {
            Some(suffix) => write!(f, "{}: {} {}", self.title, self.value, suffix),
            None => write!(f, "{}: {}", self.title, self.value),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct StatsSummaries {
    pub emotion: Option<EmotionStats>,
    pub focus: Option<FocusStats>,
    pub todo: Option<TodoStats>,
}

/// The six dashboard cards. A summary that could not be loaded shows zeros.
pub fn overview_cards(summaries: &StatsSummaries) -> Vec<StatsCard> {
    let emotion = summaries.emotion.as_ref();
    let focus = summaries.focus.as_ref();
    let todo = summaries.todo.as_ref();

    vec![
        StatsCard {
            title: "Average emotion level",
            value: format!("{:.1}", emotion.map(|stats| stats.average_level).unwrap_or(0.0)),
            suffix: Some("/ 5"),
        },
        StatsCard {
            title: "Most common emotion",
            value: emotion
                .and_then(|stats| stats.most_common_emotion.as_ref())
                .map(|emotion| emotion.label().to_string())
                .unwrap_or_else(|| "none".to_string()),
            suffix: None,
        },
        StatsCard {
            title: "Total focus time",
            value: focus.map(|stats| stats.total_minutes).unwrap_or(0).to_string(),
            suffix: Some("min"),
        },
        StatsCard {
            title: "Average productivity",
            value: format!(
                "{:.1}",
                focus.map(|stats| stats.average_productivity).unwrap_or(0.0)
            ),
            suffix: Some("/ 5"),
        },
        StatsCard {
            title: "Todo completion rate",
            value: format_rate(todo.map(|stats| stats.completion_rate).unwrap_or(0.0)),
            suffix: Some("%"),
        },
        StatsCard {
            title: "Pending todos",
            value: todo.map(|stats| stats.pending).unwrap_or(0).to_string(),
            suffix: None,
        },
    ]
}

fn format_rate(rate: f64) -> String {
    if rate.fract() == 0.0 {
        format!("{rate:.0}")
    } else {
        format!("{rate:.1}")
    }
}

/// Loads the three summaries concurrently. The first failure is returned.
pub async fn load_summaries<E, F, T>(
    emotions: &EmotionService<E>,
    focus: &FocusService<F>,
    todos: &TodoService<T>,
    days: u32,
) -> Result<StatsSummaries, InfraError>
where
    E: EmotionApi,
    F: FocusApi,
    T: TodoApi,
{
    let (emotion, focus, todo) =
        tokio::try_join!(emotions.stats(days), focus.stats(days), todos.stats())?;
    Ok(StatsSummaries {
        emotion: Some(emotion),
        focus: Some(focus),
        todo: Some(todo),
    })
}
