pub mod ai;
pub mod auth;
pub mod emotion;
pub mod focus;
pub mod todo;

use crate::infrastructure::error::InfraError;
use chrono::{DateTime, Utc};
use std::sync::Arc;

pub use ai::AiService;
pub use auth::AuthService;
pub use emotion::EmotionService;
pub use focus::FocusService;
pub use todo::TodoService;

pub const DEFAULT_STATS_DAYS: u32 = 7;
pub const MAX_STATS_DAYS: u32 = 90;

pub type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub fn system_now() -> NowProvider {
    Arc::new(Utc::now)
}

pub fn validate_stats_days(days: u32) -> Result<u32, InfraError> {
    if !(1..=MAX_STATS_DAYS).contains(&days) {
        return Err(InfraError::Validation(format!(
            "days must be between 1 and {MAX_STATS_DAYS}"
        )));
    }
    Ok(days)
}

fn params_key(pairs: &[(&'static str, String)]) -> String {
    pairs
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join("&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_window_is_one_to_ninety_days() {
        assert!(validate_stats_days(0).is_err());
        assert_eq!(validate_stats_days(1).expect("1"), 1);
        assert_eq!(validate_stats_days(90).expect("90"), 90);
        assert!(validate_stats_days(91).is_err());
    }

    #[test]
    fn params_key_is_stable() {
        let key = params_key(&[("skip", "0".to_string()), ("limit", "20".to_string())]);
        assert_eq!(key, "skip=0&limit=20");
        assert_eq!(params_key(&[]), "");
    }
}
