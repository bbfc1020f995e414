use crate::domain::models::SessionType;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TimerPreset {
    pub session_type: SessionType,
    pub duration_minutes: u32,
}

impl TimerPreset {
    pub const fn new(session_type: SessionType, duration_minutes: u32) -> Self {
        Self {
            session_type,
            duration_minutes,
        }
    }

    pub fn total_seconds(self) -> u32 {
        self.duration_minutes.saturating_mul(60)
    }
}

pub const DEFAULT_PRESETS: [TimerPreset; 3] = [
    TimerPreset::new(SessionType::Pomodoro, 25),
    TimerPreset::new(SessionType::Break, 5),
    TimerPreset::new(SessionType::DeepWork, 45),
];

pub fn default_presets() -> Vec<TimerPreset> {
    DEFAULT_PRESETS.to_vec()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerPhase {
    Idle,
    Running,
    Paused,
}

impl TimerPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Paused => "paused",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Not running; the tick was ignored.
    Inactive,
    Counting { remaining_seconds: u32 },
    /// Countdown reached zero. The timer is idle again at the full duration.
    Expired { session_id: Option<String> },
}

/// Countdown state of the focus screen. Holds no clock of its own: the
/// caller feeds one `tick` per elapsed second while running.
#[derive(Debug, Clone)]
pub struct FocusTimer {
    preset: TimerPreset,
    phase: TimerPhase,
    remaining_seconds: u32,
    session_id: Option<String>,
}

impl Default for FocusTimer {
    fn default() -> Self {
        Self::new(DEFAULT_PRESETS[0])
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TimerSnapshot {
    pub phase: String,
    pub session_type: SessionType,
    pub duration_minutes: u32,
    pub remaining_seconds: u32,
    pub display: String,
    pub progress_percent: f64,
    pub session_id: Option<String>,
}

impl FocusTimer {
    pub fn new(preset: TimerPreset) -> Self {
        Self {
            preset,
            phase: TimerPhase::Idle,
            remaining_seconds: preset.total_seconds(),
            session_id: None,
        }
    }

    pub fn preset(&self) -> TimerPreset {
        self.preset
    }

    pub fn phase(&self) -> TimerPhase {
        self.phase
    }

    pub fn remaining_seconds(&self) -> u32 {
        self.remaining_seconds
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn is_idle(&self) -> bool {
        self.phase == TimerPhase::Idle
    }

    /// Returns whether the selection took effect. Ignored while a session is open.
    pub fn select_preset(&mut self, preset: TimerPreset) -> bool {
        if self.phase != TimerPhase::Idle {
            return false;
        }
        self.preset = preset;
        self.remaining_seconds = preset.total_seconds();
        true
    }

    /// Starts counting down for a session the server has already created.
    pub fn begin(&mut self, session_id: impl Into<String>) -> Result<(), String> {
        if self.phase != TimerPhase::Idle {
            return Err(format!("cannot start while {}", self.phase.as_str()));
        }
        self.phase = TimerPhase::Running;
        self.remaining_seconds = self.preset.total_seconds();
        self.session_id = Some(session_id.into());
        Ok(())
    }

    pub fn pause(&mut self) -> Result<(), String> {
        if self.phase != TimerPhase::Running {
            return Err(format!("cannot pause while {}", self.phase.as_str()));
        }
        self.phase = TimerPhase::Paused;
        Ok(())
    }

    pub fn resume(&mut self) -> Result<(), String> {
        if self.phase != TimerPhase::Paused {
            return Err(format!("cannot resume while {}", self.phase.as_str()));
        }
        self.phase = TimerPhase::Running;
        Ok(())
    }

    pub fn tick(&mut self) -> TickOutcome {
        if self.phase != TimerPhase::Running {
            return TickOutcome::Inactive;
        }
        self.remaining_seconds = self.remaining_seconds.saturating_sub(1);
        if self.remaining_seconds > 0 {
            return TickOutcome::Counting {
                remaining_seconds: self.remaining_seconds,
            };
        }
        let session_id = self.session_id.take();
        self.reset();
        TickOutcome::Expired { session_id }
    }

    /// Ends an open session early. Returns the id of the session that was open, if any.
    pub fn stop(&mut self) -> Option<String> {
        if self.phase == TimerPhase::Idle {
            return None;
        }
        let session_id = self.session_id.take();
        self.reset();
        session_id
    }

    pub fn progress_percent(&self) -> f64 {
        let total = self.preset.total_seconds();
        if total == 0 {
            return 0.0;
        }
        let elapsed = total.saturating_sub(self.remaining_seconds);
        f64::from(elapsed) / f64::from(total) * 100.0
    }

    pub fn display(&self) -> String {
        format_clock(self.remaining_seconds)
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot {
            phase: self.phase.as_str().to_string(),
            session_type: self.preset.session_type,
            duration_minutes: self.preset.duration_minutes,
            remaining_seconds: self.remaining_seconds,
            display: self.display(),
            progress_percent: self.progress_percent(),
            session_id: self.session_id.clone(),
        }
    }

    fn reset(&mut self) {
        self.phase = TimerPhase::Idle;
        self.remaining_seconds = self.preset.total_seconds();
        self.session_id = None;
    }
}

pub fn format_clock(total_seconds: u32) -> String {
    format!("{:02}:{:02}", total_seconds / 60, total_seconds % 60)
}
