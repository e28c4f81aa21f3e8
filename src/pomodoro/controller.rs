// daily-focus-backend/src/pomodoro/controller.rs
// Pomodoro countdown state machine. The controller never performs I/O: every
// command returns the side effects it wants executed (tone, store writes) as
// an ordered list of `TimerEffect`s, and the runtime decides how to run them.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    PomodoroSettings, SessionType, Subtask, DEFAULT_LONG_BREAK, DEFAULT_SESSIONS_UNTIL_LONG_BREAK,
    DEFAULT_SHORT_BREAK, DEFAULT_WORK_DURATION,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimerError {
    #[error("Cannot change the selected subtask while the timer is running")]
    SelectionWhileRunning,
    #[error("Subtask {0} has no positive estimated_minutes")]
    InvalidEstimate(Uuid),
    #[error("Subtask {0} is already completed")]
    SubtaskAlreadyCompleted(Uuid),
}

/// Configured phase lengths in minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimerDurations {
    pub work: u32,
    pub short_break: u32,
    pub long_break: u32,
    pub sessions_until_long_break: u32,
}

impl Default for TimerDurations {
    fn default() -> Self {
        TimerDurations {
            work: DEFAULT_WORK_DURATION as u32,
            short_break: DEFAULT_SHORT_BREAK as u32,
            long_break: DEFAULT_LONG_BREAK as u32,
            sessions_until_long_break: DEFAULT_SESSIONS_UNTIL_LONG_BREAK as u32,
        }
    }
}

impl From<&PomodoroSettings> for TimerDurations {
    // Non-positive stored values fall back to the defaults.
    fn from(settings: &PomodoroSettings) -> Self {
        let positive = |value: i32, fallback: u32| -> u32 {
            u32::try_from(value).ok().filter(|v| *v > 0).unwrap_or(fallback)
        };
        let defaults = TimerDurations::default();

        TimerDurations {
            work: positive(settings.work_duration, defaults.work),
            short_break: positive(settings.short_break, defaults.short_break),
            long_break: positive(settings.long_break, defaults.long_break),
            sessions_until_long_break: positive(
                settings.sessions_until_long_break,
                defaults.sessions_until_long_break,
            ),
        }
    }
}

impl TimerDurations {
    pub fn minutes_for(&self, phase: SessionType) -> u32 {
        match phase {
            SessionType::Work => self.work,
            SessionType::ShortBreak => self.short_break,
            SessionType::LongBreak => self.long_break,
        }
    }
}

/// Subtask the countdown is anchored to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoundSubtask {
    pub id: Uuid,
    pub task_id: Option<Uuid>,
    pub title: String,
    pub estimated_minutes: u32,
    pub started: bool,
}

impl TryFrom<&Subtask> for BoundSubtask {
    type Error = TimerError;

    fn try_from(subtask: &Subtask) -> Result<Self, Self::Error> {
        if subtask.completed {
            return Err(TimerError::SubtaskAlreadyCompleted(subtask.id));
        }
        let estimated_minutes = u32::try_from(subtask.estimated_minutes)
            .ok()
            .filter(|m| *m > 0)
            .ok_or(TimerError::InvalidEstimate(subtask.id))?;

        Ok(BoundSubtask {
            id: subtask.id,
            task_id: subtask.task_id,
            title: subtask.title.clone(),
            estimated_minutes,
            started: subtask.started_at.is_some(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionMode {
    /// Plain pomodoro, nothing bound.
    Quick,
    Bound(BoundSubtask),
    /// Break length derived from the subtask that just finished.
    DerivedBreak { minutes: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clock {
    Paused { remaining: u32 },
    Running { remaining: u32 },
}

impl Clock {
    pub fn remaining(&self) -> u32 {
        match *self {
            Clock::Paused { remaining } | Clock::Running { remaining } => remaining,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Clock::Running { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionRecord {
    pub session_type: SessionType,
    pub duration_minutes: u32,
    pub task_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerEffect {
    PlayTone,
    SubtaskStarted { subtask_id: Uuid, at: DateTime<Utc> },
    SubtaskCompleted { subtask_id: Uuid, at: DateTime<Utc> },
    SessionFinished { record: SessionRecord, at: DateTime<Utc> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimerSnapshot {
    pub phase: SessionType,
    pub running: bool,
    pub remaining_seconds: u32,
    pub display: String,
    pub completed_work_sessions: u32,
    pub subtask: Option<BoundSubtask>,
    pub derived_break_minutes: Option<u32>,
    pub durations: TimerDurations,
}

/// `max(1, round(estimate / 5))`; estimates are whole minutes so `x.5` never occurs.
pub fn derived_break_minutes(estimated_minutes: u32) -> u32 {
    ((estimated_minutes + 2) / 5).max(1)
}

// Saturates so an oversized duration pins the clock instead of wrapping.
fn seconds(minutes: u32) -> u32 {
    minutes.saturating_mul(60)
}

pub fn format_countdown(seconds: u32) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

#[derive(Debug, Clone)]
pub struct PomodoroController {
    phase: SessionType,
    clock: Clock,
    mode: SessionMode,
    completed_work_sessions: u32,
    durations: TimerDurations,
}

impl PomodoroController {
    pub fn new(durations: TimerDurations) -> Self {
        PomodoroController {
            phase: SessionType::Work,
            clock: Clock::Paused {
                remaining: seconds(durations.work),
            },
            mode: SessionMode::Quick,
            completed_work_sessions: 0,
            durations,
        }
    }

    pub fn phase(&self) -> SessionType {
        self.phase
    }

    pub fn clock(&self) -> Clock {
        self.clock
    }

    pub fn mode(&self) -> &SessionMode {
        &self.mode
    }

    pub fn completed_work_sessions(&self) -> u32 {
        self.completed_work_sessions
    }

    /// New settings only apply from the next reseed.
    pub fn apply_durations(&mut self, durations: TimerDurations) {
        self.durations = durations;
    }

    pub fn select_subtask(&mut self, subtask: BoundSubtask) -> Result<(), TimerError> {
        if self.clock.is_running() {
            return Err(TimerError::SelectionWhileRunning);
        }

        self.phase = SessionType::Work;
        self.clock = Clock::Paused {
            remaining: seconds(subtask.estimated_minutes),
        };
        self.mode = SessionMode::Bound(subtask);
        Ok(())
    }

    /// Drops the binding if `subtask_id` is the bound subtask. A paused
    /// countdown is reseeded from the configured duration.
    pub fn release_subtask(&mut self, subtask_id: Uuid) -> bool {
        match &self.mode {
            SessionMode::Bound(bound) if bound.id == subtask_id => {}
            _ => return false,
        }

        self.mode = SessionMode::Quick;
        if !self.clock.is_running() {
            self.clock = Clock::Paused {
                remaining: seconds(self.durations.minutes_for(self.phase)),
            };
        }
        true
    }

    pub fn start(&mut self, now: DateTime<Utc>) -> Vec<TimerEffect> {
        let Clock::Paused { remaining } = self.clock else {
            return Vec::new();
        };

        let mut effects = Vec::new();
        if let SessionMode::Bound(bound) = &mut self.mode {
            if !bound.started {
                bound.started = true;
                effects.push(TimerEffect::SubtaskStarted {
                    subtask_id: bound.id,
                    at: now,
                });
            }
        }

        self.clock = Clock::Running { remaining };
        effects
    }

    pub fn pause(&mut self) {
        if let Clock::Running { remaining } = self.clock {
            self.clock = Clock::Paused { remaining };
        }
    }

    pub fn toggle(&mut self, now: DateTime<Utc>) -> Vec<TimerEffect> {
        if self.clock.is_running() {
            self.pause();
            Vec::new()
        } else {
            self.start(now)
        }
    }

    /// One second of countdown. Finishing the phase happens on the tick that
    /// would take the remaining time to zero.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Vec<TimerEffect> {
        match self.clock {
            Clock::Running { remaining } if remaining <= 1 => self.finish_phase(now),
            Clock::Running { remaining } => {
                self.clock = Clock::Running {
                    remaining: remaining - 1,
                };
                Vec::new()
            }
            Clock::Paused { .. } => Vec::new(),
        }
    }

    pub fn select_phase(&mut self, phase: SessionType) {
        if let SessionMode::DerivedBreak { .. } = self.mode {
            self.mode = SessionMode::Quick;
        }
        self.phase = phase;

        let minutes = match (&self.mode, phase) {
            (SessionMode::Bound(bound), SessionType::Work) => bound.estimated_minutes,
            _ => self.durations.minutes_for(phase),
        };
        self.clock = Clock::Paused {
            remaining: seconds(minutes),
        };
    }

    pub fn reset(&mut self) {
        let minutes = match &self.mode {
            SessionMode::Bound(bound) => bound.estimated_minutes,
            SessionMode::DerivedBreak { minutes } => *minutes,
            SessionMode::Quick => self.durations.minutes_for(self.phase),
        };
        self.clock = Clock::Paused {
            remaining: seconds(minutes),
        };
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        let (subtask, derived_break_minutes) = match &self.mode {
            SessionMode::Quick => (None, None),
            SessionMode::Bound(bound) => (Some(bound.clone()), None),
            SessionMode::DerivedBreak { minutes } => (None, Some(*minutes)),
        };

        TimerSnapshot {
            phase: self.phase,
            running: self.clock.is_running(),
            remaining_seconds: self.clock.remaining(),
            display: format_countdown(self.clock.remaining()),
            completed_work_sessions: self.completed_work_sessions,
            subtask,
            derived_break_minutes,
            durations: self.durations,
        }
    }

    fn finish_phase(&mut self, now: DateTime<Utc>) -> Vec<TimerEffect> {
        let finished = self.phase;
        let mut effects = vec![TimerEffect::PlayTone];

        let mode = std::mem::replace(&mut self.mode, SessionMode::Quick);
        let (duration_minutes, task_id, next_mode) = match mode {
            SessionMode::Bound(bound) if finished == SessionType::Work => {
                effects.push(TimerEffect::SubtaskCompleted {
                    subtask_id: bound.id,
                    at: now,
                });
                let minutes = derived_break_minutes(bound.estimated_minutes);
                (
                    bound.estimated_minutes,
                    bound.task_id,
                    SessionMode::DerivedBreak { minutes },
                )
            }
            SessionMode::Bound(bound) => {
                (bound.estimated_minutes, bound.task_id, SessionMode::Bound(bound))
            }
            SessionMode::DerivedBreak { minutes } => {
                (minutes, None, SessionMode::DerivedBreak { minutes })
            }
            SessionMode::Quick => (self.durations.minutes_for(finished), None, SessionMode::Quick),
        };

        effects.push(TimerEffect::SessionFinished {
            record: SessionRecord {
                session_type: finished,
                duration_minutes,
                task_id,
            },
            at: now,
        });

        let next_phase = if finished == SessionType::Work {
            self.completed_work_sessions += 1;
            let cycle = self.durations.sessions_until_long_break.max(1);
            if self.completed_work_sessions % cycle == 0 {
                SessionType::LongBreak
            } else {
                SessionType::ShortBreak
            }
        } else {
            SessionType::Work
        };

        self.mode = match next_mode {
            SessionMode::DerivedBreak { .. } if finished.is_break() => SessionMode::Quick,
            other => other,
        };
        self.phase = next_phase;

        let minutes = match (&self.mode, next_phase) {
            (SessionMode::Bound(bound), SessionType::Work) => bound.estimated_minutes,
            (SessionMode::DerivedBreak { minutes }, _) => *minutes,
            _ => self.durations.minutes_for(next_phase),
        };
        self.clock = Clock::Paused {
            remaining: seconds(minutes),
        };

        effects
    }
}
