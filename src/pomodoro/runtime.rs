// daily-focus-backend/src/pomodoro/runtime.rs
use chrono::{DateTime, Utc};
use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::models::SessionType;
use crate::pomodoro::controller::{
    BoundSubtask, PomodoroController, TimerDurations, TimerEffect, TimerError, TimerSnapshot,
};
use crate::pomodoro::gateway::PomodoroGateway;

/// Audible cue at the end of a phase.
pub trait ToneSink: Send + Sync {
    fn play(&self) -> std::io::Result<()>;
}

/// Rings the terminal bell of the process running the server.
pub struct TerminalBell;

impl ToneSink for TerminalBell {
    fn play(&self) -> std::io::Result<()> {
        let mut stderr = std::io::stderr();
        stderr.write_all(b"\x07")?;
        stderr.flush()
    }
}

/// Owns the single timer of the running service.
pub struct TimerService {
    controller: Mutex<PomodoroController>,
    gateway: Arc<dyn PomodoroGateway>,
    tone: Arc<dyn ToneSink>,
}

impl TimerService {
    pub fn new(
        controller: PomodoroController,
        gateway: Arc<dyn PomodoroGateway>,
        tone: Arc<dyn ToneSink>,
    ) -> Self {
        TimerService {
            controller: Mutex::new(controller),
            gateway,
            tone,
        }
    }

    // The controller holds plain data, so a poisoned lock is still usable.
    fn controller(&self) -> MutexGuard<'_, PomodoroController> {
        self.controller.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn gateway(&self) -> &Arc<dyn PomodoroGateway> {
        &self.gateway
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        self.controller().snapshot()
    }

    pub fn start(&self, now: DateTime<Utc>) -> TimerSnapshot {
        let (effects, snapshot) = {
            let mut controller = self.controller();
            let effects = controller.start(now);
            (effects, controller.snapshot())
        };
        self.dispatch(effects);
        snapshot
    }

    pub fn pause(&self) -> TimerSnapshot {
        let mut controller = self.controller();
        controller.pause();
        controller.snapshot()
    }

    pub fn toggle(&self, now: DateTime<Utc>) -> TimerSnapshot {
        let (effects, snapshot) = {
            let mut controller = self.controller();
            let effects = controller.toggle(now);
            (effects, controller.snapshot())
        };
        self.dispatch(effects);
        snapshot
    }

    pub fn reset(&self) -> TimerSnapshot {
        let mut controller = self.controller();
        controller.reset();
        controller.snapshot()
    }

    pub fn select_phase(&self, phase: SessionType) -> TimerSnapshot {
        let mut controller = self.controller();
        controller.select_phase(phase);
        controller.snapshot()
    }

    pub fn select_subtask(&self, subtask: BoundSubtask) -> Result<TimerSnapshot, TimerError> {
        let mut controller = self.controller();
        controller.select_subtask(subtask)?;
        Ok(controller.snapshot())
    }

    pub fn release_subtask(&self, subtask_id: Uuid) -> bool {
        let released = self.controller().release_subtask(subtask_id);
        if released {
            log::info!("Released subtask {} from the timer", subtask_id);
        }
        released
    }

    /// Drops whatever subtask is bound, if any.
    pub fn release_current_subtask(&self) -> TimerSnapshot {
        let mut controller = self.controller();
        let bound = controller.snapshot().subtask.map(|s| s.id);
        if let Some(id) = bound {
            controller.release_subtask(id);
        }
        controller.snapshot()
    }

    pub fn apply_durations(&self, durations: TimerDurations) {
        log::info!("Timer durations updated: {:?}", durations);
        self.controller().apply_durations(durations);
    }

    /// Advances the countdown by one second and hands any effects to the
    /// background. Returns the dispatch task, if one was spawned.
    pub fn tick(&self, now: DateTime<Utc>) -> Option<JoinHandle<()>> {
        let effects = self.controller().tick(now);
        self.dispatch(effects)
    }

    fn dispatch(&self, effects: Vec<TimerEffect>) -> Option<JoinHandle<()>> {
        if effects.is_empty() {
            return None;
        }
        let gateway = Arc::clone(&self.gateway);
        let tone = Arc::clone(&self.tone);
        Some(tokio::spawn(run_effects(gateway, tone, effects)))
    }
}

/// Runs one batch in order; failures are logged and the batch continues.
async fn run_effects(
    gateway: Arc<dyn PomodoroGateway>,
    tone: Arc<dyn ToneSink>,
    effects: Vec<TimerEffect>,
) {
    for effect in effects {
        match effect {
            TimerEffect::PlayTone => {
                if let Err(e) = tone.play() {
                    log::warn!("Could not play timer tone: {}", e);
                }
            }
            TimerEffect::SubtaskStarted { subtask_id, at } => {
                if let Err(e) = gateway.mark_subtask_started(subtask_id, at).await {
                    log::error!("Failed to record start of subtask {}: {}", subtask_id, e);
                }
            }
            TimerEffect::SubtaskCompleted { subtask_id, at } => {
                match gateway.mark_subtask_completed(subtask_id, at).await {
                    Ok(()) => log::info!("Subtask {} completed by timer", subtask_id),
                    Err(e) => {
                        log::error!("Failed to complete subtask {}: {}", subtask_id, e)
                    }
                }
            }
            TimerEffect::SessionFinished { record, at } => {
                match gateway.record_session(&record, at).await {
                    Ok(session) => log::info!(
                        "Recorded {} session {} ({} min)",
                        record.session_type,
                        session.id,
                        record.duration_minutes
                    ),
                    Err(e) => log::error!("Failed to record {} session: {}", record.session_type, e),
                }
            }
        }
    }
}

/// Drives the countdown with a one-second interval until aborted.
pub fn spawn_ticker(service: Arc<TimerService>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        // The first tick resolves immediately.
        interval.tick().await;
        loop {
            interval.tick().await;
            service.tick(Utc::now());
        }
    })
}
