use crate::application::services::FocusService;
use crate::domain::models::{EndFocusSession, FocusSession};
use crate::domain::timer::{FocusTimer, TickOutcome, TimerPhase, TimerPreset, TimerSnapshot};
use crate::infrastructure::api_client::FocusApi;
use crate::infrastructure::error::InfraError;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Collects the productivity rating and notes once a countdown ends.
#[async_trait]
pub trait SessionReviewer: Send + Sync {
    /// An empty review closes the session without a rating.
    async fn review(&self, session_id: &str) -> EndFocusSession;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerCommand {
    Pause,
    Resume,
    Stop,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TimerEvent {
    Inactive,
    Counting { remaining_seconds: u32 },
    Completed(FocusSession),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "session", rename_all = "snake_case")]
pub enum RunOutcome {
    Completed(FocusSession),
    Stopped(Option<FocusSession>),
}

/// A close request that failed with a retryable error. Kept until
/// `retry_close` succeeds or it is discarded; a new session cannot start
/// meanwhile. Rejections such as 404 or 400 are never kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingClose {
    pub session_id: String,
    pub review: EndFocusSession,
    pub stopped: bool,
}

impl PendingClose {
    /// The outcome the interrupted run would have reported.
    pub fn outcome(&self, session: FocusSession) -> RunOutcome {
        if self.stopped {
            RunOutcome::Stopped(Some(session))
        } else {
            RunOutcome::Completed(session)
        }
    }
}

pub struct FocusTimerController<A, R>
where
    A: FocusApi,
    R: SessionReviewer,
{
    service: FocusService<A>,
    reviewer: Arc<R>,
    timer: FocusTimer,
    pending_close: Option<PendingClose>,
}

impl<A, R> FocusTimerController<A, R>
where
    A: FocusApi,
    R: SessionReviewer,
{
    pub fn new(service: FocusService<A>, reviewer: Arc<R>, preset: TimerPreset) -> Self {
        Self {
            service,
            reviewer,
            timer: FocusTimer::new(preset),
            pending_close: None,
        }
    }

    pub fn timer(&self) -> &FocusTimer {
        &self.timer
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        self.timer.snapshot()
    }

    pub fn pending_close(&self) -> Option<&PendingClose> {
        self.pending_close.as_ref()
    }

    pub fn select_preset(&mut self, preset: TimerPreset) -> bool {
        self.timer.select_preset(preset)
    }

    /// Creates the server session, then starts counting. A failed request
    /// leaves the timer idle.
    pub async fn start(&mut self) -> Result<FocusSession, InfraError> {
        if !self.timer.is_idle() {
            return Err(InfraError::Timer(format!(
                "cannot start while {}",
                self.timer.phase().as_str()
            )));
        }
        if let Some(pending) = &self.pending_close {
            return Err(InfraError::Timer(format!(
                "session {} has not been closed yet; retry the close first",
                pending.session_id
            )));
        }

        let session = self.service.start_preset(self.timer.preset()).await?;
        self.timer
            .begin(session.id.clone())
            .map_err(InfraError::Timer)?;
        info!(session_id = %session.id, minutes = session.duration_minutes, "focus session started");
        Ok(session)
    }

    pub fn pause(&mut self) -> Result<(), InfraError> {
        self.timer.pause().map_err(InfraError::Timer)
    }

    pub fn resume(&mut self) -> Result<(), InfraError> {
        self.timer.resume().map_err(InfraError::Timer)
    }

    /// Ends the open session early, without a rating.
    pub async fn stop(&mut self) -> Result<Option<FocusSession>, InfraError> {
        let Some(session_id) = self.timer.stop() else {
            return Ok(None);
        };
        info!(session_id = %session_id, "focus session stopped");
        self.close(session_id, EndFocusSession::default(), true)
            .await
            .map(Some)
    }

    /// One second of countdown. On expiry the reviewer is asked for a rating
    /// and the session is closed once.
    pub async fn tick(&mut self) -> Result<TimerEvent, InfraError> {
        match self.timer.tick() {
            TickOutcome::Inactive => Ok(TimerEvent::Inactive),
            TickOutcome::Counting { remaining_seconds } => Ok(TimerEvent::Counting { remaining_seconds }),
            TickOutcome::Expired { session_id: None } => Ok(TimerEvent::Inactive),
            TickOutcome::Expired {
                session_id: Some(session_id),
            } => {
                info!(session_id = %session_id, "focus session completed");
                let review = self.reviewer.review(&session_id).await;
                let session = self.close(session_id, review, false).await?;
                Ok(TimerEvent::Completed(session))
            }
        }
    }

    pub async fn retry_close(&mut self) -> Result<Option<FocusSession>, InfraError> {
        let Some(pending) = self.pending_close.take() else {
            return Ok(None);
        };
        self.close(pending.session_id, pending.review, pending.stopped)
            .await
            .map(Some)
    }

    /// Drops a pending close the caller has given up on, so a new session
    /// can start. The server-side session stays open.
    pub fn discard_pending_close(&mut self) -> Option<PendingClose> {
        let discarded = self.pending_close.take();
        if let Some(pending) = &discarded {
            warn!(session_id = %pending.session_id, "pending close discarded");
        }
        discarded
    }

    async fn close(
        &mut self,
        session_id: String,
        review: EndFocusSession,
        stopped: bool,
    ) -> Result<FocusSession, InfraError> {
        let review = match review.validate() {
            Ok(()) => review,
            Err(message) => {
                warn!(session_id = %session_id, %message, "discarding invalid review");
                EndFocusSession::default()
            }
        };
        match self.service.end(&session_id, &review).await {
            Ok(session) => {
                debug!(session_id = %session.id, "focus session closed");
                Ok(session)
            }
            Err(error) if error.is_retryable() => {
                warn!(session_id = %session_id, error = %error, "closing focus session failed");
                self.pending_close = Some(PendingClose {
                    session_id,
                    review,
                    stopped,
                });
                Err(error)
            }
            Err(error) => {
                warn!(session_id = %session_id, error = %error, "server rejected focus session close");
                Err(error)
            }
        }
    }

    /// Drives the countdown until the session completes or is stopped.
    /// Ticks only while running. When the command channel closes the run
    /// continues to completion, unless paused, in which case it stops.
    pub async fn run<F>(
        &mut self,
        commands: &mut mpsc::Receiver<TimerCommand>,
        mut on_update: F,
    ) -> Result<RunOutcome, InfraError>
    where
        F: FnMut(&TimerSnapshot),
    {
        let mut ticker = time::interval_at(Instant::now() + TICK_PERIOD, TICK_PERIOD);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut commands_open = true;

        loop {
            match self.timer.phase() {
                TimerPhase::Idle => return Ok(RunOutcome::Stopped(None)),
                TimerPhase::Paused if !commands_open => {
                    return self.stop().await.map(RunOutcome::Stopped);
                }
                _ => {}
            }
            let running = self.timer.phase() == TimerPhase::Running;

            tokio::select! {
                _ = ticker.tick(), if running => {
                    match self.tick().await? {
                        TimerEvent::Completed(session) => return Ok(RunOutcome::Completed(session)),
                        TimerEvent::Counting { .. } => on_update(&self.timer.snapshot()),
                        TimerEvent::Inactive => {}
                    }
                }
                command = commands.recv(), if commands_open => match command {
                    Some(TimerCommand::Pause) => {
                        if self.pause().is_ok() {
                            on_update(&self.timer.snapshot());
                        }
                    }
                    Some(TimerCommand::Resume) => {
                        if self.resume().is_ok() {
                            ticker.reset();
                            on_update(&self.timer.snapshot());
                        }
                    }
                    Some(TimerCommand::Stop) => {
                        return self.stop().await.map(RunOutcome::Stopped);
                    }
                    None => commands_open = false,
                },
            }
        }
    }
}

/// Re-reads the open session on a fixed interval and publishes it. Errors
/// are logged and the next poll goes ahead.
pub struct CurrentSessionPoller {
    receiver: watch::Receiver<Option<FocusSession>>,
    handle: JoinHandle<()>,
}

impl CurrentSessionPoller {
    pub fn spawn<A>(service: FocusService<A>, period: Duration) -> Self
    where
        A: FocusApi + 'static,
    {
        let (sender, receiver) = watch::channel(None);
        let handle = tokio::spawn(async move {
            let mut ticker = time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                match service.refresh_current().await {
                    Ok(current) => {
                        if sender.send(current).is_err() {
                            break;
                        }
                    }
                    Err(error) => warn!(error = %error, "polling current focus session failed"),
                }
            }
        });
        Self { receiver, handle }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<FocusSession>> {
        self.receiver.clone()
    }

    pub fn latest(&self) -> Option<FocusSession> {
        self.receiver.borrow().clone()
    }

    pub fn abort(&self) {
        self.handle.abort();
    }
}

impl Drop for CurrentSessionPoller {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
