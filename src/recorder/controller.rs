//! Recording controller
//!
//! Owns the loop state and drives the capture session, the trimmer and the
//! media library. Every input (user triggers, timer phases, device finish
//! reports, the watchdog) arrives as a message and is handled one at a time
//! on the controller task; the state guards are the only concurrency control.

use super::state::{RecorderEvent, RecordingState, Trigger};
use super::timer::SegmentTimer;
use super::watchdog::Watchdog;
use crate::capture::{
    AuthorizationStatus, CameraAuthorization, CameraDevice, CaptureSession, FinishNotifier,
    RecordingFinished,
};
use crate::config::LoopConfig;
use crate::export::{ClipTrimmer, ExportEngine, PendingSegment};
use crate::library::{MediaSink, ScratchStore};
use crate::utils::{AppError, AppResult, ErrorResponse};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;

/// Buffered events per subscriber before it starts lagging
const EVENT_CAPACITY: usize = 256;

/// Directory under scratch storage that trimmed clips are written to
const CLIPS_DIR: &str = "clips";

/// External collaborators the controller drives
pub struct Collaborators {
    pub camera: Arc<dyn CameraDevice>,
    pub authorization: Arc<dyn CameraAuthorization>,
    pub engine: Arc<dyn ExportEngine>,
    pub library: Arc<dyn MediaSink>,
    pub scratch: Arc<dyn ScratchStore>,
}

enum Message {
    Start,
    Stop,
    StopSession,
    UpdateConfig(LoopConfig),
    SetZoom(f64),
    Shutdown(oneshot::Sender<()>),
    PhaseComplete { epoch: u64 },
    RecordingFinished(RecordingFinished),
    WatchdogFired { epoch: u64 },
}

#[derive(Default)]
struct Status {
    state: RwLock<RecordingState>,
    progress: RwLock<f64>,
}

/// Cloneable front door to a running controller.
///
/// Sends never block and never fail loudly; once the controller has shut
/// down they are dropped with a warning.
#[derive(Clone)]
pub struct RecorderHandle {
    tx: mpsc::UnboundedSender<Message>,
    status: Arc<Status>,
    events: broadcast::Sender<RecorderEvent>,
    config: watch::Receiver<LoopConfig>,
}

impl RecorderHandle {
    fn send(&self, message: Message) {
        if self.tx.send(message).is_err() {
            tracing::warn!("Recording controller is no longer running");
        }
    }

    /// Start the loop (no-op while it is already running)
    pub fn start_recording(&self) {
        self.send(Message::Start);
    }

    /// Save the current moment once the post-roll has been captured
    pub fn stop_recording(&self) {
        self.send(Message::Stop);
    }

    /// Tear down the session without saving, e.g. when backgrounded
    pub fn stop_session(&self) {
        self.send(Message::StopSession);
    }

    /// Replace the configuration; applies from the next phase
    pub fn update_config(&self, config: LoopConfig) {
        self.send(Message::UpdateConfig(config));
    }

    pub fn set_zoom(&self, factor: f64) {
        self.send(Message::SetZoom(factor));
    }

    /// Stop the session and the controller task
    pub async fn shutdown(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.send(Message::Shutdown(ack_tx));
        let _ = ack_rx.await;
    }

    pub fn state(&self) -> RecordingState {
        *self.status.state.read()
    }

    pub fn progress(&self) -> f64 {
        *self.status.progress.read()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RecorderEvent> {
        self.events.subscribe()
    }

    /// Configuration currently applied by the controller
    pub fn config(&self) -> LoopConfig {
        self.config.borrow().clone()
    }

    /// Follow configuration changes, e.g. from trigger tasks
    pub fn watch_config(&self) -> watch::Receiver<LoopConfig> {
        self.config.clone()
    }
}

pub struct RecordingController {
    config: LoopConfig,
    state: RecordingState,

    session: CaptureSession,
    authorization: Arc<dyn CameraAuthorization>,
    trimmer: ClipTrimmer,
    library: Arc<dyn MediaSink>,
    scratch: Arc<dyn ScratchStore>,

    timer: SegmentTimer,
    /// Identifies the current timer phase; completions from older phases
    /// are dropped
    phase_epoch: u64,

    watchdog: Watchdog,
    watchdog_epoch: u64,
    /// The watchdog fired while a restart was not allowed
    watchdog_overdue: bool,

    /// File stopped at the end of the post-roll, waiting for its finish report
    awaiting_finish: Option<PathBuf>,
    /// Files stopped by a teardown; their finish reports are discarded
    abandoned: HashSet<PathBuf>,

    // Weak so the channel closes once every handle is gone
    tx: mpsc::WeakUnboundedSender<Message>,
    status: Arc<Status>,
    events: broadcast::Sender<RecorderEvent>,
    config_tx: watch::Sender<LoopConfig>,
}

impl RecordingController {
    /// Spawn the controller task. Scratch storage is cleared before the
    /// first message is handled. An invalid `config` is replaced by the
    /// defaults.
    pub fn spawn(config: LoopConfig, collaborators: Collaborators) -> (RecorderHandle, JoinHandle<()>) {
        let config = match config.validate() {
            Ok(()) => config,
            Err(e) => {
                tracing::error!("{}, starting with defaults", e);
                LoopConfig::default()
            }
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (config_tx, config_rx) = watch::channel(config.clone());
        let status = Arc::new(Status::default());

        let scratch_dir = collaborators.scratch.dir().to_path_buf();
        let controller = Self {
            timer: SegmentTimer::new(config.tick_interval()),
            config,
            state: RecordingState::NotStarted,
            session: CaptureSession::new(collaborators.camera, scratch_dir.clone()),
            authorization: collaborators.authorization,
            trimmer: ClipTrimmer::new(collaborators.engine, scratch_dir.join(CLIPS_DIR)),
            library: collaborators.library,
            scratch: collaborators.scratch,
            phase_epoch: 0,
            watchdog: Watchdog::new(),
            watchdog_epoch: 0,
            watchdog_overdue: false,
            awaiting_finish: None,
            abandoned: HashSet::new(),
            tx: tx.downgrade(),
            status: status.clone(),
            events: events.clone(),
            config_tx,
        };

        let handle = RecorderHandle {
            tx,
            status,
            events,
            config: config_rx,
        };
        let task = tokio::spawn(controller.run(rx));

        (handle, task)
    }

    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Message>) {
        if let Err(e) = self.scratch.clear().await {
            tracing::warn!("Failed to clear scratch storage: {}", e);
        }

        while let Some(message) = rx.recv().await {
            if let Message::Shutdown(ack) = message {
                self.stop_session().await;
                let _ = ack.send(());
                tracing::info!("Recording controller shut down");
                return;
            }

            if let Err(e) = self.handle(message).await {
                self.report(e);
            }
        }

        // Every handle was dropped
        self.stop_session().await;
        tracing::info!("Recording controller stopped");
    }

    async fn handle(&mut self, message: Message) -> AppResult<()> {
        match message {
            Message::Start => self.setup_and_start().await,
            Message::Stop => self.stop_recording(),
            Message::StopSession => {
                self.stop_session().await;
                Ok(())
            }
            Message::UpdateConfig(config) => self.apply_config(config),
            Message::SetZoom(factor) => {
                let zoom = self.session.set_zoom(factor);
                tracing::debug!("Zoom set to {:.2}", zoom);
                Ok(())
            }
            Message::PhaseComplete { epoch } => self.on_phase_complete(epoch).await,
            Message::RecordingFinished(finished) => self.on_recording_finished(finished).await,
            Message::WatchdogFired { epoch } => self.on_watchdog(epoch).await,
            Message::Shutdown(ack) => {
                let _ = ack.send(());
                Ok(())
            }
        }
    }

    fn report(&self, error: AppError) {
        if let AppError::GuardViolation { .. } = error {
            tracing::debug!("{}", error);
            return;
        }

        tracing::warn!("{}", error);
        let _ = self
            .events
            .send(RecorderEvent::Error(ErrorResponse::from(&error)));
    }

    // =========================================================================
    // State
    // =========================================================================

    fn set_state(&mut self, next: RecordingState) {
        if self.state == next {
            return;
        }
        tracing::info!("Recording state: {:?} -> {:?}", self.state, next);
        self.state = next;
        *self.status.state.write() = next;
        let _ = self.events.send(RecorderEvent::StateChanged(next));
    }

    fn transition(&mut self, trigger: Trigger) -> AppResult<()> {
        let next = self.state.next(trigger).ok_or(AppError::GuardViolation {
            action: trigger.name(),
            state: self.state,
        })?;
        self.set_state(next);
        Ok(())
    }

    fn set_progress(&self, progress: f64) {
        *self.status.progress.write() = progress;
        let _ = self.events.send(RecorderEvent::Progress(progress));
    }

    fn apply_config(&mut self, config: LoopConfig) -> AppResult<()> {
        config.validate()?;
        tracing::info!("Configuration updated: {:?}", config);
        self.config_tx.send_replace(config.clone());
        self.config = config;
        Ok(())
    }

    // =========================================================================
    // Session
    // =========================================================================

    async fn ensure_authorized(&self) -> AppResult<()> {
        match self.authorization.status() {
            AuthorizationStatus::Authorized => Ok(()),
            AuthorizationStatus::NotDetermined => {
                if self.authorization.request_access().await {
                    Ok(())
                } else {
                    Err(AppError::PermissionDenied(
                        "camera access was not granted".to_string(),
                    ))
                }
            }
            status => Err(AppError::PermissionDenied(format!(
                "camera access is {:?}",
                status
            ))),
        }
    }

    fn finish_notifier(&self) -> FinishNotifier {
        let tx = self.tx.clone();
        FinishNotifier::new(move |finished| {
            if let Some(tx) = tx.upgrade() {
                let _ = tx.send(Message::RecordingFinished(finished));
            }
        })
    }

    /// Open the camera if needed, begin a physical recording and the
    /// pre-roll phase
    async fn setup_and_start(&mut self) -> AppResult<()> {
        if !self.state.accepts_start() {
            return Err(AppError::GuardViolation {
                action: Trigger::Start.name(),
                state: self.state,
            });
        }

        if !self.session.is_configured() {
            self.ensure_authorized().await?;
            self.session.configure().await?;
        }

        if let Err(e) = self.session.start(self.finish_notifier()).await {
            tracing::error!("Failed to start recording: {}", e);
            if let Some(path) = self.session.teardown().await {
                self.abandoned.insert(path);
            }
            self.set_state(RecordingState::NotStarted);
            return Err(e.into());
        }

        self.watchdog_overdue = false;
        self.transition(Trigger::Start)?;
        self.start_phase(self.config.pre_roll());
        self.arm_watchdog();

        Ok(())
    }

    /// Tear down without saving: cancel the phase, stop the recording and
    /// close the camera. The stopped file's finish report will be discarded.
    async fn stop_session(&mut self) {
        self.cancel_phase();
        self.watchdog.disarm();
        self.watchdog_epoch += 1;
        self.watchdog_overdue = false;

        if let Some(path) = self.session.teardown().await {
            tracing::info!("Abandoning recording {:?}", path);
            self.abandoned.insert(path);
        }
        if let Some(path) = self.awaiting_finish.take() {
            tracing::info!("Abandoning recording {:?} before it was saved", path);
            self.abandoned.insert(path);
        }

        self.set_progress(0.0);
        if let Err(e) = self.transition(Trigger::SessionStop) {
            self.report(e);
        }
    }

    async fn restart_session(&mut self) -> AppResult<()> {
        tracing::info!("Restarting capture session");
        self.stop_session().await;
        self.setup_and_start().await
    }

    // =========================================================================
    // Phases
    // =========================================================================

    fn start_phase(&mut self, duration: Duration) {
        self.cancel_phase();
        if self.timer.interval() != self.config.tick_interval() {
            self.timer = SegmentTimer::new(self.config.tick_interval());
        }

        let epoch = self.phase_epoch;
        let status = self.status.clone();
        let events = self.events.clone();
        let tx = self.tx.clone();

        self.timer.start(
            duration,
            move |progress| {
                *status.progress.write() = progress;
                let _ = events.send(RecorderEvent::Progress(progress));
            },
            move || {
                if let Some(tx) = tx.upgrade() {
                    let _ = tx.send(Message::PhaseComplete { epoch });
                }
            },
        );
    }

    fn cancel_phase(&mut self) {
        self.timer.cancel();
        self.phase_epoch += 1;
    }

    /// User or trigger asked to keep this moment
    fn stop_recording(&mut self) -> AppResult<()> {
        self.transition(Trigger::Stop)?;
        tracing::info!(
            "Save requested, capturing {:.1}s of post-roll",
            self.config.post_roll_secs
        );
        self.start_phase(self.config.post_roll());
        Ok(())
    }

    async fn on_phase_complete(&mut self, epoch: u64) -> AppResult<()> {
        if epoch != self.phase_epoch {
            tracing::debug!("Ignoring completion of a cancelled phase");
            return Ok(());
        }

        match self.state {
            RecordingState::PreRecording => {
                self.transition(Trigger::PhaseComplete)?;
                if self.watchdog_overdue {
                    tracing::info!("Session overdue for restart");
                    self.restart_session().await?;
                }
                Ok(())
            }
            // Fails when the device already stopped on its own
            RecordingState::PostRecording => match self.session.stop().await {
                Ok(path) => {
                    tracing::debug!("Post-roll captured, finalizing {:?}", path);
                    self.awaiting_finish = Some(path);
                    Ok(())
                }
                Err(e) => {
                    // No finish report will follow; start over
                    tracing::error!("Failed to stop recording: {}", e);
                    self.report(e.into());
                    self.restart_session().await
                }
            },
            state => Err(AppError::GuardViolation {
                action: Trigger::PhaseComplete.name(),
                state,
            }),
        }
    }

    // =========================================================================
    // Segment pipeline
    // =========================================================================

    async fn on_recording_finished(&mut self, finished: RecordingFinished) -> AppResult<()> {
        if self.abandoned.remove(&finished.path) {
            tracing::debug!("Discarding abandoned recording {:?}", finished.path);
            remove_quietly(&finished.path).await;
            return Ok(());
        }

        let expected = self.awaiting_finish.as_deref() == Some(finished.path.as_path());
        if self.state != RecordingState::PostRecording || !expected {
            // Platform stopped on its own (interruption, revoked device).
            // No second report will come for this file.
            if let Some(error) = &finished.error {
                tracing::warn!("Recording {:?} stopped: {}", finished.path, error);
            }
            if self.session.active_output() == Some(finished.path.as_path()) {
                self.session.mark_stopped();
            }
            return Err(AppError::GuardViolation {
                action: Trigger::PhysicalStop.name(),
                state: self.state,
            });
        }

        self.awaiting_finish = None;
        if let Some(error) = &finished.error {
            tracing::warn!(
                "Recording {:?} finished with error, trimming anyway: {}",
                finished.path,
                error
            );
        }

        self.transition(Trigger::PhysicalStop)?;
        self.transfer(PendingSegment {
            source_file: finished.path,
            requested_window: self.config.clip_window(),
        })
        .await;

        // Re-arm only after the save attempt has completed
        self.setup_and_start().await
    }

    /// Trim and save one segment. Best effort: failures are reported and the
    /// segment is dropped.
    async fn transfer(&mut self, segment: PendingSegment) {
        match self
            .trimmer
            .trim_trailing(segment.requested_window, &segment.source_file)
            .await
        {
            Ok(clip) => match self.library.save(&clip.path).await {
                Ok(()) => {
                    tracing::info!(
                        "Clip of {:.1}s saved to library",
                        clip.duration.as_secs_f64()
                    );
                    let _ = self.events.send(RecorderEvent::ClipSaved {
                        clip: clip.path.clone(),
                        duration: clip.duration,
                    });
                    if let Err(e) = self.scratch.clear().await {
                        tracing::warn!("Failed to clear scratch storage: {}", e);
                    }
                }
                Err(e) => {
                    remove_quietly(&clip.path).await;
                    self.report(e.into());
                }
            },
            Err(e) => self.report(e.into()),
        }

        remove_quietly(&segment.source_file).await;
    }

    // =========================================================================
    // Watchdog
    // =========================================================================

    fn arm_watchdog(&mut self) {
        if let Some(deadline) = self.watchdog.deadline() {
            tracing::debug!(
                "Watchdog already armed, {:.0}s left",
                deadline
                    .saturating_duration_since(tokio::time::Instant::now())
                    .as_secs_f64()
            );
            return;
        }

        self.watchdog_epoch += 1;
        let epoch = self.watchdog_epoch;
        let tx = self.tx.clone();
        self.watchdog.arm(self.config.max_session(), move || {
            if let Some(tx) = tx.upgrade() {
                let _ = tx.send(Message::WatchdogFired { epoch });
            }
        });
    }

    async fn on_watchdog(&mut self, epoch: u64) -> AppResult<()> {
        if epoch != self.watchdog_epoch || !self.watchdog.consume() {
            tracing::debug!("Ignoring stale watchdog");
            return Ok(());
        }

        // A post-roll with nothing recording has no save left to protect
        let stalled = self.state == RecordingState::PostRecording && !self.session.is_recording();
        if self.state != RecordingState::Ready && !stalled {
            tracing::info!("Watchdog fired while {:?}, deferring restart", self.state);
            self.watchdog_overdue = true;
            return Ok(());
        }

        tracing::info!(
            "Session reached {}s, forcing a fresh recording",
            self.config.max_session_secs
        );
        self.restart_session().await
    }
}

async fn remove_quietly(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Failed to remove {:?}: {}", path, e),
    }
}
