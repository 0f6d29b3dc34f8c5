//! In-memory collaborators for driving the recorder in tests

use crate::capture::{
    AuthorizationStatus, CameraAuthorization, CameraDevice, CaptureError, CaptureResult,
    DeviceCapabilities, FinishNotifier, Orientation, RecordingFinished,
};
use crate::config::LoopConfig;
use crate::export::{ExportEngine, ExportError, TrailingWindow};
use crate::library::{MediaSink, SaveError, ScratchStore, TempDirStore};
use crate::recorder::{Collaborators, RecorderHandle, RecordingController};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Let paused time run forward, handling everything that wakes on the way
pub async fn advance(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

// =============================================================================
// Camera
// =============================================================================

#[derive(Default)]
pub struct FakeCamera {
    opens: AtomicUsize,
    closes: AtomicUsize,
    starts: AtomicUsize,
    stops: AtomicUsize,
    fail_open: AtomicBool,
    fail_start: Mutex<Option<CaptureError>>,
    fail_stop: Mutex<Option<CaptureError>>,
    /// The current recording ended on its own; its report already went out
    died: AtomicBool,
    finish_error: Mutex<Option<String>>,
    defer_finish: AtomicBool,
    deferred: Mutex<Vec<(FinishNotifier, RecordingFinished)>>,
    current: Mutex<Option<(PathBuf, FinishNotifier)>>,
}

impl FakeCamera {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn fail_open(&self, fail: bool) {
        self.fail_open.store(fail, Ordering::SeqCst);
    }

    /// Fail the next start with `error`
    pub fn fail_start(&self, error: Option<CaptureError>) {
        *self.fail_start.lock() = error;
    }

    /// Fail the next stop with `error`. No finish report follows.
    pub fn fail_stop(&self, error: Option<CaptureError>) {
        *self.fail_stop.lock() = error;
    }

    /// Report `error` with every finished recording
    pub fn finish_with_error(&self, error: Option<String>) {
        *self.finish_error.lock() = error;
    }

    /// Hold finish reports until [`FakeCamera::release_finished`]
    pub fn defer_finish(&self, defer: bool) {
        self.defer_finish.store(defer, Ordering::SeqCst);
    }

    pub fn release_finished(&self) {
        let deferred = std::mem::take(&mut *self.deferred.lock());
        for (notifier, finished) in deferred {
            notifier.notify(finished);
        }
    }

    /// The platform stops the current recording on its own. It reports
    /// once; a later stop succeeds without reporting again.
    pub fn abort_current(&self, error: &str) {
        let current = self.current.lock().take();
        if let Some((path, notifier)) = current {
            self.died.store(true, Ordering::SeqCst);
            notifier.notify(RecordingFinished {
                path,
                error: Some(error.to_string()),
            });
        }
    }
}

#[async_trait]
impl CameraDevice for FakeCamera {
    fn id(&self) -> &str {
        "fake"
    }

    async fn open(&self) -> CaptureResult<DeviceCapabilities> {
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(CaptureError::DeviceNotFound("fake".to_string()));
        }
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(DeviceCapabilities {
            min_zoom: 1.0,
            max_zoom: 5.0,
            orientation: Orientation::Portrait,
        })
    }

    async fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }

    async fn start_recording(&self, output: &Path, on_finish: FinishNotifier) -> CaptureResult<()> {
        if let Some(error) = self.fail_start.lock().take() {
            return Err(error);
        }
        tokio::fs::write(output, b"").await?;
        self.starts.fetch_add(1, Ordering::SeqCst);
        self.died.store(false, Ordering::SeqCst);
        *self.current.lock() = Some((output.to_path_buf(), on_finish));
        Ok(())
    }

    async fn stop_recording(&self) -> CaptureResult<()> {
        let current = self.current.lock().take();
        let Some((path, notifier)) = current else {
            if self.died.swap(false, Ordering::SeqCst) {
                self.stops.fetch_add(1, Ordering::SeqCst);
                return Ok(());
            }
            return Err(CaptureError::NotRecording);
        };
        self.stops.fetch_add(1, Ordering::SeqCst);

        if let Some(error) = self.fail_stop.lock().take() {
            return Err(error);
        }

        let finished = RecordingFinished {
            path,
            error: self.finish_error.lock().clone(),
        };
        if self.defer_finish.load(Ordering::SeqCst) {
            self.deferred.lock().push((notifier, finished));
        } else {
            notifier.notify(finished);
        }
        Ok(())
    }
}

pub struct FakeAuthorization {
    status: Mutex<AuthorizationStatus>,
    grant: AtomicBool,
    requests: AtomicUsize,
}

impl FakeAuthorization {
    pub fn authorized() -> Self {
        Self {
            status: Mutex::new(AuthorizationStatus::Authorized),
            grant: AtomicBool::new(true),
            requests: AtomicUsize::new(0),
        }
    }

    pub fn set_status(&self, status: AuthorizationStatus) {
        *self.status.lock() = status;
    }

    pub fn grant_on_request(&self, grant: bool) {
        self.grant.store(grant, Ordering::SeqCst);
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CameraAuthorization for FakeAuthorization {
    fn status(&self) -> AuthorizationStatus {
        *self.status.lock()
    }

    async fn request_access(&self) -> bool {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let granted = self.grant.load(Ordering::SeqCst);
        *self.status.lock() = if granted {
            AuthorizationStatus::Authorized
        } else {
            AuthorizationStatus::Denied
        };
        granted
    }
}

// =============================================================================
// Export and library
// =============================================================================

/// Engine that reports a fixed source duration and writes placeholder clips
pub struct FakeEngine {
    duration: Duration,
    fail: AtomicBool,
    exports: Mutex<Vec<(PathBuf, TrailingWindow, PathBuf)>>,
}

impl FakeEngine {
    pub fn with_duration(duration: Duration) -> Self {
        Self {
            duration,
            fail: AtomicBool::new(false),
            exports: Mutex::new(Vec::new()),
        }
    }

    /// Every export as (source, window, destination)
    pub fn exports(&self) -> Vec<(PathBuf, TrailingWindow, PathBuf)> {
        self.exports.lock().clone()
    }

    /// Make exports write a partial file and then fail
    pub fn fail_exports(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ExportEngine for FakeEngine {
    async fn probe_duration(&self, _source: &Path) -> Result<Duration, ExportError> {
        Ok(self.duration)
    }

    async fn export(
        &self,
        source: &Path,
        window: TrailingWindow,
        destination: &Path,
    ) -> Result<(), ExportError> {
        tokio::fs::write(destination, b"clip").await?;
        if self.fail.load(Ordering::SeqCst) {
            return Err(ExportError::Ffmpeg("encoder exploded".to_string()));
        }
        self.exports
            .lock()
            .push((source.to_path_buf(), window, destination.to_path_buf()));
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingSink {
    saved: Mutex<Vec<PathBuf>>,
    fail: AtomicBool,
}

impl RecordingSink {
    pub fn saved(&self) -> Vec<PathBuf> {
        self.saved.lock().clone()
    }

    pub fn fail_saves(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl MediaSink for RecordingSink {
    async fn save(&self, path: &Path) -> Result<(), SaveError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(SaveError::Rejected {
                path: path.to_path_buf(),
                reason: "library is full".to_string(),
            });
        }
        self.saved.lock().push(path.to_path_buf());
        Ok(())
    }
}

/// Real scratch directory that counts how often it was cleared
pub struct CountingScratch {
    inner: TempDirStore,
    clears: AtomicUsize,
}

impl CountingScratch {
    pub fn new() -> Self {
        Self {
            inner: TempDirStore::ephemeral().expect("create scratch dir"),
            clears: AtomicUsize::new(0),
        }
    }

    pub fn clears(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScratchStore for CountingScratch {
    fn dir(&self) -> &Path {
        self.inner.dir()
    }

    async fn clear(&self) -> io::Result<()> {
        self.clears.fetch_add(1, Ordering::SeqCst);
        self.inner.clear().await
    }
}

// =============================================================================
// Harness
// =============================================================================

/// A running controller wired to fakes. Must be built inside a runtime.
pub struct Harness {
    pub handle: RecorderHandle,
    pub camera: Arc<FakeCamera>,
    pub authorization: Arc<FakeAuthorization>,
    pub engine: Arc<FakeEngine>,
    pub sink: Arc<RecordingSink>,
    pub scratch: Arc<CountingScratch>,
}

impl Harness {
    pub fn new(config: LoopConfig) -> Self {
        Self::with_source_duration(config, Duration::from_secs(20))
    }

    /// Every recording probes as `duration` long
    pub fn with_source_duration(config: LoopConfig, duration: Duration) -> Self {
        let camera = Arc::new(FakeCamera::new());
        let authorization = Arc::new(FakeAuthorization::authorized());
        let engine = Arc::new(FakeEngine::with_duration(duration));
        let sink = Arc::new(RecordingSink::default());
        let scratch = Arc::new(CountingScratch::new());

        let (handle, _task) = RecordingController::spawn(
            config,
            Collaborators {
                camera: camera.clone(),
                authorization: authorization.clone(),
                engine: engine.clone(),
                library: sink.clone(),
                scratch: scratch.clone(),
            },
        );

        Self {
            handle,
            camera,
            authorization,
            engine,
            sink,
            scratch,
        }
    }
}
