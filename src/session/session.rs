use super::lifecycle::ResourceLifecycleManager;
use super::resources::{ReleaseReport, SessionResources, SharedResources};
use crate::capture::StreamConstraints;
use crate::config::VisionConfig;
use crate::detection::{DetectionSet, DetectorKind};
use crate::detector::DetectorConfig;
use crate::error::{Result, SessionError, VisionError};
use crate::events::{EventBus, VisionEvent};
use crate::frame::Frame;
use crate::render::{OverlayRenderer, SharedRenderTarget};
use crate::scheduler::{
    FrameLoop, LoopCounters, LoopState, LoopStateCell, LoopStats, RefreshTicker, TickHandle,
    TickOutcome,
};
use crate::store::DetectionStore;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Everything needed to run one session
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub constraints: StreamConstraints,
    pub detector: DetectorConfig,
    pub renderer: OverlayRenderer,
    pub refresh_hz: u32,
    pub join_timeout: Duration,
}

impl SessionOptions {
    pub fn from_config(config: &VisionConfig, kind: DetectorKind) -> Self {
        Self {
            constraints: StreamConstraints::from(&config.camera),
            detector: config.detector_config(kind),
            renderer: OverlayRenderer::for_kind(kind, &config.render),
            refresh_hz: config.scheduler.refresh_hz,
            join_timeout: Duration::from_millis(config.scheduler.join_timeout_ms),
        }
    }

    pub fn kind(&self) -> DetectorKind {
        self.detector.kind()
    }
}

/// State the frame-loop task shares with its session
#[derive(Clone)]
struct LoopContext {
    id: Uuid,
    kind: DetectorKind,
    state: Arc<LoopStateCell>,
    resources: SharedResources,
    last_error: Arc<Mutex<Option<SessionError>>>,
    event_bus: Arc<EventBus>,
}

impl LoopContext {
    fn set_state(&self, next: LoopState) -> bool {
        match self.state.transition(next) {
            Ok(_) => {
                self.event_bus.emit(VisionEvent::SessionStateChanged {
                    session_id: self.id,
                    kind: self.kind,
                    state: next,
                    timestamp: SystemTime::now(),
                });
                true
            }
            Err(_) => false,
        }
    }

    /// Blocks while a tick is inside `infer`
    fn release(&self) -> ReleaseReport {
        let report = self.resources.lock().release();
        self.released(report)
    }

    /// Release unless a tick holds the resources right now
    fn try_release(&self) -> Option<ReleaseReport> {
        let report = self.resources.try_lock()?.release();
        Some(self.released(report))
    }

    fn released(&self, report: ReleaseReport) -> ReleaseReport {
        if !report.is_noop() {
            self.event_bus.emit(VisionEvent::ResourcesReleased {
                session_id: self.id,
                tracks_stopped: report.tracks_stopped,
                detector_disposed: report.detector_disposed,
                errors: report.errors.len(),
                timestamp: SystemTime::now(),
            });
        }
        report
    }

    /// Fatal path: record the error, stop scheduling, release everything
    fn fail(&self, error: SessionError) {
        if !self.set_state(LoopState::Error) {
            debug!("Session {} already terminal, ignoring: {}", self.id, error);
            return;
        }
        self.event_bus.emit(VisionEvent::SessionFailed {
            session_id: self.id,
            error: error.to_string(),
            timestamp: SystemTime::now(),
        });
        *self.last_error.lock() = Some(error);
        let _ = self.release();
    }

    fn on_tick(&self, outcome: &TickOutcome) {
        match outcome {
            TickOutcome::Inferred { detections } => {
                self.event_bus.emit(VisionEvent::DetectionsUpdated {
                    session_id: self.id,
                    count: detections.len(),
                    top_label: detections
                        .iter()
                        .filter_map(|d| d.top_category())
                        .max_by(|a, b| a.score.total_cmp(&b.score))
                        .map(|c| c.label()),
                    timestamp: SystemTime::now(),
                });
            }
            TickOutcome::InferenceFailed(e) => {
                self.event_bus.emit(VisionEvent::InferenceFailed {
                    session_id: self.id,
                    error: e.to_string(),
                    timestamp: SystemTime::now(),
                });
            }
            TickOutcome::Fatal(e) => self.fail(SessionError::Capture(e.clone())),
            TickOutcome::NotReady | TickOutcome::Duplicate | TickOutcome::Halted => {}
        }
    }
}

/// One capture, detect and render run, from start to teardown.
///
/// A session is single-use: once stopped or failed it stays terminal.
pub struct Session {
    ctx: LoopContext,
    options: SessionOptions,
    lifecycle: Arc<ResourceLifecycleManager>,
    store: DetectionStore,
    target: SharedRenderTarget,
    counters: Arc<LoopCounters>,
    /// Ticker task, kept outside the resource lock so stop never waits on it
    tick: Mutex<Option<TickHandle>>,
}

impl Session {
    pub fn new(
        options: SessionOptions,
        lifecycle: Arc<ResourceLifecycleManager>,
        target: SharedRenderTarget,
        event_bus: Arc<EventBus>,
    ) -> Self {
        let ctx = LoopContext {
            id: Uuid::new_v4(),
            kind: options.kind(),
            state: Arc::new(LoopStateCell::new()),
            resources: Arc::new(Mutex::new(SessionResources::empty())),
            last_error: Arc::new(Mutex::new(None)),
            event_bus,
        };

        debug!("Created {} session {}", ctx.kind, ctx.id);

        Self {
            ctx,
            options,
            lifecycle,
            store: DetectionStore::new(),
            target,
            counters: Arc::new(LoopCounters::default()),
            tick: Mutex::new(None),
        }
    }

    pub fn id(&self) -> Uuid {
        self.ctx.id
    }

    pub fn kind(&self) -> DetectorKind {
        self.ctx.kind
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn state(&self) -> LoopState {
        self.ctx.state.get()
    }

    /// Acquisition in progress
    pub fn is_loading(&self) -> bool {
        self.state() == LoopState::Initializing
    }

    /// Fatal error that ended the session, if any
    pub fn last_error(&self) -> Option<SessionError> {
        self.ctx.last_error.lock().clone()
    }

    /// Current camera frame, once the stream is acquired
    pub fn frame_source(&self) -> Option<Frame> {
        let resources = self.ctx.resources.lock();
        resources.capture().map(|capture| capture.frame())
    }

    pub fn render_target(&self) -> SharedRenderTarget {
        Arc::clone(&self.target)
    }

    pub fn latest_detections(&self) -> DetectionSet {
        self.store.latest()
    }

    pub fn store(&self) -> &DetectionStore {
        &self.store
    }

    /// At least one hand in the latest detections
    pub fn hand_presence(&self) -> bool {
        self.store.hand_presence()
    }

    pub fn stats(&self) -> LoopStats {
        self.counters.snapshot()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<VisionEvent> {
        self.ctx.event_bus.subscribe()
    }

    /// Shared resource set, for inspection
    pub fn resources(&self) -> SharedResources {
        Arc::clone(&self.ctx.resources)
    }

    /// Acquire the camera and detector, then start the frame loop.
    ///
    /// Acquisition failures are fatal: the session moves to `Error`, keeps
    /// the error as `last_error` and holds no resources.
    pub async fn start(&self) -> Result<()> {
        if !self.ctx.set_state(LoopState::Initializing) {
            return Err(VisionError::system(format!(
                "Session {} cannot start from state {}",
                self.id(),
                self.state()
            )));
        }

        info!("Starting {} session {}", self.kind(), self.id());

        let acquired = match self
            .lifecycle
            .acquire(&self.options.constraints, &self.options.detector)
            .await
        {
            Ok(resources) => resources,
            Err(e) => {
                self.ctx.fail(e.clone());
                return Err(e.into());
            }
        };

        let mut resources = self.ctx.resources.lock();
        if resources.is_released() {
            // Stopped while acquiring; `acquired` releases on drop
            info!("Session {} stopped during initialization", self.id());
            return Ok(());
        }
        *resources = acquired;

        if !self.ctx.set_state(LoopState::Running) {
            resources.release();
            return Ok(());
        }

        let tick = self.spawn_loop();
        resources.attach_tick(tick.canceller());
        *self.tick.lock() = Some(tick);
        Ok(())
    }

    fn spawn_loop(&self) -> TickHandle {
        let mut frame_loop = FrameLoop::new(
            Arc::clone(&self.ctx.resources),
            self.store.clone(),
            self.options.renderer.clone(),
            Arc::clone(&self.target),
        )
        .with_counters(Arc::clone(&self.counters));

        let ctx = self.ctx.clone();
        RefreshTicker::new(self.options.refresh_hz).spawn(&format!("session-{}", self.id()), move || {
            let outcome = frame_loop.tick();
            ctx.on_tick(&outcome);
            outcome.continues()
        })
    }

    /// Stop the loop and release everything. Safe to call in any state and
    /// more than once.
    ///
    /// Never blocks the calling task: a tick stuck in `infer` delays the
    /// release, which then runs on the blocking pool and completes even if
    /// this future is dropped.
    pub async fn stop(&self) -> Result<()> {
        if !self.state().is_terminal() {
            self.ctx.set_state(LoopState::Stopped);
        }

        let tick = self.tick.lock().take();
        if let Some(tick) = &tick {
            tick.cancel();
        }

        let ctx = self.ctx.clone();
        let release = tokio::task::spawn_blocking(move || ctx.release());

        if let Some(tick) = tick {
            if let Err(e) = tick.join(self.options.join_timeout).await {
                warn!("{}", e);
            }
        }

        release
            .await
            .map_err(|e| VisionError::system(format!("Resource release task failed: {}", e)))?;

        info!("Session {} stopped", self.id());
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.state().is_terminal() {
            self.ctx.set_state(LoopState::Stopped);
        }
        // Cancels and aborts the ticker
        drop(self.tick.get_mut().take());
        if self.ctx.try_release().is_none() {
            // The in-flight tick owns the last reference once it returns
            debug!("Session {} release deferred to the running tick", self.id());
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id())
            .field("kind", &self.kind())
            .field("state", &self.state())
            .field("stats", &self.stats())
            .finish()
    }
}
