use crate::detection::DetectionSet;
use crate::error::{CaptureError, InferenceError};
use crate::render::{OverlayRenderer, SharedRenderTarget};
use crate::session::SharedResources;
use crate::store::DetectionStore;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::{debug, error, trace, warn};

/// What a single tick did
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Stream or detector not available yet, or the frame has no dimensions
    NotReady,
    /// Frame has not advanced since the last inference; retained set redrawn
    Duplicate,
    Inferred { detections: DetectionSet },
    /// Store cleared, loop continues
    InferenceFailed(InferenceError),
    /// Resources were released; no further tick
    Halted,
    /// Unrecoverable stream failure; no further tick
    Fatal(CaptureError),
}

impl TickOutcome {
    /// Whether the next tick should be scheduled
    pub fn continues(&self) -> bool {
        !matches!(self, TickOutcome::Halted | TickOutcome::Fatal(_))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopStats {
    pub ticks: u64,
    pub inferences: u64,
    pub not_ready: u64,
    pub duplicates: u64,
    pub inference_failures: u64,
}

/// Tick counters readable while the loop runs
#[derive(Debug, Default)]
pub struct LoopCounters {
    ticks: AtomicU64,
    inferences: AtomicU64,
    not_ready: AtomicU64,
    duplicates: AtomicU64,
    inference_failures: AtomicU64,
}

impl LoopCounters {
    pub fn snapshot(&self) -> LoopStats {
        LoopStats {
            ticks: self.ticks.load(Ordering::Relaxed),
            inferences: self.inferences.load(Ordering::Relaxed),
            not_ready: self.not_ready.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            inference_failures: self.inference_failures.load(Ordering::Relaxed),
        }
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Monotonic inference clock in microseconds since session start
#[derive(Debug)]
struct InferenceClock {
    origin: Instant,
    last: Option<u64>,
}

impl InferenceClock {
    fn new() -> Self {
        Self {
            origin: Instant::now(),
            last: None,
        }
    }

    fn next(&mut self) -> u64 {
        let now = self.origin.elapsed().as_micros() as u64;
        let timestamp = match self.last {
            Some(last) if now <= last => last + 1,
            _ => now,
        };
        self.last = Some(timestamp);
        timestamp
    }
}

/// One session's capture, infer and render cycle
pub struct FrameLoop {
    resources: SharedResources,
    store: DetectionStore,
    renderer: OverlayRenderer,
    target: SharedRenderTarget,
    counters: Arc<LoopCounters>,
    clock: InferenceClock,
    last_frame_time: Option<Duration>,
}

impl FrameLoop {
    pub fn new(
        resources: SharedResources,
        store: DetectionStore,
        renderer: OverlayRenderer,
        target: SharedRenderTarget,
    ) -> Self {
        Self {
            resources,
            store,
            renderer,
            target,
            counters: Arc::new(LoopCounters::default()),
            clock: InferenceClock::new(),
            last_frame_time: None,
        }
    }

    /// Report into counters owned by the caller
    pub fn with_counters(mut self, counters: Arc<LoopCounters>) -> Self {
        self.counters = counters;
        self
    }

    pub fn counters(&self) -> Arc<LoopCounters> {
        Arc::clone(&self.counters)
    }

    pub fn stats(&self) -> LoopStats {
        self.counters.snapshot()
    }

    /// Media time of the last frame sent to the detector
    pub fn last_frame_time(&self) -> Option<Duration> {
        self.last_frame_time
    }

    /// Run one tick. The resource lock is held across `infer`, so a
    /// concurrent release waits for the call to finish. On a multi-thread
    /// runtime the call runs under `block_in_place`, leaving the worker's
    /// other tasks free to move.
    pub fn tick(&mut self) -> TickOutcome {
        LoopCounters::bump(&self.counters.ticks);

        let (frame_size, result) = {
            let mut resources = self.resources.lock();
            if resources.is_released() {
                debug!("Tick after release, halting frame loop");
                return TickOutcome::Halted;
            }

            let Some((capture, detector)) = resources.frame_parts() else {
                LoopCounters::bump(&self.counters.not_ready);
                return TickOutcome::NotReady;
            };

            if capture.has_ended() {
                error!("Camera stream ended while running");
                return TickOutcome::Fatal(CaptureError::StreamEnded);
            }

            if !capture.is_ready() {
                LoopCounters::bump(&self.counters.not_ready);
                trace!("Frame not ready, waiting for stream metadata");
                return TickOutcome::NotReady;
            }

            let frame = capture.frame();
            if !frame.is_ready() {
                LoopCounters::bump(&self.counters.not_ready);
                return TickOutcome::NotReady;
            }

            if self.last_frame_time == Some(frame.current_time) {
                LoopCounters::bump(&self.counters.duplicates);
                drop(resources);
                trace!("Frame at {:?} already processed", frame.current_time);
                self.render(frame.dimensions(), &self.store.latest());
                return TickOutcome::Duplicate;
            }

            self.last_frame_time = Some(frame.current_time);
            let timestamp = self.clock.next();
            (
                frame.dimensions(),
                blocking(|| detector.infer(&frame, timestamp)),
            )
        };

        match result {
            Ok(detections) => {
                LoopCounters::bump(&self.counters.inferences);
                trace!("Inference produced {} detections", detections.len());
                self.store.set(detections.clone());
                self.render(frame_size, &detections);
                TickOutcome::Inferred { detections }
            }
            Err(e) => {
                LoopCounters::bump(&self.counters.inference_failures);
                warn!("Inference failed, clearing detections: {}", e);
                self.store.clear();
                self.render(frame_size, &DetectionSet::empty());
                TickOutcome::InferenceFailed(e)
            }
        }
    }

    fn render(&self, frame_size: (u32, u32), detections: &DetectionSet) {
        let mut target = self.target.lock();
        self.renderer.render(&mut *target, frame_size, detections);
    }
}

/// Run a synchronous engine call without stalling the async workers
fn blocking<R>(call: impl FnOnce() -> R) -> R {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(call)
        }
        _ => call(),
    }
}

impl std::fmt::Debug for FrameLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameLoop")
            .field("renderer", &self.renderer)
            .field("last_frame_time", &self.last_frame_time)
            .field("stats", &self.stats())
            .finish()
    }
}
