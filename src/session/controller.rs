use super::lifecycle::ResourceLifecycleManager;
use super::session::{Session, SessionOptions};
use crate::config::VisionConfig;
use crate::detection::DetectorKind;
use crate::error::Result;
use crate::events::EventBus;
use crate::render::SharedRenderTarget;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// Owns at most one live session and switches detection modes.
///
/// Switches are serialized: the previous session is fully stopped and
/// released before the next one starts acquiring.
pub struct SessionController {
    config: VisionConfig,
    lifecycle: Arc<ResourceLifecycleManager>,
    target: SharedRenderTarget,
    event_bus: Arc<EventBus>,
    current: Mutex<Option<Arc<Session>>>,
}

impl SessionController {
    pub fn new(
        config: VisionConfig,
        lifecycle: Arc<ResourceLifecycleManager>,
        target: SharedRenderTarget,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            config,
            lifecycle,
            target,
            event_bus,
            current: Mutex::new(None),
        }
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.event_bus)
    }

    pub fn render_target(&self) -> SharedRenderTarget {
        Arc::clone(&self.target)
    }

    /// The session most recently started, whatever its state
    pub async fn current(&self) -> Option<Arc<Session>> {
        self.current.lock().await.clone()
    }

    /// Tear down the current session, then start a new one for `kind`.
    ///
    /// A failed start still becomes the current session so its
    /// `last_error` stays visible.
    pub async fn switch_mode(&self, kind: DetectorKind) -> Result<Arc<Session>> {
        let mut current = self.current.lock().await;

        if let Some(previous) = current.take() {
            info!(
                "Switching from {} session {} to {}",
                previous.kind(),
                previous.id(),
                kind
            );
            previous.stop().await?;
        }

        let session = Arc::new(Session::new(
            SessionOptions::from_config(&self.config, kind),
            Arc::clone(&self.lifecycle),
            Arc::clone(&self.target),
            Arc::clone(&self.event_bus),
        ));
        *current = Some(Arc::clone(&session));

        session.start().await?;
        Ok(session)
    }

    /// Stop and release the current session, if any
    pub async fn stop(&self) -> Result<()> {
        let current = self.current.lock().await;
        if let Some(session) = current.as_ref() {
            session.stop().await?;
        }
        Ok(())
    }
}
