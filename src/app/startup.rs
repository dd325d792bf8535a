use super::summary::{spawn_summary_task, summary_receiver};
use super::VisionApp;
use crate::error::Result;
use crate::session::Session;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

impl VisionApp {
    /// Start the summary logger and a session in the configured mode
    pub async fn start(&mut self) -> Result<Arc<Session>> {
        let mode = self.config.detector.mode;
        info!("Starting visioncam in {} mode", mode);

        if self.summary_task.is_none() {
            self.summary_task = Some(spawn_summary_task(
                summary_receiver(&self.event_bus),
                Duration::from_millis(self.config.system.summary_interval_ms),
                self.cancellation_token.child_token(),
                self.shutdown_handle.clone(),
            ));
        }

        let session = self.controller.switch_mode(mode).await.map_err(|e| {
            error!("Failed to start {} session: {}", mode, e);
            e
        })?;

        info!("Session {} running", session.id());
        Ok(session)
    }
}
