use super::{ShutdownReason, VisionApp};
use crate::error::{Result, VisionError};
use crate::events::VisionEvent;
use std::time::{Duration, SystemTime};
use tokio::time::timeout;
use tracing::{error, info, warn};

/// Upper bound on stopping the current session
const SESSION_STOP_TIMEOUT: Duration = Duration::from_secs(10);

impl VisionApp {
    /// Stop the session, release its resources and write the snapshot.
    /// Returns the process exit code.
    pub async fn shutdown(&mut self, reason: &ShutdownReason) -> Result<i32> {
        info!("Beginning graceful shutdown ({})", reason);

        self.event_bus.emit(VisionEvent::ShutdownRequested {
            timestamp: SystemTime::now(),
            reason: reason.to_string(),
        });

        let mut exit_code = reason.exit_code();

        // Grab the last frame while the stream is still held
        let last_frame = self
            .controller
            .current()
            .await
            .and_then(|session| session.frame_source())
            .filter(|frame| frame.is_ready());

        match timeout(SESSION_STOP_TIMEOUT, self.controller.stop()).await {
            Ok(Ok(())) => info!("Session stopped"),
            Ok(Err(e)) => {
                error!("Error stopping session: {}", e);
                exit_code = 1;
            }
            Err(_) => {
                error!("Session stop timeout");
                exit_code = 1;
            }
        }

        if let Some(path) = self.snapshot_path.clone() {
            let saved = match &last_frame {
                Some(frame) => self.canvas.lock().save_snapshot(frame, &path),
                None => Err(VisionError::component(
                    "snapshot",
                    "No camera frame available",
                )),
            };
            if let Err(e) = saved {
                error!("Failed to write snapshot {}: {}", path.display(), e);
                exit_code = 1;
            }
        }

        // Stop background tasks
        self.cancellation_token.cancel();
        if let Some(task) = self.summary_task.take() {
            if timeout(Duration::from_secs(1), task).await.is_err() {
                warn!("Summary task did not stop in time");
            }
        }

        info!("Graceful shutdown completed with exit code: {}", exit_code);
        Ok(exit_code)
    }
}
