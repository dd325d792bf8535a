use super::{ShutdownHandle, ShutdownReason, VisionApp};
use crate::error::{Result, VisionError};
use tokio::signal;
use tracing::{info, warn};

impl VisionApp {
    /// Start, wait for a shutdown request, then shut down gracefully
    pub async fn run(&mut self) -> Result<i32> {
        let shutdown_receiver =
            self.shutdown_receiver
                .take()
                .ok_or_else(|| VisionError::System {
                    message: "Shutdown receiver already taken".to_string(),
                })?;

        self.setup_signal_handlers();

        if let Err(e) = self.start().await {
            let reason = ShutdownReason::Error(e.to_string());
            self.shutdown(&reason).await?;
            return Err(e);
        }

        info!("visioncam is running, press Ctrl+C to stop");

        let shutdown_reason = shutdown_receiver.await.map_err(|_| VisionError::System {
            message: "Shutdown channel closed unexpectedly".to_string(),
        })?;

        info!("Shutdown initiated: {}", shutdown_reason);

        let exit_code = self.shutdown(&shutdown_reason).await?;

        info!("visioncam shutdown complete");
        Ok(exit_code)
    }

    /// Route SIGINT and SIGTERM into the shutdown channel
    fn setup_signal_handlers(&self) {
        // SIGTERM (systemd stop), Unix only
        #[cfg(unix)]
        {
            let handle = self.shutdown_handle.clone();
            tokio::spawn(async move {
                match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                    Ok(mut sigterm) => {
                        if sigterm.recv().await.is_some() {
                            info!("Received SIGTERM signal");
                            handle
                                .trigger(ShutdownReason::Signal("SIGTERM".to_string()))
                                .await;
                        }
                    }
                    Err(e) => warn!("Failed to register SIGTERM handler: {}", e),
                }
            });
        }

        // SIGINT (Ctrl+C), cross-platform
        let handle: ShutdownHandle = self.shutdown_handle.clone();
        tokio::spawn(async move {
            if let Ok(()) = signal::ctrl_c().await {
                info!("Received SIGINT signal (Ctrl+C)");
                handle
                    .trigger(ShutdownReason::Signal("SIGINT".to_string()))
                    .await;
            }
        });
    }
}
