use crate::error::ReleaseError;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Display-refresh driven callback source.
///
/// One callback per period, never overlapping: the next tick is awaited only
/// after the previous callback returned. Late ticks are skipped, not burst.
#[derive(Debug, Clone, Copy)]
pub struct RefreshTicker {
    period: Duration,
}

impl RefreshTicker {
    pub fn new(refresh_hz: u32) -> Self {
        let hz = refresh_hz.max(1) as u64;
        Self {
            period: Duration::from_micros(1_000_000 / hz),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Run `on_tick` every period until it returns `false` or the handle is
    /// cancelled
    pub fn spawn<F>(&self, name: &str, mut on_tick: F) -> TickHandle
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let period = self.period;
        let name = name.to_string();

        let join = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            debug!("Refresh ticker '{}' started ({:?})", name, period);

            loop {
                tokio::select! {
                    biased;
                    _ = task_cancel.cancelled() => {
                        debug!("Refresh ticker '{}' cancelled", name);
                        break;
                    }
                    _ = interval.tick() => {
                        if task_cancel.is_cancelled() {
                            break;
                        }
                        if !on_tick() {
                            debug!("Refresh ticker '{}' halted by callback", name);
                            break;
                        }
                    }
                }
            }
        });

        TickHandle {
            cancel,
            join: Some(join),
        }
    }
}

/// The pending next tick of a running loop
pub struct TickHandle {
    cancel: CancellationToken,
    join: Option<JoinHandle<()>>,
}

impl TickHandle {
    /// Prevent any further callback. A callback already executing runs to
    /// completion.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Token that cancels this ticker without owning its task
    pub fn canceller(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.join.as_ref().map(|j| j.is_finished()).unwrap_or(true)
    }

    /// Cancel and wait for the ticker task to exit
    pub async fn join(mut self, timeout: Duration) -> Result<(), ReleaseError> {
        self.cancel();
        let Some(join) = self.join.take() else {
            return Ok(());
        };

        match tokio::time::timeout(timeout, join).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) if e.is_cancelled() => Ok(()),
            Ok(Err(e)) => {
                warn!("Frame loop task failed: {}", e);
                Ok(())
            }
            Err(_) => Err(ReleaseError::LoopJoin { timeout }),
        }
    }
}

impl Drop for TickHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(join) = self.join.take() {
            if !join.is_finished() {
                join.abort();
                info!("Pending frame loop tick aborted");
            }
        }
    }
}

impl std::fmt::Debug for TickHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TickHandle")
            .field("cancelled", &self.is_cancelled())
            .field("finished", &self.is_finished())
            .finish()
    }
}
