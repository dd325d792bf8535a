use super::types::{ShutdownHandle, ShutdownReason};
use crate::error::EventBusError;
use crate::events::{EventBus, EventFilter, EventReceiver, VisionEvent};
use std::collections::HashMap;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Detection activity accumulated between two summary log lines
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DetectionSummary {
    pub updates: u64,
    pub inference_failures: u64,
    pub max_count: usize,
    pub labels: HashMap<String, u64>,
}

impl DetectionSummary {
    pub fn record(&mut self, event: &VisionEvent) {
        match event {
            VisionEvent::DetectionsUpdated {
                count, top_label, ..
            } => {
                self.updates += 1;
                self.max_count = self.max_count.max(*count);
                if let Some(label) = top_label {
                    *self.labels.entry(label_name(label).to_string()).or_insert(0) += 1;
                }
            }
            VisionEvent::InferenceFailed { .. } => self.inference_failures += 1,
            _ => {}
        }
    }

    pub fn is_empty(&self) -> bool {
        self.updates == 0 && self.inference_failures == 0
    }

    /// Most frequent top label, ties broken alphabetically
    pub fn dominant_label(&self) -> Option<&str> {
        self.labels
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(label, _)| label.as_str())
    }

    /// Log line for this interval, then reset
    pub fn flush(&mut self) -> Option<String> {
        if self.is_empty() {
            return None;
        }
        let line = format!(
            "{} inferences, {} failures, up to {} detections, mostly {}",
            self.updates,
            self.inference_failures,
            self.max_count,
            self.dominant_label().unwrap_or("nothing")
        );
        *self = Self::default();
        Some(line)
    }
}

/// Strip the score suffix from a label like `cup (92.00%)`
fn label_name(label: &str) -> &str {
    label.split(" (").next().unwrap_or(label)
}

/// Subscription carrying only the events the summary task reacts to
pub(super) fn summary_receiver(event_bus: &EventBus) -> EventReceiver {
    EventReceiver::new(
        event_bus.subscribe(),
        EventFilter::EventTypes(vec![
            "detections_updated",
            "inference_failed",
            "session_failed",
        ]),
        "summary".to_string(),
    )
}

/// Log a detection summary every `interval` and request shutdown when a
/// session fails
pub(super) fn spawn_summary_task(
    mut events: EventReceiver,
    interval: Duration,
    cancel: CancellationToken,
    shutdown: ShutdownHandle,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut summary = DetectionSummary::default();
        let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(10)));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Some(line) = summary.flush() {
                        info!("Detections: {}", line);
                    }
                }
                event = events.recv() => match event {
                    Ok(VisionEvent::SessionFailed {
                        session_id, error, ..
                    }) => {
                        warn!("Session {} failed: {}", session_id, error);
                        shutdown.trigger(ShutdownReason::Error(error)).await;
                    }
                    Ok(event) => summary.record(&event),
                    Err(EventBusError::Lagged { count }) => {
                        debug!("Summary task skipped {} events", count);
                    }
                    Err(_) => break,
                },
            }
        }

        debug!("Summary task stopped");
    })
}
