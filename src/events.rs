use crate::detection::DetectorKind;
use crate::error::EventBusError;
use crate::scheduler::LoopState;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Events that can occur in a vision session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum VisionEvent {
    /// A session's loop state changed
    SessionStateChanged {
        session_id: Uuid,
        kind: DetectorKind,
        state: LoopState,
        timestamp: SystemTime,
    },
    /// A tick produced a new detection set
    DetectionsUpdated {
        session_id: Uuid,
        count: usize,
        top_label: Option<String>,
        timestamp: SystemTime,
    },
    /// A single inference call failed; the session keeps running
    InferenceFailed {
        session_id: Uuid,
        error: String,
        timestamp: SystemTime,
    },
    /// The session hit a fatal error and stopped
    SessionFailed {
        session_id: Uuid,
        error: String,
        timestamp: SystemTime,
    },
    /// Camera tracks and detector were released
    ResourcesReleased {
        session_id: Uuid,
        tracks_stopped: bool,
        detector_disposed: bool,
        errors: usize,
        timestamp: SystemTime,
    },
    /// Application shutdown requested
    ShutdownRequested {
        timestamp: SystemTime,
        reason: String,
    },
}

impl VisionEvent {
    /// Get the timestamp of the event
    pub fn timestamp(&self) -> SystemTime {
        match self {
            VisionEvent::SessionStateChanged { timestamp, .. }
            | VisionEvent::DetectionsUpdated { timestamp, .. }
            | VisionEvent::InferenceFailed { timestamp, .. }
            | VisionEvent::SessionFailed { timestamp, .. }
            | VisionEvent::ResourcesReleased { timestamp, .. }
            | VisionEvent::ShutdownRequested { timestamp, .. } => *timestamp,
        }
    }

    /// Session the event belongs to, if any
    pub fn session_id(&self) -> Option<Uuid> {
        match self {
            VisionEvent::SessionStateChanged { session_id, .. }
            | VisionEvent::DetectionsUpdated { session_id, .. }
            | VisionEvent::InferenceFailed { session_id, .. }
            | VisionEvent::SessionFailed { session_id, .. }
            | VisionEvent::ResourcesReleased { session_id, .. } => Some(*session_id),
            VisionEvent::ShutdownRequested { .. } => None,
        }
    }

    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            VisionEvent::SessionStateChanged { kind, state, .. } => {
                format!("{} session {}", kind, state)
            }
            VisionEvent::DetectionsUpdated {
                count, top_label, ..
            } => match top_label {
                Some(label) => format!("{} detections, top: {}", count, label),
                None => format!("{} detections", count),
            },
            VisionEvent::InferenceFailed { error, .. } => {
                format!("Inference failed: {}", error)
            }
            VisionEvent::SessionFailed { error, .. } => format!("Session failed: {}", error),
            VisionEvent::ResourcesReleased {
                tracks_stopped,
                detector_disposed,
                errors,
                ..
            } => format!(
                "Resources released (tracks stopped: {}, detector disposed: {}, errors: {})",
                tracks_stopped, detector_disposed, errors
            ),
            VisionEvent::ShutdownRequested { reason, .. } => {
                format!("Shutdown requested: {}", reason)
            }
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            VisionEvent::SessionStateChanged { .. } => "session_state_changed",
            VisionEvent::DetectionsUpdated { .. } => "detections_updated",
            VisionEvent::InferenceFailed { .. } => "inference_failed",
            VisionEvent::SessionFailed { .. } => "session_failed",
            VisionEvent::ResourcesReleased { .. } => "resources_released",
            VisionEvent::ShutdownRequested { .. } => "shutdown_requested",
        }
    }
}

/// Event bus for session observability using broadcast channels
pub struct EventBus {
    sender: broadcast::Sender<VisionEvent>,
    debug_logging: bool,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            debug_logging: false,
        }
    }

    /// Create a new event bus with debug logging enabled
    pub fn with_debug_logging(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            debug_logging: true,
        }
    }

    /// Subscribe to events and get a receiver
    pub fn subscribe(&self) -> broadcast::Receiver<VisionEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all subscribers. Never blocks, so it is safe to
    /// call from inside a frame-loop tick.
    pub fn publish(&self, event: VisionEvent) -> Result<usize, EventBusError> {
        match &event {
            VisionEvent::SessionFailed { error, .. } => {
                error!("Session failed: {}", error);
            }
            VisionEvent::InferenceFailed { error, .. } => {
                warn!("Inference failed: {}", error);
            }
            VisionEvent::SessionStateChanged { kind, state, .. } => {
                info!("{} session {}", kind, state);
            }
            VisionEvent::ShutdownRequested { reason, .. } => {
                info!("Shutdown requested: {}", reason);
            }
            _ => {
                if self.debug_logging {
                    debug!("Event: {}", event.description());
                }
            }
        }

        self.sender
            .send(event)
            .map_err(|e| EventBusError::PublishFailed {
                details: e.to_string(),
            })
    }

    /// Publish, ignoring a bus with no subscribers
    pub fn emit(&self, event: VisionEvent) {
        if self.has_subscribers() {
            let _ = self.publish(event);
        } else if self.debug_logging {
            debug!("No subscribers for event: {}", event.description());
        }
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Check if there are any active subscribers
    pub fn has_subscribers(&self) -> bool {
        self.sender.receiver_count() > 0
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            debug_logging: self.debug_logging,
        }
    }
}

/// Event filter for selective event handling
#[derive(Debug, Clone)]
pub enum EventFilter {
    /// Accept all events
    All,
    /// Accept only specific event types
    EventTypes(Vec<&'static str>),
    /// Accept events from one session
    Session(Uuid),
    /// Custom filter function
    Custom(fn(&VisionEvent) -> bool),
}

impl EventFilter {
    /// Check if an event passes this filter
    pub fn matches(&self, event: &VisionEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::EventTypes(types) => types.contains(&event.event_type()),
            EventFilter::Session(id) => event.session_id() == Some(*id),
            EventFilter::Custom(filter_fn) => filter_fn(event),
        }
    }
}

/// Event receiver with filtering
pub struct EventReceiver {
    receiver: broadcast::Receiver<VisionEvent>,
    filter: EventFilter,
    name: String,
}

impl EventReceiver {
    /// Create a new event receiver with a filter
    pub fn new(
        receiver: broadcast::Receiver<VisionEvent>,
        filter: EventFilter,
        name: String,
    ) -> Self {
        Self {
            receiver,
            filter,
            name,
        }
    }

    /// Receive the next filtered event
    pub async fn recv(&mut self) -> Result<VisionEvent, EventBusError> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        debug!(
                            "Receiver '{}' received event: {}",
                            self.name,
                            event.description()
                        );
                        return Ok(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                    return Err(EventBusError::Lagged { count: n });
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed for receiver '{}'", self.name);
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&mut self) -> Result<Option<VisionEvent>, EventBusError> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        return Ok(Some(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => {
                    return Ok(None);
                }
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                    return Err(EventBusError::Lagged { count: n });
                }
                Err(broadcast::error::TryRecvError::Closed) => {
                    debug!("Event bus closed for receiver '{}'", self.name);
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    fn state_event(session_id: Uuid, state: LoopState) -> VisionEvent {
        VisionEvent::SessionStateChanged {
            session_id,
            kind: DetectorKind::Object,
            state,
            timestamp: SystemTime::now(),
        }
    }

    #[tokio::test]
    async fn test_event_bus_basic_operations() {
        let event_bus = EventBus::new(10);
        let mut receiver = event_bus.subscribe();
        let id = Uuid::new_v4();

        let subscriber_count = event_bus
            .publish(VisionEvent::DetectionsUpdated {
                session_id: id,
                count: 1,
                top_label: Some("cup (92.00%)".to_string()),
                timestamp: SystemTime::now(),
            })
            .unwrap();
        assert_eq!(subscriber_count, 1);

        match receiver.recv().await.unwrap() {
            VisionEvent::DetectionsUpdated {
                session_id, count, ..
            } => {
                assert_eq!(session_id, id);
                assert_eq!(count, 1);
            }
            other => panic!("Unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let event_bus = EventBus::new(10);
        let mut receiver1 = event_bus.subscribe();
        let mut receiver2 = event_bus.subscribe();

        assert_eq!(event_bus.subscriber_count(), 2);

        event_bus
            .publish(state_event(Uuid::new_v4(), LoopState::Running))
            .unwrap();

        let _ = timeout(Duration::from_millis(100), receiver1.recv())
            .await
            .unwrap()
            .unwrap();
        let _ = timeout(Duration::from_millis(100), receiver2.recv())
            .await
            .unwrap()
            .unwrap();
    }

    #[test]
    fn test_publish_without_subscribers_fails_but_emit_does_not() {
        let event_bus = EventBus::new(10);
        assert!(event_bus
            .publish(state_event(Uuid::new_v4(), LoopState::Idle))
            .is_err());
        event_bus.emit(state_event(Uuid::new_v4(), LoopState::Idle));
    }

    #[test]
    fn test_event_filter() {
        let id = Uuid::new_v4();
        let filter = EventFilter::EventTypes(vec!["session_failed"]);

        let failed = VisionEvent::SessionFailed {
            session_id: id,
            error: "Camera permission denied".to_string(),
            timestamp: SystemTime::now(),
        };
        assert!(filter.matches(&failed));
        assert!(!filter.matches(&state_event(id, LoopState::Error)));

        let by_session = EventFilter::Session(id);
        assert!(by_session.matches(&failed));
        assert!(!by_session.matches(&state_event(Uuid::new_v4(), LoopState::Error)));
        assert!(!by_session.matches(&VisionEvent::ShutdownRequested {
            timestamp: SystemTime::now(),
            reason: "SIGINT".to_string(),
        }));
    }

    #[tokio::test]
    async fn test_filtered_receiver() {
        let event_bus = EventBus::new(10);
        let receiver = event_bus.subscribe();
        let filter = EventFilter::EventTypes(vec!["inference_failed"]);
        let mut filtered_receiver = EventReceiver::new(receiver, filter, "test".to_string());
        let id = Uuid::new_v4();

        event_bus.publish(state_event(id, LoopState::Running)).unwrap();
        event_bus
            .publish(VisionEvent::InferenceFailed {
                session_id: id,
                error: "engine fault".to_string(),
                timestamp: SystemTime::now(),
            })
            .unwrap();

        let received = timeout(Duration::from_millis(100), filtered_receiver.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received.event_type(), "inference_failed");
        assert!(filtered_receiver.try_recv().unwrap().is_none());
    }

    #[test]
    fn test_event_properties() {
        let released_at = SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(1_700_000_000);
        let event = VisionEvent::ResourcesReleased {
            session_id: Uuid::new_v4(),
            tracks_stopped: true,
            detector_disposed: true,
            errors: 0,
            timestamp: released_at,
        };

        assert_eq!(event.event_type(), "resources_released");
        assert_eq!(event.timestamp(), released_at);
        assert!(event.description().contains("detector disposed: true"));
        assert_eq!(
            state_event(Uuid::new_v4(), LoopState::Running).description(),
            "object session running"
        );
    }
}
