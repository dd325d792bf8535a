use std::fmt;
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};

/// Why the application is shutting down
#[derive(Debug, Clone, PartialEq)]
pub enum ShutdownReason {
    Signal(String),
    Error(String),
    UserRequest,
}

impl ShutdownReason {
    pub fn exit_code(&self) -> i32 {
        match self {
            ShutdownReason::Error(_) => 1,
            ShutdownReason::Signal(_) | ShutdownReason::UserRequest => 0,
        }
    }
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownReason::Signal(name) => write!(f, "signal {}", name),
            ShutdownReason::Error(message) => write!(f, "error: {}", message),
            ShutdownReason::UserRequest => write!(f, "user request"),
        }
    }
}

/// Cloneable trigger for the application's one-shot shutdown channel.
/// Only the first trigger wins.
#[derive(Clone)]
pub struct ShutdownHandle {
    sender: Arc<Mutex<Option<oneshot::Sender<ShutdownReason>>>>,
}

impl ShutdownHandle {
    pub(super) fn new(sender: oneshot::Sender<ShutdownReason>) -> Self {
        Self {
            sender: Arc::new(Mutex::new(Some(sender))),
        }
    }

    /// Returns false when shutdown was already requested
    pub async fn trigger(&self, reason: ShutdownReason) -> bool {
        match self.sender.lock().await.take() {
            Some(sender) => sender.send(reason).is_ok(),
            None => false,
        }
    }
}
