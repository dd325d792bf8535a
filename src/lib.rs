pub mod app;
pub mod capture;
pub mod config;
pub mod detection;
pub mod detector;
pub mod error;
pub mod events;
pub mod frame;
pub mod render;
pub mod scheduler;
pub mod session;
pub mod store;

pub use app::{ShutdownHandle, ShutdownReason, VisionApp};
pub use config::VisionConfig;
pub use detection::{Detection, DetectionSet, DetectorKind};
pub use error::{Result, SessionError, VisionError};
pub use events::{EventBus, EventFilter, EventReceiver, VisionEvent};
pub use frame::{Frame, FrameFormat};
pub use scheduler::LoopState;
pub use session::{Session, SessionController};
pub use store::DetectionStore;
