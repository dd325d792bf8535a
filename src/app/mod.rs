mod orchestrator;
mod runtime;
mod shutdown;
mod startup;
mod summary;
mod types;

#[cfg(test)]
mod tests;

pub use orchestrator::VisionApp;
pub use summary::DetectionSummary;
pub use types::{ShutdownHandle, ShutdownReason};
