mod controller;
mod lifecycle;
mod resources;
#[allow(clippy::module_inception)]
mod session;

pub use controller::SessionController;
pub use lifecycle::ResourceLifecycleManager;
pub use resources::{ReleaseReport, SessionResources, SharedResources};
pub use session::{Session, SessionOptions};
