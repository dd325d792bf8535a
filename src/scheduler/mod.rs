mod frame_loop;
mod state;
mod ticker;
#[cfg(test)]
mod tests;

pub use frame_loop::{FrameLoop, LoopCounters, LoopStats, TickOutcome};
pub use state::{LoopState, LoopStateCell};
pub use ticker::{RefreshTicker, TickHandle};
