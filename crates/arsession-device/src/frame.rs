use serde::{Deserialize, Serialize};

/// Snapshot of one processed camera frame as reported by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameState {
    pub index: u64,
    pub timestamp: f64,
    pub trackable_count: u32,
}

/// Receives per-frame updates from the engine's own thread.
///
/// Implementations must return quickly; the engine does not process the next
/// frame until `on_frame` returns.
pub trait FrameListener: Send + Sync {
    fn on_frame(&self, frame: &FrameState);
}
