use crate::SessionError;
use arsession_device::{FrameListener, FrameState};
use std::sync::Arc;

/// Domain-specific setup and teardown supplied by the embedding application.
///
/// The `do_*` hooks report success as a bool. `do_init_trackers`,
/// `do_load_trackers_data` and `on_init_progress` run on a background stage
/// thread while the shutdown lock is held; the unload / deinit hooks run
/// inside the same lock during `stop()`. None of them may call back into the
/// controller: `stop()` from any of them deadlocks.
///
/// `on_init_done` runs with no lock held and may call any operation,
/// including `initialize()` and `stop()`.
pub trait SessionCallbacks: Send + Sync {
    fn do_init_trackers(&self) -> bool;

    fn do_load_trackers_data(&self) -> bool;

    fn do_start_trackers(&self) -> bool;

    fn do_stop_trackers(&self) -> bool;

    fn do_unload_trackers_data(&self) -> bool;

    fn do_deinit_trackers(&self) -> bool;

    /// Fires exactly once per `initialize()` call: `None` when the session
    /// reached `Running`, otherwise the reason it did not. A rejected call is
    /// notified before `initialize()` returns; a bring-up canceled by
    /// `stop()` is notified after its teardown finished.
    fn on_init_done(&self, error: Option<SessionError>);

    /// Called from the engine's frame thread. Must not block.
    fn on_engine_frame_update(&self, frame: &FrameState);

    /// Progress of one engine bring-up step. Runs under the shutdown lock.
    fn on_init_progress(&self, _percent: i32) {}
}

/// Adapts the application's callbacks to the gateway's frame listener seam.
pub(crate) struct FrameForwarder {
    callbacks: Arc<dyn SessionCallbacks>,
}

impl FrameForwarder {
    pub(crate) fn new(callbacks: Arc<dyn SessionCallbacks>) -> Self {
        Self { callbacks }
    }
}

impl FrameListener for FrameForwarder {
    fn on_frame(&self, frame: &FrameState) {
        self.callbacks.on_engine_frame_update(frame);
    }
}
