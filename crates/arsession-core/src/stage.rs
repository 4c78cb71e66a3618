//! Cancelable background stages.
//!
//! Engine bring-up and dataset loading share one runner: a named worker
//! thread that takes the shutdown lock, performs its kind-specific work while
//! polling for cancellation, releases the lock, and then resolves exactly
//! once through the completion closure the controller supplied.

use crate::callbacks::SessionCallbacks;
use crate::concurrency::ShutdownLock;
use crate::SessionError;
use arsession_device::{EngineGateway, InitFlags, INIT_DEVICE_NOT_SUPPORTED, INIT_PROGRESS_DONE};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    EngineInit,
    DatasetLoad,
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StageKind::EngineInit => write!(f, "engine-init"),
            StageKind::DatasetLoad => write!(f, "dataset-load"),
        }
    }
}

/// How a stage resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    Completed,
    Failed(SessionError),
    Canceled,
}

/// State shared between a stage worker and the controller.
#[derive(Debug)]
pub(crate) struct StageControl {
    kind: StageKind,
    cancel_requested: AtomicBool,
    progress: AtomicI32,
}

impl StageControl {
    fn new(kind: StageKind) -> Self {
        Self {
            kind,
            cancel_requested: AtomicBool::new(false),
            progress: AtomicI32::new(-1),
        }
    }

    pub(crate) fn kind(&self) -> StageKind {
        self.kind
    }

    pub(crate) fn cancel(&self) {
        self.cancel_requested.store(true, Ordering::SeqCst);
    }

    pub(crate) fn is_cancel_requested(&self) -> bool {
        self.cancel_requested.load(Ordering::SeqCst)
    }

    /// Last reported bring-up progress; -1 before the first step.
    pub(crate) fn progress(&self) -> i32 {
        self.progress.load(Ordering::SeqCst)
    }
}

/// Everything a stage worker touches. Cloned per stage.
#[derive(Clone)]
pub(crate) struct StageContext {
    pub(crate) gateway: Arc<dyn EngineGateway>,
    pub(crate) callbacks: Arc<dyn SessionCallbacks>,
    pub(crate) shutdown: Arc<ShutdownLock>,
    pub(crate) init_flags: InitFlags,
    pub(crate) license_key: String,
}

/// Controller-side handle to a launched stage.
pub(crate) struct StageHandle {
    control: Arc<StageControl>,
    thread: JoinHandle<()>,
}

impl StageHandle {
    pub(crate) fn control(&self) -> &Arc<StageControl> {
        &self.control
    }

    /// True until the worker thread, completion included, has exited.
    pub(crate) fn is_outstanding(&self) -> bool {
        !self.thread.is_finished()
    }

    /// Wait for the worker to exit. A no-op when called from the worker
    /// itself (a completion callback that calls back into `stop()`).
    pub(crate) fn join(self) {
        if self.thread.thread().id() == std::thread::current().id() {
            return;
        }
        if self.thread.join().is_err() {
            warn!("{} stage worker panicked", self.control.kind);
        }
    }
}

pub(crate) fn spawn<F>(
    kind: StageKind,
    ctx: StageContext,
    on_complete: F,
) -> Result<StageHandle, SessionError>
where
    F: FnOnce(&Arc<StageControl>, StageOutcome) + Send + 'static,
{
    let control = Arc::new(StageControl::new(kind));
    let worker = Arc::clone(&control);

    let thread = std::thread::Builder::new()
        .name(format!("arsession-{kind}"))
        .spawn(move || {
            let outcome = run(&ctx, &worker);
            debug!("{kind} stage resolved: {outcome:?}");
            on_complete(&worker, outcome);
        })
        .map_err(|e| {
            warn!("failed to spawn {kind} stage: {e}");
            match kind {
                StageKind::EngineInit => {
                    SessionError::InitializationFailure(format!("cannot spawn stage: {e}"))
                }
                StageKind::DatasetLoad => SessionError::LoadingTrackersFailure,
            }
        })?;

    Ok(StageHandle { control, thread })
}

fn run(ctx: &StageContext, control: &StageControl) -> StageOutcome {
    let _guard = ctx.shutdown.acquire();
    if control.is_cancel_requested() {
        return StageOutcome::Canceled;
    }
    match control.kind {
        StageKind::EngineInit => run_engine_init(ctx, control),
        StageKind::DatasetLoad => run_dataset_load(ctx, control),
    }
}

fn run_engine_init(ctx: &StageContext, control: &StageControl) -> StageOutcome {
    ctx.gateway
        .set_init_parameters(ctx.init_flags, &ctx.license_key);

    let progress = loop {
        let progress = ctx.gateway.advance_init();
        control.progress.store(progress, Ordering::SeqCst);
        ctx.callbacks.on_init_progress(progress);
        debug!("engine init progress: {progress}");

        if control.is_cancel_requested() || !(0..INIT_PROGRESS_DONE).contains(&progress) {
            break progress;
        }
    };

    if control.is_cancel_requested() {
        return StageOutcome::Canceled;
    }
    if progress <= 0 {
        let error = if progress == INIT_DEVICE_NOT_SUPPORTED {
            SessionError::DeviceNotSupported
        } else {
            SessionError::InitializationFailure(format!("engine reported code {progress}"))
        };
        return StageOutcome::Failed(error);
    }

    debug!("engine initialized, initializing trackers");
    if !ctx.callbacks.do_init_trackers() {
        return StageOutcome::Failed(SessionError::TrackersInitializationFailure);
    }
    StageOutcome::Completed
}

fn run_dataset_load(ctx: &StageContext, control: &StageControl) -> StageOutcome {
    let loaded = ctx.callbacks.do_load_trackers_data();
    if control.is_cancel_requested() {
        StageOutcome::Canceled
    } else if loaded {
        StageOutcome::Completed
    } else {
        StageOutcome::Failed(SessionError::LoadingTrackersFailure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arsession_device::{FrameState, MockGateway, INIT_ERROR};
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc;

    #[derive(Default)]
    struct CountingCallbacks {
        fail_init: bool,
        fail_load: bool,
        init_calls: AtomicUsize,
        load_calls: AtomicUsize,
    }

    impl SessionCallbacks for CountingCallbacks {
        fn do_init_trackers(&self) -> bool {
            self.init_calls.fetch_add(1, Ordering::SeqCst);
            !self.fail_init
        }
        fn do_load_trackers_data(&self) -> bool {
            self.load_calls.fetch_add(1, Ordering::SeqCst);
            !self.fail_load
        }
        fn do_start_trackers(&self) -> bool {
            true
        }
        fn do_stop_trackers(&self) -> bool {
            true
        }
        fn do_unload_trackers_data(&self) -> bool {
            true
        }
        fn do_deinit_trackers(&self) -> bool {
            true
        }
        fn on_init_done(&self, _error: Option<SessionError>) {}
        fn on_engine_frame_update(&self, _frame: &FrameState) {}
    }

    fn context(
        gateway: &Arc<MockGateway>,
        callbacks: &Arc<CountingCallbacks>,
        shutdown: &Arc<ShutdownLock>,
    ) -> StageContext {
        StageContext {
            gateway: Arc::clone(gateway) as Arc<dyn EngineGateway>,
            callbacks: Arc::clone(callbacks) as Arc<dyn SessionCallbacks>,
            shutdown: Arc::clone(shutdown),
            init_flags: InitFlags::Gl20,
            license_key: "test-key".to_owned(),
        }
    }

    fn run_to_completion(kind: StageKind, ctx: StageContext) -> (StageOutcome, i32) {
        let (tx, rx) = mpsc::channel();
        let handle = spawn(kind, ctx, move |control, outcome| {
            tx.send((outcome, control.progress())).unwrap();
        })
        .unwrap();
        let result = rx.recv().unwrap();
        handle.join();
        result
    }

    #[test]
    fn engine_init_runs_to_done() {
        let gateway = Arc::new(MockGateway::new());
        let callbacks = Arc::new(CountingCallbacks::default());
        let shutdown = Arc::new(ShutdownLock::new());

        let (outcome, progress) = run_to_completion(
            StageKind::EngineInit,
            context(&gateway, &callbacks, &shutdown),
        );
        assert_eq!(outcome, StageOutcome::Completed);
        assert_eq!(progress, 100);
        assert_eq!(gateway.advance_count(), 4);
        assert_eq!(callbacks.init_calls.load(Ordering::SeqCst), 1);
        assert!(shutdown.try_acquire().is_some());
    }

    #[test]
    fn engine_init_error_skips_trackers() {
        let gateway = Arc::new(MockGateway::new());
        gateway.set_init_script(&[INIT_ERROR]);
        let callbacks = Arc::new(CountingCallbacks::default());
        let shutdown = Arc::new(ShutdownLock::new());

        let (outcome, progress) = run_to_completion(
            StageKind::EngineInit,
            context(&gateway, &callbacks, &shutdown),
        );
        assert!(matches!(
            outcome,
            StageOutcome::Failed(SessionError::InitializationFailure(_))
        ));
        assert_eq!(progress, INIT_ERROR);
        assert_eq!(callbacks.init_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unsupported_device_is_refined() {
        let gateway = Arc::new(MockGateway::new());
        gateway.set_init_script(&[30, INIT_DEVICE_NOT_SUPPORTED]);
        let callbacks = Arc::new(CountingCallbacks::default());
        let shutdown = Arc::new(ShutdownLock::new());

        let (outcome, _) = run_to_completion(
            StageKind::EngineInit,
            context(&gateway, &callbacks, &shutdown),
        );
        assert_eq!(
            outcome,
            StageOutcome::Failed(SessionError::DeviceNotSupported)
        );
    }

    #[test]
    fn tracker_init_failure_downgrades_success() {
        let gateway = Arc::new(MockGateway::new());
        let callbacks = Arc::new(CountingCallbacks {
            fail_init: true,
            ..CountingCallbacks::default()
        });
        let shutdown = Arc::new(ShutdownLock::new());

        let (outcome, progress) = run_to_completion(
            StageKind::EngineInit,
            context(&gateway, &callbacks, &shutdown),
        );
        assert_eq!(progress, 100);
        assert_eq!(
            outcome,
            StageOutcome::Failed(SessionError::TrackersInitializationFailure)
        );
    }

    #[test]
    fn cancel_before_lock_does_no_work() {
        let gateway = Arc::new(MockGateway::new());
        let callbacks = Arc::new(CountingCallbacks::default());
        let shutdown = Arc::new(ShutdownLock::new());

        let (tx, rx) = mpsc::channel();
        let guard = shutdown.acquire();
        let handle = spawn(
            StageKind::EngineInit,
            context(&gateway, &callbacks, &shutdown),
            move |_, outcome| tx.send(outcome).unwrap(),
        )
        .unwrap();
        handle.control().cancel();
        drop(guard);

        assert_eq!(rx.recv().unwrap(), StageOutcome::Canceled);
        handle.join();
        assert_eq!(gateway.advance_count(), 0);
        assert_eq!(callbacks.init_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn dataset_load_failure() {
        let gateway = Arc::new(MockGateway::new());
        let callbacks = Arc::new(CountingCallbacks {
            fail_load: true,
            ..CountingCallbacks::default()
        });
        let shutdown = Arc::new(ShutdownLock::new());

        let (outcome, progress) = run_to_completion(
            StageKind::DatasetLoad,
            context(&gateway, &callbacks, &shutdown),
        );
        assert_eq!(
            outcome,
            StageOutcome::Failed(SessionError::LoadingTrackersFailure)
        );
        assert_eq!(progress, -1);
        assert_eq!(callbacks.load_calls.load(Ordering::SeqCst), 1);
    }

    /// Records whether the shutdown lock was held at each progress report.
    struct LockWitness {
        shutdown: Arc<ShutdownLock>,
        held: std::sync::Mutex<Vec<bool>>,
    }

    impl SessionCallbacks for LockWitness {
        fn do_init_trackers(&self) -> bool {
            true
        }
        fn do_load_trackers_data(&self) -> bool {
            true
        }
        fn do_start_trackers(&self) -> bool {
            true
        }
        fn do_stop_trackers(&self) -> bool {
            true
        }
        fn do_unload_trackers_data(&self) -> bool {
            true
        }
        fn do_deinit_trackers(&self) -> bool {
            true
        }
        fn on_init_done(&self, _error: Option<SessionError>) {}
        fn on_engine_frame_update(&self, _frame: &FrameState) {}
        fn on_init_progress(&self, _percent: i32) {
            let held = self.shutdown.try_acquire().is_none();
            self.held.lock().unwrap().push(held);
        }
    }

    #[test]
    fn progress_is_reported_under_the_shutdown_lock() {
        let gateway = Arc::new(MockGateway::new());
        let shutdown = Arc::new(ShutdownLock::new());
        let witness = Arc::new(LockWitness {
            shutdown: Arc::clone(&shutdown),
            held: std::sync::Mutex::new(Vec::new()),
        });
        let ctx = StageContext {
            gateway: Arc::clone(&gateway) as Arc<dyn EngineGateway>,
            callbacks: Arc::clone(&witness) as Arc<dyn SessionCallbacks>,
            shutdown: Arc::clone(&shutdown),
            init_flags: InitFlags::Gl20,
            license_key: String::new(),
        };

        let (outcome, _) = run_to_completion(StageKind::EngineInit, ctx);
        assert_eq!(outcome, StageOutcome::Completed);
        assert_eq!(*witness.held.lock().unwrap(), vec![true; 4]);
    }

    #[test]
    fn finished_stage_is_not_outstanding() {
        let gateway = Arc::new(MockGateway::new());
        let callbacks = Arc::new(CountingCallbacks::default());
        let shutdown = Arc::new(ShutdownLock::new());

        let handle = spawn(
            StageKind::DatasetLoad,
            context(&gateway, &callbacks, &shutdown),
            |_, _| {},
        )
        .unwrap();
        while handle.is_outstanding() {
            std::thread::yield_now();
        }
        assert_eq!(handle.control().kind(), StageKind::DatasetLoad);
        handle.join();
    }
}
