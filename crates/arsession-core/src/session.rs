use crate::callbacks::{FrameForwarder, SessionCallbacks};
use crate::concurrency::ShutdownLock;
use crate::config::SessionConfig;
use crate::display::DisplayState;
use crate::lifecycle::{validate_transition, LifecyclePhase};
use crate::stage::{self, StageContext, StageControl, StageHandle, StageKind, StageOutcome};
use crate::SessionError;
use arsession_device::{
    select_gateway, CameraDirection, CaptureMode, EngineGateway, FocusMode, FrameState,
    HostDisplay, OrientationPreference,
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, info, warn};

/// Lifecycle controller for one engine + camera session.
///
/// Public operations are meant to be driven from a single foreground thread.
/// Engine bring-up and dataset loading run on background stages that share
/// the controller's shutdown lock with `stop()`, so teardown never overlaps a
/// bring-up step.
pub struct SessionController {
    shared: Arc<Shared>,
}

struct Shared {
    gateway: Arc<dyn EngineGateway>,
    display: Arc<dyn HostDisplay>,
    callbacks: Arc<dyn SessionCallbacks>,
    config: SessionConfig,
    shutdown: Arc<ShutdownLock>,
    state: Mutex<SessionState>,
}

struct SessionState {
    phase: LifecyclePhase,
    active_camera: CameraDirection,
    display: DisplayState,
    engine_stage: Option<StageHandle>,
    dataset_stage: Option<StageHandle>,
    /// An accepted `initialize()` whose `on_init_done` has not fired yet.
    init_pending: bool,
    /// `stop()` is between its phase change and the end of teardown.
    stopping: bool,
    /// Notification held back while `stopping`; `stop()` delivers it last.
    deferred_init_done: InitNotification,
}

/// Serializable view of the controller, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub phase: LifecyclePhase,
    pub active_camera: CameraDirection,
    pub display: DisplayState,
    pub init_progress: i32,
    pub stages_in_flight: Vec<StageKind>,
}

impl SessionController {
    pub fn new(
        gateway: Arc<dyn EngineGateway>,
        display: Arc<dyn HostDisplay>,
        callbacks: Arc<dyn SessionCallbacks>,
        config: SessionConfig,
    ) -> Self {
        let active_camera = config.default_camera;
        Self {
            shared: Arc::new(Shared {
                gateway,
                display,
                callbacks,
                config,
                shutdown: Arc::new(ShutdownLock::new()),
                state: Mutex::new(SessionState {
                    phase: LifecyclePhase::Uninitialized,
                    active_camera,
                    display: DisplayState::default(),
                    engine_stage: None,
                    dataset_stage: None,
                    init_pending: false,
                    stopping: false,
                    deferred_init_done: None,
                }),
            }),
        }
    }

    /// Build a controller whose gateway is picked by `config.gateway`.
    pub fn from_config(
        config: SessionConfig,
        display: Arc<dyn HostDisplay>,
        callbacks: Arc<dyn SessionCallbacks>,
    ) -> Result<Self, SessionError> {
        let gateway = select_gateway(&config.gateway)?;
        Ok(Self::new(gateway, display, callbacks, config))
    }

    /// Apply the orientation preference, record display state, and launch
    /// engine bring-up in the background.
    ///
    /// Returns as soon as the stage is launched. Every call, accepted or
    /// not, gets exactly one `on_init_done`: a rejected call is notified
    /// before it returns its error, an accepted one once the bring-up chain
    /// resolves.
    pub fn initialize(&self, preference: OrientationPreference) -> Result<(), SessionError> {
        info!("initializing session ({preference:?})");
        let launched = self.launch_engine_init(preference);
        if let Err(e) = &launched {
            error!("initializing engine failed: {e}");
            self.shared.callbacks.on_init_done(Some(e.clone()));
        }
        launched
    }

    /// `initialize()` with the orientation preference from the config.
    pub fn initialize_default(&self) -> Result<(), SessionError> {
        self.initialize(self.shared.config.orientation)
    }

    fn launch_engine_init(&self, preference: OrientationPreference) -> Result<(), SessionError> {
        let shared = &self.shared;
        let mut state = shared.lock_state();

        if state.stopping {
            return Err(SessionError::TeardownInProgress);
        }
        if matches!(
            state.phase,
            LifecyclePhase::EngineInitializing | LifecyclePhase::DatasetLoading
        ) {
            return Err(SessionError::AlreadyInitializing);
        }
        validate_transition(state.phase, LifecyclePhase::EngineInitializing)?;

        shared.display.request_orientation(preference.normalized());
        state.display.refresh(&shared.display.metrics());
        shared.display.keep_screen_on();

        // Any stage of a previous bring-up has resolved; drop its handle.
        state.engine_stage = None;
        state.dataset_stage = None;

        shared.set_phase(&mut state, LifecyclePhase::EngineInitializing)?;
        let completion = Arc::clone(shared);
        match stage::spawn(
            StageKind::EngineInit,
            shared.stage_context(),
            move |control, outcome| completion.on_stage_complete(control, outcome),
        ) {
            Ok(handle) => {
                state.engine_stage = Some(handle);
                state.init_pending = true;
                Ok(())
            }
            Err(e) => {
                shared.set_phase(&mut state, LifecyclePhase::Failed)?;
                Err(e)
            }
        }
    }

    /// Open, configure, and start the camera, then start the trackers.
    ///
    /// A device failure stops the camera again before the error is
    /// returned. An auto-focus rejection falls back to normal focus; only a
    /// rejected fallback is reported, and the camera stays running.
    pub fn start(&self, camera: CameraDirection) -> Result<(), SessionError> {
        info!("starting camera {camera}");
        let shared = &self.shared;
        let (from, screen) = {
            let mut state = shared.lock_state();
            if state.stopping {
                return Err(SessionError::TeardownInProgress);
            }
            if !matches!(
                state.phase,
                LifecyclePhase::Running | LifecyclePhase::Paused | LifecyclePhase::Stopped
            ) {
                return Err(SessionError::InvalidTransition {
                    from: state.phase.to_string(),
                    to: "start requires running, paused or stopped state".to_owned(),
                });
            }
            state.active_camera = camera;
            (state.phase, state.display)
        };

        if let Err(e) = shared.start_camera(camera, &screen) {
            error!("{e}");
            shared.stop_camera();
            return Err(e);
        }

        let focus = shared.apply_focus();

        let mut state = shared.lock_state();
        if state.stopping || state.phase != from {
            // Another operation moved the session while the camera came up.
            let now = state.phase;
            drop(state);
            warn!("session moved {from} -> {now} while the camera was starting");
            shared.stop_camera();
            return Err(SessionError::InvalidTransition {
                from: now.to_string(),
                to: LifecyclePhase::Running.to_string(),
            });
        }
        shared.set_phase(&mut state, LifecyclePhase::Running)?;
        focus
    }

    /// Cancel any in-flight stage, stop the camera, and tear the engine down.
    ///
    /// Idempotent: once the session is stopped, further calls return `Ok`
    /// without touching the engine. Unload and deinit both always run; the
    /// first failure among them is returned afterwards.
    ///
    /// A bring-up canceled here is notified from this call, after teardown
    /// and with no lock held, so the callback may initialize again.
    pub fn stop(&self) -> Result<(), SessionError> {
        info!("stopping session");
        let shared = &self.shared;
        let stages = {
            let mut state = shared.lock_state();
            match state.phase {
                LifecyclePhase::Stopped => {
                    debug!("session already stopped");
                    return Ok(());
                }
                LifecyclePhase::Uninitialized => {
                    return shared.set_phase(&mut state, LifecyclePhase::Stopped);
                }
                _ => {}
            }
            shared.set_phase(&mut state, LifecyclePhase::Stopped)?;
            state.stopping = true;

            let stages: Vec<StageHandle> = [state.engine_stage.take(), state.dataset_stage.take()]
                .into_iter()
                .flatten()
                .collect();
            for stage in &stages {
                if stage.is_outstanding() {
                    debug!("canceling {} stage", stage.control().kind());
                }
                stage.control().cancel();
            }
            stages
        };

        shared.stop_camera();

        // Canceled stages exit at their next step boundary.
        for stage in stages {
            stage.join();
        }

        let guard = shared.shutdown.acquire();
        let unloaded = shared.callbacks.do_unload_trackers_data();
        let deinitialized = shared.callbacks.do_deinit_trackers();
        shared.gateway.deinit();
        drop(guard);

        let deferred = {
            let mut state = shared.lock_state();
            state.stopping = false;
            state.deferred_init_done.take()
        };
        if let Some(result) = deferred {
            shared.callbacks.on_init_done(result.err());
        }

        if !unloaded {
            error!("failed to unload tracker data");
            return Err(SessionError::UnloadingTrackersFailure);
        }
        if !deinitialized {
            error!("failed to deinitialize trackers");
            return Err(SessionError::TrackersDeinitializationFailure);
        }
        info!("session stopped");
        Ok(())
    }

    /// Stop the camera if running. The engine and any dataset load in
    /// progress are left alone.
    pub fn pause(&self) {
        info!("pausing session");
        let shared = &self.shared;
        let was_running = {
            let mut state = shared.lock_state();
            state.phase == LifecyclePhase::Running
                && shared.set_phase(&mut state, LifecyclePhase::Paused).is_ok()
        };
        if was_running {
            shared.stop_camera();
        }
        shared.gateway.on_pause();
    }

    /// Resume the engine, restarting the camera with the last-used direction
    /// if the session was paused while running.
    pub fn resume(&self) -> Result<(), SessionError> {
        info!("resuming session");
        self.shared.gateway.on_resume();
        let camera = {
            let state = self.shared.lock_state();
            (state.phase == LifecyclePhase::Paused).then_some(state.active_camera)
        };
        match camera {
            Some(camera) => self.start(camera),
            None => Ok(()),
        }
    }

    pub fn on_orientation_changed(&self) {
        let shared = &self.shared;
        let (running, screen) = {
            let mut state = shared.lock_state();
            state.display.refresh(&shared.display.metrics());
            (state.phase == LifecyclePhase::Running, state.display)
        };
        info!(
            "display is in {} ({}x{})",
            if screen.portrait { "portrait" } else { "landscape" },
            screen.width,
            screen.height
        );
        if running {
            shared.configure_video_background(&screen);
        }
    }

    pub fn on_surface_changed(&self, width: i32, height: i32) {
        {
            let mut state = self.shared.lock_state();
            state.display.width = width;
            state.display.height = height;
        }
        self.shared.gateway.on_surface_changed(width, height);
    }

    pub fn on_surface_created(&self) {
        self.shared.gateway.on_surface_created();
    }

    /// Forward one processed frame to the application. Never blocks on
    /// controller state.
    pub fn on_engine_frame_update(&self, frame: &FrameState) {
        self.shared.callbacks.on_engine_frame_update(frame);
    }

    pub fn phase(&self) -> LifecyclePhase {
        self.shared.lock_state().phase
    }

    pub fn is_running(&self) -> bool {
        self.phase() == LifecyclePhase::Running
    }

    pub fn active_camera(&self) -> CameraDirection {
        self.shared.lock_state().active_camera
    }

    pub fn display_state(&self) -> DisplayState {
        self.shared.lock_state().display
    }

    /// Last engine bring-up progress, or -1 when no bring-up has reported.
    pub fn init_progress(&self) -> i32 {
        self.shared
            .lock_state()
            .engine_stage
            .as_ref()
            .map_or(-1, |stage| stage.control().progress())
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.shared.lock_state();
        let stages_in_flight = [&state.engine_stage, &state.dataset_stage]
            .into_iter()
            .flatten()
            .filter(|stage| stage.is_outstanding())
            .map(|stage| stage.control().kind())
            .collect();
        SessionSnapshot {
            phase: state.phase,
            active_camera: state.active_camera,
            display: state.display,
            init_progress: state
                .engine_stage
                .as_ref()
                .map_or(-1, |stage| stage.control().progress()),
            stages_in_flight,
        }
    }
}

impl Shared {
    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_phase(&self, state: &mut SessionState, to: LifecyclePhase) -> Result<(), SessionError> {
        validate_transition(state.phase, to)?;
        debug!("session phase: {} -> {to}", state.phase);
        state.phase = to;
        Ok(())
    }

    fn stage_context(&self) -> StageContext {
        StageContext {
            gateway: Arc::clone(&self.gateway),
            callbacks: Arc::clone(&self.callbacks),
            shutdown: Arc::clone(&self.shutdown),
            init_flags: self.config.init_flags,
            license_key: self.config.license_key.clone(),
        }
    }

    /// Single completion path for both stage kinds. Runs on the stage's
    /// worker thread after it released the shutdown lock.
    fn on_stage_complete(self: &Arc<Self>, control: &Arc<StageControl>, outcome: StageOutcome) {
        let kind = control.kind();
        // stop() raises the flag under the state lock, so checking it here
        // orders this completion against teardown.
        let notification = {
            let mut state = self.lock_state();
            let outcome = if control.is_cancel_requested() {
                StageOutcome::Canceled
            } else {
                outcome
            };
            let notification = match (kind, outcome) {
                (_, StageOutcome::Canceled) => {
                    debug!("{kind} stage canceled");
                    take_pending(&mut state, Err(SessionError::Canceled))
                }
                (StageKind::EngineInit, StageOutcome::Completed) => {
                    info!("engine initialized, loading tracker data");
                    match self.launch_dataset_load(&mut state) {
                        Ok(()) => None,
                        Err(e) => self.fail(&mut state, e),
                    }
                }
                (StageKind::DatasetLoad, StageOutcome::Completed) => {
                    match self.set_phase(&mut state, LifecyclePhase::Running) {
                        Ok(()) => {
                            self.gateway.reclaim_memory();
                            self.gateway.register_frame_listener(Arc::new(FrameForwarder::new(
                                Arc::clone(&self.callbacks),
                            )));
                            info!("tracker data loaded, session running");
                            take_pending(&mut state, Ok(()))
                        }
                        Err(e) => self.fail(&mut state, e),
                    }
                }
                (_, StageOutcome::Failed(e)) => self.fail(&mut state, e),
            };
            if state.stopping && notification.is_some() {
                debug!("holding back on_init_done until teardown finishes");
                state.deferred_init_done = notification;
                None
            } else {
                notification
            }
        };

        if let Some(result) = notification {
            self.callbacks.on_init_done(result.err());
        }
    }

    fn launch_dataset_load(self: &Arc<Self>, state: &mut SessionState) -> Result<(), SessionError> {
        if state
            .dataset_stage
            .as_ref()
            .is_some_and(StageHandle::is_outstanding)
        {
            return Err(SessionError::StageInFlight(StageKind::DatasetLoad));
        }
        self.set_phase(state, LifecyclePhase::DatasetLoading)?;
        let completion = Arc::clone(self);
        let handle = stage::spawn(
            StageKind::DatasetLoad,
            self.stage_context(),
            move |control, outcome| completion.on_stage_complete(control, outcome),
        )?;
        state.dataset_stage = Some(handle);
        Ok(())
    }

    fn fail(&self, state: &mut SessionState, error: SessionError) -> InitNotification {
        error!("session initialization failed: {error}");
        if let Err(e) = self.set_phase(state, LifecyclePhase::Failed) {
            warn!("cannot mark session failed: {e}");
        }
        take_pending(state, Err(error))
    }

    fn start_camera(
        &self,
        camera: CameraDirection,
        screen: &DisplayState,
    ) -> Result<(), SessionError> {
        if !self.gateway.open_device(camera) {
            return Err(SessionError::CameraInitializationFailure(format!(
                "unable to open camera device: {camera}"
            )));
        }

        self.configure_video_background(screen);

        if !self.gateway.select_capture_mode(CaptureMode::Default) {
            return Err(SessionError::CameraInitializationFailure(
                "unable to set video mode".to_owned(),
            ));
        }
        if !self.gateway.start_device() {
            return Err(SessionError::CameraInitializationFailure(format!(
                "unable to start camera device: {camera}"
            )));
        }

        if !self.gateway.set_frame_format(self.config.frame_format, true) {
            warn!("frame format {:?} rejected", self.config.frame_format);
        }
        if !self.callbacks.do_start_trackers() {
            warn!("failed to start trackers");
        }
        Ok(())
    }

    fn apply_focus(&self) -> Result<(), SessionError> {
        if self.gateway.set_focus_mode(FocusMode::TriggerAuto) {
            return Ok(());
        }
        warn!("auto focus rejected, falling back to normal focus");
        if self.gateway.set_focus_mode(FocusMode::Normal) {
            Ok(())
        } else {
            error!("failed to set focus mode: {}", FocusMode::Normal);
            Err(SessionError::SetFocusModeFailure(FocusMode::Normal))
        }
    }

    fn stop_camera(&self) {
        if !self.callbacks.do_stop_trackers() {
            warn!("failed to stop trackers");
        }
        self.gateway.set_flash_torch(false);
        self.gateway.stop_device();
        self.gateway.deinit_device();
    }

    fn configure_video_background(&self, screen: &DisplayState) {
        let video = self.gateway.video_mode(CaptureMode::Default);
        let config = screen.video_background(&video);
        info!(
            "video background: video ({}, {}), screen ({}, {}), size ({}, {})",
            video.width, video.height, screen.width, screen.height, config.size.0, config.size.1
        );
        self.gateway.set_video_background(&config);
    }
}

/// Outcome to deliver through `on_init_done`, if one is still owed.
type InitNotification = Option<Result<(), SessionError>>;

fn take_pending(state: &mut SessionState, result: Result<(), SessionError>) -> InitNotification {
    std::mem::take(&mut state.init_pending).then_some(result)
}
