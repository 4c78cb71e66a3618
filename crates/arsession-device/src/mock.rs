use crate::camera::{
    CameraDirection, CaptureMode, FocusMode, PixelFormat, VideoBackgroundConfig, VideoMode,
};
use crate::display::{DisplayMetrics, HostDisplay, OrientationPreference, ScreenOrientation};
use crate::frame::{FrameListener, FrameState};
use crate::gateway::{EngineGateway, InitFlags, INIT_PROGRESS_DONE};
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// One recorded call into the mock gateway.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayCall {
    SetInitParameters { flags: InitFlags, license_key: String },
    AdvanceInit(i32),
    Deinit,
    OpenDevice(CameraDirection),
    VideoMode(CaptureMode),
    SetVideoBackground(VideoBackgroundConfig),
    SelectCaptureMode(CaptureMode),
    StartDevice,
    StopDevice,
    DeinitDevice,
    SetFocusMode { mode: FocusMode, accepted: bool },
    SetFlashTorch(bool),
    SetFrameFormat(PixelFormat),
    RegisterFrameListener,
    ReclaimMemory,
    Resume,
    Pause,
    SurfaceChanged(i32, i32),
    SurfaceCreated,
}

struct MockState {
    init_script: VecDeque<i32>,
    init_held: bool,
    step_delay: Duration,
    fail_open: bool,
    fail_capture_mode: bool,
    fail_start: bool,
    rejected_focus: HashSet<FocusMode>,
    video_mode: VideoMode,
    initialized: bool,
    device_open: bool,
    device_started: bool,
    calls: Vec<GatewayCall>,
}

/// Scriptable in-memory gateway.
///
/// Engine bring-up follows `init_script` step by step (then reports 100),
/// device operations can be told to fail, and `hold_init` parks the next
/// `advance_init` call until `release_init` so tests can observe a stage
/// mid-flight.
pub struct MockGateway {
    state: Mutex<MockState>,
    init_gate: Condvar,
    listener: Mutex<Option<Arc<dyn FrameListener>>>,
}

impl Default for MockGateway {
    fn default() -> Self {
        Self {
            state: Mutex::new(MockState {
                init_script: VecDeque::from([25, 50, 75, INIT_PROGRESS_DONE]),
                init_held: false,
                step_delay: Duration::ZERO,
                fail_open: false,
                fail_capture_mode: false,
                fail_start: false,
                rejected_focus: HashSet::new(),
                video_mode: VideoMode {
                    width: 640,
                    height: 480,
                    framerate: 30.0,
                },
                initialized: false,
                device_open: false,
                device_started: false,
                calls: Vec::new(),
            }),
            init_gate: Condvar::new(),
            listener: Mutex::new(None),
        }
    }
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, call: GatewayCall) {
        self.lock().calls.push(call);
    }

    /// Replace the progress codes returned by successive `advance_init` calls.
    pub fn set_init_script(&self, script: &[i32]) {
        self.lock().init_script = script.iter().copied().collect();
    }

    pub fn set_step_delay(&self, delay: Duration) {
        self.lock().step_delay = delay;
    }

    pub fn set_fail_open(&self, fail: bool) {
        self.lock().fail_open = fail;
    }

    pub fn set_fail_capture_mode(&self, fail: bool) {
        self.lock().fail_capture_mode = fail;
    }

    pub fn set_fail_start(&self, fail: bool) {
        self.lock().fail_start = fail;
    }

    pub fn reject_focus_mode(&self, mode: FocusMode) {
        self.lock().rejected_focus.insert(mode);
    }

    pub fn set_video_mode(&self, mode: VideoMode) {
        self.lock().video_mode = mode;
    }

    pub fn hold_init(&self) {
        self.lock().init_held = true;
    }

    pub fn release_init(&self) {
        self.lock().init_held = false;
        self.init_gate.notify_all();
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.lock().calls.clone()
    }

    pub fn count(&self, call: &GatewayCall) -> usize {
        self.lock().calls.iter().filter(|c| *c == call).count()
    }

    pub fn advance_count(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| matches!(c, GatewayCall::AdvanceInit(_)))
            .count()
    }

    pub fn is_initialized(&self) -> bool {
        self.lock().initialized
    }

    pub fn is_device_open(&self) -> bool {
        self.lock().device_open
    }

    pub fn is_device_started(&self) -> bool {
        self.lock().device_started
    }

    pub fn has_frame_listener(&self) -> bool {
        self.listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Deliver a frame to the registered listener, as the engine thread would.
    /// Returns false when nothing is registered.
    pub fn emit_frame(&self, frame: &FrameState) -> bool {
        let listener = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match listener {
            Some(listener) => {
                listener.on_frame(frame);
                true
            }
            None => false,
        }
    }
}

impl EngineGateway for MockGateway {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn set_init_parameters(&self, flags: InitFlags, license_key: &str) {
        self.record(GatewayCall::SetInitParameters {
            flags,
            license_key: license_key.to_owned(),
        });
    }

    fn advance_init(&self) -> i32 {
        let mut state = self.lock();
        while state.init_held {
            state = self
                .init_gate
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        let delay = state.step_delay;
        if !delay.is_zero() {
            drop(state);
            std::thread::sleep(delay);
            state = self.lock();
        }
        let progress = state.init_script.pop_front().unwrap_or(INIT_PROGRESS_DONE);
        if progress >= INIT_PROGRESS_DONE {
            state.initialized = true;
        }
        state.calls.push(GatewayCall::AdvanceInit(progress));
        progress
    }

    fn deinit(&self) {
        let mut state = self.lock();
        state.initialized = false;
        state.calls.push(GatewayCall::Deinit);
    }

    fn open_device(&self, direction: CameraDirection) -> bool {
        let mut state = self.lock();
        state.calls.push(GatewayCall::OpenDevice(direction));
        if state.fail_open {
            return false;
        }
        state.device_open = true;
        true
    }

    fn video_mode(&self, mode: CaptureMode) -> VideoMode {
        let mut state = self.lock();
        state.calls.push(GatewayCall::VideoMode(mode));
        state.video_mode
    }

    fn set_video_background(&self, config: &VideoBackgroundConfig) {
        self.record(GatewayCall::SetVideoBackground(*config));
    }

    fn select_capture_mode(&self, mode: CaptureMode) -> bool {
        let mut state = self.lock();
        state.calls.push(GatewayCall::SelectCaptureMode(mode));
        !state.fail_capture_mode
    }

    fn start_device(&self) -> bool {
        let mut state = self.lock();
        state.calls.push(GatewayCall::StartDevice);
        if state.fail_start || !state.device_open {
            return false;
        }
        state.device_started = true;
        true
    }

    fn stop_device(&self) {
        let mut state = self.lock();
        state.device_started = false;
        state.calls.push(GatewayCall::StopDevice);
    }

    fn deinit_device(&self) {
        let mut state = self.lock();
        state.device_open = false;
        state.calls.push(GatewayCall::DeinitDevice);
    }

    fn set_focus_mode(&self, mode: FocusMode) -> bool {
        let mut state = self.lock();
        let accepted = !state.rejected_focus.contains(&mode);
        state
            .calls
            .push(GatewayCall::SetFocusMode { mode, accepted });
        accepted
    }

    fn set_flash_torch(&self, on: bool) -> bool {
        self.record(GatewayCall::SetFlashTorch(on));
        true
    }

    fn set_frame_format(&self, format: PixelFormat, _enabled: bool) -> bool {
        self.record(GatewayCall::SetFrameFormat(format));
        true
    }

    fn register_frame_listener(&self, listener: Arc<dyn FrameListener>) {
        *self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(listener);
        self.record(GatewayCall::RegisterFrameListener);
    }

    fn reclaim_memory(&self) {
        self.record(GatewayCall::ReclaimMemory);
    }

    fn on_resume(&self) {
        self.record(GatewayCall::Resume);
    }

    fn on_pause(&self) {
        self.record(GatewayCall::Pause);
    }

    fn on_surface_changed(&self, width: i32, height: i32) {
        self.record(GatewayCall::SurfaceChanged(width, height));
    }

    fn on_surface_created(&self) {
        self.record(GatewayCall::SurfaceCreated);
    }
}

/// In-memory host window with settable metrics.
pub struct MockDisplay {
    metrics: Mutex<DisplayMetrics>,
    requested: Mutex<Vec<OrientationPreference>>,
    screen_on: Mutex<bool>,
}

impl Default for MockDisplay {
    fn default() -> Self {
        Self::new(1080, 1920, ScreenOrientation::Portrait)
    }
}

impl MockDisplay {
    pub fn new(width: i32, height: i32, orientation: ScreenOrientation) -> Self {
        Self {
            metrics: Mutex::new(DisplayMetrics {
                width,
                height,
                orientation,
            }),
            requested: Mutex::new(Vec::new()),
            screen_on: Mutex::new(false),
        }
    }

    pub fn set_metrics(&self, metrics: DisplayMetrics) {
        *self.metrics.lock().unwrap_or_else(PoisonError::into_inner) = metrics;
    }

    pub fn requested_orientations(&self) -> Vec<OrientationPreference> {
        self.requested
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn screen_kept_on(&self) -> bool {
        *self.screen_on.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl HostDisplay for MockDisplay {
    fn request_orientation(&self, preference: OrientationPreference) {
        self.requested
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(preference);
    }

    fn keep_screen_on(&self) {
        *self.screen_on.lock().unwrap_or_else(PoisonError::into_inner) = true;
    }

    fn metrics(&self) -> DisplayMetrics {
        *self.metrics.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
