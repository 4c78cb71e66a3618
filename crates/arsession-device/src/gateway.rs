use crate::camera::{
    CameraDirection, CaptureMode, FocusMode, PixelFormat, VideoBackgroundConfig, VideoMode,
};
use crate::frame::FrameListener;
use crate::DeviceError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// `advance_init` reached the end of engine bring-up.
pub const INIT_PROGRESS_DONE: i32 = 100;
/// Generic engine bring-up failure.
pub const INIT_ERROR: i32 = -1;
/// The engine does not run on this hardware.
pub const INIT_DEVICE_NOT_SUPPORTED: i32 = -2;

/// Rendering backend the engine is initialised for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitFlags {
    #[default]
    Gl20,
    Gl30,
}

/// Primitives of the tracking SDK and its camera device.
///
/// Every method is a direct, blocking call into the SDK. `advance_init` in
/// particular blocks until one bring-up step completes and is only ever
/// called from a background stage.
pub trait EngineGateway: Send + Sync {
    fn name(&self) -> &str;

    fn set_init_parameters(&self, flags: InitFlags, license_key: &str);

    /// Run one engine bring-up step. Returns progress in percent
    /// (`0..=100`) or a negative error code.
    fn advance_init(&self) -> i32;

    fn deinit(&self);

    fn open_device(&self, direction: CameraDirection) -> bool;

    fn video_mode(&self, mode: CaptureMode) -> VideoMode;

    fn set_video_background(&self, config: &VideoBackgroundConfig);

    fn select_capture_mode(&self, mode: CaptureMode) -> bool;

    fn start_device(&self) -> bool;

    fn stop_device(&self);

    fn deinit_device(&self);

    fn set_focus_mode(&self, mode: FocusMode) -> bool;

    fn set_flash_torch(&self, _on: bool) -> bool {
        false
    }

    fn set_frame_format(&self, format: PixelFormat, enabled: bool) -> bool;

    fn register_frame_listener(&self, listener: Arc<dyn FrameListener>);

    /// Hint that now is a good moment to release cached allocations.
    fn reclaim_memory(&self) {}

    fn on_resume(&self);

    fn on_pause(&self);

    fn on_surface_changed(&self, width: i32, height: i32);

    fn on_surface_created(&self);
}

pub fn select_gateway(name: &str) -> Result<Arc<dyn EngineGateway>, DeviceError> {
    match name {
        "mock" => {
            debug!("selected mock gateway");
            Ok(Arc::new(crate::mock::MockGateway::new()))
        }
        other => {
            warn!("unknown gateway '{other}'");
            Err(DeviceError::GatewayUnavailable(other.to_owned()))
        }
    }
}
