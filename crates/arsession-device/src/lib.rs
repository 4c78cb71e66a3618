//! Engine gateway boundary for arsession.
//!
//! This crate defines the narrow surface the session controller drives: the
//! pluggable `EngineGateway` trait over the tracking SDK and camera device,
//! the `HostDisplay` trait over the embedding window, camera and frame value
//! types, and a scriptable mock gateway used by tests, benches, and the
//! stress binary.

pub mod camera;
pub mod display;
pub mod frame;
pub mod gateway;
pub mod mock;

pub use camera::{
    CameraDirection, CaptureMode, FocusMode, PixelFormat, VideoBackgroundConfig, VideoMode,
};
pub use display::{DisplayMetrics, HostDisplay, OrientationPreference, ScreenOrientation};
pub use frame::{FrameListener, FrameState};
pub use gateway::{
    select_gateway, EngineGateway, InitFlags, INIT_DEVICE_NOT_SUPPORTED, INIT_ERROR,
    INIT_PROGRESS_DONE,
};
pub use mock::{GatewayCall, MockDisplay, MockGateway};

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeviceError {
    #[error("gateway '{0}' is not available on this system")]
    GatewayUnavailable(String),
}
