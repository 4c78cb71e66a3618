//! Core lifecycle controller for camera-backed tracking sessions.
//!
//! This crate ties the engine gateway and the embedding application's
//! callbacks together into the `SessionController`: the central API for
//! initializing the engine in the background, loading the tracking dataset,
//! starting, pausing, resuming, and stopping the camera, and tearing the whole
//! subsystem down without racing an in-flight background stage. It also
//! provides the shutdown lock, the phase transition table, and session
//! configuration.

pub mod callbacks;
pub mod concurrency;
pub mod config;
pub mod display;
pub mod lifecycle;
pub mod session;
pub mod stage;

pub use callbacks::SessionCallbacks;
pub use concurrency::{install_signal_handler, shutdown_requested, ShutdownGuard, ShutdownLock};
pub use config::{ConfigError, SessionConfig};
pub use display::DisplayState;
pub use lifecycle::{validate_transition, LifecyclePhase};
pub use session::{SessionController, SessionSnapshot};
pub use stage::{StageKind, StageOutcome};

use arsession_device::FocusMode;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("cannot initialize the engine twice")]
    AlreadyInitializing,
    #[error("engine initialization failed: {0}")]
    InitializationFailure(String),
    #[error("engine initialization failed: this device is not supported")]
    DeviceNotSupported,
    #[error("camera initialization failed: {0}")]
    CameraInitializationFailure(String),
    #[error("failed to initialize trackers")]
    TrackersInitializationFailure,
    #[error("failed to load tracker data")]
    LoadingTrackersFailure,
    #[error("failed to unload tracker data")]
    UnloadingTrackersFailure,
    #[error("failed to deinitialize trackers")]
    TrackersDeinitializationFailure,
    #[error("failed to set focus mode: {0}")]
    SetFocusModeFailure(FocusMode),
    #[error("initialization canceled")]
    Canceled,
    #[error("session teardown in progress")]
    TeardownInProgress,
    #[error("{0} stage is already in flight")]
    StageInFlight(StageKind),
    #[error("invalid state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },
    #[error("device error: {0}")]
    Device(#[from] arsession_device::DeviceError),
}
