use serde::{Deserialize, Serialize};

/// Which physical camera the device should open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraDirection {
    #[default]
    Default,
    Back,
    Front,
}

impl std::fmt::Display for CameraDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CameraDirection::Default => write!(f, "default"),
            CameraDirection::Back => write!(f, "back"),
            CameraDirection::Front => write!(f, "front"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureMode {
    #[default]
    Default,
    OptimizeSpeed,
    OptimizeQuality,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FocusMode {
    Normal,
    TriggerAuto,
    ContinuousAuto,
    Infinity,
    Macro,
}

impl std::fmt::Display for FocusMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FocusMode::Normal => write!(f, "normal"),
            FocusMode::TriggerAuto => write!(f, "trigger-auto"),
            FocusMode::ContinuousAuto => write!(f, "continuous-auto"),
            FocusMode::Infinity => write!(f, "infinity"),
            FocusMode::Macro => write!(f, "macro"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    #[default]
    Rgb565,
    Rgb888,
    Grayscale,
    Yuv,
}

/// Resolution the camera captures at for a given capture mode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VideoMode {
    pub width: i32,
    pub height: i32,
    pub framerate: f32,
}

/// Placement of the camera image behind rendered content, in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoBackgroundConfig {
    pub enabled: bool,
    pub position: (i32, i32),
    pub size: (i32, i32),
}
