use serde::{Deserialize, Serialize};

/// Orientation the embedding window is asked to lock to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrientationPreference {
    Portrait,
    Landscape,
    #[default]
    Sensor,
    FullSensor,
}

impl OrientationPreference {
    /// `Sensor` only covers three of the four rotations on most hosts;
    /// upgrade it so upside-down portrait is tracked too.
    pub fn normalized(self) -> Self {
        match self {
            OrientationPreference::Sensor => OrientationPreference::FullSensor,
            other => other,
        }
    }
}

/// Orientation the host currently reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScreenOrientation {
    Portrait,
    Landscape,
    Undefined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayMetrics {
    pub width: i32,
    pub height: i32,
    pub orientation: ScreenOrientation,
}

/// Thin platform queries against the window the session renders into.
pub trait HostDisplay: Send + Sync {
    fn request_orientation(&self, preference: OrientationPreference);

    fn keep_screen_on(&self);

    fn metrics(&self) -> DisplayMetrics;
}
