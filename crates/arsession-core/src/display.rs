use arsession_device::{DisplayMetrics, ScreenOrientation, VideoBackgroundConfig, VideoMode};
use serde::{Deserialize, Serialize};

/// Last-known orientation and extents of the host display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayState {
    pub portrait: bool,
    pub width: i32,
    pub height: i32,
}

impl DisplayState {
    /// Fold fresh host metrics in. An undefined orientation keeps the
    /// previous portrait flag.
    pub fn refresh(&mut self, metrics: &DisplayMetrics) {
        match metrics.orientation {
            ScreenOrientation::Portrait => self.portrait = true,
            ScreenOrientation::Landscape => self.portrait = false,
            ScreenOrientation::Undefined => {}
        }
        self.width = metrics.width;
        self.height = metrics.height;
    }

    /// Size the camera image so it covers the whole screen without
    /// distorting its aspect ratio. In portrait the sensor image is rotated,
    /// so its width maps onto screen height.
    pub fn video_background(&self, video: &VideoMode) -> VideoBackgroundConfig {
        let (vw, vh) = (video.width as f32, video.height as f32);
        let (sw, sh) = (self.width, self.height);

        let size = if vw <= 0.0 || vh <= 0.0 {
            (sw, sh)
        } else if self.portrait {
            let x = (vh * (sh as f32 / vw)) as i32;
            if x < sw {
                (sw, (sw as f32 * (vw / vh)) as i32)
            } else {
                (x, sh)
            }
        } else {
            let y = (vh * (sw as f32 / vw)) as i32;
            if y < sh {
                ((sh as f32 * (vw / vh)) as i32, sh)
            } else {
                (sw, y)
            }
        };

        VideoBackgroundConfig {
            enabled: true,
            position: (0, 0),
            size,
        }
    }
}
