use serde::{Deserialize, Serialize};

/// How point cloud samples are colored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorMode {
    /// Every sample takes the sensor's assigned color
    #[default]
    Solid,

    /// Samples shade from red at the minimum range to green at the maximum range
    DistanceGradient,
}

/// A resolved coloring rule for one scan cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorPolicy {
    pub mode: ColorMode,
    pub base: [u8; 3],
    pub min_range: f64,
    pub max_range: f64,
}

impl ColorPolicy {
    pub fn new(mode: ColorMode, base: [u8; 3], min_range: f64, max_range: f64) -> Self {
        Self {
            mode,
            base,
            min_range,
            max_range,
        }
    }

    pub fn solid(base: [u8; 3]) -> Self {
        Self::new(ColorMode::Solid, base, 0.0, 1.0)
    }

    pub fn color_for(&self, distance: f64) -> [u8; 3] {
        match self.mode {
            ColorMode::Solid => self.base,
            ColorMode::DistanceGradient => {
                let span = self.max_range - self.min_range;
                let f = if span > 0.0 {
                    ((distance - self.min_range) / span).clamp(0.0, 1.0)
                } else {
                    0.0
                };
                [((1.0 - f) * 255.0).round() as u8, (f * 255.0).round() as u8, 0]
            }
        }
    }
}

/// Colors handed out to new sensors in turn, so several clouds can be told apart
pub const SENSOR_PALETTE: [[u8; 3]; 6] = [
    [255, 99, 71],
    [65, 105, 225],
    [50, 205, 50],
    [255, 215, 0],
    [186, 85, 211],
    [0, 206, 209],
];
