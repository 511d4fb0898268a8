//! Engine-wide tuning: throttle intervals, ray budgets, filter and tessellation parameters and
//! the reference frame. Every field has a default, so a settings file only needs to name what
//! it changes.

use crate::scene::{FilterSettings, ReferenceFrame};
use crate::sensors::camera::DEFAULT_PREVIEW_PIXEL_BUDGET;
use crate::sensors::lidar::DEFAULT_RAY_BUDGET;
use crate::sensors::volume::VolumeSettings;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Minimum time between two point cloud rebuilds of one sensor
    #[serde(with = "millis")]
    pub scan_interval: Duration,

    /// Minimum time between two camera preview refreshes
    #[serde(with = "millis")]
    pub preview_interval: Duration,

    /// Rays per LIDAR scan cycle before the horizontal resolution is degraded
    pub ray_budget: usize,

    /// Pixels per camera preview before the raster is scaled down
    pub preview_pixel_budget: usize,

    pub filter: FilterSettings,
    pub volume: VolumeSettings,

    /// Cast the rays of one scan on the rayon thread pool
    pub parallel_raycast: bool,

    pub frame: ReferenceFrame,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            scan_interval: Duration::from_millis(50),
            preview_interval: Duration::from_millis(200),
            ray_budget: DEFAULT_RAY_BUDGET,
            preview_pixel_budget: DEFAULT_PREVIEW_PIXEL_BUDGET,
            filter: FilterSettings::default(),
            volume: VolumeSettings::default(),
            parallel_raycast: false,
            frame: ReferenceFrame::default(),
        }
    }
}

/// Read engine settings from a JSON file
pub fn load_settings(path: &Path) -> Result<EngineSettings> {
    let text = std::fs::read_to_string(path)?;
    let settings = serde_json::from_str(&text)?;
    Ok(settings)
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let ms = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_gives_defaults() {
        let settings: EngineSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, EngineSettings::default());
    }

    #[test]
    fn durations_are_milliseconds() {
        let settings: EngineSettings =
            serde_json::from_str(r#"{"scan_interval": 120, "ray_budget": 500}"#).unwrap();
        assert_eq!(settings.scan_interval, Duration::from_millis(120));
        assert_eq!(settings.preview_interval, Duration::from_millis(200));
        assert_eq!(settings.ray_budget, 500);

        let text = serde_json::to_string(&settings).unwrap();
        assert!(text.contains("\"scan_interval\":120"));
    }

    #[test]
    fn nested_settings_partially_overridden() {
        let settings: EngineSettings = serde_json::from_str(
            r#"{"filter": {"max_candidates": 12}, "volume": {"vertical_segments": 2}}"#,
        )
        .unwrap();
        assert_eq!(settings.filter.max_candidates, 12);
        assert_eq!(settings.filter.range_margin, FilterSettings::default().range_margin);
        assert_eq!(settings.volume.vertical_segments, 2);
        assert_eq!(settings.volume.horizontal_segments_per_360, 64);
    }

    #[test]
    fn serialization_round_trip() {
        let mut settings = EngineSettings::default();
        settings.parallel_raycast = true;
        settings.frame = ReferenceFrame::ros_to_y_up();
        let text = serde_json::to_string(&settings).unwrap();
        let back: EngineSettings = serde_json::from_str(&text).unwrap();
        assert_eq!(back, settings);
    }

    #[test]
    fn load_from_file() {
        let path = std::env::temp_dir().join(format!("sensorviz-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, r#"{"parallel_raycast": true}"#).unwrap();
        let settings = load_settings(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert!(settings.parallel_raycast);
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(load_settings(Path::new("/definitely/not/here.json")).is_err());
    }
}
