//! The rig document: the JSON file a sensor setup is saved to and loaded from. A document is
//! parsed and validated in full before anything is handed to the visualizer, so a bad file
//! never leaves a rig half loaded.

use crate::errors::ImportError;
use crate::sensors::{ColorMode, SensorKind, SensorPose, SensorSpec};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DOCUMENT_VERSION: u32 = 1;

fn current_version() -> u32 {
    DOCUMENT_VERSION
}

fn yes() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RigDocument {
    #[serde(default = "current_version")]
    pub version: u32,

    #[serde(default)]
    pub sensors: Vec<SensorRecord>,
}

/// One sensor as stored on disk. `name`, `type` and `pose` are required. The kind specific
/// scan fields sit next to them in the same object and fall back to their defaults when
/// missing (a LIDAR without `channels` gets 16).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorRecord {
    pub name: String,
    pub pose: SensorPose,

    #[serde(default = "yes")]
    pub enabled: bool,

    #[serde(default = "yes")]
    pub show_volume: bool,

    #[serde(default = "yes")]
    pub show_point_cloud: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<[u8; 3]>,

    #[serde(default)]
    pub color_mode: ColorMode,

    #[serde(flatten)]
    pub kind: SensorKind,
}

impl Default for RigDocument {
    fn default() -> Self {
        Self {
            version: DOCUMENT_VERSION,
            sensors: Vec::new(),
        }
    }
}

impl RigDocument {
    /// Parse and validate a document
    pub fn from_json(text: &str) -> Result<Self, ImportError> {
        let document: RigDocument = serde_json::from_str(text)?;
        document.validate()?;
        Ok(document)
    }

    pub fn to_json(&self) -> Result<String, ImportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load(path: &Path) -> Result<Self, ImportError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn save(&self, path: &Path) -> Result<(), ImportError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ImportError> {
        if self.version != DOCUMENT_VERSION {
            return Err(ImportError::UnsupportedVersion {
                found: self.version,
                supported: DOCUMENT_VERSION,
            });
        }

        if let Some(index) = self.sensors.iter().position(|s| s.name.trim().is_empty()) {
            return Err(ImportError::EmptyName { index });
        }

        Ok(())
    }
}

impl From<SensorRecord> for SensorSpec {
    fn from(record: SensorRecord) -> Self {
        Self {
            name: record.name,
            pose: record.pose,
            kind: record.kind,
            enabled: record.enabled,
            show_volume: record.show_volume,
            show_point_cloud: record.show_point_cloud,
            color: record.color,
            color_mode: record.color_mode,
        }
    }
}

impl From<SensorSpec> for SensorRecord {
    fn from(spec: SensorSpec) -> Self {
        Self {
            name: spec.name,
            pose: spec.pose,
            enabled: spec.enabled,
            show_volume: spec.show_volume,
            show_point_cloud: spec.show_point_cloud,
            color: spec.color,
            color_mode: spec.color_mode,
            kind: spec.kind,
        }
    }
}
