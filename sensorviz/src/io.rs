//! Reading and writing the files the engine deals with: rig documents, engine settings and
//! exported point clouds.

pub mod document;
pub mod point_cloud;
pub mod settings;

pub use document::{RigDocument, SensorRecord};
pub use point_cloud::{load_bxyz, read_bxyz, write_bxyz, write_bxyz_to};
pub use settings::{EngineSettings, load_settings};
