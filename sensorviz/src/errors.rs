use thiserror::Error;

/// Errors raised while constructing geometry from user or file supplied data.
#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("face {face} references vertex {index} but the mesh only has {count} vertices")]
    FaceIndexOutOfBounds {
        face: usize,
        index: u32,
        count: usize,
    },

    #[error("mesh contains non-finite vertex coordinates at index {0}")]
    NonFiniteVertex(usize),

    #[error("failed to build triangle mesh: {0}")]
    TriMesh(String),

    #[error("{what} must have the same length as points ({expected}), got {actual}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// Errors raised while importing a rig document. Imports are all-or-nothing, so any of these
/// leaves the existing sensor state untouched.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("rig document is not valid JSON or is missing a required field: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("unsupported rig document version {found}, expected at most {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("sensor entry {index} has an empty name")]
    EmptyName { index: usize },

    #[error("failed to read rig document: {0}")]
    Io(#[from] std::io::Error),
}
