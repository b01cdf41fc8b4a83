//! Error types for tileset traversal

/// Result type for 3D Tiles operations
pub type Tiles3dResult<T> = Result<T, Tiles3dError>;

/// Errors that can occur while loading or traversing a tileset
#[derive(Debug, thiserror::Error)]
pub enum Tiles3dError {
    /// IO error reading tileset or subtree files
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed input that prevents the branch at `path` from being traversed
    #[error("Structural error at {path}: {message}")]
    Structural { path: String, message: String },

    /// A resource required at `path` could not be resolved
    #[error("Resource unavailable at {path}: {uri}")]
    ResourceUnavailable { path: String, uri: String },

    /// Invalid argument to a coordinate, curve or cell computation
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Tiles3dError {
    pub fn structural(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Structural {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn unavailable(path: impl Into<String>, uri: impl Into<String>) -> Self {
        Self::ResourceUnavailable {
            path: path.into(),
            uri: uri.into(),
        }
    }

    pub fn invalid_input<T: ToString>(msg: T) -> Self {
        Self::InvalidInput(msg.to_string())
    }

    /// Path of the tile or coordinate the error originated from, if known
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::Structural { path, .. } | Self::ResourceUnavailable { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Attach a path to errors that were raised without one
    pub(crate) fn at(self, path: &str) -> Self {
        match self {
            Self::Io(e) => Self::structural(path, format!("IO error: {}", e)),
            Self::Json(e) => Self::structural(path, format!("JSON error: {}", e)),
            Self::InvalidInput(msg) => Self::structural(path, msg),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_is_carried() {
        let err = Tiles3dError::unavailable("/root/children/0", "a.subtree");
        assert_eq!(err.path(), Some("/root/children/0"));
        assert_eq!(
            err.to_string(),
            "Resource unavailable at /root/children/0: a.subtree"
        );
    }

    #[test]
    fn test_at_attaches_path() {
        let err = Tiles3dError::invalid_input("level 0").at("/root");
        assert_eq!(err.path(), Some("/root"));
        assert!(matches!(err, Tiles3dError::Structural { .. }));
    }
}
