//! Error types for the review engine.

use thiserror::Error;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// All error kinds the engine can surface.
///
/// `kind()` returns the stable wire name used in `{ok:false, errorKind, message}`
/// responses (§7); `Display` carries the human-readable message.
#[derive(Error, Debug)]
pub enum Error {
    #[error("spec not found: {0}")]
    SpecNotFound(String),

    #[error("spec parse error: {0}")]
    SpecParseError(String),

    #[error("spec extends cycle: {0}")]
    SpecCycle(String),

    #[error("invalid check severity: {0}")]
    SpecInvalidSeverity(String),

    #[error("navigation error: {0}")]
    NavigationError(String),

    #[error("navigation timed out after {0:?}")]
    NavigationTimeout(std::time::Duration),

    #[error("reference image not found: {0}")]
    ReferenceNotFound(String),

    #[error("reference image unreadable: {0}")]
    ReferenceUnreadable(String),

    #[error("annotation failed: {0}")]
    AnnotationError(String),

    #[error("evaluator {check_id} failed: {message}")]
    EvaluatorError { check_id: String, message: String },

    #[error("failed to write session artifacts: {0}")]
    ArtifactWriteError(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_norway::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Stable machine-readable kind name, as used in `errorKind` (§7).
    pub fn kind(&self) -> &'static str {
        match self {
            Error::SpecNotFound(_) => "SpecNotFound",
            Error::SpecParseError(_) => "SpecParseError",
            Error::SpecCycle(_) => "SpecCycle",
            Error::SpecInvalidSeverity(_) => "SpecInvalidSeverity",
            Error::NavigationError(_) => "NavigationError",
            Error::NavigationTimeout(_) => "NavigationTimeout",
            Error::ReferenceNotFound(_) => "ReferenceNotFound",
            Error::ReferenceUnreadable(_) => "ReferenceUnreadable",
            Error::AnnotationError(_) => "AnnotationError",
            Error::EvaluatorError { .. } => "EvaluatorError",
            Error::ArtifactWriteError(_) => "ArtifactWriteError",
            Error::Io(_) => "IoError",
            Error::Yaml(_) => "SpecParseError",
            Error::Json(_) => "JsonError",
            Error::Other(_) => "Other",
        }
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Other(s.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_variant() {
        let e = Error::SpecNotFound("foo".into());
        assert_eq!(e.kind(), "SpecNotFound");
    }
}
