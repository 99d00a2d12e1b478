//! Centralized error types for emlshell.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the emlshell library.
///
/// Only the structural variants abort parsing. Decoding problems never
/// surface here; they degrade to a fallback and are logged instead.
#[derive(Error, Debug)]
pub enum EmlError {
    /// I/O error with the associated file path.
    #[error("I/O error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The specified file does not exist.
    #[error("EML file not found: {0}")]
    FileNotFound(PathBuf),

    /// A `multipart/*` content type without a `boundary` parameter.
    #[error("Multipart content type has no boundary parameter")]
    MissingBoundary,

    /// A multipart body that never reaches its closing `--boundary--` marker.
    #[error("Multipart body is missing its final boundary '--{boundary}--'")]
    UnterminatedMultipart { boundary: String },

    /// Nested parts deeper than the configured limit.
    #[error("MIME nesting exceeds the maximum depth of {depth}")]
    NestingTooDeep { depth: usize },

    /// An RFC 2047 encoded word with an encoding other than `B` or `Q`.
    #[error("Unknown encoded-word encoding '{0}'")]
    UnknownWordEncoding(String),

    /// An export operation failed.
    #[error("Export error: {0}")]
    Export(String),
}

/// Convenience alias for `Result<T, EmlError>`.
pub type Result<T> = std::result::Result<T, EmlError>;

impl EmlError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// `true` for errors that describe the shape of the MIME tree rather
    /// than the environment (files, exports).
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::MissingBoundary | Self::UnterminatedMultipart { .. } | Self::NestingTooDeep { .. }
        )
    }
}

/// Allow `?` on `std::io::Error` when no path context is available.
impl From<std::io::Error> for EmlError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<unknown>"),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_classification() {
        assert!(EmlError::MissingBoundary.is_structural());
        assert!(EmlError::UnterminatedMultipart {
            boundary: "b".into()
        }
        .is_structural());
        assert!(!EmlError::FileNotFound(PathBuf::from("x.eml")).is_structural());
    }

    #[test]
    fn test_unterminated_message_names_marker() {
        let err = EmlError::UnterminatedMultipart {
            boundary: "abc".into(),
        };
        assert!(err.to_string().contains("--abc--"));
    }
}
