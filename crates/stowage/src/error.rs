//! Error types for the resource cache.
//!
//! Per-instance load failures are kept as plain strings on the instance
//! (see [`crate::Loadable::error`]); `LoadError` is what the consumer-facing
//! API returns.

use std::fmt;
use std::path::PathBuf;

/// Errors returned by cache operations.
#[derive(Debug)]
pub enum LoadError {
    /// The key does not resolve to a known resource. No instance was created.
    NotFound {
        /// The path or URL that failed to resolve.
        key: String,
    },

    /// Failed to read bytes from local storage.
    Io {
        /// The path that failed to read.
        path: PathBuf,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// A synchronous load reached `FailedToLoad`.
    Failed {
        /// The cache key of the failed instance.
        key: String,
        /// The error recorded on the instance.
        message: String,
    },

    /// A decoder rejected the fetched bytes.
    Decode {
        /// The key being decoded.
        key: String,
        /// Description of the error.
        message: String,
    },

    /// No decoder is registered for this payload type and extension.
    NoDecoder {
        /// The requested payload type.
        type_name: &'static str,
        /// The extension of the key, if any.
        extension: Option<String>,
    },

    /// The key is cached with a different payload type.
    TypeMismatch {
        /// The cache key.
        key: String,
        /// The payload type that was requested.
        expected: &'static str,
    },

    /// The instance's strategy cannot be forced to complete synchronously.
    Unsupported {
        /// The cache key.
        key: String,
        /// Name of the strategy that refused.
        strategy: &'static str,
    },

    /// The handle no longer refers to a live instance.
    InvalidHandle,
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::NotFound { key } => write!(f, "Resource not found: {}", key),
            LoadError::Io { path, source } => {
                write!(f, "IO error reading '{}': {}", path.display(), source)
            }
            LoadError::Failed { key, message } => {
                write!(f, "Failed to load '{}': {}", key, message)
            }
            LoadError::Decode { key, message } => {
                write!(f, "Failed to decode '{}': {}", key, message)
            }
            LoadError::NoDecoder {
                type_name,
                extension,
            } => match extension {
                Some(ext) => write!(f, "No decoder for {} from .{}", type_name, ext),
                None => write!(f, "No decoder for {} (key has no extension)", type_name),
            },
            LoadError::TypeMismatch { key, expected } => {
                write!(f, "'{}' is cached with a payload other than {}", key, expected)
            }
            LoadError::Unsupported { key, strategy } => write!(
                f,
                "'{}' uses {} which cannot complete synchronously",
                key, strategy
            ),
            LoadError::InvalidHandle => write!(f, "Handle refers to an unloaded resource"),
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoadError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Result type alias for cache operations.
pub type LoadResult<T> = Result<T, LoadError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_key() {
        let err = LoadError::NotFound {
            key: "ui/missing.png".to_string(),
        };
        assert_eq!(err.to_string(), "Resource not found: ui/missing.png");
    }

    #[test]
    fn test_io_error_exposes_source() {
        use std::error::Error;

        let err = LoadError::Io {
            path: PathBuf::from("a.bin"),
            source: std::io::Error::other("disk gone"),
        };
        assert!(err.source().is_some());
        assert!(err.to_string().contains("disk gone"));
    }
}
