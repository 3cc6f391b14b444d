use thiserror::Error;

/// Result type for driver operations
pub type BlobFsResult<T> = Result<T, BlobFsError>;

/// Errors that can occur during driver operations
#[derive(Error, Debug)]
pub enum BlobFsError {
    #[error("No object or directory at path: {path}")]
    NotFound { path: String },

    #[error("Access denied: {path}")]
    AccessDenied { path: String },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Operation not supported: {message}")]
    Unsupported { message: String },

    #[error("Storage backend error: {code}: {message}")]
    Backend { code: String, message: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Batch delete failed for {} object(s)", .failed.len())]
    PartialBatch { failed: Vec<BatchFailure> },

    #[error("Invalid writer state: {message}")]
    InvalidState { message: String },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

/// One object that a batched delete could not remove
#[derive(Debug, Clone)]
pub struct BatchFailure {
    pub key: String,
    pub code: String,
    pub message: String,
}

impl BlobFsError {
    /// Create a not found error
    pub fn not_found<S: Into<String>>(path: S) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Create an access denied error
    pub fn access_denied<S: Into<String>>(path: S) -> Self {
        Self::AccessDenied { path: path.into() }
    }

    /// Create an invalid configuration error
    pub fn invalid_config<S: Into<String>>(message: S) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create an unsupported operation error
    pub fn unsupported<S: Into<String>>(message: S) -> Self {
        Self::Unsupported {
            message: message.into(),
        }
    }

    /// Create a backend error preserving the original code and message
    pub fn backend<C: Into<String>, M: Into<String>>(code: C, message: M) -> Self {
        Self::Backend {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Create an invalid writer state error
    pub fn invalid_state<S: Into<String>>(message: S) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Map a backend error code onto the portable taxonomy.
    ///
    /// Unrecognized codes are wrapped as [`BlobFsError::Backend`] with the
    /// original code and message preserved, never discarded.
    pub fn from_backend_code(code: &str, message: &str, key: &str) -> Self {
        match code {
            "NoSuchKey" | "NotFound" => Self::not_found(key),
            "AccessDenied" | "Forbidden" => Self::access_denied(key),
            "RequestCancelled" | "OperationAborted" => Self::Cancelled,
            _ => Self::backend(code, message),
        }
    }

    /// Rewrite the path carried by path-addressed variants.
    ///
    /// Backend clients report errors against object keys; the driver uses
    /// this to surface the caller's virtual path instead.
    pub fn with_path<S: Into<String>>(self, path: S) -> Self {
        match self {
            Self::NotFound { .. } => Self::NotFound { path: path.into() },
            Self::AccessDenied { .. } => Self::AccessDenied { path: path.into() },
            other => other,
        }
    }

    /// True for errors that mean "nothing lives at this key"
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognized_codes_translate() {
        assert!(matches!(
            BlobFsError::from_backend_code("NoSuchKey", "gone", "a/b"),
            BlobFsError::NotFound { .. }
        ));
        assert!(matches!(
            BlobFsError::from_backend_code("AccessDenied", "nope", "a/b"),
            BlobFsError::AccessDenied { .. }
        ));
        assert!(matches!(
            BlobFsError::from_backend_code("RequestCancelled", "", "a/b"),
            BlobFsError::Cancelled
        ));
    }

    #[test]
    fn unknown_codes_keep_diagnostics() {
        let err = BlobFsError::from_backend_code("SlowDown", "throttled", "a/b");
        match err {
            BlobFsError::Backend { code, message } => {
                assert_eq!(code, "SlowDown");
                assert_eq!(message, "throttled");
            }
            other => panic!("expected Backend, got {other:?}"),
        }
    }

    #[test]
    fn with_path_rewrites_addressed_variants() {
        let err = BlobFsError::not_found("root/a/b").with_path("/a/b");
        assert_eq!(err.to_string(), "No object or directory at path: /a/b");

        let err = BlobFsError::backend("SlowDown", "throttled").with_path("/a/b");
        assert!(matches!(err, BlobFsError::Backend { .. }));
    }
}
