//! Engine error types.

use std::fmt;
use std::path::PathBuf;

/// Lifecycle-level engine error.
///
/// Per-request and per-connection failures are absorbed locally and only
/// logged; these variants are the failures surfaced to the caller.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The serving root does not exist or is not a directory.
    #[error("serving root is not a readable directory: {}", .0.display())]
    RootNotFound(PathBuf),

    /// Binding the HTTP listener failed (port in use, permission denied).
    #[error("failed to bind {host}:{port}: {source}")]
    Bind {
        /// Host the bind was attempted on.
        host: String,
        /// Port the bind was attempted on.
        port: u16,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The listener or push channel failed to close cleanly. The engine
    /// still transitions to idle when this is returned.
    #[error("server did not shut down cleanly: {0}")]
    Shutdown(String),
}

/// Classifiable code carried by [`crate::ServerErrorEvent`].
///
/// These are recoverable, expected conditions that registered services may
/// react to, as opposed to [`EngineError`] failures returned to the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCode {
    /// `start()` was called while the engine was already running.
    ServerIsAlreadyRunning,
    /// The HTTP listener could not be bound.
    BindFailed,
}

impl ErrorCode {
    /// Stable string form of the code.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ServerIsAlreadyRunning => "serverIsAlreadyRunning",
            Self::BindFailed => "bindFailed",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_strings() {
        assert_eq!(
            ErrorCode::ServerIsAlreadyRunning.as_str(),
            "serverIsAlreadyRunning"
        );
        assert_eq!(ErrorCode::BindFailed.as_str(), "bindFailed");
    }

    #[test]
    fn test_bind_error_message() {
        let err = EngineError::Bind {
            host: "127.0.0.1".to_owned(),
            port: 9000,
            source: std::io::Error::from(std::io::ErrorKind::AddrInUse),
        };
        assert!(err.to_string().contains("127.0.0.1:9000"));
    }
}
