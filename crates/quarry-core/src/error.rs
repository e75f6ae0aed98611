//! Error type shared by every hydration path.
//!
//! All failures surface as a single [`HydrationError`] carrying a
//! human-readable message, an optional remediation hint and an optional
//! wrapped cause. The [`ErrorKind`] discriminates the failure for callers
//! that need to branch on it (tests, the CLI exit code).

use std::fmt;

/// Boxed cause attached to a [`HydrationError`].
pub type BoxedCause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias used across the engine.
pub type HydrationResult<T> = Result<T, HydrationError>;

/// What went wrong, coarsely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Transport-level failure talking to a remote service.
    Network,
    /// Remote service answered with a non-success status.
    HttpStatus,
    /// Something the caller asked for does not exist.
    NotFound,
    /// A document could not be decoded.
    Parse,
    /// A requested version or tag is not published.
    VersionNotFound,
    /// An external process could not be spawned or exited non-zero.
    Process,
    /// An install reported success but produced nothing usable.
    Verification,
    /// Local filesystem failure.
    Io,
    /// A destructive operation targeted a protected path.
    UnsafePath,
    /// A resource descriptor or inline reference is malformed.
    InvalidDescriptor,
    /// Engine configuration is invalid.
    Config,
    /// The owning request was cancelled.
    Cancelled,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Network => "network",
            Self::HttpStatus => "http-status",
            Self::NotFound => "not-found",
            Self::Parse => "parse",
            Self::VersionNotFound => "version-not-found",
            Self::Process => "process",
            Self::Verification => "verification",
            Self::Io => "io",
            Self::UnsafePath => "unsafe-path",
            Self::InvalidDescriptor => "invalid-descriptor",
            Self::Config => "config",
            Self::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}

/// The single error kind produced by the engine.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct HydrationError {
    kind: ErrorKind,
    message: String,
    hint: Option<String>,
    #[source]
    source: Option<BoxedCause>,
}

impl HydrationError {
    /// Create an error of the given kind.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            hint: None,
            source: None,
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, message)
    }

    pub fn http_status(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::HttpStatus, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Parse, message)
    }

    pub fn version_not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::VersionNotFound, message)
    }

    pub fn process(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Process, message)
    }

    pub fn verification(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Verification, message)
    }

    pub fn unsafe_path(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnsafePath, message)
    }

    pub fn invalid_descriptor(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidDescriptor, message)
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, message)
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Cancelled, message)
    }

    /// Wrap an I/O failure, naming what was being attempted.
    pub fn io(message: impl Into<String>, err: std::io::Error) -> Self {
        Self::new(ErrorKind::Io, message).with_source(err)
    }

    /// Attach a remediation hint.
    #[must_use]
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Attach the underlying cause.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<BoxedCause>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }
}

/// Cause attached to errors raised for a non-zero process exit.
///
/// Keeps the combined stdout/stderr so the boundary can show what the
/// external tool actually said.
#[derive(Debug, Clone, thiserror::Error)]
#[error("`{command}` exited with code {exit_code}:\n{output}")]
pub struct ProcessFailure {
    /// Rendered command line.
    pub command: String,
    /// Exit code, or -1 when the process was terminated by a signal.
    pub exit_code: i32,
    /// Combined stdout and stderr.
    pub output: String,
}
