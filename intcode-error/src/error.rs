//! The main Error type for the Intcode workspace

use crate::{ErrorKind, ErrorStatus};
use std::fmt;

/// Error returned by every fallible Intcode operation.
///
/// Carries the [`ErrorKind`], a message, the chain of operations it passed
/// through (innermost first) and key/value context such as the program
/// counter or the offending word. The [`ErrorStatus`] follows from the kind.
///
/// ```rust
/// use intcode_error::{Error, ErrorKind, ErrorStatus};
///
/// let err = Error::new(ErrorKind::InputExhausted, "machine is waiting for input")
///     .with_operation("machine::run_program")
///     .with_context("pc", "4");
///
/// assert_eq!(err.kind(), ErrorKind::InputExhausted);
/// assert_eq!(err.status(), ErrorStatus::Temporary);
/// assert_eq!(err.context_value("pc"), Some("4"));
/// ```
pub struct Error {
    kind: ErrorKind,
    message: String,
    trail: Vec<&'static str>,
    context: Vec<(&'static str, String)>,
    source: Option<anyhow::Error>,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            trail: Vec::new(),
            context: Vec::new(),
            source: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Retry classification derived from the kind
    pub fn status(&self) -> ErrorStatus {
        ErrorStatus::from(self.kind)
    }

    /// Check if resuming after more input may succeed
    pub fn is_retryable(&self) -> bool {
        self.status().is_retryable()
    }

    /// Outermost operation the error passed through, or `""` if none
    pub fn operation(&self) -> &'static str {
        self.trail.last().copied().unwrap_or("")
    }

    /// Every operation the error passed through, innermost first
    pub fn trail(&self) -> &[&'static str] {
        &self.trail
    }

    pub fn context(&self) -> &[(&'static str, String)] {
        &self.context
    }

    /// First context value recorded under `key`
    pub fn context_value(&self, key: &str) -> Option<&str> {
        self.context
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn source_ref(&self) -> Option<&anyhow::Error> {
        self.source.as_ref()
    }

    /// Record that the error passed through `operation`
    pub fn with_operation(mut self, operation: &'static str) -> Self {
        self.trail.push(operation);
        self
    }

    pub fn with_context(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.context.push((key, value.into()));
        self
    }

    /// Attach the underlying error. Only one source may be set.
    pub fn set_source(mut self, source: impl Into<anyhow::Error>) -> Self {
        debug_assert!(self.source.is_none(), "source error already set");
        self.source = Some(source.into());
        self
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, message)
    }

    pub fn config_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConfigInvalid, message)
    }

    pub fn parse_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ParseFailed, message)
    }
}

/// Single line: `op: Kind: message [k=v ...] (status)`
impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.trail.is_empty() {
            write!(f, "{}: ", self.operation())?;
        }
        write!(f, "{}", self.kind)?;
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if !self.context.is_empty() {
            let pairs = self
                .context
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>();
            write!(f, " [{}]", pairs.join(" "))?;
        }
        write!(f, " ({})", self.status())
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Error");
        s.field("kind", &self.kind)
            .field("status", &self.status())
            .field("message", &self.message)
            .field("trail", &self.trail)
            .field("context", &self.context);
        if let Some(source) = &self.source {
            s.field("source", source);
        }
        s.finish()
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| &**e as &(dyn std::error::Error + 'static))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        let kind = match err.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::FileNotFound,
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
            _ => ErrorKind::IoFailed,
        };
        Error::new(kind, err.to_string())
            .with_operation("io")
            .set_source(err)
    }
}
