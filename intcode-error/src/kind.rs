//! Error kinds for Intcode operations

use std::fmt;

/// The kind of error that occurred.
///
/// Callers match on `ErrorKind` to tell a malformed program apart from a
/// machine that simply ran out of input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // =========================================================================
    // General errors
    // =========================================================================
    /// Invalid configuration or parameters
    ConfigInvalid,

    /// Invalid argument passed to function
    InvalidArgument,

    // =========================================================================
    // Loader errors
    // =========================================================================
    /// Program text contained a token that is not a signed 64-bit integer
    ParseFailed,

    // =========================================================================
    // Decode / execution errors (malformed program)
    // =========================================================================
    /// Instruction word has an unknown opcode
    InvalidOpcode,

    /// Parameter mode digit outside Position/Immediate/Relative
    InvalidMode,

    /// Resolved address is negative
    InvalidAddress,

    /// Write destination given in immediate mode
    InvalidWrite,

    // =========================================================================
    // Scheduling errors
    // =========================================================================
    /// A machine asked for input that never arrived
    InputExhausted,

    /// A pipeline pass made no progress while machines were still waiting
    PipelineStalled,

    // =========================================================================
    // IO errors
    // =========================================================================
    /// File not found
    FileNotFound,

    /// Permission denied
    PermissionDenied,

    /// IO operation failed
    IoFailed,

    /// Serialization of a report failed
    SerializationFailed,
}

impl ErrorKind {
    /// Returns the error kind as a static string
    pub fn as_str(&self) -> &'static str {
        match self {
            // General
            ErrorKind::ConfigInvalid => "ConfigInvalid",
            ErrorKind::InvalidArgument => "InvalidArgument",

            // Loader
            ErrorKind::ParseFailed => "ParseFailed",

            // Decode / execution
            ErrorKind::InvalidOpcode => "InvalidOpcode",
            ErrorKind::InvalidMode => "InvalidMode",
            ErrorKind::InvalidAddress => "InvalidAddress",
            ErrorKind::InvalidWrite => "InvalidWrite",

            // Scheduling
            ErrorKind::InputExhausted => "InputExhausted",
            ErrorKind::PipelineStalled => "PipelineStalled",

            // IO
            ErrorKind::FileNotFound => "FileNotFound",
            ErrorKind::PermissionDenied => "PermissionDenied",
            ErrorKind::IoFailed => "IoFailed",
            ErrorKind::SerializationFailed => "SerializationFailed",
        }
    }

    /// Check if this error kind is retryable by default.
    ///
    /// Only starvation is retryable: feeding more input and resuming can
    /// succeed. A malformed program fails the same way every time.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::InputExhausted | ErrorKind::PipelineStalled)
    }

    /// Check if this error means the program itself is malformed
    pub fn is_malformed_program(&self) -> bool {
        matches!(
            self,
            ErrorKind::InvalidOpcode
                | ErrorKind::InvalidMode
                | ErrorKind::InvalidAddress
                | ErrorKind::InvalidWrite
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
