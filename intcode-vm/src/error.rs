//! Intcode VM error types
//!
//! Re-exports intcode-error and provides VM-specific conveniences.

pub use intcode_error::{Error, ErrorKind, ErrorStatus, Result};

// =============================================================================
// Loader errors
// =============================================================================

/// Create a ParseFailed error for a token that is not an i64
pub fn invalid_token(token: &str, index: usize) -> Error {
    Error::parse_failed(format!("token {} is not a signed 64-bit integer: '{}'", index, token))
        .with_operation("loader::parse")
        .with_context("index", index.to_string())
        .with_context("token", token)
}

// =============================================================================
// Decode / execution errors
// =============================================================================

/// Create an InvalidOpcode error
pub fn invalid_opcode(word: i64) -> Error {
    Error::new(ErrorKind::InvalidOpcode, format!("unknown opcode in word {}", word))
        .with_context("word", word.to_string())
}

/// Create an InvalidMode error
pub fn invalid_mode(word: i64, parameter: usize, mode: i64) -> Error {
    Error::new(
        ErrorKind::InvalidMode,
        format!("invalid mode {} for parameter {} in word {}", mode, parameter + 1, word),
    )
    .with_context("word", word.to_string())
    .with_context("parameter", (parameter + 1).to_string())
    .with_context("mode", mode.to_string())
}

/// Create an InvalidAddress error
pub fn invalid_address(address: i64) -> Error {
    Error::new(ErrorKind::InvalidAddress, format!("negative address {}", address))
        .with_context("address", address.to_string())
}

/// Create an InvalidWrite error
pub fn invalid_write(word: i64) -> Error {
    Error::new(ErrorKind::InvalidWrite, "write destination in immediate mode")
        .with_context("word", word.to_string())
}

// =============================================================================
// Scheduling errors
// =============================================================================

/// Create an InputExhausted error
pub fn input_exhausted(pc: i64) -> Error {
    Error::new(ErrorKind::InputExhausted, format!("waiting for input at pc {}", pc))
        .with_context("pc", pc.to_string())
}

/// Create a PipelineStalled error
pub fn pipeline_stalled(waiting: &[usize]) -> Error {
    let list = waiting
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(",");
    Error::new(
        ErrorKind::PipelineStalled,
        format!("no machine made progress, waiting: [{}]", list),
    )
    .with_context("waiting", list)
}

/// Create an InvalidArgument error
pub fn invalid_argument(message: impl Into<String>) -> Error {
    Error::invalid_argument(message)
}

/// Create a ConfigInvalid error
pub fn config_invalid(message: impl Into<String>) -> Error {
    Error::config_invalid(message)
}
