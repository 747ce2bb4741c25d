//! # intcode-error
//!
//! Unified error handling for the Intcode workspace.
//!
//! ## Design Philosophy
//!
//! - **ErrorKind**: Know what went wrong (e.g. InvalidOpcode, ParseFailed)
//! - **ErrorStatus**: Decide how to handle it (Permanent, Temporary), derived from the kind
//! - **Error Context**: Locate the cause (operation trail, program counter, offending word)
//! - **Error Source**: Wrap underlying errors without leaking raw types
//!
//! ## Usage
//!
//! ```rust
//! use intcode_error::{Error, ErrorKind};
//!
//! fn example() -> Result<(), Error> {
//!     Err(Error::new(ErrorKind::InvalidOpcode, "unknown opcode 42")
//!         .with_operation("machine::execute")
//!         .with_context("pc", "17")
//!         .with_context("word", "42"))
//! }
//! ```
//!
//! ## Principles
//!
//! - All fallible functions return `Result<T, intcode_error::Error>`
//! - External errors are wrapped with `set_source(err)`
//! - Same error handled once, callers further up only append context
//! - Suspension for input is control flow, never an `Error`

mod error;
mod kind;
mod status;

pub use error::Error;
pub use kind::ErrorKind;
pub use status::ErrorStatus;

/// Result type alias using the Intcode Error
pub type Result<T> = std::result::Result<T, Error>;
