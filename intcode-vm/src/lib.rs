//! # Intcode VM
//!
//! A small resumable virtual machine for Intcode programs.
//!
//! ## Core Concepts
//! - **Memory**: unbounded, zero-initialised address space (dense prefix, sparse tail)
//! - **Opcodes**: variable-width instructions with Position/Immediate/Relative modes
//! - **Machine**: fetch-decode-execute loop that suspends when input runs out
//! - **Tapes**: append-only shared sequences linking one machine's output to another's input
//! - **Pipeline**: round-robin driver for chains and feedback rings of machines

pub mod error;
pub mod loader;
pub mod machine;
pub mod memory;
pub mod opcode;
pub mod pipeline;
pub mod tape;

pub use error::{Error, ErrorKind, ErrorStatus, Result};
pub use machine::{run_program, HaltReason, Machine, MachineState};
pub use memory::{Memory, MemoryConfig};
pub use opcode::{disassemble, DisasmLine, Instruction, Opcode, ParameterMode};
pub use pipeline::{Pipeline, PipelineOutcome, PipelineReport, Topology};
pub use tape::{InputSource, Tape};
