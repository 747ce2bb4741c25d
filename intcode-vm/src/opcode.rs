//! # Intcode Opcodes
//!
//! Instruction decoding for the Intcode machine. An instruction word packs
//! the opcode in its two low decimal digits and one parameter mode per
//! further digit:
//!
//! ```text
//!   1002  ->  opcode 02 (MUL), modes [Position, Immediate, Position]
//!   ^^      modes, read right to left
//!     ^^    opcode
//! ```
//!
//! Instructions are decoded on every fetch and never stored.

use crate::error::{self, Result};
use crate::memory::Memory;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum number of parameters any instruction takes
pub const MAX_PARAMS: usize = 3;

/// Intcode opcode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Opcode {
    /// `p3 = p1 + p2`
    Add,
    /// `p3 = p1 * p2`
    Multiply,
    /// `p1 = next input` (suspends when input is exhausted)
    StoreInput,
    /// append `p1` to output
    Output,
    /// `if p1 != 0 { pc = p2 }`
    JumpIfTrue,
    /// `if p1 == 0 { pc = p2 }`
    JumpIfFalse,
    /// `p3 = (p1 < p2) as i64`
    LessThan,
    /// `p3 = (p1 == p2) as i64`
    Equals,
    /// `relative_base += p1`
    AdjustRelativeBase,
    /// stop the machine
    Halt,
}

impl Opcode {
    /// Map the low two digits of an instruction word to an opcode
    pub fn from_code(code: i64) -> Option<Self> {
        let op = match code {
            1 => Opcode::Add,
            2 => Opcode::Multiply,
            3 => Opcode::StoreInput,
            4 => Opcode::Output,
            5 => Opcode::JumpIfTrue,
            6 => Opcode::JumpIfFalse,
            7 => Opcode::LessThan,
            8 => Opcode::Equals,
            9 => Opcode::AdjustRelativeBase,
            99 => Opcode::Halt,
            _ => return None,
        };
        Some(op)
    }

    /// Numeric opcode as it appears in an instruction word
    pub fn code(&self) -> i64 {
        match self {
            Opcode::Add => 1,
            Opcode::Multiply => 2,
            Opcode::StoreInput => 3,
            Opcode::Output => 4,
            Opcode::JumpIfTrue => 5,
            Opcode::JumpIfFalse => 6,
            Opcode::LessThan => 7,
            Opcode::Equals => 8,
            Opcode::AdjustRelativeBase => 9,
            Opcode::Halt => 99,
        }
    }

    /// Mnemonic used in traces and disassembly
    pub fn name(&self) -> &'static str {
        match self {
            Opcode::Add => "ADD",
            Opcode::Multiply => "MUL",
            Opcode::StoreInput => "IN",
            Opcode::Output => "OUT",
            Opcode::JumpIfTrue => "JNZ",
            Opcode::JumpIfFalse => "JZ",
            Opcode::LessThan => "LT",
            Opcode::Equals => "EQ",
            Opcode::AdjustRelativeBase => "ARB",
            Opcode::Halt => "HALT",
        }
    }

    /// Number of parameter cells following the opcode
    pub fn arity(&self) -> usize {
        match self {
            Opcode::Add | Opcode::Multiply | Opcode::LessThan | Opcode::Equals => 3,
            Opcode::JumpIfTrue | Opcode::JumpIfFalse => 2,
            Opcode::StoreInput | Opcode::Output | Opcode::AdjustRelativeBase => 1,
            Opcode::Halt => 0,
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// How an instruction parameter is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterMode {
    /// The parameter is an address in memory
    #[default]
    Position,
    /// The parameter is the value itself
    Immediate,
    /// The parameter is an address offset by the relative base
    Relative,
}

impl ParameterMode {
    /// Map a single mode digit to a mode
    pub fn from_digit(digit: i64) -> Option<Self> {
        match digit {
            0 => Some(ParameterMode::Position),
            1 => Some(ParameterMode::Immediate),
            2 => Some(ParameterMode::Relative),
            _ => None,
        }
    }
}

/// A decoded instruction word
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub opcode: Opcode,
    pub modes: [ParameterMode; MAX_PARAMS],
}

impl Instruction {
    /// Decode an instruction word.
    ///
    /// Fails on a non-positive word, an unknown opcode, a mode digit other
    /// than 0/1/2, or more mode digits than any instruction has parameters.
    pub fn decode(word: i64) -> Result<Self> {
        if word <= 0 {
            return Err(error::invalid_opcode(word));
        }

        let opcode = Opcode::from_code(word % 100).ok_or_else(|| error::invalid_opcode(word))?;

        let mut modes = [ParameterMode::Position; MAX_PARAMS];
        let mut rest = word / 100;
        let mut index = 0;
        while rest > 0 {
            let digit = rest % 10;
            if index >= MAX_PARAMS {
                return Err(error::invalid_mode(word, index, digit));
            }
            modes[index] =
                ParameterMode::from_digit(digit).ok_or_else(|| error::invalid_mode(word, index, digit))?;
            rest /= 10;
            index += 1;
        }

        Ok(Self { opcode, modes })
    }

    /// Mode of parameter `index` (0-based)
    pub fn mode(&self, index: usize) -> ParameterMode {
        self.modes[index]
    }

    /// Total cells occupied, opcode included
    pub fn width(&self) -> usize {
        1 + self.opcode.arity()
    }
}

// =============================================================================
// Disassembly
// =============================================================================

/// One line of a disassembly listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisasmLine {
    /// Address of the first cell
    pub address: u64,
    /// Raw cells covered by this line
    pub words: Vec<i64>,
    /// Decoded instruction, `None` when the cell is not a valid instruction
    pub instruction: Option<Instruction>,
}

impl fmt::Display for DisasmLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.instruction {
            Some(inst) => {
                write!(f, "{:5} | {:<5}", self.address, inst.opcode.name())?;
                let params = self.words[1..]
                    .iter()
                    .enumerate()
                    .map(|(i, value)| format_param(inst.mode(i), *value))
                    .collect::<Vec<_>>();
                if !params.is_empty() {
                    write!(f, " {}", params.join(", "))?;
                }
                Ok(())
            }
            None => write!(f, "{:5} | DATA  {}", self.address, self.words[0]),
        }
    }
}

fn format_param(mode: ParameterMode, value: i64) -> String {
    match mode {
        ParameterMode::Position => format!("[{}]", value),
        ParameterMode::Immediate => format!("{}", value),
        ParameterMode::Relative if value < 0 => format!("[rb{}]", value),
        ParameterMode::Relative => format!("[rb+{}]", value),
    }
}

/// Linear sweep disassembly of `memory` from `start` up to its extent.
///
/// Intcode freely mixes code and data, so anything that fails to decode is
/// emitted as a single `DATA` cell and the sweep moves on.
pub fn disassemble(memory: &Memory, start: u64) -> Vec<DisasmLine> {
    let end = memory.extent();
    let mut lines = Vec::new();
    let mut address = start;

    while address < end {
        let word = memory.get(address);
        match Instruction::decode(word) {
            Ok(inst) if address.checked_add(inst.width() as u64).is_some_and(|next| next <= end) => {
                let words = memory.slice(address, inst.width());
                lines.push(DisasmLine {
                    address,
                    words,
                    instruction: Some(inst),
                });
                address += inst.width() as u64;
            }
            _ => {
                lines.push(DisasmLine {
                    address,
                    words: vec![word],
                    instruction: None,
                });
                address += 1;
            }
        }
    }

    lines
}
