//! # Intcode Machine
//!
//! The fetch-decode-execute engine. A machine runs until it halts or until it
//! needs input that isn't there yet; in the second case it hands control back
//! to the caller with the program counter on the blocked `IN` instruction, so
//! the next [`Machine::execute`] call retries it from scratch.
//!
//! ```rust
//! use intcode_vm::{HaltReason, Machine, Memory};
//!
//! let program = Memory::from_words(vec![3, 0, 4, 0, 99]);
//! let mut machine = Machine::new(&program);
//!
//! assert_eq!(machine.execute().unwrap(), HaltReason::WaitingForInput);
//! machine.push_input(7);
//! assert_eq!(machine.execute().unwrap(), HaltReason::HaltInstruction);
//! assert_eq!(machine.output(), vec![7]);
//! ```

use crate::error::{self, Result};
use crate::memory::Memory;
use crate::opcode::{Instruction, Opcode, ParameterMode};
use crate::tape::{InputSource, Tape};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Why a call to [`Machine::execute`] returned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HaltReason {
    /// Input exhausted; add input and call `execute` again
    WaitingForInput,
    /// Executed a Halt instruction; the program is complete
    HaltInstruction,
}

/// Lifecycle state of a machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MachineState {
    /// Can make progress (possibly after more input arrives)
    Running,
    /// Reached Halt; further `execute` calls are no-ops
    Halted,
}

/// Outcome of a single instruction
enum Step {
    Continue,
    Wait,
    Halt,
}

/// A resumable Intcode machine
#[derive(Debug)]
pub struct Machine {
    memory: Memory,
    input: InputSource,
    /// Next unread index into `input`, private to this machine
    input_cursor: usize,
    output: Tape,
    /// Last value this machine wrote; the tape may also hold seeded values
    last_emitted: Option<i64>,
    pc: i64,
    relative_base: i64,
    state: MachineState,
    steps: u64,
}

impl Machine {
    /// Create a machine from a copy of `memory`
    pub fn new(memory: &Memory) -> Self {
        Self::from_memory(memory.clone())
    }

    /// Create a machine that takes ownership of `memory`
    pub fn from_memory(memory: Memory) -> Self {
        Self {
            memory,
            input: InputSource::default(),
            input_cursor: 0,
            output: Tape::new(),
            last_emitted: None,
            pc: 0,
            relative_base: 0,
            state: MachineState::Running,
            steps: 0,
        }
    }

    /// Read input from `tape` instead of the owned input.
    ///
    /// The read cursor is kept as is: after redirecting a machine that has
    /// already consumed N values, the next read is `tape[N]`.
    pub fn set_external_input(&mut self, tape: Tape) {
        if self.input_cursor > 0 {
            debug!(cursor = self.input_cursor, "input redirected mid-run");
        }
        if tape.same_tape(&self.output) {
            debug!("machine reads its own output");
        }
        self.input = InputSource::External(tape);
    }

    /// Run until Halt or until input runs out.
    ///
    /// Returns `Err` on a malformed program (bad opcode, bad mode, negative
    /// address, immediate-mode write). The faulting instruction has no
    /// visible effect and `pc()` points at it.
    pub fn execute(&mut self) -> Result<HaltReason> {
        if self.state == MachineState::Halted {
            debug!(pc = self.pc, "execute called on halted machine");
            return Ok(HaltReason::HaltInstruction);
        }

        loop {
            let start = self.pc;
            match self.step() {
                Ok(Step::Continue) => self.steps += 1,
                Ok(Step::Wait) => {
                    self.pc = start;
                    debug!(pc = start, cursor = self.input_cursor, steps = self.steps, "waiting for input");
                    return Ok(HaltReason::WaitingForInput);
                }
                Ok(Step::Halt) => {
                    self.pc = start;
                    self.state = MachineState::Halted;
                    debug!(pc = start, steps = self.steps, outputs = self.output.len(), "machine halted");
                    return Ok(HaltReason::HaltInstruction);
                }
                Err(err) => {
                    self.pc = start;
                    return Err(err
                        .with_operation("machine::execute")
                        .with_context("pc", start.to_string()));
                }
            }
        }
    }

    fn step(&mut self) -> Result<Step> {
        let word = self.fetch()?;
        let inst = Instruction::decode(word)?;
        trace!(pc = self.pc - 1, op = inst.opcode.name(), word, rb = self.relative_base, "exec");

        match inst.opcode {
            Opcode::Add | Opcode::Multiply | Opcode::LessThan | Opcode::Equals => {
                let a = self.read(inst.mode(0))?;
                let b = self.read(inst.mode(1))?;
                let dst = self.destination(inst.mode(2), word)?;
                let value = match inst.opcode {
                    Opcode::Add => a.wrapping_add(b),
                    Opcode::Multiply => a.wrapping_mul(b),
                    Opcode::LessThan => (a < b) as i64,
                    _ => (a == b) as i64,
                };
                self.memory.set(dst, value);
            }
            Opcode::StoreInput => {
                let Some(value) = self.input.get(self.input_cursor) else {
                    return Ok(Step::Wait);
                };
                let dst = self.destination(inst.mode(0), word)?;
                self.input_cursor += 1;
                trace!(value, "input consumed");
                self.memory.set(dst, value);
            }
            Opcode::Output => {
                let value = self.read(inst.mode(0))?;
                trace!(value, "output");
                self.output.push(value);
                self.last_emitted = Some(value);
            }
            Opcode::JumpIfTrue | Opcode::JumpIfFalse => {
                let test = self.read(inst.mode(0))?;
                let target = self.read(inst.mode(1))?;
                let jump = match inst.opcode {
                    Opcode::JumpIfTrue => test != 0,
                    _ => test == 0,
                };
                if jump {
                    trace!(target, "jump");
                    self.pc = target;
                }
            }
            Opcode::AdjustRelativeBase => {
                let delta = self.read(inst.mode(0))?;
                self.relative_base = self.relative_base.wrapping_add(delta);
            }
            Opcode::Halt => return Ok(Step::Halt),
        }

        Ok(Step::Continue)
    }

    /// Read the cell at pc and advance pc
    fn fetch(&mut self) -> Result<i64> {
        let value = self.memory.get(to_address(self.pc)?);
        self.pc = self.pc.wrapping_add(1);
        Ok(value)
    }

    /// Fetch a parameter and interpret it as an operand
    fn read(&mut self, mode: ParameterMode) -> Result<i64> {
        let param = self.fetch()?;
        match mode {
            ParameterMode::Position => Ok(self.memory.get(to_address(param)?)),
            ParameterMode::Immediate => Ok(param),
            ParameterMode::Relative => Ok(self.memory.get(self.relative_address(param)?)),
        }
    }

    /// Fetch a parameter and resolve it as a write address
    fn destination(&mut self, mode: ParameterMode, word: i64) -> Result<u64> {
        let param = self.fetch()?;
        match mode {
            ParameterMode::Position => to_address(param),
            ParameterMode::Immediate => Err(error::invalid_write(word)),
            ParameterMode::Relative => self.relative_address(param),
        }
    }

    fn relative_address(&self, param: i64) -> Result<u64> {
        let address = param.checked_add(self.relative_base).ok_or_else(|| {
            error::invalid_address(param)
                .with_context("relative_base", self.relative_base.to_string())
        })?;
        to_address(address)
    }

    // =========================================================================
    // Input / output
    // =========================================================================

    /// Append a value to the active input source.
    ///
    /// When the input is external this appends to the shared tape, which is
    /// how a pipeline seeds a wired machine.
    pub fn push_input(&mut self, value: i64) {
        self.input.push(value);
    }

    /// Append several values to the active input source
    pub fn extend_input(&mut self, values: impl IntoIterator<Item = i64>) {
        self.input.extend(values);
    }

    /// Snapshot of the active input source (consumed values included)
    pub fn input(&self) -> Vec<i64> {
        self.input.to_vec()
    }

    /// The active input source
    pub fn input_source(&self) -> &InputSource {
        &self.input
    }

    /// Number of input values consumed so far
    pub fn input_cursor(&self) -> usize {
        self.input_cursor
    }

    /// Number of input values available but not yet consumed
    pub fn pending_input(&self) -> usize {
        self.input.len().saturating_sub(self.input_cursor)
    }

    /// Snapshot of all output produced so far
    pub fn output(&self) -> Vec<i64> {
        self.output.to_vec()
    }

    /// Shared handle to the output tape, for wiring into another machine
    pub fn output_tape(&self) -> Tape {
        self.output.clone()
    }

    /// Most recent value on the output tape.
    ///
    /// When another machine seeds through this tape, that seed counts too;
    /// see [`Machine::last_emitted`].
    pub fn last_output(&self) -> Option<i64> {
        self.output.last()
    }

    /// Most recent value written by this machine's own `OUT` instructions
    pub fn last_emitted(&self) -> Option<i64> {
        self.last_emitted
    }

    // =========================================================================
    // State
    // =========================================================================

    /// Machine memory
    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    /// Mutable memory, for patching a program before running it
    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut self.memory
    }

    /// Program counter
    pub fn pc(&self) -> i64 {
        self.pc
    }

    /// Relative base register
    pub fn relative_base(&self) -> i64 {
        self.relative_base
    }

    /// Lifecycle state
    pub fn state(&self) -> MachineState {
        self.state
    }

    /// Check if the machine executed Halt
    pub fn is_halted(&self) -> bool {
        self.state == MachineState::Halted
    }

    /// Number of instructions completed
    pub fn steps(&self) -> u64 {
        self.steps
    }
}

/// A clone owns a fresh output tape holding a copy of the values written so
/// far. An external input stays attached to the same upstream tape, with the
/// cursor copied.
impl Clone for Machine {
    fn clone(&self) -> Self {
        Self {
            memory: self.memory.clone(),
            input: self.input.clone(),
            input_cursor: self.input_cursor,
            output: Tape::from(self.output.to_vec()),
            last_emitted: self.last_emitted,
            pc: self.pc,
            relative_base: self.relative_base,
            state: self.state,
            steps: self.steps,
        }
    }
}

fn to_address(value: i64) -> Result<u64> {
    u64::try_from(value).map_err(|_| error::invalid_address(value))
}

/// Run a fresh copy of `memory` with fixed `input` and return its output.
///
/// A program that asks for more input than given fails with
/// `InputExhausted`.
pub fn run_program(memory: &Memory, input: &[i64]) -> Result<Vec<i64>> {
    let mut machine = Machine::new(memory);
    machine.extend_input(input.iter().copied());

    match machine.execute()? {
        HaltReason::HaltInstruction => Ok(machine.output()),
        HaltReason::WaitingForInput => Err(error::input_exhausted(machine.pc())
            .with_operation("machine::run_program")
            .with_context("consumed", machine.input_cursor().to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn machine(words: &[i64]) -> Machine {
        Machine::from_memory(Memory::from_words(words.to_vec()))
    }

    const QUINE: [i64; 16] = [109, 1, 204, -1, 1001, 100, 1, 100, 1008, 100, 16, 101, 1006, 101, 0, 99];

    /// Input < 8 -> 999, == 8 -> 1000, > 8 -> 1001
    const COMPARE_TO_EIGHT: [i64; 47] = [
        3, 21, 1008, 21, 8, 20, 1005, 20, 22, 107, 8, 21, 20, 1006, 20, 31, 1106, 0, 36, 98, 0, 0,
        1002, 21, 125, 20, 4, 20, 1105, 1, 46, 104, 999, 1105, 1, 46, 1101, 1000, 1, 20, 4, 20,
        1105, 1, 46, 98, 99,
    ];

    #[test]
    fn test_add_in_place() {
        let mut m = machine(&[1, 0, 0, 0, 99]);
        assert_eq!(m.execute().unwrap(), HaltReason::HaltInstruction);
        assert_eq!(m.memory().slice(0, 5), vec![2, 0, 0, 0, 99]);
        assert_eq!(m.pc(), 4);
        assert_eq!(m.steps(), 1);
    }

    #[test]
    fn test_multiply_program() {
        let mut m = machine(&[1, 9, 10, 3, 2, 3, 11, 0, 99, 30, 40, 50]);
        m.execute().unwrap();
        assert_eq!(m.memory().get(0), 3500);
        assert_eq!(m.memory().get(3), 70);
    }

    #[test]
    fn test_echo() {
        let mut m = machine(&[3, 0, 4, 0, 99]);
        m.push_input(7);
        assert_eq!(m.execute().unwrap(), HaltReason::HaltInstruction);
        assert_eq!(m.output(), vec![7]);
        assert_eq!(m.last_output(), Some(7));
        assert!(m.is_halted());
    }

    #[test]
    fn test_no_input_program_halts_without_output() {
        let mut m = machine(&[1101, 2, 3, 5, 99, 0]);
        assert_eq!(m.execute().unwrap(), HaltReason::HaltInstruction);
        assert!(m.output().is_empty());
    }

    #[test]
    fn test_program_needing_input_waits() {
        let mut m = machine(&[3, 0, 99]);
        assert_eq!(m.execute().unwrap(), HaltReason::WaitingForInput);
        assert!(m.output().is_empty());
        assert_eq!(m.state(), MachineState::Running);
    }

    #[test]
    fn test_idempotent_resumption() {
        let mut m = machine(&[104, 5, 3, 0, 4, 0, 99]);
        assert_eq!(m.execute().unwrap(), HaltReason::WaitingForInput);

        let pc = m.pc();
        let steps = m.steps();
        let memory = m.memory().slice(0, 7);
        assert_eq!(pc, 2);
        assert_eq!(m.output(), vec![5]);

        for _ in 0..3 {
            assert_eq!(m.execute().unwrap(), HaltReason::WaitingForInput);
            assert_eq!(m.pc(), pc);
            assert_eq!(m.steps(), steps);
            assert_eq!(m.memory().slice(0, 7), memory);
            assert_eq!(m.output(), vec![5]);
        }

        m.push_input(11);
        assert_eq!(m.execute().unwrap(), HaltReason::HaltInstruction);
        assert_eq!(m.output(), vec![5, 11]);
    }

    #[test]
    fn test_halted_machine_stays_halted() {
        let mut m = machine(&[99]);
        assert_eq!(m.execute().unwrap(), HaltReason::HaltInstruction);
        assert_eq!(m.execute().unwrap(), HaltReason::HaltInstruction);
        assert_eq!(m.pc(), 0);
        assert_eq!(m.steps(), 0);
    }

    #[test]
    fn test_immediate_add_overwrites_destination() {
        let mut m = machine(&[1101, 2, 3, 5, 99, -12345]);
        m.execute().unwrap();
        assert_eq!(m.memory().get(5), 5);
    }

    #[test]
    fn test_relative_base_round_trip() {
        let mut m = machine(&[109, 5, 204, 3, 99, 0, 0, 0, 42]);
        m.execute().unwrap();
        assert_eq!(m.relative_base(), 5);
        assert_eq!(m.output(), vec![42]);
    }

    #[test]
    fn test_relative_store_beyond_program() {
        let mut m = machine(&[109, 10, 203, 0, 204, 0, 99]);
        m.push_input(-8);
        m.execute().unwrap();
        assert_eq!(m.output(), vec![-8]);
        assert_eq!(m.memory().get(10), -8);
    }

    #[test]
    fn test_quine() {
        let mut m = machine(&QUINE);
        assert_eq!(m.execute().unwrap(), HaltReason::HaltInstruction);
        assert_eq!(m.output(), QUINE.to_vec());
        assert_eq!(m.memory().get(100), 16);
    }

    #[test]
    fn test_large_numbers() {
        let mut m = machine(&[1102, 34915192, 34915192, 7, 4, 7, 99, 0]);
        m.execute().unwrap();
        assert_eq!(m.output(), vec![1_219_070_632_396_864]);

        let mut m = machine(&[104, 1125899906842624, 99]);
        m.execute().unwrap();
        assert_eq!(m.output(), vec![1_125_899_906_842_624]);
    }

    #[test]
    fn test_write_far_beyond_program() {
        let mut m = machine(&[1101, 1, 2, 5_000_000_000, 4, 5_000_000_000, 99]);
        m.execute().unwrap();
        assert_eq!(m.output(), vec![3]);
        assert_eq!(m.memory().sparse_len(), 1);
    }

    #[test]
    fn test_comparisons_and_jumps() {
        let memory = Memory::from_words(COMPARE_TO_EIGHT.to_vec());
        assert_eq!(run_program(&memory, &[7]).unwrap(), vec![999]);
        assert_eq!(run_program(&memory, &[8]).unwrap(), vec![1000]);
        assert_eq!(run_program(&memory, &[9]).unwrap(), vec![1001]);
    }

    #[test]
    fn test_jump_if_true_on_negative() {
        let mut m = machine(&[1105, -1, 6, 104, 0, 99, 104, 1, 99]);
        m.execute().unwrap();
        assert_eq!(m.output(), vec![1]);
    }

    #[test]
    fn test_jump_if_false() {
        let memory = Memory::from_words(vec![3, 12, 6, 12, 15, 1, 13, 14, 13, 4, 13, 99, -1, 0, 1, 9]);
        assert_eq!(run_program(&memory, &[0]).unwrap(), vec![0]);
        assert_eq!(run_program(&memory, &[5]).unwrap(), vec![1]);
    }

    #[test]
    fn test_unknown_opcode_is_fatal() {
        let mut m = machine(&[1, 0, 0, 0, 42]);
        let err = m.execute().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidOpcode);
        assert_eq!(err.operation(), "machine::execute");
        assert_eq!(err.context_value("pc"), Some("4"));
        assert_eq!(m.pc(), 4);
        assert_eq!(m.memory().get(0), 2);
    }

    #[test]
    fn test_invalid_mode_is_fatal() {
        let mut m = machine(&[304, 0, 99]);
        assert!(m.execute().is_err_and(|e| e.kind() == ErrorKind::InvalidMode));
        assert_eq!(m.pc(), 0);
    }

    #[test]
    fn test_negative_address_is_fatal() {
        let mut m = machine(&[4, -1, 99]);
        assert!(m.execute().is_err_and(|e| e.kind() == ErrorKind::InvalidAddress));

        let mut m = machine(&[109, -10, 204, 0, 99]);
        assert!(m.execute().is_err_and(|e| e.kind() == ErrorKind::InvalidAddress));
        assert_eq!(m.pc(), 2);
    }

    #[test]
    fn test_jump_to_negative_address_fails_on_fetch() {
        let mut m = machine(&[1105, 1, -1]);
        assert!(m.execute().is_err_and(|e| e.kind() == ErrorKind::InvalidAddress));
        assert_eq!(m.pc(), -1);
    }

    #[test]
    fn test_immediate_write_is_fatal() {
        let mut m = machine(&[11101, 1, 1, 5, 99, 0]);
        assert!(m.execute().is_err_and(|e| e.kind() == ErrorKind::InvalidWrite));
        assert_eq!(m.memory().get(5), 0);
    }

    #[test]
    fn test_immediate_store_input_consumes_nothing() {
        let mut m = machine(&[103, 0, 99]);
        assert_eq!(m.execute().unwrap(), HaltReason::WaitingForInput);

        m.push_input(1);
        assert!(m.execute().is_err_and(|e| e.kind() == ErrorKind::InvalidWrite));
        assert_eq!(m.input_cursor(), 0);
        assert_eq!(m.pending_input(), 1);
    }

    #[test]
    fn test_memory_poke_before_run() {
        let program = Memory::from_words(vec![1, 0, 0, 3, 99]);
        let mut m = Machine::new(&program);
        m.memory_mut().set(1, 4);
        m.memory_mut().set(2, 4);
        m.execute().unwrap();

        assert_eq!(m.memory().get(3), 198);
        // The source program is untouched
        assert_eq!(program.get(1), 0);
    }

    #[test]
    fn test_two_machine_ring() {
        let program = Memory::from_words(vec![3, 0, 4, 0, 3, 0, 4, 0, 99]);
        let mut a = Machine::new(&program);
        let mut b = Machine::new(&program);
        a.set_external_input(b.output_tape());
        b.set_external_input(a.output_tape());
        a.push_input(10);
        b.push_input(20);

        loop {
            let mut waiting = false;
            for m in [&mut a, &mut b] {
                if m.execute().unwrap() == HaltReason::WaitingForInput {
                    waiting = true;
                }
            }
            if !waiting {
                break;
            }
        }

        assert_eq!(a.output(), vec![20, 10, 20]);
        assert_eq!(b.output(), vec![10, 20, 10]);
        assert_eq!(a.output().iter().filter(|&&v| v == 10).count(), 1);
        assert_eq!(b.output().iter().filter(|&&v| v == 20).count(), 1);
    }

    #[test]
    fn test_clone_writes_its_own_output() {
        let mut a = machine(&[104, 1, 3, 0, 4, 0, 99]);
        assert_eq!(a.execute().unwrap(), HaltReason::WaitingForInput);

        let mut b = a.clone();
        assert!(!b.output_tape().same_tape(&a.output_tape()));
        assert_eq!(b.output(), vec![1]);

        a.push_input(2);
        b.push_input(3);
        a.execute().unwrap();
        b.execute().unwrap();
        assert_eq!(a.output(), vec![1, 2]);
        assert_eq!(b.output(), vec![1, 3]);

        let mut fresh = machine(&[104, 1, 99]);
        let mut copy = fresh.clone();
        fresh.execute().unwrap();
        copy.execute().unwrap();
        assert_eq!(fresh.output(), vec![1]);
        assert_eq!(copy.output(), vec![1]);
    }

    #[test]
    fn test_clone_keeps_reading_upstream() {
        let upstream = Tape::from(vec![5]);
        let mut a = machine(&[3, 0, 4, 0, 3, 0, 4, 0, 99]);
        a.set_external_input(upstream.clone());
        assert_eq!(a.execute().unwrap(), HaltReason::WaitingForInput);

        let mut b = a.clone();
        upstream.push(6);
        a.execute().unwrap();
        b.execute().unwrap();
        assert_eq!(a.output(), vec![5, 6]);
        assert_eq!(b.output(), vec![5, 6]);
    }

    #[test]
    fn test_redirect_keeps_cursor() {
        let mut m = machine(&[3, 10, 4, 10, 3, 10, 4, 10, 99]);
        m.push_input(1);
        assert_eq!(m.execute().unwrap(), HaltReason::WaitingForInput);
        assert_eq!(m.input_cursor(), 1);

        m.set_external_input(Tape::from(vec![7, 8, 9]));
        assert_eq!(m.execute().unwrap(), HaltReason::HaltInstruction);
        assert_eq!(m.output(), vec![1, 8]);
    }

    #[test]
    fn test_self_loop() {
        // Reads its own output: prints the seed, then reads it back and doubles it
        let mut m = machine(&[3, 20, 4, 20, 3, 20, 1002, 20, 2, 20, 4, 20, 99]);
        let tape = m.output_tape();
        m.set_external_input(tape);
        m.push_input(21);

        assert_eq!(m.execute().unwrap(), HaltReason::HaltInstruction);
        assert_eq!(m.output(), vec![21, 21, 42]);
        assert_eq!(m.last_emitted(), Some(42));
    }

    #[test]
    fn test_run_program_input_exhausted() {
        let memory = Memory::from_words(vec![3, 0, 3, 0, 99]);
        let err = run_program(&memory, &[1]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InputExhausted);
        assert!(err.is_retryable());
        assert_eq!(err.context_value("pc"), Some("2"));
    }

    #[test]
    fn test_halt_reason_serialization() {
        assert_eq!(
            serde_json::to_string(&HaltReason::WaitingForInput).unwrap(),
            "\"waiting_for_input\""
        );
        assert_eq!(
            serde_json::to_string(&MachineState::Halted).unwrap(),
            "\"halted\""
        );
    }
}
