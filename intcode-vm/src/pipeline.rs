//! # Cooperative Pipelines
//!
//! Several machines wired output-to-input and stepped round-robin on one
//! thread. Machine `i + 1` reads machine `i`'s output tape; in a ring,
//! machine 0 also reads the last machine's output.
//!
//! Each pass calls `execute` once on every machine in index order. Values
//! only ever flow through append-only tapes read with private cursors, so
//! the final result does not depend on how many passes it takes.

use crate::error::{self, Result};
use crate::machine::{HaltReason, Machine};
use crate::memory::Memory;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// How machines are wired together
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topology {
    /// `0 -> 1 -> ... -> n-1`; machine 0 reads its own owned input
    Chain,
    /// `0 -> 1 -> ... -> n-1 -> 0`
    Ring,
}

/// How a pipeline run ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PipelineOutcome {
    /// A full pass finished with no machine waiting for input
    Halted,
    /// A full pass executed no instruction while these machines waited
    Stalled { waiting: Vec<usize> },
}

/// Summary of a pipeline run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineReport {
    /// Number of round-robin passes performed
    pub passes: usize,
    /// Halt reason of each machine in the final pass
    pub reasons: Vec<HaltReason>,
    pub outcome: PipelineOutcome,
}

impl PipelineReport {
    /// Check if every machine finished
    pub fn is_halted(&self) -> bool {
        self.outcome == PipelineOutcome::Halted
    }
}

/// A set of wired machines
#[derive(Debug)]
pub struct Pipeline {
    machines: Vec<Machine>,
    topology: Topology,
}

impl Pipeline {
    /// Build `count` machines from copies of `program`, wired per `topology`
    pub fn new(program: &Memory, count: usize, topology: Topology) -> Result<Self> {
        let machines = (0..count).map(|_| Machine::new(program)).collect();
        Self::from_machines(machines, topology)
    }

    /// Build a chain of `count` machines
    pub fn chain(program: &Memory, count: usize) -> Result<Self> {
        Self::new(program, count, Topology::Chain)
    }

    /// Build a ring of `count` machines
    pub fn ring(program: &Memory, count: usize) -> Result<Self> {
        Self::new(program, count, Topology::Ring)
    }

    /// Wire existing machines. Must happen before any of them has read input.
    pub fn from_machines(mut machines: Vec<Machine>, topology: Topology) -> Result<Self> {
        if machines.is_empty() {
            return Err(error::invalid_argument("pipeline needs at least one machine")
                .with_operation("pipeline::new"));
        }

        for i in 1..machines.len() {
            let upstream = machines[i - 1].output_tape();
            machines[i].set_external_input(upstream);
        }
        if topology == Topology::Ring {
            let last = machines[machines.len() - 1].output_tape();
            machines[0].set_external_input(last);
        }

        debug!(machines = machines.len(), ?topology, "pipeline wired");
        Ok(Self { machines, topology })
    }

    /// Append a value to machine `index`'s input
    pub fn seed(&mut self, index: usize, value: i64) -> Result<()> {
        let count = self.machines.len();
        let machine = self.machines.get_mut(index).ok_or_else(|| {
            error::invalid_argument(format!("no machine {} in pipeline of {}", index, count))
                .with_operation("pipeline::seed")
                .with_context("index", index.to_string())
        })?;
        machine.push_input(value);
        Ok(())
    }

    /// Seed machine `i` with `values[i]`, one value per machine
    pub fn seed_all(&mut self, values: &[i64]) -> Result<()> {
        if values.len() != self.machines.len() {
            return Err(error::invalid_argument(format!(
                "expected {} seed values, got {}",
                self.machines.len(),
                values.len()
            ))
            .with_operation("pipeline::seed_all"));
        }
        for (index, value) in values.iter().enumerate() {
            self.seed(index, *value)?;
        }
        Ok(())
    }

    /// Run passes until no machine is waiting, or until a pass makes no progress
    pub fn run(&mut self) -> Result<PipelineReport> {
        let mut passes = 0;

        loop {
            passes += 1;
            let steps_before = self.total_steps();
            let mut reasons = Vec::with_capacity(self.machines.len());

            for (index, machine) in self.machines.iter_mut().enumerate() {
                let reason = machine.execute().map_err(|e| {
                    e.with_operation("pipeline::run")
                        .with_context("machine", index.to_string())
                })?;
                reasons.push(reason);
            }

            let waiting: Vec<usize> = reasons
                .iter()
                .enumerate()
                .filter(|(_, r)| **r == HaltReason::WaitingForInput)
                .map(|(i, _)| i)
                .collect();
            debug!(pass = passes, waiting = waiting.len(), "pipeline pass");

            if waiting.is_empty() {
                return Ok(PipelineReport {
                    passes,
                    reasons,
                    outcome: PipelineOutcome::Halted,
                });
            }
            if self.total_steps() == steps_before {
                debug!(?waiting, "pipeline stalled");
                return Ok(PipelineReport {
                    passes,
                    reasons,
                    outcome: PipelineOutcome::Stalled { waiting },
                });
            }
        }
    }

    /// Like [`Pipeline::run`], but a stall is an error
    pub fn run_to_halt(&mut self) -> Result<PipelineReport> {
        let report = self.run()?;
        match &report.outcome {
            PipelineOutcome::Halted => Ok(report),
            PipelineOutcome::Stalled { waiting } => Err(error::pipeline_stalled(waiting)
                .with_operation("pipeline::run_to_halt")
                .with_context("passes", report.passes.to_string())),
        }
    }

    fn total_steps(&self) -> u64 {
        self.machines.iter().map(|m| m.steps()).sum()
    }

    /// Wiring of this pipeline
    pub fn topology(&self) -> Topology {
        self.topology
    }

    /// Number of machines
    pub fn len(&self) -> usize {
        self.machines.len()
    }

    /// Always false: construction rejects empty pipelines
    pub fn is_empty(&self) -> bool {
        self.machines.is_empty()
    }

    /// Machine at `index`
    pub fn machine(&self, index: usize) -> Option<&Machine> {
        self.machines.get(index)
    }

    /// All machines in index order
    pub fn machines(&self) -> &[Machine] {
        &self.machines
    }

    /// Last value the last machine produced itself.
    ///
    /// In a ring, seeds for machine 0 land on the last machine's output tape;
    /// they are not reported here.
    pub fn last_output(&self) -> Option<i64> {
        self.machines.last().and_then(|m| m.last_emitted())
    }

    /// Take the machines back out
    pub fn into_machines(self) -> Vec<Machine> {
        self.machines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn program(words: &[i64]) -> Memory {
        Memory::from_words(words.to_vec())
    }

    #[test]
    fn test_two_machine_ring() {
        let mut pipeline = Pipeline::ring(&program(&[3, 0, 4, 0, 3, 0, 4, 0, 99]), 2).unwrap();
        pipeline.seed_all(&[10, 20]).unwrap();

        let report = pipeline.run().unwrap();
        assert!(report.is_halted());
        assert_eq!(report.passes, 2);
        assert_eq!(report.reasons, vec![HaltReason::HaltInstruction; 2]);

        let a = pipeline.machine(0).unwrap().output();
        let b = pipeline.machine(1).unwrap().output();
        assert_eq!(a.iter().filter(|&&v| v == 10).count(), 1);
        assert_eq!(b.iter().filter(|&&v| v == 20).count(), 1);
        assert_eq!(a, vec![20, 10, 20]);
        assert_eq!(b, vec![10, 20, 10]);
    }

    #[test]
    fn test_chain_amplifiers() {
        let amp = program(&[3, 15, 3, 16, 1002, 16, 10, 16, 1, 16, 15, 15, 4, 15, 99, 0, 0]);
        let mut pipeline = Pipeline::chain(&amp, 5).unwrap();
        pipeline.seed_all(&[4, 3, 2, 1, 0]).unwrap();
        pipeline.seed(0, 0).unwrap();

        let report = pipeline.run_to_halt().unwrap();
        assert_eq!(report.passes, 1);
        assert_eq!(pipeline.last_output(), Some(43210));
    }

    #[test]
    fn test_ring_feedback_loop() {
        let amp = program(&[
            3, 26, 1001, 26, -4, 26, 3, 27, 1002, 27, 2, 27, 1, 27, 26, 27, 4, 27, 1001, 28, -1,
            28, 1005, 28, 6, 99, 0, 0, 5,
        ]);
        let mut pipeline = Pipeline::ring(&amp, 5).unwrap();
        pipeline.seed_all(&[9, 8, 7, 6, 5]).unwrap();
        pipeline.seed(0, 0).unwrap();

        let report = pipeline.run_to_halt().unwrap();
        assert!(report.passes > 1);
        assert_eq!(pipeline.last_output(), Some(139_629_729));
        assert!(pipeline.machines().iter().all(|m| m.is_halted()));
    }

    #[test]
    fn test_stalled_chain() {
        let mut pipeline = Pipeline::chain(&program(&[3, 0, 4, 0, 99]), 2).unwrap();

        let report = pipeline.run().unwrap();
        assert_eq!(report.outcome, PipelineOutcome::Stalled { waiting: vec![0, 1] });
        assert_eq!(report.passes, 1);

        let err = pipeline.run_to_halt().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PipelineStalled);
        assert!(err.is_retryable());

        // Feeding the head unblocks everything
        pipeline.seed(0, 5).unwrap();
        assert!(pipeline.run().unwrap().is_halted());
        assert_eq!(pipeline.last_output(), Some(5));
    }

    #[test]
    fn test_machine_error_carries_index() {
        let machines = vec![
            Machine::new(&program(&[3, 0, 4, 0, 99])),
            Machine::new(&program(&[3, 0, 42])),
        ];
        let mut pipeline = Pipeline::from_machines(machines, Topology::Chain).unwrap();
        pipeline.seed(0, 1).unwrap();

        let err = pipeline.run().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidOpcode);
        assert_eq!(err.operation(), "pipeline::run");
        assert_eq!(err.context_value("machine"), Some("1"));
    }

    #[test]
    fn test_ring_last_output_ignores_seeds() {
        let machines = vec![
            Machine::new(&program(&[3, 0, 3, 0, 99])),
            Machine::new(&program(&[3, 0, 99])),
        ];
        let mut pipeline = Pipeline::from_machines(machines, Topology::Ring).unwrap();
        pipeline.seed_all(&[7, 1]).unwrap();
        pipeline.seed(0, 0).unwrap();

        assert!(pipeline.run_to_halt().unwrap().is_halted());
        // Both seeds for machine 0 sit on machine 1's output tape
        assert_eq!(pipeline.machine(1).unwrap().output(), vec![7, 0]);
        assert_eq!(pipeline.last_output(), None);
    }

    #[test]
    fn test_invalid_construction_and_seeding() {
        let p = program(&[99]);
        assert!(Pipeline::ring(&p, 0).is_err_and(|e| e.kind() == ErrorKind::InvalidArgument));

        let mut pipeline = Pipeline::chain(&p, 2).unwrap();
        assert_eq!(pipeline.topology(), Topology::Chain);
        assert!(pipeline.seed(2, 1).is_err_and(|e| e.kind() == ErrorKind::InvalidArgument));
        assert!(pipeline.seed_all(&[1]).is_err_and(|e| e.kind() == ErrorKind::InvalidArgument));
    }

    #[test]
    fn test_report_serialization() {
        let report = PipelineReport {
            passes: 3,
            reasons: vec![HaltReason::WaitingForInput],
            outcome: PipelineOutcome::Stalled { waiting: vec![0] },
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["outcome"]["status"], "stalled");
        assert_eq!(json["outcome"]["waiting"][0], 0);
        assert_eq!(json["reasons"][0], "waiting_for_input");
    }
}
