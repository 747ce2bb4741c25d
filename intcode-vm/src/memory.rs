//! # Intcode Memory
//!
//! Address space of a single machine. Addresses are non-negative and
//! unbounded; anything never written reads as zero.
//!
//! The loaded program and low addresses live in a contiguous vector. Writes
//! far past the dense limit go to a hash map so a program poking address
//! 10^12 doesn't allocate terabytes.

use crate::error::{self, Result};
use std::collections::HashMap;

/// Default number of cells that may be stored contiguously
pub const DEFAULT_DENSE_LIMIT: usize = 64 * 1024;

/// Upper bound accepted for `MemoryConfig::dense_limit` (512 MiB of cells)
pub const MAX_DENSE_LIMIT: usize = 1 << 26;

/// Memory layout configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryConfig {
    /// Addresses below this bound grow the dense vector instead of the map
    pub dense_limit: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            dense_limit: DEFAULT_DENSE_LIMIT,
        }
    }
}

impl MemoryConfig {
    /// Create a config with a custom dense limit
    pub fn with_dense_limit(dense_limit: usize) -> Result<Self> {
        let config = Self { dense_limit };
        config.validate()?;
        Ok(config)
    }

    /// Reject limits that would allow absurd contiguous allocations
    pub fn validate(&self) -> Result<()> {
        if self.dense_limit > MAX_DENSE_LIMIT {
            return Err(error::config_invalid(format!(
                "dense limit {} exceeds maximum {}",
                self.dense_limit, MAX_DENSE_LIMIT
            ))
            .with_context("dense_limit", self.dense_limit.to_string()));
        }
        Ok(())
    }
}

/// Machine memory - dense prefix plus sparse overflow
#[derive(Debug, Clone, Default)]
pub struct Memory {
    dense: Vec<i64>,
    sparse: HashMap<u64, i64>,
    config: MemoryConfig,
}

impl Memory {
    /// Create new empty memory
    pub fn new() -> Self {
        Self::with_config(MemoryConfig::default())
    }

    /// Create empty memory with a custom layout
    pub fn with_config(config: MemoryConfig) -> Self {
        Self {
            dense: Vec::new(),
            sparse: HashMap::new(),
            config,
        }
    }

    /// Create memory holding `words` at addresses `0..words.len()`
    pub fn from_words(words: Vec<i64>) -> Self {
        Self::from_words_with_config(words, MemoryConfig::default())
    }

    /// Same as [`Memory::from_words`] with a custom layout.
    ///
    /// The initial image is always dense, even if longer than the limit.
    pub fn from_words_with_config(words: Vec<i64>, config: MemoryConfig) -> Self {
        Self {
            dense: words,
            sparse: HashMap::new(),
            config,
        }
    }

    /// Layout configuration
    pub fn config(&self) -> MemoryConfig {
        self.config
    }

    /// Read the value at `address` (zero if never written)
    pub fn get(&self, address: u64) -> i64 {
        match self.dense_index(address) {
            Some(idx) => self.dense[idx],
            None => self.sparse.get(&address).copied().unwrap_or(0),
        }
    }

    /// Write `value` at `address`, growing memory as needed
    pub fn set(&mut self, address: u64, value: i64) {
        if let Some(idx) = self.dense_index(address) {
            self.dense[idx] = value;
            return;
        }

        match usize::try_from(address) {
            Ok(idx) if idx < self.config.dense_limit => {
                // Map keys are all >= dense_limit, so growth never shadows one
                self.dense.resize(idx + 1, 0);
                self.dense[idx] = value;
            }
            _ => {
                self.sparse.insert(address, value);
            }
        }
    }

    /// Copy `len` cells starting at `start`
    pub fn slice(&self, start: u64, len: usize) -> Vec<i64> {
        (0..len as u64)
            .map(|offset| self.get(start.saturating_add(offset)))
            .collect()
    }

    /// One past the highest address ever stored (loaded or written).
    ///
    /// Saturates at `u64::MAX`, so a cell written there is not covered.
    pub fn extent(&self) -> u64 {
        let dense = self.dense.len() as u64;
        let sparse = self
            .sparse
            .keys()
            .max()
            .map(|a| a.saturating_add(1))
            .unwrap_or(0);
        dense.max(sparse)
    }

    /// Number of cells held contiguously
    pub fn dense_len(&self) -> usize {
        self.dense.len()
    }

    /// Number of cells held in the overflow map
    pub fn sparse_len(&self) -> usize {
        self.sparse.len()
    }

    fn dense_index(&self, address: u64) -> Option<usize> {
        usize::try_from(address)
            .ok()
            .filter(|&idx| idx < self.dense.len())
    }
}

impl From<Vec<i64>> for Memory {
    fn from(words: Vec<i64>) -> Self {
        Memory::from_words(words)
    }
}
