//! # Tapes
//!
//! Append-only value sequences connecting machines. A machine writes its
//! output to a [`Tape`] it owns; a downstream machine holds a clone of the
//! handle as its input source and keeps its own read cursor.
//!
//! One writer and one reader per tape. Cursors live in the reader, so two
//! machines reading the same tape would each see every value.

use std::cell::RefCell;
use std::rc::Rc;

/// Shared, append-only sequence of values
#[derive(Debug, Clone, Default)]
pub struct Tape {
    values: Rc<RefCell<Vec<i64>>>,
}

impl Tape {
    /// Create an empty tape
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value
    pub fn push(&self, value: i64) {
        self.values.borrow_mut().push(value);
    }

    /// Append several values in order
    pub fn extend(&self, values: impl IntoIterator<Item = i64>) {
        self.values.borrow_mut().extend(values);
    }

    /// Value at `index`, if it has been written
    pub fn get(&self, index: usize) -> Option<i64> {
        self.values.borrow().get(index).copied()
    }

    /// Number of values written so far
    pub fn len(&self) -> usize {
        self.values.borrow().len()
    }

    /// Check if nothing has been written
    pub fn is_empty(&self) -> bool {
        self.values.borrow().is_empty()
    }

    /// Most recently written value
    pub fn last(&self) -> Option<i64> {
        self.values.borrow().last().copied()
    }

    /// Copy of all values written so far
    pub fn to_vec(&self) -> Vec<i64> {
        self.values.borrow().clone()
    }

    /// Check if two handles refer to the same tape
    pub fn same_tape(&self, other: &Tape) -> bool {
        Rc::ptr_eq(&self.values, &other.values)
    }
}

impl From<Vec<i64>> for Tape {
    fn from(values: Vec<i64>) -> Self {
        Self {
            values: Rc::new(RefCell::new(values)),
        }
    }
}

/// Where a machine reads its input from
#[derive(Debug, Clone)]
pub enum InputSource {
    /// Private sequence the caller appends to
    Owned(Vec<i64>),
    /// Another machine's output (or any shared tape)
    External(Tape),
}

impl Default for InputSource {
    fn default() -> Self {
        InputSource::Owned(Vec::new())
    }
}

impl InputSource {
    /// Value at `index`, if available yet
    pub fn get(&self, index: usize) -> Option<i64> {
        match self {
            InputSource::Owned(values) => values.get(index).copied(),
            InputSource::External(tape) => tape.get(index),
        }
    }

    /// Number of values available
    pub fn len(&self) -> usize {
        match self {
            InputSource::Owned(values) => values.len(),
            InputSource::External(tape) => tape.len(),
        }
    }

    /// Check if the source holds no values
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append a value to whichever sequence this source designates
    pub fn push(&mut self, value: i64) {
        match self {
            InputSource::Owned(values) => values.push(value),
            InputSource::External(tape) => tape.push(value),
        }
    }

    /// Append several values in order
    pub fn extend(&mut self, values: impl IntoIterator<Item = i64>) {
        match self {
            InputSource::Owned(owned) => owned.extend(values),
            InputSource::External(tape) => tape.extend(values),
        }
    }

    /// Copy of all values in the source
    pub fn to_vec(&self) -> Vec<i64> {
        match self {
            InputSource::Owned(values) => values.clone(),
            InputSource::External(tape) => tape.to_vec(),
        }
    }

    /// Check if reads come from a shared tape
    pub fn is_external(&self) -> bool {
        matches!(self, InputSource::External(_))
    }
}
