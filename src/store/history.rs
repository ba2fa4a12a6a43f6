//! Fixed-capacity ring of past vector generations.

use crate::error::{Result, TiaError};

/// Ring buffer of owned vectors indexed by age.
///
/// Slot `0` is the newest generation and slot `capacity - 1` the oldest.
/// Rotation moves the base index; no vector is ever reallocated.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRing {
    slots: Vec<Vec<f64>>,
    base: usize,
    len: usize,
}

impl HistoryRing {
    /// Create a ring of `capacity` zero vectors of length `len`.
    pub fn new(capacity: usize, len: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(TiaError::invalid_parameter(
                "capacity",
                "history ring needs at least one slot",
            ));
        }
        Ok(Self {
            slots: vec![vec![0.0; len]; capacity],
            base: 0,
            len,
        })
    }

    /// Number of generations held.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Length of each vector.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if the stored vectors are empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn physical(&self, age: usize) -> usize {
        debug_assert!(age < self.slots.len());
        (self.base + age) % self.slots.len()
    }

    /// Generation `age` (0 = newest).
    pub fn get(&self, age: usize) -> &[f64] {
        &self.slots[self.physical(age)]
    }

    /// Mutable access to generation `age`.
    pub fn get_mut(&mut self, age: usize) -> &mut [f64] {
        let i = self.physical(age);
        &mut self.slots[i]
    }

    /// Push `newest` into slot 0, aging every other slot by one.
    ///
    /// The oldest generation's buffer is reused for the new data.
    pub fn rotate_in(&mut self, newest: &[f64]) -> Result<()> {
        TiaError::check_len("history vector", self.len, newest.len())?;
        let cap = self.slots.len();
        self.base = (self.base + cap - 1) % cap;
        self.slots[self.base].copy_from_slice(newest);
        Ok(())
    }

    /// Set every generation to `value`.
    pub fn fill_with(&mut self, value: &[f64]) -> Result<()> {
        TiaError::check_len("history vector", self.len, value.len())?;
        for slot in &mut self.slots {
            slot.copy_from_slice(value);
        }
        Ok(())
    }

    /// Set every entry of every generation to `v`.
    pub fn fill_scalar(&mut self, v: f64) {
        for slot in &mut self.slots {
            slot.fill(v);
        }
    }

    /// Iterate generations from newest to oldest.
    pub fn iter(&self) -> impl Iterator<Item = &[f64]> + '_ {
        (0..self.slots.len()).map(move |age| self.get(age))
    }
}
