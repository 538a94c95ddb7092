//! A single sample point and its evaluation history.

use crate::error::{ProbeError, Result};

/// One fixed sample point plus the values recorded at it.
///
/// `history[k]` is the result of the k-th evaluation since the probe was
/// created or last cleared. Every entry has exactly `value_size` components.
#[derive(Debug, Clone, PartialEq)]
pub struct Probe {
    id: usize,
    coordinates: Vec<f64>,
    value_size: usize,
    history: Vec<Vec<f64>>,
}

impl Probe {
    /// Create a probe with an empty history.
    pub fn new(id: usize, coordinates: Vec<f64>, value_size: usize) -> Self {
        Self {
            id,
            coordinates,
            value_size,
            history: Vec::new(),
        }
    }

    pub(crate) fn with_capacity(
        id: usize,
        coordinates: Vec<f64>,
        value_size: usize,
        capacity: usize,
    ) -> Self {
        Self {
            id,
            coordinates,
            value_size,
            history: Vec::with_capacity(capacity),
        }
    }

    /// Global id (index into the full candidate point set).
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn coordinates(&self) -> &[f64] {
        &self.coordinates
    }

    pub fn value_size(&self) -> usize {
        self.value_size
    }

    pub fn number_of_evaluations(&self) -> usize {
        self.history.len()
    }

    pub fn history(&self) -> &[Vec<f64>] {
        &self.history
    }

    /// Append one evaluation result.
    pub fn append(&mut self, values: Vec<f64>) -> Result<()> {
        if values.len() != self.value_size {
            return Err(ProbeError::DimensionMismatch {
                expected: self.value_size,
                got: values.len(),
            });
        }
        self.history.push(values);
        Ok(())
    }

    /// Append a NaN-filled entry marking an evaluation that could not be made.
    pub fn append_missing(&mut self) {
        self.history.push(vec![f64::NAN; self.value_size]);
    }

    /// True if entry `k` is a missing-evaluation sentinel.
    pub fn is_missing(&self, k: usize) -> Result<bool> {
        Ok(self.snapshot(k)?.iter().all(|v| v.is_nan()))
    }

    /// Values recorded at evaluation `k`.
    pub fn snapshot(&self, k: usize) -> Result<&[f64]> {
        self.history
            .get(k)
            .map(Vec::as_slice)
            .ok_or_else(|| ProbeError::out_of_range("snapshot", k, self.history.len()))
    }

    /// Time series of component `i`.
    pub fn component(&self, i: usize) -> Result<Vec<f64>> {
        if i >= self.value_size {
            return Err(ProbeError::out_of_range("component", i, self.value_size));
        }
        Ok(self.history.iter().map(|values| values[i]).collect())
    }

    /// Remove evaluation `k`, shifting later entries down by one.
    pub fn erase_snapshot(&mut self, k: usize) -> Result<()> {
        if k >= self.history.len() {
            return Err(ProbeError::out_of_range("snapshot", k, self.history.len()));
        }
        self.history.remove(k);
        Ok(())
    }

    /// Drop the whole history. Id and coordinates are kept.
    pub fn clear(&mut self) {
        self.history.clear();
    }
}
