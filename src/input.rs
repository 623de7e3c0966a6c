//! Named input functions of a destination population.
//!
//! Each registered [`SynOutput`] contributes a current; the population's
//! external drive for a step is the sum of all of them.

use crate::dynamics::{Shared, SynOutput};
use crate::error::{ProjError, Result};
use crate::tensor::Tensor;

/// Insertion-ordered registry of input functions.
#[derive(Default)]
pub struct InputRegistry {
    entries: Vec<(String, Shared<dyn SynOutput>)>,
}

impl InputRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an input function under a unique name.
    pub fn add(&mut self, name: impl Into<String>, out: Shared<dyn SynOutput>) -> Result<()> {
        let name = name.into();
        if self.has(&name) {
            return Err(ProjError::DuplicateInput(name));
        }
        self.entries.push((name, out));
        Ok(())
    }

    pub fn has(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    pub fn get(&self, name: &str) -> Option<&Shared<dyn SynOutput>> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, o)| o)
    }

    /// Sums the currents of every input function at `potential`.
    pub fn sum_currents(&self, potential: &Tensor, shape: &[usize]) -> Result<Tensor> {
        let mut drive = Tensor::zeros(shape);
        for (_, out) in &self.entries {
            let current = out.lock().current(potential)?;
            drive.add_assign(&current)?;
        }
        Ok(drive)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn reset(&self) {
        for (_, out) in &self.entries {
            out.lock().reset();
        }
    }
}
