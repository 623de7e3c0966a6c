//! Return descriptors.
//!
//! A [`ReturnInfo`] declares the shape, batch layout and initial value of a
//! unit's output before that unit has produced anything. Delay buffers are
//! sized and pre-filled from it.

use std::fmt;
use std::sync::Arc;

use crate::error::{ProjError, Result};
use crate::tensor::Tensor;

/// Batch layout of a unit's output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BatchMode {
    /// No batch axis.
    #[default]
    NonBatching,
    /// A leading batch axis of the given size.
    Batching(usize),
}

/// Factory building an initial value for a given shape.
pub type InitFn = Arc<dyn Fn(&[usize]) -> Tensor + Send + Sync>;

/// How the initial value is produced.
#[derive(Clone)]
pub enum DataInit {
    Zeros,
    Fill(f64),
    Value(Tensor),
    Factory(InitFn),
}

impl fmt::Debug for DataInit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataInit::Zeros => write!(f, "Zeros"),
            DataInit::Fill(v) => write!(f, "Fill({})", v),
            DataInit::Value(t) => write!(f, "Value({:?})", t.shape()),
            DataInit::Factory(_) => write!(f, "Factory(..)"),
        }
    }
}

/// Declared output descriptor of a unit.
#[derive(Clone, Debug)]
pub struct ReturnInfo {
    /// Per-sample shape.
    pub size: Vec<usize>,
    pub batch: BatchMode,
    pub axis_names: Option<Vec<String>>,
    pub init: DataInit,
}

impl ReturnInfo {
    /// A non-batched, zero-initialized descriptor.
    pub fn new(size: &[usize]) -> Self {
        Self {
            size: size.to_vec(),
            batch: BatchMode::NonBatching,
            axis_names: None,
            init: DataInit::Zeros,
        }
    }

    /// Describes an existing value; the value doubles as the initializer.
    pub fn of(value: &Tensor) -> Self {
        Self {
            size: value.shape().to_vec(),
            batch: BatchMode::NonBatching,
            axis_names: None,
            init: DataInit::Value(value.clone()),
        }
    }

    pub fn with_batch(mut self, batch_size: usize) -> Self {
        self.batch = BatchMode::Batching(batch_size);
        self
    }

    pub fn with_axis_names(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.axis_names = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_init(mut self, init: DataInit) -> Self {
        self.init = init;
        self
    }

    /// Full shape including the batch axis.
    pub fn shape(&self) -> Vec<usize> {
        match self.batch {
            BatchMode::NonBatching => self.size.clone(),
            BatchMode::Batching(n) => std::iter::once(n).chain(self.size.iter().copied()).collect(),
        }
    }

    /// Index of the batch axis, if any.
    pub fn batch_axis(&self) -> Option<usize> {
        match self.batch {
            BatchMode::NonBatching => None,
            BatchMode::Batching(_) => Some(0),
        }
    }

    /// Produces the initial value, checking it against the declared shape
    /// and axis names.
    pub fn initial_value(&self) -> Result<Tensor> {
        let shape = self.shape();
        let value = match &self.init {
            DataInit::Zeros => Tensor::zeros(&shape),
            DataInit::Fill(v) => Tensor::filled(&shape, *v),
            DataInit::Value(t) => t.clone(),
            DataInit::Factory(f) => f(&shape),
        };
        value.check_shape(&shape)?;
        if let Some(names) = &self.axis_names {
            if names.len() != value.ndim() {
                return Err(ProjError::AxisNames {
                    names: names.clone(),
                    rank: value.ndim(),
                });
            }
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_shape_with_batch() {
        let info = ReturnInfo::new(&[10]);
        assert_eq!(info.shape(), vec![10]);
        assert_eq!(info.batch_axis(), None);

        let info = info.with_batch(4);
        assert_eq!(info.shape(), vec![4, 10]);
        assert_eq!(info.batch_axis(), Some(0));
    }

    #[test]
    fn test_initial_value_variants() {
        let zeros = ReturnInfo::new(&[3]).initial_value().unwrap();
        assert_eq!(zeros.data(), &[0.0, 0.0, 0.0]);

        let filled = ReturnInfo::new(&[2])
            .with_init(DataInit::Fill(-65.0))
            .initial_value()
            .unwrap();
        assert_eq!(filled.data(), &[-65.0, -65.0]);

        let factory = ReturnInfo::new(&[2])
            .with_batch(2)
            .with_init(DataInit::Factory(Arc::new(|shape| Tensor::filled(shape, 1.0))))
            .initial_value()
            .unwrap();
        assert_eq!(factory.shape(), &[2, 2]);
        assert_eq!(factory.sum(), 4.0);
    }

    #[test]
    fn test_initializer_shape_mismatch() {
        let info = ReturnInfo::new(&[3]).with_init(DataInit::Value(Tensor::zeros(&[4])));
        let err = info.initial_value().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Shape);

        let info = ReturnInfo::new(&[3])
            .with_init(DataInit::Factory(Arc::new(|_| Tensor::zeros(&[1]))));
        assert!(info.initial_value().is_err());
    }

    #[test]
    fn test_axis_names_rank() {
        let ok = ReturnInfo::new(&[3]).with_batch(2).with_axis_names(["batch", "neuron"]);
        assert!(ok.initial_value().is_ok());

        let bad = ReturnInfo::new(&[3]).with_axis_names(["batch", "neuron"]);
        assert_eq!(bad.initial_value().unwrap_err().kind(), ErrorKind::Shape);
    }
}
