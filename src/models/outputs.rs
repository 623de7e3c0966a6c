//! Output accumulators turning conductances into input currents.

use crate::dynamics::SynOutput;
use crate::error::Result;
use crate::params::{FromParams, Params};
use crate::tensor::Tensor;

/// Current-based output: the bound value is the current.
#[derive(Clone, Debug, Default)]
pub struct Cuba {
    cond: Option<Tensor>,
}

impl Cuba {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FromParams for Cuba {
    const KIND: &'static str = "Cuba";

    fn from_params(_params: &Params) -> Result<Self> {
        Ok(Cuba::new())
    }
}

impl SynOutput for Cuba {
    fn bind_cond(&mut self, cond: &Tensor) -> Result<()> {
        self.cond = Some(cond.clone());
        Ok(())
    }

    fn current(&self, potential: &Tensor) -> Result<Tensor> {
        match &self.cond {
            Some(g) => {
                g.check_shape(potential.shape())?;
                Ok(g.clone())
            }
            None => Ok(Tensor::zeros(potential.shape())),
        }
    }

    fn reset(&mut self) {
        self.cond = None;
    }
}

/// Conductance-based output: `I = g * (E - V)`.
#[derive(Clone, Debug)]
pub struct Coba {
    pub e: f64,
    cond: Option<Tensor>,
}

impl Coba {
    pub fn new(e: f64) -> Self {
        Self { e, cond: None }
    }
}

impl FromParams for Coba {
    const KIND: &'static str = "Coba";

    fn from_params(params: &Params) -> Result<Self> {
        Ok(Coba::new(params.number("E")?))
    }
}

impl SynOutput for Coba {
    fn bind_cond(&mut self, cond: &Tensor) -> Result<()> {
        self.cond = Some(cond.clone());
        Ok(())
    }

    fn current(&self, potential: &Tensor) -> Result<Tensor> {
        match &self.cond {
            Some(g) => {
                let e = self.e;
                g.zip_map(potential, |g, v| g * (e - v))
            }
            None => Ok(Tensor::zeros(potential.shape())),
        }
    }

    fn reset(&mut self) {
        self.cond = None;
    }
}
