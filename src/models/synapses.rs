//! Synapse dynamics.
//!
//! Both models integrate with the exponential Euler scheme and implement
//! every synapse role: they can be stepped with an input, collect currents
//! between updates, and describe their output for delaying.

use crate::dynamics::{AlignPostSynapse, DelayedOutput, Synapse};
use crate::error::Result;
use crate::info::ReturnInfo;
use crate::params::{FromParams, Params};
use crate::tensor::Tensor;
use crate::types::{SimTime, DEFAULT_DT};

/// Single-exponential synapse: `dg/dt = -g / tau`, inputs add to `g`.
#[derive(Clone, Debug)]
pub struct Expon {
    g: Tensor,
    pending: Tensor,
    tau: f64,
    decay: f64,
}

impl Expon {
    pub fn new(size: &[usize], tau: f64, dt: SimTime) -> Self {
        Self {
            g: Tensor::zeros(size),
            pending: Tensor::zeros(size),
            tau,
            decay: (-dt / tau).exp(),
        }
    }

    pub fn tau(&self) -> f64 {
        self.tau
    }
}

impl FromParams for Expon {
    const KIND: &'static str = "Expon";

    fn from_params(params: &Params) -> Result<Self> {
        let size = params.sizes("size")?;
        let tau = params.positive("tau")?;
        let dt = params.number_or("dt", DEFAULT_DT)?;
        Ok(Expon::new(&size, tau, dt))
    }
}

impl Synapse for Expon {
    fn update(&mut self, input: Option<&Tensor>) -> Result<Tensor> {
        self.g.scale_assign(self.decay);
        self.g.add_assign(&self.pending)?;
        self.pending.fill(0.0);
        if let Some(x) = input {
            self.g.add_assign(x)?;
        }
        Ok(self.g.clone())
    }

    fn state(&self) -> &Tensor {
        &self.g
    }

    fn reset(&mut self) {
        self.g.fill(0.0);
        self.pending.fill(0.0);
    }
}

impl AlignPostSynapse for Expon {
    fn add_current(&mut self, current: &Tensor) -> Result<()> {
        self.pending.add_assign(current)
    }
}

impl DelayedOutput for Expon {
    fn return_info(&self) -> ReturnInfo {
        ReturnInfo::new(self.g.shape())
    }
}

/// Dual-exponential synapse.
///
/// Inputs drive a rising trace `h` (`dh/dt = -h / tau_rise`), which in turn
/// drives the conductance `g` (`dg/dt = -g / tau_decay + a * h`).
#[derive(Clone, Debug)]
pub struct DualExpon {
    g: Tensor,
    h: Tensor,
    pending: Tensor,
    a: f64,
    rise: f64,
    decay: f64,
    dt: SimTime,
}

impl DualExpon {
    pub fn new(size: &[usize], tau_rise: f64, tau_decay: f64, dt: SimTime) -> Self {
        Self {
            g: Tensor::zeros(size),
            h: Tensor::zeros(size),
            pending: Tensor::zeros(size),
            a: 1.0,
            rise: (-dt / tau_rise).exp(),
            decay: (-dt / tau_decay).exp(),
            dt,
        }
    }

    /// Scales the coupling from `h` into `g`.
    pub fn with_amplitude(mut self, a: f64) -> Self {
        self.a = a;
        self
    }

    pub fn rise_trace(&self) -> &Tensor {
        &self.h
    }
}

impl FromParams for DualExpon {
    const KIND: &'static str = "DualExpon";

    fn from_params(params: &Params) -> Result<Self> {
        let size = params.sizes("size")?;
        let dt = params.number_or("dt", DEFAULT_DT)?;
        let syn = DualExpon::new(
            &size,
            params.positive("tau_rise")?,
            params.positive("tau_decay")?,
            dt,
        );
        Ok(syn.with_amplitude(params.number_or("a", 1.0)?))
    }
}

impl Synapse for DualExpon {
    fn update(&mut self, input: Option<&Tensor>) -> Result<Tensor> {
        self.h.scale_assign(self.rise);
        self.h.add_assign(&self.pending)?;
        self.pending.fill(0.0);
        if let Some(x) = input {
            self.h.add_assign(x)?;
        }
        self.g.scale_assign(self.decay);
        let gain = self.a * self.dt;
        let drive = self.h.map(|h| h * gain);
        self.g.add_assign(&drive)?;
        Ok(self.g.clone())
    }

    fn state(&self) -> &Tensor {
        &self.g
    }

    fn reset(&mut self) {
        self.g.fill(0.0);
        self.h.fill(0.0);
        self.pending.fill(0.0);
    }
}

impl AlignPostSynapse for DualExpon {
    fn add_current(&mut self, current: &Tensor) -> Result<()> {
        self.pending.add_assign(current)
    }
}

impl DelayedOutput for DualExpon {
    fn return_info(&self) -> ReturnInfo {
        ReturnInfo::new(self.g.shape())
    }
}
