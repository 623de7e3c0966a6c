//! Population dynamics.

use crate::dynamics::NeuronDynamics;
use crate::error::{ProjError, Result};
use crate::info::ReturnInfo;
use crate::params::{FromParams, Params};
use crate::tensor::Tensor;
use crate::types::{SimTime, StepContext, DEFAULT_DT};

/// Leaky integrate-and-fire neurons, integrated with forward Euler.
///
/// `tau * dV/dt = -(V - V_rest) + R * I`; a neuron spikes and resets to
/// `V_reset` when `V` reaches `V_th`, then stays silent for `t_ref`.
#[derive(Clone, Debug)]
pub struct Lif {
    v: Tensor,
    spike: Tensor,
    refractory: Vec<SimTime>,
    pub v_rest: f64,
    pub v_reset: f64,
    pub v_th: f64,
    pub tau: f64,
    pub r: f64,
    pub t_ref: SimTime,
    dt: SimTime,
}

impl Lif {
    pub fn new(size: &[usize], dt: SimTime) -> Self {
        let v = Tensor::zeros(size);
        let n = v.len();
        Self {
            spike: Tensor::zeros(size),
            v,
            refractory: vec![0.0; n],
            v_rest: 0.0,
            v_reset: -5.0,
            v_th: 20.0,
            tau: 10.0,
            r: 1.0,
            t_ref: 0.0,
            dt,
        }
    }

    pub fn with_threshold(mut self, v_th: f64) -> Self {
        self.v_th = v_th;
        self
    }

    pub fn with_tau(mut self, tau: f64) -> Self {
        self.tau = tau;
        self
    }

    pub fn with_reset(mut self, v_rest: f64, v_reset: f64) -> Self {
        self.v_rest = v_rest;
        self.v_reset = v_reset;
        self.v.fill(v_rest);
        self
    }

    pub fn with_refractory(mut self, t_ref: SimTime) -> Self {
        self.t_ref = t_ref;
        self
    }

    pub fn spike(&self) -> &Tensor {
        &self.spike
    }

    /// Step size this population was configured with.
    pub fn dt(&self) -> SimTime {
        self.dt
    }
}

impl FromParams for Lif {
    const KIND: &'static str = "Lif";

    fn from_params(params: &Params) -> Result<Self> {
        let size = params.sizes("size")?;
        let dt = params.number_or("dt", DEFAULT_DT)?;
        let mut lif = Lif::new(&size, dt)
            .with_reset(
                params.number_or("v_rest", 0.0)?,
                params.number_or("v_reset", -5.0)?,
            )
            .with_threshold(params.number_or("v_th", 20.0)?)
            .with_refractory(params.number_or("t_ref", 0.0)?);
        lif.tau = params.number_or("tau", 10.0)?;
        lif.r = params.number_or("r", 1.0)?;
        if !(lif.tau > 0.0) {
            return Err(ProjError::param("tau", format!("must be positive, got {}", lif.tau)));
        }
        if lif.v_reset >= lif.v_th {
            return Err(ProjError::param("v_reset", "must lie below v_th"));
        }
        Ok(lif)
    }
}

impl NeuronDynamics for Lif {
    fn update(&mut self, input: &Tensor, ctx: &StepContext) -> Result<Tensor> {
        input.check_shape(self.v.shape())?;
        let v = self.v.data_mut();
        let spike = self.spike.data_mut();
        for i in 0..v.len() {
            if self.refractory[i] > 0.0 {
                self.refractory[i] -= ctx.dt;
                spike[i] = 0.0;
                continue;
            }
            let dv = (-(v[i] - self.v_rest) + self.r * input.data()[i]) / self.tau;
            v[i] += dv * ctx.dt;
            if v[i] >= self.v_th {
                v[i] = self.v_reset;
                spike[i] = 1.0;
                self.refractory[i] = self.t_ref;
            } else {
                spike[i] = 0.0;
            }
        }
        Ok(self.spike.clone())
    }

    fn output(&self) -> &Tensor {
        &self.spike
    }

    fn potential(&self) -> &Tensor {
        &self.v
    }

    fn varshape(&self) -> &[usize] {
        self.v.shape()
    }

    fn reset(&mut self) {
        self.v.fill(self.v_rest);
        self.spike.fill(0.0);
        self.refractory.iter_mut().for_each(|r| *r = 0.0);
    }
}

/// A spike generator replaying `(index, time)` events. Takes no input.
#[derive(Clone, Debug)]
pub struct ScriptedSource {
    spike: Tensor,
    potential: Tensor,
    events: Vec<(usize, SimTime)>,
    describable: bool,
}

impl ScriptedSource {
    /// Creates a source firing neuron `indices[k]` at `times[k]`.
    pub fn new(size: &[usize], indices: Vec<usize>, times: Vec<SimTime>) -> Result<Self> {
        if indices.len() != times.len() {
            return Err(ProjError::param(
                "times",
                format!("{} times for {} indices", times.len(), indices.len()),
            ));
        }
        let spike = Tensor::zeros(size);
        if let Some(&bad) = indices.iter().find(|&&i| i >= spike.len()) {
            return Err(ProjError::param("indices", format!("index {} out of range", bad)));
        }
        Ok(Self {
            potential: Tensor::zeros(size),
            spike,
            events: indices.into_iter().zip(times).collect(),
            describable: true,
        })
    }

    /// A source that never fires.
    pub fn silent(size: &[usize]) -> Self {
        Self {
            spike: Tensor::zeros(size),
            potential: Tensor::zeros(size),
            events: Vec::new(),
            describable: true,
        }
    }

    /// Withholds the output descriptor, so the source cannot be delayed.
    pub fn opaque(mut self) -> Self {
        self.describable = false;
        self
    }
}

impl FromParams for ScriptedSource {
    const KIND: &'static str = "ScriptedSource";

    fn from_params(params: &Params) -> Result<Self> {
        let size = params.sizes("size")?;
        let indices = if params.contains("indices") {
            params.sizes("indices")?
        } else {
            Vec::new()
        };
        let times = if params.contains("times") {
            params.numbers("times")?
        } else {
            Vec::new()
        };
        ScriptedSource::new(&size, indices, times)
    }
}

impl NeuronDynamics for ScriptedSource {
    fn update(&mut self, _input: &Tensor, ctx: &StepContext) -> Result<Tensor> {
        self.spike.fill(0.0);
        let half = ctx.dt / 2.0;
        let spike = self.spike.data_mut();
        for &(i, time) in &self.events {
            if (time - ctx.t).abs() < half {
                spike[i] = 1.0;
            }
        }
        Ok(self.spike.clone())
    }

    fn output(&self) -> &Tensor {
        &self.spike
    }

    fn potential(&self) -> &Tensor {
        &self.potential
    }

    fn varshape(&self) -> &[usize] {
        self.spike.shape()
    }

    fn return_info(&self) -> Option<ReturnInfo> {
        self.describable.then(|| ReturnInfo::new(self.spike.shape()))
    }

    fn accepts_input(&self) -> bool {
        false
    }

    fn reset(&mut self) {
        self.spike.fill(0.0);
    }
}

/// Outputs its drive unchanged. Handy for tracing signals through a
/// network.
#[derive(Clone, Debug)]
pub struct Relay {
    out: Tensor,
    potential: Tensor,
}

impl Relay {
    pub fn new(size: &[usize]) -> Self {
        Self {
            out: Tensor::zeros(size),
            potential: Tensor::zeros(size),
        }
    }
}

impl FromParams for Relay {
    const KIND: &'static str = "Relay";

    fn from_params(params: &Params) -> Result<Self> {
        Ok(Relay::new(&params.sizes("size")?))
    }
}

impl NeuronDynamics for Relay {
    fn update(&mut self, input: &Tensor, _ctx: &StepContext) -> Result<Tensor> {
        input.check_shape(self.out.shape())?;
        self.out.clone_from(input);
        Ok(self.out.clone())
    }

    fn output(&self) -> &Tensor {
        &self.out
    }

    fn potential(&self) -> &Tensor {
        &self.potential
    }

    fn varshape(&self) -> &[usize] {
        self.out.shape()
    }

    fn reset(&mut self) {
        self.out.fill(0.0);
    }
}
