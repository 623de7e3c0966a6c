//! Alignment units.
//!
//! These are the shared composites that projections register on nodes:
//!
//! - [`AlignPre`] steps a synapse with the source signal and optionally
//!   delays the synaptic output. Lives on the source node.
//! - [`AlignPost`] steps a synapse that collects currents from many
//!   projections and binds the result into an output accumulator. Lives on
//!   the destination node.
//! - [`AlignPreMerge`] steps a synapse with one tap of a delay buffer. Lives
//!   on the delay buffer itself.

use crate::delay::{Delay, DelayBuffer};
use crate::dynamics::{AlignPostSynapse, PreSynapse, Shared, SynOutput};
use crate::error::{ProjError, Result};
use crate::tensor::Tensor;
use crate::types::SimTime;

/// A synapse stepped with the source signal, optionally followed by a delay
/// over the synaptic output.
pub struct AlignPre {
    syn: Shared<dyn PreSynapse>,
    delay: Option<DelayBuffer>,
    last: Tensor,
}

impl AlignPre {
    pub fn new(syn: Shared<dyn PreSynapse>, delay: Option<DelayBuffer>) -> Self {
        let last = syn.lock().state().clone();
        Self { syn, delay, last }
    }

    /// Creates a unit whose delay buffer is sized from the synapse's return
    /// descriptor.
    pub fn delayed(syn: Shared<dyn PreSynapse>, dt: SimTime) -> Result<Self> {
        let info = syn.lock().return_info();
        let delay = DelayBuffer::new(&info, dt)?;
        Ok(Self::new(syn, Some(delay)))
    }

    /// Steps the synapse with `x` and pushes the result into the delay.
    pub fn update(&mut self, x: &Tensor) -> Result<Tensor> {
        let g = self.syn.lock().update(Some(x))?;
        if let Some(delay) = self.delay.as_mut() {
            delay.update(&g)?;
        }
        self.last.clone_from(&g);
        Ok(g)
    }

    /// Registers a tap on the synaptic-output delay.
    pub fn register_entry(&mut self, tap: &str, delay: Option<Delay>) -> Result<Option<usize>> {
        match self.delay.as_mut() {
            Some(buffer) => buffer.register_entry(tap, delay),
            None => Err(ProjError::capability("alignment unit", tap, "delayed output")),
        }
    }

    /// Validates a tap against the synaptic-output delay without
    /// registering it.
    pub fn check_entry(&self, tap: &str, delay: Option<Delay>) -> Result<Option<usize>> {
        match self.delay.as_ref() {
            Some(buffer) => buffer.check_entry(tap, delay),
            None => Err(ProjError::capability("alignment unit", tap, "delayed output")),
        }
    }

    /// Reads a tap of the synaptic-output delay.
    pub fn at(&self, tap: &str) -> Result<Tensor> {
        match self.delay.as_ref() {
            Some(buffer) => buffer.at(tap).cloned(),
            None => Err(ProjError::UnknownTap(tap.to_string())),
        }
    }

    /// The most recent synaptic output.
    pub fn last(&self) -> &Tensor {
        &self.last
    }

    pub fn syn(&self) -> &Shared<dyn PreSynapse> {
        &self.syn
    }

    pub fn delay(&self) -> Option<&DelayBuffer> {
        self.delay.as_ref()
    }

    pub fn reset(&mut self) {
        let mut syn = self.syn.lock();
        syn.reset();
        self.last = syn.state().clone();
        drop(syn);
        if let Some(delay) = self.delay.as_mut() {
            delay.reset();
        }
    }
}

/// A current-collecting synapse bound into an output accumulator.
pub struct AlignPost {
    syn: Shared<dyn AlignPostSynapse>,
    out: Shared<dyn SynOutput>,
}

impl AlignPost {
    pub fn new(syn: Shared<dyn AlignPostSynapse>, out: Shared<dyn SynOutput>) -> Self {
        Self { syn, out }
    }

    /// Steps the synapse over the currents collected since the last update
    /// and binds the resulting conductance.
    pub fn update(&mut self) -> Result<()> {
        let g = self.syn.lock().update(None)?;
        self.out.lock().bind_cond(&g)
    }

    /// Forwards a current into the synapse.
    pub fn add_current(&mut self, current: &Tensor) -> Result<()> {
        self.syn.lock().add_current(current)
    }

    pub fn syn(&self) -> &Shared<dyn AlignPostSynapse> {
        &self.syn
    }

    pub fn out(&self) -> &Shared<dyn SynOutput> {
        &self.out
    }

    pub fn reset(&mut self) {
        self.syn.lock().reset();
    }
}

/// A synapse fed from one tap of a delay buffer.
///
/// The unit is registered as an after-update hook of the buffer it reads, so
/// it is stepped once per rotation no matter how many projections consume
/// its value.
pub struct AlignPreMerge {
    tap: String,
    syn: Shared<dyn PreSynapse>,
    last: Tensor,
}

impl AlignPreMerge {
    pub fn new(tap: impl Into<String>, syn: Shared<dyn PreSynapse>) -> Self {
        let last = syn.lock().state().clone();
        Self {
            tap: tap.into(),
            syn,
            last,
        }
    }

    pub fn update(&mut self, buffer: &DelayBuffer) -> Result<()> {
        let x = buffer.at_merge(&self.tap)?;
        self.last = self.syn.lock().update(Some(x))?;
        Ok(())
    }

    /// The synaptic output computed on the latest rotation.
    pub fn value(&self) -> &Tensor {
        &self.last
    }

    pub fn tap(&self) -> &str {
        &self.tap
    }

    pub fn syn(&self) -> &Shared<dyn PreSynapse> {
        &self.syn
    }

    pub fn reset(&mut self) {
        let mut syn = self.syn.lock();
        syn.reset();
        self.last = syn.state().clone();
    }
}
