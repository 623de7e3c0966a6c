//! Role capabilities of the collaborators a projection wires together.
//!
//! Each trait is one capability. A projection variant names exactly the set
//! it needs in its constructor signature, so a collaborator lacking a role is
//! rejected by the type checker rather than discovered at step time.
//!
//! Collaborators that are shared between projections, hooks and input
//! registries travel as [`Shared`] handles.

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::info::ReturnInfo;
use crate::params::{Descriptor, FromParams, Params};
use crate::tensor::Tensor;
use crate::types::StepContext;

/// A shared, lockable handle.
pub type Shared<T> = Arc<Mutex<T>>;

/// Wraps a value into a [`Shared`] handle.
pub fn shared<T>(value: T) -> Shared<T> {
    Arc::new(Mutex::new(value))
}

/// Synapse dynamics.
pub trait Synapse: Send {
    /// Advances the synapse by one step, optionally feeding `input` into it,
    /// and returns the new synaptic state.
    fn update(&mut self, input: Option<&Tensor>) -> Result<Tensor>;

    /// The current synaptic state.
    fn state(&self) -> &Tensor;

    fn reset(&mut self);
}

/// Post-aligned synapses accept currents accumulated by many projections
/// between two updates.
pub trait AlignPostSynapse: Synapse {
    fn add_current(&mut self, current: &Tensor) -> Result<()>;
}

/// Units that can describe their output ahead of time, so a delay buffer can
/// be sized for them.
pub trait DelayedOutput {
    fn return_info(&self) -> ReturnInfo;
}

/// Pre-aligned synapses: stepped with the source signal and delayable.
pub trait PreSynapse: Synapse + DelayedOutput {}

impl<T: Synapse + DelayedOutput + ?Sized> PreSynapse for T {}

/// The output accumulator bound into a destination population.
pub trait SynOutput: Send {
    /// Binds the conductance computed for the current step.
    fn bind_cond(&mut self, cond: &Tensor) -> Result<()>;

    /// Converts the bound conductance into an input current given the
    /// destination's membrane potential.
    fn current(&self, potential: &Tensor) -> Result<Tensor>;

    fn reset(&mut self);
}

/// The communication operator mapping pre-synaptic activity to
/// post-synaptic input.
pub trait Comm: Send {
    fn apply(&self, input: &Tensor) -> Result<Tensor>;
}

/// Population dynamics.
pub trait NeuronDynamics: Send {
    /// Advances the population by one step under the external drive `input`
    /// and returns its new output.
    fn update(&mut self, input: &Tensor, ctx: &StepContext) -> Result<Tensor>;

    /// The most recent output.
    fn output(&self) -> &Tensor;

    /// The membrane potential consulted by conductance-based outputs.
    fn potential(&self) -> &Tensor;

    /// Shape of the population's state.
    fn varshape(&self) -> &[usize];

    /// Output descriptor, if this population can feed a delay buffer.
    fn return_info(&self) -> Option<ReturnInfo> {
        Some(ReturnInfo::new(self.varshape()))
    }

    /// Whether this population consumes external input.
    fn accepts_input(&self) -> bool {
        true
    }

    fn reset(&mut self);
}

/// Converts a concrete unit into a trait-object handle.
pub trait IntoShared<T: ?Sized> {
    fn into_shared(self) -> Shared<T>;
}

impl<S: Synapse + 'static> IntoShared<dyn Synapse> for S {
    fn into_shared(self) -> Shared<dyn Synapse> {
        shared(self)
    }
}

impl<S: AlignPostSynapse + 'static> IntoShared<dyn AlignPostSynapse> for S {
    fn into_shared(self) -> Shared<dyn AlignPostSynapse> {
        shared(self)
    }
}

impl<S: PreSynapse + 'static> IntoShared<dyn PreSynapse> for S {
    fn into_shared(self) -> Shared<dyn PreSynapse> {
        shared(self)
    }
}

impl<O: SynOutput + 'static> IntoShared<dyn SynOutput> for O {
    fn into_shared(self) -> Shared<dyn SynOutput> {
        shared(self)
    }
}

type BuildFn<T> = Arc<dyn Fn(&Params) -> Result<Shared<T>> + Send + Sync>;

/// A parameter descriptor that can build fresh instances on demand.
///
/// Managed projections receive descriptors instead of instances: the first
/// projection to register a descriptor against a node builds the unit, every
/// later projection with an equal [`Descriptor`] reuses it.
pub struct ParamDesc<T: ?Sized> {
    identity: Descriptor,
    build: BuildFn<T>,
}

impl<T: ?Sized> Clone for ParamDesc<T> {
    fn clone(&self) -> Self {
        Self {
            identity: self.identity.clone(),
            build: Arc::clone(&self.build),
        }
    }
}

impl<T: ?Sized> fmt::Debug for ParamDesc<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParamDesc")
            .field("identity", &self.identity)
            .finish()
    }
}

impl<T: ?Sized> ParamDesc<T> {
    /// Creates a descriptor from a kind tag, parameters and a constructor.
    pub fn new<S, F>(kind: impl Into<String>, params: Params, build: F) -> Self
    where
        S: IntoShared<T>,
        F: Fn(&Params) -> Result<S> + Send + Sync + 'static,
    {
        Self {
            identity: Descriptor::new(kind, params),
            build: Arc::new(move |p| build(p).map(IntoShared::into_shared)),
        }
    }

    /// Creates a descriptor for a model implementing [`FromParams`].
    pub fn of<S>(params: Params) -> Self
    where
        S: FromParams + IntoShared<T> + 'static,
    {
        Self::new(S::KIND, params, S::from_params)
    }

    pub fn identity(&self) -> &Descriptor {
        &self.identity
    }

    /// Builds a fresh instance.
    pub fn build(&self) -> Result<Shared<T>> {
        (self.build)(&self.identity.params)
    }
}
