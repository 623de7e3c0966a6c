//! Model factory registry for configuration-driven network setup.
//!
//! Models are registered under a kind name and later built from a
//! [`Params`] record. Synapse and output kinds produce [`ParamDesc`]
//! descriptors rather than instances, so managed projections can key shared
//! units on them.
//!
//! # Example
//!
//! ```
//! use synalign::registry::ModelRegistry;
//! use synalign::models::{Expon, Lif};
//! use synalign::params::Params;
//!
//! let mut registry = ModelRegistry::new();
//! registry.register_neuron_model::<Lif>();
//! registry.register_synapse_model::<Expon>();
//!
//! let params = Params::new().with("size", 4usize);
//! let lif = registry.create_neuron("Lif", &params).unwrap().unwrap();
//! assert_eq!(lif.varshape(), &[4]);
//!
//! let syn = registry.post_synapse("Expon", params.with("tau", 5.0)).unwrap();
//! assert_eq!(syn.identity().kind, "Expon");
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use crate::dynamics::{AlignPostSynapse, Comm, NeuronDynamics, ParamDesc, PreSynapse, SynOutput};
use crate::error::Result;
use crate::params::{FromParams, Params};

/// Builds a population's dynamics from parameters.
pub type NeuronFactory = Arc<dyn Fn(&Params) -> Result<Box<dyn NeuronDynamics>> + Send + Sync>;

/// Builds a communication operator from parameters.
pub type CommFactory = Arc<dyn Fn(&Params) -> Result<Box<dyn Comm>> + Send + Sync>;

type DescFactory<T> = Arc<dyn Fn(Params) -> ParamDesc<T> + Send + Sync>;

fn post_desc<S>() -> DescFactory<dyn AlignPostSynapse>
where
    S: AlignPostSynapse + FromParams + 'static,
{
    Arc::new(|p: Params| ParamDesc::<dyn AlignPostSynapse>::of::<S>(p))
}

fn pre_desc<S>() -> DescFactory<dyn PreSynapse>
where
    S: PreSynapse + FromParams + 'static,
{
    Arc::new(|p: Params| ParamDesc::<dyn PreSynapse>::of::<S>(p))
}

#[derive(Clone)]
struct SynapseFactories {
    post: Option<DescFactory<dyn AlignPostSynapse>>,
    pre: Option<DescFactory<dyn PreSynapse>>,
}

/// Name-indexed factories for every model role.
#[derive(Default)]
pub struct ModelRegistry {
    neurons: HashMap<String, NeuronFactory>,
    synapses: HashMap<String, SynapseFactories>,
    outputs: HashMap<String, DescFactory<dyn SynOutput>>,
    comms: HashMap<String, CommFactory>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a neuron factory under `kind`.
    pub fn register_neuron<F>(&mut self, kind: impl Into<String>, factory: F)
    where
        F: Fn(&Params) -> Result<Box<dyn NeuronDynamics>> + Send + Sync + 'static,
    {
        self.neurons.insert(kind.into(), Arc::new(factory));
    }

    /// Registers a neuron model under its [`FromParams::KIND`].
    pub fn register_neuron_model<N>(&mut self)
    where
        N: NeuronDynamics + FromParams + 'static,
    {
        self.register_neuron(N::KIND, |p| Ok(Box::new(N::from_params(p)?) as Box<dyn NeuronDynamics>));
    }

    /// Registers a synapse usable on both sides of the alignment.
    pub fn register_synapse_model<S>(&mut self)
    where
        S: AlignPostSynapse + PreSynapse + FromParams + 'static,
    {
        self.synapses.insert(
            S::KIND.to_string(),
            SynapseFactories {
                post: Some(post_desc::<S>()),
                pre: Some(pre_desc::<S>()),
            },
        );
    }

    /// Registers a synapse that can only be pre-aligned.
    pub fn register_pre_synapse_model<S>(&mut self)
    where
        S: PreSynapse + FromParams + 'static,
    {
        self.synapses.insert(
            S::KIND.to_string(),
            SynapseFactories {
                post: None,
                pre: Some(pre_desc::<S>()),
            },
        );
    }

    pub fn register_output_model<O>(&mut self)
    where
        O: SynOutput + FromParams + 'static,
    {
        let factory: DescFactory<dyn SynOutput> = Arc::new(|p: Params| ParamDesc::<dyn SynOutput>::of::<O>(p));
        self.outputs.insert(O::KIND.to_string(), factory);
    }

    pub fn register_comm<F>(&mut self, kind: impl Into<String>, factory: F)
    where
        F: Fn(&Params) -> Result<Box<dyn Comm>> + Send + Sync + 'static,
    {
        self.comms.insert(kind.into(), Arc::new(factory));
    }

    pub fn register_comm_model<C>(&mut self)
    where
        C: Comm + FromParams + 'static,
    {
        self.register_comm(C::KIND, |p| Ok(Box::new(C::from_params(p)?) as Box<dyn Comm>));
    }

    /// Builds a population's dynamics.
    ///
    /// Returns `None` if `kind` is not registered.
    pub fn create_neuron(&self, kind: &str, params: &Params) -> Option<Result<Box<dyn NeuronDynamics>>> {
        self.neurons.get(kind).map(|f| f(params))
    }

    pub fn create_comm(&self, kind: &str, params: &Params) -> Option<Result<Box<dyn Comm>>> {
        self.comms.get(kind).map(|f| f(params))
    }

    /// Descriptor for a post-aligned synapse.
    pub fn post_synapse(&self, kind: &str, params: Params) -> Option<ParamDesc<dyn AlignPostSynapse>> {
        self.synapses
            .get(kind)
            .and_then(|s| s.post.as_ref())
            .map(|f| f(params))
    }

    /// Descriptor for a pre-aligned synapse.
    pub fn pre_synapse(&self, kind: &str, params: Params) -> Option<ParamDesc<dyn PreSynapse>> {
        self.synapses
            .get(kind)
            .and_then(|s| s.pre.as_ref())
            .map(|f| f(params))
    }

    pub fn output(&self, kind: &str, params: Params) -> Option<ParamDesc<dyn SynOutput>> {
        self.outputs.get(kind).map(|f| f(params))
    }

    pub fn has_neuron(&self, kind: &str) -> bool {
        self.neurons.contains_key(kind)
    }

    pub fn has_synapse(&self, kind: &str) -> bool {
        self.synapses.contains_key(kind)
    }

    pub fn has_output(&self, kind: &str) -> bool {
        self.outputs.contains_key(kind)
    }

    pub fn has_comm(&self, kind: &str) -> bool {
        self.comms.contains_key(kind)
    }

    /// Total number of registered kinds across all roles.
    pub fn len(&self) -> usize {
        self.neurons.len() + self.synapses.len() + self.outputs.len() + self.comms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes `kind` from every role. Returns whether anything was removed.
    pub fn unregister(&mut self, kind: &str) -> bool {
        let removed = [
            self.neurons.remove(kind).is_some(),
            self.synapses.remove(kind).is_some(),
            self.outputs.remove(kind).is_some(),
            self.comms.remove(kind).is_some(),
        ];
        removed.iter().any(|&r| r)
    }
}

impl std::fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn sorted(mut keys: Vec<&String>) -> Vec<&String> {
            keys.sort();
            keys
        }
        f.debug_struct("ModelRegistry")
            .field("neurons", &sorted(self.neurons.keys().collect()))
            .field("synapses", &sorted(self.synapses.keys().collect()))
            .field("outputs", &sorted(self.outputs.keys().collect()))
            .field("comms", &sorted(self.comms.keys().collect()))
            .finish()
    }
}

/// Creates a registry with the reference models of [`crate::models`].
pub fn create_default_registry() -> ModelRegistry {
    use crate::models::{AllToAll, Coba, Cuba, Dense, DualExpon, Expon, Lif, OneToOne, Relay, ScriptedSource};

    let mut registry = ModelRegistry::new();

    registry.register_neuron_model::<Lif>();
    registry.register_neuron_model::<ScriptedSource>();
    registry.register_neuron_model::<Relay>();

    registry.register_synapse_model::<Expon>();
    registry.register_synapse_model::<DualExpon>();

    registry.register_output_model::<Cuba>();
    registry.register_output_model::<Coba>();

    registry.register_comm_model::<OneToOne>();
    registry.register_comm_model::<AllToAll>();
    registry.register_comm_model::<Dense>();

    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Cuba, Relay};
    use crate::tensor::Tensor;

    #[test]
    fn test_registry_basic() {
        let mut registry = ModelRegistry::new();
        assert!(registry.is_empty());

        registry.register_neuron_model::<Relay>();
        registry.register_output_model::<Cuba>();
        assert_eq!(registry.len(), 2);
        assert!(registry.has_neuron("Relay"));
        assert!(!registry.has_neuron("Cuba"));
        assert!(registry.has_output("Cuba"));
    }

    #[test]
    fn test_create_unknown_kind() {
        let registry = create_default_registry();
        assert!(registry.create_neuron("Izhikevich", &Params::new()).is_none());
        assert!(registry.post_synapse("Cuba", Params::new()).is_none());
    }

    #[test]
    fn test_create_propagates_param_errors() {
        let registry = create_default_registry();
        let result = registry.create_neuron("Lif", &Params::new()).unwrap();
        assert!(result.is_err());
    }

    #[test]
    fn test_custom_factory() {
        let mut registry = ModelRegistry::new();
        registry.register_neuron("Pair", |_| Ok(Box::new(Relay::new(&[2])) as Box<dyn NeuronDynamics>));
        let relay = registry.create_neuron("Pair", &Params::new()).unwrap().unwrap();
        assert_eq!(relay.varshape(), &[2]);
    }

    #[test]
    fn test_descriptors_build_instances() {
        let registry = create_default_registry();
        let out = registry.output("Coba", Params::new().with("E", 0.0)).unwrap();
        let out = out.build().unwrap();
        out.lock().bind_cond(&Tensor::vector(vec![1.0])).unwrap();
        assert_eq!(out.lock().current(&Tensor::vector(vec![-10.0])).unwrap().data(), &[10.0]);

        let comm = registry
            .create_comm("OneToOne", &Params::new().with("weight", 3.0))
            .unwrap()
            .unwrap();
        assert_eq!(comm.apply(&Tensor::vector(vec![1.0])).unwrap().data(), &[3.0]);
    }

    #[test]
    fn test_default_registry() {
        let registry = create_default_registry();
        assert!(registry.has_neuron("Lif"));
        assert!(registry.has_neuron("ScriptedSource"));
        assert!(registry.has_synapse("DualExpon"));
        assert!(registry.pre_synapse("Expon", Params::new()).is_some());
        assert!(registry.has_comm("Dense"));
        assert_eq!(registry.len(), 10);
    }

    #[test]
    fn test_unregister() {
        let mut registry = create_default_registry();
        assert!(registry.unregister("Expon"));
        assert!(!registry.has_synapse("Expon"));
        assert!(!registry.unregister("Expon"));
    }
}
