//! Populations and the node capability traits.
//!
//! A [`Population`] wraps a set of [`NeuronDynamics`] and owns everything
//! projections attach to it: its hook registry, its input registry and, once
//! some projection asks for one, the delay buffer over its own output.
//!
//! The capability traits split what a projection may ask of a node:
//!
//! - [`HookHost`]: register before/after-update hooks.
//! - [`DelaySupport`]: describe its output so it can be delayed.
//! - [`ReceiveInput`]: accept input functions into its drive.
//!
//! Projections bound on these traits instead of on `Population` directly.

use parking_lot::{Mutex, MutexGuard, RwLock};

use crate::dynamics::{NeuronDynamics, Shared, SynOutput};
use crate::error::{ProjError, Result};
use crate::hooks::{HookRegistry, NodeHook};
use crate::info::ReturnInfo;
use crate::input::InputRegistry;
use crate::tensor::Tensor;
use crate::types::{NodeId, SimTime, StepContext};

/// Anything with a stable name and a step size.
pub trait Dynamical {
    fn name(&self) -> &str;

    fn dt(&self) -> SimTime;
}

/// Nodes owning a hook registry.
pub trait HookHost: Dynamical {
    fn hooks(&self) -> MutexGuard<'_, HookRegistry<NodeHook>>;
}

/// Nodes whose output can be delayed.
pub trait DelaySupport: HookHost {
    /// Describes the node's output so a delay buffer can be sized for it.
    fn return_info(&self) -> Result<ReturnInfo>;
}

/// Nodes accepting input functions.
pub trait ReceiveInput: HookHost {
    /// Checks that an input function named `name` could be added, without
    /// adding it.
    fn check_input(&self, name: &str) -> Result<()>;

    fn add_input_function(&self, name: &str, out: Shared<dyn SynOutput>) -> Result<()>;
}

/// A population node.
pub struct Population {
    id: NodeId,
    name: String,
    dt: SimTime,
    dynamics: Mutex<Box<dyn NeuronDynamics>>,
    output: RwLock<Tensor>,
    hooks: Mutex<HookRegistry<NodeHook>>,
    inputs: Mutex<InputRegistry>,
}

impl std::fmt::Debug for Population {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Population")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("dt", &self.dt)
            .finish()
    }
}

/// Hook counts after one update, for statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UpdateCounts {
    pub before_hooks: usize,
    pub after_hooks: usize,
    pub delay_rotations: usize,
}

impl Population {
    pub fn new(id: NodeId, name: impl Into<String>, dynamics: impl NeuronDynamics + 'static, dt: SimTime) -> Self {
        Self::from_boxed(id, name, Box::new(dynamics), dt)
    }

    pub fn from_boxed(id: NodeId, name: impl Into<String>, dynamics: Box<dyn NeuronDynamics>, dt: SimTime) -> Self {
        let output = dynamics.output().clone();
        Self {
            id,
            name: name.into(),
            dt,
            dynamics: Mutex::new(dynamics),
            output: RwLock::new(output),
            hooks: Mutex::new(HookRegistry::new()),
            inputs: Mutex::new(InputRegistry::new()),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    /// The output written by the latest update.
    pub fn output(&self) -> Tensor {
        self.output.read().clone()
    }

    pub fn potential(&self) -> Tensor {
        self.dynamics.lock().potential().clone()
    }

    pub fn varshape(&self) -> Vec<usize> {
        self.dynamics.lock().varshape().to_vec()
    }

    pub fn accepts_input(&self) -> bool {
        self.dynamics.lock().accepts_input()
    }

    pub fn before_hook_count(&self) -> usize {
        self.hooks.lock().before().len()
    }

    pub fn after_hook_count(&self) -> usize {
        self.hooks.lock().after().len()
    }

    pub fn input_count(&self) -> usize {
        self.inputs.lock().len()
    }

    pub fn input_names(&self) -> Vec<String> {
        self.inputs.lock().names().map(str::to_string).collect()
    }

    /// Advances the population by one step.
    ///
    /// Order: before-update hooks, the dynamics under the summed input
    /// currents, then after-update hooks with output delays rotating last.
    pub fn update(&self, ctx: &StepContext) -> Result<UpdateCounts> {
        let (before, after) = {
            let hooks = self.hooks.lock();
            (hooks.before().snapshot(), hooks.after().snapshot())
        };

        {
            let output = self.output.read();
            for hook in &before {
                hook.run(&output)?;
            }
        }

        let output = {
            let mut dynamics = self.dynamics.lock();
            let drive = self
                .inputs
                .lock()
                .sum_currents(dynamics.potential(), dynamics.varshape())?;
            dynamics.update(&drive, ctx)?
        };

        let (delays, others): (Vec<_>, Vec<_>) = after.iter().partition(|h| h.is_output_delay());
        for hook in &others {
            hook.run(&output)?;
        }
        for hook in &delays {
            hook.run(&output)?;
        }
        *self.output.write() = output;

        Ok(UpdateCounts {
            before_hooks: before.len(),
            after_hooks: others.len(),
            delay_rotations: delays.len(),
        })
    }

    /// Resets the dynamics, every hook and every input function.
    pub fn reset(&self) {
        let output = {
            let mut dynamics = self.dynamics.lock();
            dynamics.reset();
            dynamics.output().clone()
        };
        *self.output.write() = output;

        let hooks = self.hooks.lock();
        for hook in hooks.before().iter().chain(hooks.after().iter()) {
            hook.reset();
        }
        self.inputs.lock().reset();
    }
}

impl Dynamical for Population {
    fn name(&self) -> &str {
        &self.name
    }

    fn dt(&self) -> SimTime {
        self.dt
    }
}

impl HookHost for Population {
    fn hooks(&self) -> MutexGuard<'_, HookRegistry<NodeHook>> {
        self.hooks.lock()
    }
}

impl DelaySupport for Population {
    fn return_info(&self) -> Result<ReturnInfo> {
        self.dynamics
            .lock()
            .return_info()
            .ok_or_else(|| ProjError::capability("pre", self.name.as_str(), "delayed output"))
    }
}

impl ReceiveInput for Population {
    fn check_input(&self, name: &str) -> Result<()> {
        if !self.accepts_input() {
            return Err(ProjError::capability("post", self.name.as_str(), "input functions"));
        }
        if self.inputs.lock().has(name) {
            return Err(ProjError::DuplicateInput(name.to_string()));
        }
        Ok(())
    }

    fn add_input_function(&self, name: &str, out: Shared<dyn SynOutput>) -> Result<()> {
        self.check_input(name)?;
        self.inputs.lock().add(name, out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delay::DelayBuffer;
    use crate::dynamics::shared;
    use crate::error::ErrorKind;
    use crate::hooks::HookKey;

    /// Output equals the accumulated drive.
    struct Integrator {
        v: Tensor,
        open: bool,
    }

    impl NeuronDynamics for Integrator {
        fn update(&mut self, input: &Tensor, _ctx: &StepContext) -> Result<Tensor> {
            self.v.add_assign(input)?;
            Ok(self.v.clone())
        }

        fn output(&self) -> &Tensor {
            &self.v
        }

        fn potential(&self) -> &Tensor {
            &self.v
        }

        fn varshape(&self) -> &[usize] {
            self.v.shape()
        }

        fn return_info(&self) -> Option<ReturnInfo> {
            self.open.then(|| ReturnInfo::new(self.v.shape()))
        }

        fn accepts_input(&self) -> bool {
            self.open
        }

        fn reset(&mut self) {
            self.v.fill(0.0);
        }
    }

    struct Fixed(Tensor);

    impl SynOutput for Fixed {
        fn bind_cond(&mut self, cond: &Tensor) -> Result<()> {
            self.0 = cond.clone();
            Ok(())
        }

        fn current(&self, _potential: &Tensor) -> Result<Tensor> {
            Ok(self.0.clone())
        }

        fn reset(&mut self) {}
    }

    fn population(open: bool) -> Population {
        Population::new(
            0,
            "P",
            Integrator {
                v: Tensor::zeros(&[1]),
                open,
            },
            0.1,
        )
    }

    #[test]
    fn test_update_sums_inputs() {
        let pop = population(true);
        pop.add_input_function("a", shared(Fixed(Tensor::vector(vec![1.0]))))
            .unwrap();
        pop.add_input_function("b", shared(Fixed(Tensor::vector(vec![2.0]))))
            .unwrap();

        pop.update(&StepContext::new(0, 0.1)).unwrap();
        assert_eq!(pop.output().data(), &[3.0]);
        pop.update(&StepContext::new(1, 0.1)).unwrap();
        assert_eq!(pop.output().data(), &[6.0]);
        assert_eq!(pop.input_names(), vec!["a", "b"]);
    }

    #[test]
    fn test_output_delay_rotates_once_per_step() {
        let pop = population(true);
        pop.add_input_function("a", shared(Fixed(Tensor::vector(vec![1.0]))))
            .unwrap();
        let delay = shared(DelayBuffer::new(&pop.return_info().unwrap(), pop.dt()).unwrap());
        pop.hooks()
            .add_after(HookKey::OutputDelay, NodeHook::OutputDelay(delay.clone()))
            .unwrap();

        for step in 0..3 {
            let counts = pop.update(&StepContext::new(step, 0.1)).unwrap();
            assert_eq!(counts.delay_rotations, 1);
        }
        assert_eq!(delay.lock().rotations(), 3);
        assert_eq!(delay.lock().latest().data(), &[3.0]);

        pop.reset();
        assert_eq!(pop.output().data(), &[0.0]);
        assert_eq!(delay.lock().rotations(), 0);
    }

    #[test]
    fn test_capabilities_checked_at_runtime() {
        let closed = population(false);
        let err = closed.return_info().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Capability);

        let err = closed
            .add_input_function("a", shared(Fixed(Tensor::zeros(&[1]))))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Capability);
        assert_eq!(closed.input_count(), 0);
    }
}
