//! The network driver.
//!
//! A [`Network`] owns populations and projections and advances them in
//! lock-step. Each step has two phases separated by a barrier:
//!
//! 1. every projection updates, in registration order, reading the outputs
//!    populations produced in the previous step;
//! 2. every population updates: before-update hooks, its dynamics under the
//!    summed input currents, after-update hooks, and finally the rotation of
//!    its output delay.
//!
//! With the `parallel` feature the second phase runs populations on the
//! rayon pool. Hooks of a single population always run in order.

use std::collections::HashMap;
use std::sync::Arc;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::dynamics::NeuronDynamics;
use crate::error::{ProjError, Result};
use crate::node::{Dynamical, Population, UpdateCounts};
use crate::projection::Projection;
use crate::tensor::Tensor;
use crate::types::{NodeId, SimTime, Step, StepContext};

/// Counters accumulated over a run.
#[derive(Clone, Debug, Default)]
pub struct NetworkStats {
    /// Total number of steps executed
    pub steps_executed: u64,
    /// Projection updates across all projections
    pub projection_updates: u64,
    /// Population updates across all populations
    pub node_updates: u64,
    /// Before- and after-update hooks run, excluding delay rotations
    pub hook_runs: u64,
    /// Output delay rotations
    pub delay_rotations: u64,
}

#[derive(Clone, Debug, Default)]
struct Activity {
    updates: u64,
    total: f64,
}

struct ProjectionEntry {
    proj: Box<dyn Projection>,
    driver: Option<NodeId>,
    updates: u64,
}

/// Populations plus the projections between them.
pub struct Network {
    dt: SimTime,
    populations: Vec<Arc<Population>>,
    index: HashMap<String, NodeId>,
    activity: Vec<Activity>,
    projections: Vec<ProjectionEntry>,
    current_step: Step,
    stats: NetworkStats,
    #[cfg(feature = "parallel")]
    num_threads: usize,
}

impl std::fmt::Debug for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Network")
            .field("dt", &self.dt)
            .field("populations", &self.populations.len())
            .field("projections", &self.projections.len())
            .field("current_step", &self.current_step)
            .finish()
    }
}

impl Network {
    /// Creates an empty network stepping by `dt`.
    pub fn new(dt: SimTime) -> Self {
        Self {
            dt,
            populations: Vec::new(),
            index: HashMap::new(),
            activity: Vec::new(),
            projections: Vec::new(),
            current_step: 0,
            stats: NetworkStats::default(),
            #[cfg(feature = "parallel")]
            num_threads: 0,
        }
    }

    /// Sets the number of worker threads (0 = rayon default).
    #[cfg(feature = "parallel")]
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.num_threads = threads;
        self
    }

    pub fn dt(&self) -> SimTime {
        self.dt
    }

    /// Adds a population and returns a handle to it.
    pub fn add_population(
        &mut self,
        name: impl Into<String>,
        dynamics: impl NeuronDynamics + 'static,
    ) -> Result<Arc<Population>> {
        self.add_boxed_population(name, Box::new(dynamics))
    }

    pub fn add_boxed_population(
        &mut self,
        name: impl Into<String>,
        dynamics: Box<dyn NeuronDynamics>,
    ) -> Result<Arc<Population>> {
        let name = name.into();
        if self.index.contains_key(&name) {
            return Err(ProjError::DuplicateName(name));
        }
        let id = self.populations.len();
        let pop = Arc::new(Population::from_boxed(id, name.as_str(), dynamics, self.dt));
        self.index.insert(name, id);
        self.populations.push(Arc::clone(&pop));
        self.activity.push(Activity::default());
        Ok(pop)
    }

    /// Adds a projection. `driver` is the population whose output is passed
    /// to the projection's `update`.
    pub fn add_projection(&mut self, proj: impl Projection + 'static, driver: Option<NodeId>) -> Result<()> {
        self.add_boxed_projection(Box::new(proj), driver)
    }

    pub fn add_boxed_projection(&mut self, proj: Box<dyn Projection>, driver: Option<NodeId>) -> Result<()> {
        if self.projections.iter().any(|e| e.proj.name() == proj.name()) {
            return Err(ProjError::DuplicateName(proj.name().to_string()));
        }
        if let Some(id) = driver {
            if id >= self.populations.len() {
                return Err(ProjError::UnknownNode(format!("#{}", id)));
            }
        } else if proj.needs_input() {
            return Err(ProjError::MissingInput(proj.name().to_string()));
        }
        self.projections.push(ProjectionEntry {
            proj,
            driver,
            updates: 0,
        });
        Ok(())
    }

    /// Looks a population up by name.
    pub fn population(&self, name: &str) -> Result<&Arc<Population>> {
        self.index
            .get(name)
            .map(|&id| &self.populations[id])
            .ok_or_else(|| ProjError::UnknownNode(name.to_string()))
    }

    pub fn population_by_id(&self, id: NodeId) -> Option<&Arc<Population>> {
        self.populations.get(id)
    }

    pub fn populations(&self) -> &[Arc<Population>] {
        &self.populations
    }

    pub fn population_count(&self) -> usize {
        self.populations.len()
    }

    pub fn projection_count(&self) -> usize {
        self.projections.len()
    }

    pub fn projection_names(&self) -> impl Iterator<Item = &str> {
        self.projections.iter().map(|e| e.proj.name())
    }

    /// The last completed step; `0` before the first step.
    pub fn current_step(&self) -> Step {
        self.current_step
    }

    /// Simulation time at the end of the last completed step.
    pub fn time(&self) -> SimTime {
        self.current_step as SimTime * self.dt
    }

    pub fn stats(&self) -> &NetworkStats {
        &self.stats
    }

    /// Executes one step.
    pub fn step(&mut self) -> Result<()> {
        let ctx = StepContext::new(self.current_step + 1, self.dt);

        self.update_projections()?;

        #[cfg(feature = "parallel")]
        let counts = self.update_populations_parallel(&ctx)?;
        #[cfg(not(feature = "parallel"))]
        let counts = self.update_populations(&ctx)?;

        for (pop, (activity, c)) in self.populations.iter().zip(self.activity.iter_mut().zip(&counts)) {
            activity.updates += 1;
            activity.total += pop.output().sum();
            self.stats.hook_runs += (c.before_hooks + c.after_hooks) as u64;
            self.stats.delay_rotations += c.delay_rotations as u64;
        }
        self.stats.node_updates += counts.len() as u64;

        self.current_step = ctx.step;
        self.stats.steps_executed += 1;
        Ok(())
    }

    fn update_projections(&mut self) -> Result<()> {
        for entry in &mut self.projections {
            let x: Option<Tensor> = entry.driver.map(|id| self.populations[id].output());
            entry.proj.update(x.as_ref())?;
            entry.updates += 1;
            self.stats.projection_updates += 1;
        }
        Ok(())
    }

    #[cfg(not(feature = "parallel"))]
    fn update_populations(&self, ctx: &StepContext) -> Result<Vec<UpdateCounts>> {
        self.populations.iter().map(|pop| pop.update(ctx)).collect()
    }

    #[cfg(feature = "parallel")]
    fn update_populations_parallel(&self, ctx: &StepContext) -> Result<Vec<UpdateCounts>> {
        self.populations.par_iter().map(|pop| pop.update(ctx)).collect()
    }

    /// Executes `steps` steps, stopping at the first error.
    pub fn run(&mut self, steps: u64) -> Result<()> {
        #[cfg(feature = "parallel")]
        if self.num_threads > 0 {
            rayon::ThreadPoolBuilder::new()
                .num_threads(self.num_threads)
                .build_global()
                .ok(); // Ignore if already configured
        }

        tracing::info!(
            steps,
            populations = self.populations.len(),
            projections = self.projections.len(),
            "running network"
        );
        for _ in 0..steps {
            self.step()?;
        }
        tracing::info!(step = self.current_step, time = self.time(), "run finished");
        Ok(())
    }

    /// Returns every population, hook, delay and accumulator to its initial
    /// state and rewinds the clock.
    pub fn reset(&mut self) {
        for pop in &self.populations {
            pop.reset();
        }
        for activity in &mut self.activity {
            *activity = Activity::default();
        }
        for entry in &mut self.projections {
            entry.proj.reset();
            entry.updates = 0;
        }
        self.current_step = 0;
        self.stats = NetworkStats::default();
    }

    /// Exports statistics as JSON.
    pub fn export_stats(&self) -> serde_json::Value {
        let mut populations = serde_json::Map::new();
        for (pop, activity) in self.populations.iter().zip(&self.activity) {
            populations.insert(
                pop.name().to_string(),
                serde_json::json!({
                    "id": pop.id(),
                    "size": pop.varshape(),
                    "updates": activity.updates,
                    "activity": activity.total,
                    "before_hooks": pop.before_hook_count(),
                    "after_hooks": pop.after_hook_count(),
                    "inputs": pop.input_count(),
                }),
            );
        }

        let mut projections = serde_json::Map::new();
        for entry in &self.projections {
            projections.insert(
                entry.proj.name().to_string(),
                serde_json::json!({
                    "variant": entry.proj.variant(),
                    "driver": entry.driver,
                    "updates": entry.updates,
                }),
            );
        }

        serde_json::json!({
            "network": {
                "current_step": self.current_step,
                "time": self.time(),
                "dt": self.dt,
                "steps_executed": self.stats.steps_executed,
                "projection_updates": self.stats.projection_updates,
                "node_updates": self.stats.node_updates,
                "hook_runs": self.stats.hook_runs,
                "delay_rotations": self.stats.delay_rotations,
                "population_count": self.populations.len(),
                "projection_count": self.projections.len(),
                "parallel": cfg!(feature = "parallel"),
            },
            "populations": populations,
            "projections": projections,
        })
    }
}
