//! Core type definitions for the projection framework.

/// Index of a discrete simulation step.
///
/// Step `0` is the state before the first update; the first call to
/// `Network::step` executes step `1`.
pub type Step = u64;

/// Continuous simulation time (e.g. milliseconds).
pub type SimTime = f64;

/// Index of a population inside its network.
pub type NodeId = usize;

/// Integration step used when a model is configured without an explicit `dt`.
pub const DEFAULT_DT: SimTime = 0.1;

/// Per-step information handed to population dynamics.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepContext {
    /// The step being executed.
    pub step: Step,
    /// Simulation time at the end of this step.
    pub t: SimTime,
    /// Integration step.
    pub dt: SimTime,
}

impl StepContext {
    pub fn new(step: Step, dt: SimTime) -> Self {
        Self {
            step,
            t: step as SimTime * dt,
            dt,
        }
    }
}
