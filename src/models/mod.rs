//! Reference model implementations.
//!
//! These implement the collaborator traits of [`crate::dynamics`] with the
//! simplest reasonable equations. They are what the default model registry
//! builds from configuration files, and what the tests drive networks with.
//!
//! # Available Models
//!
//! ## Populations
//! - [`Lif`] - Leaky integrate-and-fire neurons
//! - [`ScriptedSource`] - Emits spikes at scheduled times, takes no input
//! - [`Relay`] - Outputs its drive unchanged
//!
//! ## Synapses
//! - [`Expon`] - Single exponential decay
//! - [`DualExpon`] - Rise and decay time constants
//!
//! ## Outputs
//! - [`Cuba`] - Current-based
//! - [`Coba`] - Conductance-based with a reversal potential
//!
//! ## Communication
//! - [`OneToOne`] - Element-wise scaling
//! - [`AllToAll`] - Uniform dense coupling
//! - [`Dense`] - Explicit weight matrix

pub mod comms;
pub mod neurons;
pub mod outputs;
pub mod synapses;

pub use comms::{AllToAll, Dense, OneToOne};
pub use neurons::{Lif, Relay, ScriptedSource};
pub use outputs::{Coba, Cuba};
pub use synapses::{DualExpon, Expon};
