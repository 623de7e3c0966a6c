//! # synalign
//!
//! Synaptic projections for discrete-time spiking network simulation, with
//! alignment and sharing of synapse state.
//!
//! A projection moves activity from a source population to a destination
//! population through a communication operator, a synapse and an output
//! accumulator. Where the synapse lives decides how much work is shared:
//!
//! - **Post-aligned** synapses are dimensioned by the destination. Every
//!   projection into the same destination with an identical synapse
//!   configuration feeds one shared synapse, which is stepped once.
//! - **Pre-aligned** synapses are dimensioned by the source. Every
//!   projection out of the same source with an identical synapse
//!   configuration reads one shared synapse.
//!
//! Delays are served by one ring buffer per delayed quantity, with any
//! number of named taps at fixed offsets.
//!
//! ## Features
//!
//! - `parallel` - Update populations on the rayon thread pool
//!
//! ## Quick Start
//!
//! ```rust
//! use synalign::delay::Delay;
//! use synalign::dynamics::{AlignPostSynapse, ParamDesc, SynOutput};
//! use synalign::models::{Cuba, Expon, Lif, OneToOne, ScriptedSource};
//! use synalign::network::Network;
//! use synalign::params::Params;
//! use synalign::projection::ProjAlignPostMg2;
//!
//! let mut net = Network::new(0.1);
//! let src = net
//!     .add_population("input", ScriptedSource::new(&[4], vec![0, 1], vec![1.0, 2.0]).unwrap())
//!     .unwrap();
//! let exc = net.add_population("E", Lif::new(&[4], 0.1)).unwrap();
//!
//! let syn: ParamDesc<dyn AlignPostSynapse> =
//!     ParamDesc::of::<Expon>(Params::new().with("size", 4usize).with("tau", 5.0));
//! let out: ParamDesc<dyn SynOutput> = ParamDesc::of::<Cuba>(Params::new());
//! let proj = ProjAlignPostMg2::new(
//!     "input->E",
//!     &*src,
//!     Some(Delay::Time(0.5)),
//!     Box::new(OneToOne::new(2.0)),
//!     &syn,
//!     &out,
//!     &*exc,
//! )
//! .unwrap();
//! net.add_projection(proj, None).unwrap();
//!
//! net.run(100).unwrap();
//! println!("{}", net.export_stats()["network"]);
//! ```
//!
//! ## Configuration-Driven Setup
//!
//! ```rust,ignore
//! use synalign::{build_network, create_default_registry, SimConfig};
//!
//! let config = SimConfig::from_file("network.yaml")?;
//! let mut net = build_network(&config, &create_default_registry())?;
//! net.run(config.simulation.steps)?;
//! ```

pub mod types;
pub mod error;
pub mod tensor;
pub mod params;
pub mod info;
pub mod dynamics;
pub mod hooks;
pub mod delay;
pub mod align;
pub mod input;
pub mod node;
pub mod projection;
pub mod models;
pub mod network;
pub mod registry;
pub mod config;
pub mod builder;
pub mod stats;

// Re-export commonly used types
pub use types::{NodeId, SimTime, Step, StepContext};
pub use error::{ErrorKind, ProjError, Result};
pub use tensor::Tensor;
pub use params::{Descriptor, FromParams, ParamValue, Params};
pub use info::ReturnInfo;
pub use dynamics::{
    shared, AlignPostSynapse, Comm, DelayedOutput, NeuronDynamics, ParamDesc, PreSynapse, Shared, SynOutput, Synapse,
};
pub use hooks::{HookKey, HookRegistry, NodeHook};
pub use delay::{Delay, DelayBuffer};
pub use align::{AlignPost, AlignPre, AlignPreMerge};
pub use node::{DelaySupport, Dynamical, HookHost, Population, ReceiveInput};
pub use projection::{
    ProjAlignPost1, ProjAlignPost2, ProjAlignPostMg1, ProjAlignPostMg2, ProjAlignPre1, ProjAlignPre2,
    ProjAlignPreMg1, ProjAlignPreMg2, Projection, VanillaProj,
};
pub use network::{Network, NetworkStats};
pub use registry::{create_default_registry, ModelRegistry};
pub use config::{ConfigError, ProjectionConfig, ProjectionVariant, SimConfig, SimConfigBuilder};
pub use builder::{build_network, run_config, BuildError};
pub use stats::{RunStats, StatsCollector, Timer};

/// Initialize the tracing subscriber for logging.
///
/// `RUST_LOG` takes precedence over `level` when set.
///
/// # Example
///
/// ```rust,ignore
/// synalign::init_logging("debug");
/// ```
pub fn init_logging(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(cfg!(feature = "parallel"))
        .init();
}
