//! Builds a [`Network`] from a [`SimConfig`].
//!
//! Model parameters are completed before they reach the registry: every
//! population and synapse receives the network `dt`, synapses receive the
//! size of the population they live on, and communication operators receive
//! `post_size`. Explicit values in the configuration always win.

use std::sync::Arc;
use thiserror::Error;

use crate::config::{ConfigError, ProjectionConfig, ProjectionVariant, SimConfig};
use crate::dynamics::{AlignPostSynapse, ParamDesc, PreSynapse, SynOutput};
use crate::error::ProjError;
use crate::network::Network;
use crate::node::{Dynamical, Population};
use crate::params::{Descriptor, Params, ParamValue};
use crate::projection::{
    ProjAlignPost1, ProjAlignPost2, ProjAlignPostMg1, ProjAlignPostMg2, ProjAlignPre1, ProjAlignPre2,
    ProjAlignPreMg1, ProjAlignPreMg2, Projection, VanillaProj,
};
use crate::registry::ModelRegistry;
use crate::stats::{RunStats, StatsCollector};
use crate::types::SimTime;

/// Errors raised while turning a configuration into a network.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Projection(#[from] ProjError),

    #[error("unknown {role} model `{kind}`")]
    UnknownModel { role: &'static str, kind: String },

    #[error("projection `{0}` needs a synapse")]
    MissingSynapse(String),
}

fn unknown(role: &'static str, kind: &str) -> BuildError {
    BuildError::UnknownModel {
        role,
        kind: kind.to_string(),
    }
}

fn with_default(mut params: Params, key: &str, value: impl Into<ParamValue>) -> Params {
    if !params.contains(key) {
        params.insert(key, value);
    }
    params
}

/// Instantiates every population and projection of `config`.
pub fn build_network(config: &SimConfig, registry: &ModelRegistry) -> Result<Network, BuildError> {
    config.validate()?;
    let dt = config.simulation.dt;
    let mut net = Network::new(dt);

    for pop in &config.populations {
        let params = with_default(pop.params.clone(), "dt", dt);
        let dynamics = registry
            .create_neuron(&pop.model, &params)
            .ok_or_else(|| unknown("neuron", &pop.model))??;
        net.add_boxed_population(pop.name.clone(), dynamics)?;
    }

    for proj in &config.projections {
        build_projection(&mut net, proj, registry)?;
    }

    tracing::info!(
        populations = net.population_count(),
        projections = net.projection_count(),
        dt,
        "built network"
    );
    Ok(net)
}

struct Parts<'a> {
    cfg: &'a ProjectionConfig,
    registry: &'a ModelRegistry,
    dt: SimTime,
}

impl Parts<'_> {
    fn syn_params(&self, host: &Population) -> Result<(&Descriptor, Params), BuildError> {
        let syn = self
            .cfg
            .syn
            .as_ref()
            .ok_or_else(|| BuildError::MissingSynapse(self.cfg.name.clone()))?;
        let params = with_default(syn.params.clone(), "size", host.varshape());
        Ok((syn, with_default(params, "dt", self.dt)))
    }

    fn post_syn(&self, host: &Population) -> Result<ParamDesc<dyn AlignPostSynapse>, BuildError> {
        let (syn, params) = self.syn_params(host)?;
        self.registry
            .post_synapse(&syn.kind, params)
            .ok_or_else(|| unknown("post-aligned synapse", &syn.kind))
    }

    fn pre_syn(&self, host: &Population) -> Result<ParamDesc<dyn PreSynapse>, BuildError> {
        let (syn, params) = self.syn_params(host)?;
        self.registry
            .pre_synapse(&syn.kind, params)
            .ok_or_else(|| unknown("pre-aligned synapse", &syn.kind))
    }

    fn out(&self) -> Result<ParamDesc<dyn SynOutput>, BuildError> {
        let out = &self.cfg.out;
        self.registry
            .output(&out.kind, out.params.clone())
            .ok_or_else(|| unknown("output", &out.kind))
    }
}

fn build_projection(net: &mut Network, cfg: &ProjectionConfig, registry: &ModelRegistry) -> Result<(), BuildError> {
    let pre = Arc::clone(net.population(&cfg.pre)?);
    let post = Arc::clone(net.population(&cfg.post)?);
    let parts = Parts {
        cfg,
        registry,
        dt: net.dt(),
    };

    let post_size: usize = post.varshape().iter().product();
    let comm_params = with_default(cfg.comm.params.clone(), "post_size", post_size);
    let comm = registry
        .create_comm(&cfg.comm.kind, &comm_params)
        .ok_or_else(|| unknown("comm", &cfg.comm.kind))??;

    let name = cfg.name.clone();
    let delay = cfg.delay();
    let (pre, post) = (&*pre, &*post);

    let proj: Box<dyn Projection> = match cfg.variant {
        ProjectionVariant::VanillaProj => Box::new(VanillaProj::new(name, comm, parts.out()?.build()?, post)?),
        ProjectionVariant::ProjAlignPostMg1 => Box::new(ProjAlignPostMg1::new(
            name,
            comm,
            &parts.post_syn(post)?,
            &parts.out()?,
            post,
        )?),
        ProjectionVariant::ProjAlignPostMg2 => Box::new(ProjAlignPostMg2::new(
            name,
            pre,
            delay,
            comm,
            &parts.post_syn(post)?,
            &parts.out()?,
            post,
        )?),
        ProjectionVariant::ProjAlignPost1 => Box::new(ProjAlignPost1::new(
            name,
            comm,
            parts.post_syn(post)?.build()?,
            parts.out()?.build()?,
            post,
        )?),
        ProjectionVariant::ProjAlignPost2 => Box::new(ProjAlignPost2::new(
            name,
            pre,
            delay,
            comm,
            parts.post_syn(post)?.build()?,
            parts.out()?.build()?,
            post,
        )?),
        ProjectionVariant::ProjAlignPreMg1 => Box::new(ProjAlignPreMg1::new(
            name,
            pre,
            &parts.pre_syn(pre)?,
            delay,
            comm,
            parts.out()?.build()?,
            post,
        )?),
        ProjectionVariant::ProjAlignPreMg2 => Box::new(ProjAlignPreMg2::new(
            name,
            pre,
            delay,
            &parts.pre_syn(pre)?,
            comm,
            parts.out()?.build()?,
            post,
        )?),
        ProjectionVariant::ProjAlignPre1 => Box::new(ProjAlignPre1::new(
            name,
            pre,
            parts.pre_syn(pre)?.build()?,
            delay,
            comm,
            parts.out()?.build()?,
            post,
        )?),
        ProjectionVariant::ProjAlignPre2 => Box::new(ProjAlignPre2::new(
            name,
            pre,
            delay,
            parts.pre_syn(pre)?.build()?,
            comm,
            parts.out()?.build()?,
            post,
        )?),
    };

    let driver = cfg.variant.is_driven().then(|| pre.id());
    tracing::debug!(
        projection = %cfg.name,
        variant = %cfg.variant,
        pre = pre.name(),
        post = post.name(),
        "built projection"
    );
    net.add_boxed_projection(proj, driver)?;
    Ok(())
}

/// Builds the network described by `config` and runs it for
/// `config.simulation.steps` steps.
///
/// Statistics are returned when `collect_stats` is set.
pub fn run_config(config: &SimConfig, registry: &ModelRegistry) -> Result<(Network, Option<RunStats>), BuildError> {
    let mut net = build_network(config, registry)?;
    if !config.simulation.collect_stats {
        net.run(config.simulation.steps)?;
        return Ok((net, None));
    }

    let mut collector = StatsCollector::new();
    collector.start();
    net.run(config.simulation.steps)?;
    collector.update_from_json(&net.export_stats());
    collector.stop();
    Ok((net, Some(collector.into_stats())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfigBuilder;
    use crate::registry::create_default_registry;

    fn proj(name: &str, variant: ProjectionVariant, pre: &str, post: &str) -> ProjectionConfig {
        ProjectionConfig {
            name: name.to_string(),
            variant,
            pre: pre.to_string(),
            post: post.to_string(),
            delay: None,
            comm: Descriptor::new("OneToOne", Params::new()),
            syn: variant
                .takes_synapse()
                .then(|| Descriptor::new("Expon", Params::new().with("tau", 5.0))),
            out: Descriptor::new("Cuba", Params::new()),
        }
    }

    fn two_populations() -> SimConfigBuilder {
        SimConfigBuilder::new()
            .population("E", "Lif", Params::new().with("size", 3usize))
            .population("I", "Lif", Params::new().with("size", 3usize))
    }

    #[test]
    fn test_build_every_variant() {
        use ProjectionVariant::*;
        let variants = [
            VanillaProj,
            ProjAlignPostMg1,
            ProjAlignPostMg2,
            ProjAlignPost1,
            ProjAlignPost2,
            ProjAlignPreMg1,
            ProjAlignPreMg2,
            ProjAlignPre1,
            ProjAlignPre2,
        ];
        let mut builder = two_populations();
        for (i, v) in variants.iter().enumerate() {
            builder = builder.projection(proj(&format!("p{}", i), *v, "E", "I"));
        }
        let config = builder.steps(10).build().unwrap();

        let mut net = build_network(&config, &create_default_registry()).unwrap();
        assert_eq!(net.projection_count(), 9);
        net.run(10).unwrap();
        assert_eq!(net.current_step(), 10);

        let stats = net.export_stats();
        for (i, v) in variants.iter().enumerate() {
            assert_eq!(stats["projections"][format!("p{}", i)]["variant"], v.to_string());
        }
    }

    #[test]
    fn test_drivers_follow_variant() {
        let config = two_populations()
            .projection(proj("a", ProjectionVariant::ProjAlignPostMg1, "E", "I"))
            .projection(proj("b", ProjectionVariant::ProjAlignPostMg2, "E", "I"))
            .build()
            .unwrap();
        let net = build_network(&config, &create_default_registry()).unwrap();
        let stats = net.export_stats();
        assert_eq!(stats["projections"]["a"]["driver"], 0);
        assert!(stats["projections"]["b"]["driver"].is_null());
    }

    #[test]
    fn test_managed_synapses_are_shared() {
        let config = two_populations()
            .projection(proj("a", ProjectionVariant::ProjAlignPostMg2, "E", "I"))
            .projection(proj("b", ProjectionVariant::ProjAlignPostMg2, "E", "I"))
            .build()
            .unwrap();
        let net = build_network(&config, &create_default_registry()).unwrap();
        let post = net.population("I").unwrap();
        // Both projections feed the same post-aligned unit and output.
        assert_eq!(post.before_hook_count(), 1);
        assert_eq!(post.input_names(), vec!["a"]);
    }

    #[test]
    fn test_unknown_model() {
        let config = SimConfigBuilder::new()
            .population("E", "Izhikevich", Params::new())
            .build()
            .unwrap();
        let err = build_network(&config, &create_default_registry()).unwrap_err();
        assert!(matches!(err, BuildError::UnknownModel { role: "neuron", .. }));
    }

    #[test]
    fn test_capability_error_surfaces() {
        let bad = proj("p", ProjectionVariant::VanillaProj, "S", "S");
        let config = SimConfigBuilder::new()
            .population("S", "ScriptedSource", Params::new().with("size", 3usize))
            .projection(bad)
            .build()
            .unwrap();
        let err = build_network(&config, &create_default_registry()).unwrap_err();
        assert!(matches!(err, BuildError::Projection(ProjError::Capability { .. })));
    }

    #[test]
    fn test_run_config_collects_stats() {
        let config = two_populations()
            .projection(proj("E->I", ProjectionVariant::ProjAlignPost2, "E", "I"))
            .steps(20)
            .collect_stats(true)
            .build()
            .unwrap();
        let (net, stats) = run_config(&config, &create_default_registry()).unwrap();
        assert_eq!(net.current_step(), 20);
        let stats = stats.unwrap();
        assert_eq!(stats.network.steps_executed, 20);
        assert_eq!(stats.projections["E->I"].updates, 20);
    }
}
