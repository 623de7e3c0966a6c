//! Network configuration files.
//!
//! A configuration declares populations by model kind and the projections
//! between them. [`crate::builder::build_network`] turns it into a running
//! [`Network`](crate::network::Network).
//!
//! # Configuration File Structure
//!
//! ```yaml
//! simulation:
//!   dt: 0.1
//!   steps: 1000
//!   log_level: info
//!
//! populations:
//!   - name: E
//!     model: Lif
//!     params: { size: 4, tau: 10 }
//!   - name: I
//!     model: Lif
//!     params: { size: 4 }
//!
//! projections:
//!   - name: E->I
//!     variant: ProjAlignPostMg2
//!     pre: E
//!     post: I
//!     delay: { time: 0.5 }
//!     comm: { kind: OneToOne, params: { weight: 1.5 } }
//!     syn: { kind: Expon, params: { tau: 5 } }
//!     out: { kind: Cuba }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use thiserror::Error;

use crate::delay::Delay;
use crate::params::{Descriptor, Params};
use crate::types::SimTime;

/// Errors that can occur while loading or validating a configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unknown file format: {0}")]
    UnknownFormat(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Global simulation parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SimulationParams {
    /// Integration step
    #[serde(default = "default_dt")]
    pub dt: SimTime,

    /// Number of steps to run
    #[serde(default = "default_steps")]
    pub steps: u64,

    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub collect_stats: bool,
}

fn default_dt() -> SimTime {
    crate::types::DEFAULT_DT
}

fn default_steps() -> u64 {
    1000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            dt: default_dt(),
            steps: default_steps(),
            log_level: default_log_level(),
            collect_stats: false,
        }
    }
}

/// A population: a name, a neuron model kind and its parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PopulationConfig {
    pub name: String,
    pub model: String,
    #[serde(default)]
    pub params: Params,
}

/// The nine projection variants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProjectionVariant {
    VanillaProj,
    ProjAlignPostMg1,
    ProjAlignPostMg2,
    ProjAlignPost1,
    ProjAlignPost2,
    ProjAlignPreMg1,
    ProjAlignPreMg2,
    ProjAlignPre1,
    ProjAlignPre2,
}

impl ProjectionVariant {
    /// Whether the projection is stepped with its source's current output.
    pub fn is_driven(self) -> bool {
        matches!(
            self,
            ProjectionVariant::VanillaProj | ProjectionVariant::ProjAlignPostMg1 | ProjectionVariant::ProjAlignPost1
        )
    }

    pub fn takes_delay(self) -> bool {
        !self.is_driven()
    }

    pub fn takes_synapse(self) -> bool {
        self != ProjectionVariant::VanillaProj
    }

    pub fn is_pre_aligned(self) -> bool {
        matches!(
            self,
            ProjectionVariant::ProjAlignPreMg1
                | ProjectionVariant::ProjAlignPreMg2
                | ProjectionVariant::ProjAlignPre1
                | ProjectionVariant::ProjAlignPre2
        )
    }
}

impl fmt::Display for ProjectionVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A delay given either in steps or in time units.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DelayConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<SimTime>,
}

impl DelayConfig {
    pub fn steps(steps: usize) -> Self {
        Self {
            steps: Some(steps),
            time: None,
        }
    }

    pub fn time(time: SimTime) -> Self {
        Self {
            steps: None,
            time: Some(time),
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        match (self.steps, self.time) {
            (Some(_), Some(_)) => Err(ConfigError::Validation(
                "delay takes either `steps` or `time`, not both".to_string(),
            )),
            (None, Some(t)) if !t.is_finite() || t < 0.0 => Err(ConfigError::Validation(format!(
                "delay time must be finite and non-negative, got {}",
                t
            ))),
            _ => Ok(()),
        }
    }

    /// The requested delay; `None` when neither field is set.
    pub fn to_delay(&self) -> Option<Delay> {
        match (self.steps, self.time) {
            (Some(n), _) => Some(Delay::Steps(n)),
            (None, Some(t)) => Some(Delay::Time(t)),
            (None, None) => None,
        }
    }
}

/// A projection between two populations.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProjectionConfig {
    pub name: String,
    pub variant: ProjectionVariant,
    pub pre: String,
    pub post: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<DelayConfig>,
    pub comm: Descriptor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub syn: Option<Descriptor>,
    pub out: Descriptor,
}

impl ProjectionConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.variant.takes_synapse() && self.syn.is_none() {
            return Err(ConfigError::Validation(format!(
                "Projection `{}` ({}) requires a synapse",
                self.name, self.variant
            )));
        }
        if !self.variant.takes_synapse() && self.syn.is_some() {
            tracing::warn!("Projection `{}` is a {} and has `syn` set (ignored)", self.name, self.variant);
        }
        if let Some(ref delay) = self.delay {
            delay.validate()?;
            if !self.variant.takes_delay() {
                tracing::warn!("Projection `{}` is a {} and has `delay` set (ignored)", self.name, self.variant);
            }
        }
        Ok(())
    }

    /// The delay this projection is built with.
    pub fn delay(&self) -> Option<Delay> {
        if self.variant.takes_delay() {
            self.delay.as_ref().and_then(DelayConfig::to_delay)
        } else {
            None
        }
    }
}

/// Complete network configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SimConfig {
    #[serde(default)]
    pub simulation: SimulationParams,

    #[serde(default)]
    pub populations: Vec<PopulationConfig>,

    #[serde(default)]
    pub projections: Vec<ProjectionConfig>,
}

impl SimConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parses and validates a YAML configuration.
    pub fn from_yaml(yaml: &str) -> ConfigResult<Self> {
        let config: SimConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parses and validates a JSON configuration.
    pub fn from_json(json: &str) -> ConfigResult<Self> {
        let config: SimConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a configuration file, picking the format from its extension.
    pub fn from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        match ext.to_lowercase().as_str() {
            "yaml" | "yml" => Self::from_yaml_file(path),
            "json" => Self::from_json_file(path),
            _ => Err(ConfigError::UnknownFormat(ext.to_string())),
        }
    }

    /// Checks names, references, delays and per-variant fields.
    pub fn validate(&self) -> ConfigResult<()> {
        if !(self.simulation.dt > 0.0) || !self.simulation.dt.is_finite() {
            return Err(ConfigError::Validation(format!(
                "dt must be positive, got {}",
                self.simulation.dt
            )));
        }

        let mut names = HashSet::new();
        for pop in &self.populations {
            if !names.insert(pop.name.as_str()) {
                return Err(ConfigError::Validation(format!("Duplicate population: {}", pop.name)));
            }
        }

        let mut proj_names = HashSet::new();
        for proj in &self.projections {
            if !proj_names.insert(proj.name.as_str()) {
                return Err(ConfigError::Validation(format!("Duplicate projection: {}", proj.name)));
            }
            for end in [&proj.pre, &proj.post] {
                if !names.contains(end.as_str()) {
                    return Err(ConfigError::Validation(format!(
                        "Projection `{}` references non-existent population: {}",
                        proj.name, end
                    )));
                }
            }
            proj.validate()?;
        }

        Ok(())
    }

    pub fn to_yaml_file<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        std::fs::write(path, self.to_yaml()?)?;
        Ok(())
    }

    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn to_yaml(&self) -> ConfigResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn to_json(&self) -> ConfigResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn find_population(&self, name: &str) -> Option<&PopulationConfig> {
        self.populations.iter().find(|p| p.name == name)
    }

    pub fn find_projection(&self, name: &str) -> Option<&ProjectionConfig> {
        self.projections.iter().find(|p| p.name == name)
    }
}

/// Builder for creating a [`SimConfig`] programmatically.
#[derive(Default)]
pub struct SimConfigBuilder {
    config: SimConfig,
}

impl SimConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dt(mut self, dt: SimTime) -> Self {
        self.config.simulation.dt = dt;
        self
    }

    pub fn steps(mut self, steps: u64) -> Self {
        self.config.simulation.steps = steps;
        self
    }

    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.simulation.log_level = level.into();
        self
    }

    pub fn collect_stats(mut self, enable: bool) -> Self {
        self.config.simulation.collect_stats = enable;
        self
    }

    pub fn population(mut self, name: impl Into<String>, model: impl Into<String>, params: Params) -> Self {
        self.config.populations.push(PopulationConfig {
            name: name.into(),
            model: model.into(),
            params,
        });
        self
    }

    pub fn projection(mut self, proj: ProjectionConfig) -> Self {
        self.config.projections.push(proj);
        self
    }

    /// Validates and returns the configuration.
    pub fn build(self) -> ConfigResult<SimConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
