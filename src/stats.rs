//! Run statistics and their export formats.
//!
//! [`StatsCollector`] wraps a run with a wall-clock timer and ingests the
//! JSON produced by [`Network::export_stats`](crate::network::Network::export_stats).
//! The resulting [`RunStats`] can be written as JSON, CSV or a plain-text
//! summary.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use crate::types::{SimTime, Step};

/// Aggregate statistics for one run.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RunStats {
    pub metadata: RunMetadata,
    pub network: NetworkSummary,
    pub populations: BTreeMap<String, PopulationStats>,
    pub projections: BTreeMap<String, ProjectionStats>,
    pub timing: TimingStats,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RunMetadata {
    pub name: String,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    /// Configuration file the network was built from, if any
    pub config_file: Option<String>,
}

/// Network-wide counters.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NetworkSummary {
    pub final_step: Step,
    pub final_time: SimTime,
    pub dt: SimTime,
    pub steps_executed: u64,
    pub projection_updates: u64,
    pub node_updates: u64,
    pub hook_runs: u64,
    pub delay_rotations: u64,
    pub population_count: usize,
    pub projection_count: usize,
    pub parallel: bool,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PopulationStats {
    pub size: Vec<usize>,
    pub updates: u64,
    /// Sum of every output value emitted during the run
    pub activity: f64,
    pub before_hooks: usize,
    pub after_hooks: usize,
    pub inputs: usize,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ProjectionStats {
    pub variant: String,
    pub updates: u64,
}

/// Wall-clock performance.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TimingStats {
    pub total_wall_time_ms: f64,
    pub steps_per_second: f64,
    /// Simulated time advanced per wall-clock second
    pub sim_time_per_second: f64,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.metadata.name = name.into();
        self
    }

    pub fn record_start(&mut self) {
        self.metadata.start_time = Some(timestamp());
    }

    pub fn record_end(&mut self) {
        self.metadata.end_time = Some(timestamp());
    }

    /// Derives throughput figures from the elapsed wall time.
    pub fn compute_timing(&mut self, wall_time_ms: f64) {
        self.timing.total_wall_time_ms = wall_time_ms;
        if wall_time_ms > 0.0 {
            let seconds = wall_time_ms / 1000.0;
            self.timing.steps_per_second = self.network.steps_executed as f64 / seconds;
            self.timing.sim_time_per_second = self.network.final_time / seconds;
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let json = self
            .to_json()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, json)
    }

    /// Network-wide counters as `metric,value` rows.
    pub fn to_csv(&self) -> String {
        let n = &self.network;
        let mut csv = String::from("metric,value\n");
        csv.push_str(&format!("final_step,{}\n", n.final_step));
        csv.push_str(&format!("final_time,{}\n", n.final_time));
        csv.push_str(&format!("steps_executed,{}\n", n.steps_executed));
        csv.push_str(&format!("projection_updates,{}\n", n.projection_updates));
        csv.push_str(&format!("node_updates,{}\n", n.node_updates));
        csv.push_str(&format!("hook_runs,{}\n", n.hook_runs));
        csv.push_str(&format!("delay_rotations,{}\n", n.delay_rotations));
        csv.push_str(&format!("population_count,{}\n", n.population_count));
        csv.push_str(&format!("projection_count,{}\n", n.projection_count));
        csv.push_str(&format!("wall_time_ms,{:.2}\n", self.timing.total_wall_time_ms));
        csv.push_str(&format!("steps_per_second,{:.2}\n", self.timing.steps_per_second));
        csv
    }

    pub fn to_csv_file<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        std::fs::write(path, self.to_csv())
    }

    /// One row per population.
    pub fn populations_to_csv(&self) -> String {
        let mut csv = String::from("population,size,updates,activity,before_hooks,after_hooks,inputs\n");
        for (name, p) in &self.populations {
            let size: Vec<String> = p.size.iter().map(|s| s.to_string()).collect();
            csv.push_str(&format!(
                "{},{},{},{},{},{},{}\n",
                name,
                size.join("x"),
                p.updates,
                p.activity,
                p.before_hooks,
                p.after_hooks,
                p.inputs,
            ));
        }
        csv
    }

    pub fn write_summary<W: Write>(&self, mut w: W) -> std::io::Result<()> {
        writeln!(w, "=== Run Statistics ===")?;
        writeln!(w)?;
        if !self.metadata.name.is_empty() {
            writeln!(w, "Name: {}", self.metadata.name)?;
        }
        if let Some(ref start) = self.metadata.start_time {
            writeln!(w, "Started: {}", start)?;
        }
        if let Some(ref end) = self.metadata.end_time {
            writeln!(w, "Ended: {}", end)?;
        }
        writeln!(w)?;

        let n = &self.network;
        writeln!(w, "--- Network ---")?;
        writeln!(w, "Final step: {} (t = {})", n.final_step, n.final_time)?;
        writeln!(w, "Steps executed: {}", n.steps_executed)?;
        writeln!(w, "Projection updates: {}", n.projection_updates)?;
        writeln!(w, "Hook runs: {}", n.hook_runs)?;
        writeln!(w, "Delay rotations: {}", n.delay_rotations)?;
        writeln!(w, "Populations: {}, projections: {}", n.population_count, n.projection_count)?;
        writeln!(w)?;

        writeln!(w, "--- Timing ---")?;
        writeln!(w, "Wall time: {:.2} ms", self.timing.total_wall_time_ms)?;
        writeln!(w, "Steps/sec: {:.2}", self.timing.steps_per_second)?;
        writeln!(w)?;

        writeln!(w, "--- Populations ---")?;
        for (name, p) in &self.populations {
            writeln!(w, "{} {:?}: activity {}, {} inputs", name, p.size, p.activity, p.inputs)?;
        }
        writeln!(w, "--- Projections ---")?;
        for (name, p) in &self.projections {
            writeln!(w, "{} ({}): {} updates", name, p.variant, p.updates)?;
        }
        Ok(())
    }

    pub fn summary(&self) -> String {
        let mut buf = Vec::new();
        // Writing into a Vec cannot fail.
        let _ = self.write_summary(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    }
}

/// Wall-clock timer.
#[derive(Debug)]
pub struct Timer {
    start: std::time::Instant,
}

impl Timer {
    pub fn start() -> Self {
        Self {
            start: std::time::Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::start()
    }
}

fn timestamp() -> String {
    let since_epoch = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    format!("{}s", since_epoch.as_secs())
}

/// Times a run and gathers its statistics.
#[derive(Debug, Default)]
pub struct StatsCollector {
    stats: RunStats,
    timer: Option<Timer>,
}

impl StatsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.stats.metadata.name = name.into();
    }

    pub fn set_config_file(&mut self, path: impl Into<String>) {
        self.stats.metadata.config_file = Some(path.into());
    }

    pub fn start(&mut self) {
        self.timer = Some(Timer::start());
        self.stats.record_start();
    }

    /// Stops the timer. Call after [`update_from_json`](Self::update_from_json)
    /// so throughput uses the final counters.
    pub fn stop(&mut self) {
        self.stats.record_end();
        if let Some(ref timer) = self.timer {
            self.stats.compute_timing(timer.elapsed_ms());
        }
    }

    /// Ingests the output of `Network::export_stats`.
    pub fn update_from_json(&mut self, json: &serde_json::Value) {
        if let Some(net) = json.get("network") {
            let count = |key: &str| net[key].as_u64().unwrap_or(0);
            let n = &mut self.stats.network;
            n.final_step = count("current_step");
            n.final_time = net["time"].as_f64().unwrap_or(0.0);
            n.dt = net["dt"].as_f64().unwrap_or(0.0);
            n.steps_executed = count("steps_executed");
            n.projection_updates = count("projection_updates");
            n.node_updates = count("node_updates");
            n.hook_runs = count("hook_runs");
            n.delay_rotations = count("delay_rotations");
            n.population_count = count("population_count") as usize;
            n.projection_count = count("projection_count") as usize;
            n.parallel = net["parallel"].as_bool().unwrap_or(false);
        }

        if let Some(pops) = json.get("populations").and_then(|p| p.as_object()) {
            for (name, p) in pops {
                let size = p["size"]
                    .as_array()
                    .map(|dims| dims.iter().filter_map(|d| d.as_u64()).map(|d| d as usize).collect())
                    .unwrap_or_default();
                self.stats.populations.insert(
                    name.clone(),
                    PopulationStats {
                        size,
                        updates: p["updates"].as_u64().unwrap_or(0),
                        activity: p["activity"].as_f64().unwrap_or(0.0),
                        before_hooks: p["before_hooks"].as_u64().unwrap_or(0) as usize,
                        after_hooks: p["after_hooks"].as_u64().unwrap_or(0) as usize,
                        inputs: p["inputs"].as_u64().unwrap_or(0) as usize,
                    },
                );
            }
        }

        if let Some(projs) = json.get("projections").and_then(|p| p.as_object()) {
            for (name, p) in projs {
                self.stats.projections.insert(
                    name.clone(),
                    ProjectionStats {
                        variant: p["variant"].as_str().unwrap_or_default().to_string(),
                        updates: p["updates"].as_u64().unwrap_or(0),
                    },
                );
            }
        }
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    pub fn into_stats(self) -> RunStats {
        self.stats
    }
}
