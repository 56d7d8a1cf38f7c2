//! Scenario runner - executes epidemic scenarios under the invariant oracle.

use crate::exporter::{SimExport, SimFrame};
use crate::scenarios::ScenarioId;
use crate::world::{SimConfig, SimWorld, StepReport, WorldError};

use epinet_core::{metrics, Compartment, MetricsMode, NetworkMetrics};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Results from running a scenario.
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Whether the run obeyed every invariant and scenario expectation
    pub passed: bool,

    /// Steps executed
    pub steps: u64,

    pub final_susceptible: usize,
    pub final_infected: usize,
    pub final_recovered: usize,

    /// Failure message if any
    pub failure_reason: Option<String>,

    /// Metrics collected during run
    pub metrics: ScenarioMetrics,
}

/// Epidemic statistics collected during a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScenarioMetrics {
    /// Largest infected count seen, including time 0
    pub peak_infected: usize,

    /// Time at which the peak was first reached
    pub peak_step: u64,

    /// Fraction of nodes ever infected
    pub attack_rate: f64,

    pub total_infections: usize,
    pub total_recoveries: usize,

    /// Metrics of the generated network
    pub network: NetworkMetrics,
}

impl ScenarioMetrics {
    fn observe(&mut self, report: &StepReport) {
        if report.infected > self.peak_infected {
            self.peak_infected = report.infected;
            self.peak_step = report.time;
        }
        self.total_infections += report.newly_infected;
        self.total_recoveries += report.newly_recovered;
    }
}

/// Runs epidemic scenarios.
pub struct ScenarioRunner {
    /// Configuration seed
    seed: u64,

    /// Overrides the scenario's own step limit
    max_steps: Option<u64>,

    metrics_mode: MetricsMode,
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            max_steps: None,
            metrics_mode: MetricsMode::Recompute,
        }
    }

    /// Sets the step limit for every scenario.
    pub fn with_max_steps(mut self, steps: u64) -> Self {
        self.max_steps = Some(steps);
        self
    }

    pub fn with_metrics_mode(mut self, mode: MetricsMode) -> Self {
        self.metrics_mode = mode;
        self
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Runs a scenario and returns the result.
    pub fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        self.execute(scenario, None)
    }

    /// Runs a scenario and records every step as an export frame.
    pub fn run_exported(&self, scenario: ScenarioId) -> (ScenarioResult, SimExport) {
        let mut export = SimExport::new(scenario.name(), self.seed);
        let result = self.execute(scenario, Some(&mut export));
        export.finalize(&result);
        (result, export)
    }

    fn config_for(&self, scenario: ScenarioId) -> SimConfig {
        let mut config = SimConfig::from_params(self.seed, &scenario.params());
        config.metrics_mode = self.metrics_mode;
        if let Some(steps) = self.max_steps {
            config.max_steps = steps;
        }
        config
    }

    fn execute(&self, scenario: ScenarioId, mut export: Option<&mut SimExport>) -> ScenarioResult {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.seed);

        let config = self.config_for(scenario);
        let mut result = ScenarioResult {
            scenario,
            seed: self.seed,
            passed: false,
            steps: 0,
            final_susceptible: 0,
            final_infected: 0,
            final_recovered: 0,
            failure_reason: None,
            metrics: ScenarioMetrics::default(),
        };

        let outcome = drive(&config, &mut result, export.as_deref_mut())
            .and_then(|world| check_expectations(scenario, &world, &result).map(|_| world));

        match outcome {
            Ok(world) => {
                result.passed = true;
                if let Some(graph) = world.graph() {
                    debug!(
                        "{}: {} nodes, {} edges, {} components",
                        scenario.name(),
                        graph.node_count(),
                        graph.edge_count(),
                        metrics::connected_components(graph).len()
                    );
                }
            }
            Err(reason) => {
                warn!("{} (seed={}) failed: {}", scenario.name(), self.seed, reason);
                result.failure_reason = Some(reason);
            }
        }

        result
    }
}

/// Initializes and steps a world until nobody is infected or the limit is hit.
fn drive(
    config: &SimConfig,
    result: &mut ScenarioResult,
    mut export: Option<&mut SimExport>,
) -> Result<SimWorld, String> {
    let mut world = SimWorld::new(config.clone()).map_err(|e| e.to_string())?;
    let initial = world.initialize().map_err(|e| e.to_string())?;

    result.metrics.network = initial.metrics;
    result.metrics.peak_infected = initial.infected;
    if let Some(export) = export.as_deref_mut() {
        export.topology = world.topology();
        export.add_frame(SimFrame::from(&initial));
    }

    let mut last = initial;
    while last.infected > 0 && last.time < config.max_steps {
        last = world.step().map_err(|e: WorldError| e.to_string())?;
        result.metrics.observe(&last);
        if let Some(export) = export.as_deref_mut() {
            export.add_frame(SimFrame::from(&last));
        }
    }

    result.steps = last.time;
    result.final_susceptible = last.susceptible;
    result.final_infected = last.infected;
    result.final_recovered = last.recovered;
    result.metrics.attack_rate = if config.node_count > 0 {
        (config.node_count - last.susceptible) as f64 / config.node_count as f64
    } else {
        0.0
    };

    Ok(world)
}

/// Scenario-specific outcomes on top of the per-step invariants.
fn check_expectations(
    scenario: ScenarioId,
    world: &SimWorld,
    result: &ScenarioResult,
) -> Result<(), String> {
    let config = world.config();
    let graph = world.graph().ok_or("world was never initialized")?;
    let network = &result.metrics.network;

    match scenario {
        ScenarioId::Baseline => Ok(()),
        ScenarioId::Saturation => {
            // Nobody recovers, so once the flood settles no infected node borders a susceptible one
            let state = world.state().ok_or("world was never initialized")?;
            let partition = &state.partition;
            let exposed = partition.infected().into_iter().find(|&u| {
                graph
                    .neighbors(u)
                    .iter()
                    .any(|&v| partition.compartment(v) == Compartment::Susceptible)
            });
            match exposed {
                Some(node) => Err(format!(
                    "infected node {} still borders a susceptible node after {} steps",
                    node, result.steps
                )),
                None => Ok(()),
            }
        }
        ScenarioId::Dormant => {
            if result.metrics.total_infections + result.metrics.total_recoveries > 0 {
                Err("partition changed with both rates at zero".into())
            } else if result.final_infected != config.initial_infected {
                Err(format!(
                    "{} infected at the end, expected {}",
                    result.final_infected, config.initial_infected
                ))
            } else {
                Ok(())
            }
        }
        ScenarioId::NoSpread => {
            let ever_infected = config.node_count - result.final_susceptible;
            if ever_infected != config.initial_infected {
                Err(format!(
                    "{} nodes ever infected, expected only the {} seeds",
                    ever_infected, config.initial_infected
                ))
            } else {
                Ok(())
            }
        }
        ScenarioId::NoRecovery => {
            if result.final_recovered != 0 {
                Err(format!("{} nodes recovered with gamma = 0", result.final_recovered))
            } else {
                Ok(())
            }
        }
        ScenarioId::Fragmented => {
            if network.path_length_component_size >= config.node_count {
                Err("expected a disconnected network".into())
            } else if network.path_length_component_size
                != metrics::largest_component(graph).len()
            {
                Err("path length not measured over the largest component".into())
            } else {
                Ok(())
            }
        }
        ScenarioId::Dense => {
            if !metrics::is_connected(graph) {
                Err("dense network is disconnected".into())
            } else if network.average_path_length < 1.0 {
                Err(format!(
                    "average path length {:.3} below 1 on a connected graph",
                    network.average_path_length
                ))
            } else {
                Ok(())
            }
        }
    }
}
