//! SimWorld - The simulation harness container.

use crate::context::SimContext;
use crate::oracle::{InvariantOracle, InvariantViolation};
use crate::scenarios::ScenarioParams;

use epinet_core::{
    EpidemicError, Graph, InitialConditions, MetricsMode, NetworkMetrics, SimulationSession,
    SimulationState, TopologyView, TransitionRates,
};
use epinet_service::SeedContext;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

/// Configuration for a simulation run.
#[derive(Debug, Clone, PartialEq)]
pub struct SimConfig {
    /// Master seed for determinism
    pub seed: u64,

    pub node_count: usize,
    pub initial_infected: usize,
    pub edge_probability: f64,
    pub infection_rate: f64,
    pub recovery_rate: f64,

    /// Step limit for a run
    pub max_steps: u64,

    pub metrics_mode: MetricsMode,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            node_count: 1000,
            initial_infected: 5,
            edge_probability: 0.005,
            infection_rate: 0.3,
            recovery_rate: 0.1,
            max_steps: 500,
            metrics_mode: MetricsMode::Recompute,
        }
    }
}

impl SimConfig {
    /// Config for a scenario's parameters under the given seed.
    pub fn from_params(seed: u64, params: &ScenarioParams) -> Self {
        Self {
            seed,
            node_count: params.node_count,
            initial_infected: params.initial_infected,
            edge_probability: params.edge_probability,
            infection_rate: params.infection_rate,
            recovery_rate: params.recovery_rate,
            max_steps: params.max_steps,
            metrics_mode: MetricsMode::Recompute,
        }
    }

    fn initial_conditions(&self) -> InitialConditions {
        InitialConditions {
            node_count: self.node_count,
            initial_infected: self.initial_infected,
            edge_probability: self.edge_probability,
        }
    }
}

/// Errors from driving a world.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WorldError {
    #[error(transparent)]
    Core(#[from] EpidemicError),

    #[error("invariant violated at step {step}: {violation}")]
    Invariant {
        step: u64,
        violation: InvariantViolation,
    },
}

/// Per-step summary of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepReport {
    pub time: u64,
    pub susceptible: usize,
    pub infected: usize,
    pub recovered: usize,
    pub newly_infected: usize,
    pub newly_recovered: usize,
    pub metrics: NetworkMetrics,
}

impl StepReport {
    fn from_state(state: &SimulationState, newly_infected: usize, newly_recovered: usize) -> Self {
        Self {
            time: state.elapsed_steps,
            susceptible: state.partition.susceptible_count(),
            infected: state.partition.infected_count(),
            recovered: state.partition.recovered_count(),
            newly_infected,
            newly_recovered,
            metrics: state.metrics,
        }
    }
}

/// The SimWorld - one session driven under an invariant oracle.
pub struct SimWorld {
    config: SimConfig,

    /// Seed source for the session
    context: SimContext,

    session: SimulationSession,
    rates: TransitionRates,

    /// Present once initialized
    oracle: Option<InvariantOracle>,
}

impl SimWorld {
    /// Creates a new SimWorld. Rates are validated up front.
    pub fn new(config: SimConfig) -> Result<Self, WorldError> {
        let rates = TransitionRates::new(config.infection_rate, config.recovery_rate)?;
        let context = SimContext::new(config.seed);
        let session = SimulationSession::new(context.next_session_seed())
            .with_metrics_mode(config.metrics_mode);

        Ok(Self {
            config,
            context,
            session,
            rates,
            oracle: None,
        })
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn context(&self) -> &SimContext {
        &self.context
    }

    /// Seed of the underlying session.
    pub fn session_seed(&self) -> u64 {
        self.session.seed()
    }

    pub fn rates(&self) -> TransitionRates {
        self.rates
    }

    pub fn is_initialized(&self) -> bool {
        self.session.is_initialized()
    }

    pub fn state(&self) -> Option<&SimulationState> {
        self.session.state()
    }

    pub fn graph(&self) -> Option<&Graph> {
        self.session.graph()
    }

    pub fn topology(&self) -> Option<TopologyView> {
        self.session.topology()
    }

    /// Generates the network and seeds the infection.
    pub fn initialize(&mut self) -> Result<StepReport, WorldError> {
        let conditions = self.config.initial_conditions();
        let state = self.session.initialize(&conditions)?;
        self.oracle = Some(InvariantOracle::new(self.rates, state));
        Ok(StepReport::from_state(state, 0, 0))
    }

    /// Advances one step and checks it against the oracle.
    pub fn step(&mut self) -> Result<StepReport, WorldError> {
        let oracle = self.oracle.as_mut().ok_or(EpidemicError::NotInitialized)?;
        let (_, outcome) = self.session.step_with_outcome(self.rates)?;

        let (Some(state), Some(graph)) = (self.session.state(), self.session.graph()) else {
            return Err(EpidemicError::NotInitialized.into());
        };

        oracle
            .check_step(graph, state, &outcome)
            .map_err(|violation| WorldError::Invariant {
                step: state.elapsed_steps,
                violation,
            })?;

        let report = StepReport::from_state(
            state,
            outcome.newly_infected.len(),
            outcome.newly_recovered.len(),
        );
        debug!(
            time = report.time,
            s = report.susceptible,
            i = report.infected,
            r = report.recovered,
            "step"
        );
        Ok(report)
    }
}
