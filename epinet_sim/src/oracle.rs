//! Invariant oracle for simulation.
//!
//! The oracle watches every transition of a run and checks it against the
//! rules an SIR step must obey:
//! - Partition: every node in exactly one compartment, counters consistent
//! - Monotonicity: no return to Susceptible, no leaving Recovered
//! - Single transition: no node goes S → R in one step
//! - Causality: every new infection has a neighbour infected before the step
//! - Degenerate rates: β = 0, γ = 0 and γ = 1 behave exactly
//! - Saturation: β = 1 converts every exposed susceptible node
//! - Metric invariance: topology is fixed, so metrics never drift

use epinet_core::{
    Compartment, CompartmentPartition, Graph, NetworkMetrics, SimulationState, StepOutcome,
    TransitionRates,
};
use thiserror::Error;

/// A broken rule, with the node (or value) that broke it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvariantViolation {
    #[error("partition broken: {susceptible}+{infected}+{recovered} != {node_count} nodes")]
    Partition {
        susceptible: usize,
        infected: usize,
        recovered: usize,
        node_count: usize,
    },

    #[error("node {node} returned to Susceptible from {from:?}")]
    ReturnedToSusceptible { node: usize, from: Compartment },

    #[error("node {node} left Recovered")]
    LeftRecovered { node: usize },

    #[error("node {node} went Susceptible -> Recovered in one step")]
    DoubleTransition { node: usize },

    #[error("node {node} was infected without an infected neighbour")]
    InfectionWithoutContact { node: usize },

    #[error("step outcome disagrees with the partition: {0}")]
    OutcomeMismatch(String),

    #[error("node {node} changed compartment under a zero {rate} rate")]
    ZeroRateTransition { node: usize, rate: &'static str },

    #[error("node {node} stayed infected under recovery rate 1")]
    MissedRecovery { node: usize },

    #[error("node {node} was exposed under infection rate 1 but stayed susceptible")]
    MissedSaturation { node: usize },

    #[error("metrics drifted: {before:?} -> {after:?}")]
    MetricsDrift {
        before: NetworkMetrics,
        after: NetworkMetrics,
    },

    #[error("time went from {before} to {after}")]
    Clock { before: u64, after: u64 },
}

/// Checks each step of one run against the SIR rules.
#[derive(Debug, Clone)]
pub struct InvariantOracle {
    rates: TransitionRates,

    /// Metrics captured at initialize
    baseline_metrics: NetworkMetrics,

    /// State seen at the end of the previous check
    last_partition: CompartmentPartition,
    last_time: u64,

    /// Number of steps verified so far
    checks: u64,
}

impl InvariantOracle {
    /// Starts watching a freshly initialized run.
    pub fn new(rates: TransitionRates, initial: &SimulationState) -> Self {
        Self {
            rates,
            baseline_metrics: initial.metrics,
            last_partition: initial.partition.clone(),
            last_time: initial.elapsed_steps,
            checks: 0,
        }
    }

    /// Number of steps checked.
    pub fn checks(&self) -> u64 {
        self.checks
    }

    /// Verifies one transition and, on success, advances to the new state.
    pub fn check_step(
        &mut self,
        graph: &Graph,
        after: &SimulationState,
        outcome: &StepOutcome,
    ) -> Result<(), InvariantViolation> {
        let before = &self.last_partition;

        if after.elapsed_steps != self.last_time + 1 {
            return Err(InvariantViolation::Clock {
                before: self.last_time,
                after: after.elapsed_steps,
            });
        }

        check_partition(&after.partition)?;

        let mut newly_infected = Vec::new();
        let mut newly_recovered = Vec::new();

        for node in graph.nodes() {
            let was = before.compartment(node);
            let now = after.partition.compartment(node);

            match (was, now) {
                (Compartment::Susceptible, Compartment::Recovered) => {
                    return Err(InvariantViolation::DoubleTransition { node });
                }
                (from, Compartment::Susceptible) if from != Compartment::Susceptible => {
                    return Err(InvariantViolation::ReturnedToSusceptible { node, from });
                }
                (Compartment::Recovered, Compartment::Infected) => {
                    return Err(InvariantViolation::LeftRecovered { node });
                }
                (Compartment::Susceptible, Compartment::Infected) => {
                    let exposed = graph
                        .neighbors(node)
                        .iter()
                        .any(|&v| before.compartment(v) == Compartment::Infected);
                    if !exposed {
                        return Err(InvariantViolation::InfectionWithoutContact { node });
                    }
                    newly_infected.push(node);
                }
                (Compartment::Infected, Compartment::Recovered) => newly_recovered.push(node),
                _ => {}
            }
        }

        if newly_infected != outcome.newly_infected {
            return Err(InvariantViolation::OutcomeMismatch(format!(
                "{} nodes newly infected, outcome reports {}",
                newly_infected.len(),
                outcome.newly_infected.len()
            )));
        }
        if newly_recovered != outcome.newly_recovered {
            return Err(InvariantViolation::OutcomeMismatch(format!(
                "{} nodes newly recovered, outcome reports {}",
                newly_recovered.len(),
                outcome.newly_recovered.len()
            )));
        }

        self.check_rates(graph, before, &after.partition, &newly_infected, &newly_recovered)?;

        if after.metrics != self.baseline_metrics {
            return Err(InvariantViolation::MetricsDrift {
                before: self.baseline_metrics,
                after: after.metrics,
            });
        }

        self.last_partition = after.partition.clone();
        self.last_time = after.elapsed_steps;
        self.checks += 1;
        Ok(())
    }

    fn check_rates(
        &self,
        graph: &Graph,
        before: &CompartmentPartition,
        after: &CompartmentPartition,
        newly_infected: &[usize],
        newly_recovered: &[usize],
    ) -> Result<(), InvariantViolation> {
        if self.rates.infection_rate() == 0.0 {
            if let Some(&node) = newly_infected.first() {
                return Err(InvariantViolation::ZeroRateTransition {
                    node,
                    rate: "infection",
                });
            }
        }
        if self.rates.recovery_rate() == 0.0 {
            if let Some(&node) = newly_recovered.first() {
                return Err(InvariantViolation::ZeroRateTransition {
                    node,
                    rate: "recovery",
                });
            }
        }

        if self.rates.recovery_rate() == 1.0 {
            for node in before.infected() {
                if after.compartment(node) != Compartment::Recovered {
                    return Err(InvariantViolation::MissedRecovery { node });
                }
            }
        }

        if self.rates.infection_rate() == 1.0 {
            for node in before.infected() {
                for &v in graph.neighbors(node) {
                    if before.compartment(v) == Compartment::Susceptible
                        && after.compartment(v) != Compartment::Infected
                    {
                        return Err(InvariantViolation::MissedSaturation { node: v });
                    }
                }
            }
        }

        Ok(())
    }
}

fn check_partition(partition: &CompartmentPartition) -> Result<(), InvariantViolation> {
    let susceptible = partition.susceptible().len();
    let infected = partition.infected().len();
    let recovered = partition.recovered().len();
    let node_count = partition.node_count();

    let counters_agree = susceptible == partition.susceptible_count()
        && infected == partition.infected_count()
        && recovered == partition.recovered_count();

    if !counters_agree || susceptible + infected + recovered != node_count {
        return Err(InvariantViolation::Partition {
            susceptible: partition.susceptible_count(),
            infected: partition.infected_count(),
            recovered: partition.recovered_count(),
            node_count,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use epinet_core::EpidemicEngine;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn run_checked(
        graph: Graph,
        infected: usize,
        beta: f64,
        gamma: f64,
        steps: usize,
        seed: u64,
    ) -> u64 {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let rates = TransitionRates::new(beta, gamma).unwrap();
        let mut engine = EpidemicEngine::initialize(graph, infected, &mut rng).unwrap();
        let mut oracle = InvariantOracle::new(rates, engine.state());

        for _ in 0..steps {
            let outcome = engine.step(rates, &mut rng).unwrap();
            oracle
                .check_step(engine.graph(), engine.state(), &outcome)
                .unwrap();
        }
        oracle.checks()
    }

    #[test]
    fn test_oracle_accepts_real_runs() {
        let ring = [(0, 1), (1, 2), (2, 3), (3, 4), (4, 5), (5, 0)];
        let graph = Graph::from_edges(6, &ring).unwrap();
        assert_eq!(run_checked(graph, 2, 0.5, 0.3, 20, 7), 20);
    }

    #[test]
    fn test_oracle_accepts_degenerate_rates() {
        assert_eq!(run_checked(Graph::complete(8), 1, 1.0, 0.0, 5, 1), 5);
        assert_eq!(run_checked(Graph::complete(8), 3, 0.0, 1.0, 5, 2), 5);
        assert_eq!(run_checked(Graph::complete(8), 3, 0.0, 0.0, 5, 3), 5);
    }

    #[test]
    fn test_oracle_rejects_forged_outcome() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let rates = TransitionRates::new(1.0, 0.0).unwrap();
        let mut engine = EpidemicEngine::initialize(Graph::complete(5), 1, &mut rng).unwrap();
        let mut oracle = InvariantOracle::new(rates, engine.state());

        let mut outcome = engine.step(rates, &mut rng).unwrap();
        outcome.newly_infected.pop();

        let err = oracle
            .check_step(engine.graph(), engine.state(), &outcome)
            .unwrap_err();
        assert!(matches!(err, InvariantViolation::OutcomeMismatch(_)));
        assert_eq!(oracle.checks(), 0);
    }

    #[test]
    fn test_oracle_rejects_clock_skip() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let rates = TransitionRates::new(0.3, 0.1).unwrap();
        let mut engine = EpidemicEngine::initialize(Graph::complete(5), 1, &mut rng).unwrap();
        let mut oracle = InvariantOracle::new(rates, engine.state());

        engine.step(rates, &mut rng).unwrap();
        let outcome = engine.step(rates, &mut rng).unwrap();

        let err = oracle
            .check_step(engine.graph(), engine.state(), &outcome)
            .unwrap_err();
        assert_eq!(err, InvariantViolation::Clock { before: 0, after: 2 });
    }

    #[test]
    fn test_oracle_rejects_wrong_rates() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let actual = TransitionRates::new(1.0, 1.0).unwrap();
        let claimed = TransitionRates::new(0.0, 0.0).unwrap();
        let mut engine = EpidemicEngine::initialize(Graph::complete(4), 1, &mut rng).unwrap();
        let mut oracle = InvariantOracle::new(claimed, engine.state());

        let outcome = engine.step(actual, &mut rng).unwrap();
        let err = oracle
            .check_step(engine.graph(), engine.state(), &outcome)
            .unwrap_err();
        assert!(matches!(err, InvariantViolation::ZeroRateTransition { rate: "infection", .. }));
    }

    #[test]
    fn test_violation_messages() {
        let err = InvariantViolation::DoubleTransition { node: 3 };
        assert_eq!(err.to_string(), "node 3 went Susceptible -> Recovered in one step");
    }
}
