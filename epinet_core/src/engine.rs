//! SIR Transition Engine
//! =====================
//!
//! Owns the compartment partition for one graph and applies the discrete-time
//! SIR transition rule.
//!
//! # Transition rule (one step)
//!
//! ```text
//! pre  = Infected at start of step
//! for i in pre (ascending):
//!     for s in neighbors(i) (ascending) where s is Susceptible and unmarked:
//!         Bernoulli(infection_rate) → mark s newly infected
//! for i in pre (ascending):
//!     Bernoulli(recovery_rate) → mark i newly recovered
//! Infected'    = (Infected ∪ newly_infected) − newly_recovered
//! Recovered'   = Recovered ∪ newly_recovered
//! Susceptible' = Susceptible − newly_infected
//! ```
//!
//! A node marked newly infected is excluded from every later trial in the
//! same step, so it transitions at most once and its infection probability is
//! never compounded past the first success.

use crate::error::{EpidemicError, Result};
use crate::graph::Graph;
use crate::metrics::{compute_metrics, NetworkMetrics};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

// =============================================================================
// COMPARTMENTS
// =============================================================================

/// SIR compartment of a single node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Compartment {
    #[default]
    Susceptible,
    Infected,
    Recovered,
}

/// Assignment of every node to exactly one compartment.
///
/// Stored per node, so the "exactly one compartment" invariant holds by
/// construction; the counters are kept in sync on every transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompartmentPartition {
    compartments: Vec<Compartment>,
    susceptible: usize,
    infected: usize,
    recovered: usize,
}

impl CompartmentPartition {
    /// Everyone susceptible.
    pub fn all_susceptible(node_count: usize) -> Self {
        Self {
            compartments: vec![Compartment::Susceptible; node_count],
            susceptible: node_count,
            infected: 0,
            recovered: 0,
        }
    }

    /// Moves `node` to `to`, updating counters.
    fn set(&mut self, node: usize, to: Compartment) {
        let from = self.compartments[node];
        if from == to {
            return;
        }
        *self.counter_mut(from) -= 1;
        *self.counter_mut(to) += 1;
        self.compartments[node] = to;
    }

    fn counter_mut(&mut self, compartment: Compartment) -> &mut usize {
        match compartment {
            Compartment::Susceptible => &mut self.susceptible,
            Compartment::Infected => &mut self.infected,
            Compartment::Recovered => &mut self.recovered,
        }
    }

    pub fn node_count(&self) -> usize {
        self.compartments.len()
    }

    /// Compartment of `node`.
    pub fn compartment(&self, node: usize) -> Compartment {
        self.compartments[node]
    }

    pub fn susceptible_count(&self) -> usize {
        self.susceptible
    }

    pub fn infected_count(&self) -> usize {
        self.infected
    }

    pub fn recovered_count(&self) -> usize {
        self.recovered
    }

    /// Ascending ids of nodes in `compartment`.
    pub fn members(&self, compartment: Compartment) -> Vec<usize> {
        self.compartments
            .iter()
            .enumerate()
            .filter(|(_, c)| **c == compartment)
            .map(|(node, _)| node)
            .collect()
    }

    pub fn susceptible(&self) -> Vec<usize> {
        self.members(Compartment::Susceptible)
    }

    pub fn infected(&self) -> Vec<usize> {
        self.members(Compartment::Infected)
    }

    pub fn recovered(&self) -> Vec<usize> {
        self.members(Compartment::Recovered)
    }
}

// =============================================================================
// STATE
// =============================================================================

/// Snapshot of a running simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationState {
    /// Number of steps applied since `initialize`
    pub elapsed_steps: u64,
    /// Compartment membership of every node
    pub partition: CompartmentPartition,
    /// Metrics from the most recent initialize/step
    pub metrics: NetworkMetrics,
}

/// Per-step infection and recovery probabilities.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransitionRates {
    infection_rate: f64,
    recovery_rate: f64,
}

impl TransitionRates {
    /// Both rates must be finite probabilities in `[0, 1]`.
    pub fn new(infection_rate: f64, recovery_rate: f64) -> Result<Self> {
        check_probability("infection_rate", infection_rate)?;
        check_probability("recovery_rate", recovery_rate)?;
        Ok(Self {
            infection_rate,
            recovery_rate,
        })
    }

    pub fn infection_rate(&self) -> f64 {
        self.infection_rate
    }

    pub fn recovery_rate(&self) -> f64 {
        self.recovery_rate
    }
}

fn check_probability(name: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(EpidemicError::invalid(
            name,
            format!("{value} is not a probability in [0, 1]"),
        ))
    }
}

/// Nodes that changed compartment in one step, ascending.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepOutcome {
    pub newly_infected: Vec<usize>,
    pub newly_recovered: Vec<usize>,
}

impl StepOutcome {
    /// Returns true if no node changed compartment.
    pub fn is_noop(&self) -> bool {
        self.newly_infected.is_empty() && self.newly_recovered.is_empty()
    }
}

// =============================================================================
// ENGINE
// =============================================================================

/// SIR engine bound to one immutable graph.
#[derive(Debug, Clone)]
pub struct EpidemicEngine {
    graph: Graph,
    state: SimulationState,
}

impl EpidemicEngine {
    /// Seeds `initial_infected` distinct nodes, chosen uniformly without
    /// replacement; everyone else starts susceptible.
    pub fn initialize<R: Rng + ?Sized>(
        graph: Graph,
        initial_infected: usize,
        rng: &mut R,
    ) -> Result<Self> {
        let node_count = graph.node_count();
        if initial_infected == 0 || initial_infected > node_count {
            return Err(EpidemicError::invalid(
                "initial_infected",
                format!(
                    "must be between 1 and the node count ({node_count}), got {initial_infected}"
                ),
            ));
        }

        let metrics = compute_metrics(&graph)?;

        let mut partition = CompartmentPartition::all_susceptible(node_count);
        for node in rand::seq::index::sample(rng, node_count, initial_infected) {
            partition.set(node, Compartment::Infected);
        }

        debug!(
            nodes = node_count,
            edges = graph.edge_count(),
            infected = initial_infected,
            "epidemic seeded"
        );

        Ok(Self {
            graph,
            state: SimulationState {
                elapsed_steps: 0,
                partition,
                metrics,
            },
        })
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    /// Applies one transition and recomputes metrics from scratch.
    pub fn step<R: Rng + ?Sized>(
        &mut self,
        rates: TransitionRates,
        rng: &mut R,
    ) -> Result<StepOutcome> {
        let outcome = self.transition(rates, rng);
        self.state.metrics = compute_metrics(&self.graph)?;
        Ok(outcome)
    }

    /// Applies one transition, keeping the previous metrics.
    ///
    /// Metrics depend on topology only, which never changes, so the stored
    /// value is what a recomputation would produce.
    pub fn step_reusing_metrics<R: Rng + ?Sized>(
        &mut self,
        rates: TransitionRates,
        rng: &mut R,
    ) -> StepOutcome {
        self.transition(rates, rng)
    }

    fn transition<R: Rng + ?Sized>(&mut self, rates: TransitionRates, rng: &mut R) -> StepOutcome {
        let partition = &self.state.partition;
        let pre_infected = partition.infected();

        let mut marked = vec![false; self.graph.node_count()];
        let mut newly_infected = Vec::new();
        for &node in &pre_infected {
            for &neighbor in self.graph.neighbors(node) {
                if marked[neighbor] || partition.compartment(neighbor) != Compartment::Susceptible {
                    continue;
                }
                if rng.gen::<f64>() < rates.infection_rate {
                    marked[neighbor] = true;
                    newly_infected.push(neighbor);
                }
            }
        }

        let newly_recovered: Vec<usize> = pre_infected
            .iter()
            .copied()
            .filter(|_| rng.gen::<f64>() < rates.recovery_rate)
            .collect();

        // Newly infected nodes were susceptible at the start of the step and
        // newly recovered ones were infected, so the two sets are disjoint.
        let partition = &mut self.state.partition;
        for &node in &newly_infected {
            partition.set(node, Compartment::Infected);
        }
        for &node in &newly_recovered {
            partition.set(node, Compartment::Recovered);
        }
        self.state.elapsed_steps += 1;

        newly_infected.sort_unstable();
        debug!(
            step = self.state.elapsed_steps,
            newly_infected = newly_infected.len(),
            newly_recovered = newly_recovered.len(),
            infected = partition.infected_count(),
            "step applied"
        );

        StepOutcome {
            newly_infected,
            newly_recovered,
        }
    }
}
