//! EpiNet Core - SIR epidemic simulation over random contact networks
//!
//! This library holds the parts of the system with real algorithmic content:
//! 1. **Network generation**: Erdős–Rényi G(n, p) contact graphs
//! 2. **Network metrics**: average degree, clustering, average path length
//!    (largest-component fallback on disconnected graphs)
//! 3. **Epidemic engine**: discrete-time SIR transitions with first-success
//!    infection and recovery precedence
//!
//! All randomness is injected. A [`SimulationSession`] bundles one graph,
//! one engine and two seeded ChaCha8 streams, so a seed fully determines a run.

pub mod engine;
pub mod error;
pub mod graph;
pub mod metrics;
pub mod session;

// Re-export key types for convenience
pub use engine::{
    Compartment, CompartmentPartition, EpidemicEngine, SimulationState, StepOutcome,
    TransitionRates,
};
pub use error::EpidemicError;
pub use graph::{Graph, LinkView, NetworkGenerator, NodeView, TopologyView};
pub use metrics::{compute_metrics, MetricsCalculator, NetworkMetrics};
pub use session::{InitialConditions, MetricsMode, SimulationSession};
