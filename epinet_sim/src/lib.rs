//! EpiNet Deterministic Simulation Harness
//!
//! Drives the epidemic core through seeded, reproducible runs and checks
//! every step against an invariant oracle.
//!
//! ## Components
//! - `SimContext`: deterministic `SeedContext` for session seeds
//! - `SimWorld`: one configured session plus its oracle
//! - `InvariantOracle`: partition, monotonicity and rate rules per step
//! - `ScenarioRunner`: named presets with outcome expectations
//! - `SimExport`: per-step JSON frames for plotting

pub mod context;
pub mod exporter;
pub mod oracle;
pub mod runner;
pub mod scenarios;
pub mod world;

pub use context::SimContext;
pub use exporter::{ExportError, SimExport, SimFrame};
pub use oracle::{InvariantOracle, InvariantViolation};
pub use runner::{ScenarioMetrics, ScenarioResult, ScenarioRunner};
pub use scenarios::{ScenarioId, ScenarioParams};
pub use world::{SimConfig, SimWorld, StepReport, WorldError};
