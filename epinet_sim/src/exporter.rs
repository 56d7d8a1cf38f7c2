//! JSON exporter for epidemic runs.
//!
//! Writes the generated network plus one frame per step, for plotting the
//! S/I/R curves and animating the network outside the simulator.

use crate::runner::ScenarioResult;
use crate::world::StepReport;

use epinet_core::{NetworkMetrics, TopologyView};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;

/// Errors while writing an export.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write export: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode export: {0}")]
    Json(#[from] serde_json::Error),
}

/// A single frame of simulation data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimFrame {
    /// Steps since initialize
    pub time: u64,

    pub susceptible: usize,
    pub infected: usize,
    pub recovered: usize,

    pub newly_infected: usize,
    pub newly_recovered: usize,

    pub metrics: NetworkMetrics,
}

impl From<&StepReport> for SimFrame {
    fn from(report: &StepReport) -> Self {
        Self {
            time: report.time,
            susceptible: report.susceptible,
            infected: report.infected,
            recovered: report.recovered,
            newly_infected: report.newly_infected,
            newly_recovered: report.newly_recovered,
            metrics: report.metrics,
        }
    }
}

/// Complete simulation export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimExport {
    /// Scenario name
    pub scenario: String,

    /// Seed used
    pub seed: u64,

    /// Generated network, absent if initialize failed
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub topology: Option<TopologyView>,

    /// All frames, time 0 first
    pub frames: Vec<SimFrame>,

    /// Final results
    pub passed: bool,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub failure_reason: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub attack_rate: Option<f64>,
}

impl SimExport {
    /// Creates a new export container.
    pub fn new(scenario: &str, seed: u64) -> Self {
        Self {
            scenario: scenario.to_string(),
            seed,
            topology: None,
            frames: Vec::new(),
            passed: false,
            failure_reason: None,
            attack_rate: None,
        }
    }

    /// Adds a frame.
    pub fn add_frame(&mut self, frame: SimFrame) {
        self.frames.push(frame);
    }

    /// Copies the verdict from a finished run.
    pub fn finalize(&mut self, result: &ScenarioResult) {
        self.passed = result.passed;
        self.failure_reason = result.failure_reason.clone();
        self.attack_rate = Some(result.metrics.attack_rate);
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<(), ExportError> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(time: u64, infected: usize) -> SimFrame {
        SimFrame {
            time,
            susceptible: 10 - infected,
            infected,
            recovered: 0,
            newly_infected: 0,
            newly_recovered: 0,
            metrics: NetworkMetrics::default(),
        }
    }

    #[test]
    fn test_export_json_shape() {
        let mut export = SimExport::new("baseline", 42);
        export.add_frame(frame(0, 1));
        export.add_frame(frame(1, 3));

        let value = serde_json::to_value(&export).unwrap();
        assert_eq!(value["scenario"], "baseline");
        assert_eq!(value["frames"][1]["infected"], 3);
        assert!(value["frames"][0]["metrics"]["average_degree"].is_number());
        assert!(value.get("topology").is_none());
        assert!(value.get("failure_reason").is_none());
    }

    #[test]
    fn test_write_to_file() {
        let path = std::env::temp_dir().join(format!("epinet_export_{}.json", std::process::id()));
        let mut export = SimExport::new("dense", 1);
        export.add_frame(frame(0, 2));
        export.write_to_file(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let back: SimExport = serde_json::from_str(&text).unwrap();
        assert_eq!(back.frames, export.frames);
        std::fs::remove_file(&path).unwrap();
    }
}
