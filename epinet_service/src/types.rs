//! Common types for the EpiNet service layer.

use epinet_core::{NetworkMetrics, SimulationState, TopologyView};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier for a simulation session.
///
/// Uses UUID v4 for global uniqueness without coordination. The nil UUID is
/// the default session, used by callers that never name one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// The session used when a request does not name one.
    pub const DEFAULT: SessionId = SessionId(Uuid::nil());

    /// Creates a new random SessionId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a deterministic SessionId from a seed (for simulation).
    pub fn from_seed(seed: u64) -> Self {
        let mut bytes = [0u8; 16];
        bytes[0..8].copy_from_slice(&seed.to_le_bytes());
        bytes[8..16].copy_from_slice(&seed.wrapping_mul(0x517cc1b727220a95).to_le_bytes());
        Self(Uuid::from_bytes(bytes))
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

// =============================================================================
// REQUESTS
// =============================================================================

/// Validated parameters for `initialize`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InitializeRequest {
    pub num_nodes: usize,
    pub initial_infected: usize,
    pub edge_probability: f64,
}

impl Default for InitializeRequest {
    fn default() -> Self {
        Self {
            num_nodes: 1000,
            initial_infected: 5,
            edge_probability: 0.005,
        }
    }
}

/// Validated parameters for `step`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepRequest {
    pub infection_rate: f64,
    pub recovery_rate: f64,
}

impl Default for StepRequest {
    fn default() -> Self {
        Self {
            infection_rate: 0.3,
            recovery_rate: 0.1,
        }
    }
}

// =============================================================================
// PAYLOADS
// =============================================================================

/// Wire form of a [`SimulationState`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatePayload {
    /// Elapsed steps
    pub time: u64,
    pub susceptible: Vec<usize>,
    pub infected: Vec<usize>,
    pub recovered: Vec<usize>,
    pub network_metrics: NetworkMetrics,
}

impl From<&SimulationState> for StatePayload {
    fn from(state: &SimulationState) -> Self {
        Self {
            time: state.elapsed_steps,
            susceptible: state.partition.susceptible(),
            infected: state.partition.infected(),
            recovered: state.partition.recovered(),
            network_metrics: state.metrics,
        }
    }
}

/// Response body for `POST /api/initialize`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitializeResponse {
    pub session_id: SessionId,
    pub state: StatePayload,
    pub network: TopologyView,
}

/// Response body for `POST /api/step`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResponse {
    pub session_id: SessionId,
    pub state: StatePayload,
}

/// Response body for any failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_roundtrip_and_default() {
        let id = SessionId::new();
        let parsed: SessionId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);

        assert!(SessionId::default().0.is_nil());
        assert_ne!(id, SessionId::DEFAULT);
        assert!("not-a-uuid".parse::<SessionId>().is_err());
    }

    #[test]
    fn test_session_id_from_seed_is_deterministic() {
        assert_eq!(SessionId::from_seed(9), SessionId::from_seed(9));
        assert_ne!(SessionId::from_seed(9), SessionId::from_seed(10));
    }

    #[test]
    fn test_state_payload_json_shape() {
        let payload = StatePayload {
            time: 3,
            susceptible: vec![0],
            infected: vec![1],
            recovered: vec![],
            network_metrics: NetworkMetrics::default(),
        };
        let json = serde_json::to_value(&payload).unwrap();

        assert_eq!(json["time"], 3);
        assert_eq!(json["infected"][0], 1);
        assert!(json["network_metrics"]["average_degree"].is_number());
        assert!(json["network_metrics"]["clustering_coefficient"].is_number());
        assert!(json["network_metrics"]["average_path_length"].is_number());
    }
}
