//! Named epidemic scenarios for deterministic runs.

use serde::Serialize;

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScenarioId {
    /// Request defaults: 1000 nodes, sparse network, β = 0.3, γ = 0.1
    Baseline,

    /// β = 1, γ = 0: infection floods every reachable node
    Saturation,

    /// β = 0, γ = 0: nothing may ever change
    Dormant,

    /// β = 0: seeds recover, nobody new is infected
    NoSpread,

    /// γ = 0: the recovered compartment stays empty
    NoRecovery,

    /// Very sparse network, guaranteed to split into components
    Fragmented,

    /// Dense network, connected with overwhelming probability
    Dense,
}

/// Parameters a scenario runs with.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScenarioParams {
    pub node_count: usize,
    pub initial_infected: usize,
    pub edge_probability: f64,
    pub infection_rate: f64,
    pub recovery_rate: f64,
    pub max_steps: u64,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::Baseline,
            ScenarioId::Saturation,
            ScenarioId::Dormant,
            ScenarioId::NoSpread,
            ScenarioId::NoRecovery,
            ScenarioId::Fragmented,
            ScenarioId::Dense,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::Baseline => "baseline",
            ScenarioId::Saturation => "saturation",
            ScenarioId::Dormant => "dormant",
            ScenarioId::NoSpread => "no_spread",
            ScenarioId::NoRecovery => "no_recovery",
            ScenarioId::Fragmented => "fragmented",
            ScenarioId::Dense => "dense",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::Baseline => "1000 nodes, p=0.005, beta=0.3, gamma=0.1 until extinction",
            ScenarioId::Saturation => "beta=1, gamma=0: every exposed node is infected each step",
            ScenarioId::Dormant => "beta=0, gamma=0: the partition never changes",
            ScenarioId::NoSpread => "beta=0: only the seeds are ever infected",
            ScenarioId::NoRecovery => "gamma=0: nobody ever recovers",
            ScenarioId::Fragmented => "p=0.001: disconnected, path length over the giant component",
            ScenarioId::Dense => "200 nodes, p=0.2: connected network, short paths",
        }
    }

    /// Returns the parameters for this scenario.
    pub fn params(&self) -> ScenarioParams {
        let baseline = ScenarioParams {
            node_count: 1000,
            initial_infected: 5,
            edge_probability: 0.005,
            infection_rate: 0.3,
            recovery_rate: 0.1,
            max_steps: 500,
        };

        match self {
            ScenarioId::Baseline => baseline,
            ScenarioId::Saturation => ScenarioParams {
                node_count: 300,
                initial_infected: 3,
                edge_probability: 0.01,
                infection_rate: 1.0,
                recovery_rate: 0.0,
                max_steps: 60,
                ..baseline
            },
            ScenarioId::Dormant => ScenarioParams {
                node_count: 500,
                infection_rate: 0.0,
                recovery_rate: 0.0,
                max_steps: 25,
                ..baseline
            },
            ScenarioId::NoSpread => ScenarioParams {
                node_count: 500,
                initial_infected: 10,
                infection_rate: 0.0,
                recovery_rate: 0.5,
                ..baseline
            },
            ScenarioId::NoRecovery => ScenarioParams {
                node_count: 500,
                edge_probability: 0.01,
                recovery_rate: 0.0,
                max_steps: 100,
                ..baseline
            },
            ScenarioId::Fragmented => ScenarioParams {
                edge_probability: 0.001,
                ..baseline
            },
            ScenarioId::Dense => ScenarioParams {
                node_count: 200,
                edge_probability: 0.2,
                ..baseline
            },
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "baseline" | "default" => Ok(ScenarioId::Baseline),
            "saturation" | "flood" => Ok(ScenarioId::Saturation),
            "dormant" | "frozen" => Ok(ScenarioId::Dormant),
            "no_spread" | "nospread" => Ok(ScenarioId::NoSpread),
            "no_recovery" | "norecovery" => Ok(ScenarioId::NoRecovery),
            "fragmented" | "sparse" => Ok(ScenarioId::Fragmented),
            "dense" => Ok(ScenarioId::Dense),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_roundtrip_names() {
        for scenario in ScenarioId::all() {
            let parsed: ScenarioId = scenario.name().parse().unwrap();
            assert_eq!(parsed, scenario);
            assert_eq!(scenario.to_string(), scenario.name());
        }
    }

    #[test]
    fn test_scenario_aliases() {
        assert_eq!("No-Spread".parse::<ScenarioId>().unwrap(), ScenarioId::NoSpread);
        assert_eq!("flood".parse::<ScenarioId>().unwrap(), ScenarioId::Saturation);
        assert!("time_warp".parse::<ScenarioId>().is_err());
    }

    #[test]
    fn test_scenario_params_are_valid() {
        for scenario in ScenarioId::all() {
            let p = scenario.params();
            assert!(p.initial_infected >= 1 && p.initial_infected <= p.node_count);
            assert!((0.0..=1.0).contains(&p.edge_probability));
            assert!((0.0..=1.0).contains(&p.infection_rate));
            assert!((0.0..=1.0).contains(&p.recovery_rate));
            assert!(p.max_steps > 0);
        }
    }

    #[test]
    fn test_baseline_matches_request_defaults() {
        let p = ScenarioId::Baseline.params();
        assert_eq!(p.node_count, 1000);
        assert_eq!(p.initial_infected, 5);
        assert_eq!(p.edge_probability, 0.005);
        assert_eq!(p.infection_rate, 0.3);
        assert_eq!(p.recovery_rate, 0.1);
    }
}
