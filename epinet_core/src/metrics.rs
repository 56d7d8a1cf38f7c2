//! Network Metrics Module
//! ======================
//!
//! Descriptive statistics for a contact network snapshot:
//! - **Average degree**: mean node degree, isolated nodes included as 0
//! - **Clustering coefficient**: mean local clustering over all nodes
//! - **Average path length**: mean unweighted shortest-path length
//!
//! # Disconnected graphs
//!
//! The average path length is only defined between reachable pairs. When the
//! graph is disconnected the calculator does not fail and does not report
//! infinity: it measures the largest connected component instead. The
//! denominator therefore changes silently with connectivity;
//! [`NetworkMetrics::path_length_component_size`] records how many nodes the
//! value was measured over so callers can tell the two cases apart.

use crate::error::{EpidemicError, Result};
use crate::graph::Graph;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Metrics computed for one graph snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NetworkMetrics {
    /// Sum of degrees divided by node count
    pub average_degree: f64,
    /// Mean local clustering coefficient, in [0, 1]
    pub clustering_coefficient: f64,
    /// Mean shortest-path length over the measured component
    pub average_path_length: f64,
    /// Node count of the component the path length was measured over.
    /// Equals the graph's node count when the graph is connected.
    pub path_length_component_size: usize,
}

/// Stateless calculator over [`Graph`] snapshots.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsCalculator;

impl MetricsCalculator {
    /// Computes all metrics from scratch.
    ///
    /// Fails with [`EpidemicError::InvalidGraph`] only when the graph has no
    /// nodes. A single node yields all-zero metrics.
    pub fn compute(&self, graph: &Graph) -> Result<NetworkMetrics> {
        compute_metrics(graph)
    }
}

/// Computes all metrics from scratch. See [`MetricsCalculator::compute`].
pub fn compute_metrics(graph: &Graph) -> Result<NetworkMetrics> {
    if graph.is_empty() {
        return Err(EpidemicError::InvalidGraph(
            "cannot compute metrics for a graph with zero nodes".to_string(),
        ));
    }

    let component = largest_component(graph);
    let average_path_length = if component.len() == graph.node_count() {
        average_shortest_path_length(graph, None)
    } else {
        average_shortest_path_length(graph, Some(&component))
    };

    Ok(NetworkMetrics {
        average_degree: average_degree(graph),
        clustering_coefficient: average_clustering(graph),
        average_path_length,
        path_length_component_size: component.len(),
    })
}

// =============================================================================
// DEGREE & CLUSTERING
// =============================================================================

/// Sum of all degrees divided by node count (0 for an empty graph).
pub fn average_degree(graph: &Graph) -> f64 {
    if graph.is_empty() {
        return 0.0;
    }
    let degree_sum: usize = graph.nodes().map(|n| graph.degree(n)).sum();
    degree_sum as f64 / graph.node_count() as f64
}

/// Fraction of `node`'s neighbour pairs that are themselves adjacent.
///
/// Nodes with fewer than two neighbours have coefficient 0.
pub fn local_clustering(graph: &Graph, node: usize) -> f64 {
    let neighbors = graph.neighbors(node);
    let k = neighbors.len();
    if k < 2 {
        return 0.0;
    }

    let mut links = 0usize;
    for (i, &a) in neighbors.iter().enumerate() {
        for &b in &neighbors[i + 1..] {
            if graph.has_edge(a, b) {
                links += 1;
            }
        }
    }
    (2.0 * links as f64) / (k * (k - 1)) as f64
}

/// Mean of [`local_clustering`] over every node.
pub fn average_clustering(graph: &Graph) -> f64 {
    if graph.is_empty() {
        return 0.0;
    }
    let total: f64 = graph.nodes().map(|n| local_clustering(graph, n)).sum();
    total / graph.node_count() as f64
}

// =============================================================================
// CONNECTIVITY
// =============================================================================

/// Connected components in discovery order.
///
/// Components are discovered by scanning node ids ascending; each component's
/// node list is sorted.
pub fn connected_components(graph: &Graph) -> Vec<Vec<usize>> {
    let mut visited = vec![false; graph.node_count()];
    let mut components = Vec::new();
    let mut queue = VecDeque::new();

    for start in graph.nodes() {
        if visited[start] {
            continue;
        }
        visited[start] = true;
        queue.push_back(start);
        let mut members = Vec::new();

        while let Some(node) = queue.pop_front() {
            members.push(node);
            for &next in graph.neighbors(node) {
                if !visited[next] {
                    visited[next] = true;
                    queue.push_back(next);
                }
            }
        }

        members.sort_unstable();
        components.push(members);
    }

    components
}

/// Largest connected component. Ties go to the first one discovered.
pub fn largest_component(graph: &Graph) -> Vec<usize> {
    let mut best: Vec<usize> = Vec::new();
    for component in connected_components(graph) {
        if component.len() > best.len() {
            best = component;
        }
    }
    best
}

/// Returns true if every node is reachable from every other.
pub fn is_connected(graph: &Graph) -> bool {
    !graph.is_empty() && largest_component(graph).len() == graph.node_count()
}

// =============================================================================
// SHORTEST PATHS
// =============================================================================

/// Mean BFS distance over ordered pairs of distinct nodes.
///
/// With `restrict_to = None` the whole graph is used and must be connected
/// for the result to be meaningful. With `Some(nodes)` the search runs on the
/// induced subgraph of `nodes`, which must be a connected component (so the
/// induced subgraph and the full graph agree on distances).
///
/// Fewer than two nodes yields 0.
fn average_shortest_path_length(graph: &Graph, restrict_to: Option<&[usize]>) -> f64 {
    let sources: Vec<usize> = match restrict_to {
        Some(nodes) => nodes.to_vec(),
        None => graph.nodes().collect(),
    };
    let n = sources.len();
    if n < 2 {
        return 0.0;
    }

    let mut distance = vec![u32::MAX; graph.node_count()];
    let mut touched = Vec::with_capacity(n);
    let mut queue = VecDeque::with_capacity(n);
    let mut total: u64 = 0;

    for &source in &sources {
        distance[source] = 0;
        touched.push(source);
        queue.push_back(source);

        while let Some(node) = queue.pop_front() {
            let d = distance[node];
            total += u64::from(d);
            for &next in graph.neighbors(node) {
                if distance[next] == u32::MAX {
                    distance[next] = d + 1;
                    touched.push(next);
                    queue.push_back(next);
                }
            }
        }

        for node in touched.drain(..) {
            distance[node] = u32::MAX;
        }
    }

    total as f64 / (n * (n - 1)) as f64
}
