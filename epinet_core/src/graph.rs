//! Contact Network Module
//! ======================
//!
//! Undirected simple graphs over node ids `0..n` and the Erdős–Rényi
//! generator that builds them.
//!
//! A [`Graph`] is immutable once built: the same instance is reused for
//! every step of a simulation run, only the compartment partition changes.

use crate::error::{EpidemicError, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};

// =============================================================================
// GRAPH
// =============================================================================

/// Undirected simple graph stored as sorted adjacency lists.
///
/// No self-loops, no multi-edges. Neighbour lists are kept in ascending
/// order so iteration over a node's neighbours is deterministic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Graph {
    adjacency: Vec<Vec<usize>>,
    edge_count: usize,
}

impl Graph {
    /// Creates a graph with `node_count` isolated nodes.
    pub fn empty(node_count: usize) -> Self {
        Self {
            adjacency: vec![Vec::new(); node_count],
            edge_count: 0,
        }
    }

    /// Builds a graph from an explicit edge list.
    ///
    /// Duplicate edges (in either orientation) are collapsed. Self-loops and
    /// endpoints outside `0..node_count` are rejected.
    pub fn from_edges(node_count: usize, edges: &[(usize, usize)]) -> Result<Self> {
        let mut graph = Self::empty(node_count);
        for &(u, v) in edges {
            if u >= node_count || v >= node_count {
                return Err(EpidemicError::invalid(
                    "edges",
                    format!("edge ({u}, {v}) references a node outside 0..{node_count}"),
                ));
            }
            if u == v {
                return Err(EpidemicError::invalid(
                    "edges",
                    format!("self-loop on node {u}"),
                ));
            }
            graph.insert_edge(u, v);
        }
        Ok(graph)
    }

    /// Complete graph K_n.
    pub fn complete(node_count: usize) -> Self {
        let mut graph = Self::empty(node_count);
        for u in 0..node_count {
            for v in (u + 1)..node_count {
                graph.push_edge(u, v);
            }
        }
        graph
    }

    /// Inserts an edge keeping adjacency sorted. Returns false if present.
    fn insert_edge(&mut self, u: usize, v: usize) -> bool {
        match self.adjacency[u].binary_search(&v) {
            Ok(_) => false,
            Err(pos_u) => {
                self.adjacency[u].insert(pos_u, v);
                if let Err(pos_v) = self.adjacency[v].binary_search(&u) {
                    self.adjacency[v].insert(pos_v, u);
                }
                self.edge_count += 1;
                true
            }
        }
    }

    /// Appends an edge `u < v` when pairs are visited in lexicographic order.
    ///
    /// Visiting pairs `(u, v)` with `u` ascending then `v` ascending keeps
    /// every adjacency list sorted without a search.
    fn push_edge(&mut self, u: usize, v: usize) {
        debug_assert!(u < v);
        self.adjacency[u].push(v);
        self.adjacency[v].push(u);
        self.edge_count += 1;
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    /// Number of undirected edges.
    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// Returns true if the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.adjacency.is_empty()
    }

    /// Node ids in ascending order.
    pub fn nodes(&self) -> std::ops::Range<usize> {
        0..self.adjacency.len()
    }

    /// Sorted neighbours of `node`.
    pub fn neighbors(&self, node: usize) -> &[usize] {
        &self.adjacency[node]
    }

    /// Degree of `node`.
    pub fn degree(&self, node: usize) -> usize {
        self.adjacency[node].len()
    }

    /// Returns true if `u` and `v` are adjacent.
    pub fn has_edge(&self, u: usize, v: usize) -> bool {
        u < self.adjacency.len() && self.adjacency[u].binary_search(&v).is_ok()
    }

    /// Iterates edges as `(u, v)` with `u < v`, in lexicographic order.
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.adjacency
            .iter()
            .enumerate()
            .flat_map(|(u, neighbors)| {
                neighbors
                    .iter()
                    .copied()
                    .filter(move |&v| u < v)
                    .map(move |v| (u, v))
            })
    }

    /// Projection for renderers: node list plus link list.
    pub fn topology(&self) -> TopologyView {
        TopologyView {
            nodes: self.nodes().map(|id| NodeView { id }).collect(),
            links: self
                .edges()
                .map(|(source, target)| LinkView { source, target })
                .collect(),
        }
    }
}

// =============================================================================
// TOPOLOGY VIEW
// =============================================================================

/// A node as seen by a front end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeView {
    pub id: usize,
}

/// An undirected link as seen by a front end (`source < target`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkView {
    pub source: usize,
    pub target: usize,
}

/// Derived view of a [`Graph`]. Carries no state of its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyView {
    pub nodes: Vec<NodeView>,
    pub links: Vec<LinkView>,
}

// =============================================================================
// ERDŐS–RÉNYI GENERATOR
// =============================================================================

/// G(n, p) random graph generator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NetworkGenerator {
    node_count: usize,
    edge_probability: f64,
}

impl NetworkGenerator {
    /// Creates a generator, rejecting out-of-domain parameters.
    ///
    /// `node_count` must be at least 1; `edge_probability` must be a finite
    /// value in `[0, 1]`. Tighter deployment bounds are the caller's concern.
    pub fn new(node_count: usize, edge_probability: f64) -> Result<Self> {
        if node_count == 0 {
            return Err(EpidemicError::invalid(
                "node_count",
                "a network needs at least one node",
            ));
        }
        if !edge_probability.is_finite() || !(0.0..=1.0).contains(&edge_probability) {
            return Err(EpidemicError::invalid(
                "edge_probability",
                format!("{edge_probability} is not a probability in [0, 1]"),
            ));
        }
        Ok(Self {
            node_count,
            edge_probability,
        })
    }

    pub fn node_count(&self) -> usize {
        self.node_count
    }

    pub fn edge_probability(&self) -> f64 {
        self.edge_probability
    }

    /// Expected number of edges, p·n(n-1)/2.
    pub fn expected_edges(&self) -> f64 {
        let n = self.node_count as f64;
        self.edge_probability * n * (n - 1.0) / 2.0
    }

    /// Draws one graph.
    ///
    /// Every unordered pair gets one independent uniform draw, so each edge is
    /// present with probability exactly `p` regardless of node order.
    pub fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> Graph {
        let n = self.node_count;
        let p = self.edge_probability;

        if p <= 0.0 {
            return Graph::empty(n);
        }
        if p >= 1.0 {
            return Graph::complete(n);
        }

        let mut graph = Graph::empty(n);
        for u in 0..n {
            for v in (u + 1)..n {
                if rng.gen::<f64>() < p {
                    graph.push_edge(u, v);
                }
            }
        }
        graph
    }
}

/// Convenience wrapper: validate and draw in one call.
pub fn generate<R: Rng + ?Sized>(
    node_count: usize,
    edge_probability: f64,
    rng: &mut R,
) -> Result<Graph> {
    Ok(NetworkGenerator::new(node_count, edge_probability)?.generate(rng))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_generator_node_count_includes_isolated_nodes() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let graph = generate(250, 0.001, &mut rng).unwrap();
        assert_eq!(graph.node_count(), 250);
    }

    #[test]
    fn test_generator_extreme_probabilities() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let empty = generate(20, 0.0, &mut rng).unwrap();
        assert_eq!(empty.edge_count(), 0);

        let full = generate(20, 1.0, &mut rng).unwrap();
        assert_eq!(full.edge_count(), 20 * 19 / 2);
        assert_eq!(full, Graph::complete(20));
    }

    #[test]
    fn test_generator_rejects_out_of_domain() {
        assert!(matches!(
            NetworkGenerator::new(0, 0.5),
            Err(EpidemicError::InvalidParameter { name: "node_count", .. })
        ));
        assert!(NetworkGenerator::new(10, -0.1).is_err());
        assert!(NetworkGenerator::new(10, 1.5).is_err());
        assert!(NetworkGenerator::new(10, f64::NAN).is_err());
        assert!(NetworkGenerator::new(1, 1.0).is_ok());
    }

    #[test]
    fn test_generator_deterministic_for_seed() {
        let gen = NetworkGenerator::new(300, 0.01).unwrap();
        let g1 = gen.generate(&mut ChaCha8Rng::seed_from_u64(42));
        let g2 = gen.generate(&mut ChaCha8Rng::seed_from_u64(42));
        let g3 = gen.generate(&mut ChaCha8Rng::seed_from_u64(43));

        assert_eq!(g1, g2);
        assert_ne!(g1, g3);
    }

    #[test]
    fn test_generator_edge_count_near_expectation() {
        let gen = NetworkGenerator::new(1000, 0.005).unwrap();
        let graph = gen.generate(&mut ChaCha8Rng::seed_from_u64(99));

        // Expected 2497.5 edges, std dev about 50
        let expected = gen.expected_edges();
        let observed = graph.edge_count() as f64;
        assert!((observed - expected).abs() < 300.0, "observed {observed}");
    }

    #[test]
    fn test_generated_graph_is_simple_and_sorted() {
        let graph = generate(200, 0.05, &mut ChaCha8Rng::seed_from_u64(5)).unwrap();
        for u in graph.nodes() {
            let neighbors = graph.neighbors(u);
            assert!(!neighbors.contains(&u));
            assert!(neighbors.windows(2).all(|w| w[0] < w[1]));
            for &v in neighbors {
                assert!(graph.has_edge(v, u));
            }
        }
        assert_eq!(graph.edges().count(), graph.edge_count());
    }

    #[test]
    fn test_from_edges_dedups_and_validates() {
        let graph = Graph::from_edges(4, &[(0, 1), (1, 0), (2, 3), (3, 1)]).unwrap();
        assert_eq!(graph.edge_count(), 3);
        assert_eq!(graph.neighbors(1), &[0, 3]);

        assert!(Graph::from_edges(3, &[(1, 1)]).is_err());
        assert!(Graph::from_edges(3, &[(0, 3)]).is_err());
    }

    #[test]
    fn test_topology_projection() {
        let graph = Graph::from_edges(3, &[(2, 0), (1, 2)]).unwrap();
        let view = graph.topology();

        assert_eq!(view.nodes.len(), 3);
        assert_eq!(
            view.links,
            vec![
                LinkView { source: 0, target: 2 },
                LinkView { source: 1, target: 2 },
            ]
        );
    }
}
