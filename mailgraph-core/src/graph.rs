//! Connectivity graph mirroring what the renderer holds.
//!
//! Uses petgraph's DiGraph with one node per entity and one edge per
//! relation. Connectivity degree counts every edge touching a node in
//! either direction, which is what the renderer reports and what the
//! degree filter compares against. It is unrelated to the send count.

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

use crate::dataset::Dataset;
use crate::types::EntityId;

/// Anything that can report the live connectivity degree of an entity.
pub trait DegreeSource {
    fn connectivity_degree(&self, id: &str) -> usize;
}

/// The graph of entities and relations, keyed by entity id.
///
/// Edge weights are indices into [`Dataset::relations`].
#[derive(Debug, Clone, Default)]
pub struct RelationGraph {
    graph: DiGraph<EntityId, usize>,
    nodes: HashMap<EntityId, NodeIndex>,
    unresolved: usize,
}

impl RelationGraph {
    /// Build the graph from a dataset.
    ///
    /// A relation whose endpoint is not a known entity cannot be drawn and is
    /// left out of the graph.
    pub fn build(dataset: &Dataset) -> Self {
        let mut graph = DiGraph::with_capacity(dataset.entities().len(), dataset.relations().len());
        let mut nodes = HashMap::with_capacity(dataset.entities().len());
        for entity in dataset.entities() {
            let idx = graph.add_node(entity.id.clone());
            nodes.insert(entity.id.clone(), idx);
        }

        let mut unresolved = 0;
        for (i, relation) in dataset.relations().iter().enumerate() {
            if relation.is_self() {
                continue;
            }
            match (nodes.get(&relation.source), nodes.get(&relation.target)) {
                (Some(&from), Some(&to)) => {
                    graph.add_edge(from, to, i);
                }
                _ => {
                    debug!(relation = %relation.id, "Relation endpoint not in entity set");
                    unresolved += 1;
                }
            }
        }

        Self {
            graph,
            nodes,
            unresolved,
        }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Relations that could not be placed in the graph.
    pub fn unresolved_count(&self) -> usize {
        self.unresolved
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Number of edges touching the entity, counted regardless of direction.
    pub fn degree(&self, id: &str) -> usize {
        self.nodes.get(id).map_or(0, |&idx| {
            self.graph.edges_directed(idx, Direction::Outgoing).count()
                + self.graph.edges_directed(idx, Direction::Incoming).count()
        })
    }

    /// Largest connectivity degree in the graph.
    pub fn max_degree(&self) -> usize {
        self.nodes.keys().map(|id| self.degree(id)).max().unwrap_or(0)
    }

    /// Entities adjacent to `id` in either direction, sorted and deduplicated.
    pub fn neighbours(&self, id: &str) -> Vec<&str> {
        let Some(&idx) = self.nodes.get(id) else {
            return Vec::new();
        };
        let set: BTreeSet<&str> = self
            .graph
            .neighbors_undirected(idx)
            .map(|n| self.graph[n].as_str())
            .collect();
        set.into_iter().collect()
    }

    /// Dataset indices of every relation touching `id`, ascending.
    pub fn connected_relations(&self, id: &str) -> Vec<usize> {
        let Some(&idx) = self.nodes.get(id) else {
            return Vec::new();
        };
        let mut indices: Vec<usize> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .chain(self.graph.edges_directed(idx, Direction::Incoming))
            .map(|e| *e.weight())
            .collect();
        indices.sort_unstable();
        indices
    }

    /// Dataset indices of relations between `a` and `b` in either direction.
    pub fn relations_between(&self, a: &str, b: &str) -> Vec<usize> {
        let (Some(&ia), Some(&ib)) = (self.nodes.get(a), self.nodes.get(b)) else {
            return Vec::new();
        };
        let mut indices: Vec<usize> = self
            .graph
            .edges_connecting(ia, ib)
            .chain(self.graph.edges_connecting(ib, ia))
            .map(|e| *e.weight())
            .collect();
        indices.sort_unstable();
        indices.dedup();
        indices
    }
}

impl DegreeSource for RelationGraph {
    fn connectivity_degree(&self, id: &str) -> usize {
        self.degree(id)
    }
}

impl DegreeSource for HashMap<EntityId, usize> {
    fn connectivity_degree(&self, id: &str) -> usize {
        self.get(id).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Entity, EntityKind, Relation};

    fn sample() -> Dataset {
        let entities = ["a", "b", "c", "d"]
            .into_iter()
            .map(|id| Entity::new(id, id.to_uppercase(), EntityKind::EnronAddress));
        let relations = vec![
            Relation::new("1", "a", "b", None),
            Relation::new("2", "b", "a", None),
            Relation::new("3", "b", "c", None),
            Relation::new("4", "c", "ghost", None),
        ];
        Dataset::from_parts(entities, relations).0
    }

    #[test]
    fn test_build_skips_unresolved() {
        let graph = RelationGraph::build(&sample());
        assert_eq!(graph.node_count(), 4);
        assert_eq!(graph.edge_count(), 3);
        assert_eq!(graph.unresolved_count(), 1);
    }

    #[test]
    fn test_degree_counts_both_directions() {
        let graph = RelationGraph::build(&sample());
        assert_eq!(graph.degree("a"), 2);
        assert_eq!(graph.degree("b"), 3);
        assert_eq!(graph.degree("c"), 1);
        assert_eq!(graph.degree("d"), 0);
        assert_eq!(graph.degree("ghost"), 0);
        assert_eq!(graph.max_degree(), 3);
        assert_eq!(graph.connectivity_degree("b"), 3);
    }

    #[test]
    fn test_neighbours_are_deduplicated() {
        let graph = RelationGraph::build(&sample());
        assert_eq!(graph.neighbours("a"), vec!["b"]);
        assert_eq!(graph.neighbours("b"), vec!["a", "c"]);
        assert!(graph.neighbours("d").is_empty());
    }

    #[test]
    fn test_connected_and_between() {
        let graph = RelationGraph::build(&sample());
        assert_eq!(graph.connected_relations("b"), vec![0, 1, 2]);
        assert_eq!(graph.relations_between("a", "b"), vec![0, 1]);
        assert_eq!(graph.relations_between("b", "a"), vec![0, 1]);
        assert!(graph.relations_between("a", "c").is_empty());
    }

    #[test]
    fn test_degree_source_from_map() {
        let mut degrees: HashMap<EntityId, usize> = HashMap::new();
        degrees.insert("x".into(), 7);
        assert_eq!(degrees.connectivity_degree("x"), 7);
        assert_eq!(degrees.connectivity_degree("y"), 0);
    }
}
