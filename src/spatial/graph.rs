//! Walking/mode graphs backing the local shortest-path contract used by the
//! Journey Oracle and Candidate Evaluator: `nearest_node` and
//! `shortest_path_length`.

use petgraph::{algo::dijkstra, graph::NodeIndex, graph::UnGraph};
use rstar::{PointDistance, RTree, RTreeObject, AABB};

use crate::shared::Coordinate;

#[derive(Debug, Clone, Copy)]
struct IndexedNode {
    coordinate: Coordinate,
    node: NodeIndex,
}

impl RTreeObject for IndexedNode {
    type Envelope = AABB<[f32; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.coordinate.longitude, self.coordinate.latitude])
    }
}

impl PointDistance for IndexedNode {
    fn distance_2(&self, point: &[f32; 2]) -> f32 {
        let dx = self.coordinate.longitude - point[0];
        let dy = self.coordinate.latitude - point[1];
        dx * dx + dy * dy
    }
}

/// An undirected graph whose nodes carry geographic coordinates and whose
/// edges carry length in meters, plus an R-tree over its nodes for nearest
/// lookup. Immutable after [`WalkGraph::build`].
pub struct WalkGraph {
    graph: UnGraph<Coordinate, f32>,
    index: RTree<IndexedNode>,
}

impl WalkGraph {
    pub fn build(nodes: &[Coordinate], edges: &[(usize, usize, f32)]) -> Self {
        let mut graph = UnGraph::new_undirected();
        let node_indices: Vec<NodeIndex> = nodes.iter().map(|c| graph.add_node(*c)).collect();
        for &(u, v, length_m) in edges {
            graph.add_edge(node_indices[u], node_indices[v], length_m);
        }
        let index = RTree::bulk_load(
            nodes
                .iter()
                .zip(node_indices.iter())
                .map(|(coordinate, &node)| IndexedNode {
                    coordinate: *coordinate,
                    node,
                })
                .collect(),
        );
        Self { graph, index }
    }

    pub fn nearest_node(&self, point: Coordinate) -> Option<Coordinate> {
        self.index
            .nearest_neighbor(&[point.longitude, point.latitude])
            .map(|n| n.coordinate)
    }

    /// Dijkstra shortest-path length in meters between the nodes nearest
    /// `from` and `to`. `None` if either endpoint has no nearby node or no
    /// path exists.
    pub fn shortest_path_length(&self, from: Coordinate, to: Coordinate) -> Option<f64> {
        let start = self
            .index
            .nearest_neighbor(&[from.longitude, from.latitude])?
            .node;
        let goal = self
            .index
            .nearest_neighbor(&[to.longitude, to.latitude])?
            .node;
        if start == goal {
            return Some(0.0);
        }
        let distances = dijkstra(&self.graph, start, Some(goal), |edge| *edge.weight());
        distances.get(&goal).map(|&d| d as f64)
    }
}

impl Default for WalkGraph {
    fn default() -> Self {
        Self::build(&[], &[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(lat: f32, lon: f32) -> Coordinate {
        Coordinate {
            latitude: lat,
            longitude: lon,
        }
    }

    #[test]
    fn shortest_path_sums_edge_weights() {
        let nodes = vec![c(0.0, 0.0), c(0.0, 1.0), c(0.0, 2.0)];
        let edges = vec![(0, 1, 100.0), (1, 2, 150.0)];
        let graph = WalkGraph::build(&nodes, &edges);
        let length = graph.shortest_path_length(c(0.0, 0.0), c(0.0, 2.0)).unwrap();
        assert_eq!(length, 250.0);
    }

    #[test]
    fn same_nearest_node_is_zero_length() {
        let nodes = vec![c(0.0, 0.0), c(0.0, 1.0)];
        let edges = vec![(0, 1, 100.0)];
        let graph = WalkGraph::build(&nodes, &edges);
        let length = graph
            .shortest_path_length(c(0.0001, 0.0001), c(0.0, 0.0))
            .unwrap();
        assert_eq!(length, 0.0);
    }

    #[test]
    fn empty_graph_has_no_path() {
        let graph = WalkGraph::default();
        assert!(graph.shortest_path_length(c(0.0, 0.0), c(1.0, 1.0)).is_none());
    }
}
