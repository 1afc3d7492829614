//! Cactus decomposition of the alignment graph.
//!
//! Nodes and edge-ends live in index arenas. Every edge-end records the node
//! it is attached to, the block end it stands for, its structural partner
//! (the opposite end of the same edge) and, inside a chain, its link partner.
//! Both relations are involutions and are checked every time they are read.

use crate::error::{inconsistent, CafError};
use crate::pinch::{BlockId, PinchEnd, ThreadSet};

pub type NodeId = usize;
pub type EdgeEndId = usize;

#[derive(Debug, Clone, Default)]
pub struct CactusNode {
    edge_ends: Vec<EdgeEndId>,
}

#[derive(Debug, Clone)]
pub struct EdgeEnd {
    node: NodeId,
    object: PinchEnd,
    other: EdgeEndId,
    link: Option<EdgeEndId>,
    chain_end: bool,
    link_orientation: bool,
}

#[derive(Debug, Clone, Default)]
pub struct CactusGraph {
    nodes: Vec<CactusNode>,
    edge_ends: Vec<EdgeEnd>,
}

impl CactusGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self) -> NodeId {
        self.nodes.push(CactusNode::default());
        self.nodes.len() - 1
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node_ids(&self) -> std::ops::Range<NodeId> {
        0..self.nodes.len()
    }

    pub fn edge_end_count(&self) -> usize {
        self.edge_ends.len()
    }

    /// Edge-ends attached to a node.
    pub fn node_edge_ends(&self, node: NodeId) -> &[EdgeEndId] {
        &self.nodes[node].edge_ends
    }

    /// Add an edge standing for a block: `from_end` attached at `from`,
    /// `to_end` attached at `to`. Returns both edge-ends.
    pub fn add_edge(
        &mut self,
        from: NodeId,
        from_end: PinchEnd,
        to: NodeId,
        to_end: PinchEnd,
    ) -> (EdgeEndId, EdgeEndId) {
        let a = self.edge_ends.len();
        let b = a + 1;
        self.edge_ends.push(EdgeEnd {
            node: from,
            object: from_end,
            other: b,
            link: None,
            chain_end: false,
            link_orientation: false,
        });
        self.edge_ends.push(EdgeEnd {
            node: to,
            object: to_end,
            other: a,
            link: None,
            chain_end: false,
            link_orientation: false,
        });
        self.nodes[from].edge_ends.push(a);
        self.nodes[to].edge_ends.push(b);
        (a, b)
    }

    /// Lay out a chain starting and ending at `start`. Each step
    /// `(block, orientation, next)` adds an edge from the current node to
    /// `next`, entering the block by its `orientation` side. The last step must
    /// return to `start`. Returns the chain-start edge-end.
    pub fn add_chain(
        &mut self,
        start: NodeId,
        steps: &[(BlockId, bool, NodeId)],
    ) -> Result<EdgeEndId, CafError> {
        let Some(&(_, _, last)) = steps.last() else {
            return Err(inconsistent("A chain needs at least one edge"));
        };
        if last != start {
            return Err(inconsistent(format!(
                "Chain starting at node {} ends at node {}",
                start, last
            )));
        }
        if let Some(&(_, _, bad)) = steps.iter().find(|&&(_, _, n)| n >= self.nodes.len()) {
            return Err(CafError::Missing {
                kind: "cactus node",
                name: bad as u64,
            });
        }

        let mut current = start;
        let mut edges = Vec::with_capacity(steps.len());
        for &(block, orientation, next) in steps {
            let from_end = PinchEnd::new(block, orientation);
            edges.push(self.add_edge(current, from_end, next, from_end.opposite()));
            current = next;
        }
        for (i, &(outgoing, incoming)) in edges.iter().enumerate() {
            self.edge_ends[outgoing].link_orientation = true;
            self.edge_ends[incoming].link_orientation = false;
            let following = edges[(i + 1) % edges.len()].0;
            self.edge_ends[incoming].link = Some(following);
            self.edge_ends[following].link = Some(incoming);
        }
        let (chain_start, _) = edges[0];
        let (_, chain_close) = edges[edges.len() - 1];
        self.edge_ends[chain_start].chain_end = true;
        self.edge_ends[chain_close].chain_end = true;
        Ok(chain_start)
    }

    pub fn node(&self, edge_end: EdgeEndId) -> NodeId {
        self.edge_ends[edge_end].node
    }

    /// Block end standing behind an edge-end
    pub fn object(&self, edge_end: EdgeEndId) -> PinchEnd {
        self.edge_ends[edge_end].object
    }

    pub fn is_chain_end(&self, edge_end: EdgeEndId) -> bool {
        self.edge_ends[edge_end].chain_end
    }

    pub fn link_orientation(&self, edge_end: EdgeEndId) -> bool {
        self.edge_ends[edge_end].link_orientation
    }

    /// Chain-start edge-ends carry both flags.
    pub fn is_chain_start(&self, edge_end: EdgeEndId) -> bool {
        self.is_chain_end(edge_end) && self.link_orientation(edge_end)
    }

    /// The opposite end of the same edge.
    pub fn other_edge_end(&self, edge_end: EdgeEndId) -> EdgeEndId {
        let other = self.edge_ends[edge_end].other;
        assert_eq!(
            self.edge_ends[other].other, edge_end,
            "other edge-end relation is not an involution at {}",
            edge_end
        );
        other
    }

    pub fn other_node(&self, edge_end: EdgeEndId) -> NodeId {
        self.node(self.other_edge_end(edge_end))
    }

    /// Link partner of a chain member.
    pub fn link(&self, edge_end: EdgeEndId) -> EdgeEndId {
        let link = self.edge_ends[edge_end]
            .link
            .unwrap_or_else(|| panic!("Edge-end {} is not part of a chain", edge_end));
        assert_eq!(
            self.edge_ends[link].link,
            Some(edge_end),
            "link relation is not an involution at {}",
            edge_end
        );
        link
    }

    /// Number of chains rooted at a node
    pub fn chain_number(&self, node: NodeId) -> usize {
        self.nodes[node]
            .edge_ends
            .iter()
            .filter(|&&e| self.is_chain_start(e))
            .count()
    }
}

/// Parameters handed to the decomposition builder.
#[derive(Debug, Clone, PartialEq)]
pub struct DecompositionParams {
    pub minimum_node_degree: usize,
    pub maximum_chain_length: i64,
    pub minimum_score: f64,
    pub break_chains_at_reverse_tandems: bool,
    pub maximum_median_spacing_between_linked_ends: i64,
}

impl DecompositionParams {
    /// Settings used by the melting passes: no degree floor, no chain length
    /// ceiling, no score floor.
    pub fn for_melting(
        break_chains_at_reverse_tandems: bool,
        maximum_median_spacing_between_linked_ends: i64,
    ) -> Self {
        Self {
            minimum_node_degree: 0,
            maximum_chain_length: i64::MAX,
            minimum_score: 0.0,
            break_chains_at_reverse_tandems,
            maximum_median_spacing_between_linked_ends,
        }
    }
}

/// A cactus graph together with its root node.
#[derive(Debug, Clone)]
pub struct Decomposition {
    pub graph: CactusGraph,
    pub root: NodeId,
    pub dead_end_component: Vec<NodeId>,
}

/// Builds a cactus decomposition for the current state of a thread set.
pub trait DecompositionBuilder {
    fn build(
        &mut self,
        threads: &ThreadSet,
        params: &DecompositionParams,
    ) -> Result<Decomposition, CafError>;
}

impl<F> DecompositionBuilder for F
where
    F: FnMut(&ThreadSet, &DecompositionParams) -> Result<Decomposition, CafError>,
{
    fn build(
        &mut self,
        threads: &ThreadSet,
        params: &DecompositionParams,
    ) -> Result<Decomposition, CafError> {
        self(threads, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_chain_links_and_flags() {
        let mut graph = CactusGraph::new();
        let root = graph.add_node();
        let n1 = graph.add_node();
        let n2 = graph.add_node();
        let start = graph
            .add_chain(root, &[(10, true, n1), (11, true, n2), (12, false, root)])
            .unwrap();

        assert!(graph.is_chain_start(start));
        assert_eq!(graph.node(start), root);
        assert_eq!(graph.object(start), PinchEnd::new(10, true));

        let arrived = graph.other_edge_end(start);
        assert_eq!(graph.node(arrived), n1);
        assert_eq!(graph.object(arrived), PinchEnd::new(10, false));
        assert!(!graph.is_chain_end(arrived));

        let leaving = graph.link(arrived);
        assert_eq!(graph.node(leaving), n1);
        assert_eq!(graph.object(leaving), PinchEnd::new(11, true));

        let closing = graph.link(start);
        assert_eq!(graph.node(closing), root);
        assert!(graph.is_chain_end(closing));
        assert!(!graph.link_orientation(closing));
        assert_eq!(graph.object(closing), PinchEnd::new(12, true));

        assert_eq!(graph.chain_number(root), 1);
        assert_eq!(graph.chain_number(n1), 0);
    }

    #[test]
    fn test_self_loop_chain() {
        let mut graph = CactusGraph::new();
        let root = graph.add_node();
        let start = graph.add_chain(root, &[(3, true, root)]).unwrap();
        let other = graph.other_edge_end(start);
        assert_eq!(graph.link(start), other);
        assert!(graph.is_chain_end(other));
        assert_eq!(graph.other_node(start), root);
    }

    #[test]
    fn test_add_chain_rejects_open_paths() {
        let mut graph = CactusGraph::new();
        let root = graph.add_node();
        let n1 = graph.add_node();
        assert!(graph.add_chain(root, &[]).is_err());
        assert!(graph.add_chain(root, &[(1, true, n1)]).is_err());
        assert!(graph.add_chain(root, &[(1, true, 9), (2, true, root)]).is_err());
        assert_eq!(graph.edge_end_count(), 0);
    }

    #[test]
    fn test_closure_builder() {
        let mut builder = |_: &ThreadSet, params: &DecompositionParams| {
            assert_eq!(params.maximum_chain_length, i64::MAX);
            let mut graph = CactusGraph::new();
            let root = graph.add_node();
            Ok::<_, CafError>(Decomposition {
                graph,
                root,
                dead_end_component: Vec::new(),
            })
        };
        let decomposition = builder
            .build(&ThreadSet::new(), &DecompositionParams::for_melting(true, 50))
            .unwrap();
        assert_eq!(decomposition.graph.node_count(), 1);
    }
}
