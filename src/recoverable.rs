//! Recoverable chains: chains whose removal a later pass reconstructs from
//! the surrounding structure.
//!
//! A chain below a parent chain is recoverable when its two ends attach to
//! different ends of the parent link (and to nothing on the other side) and
//! do not attach to each other. A chain at the root is recoverable when each
//! of its ends has exactly one neighbouring block end and the two neighbour
//! sets are disjoint.

use crate::cactus::{CactusGraph, DecompositionBuilder, DecompositionParams, EdgeEndId, NodeId};
use crate::chain_walk::{chain_length, collect_chain_blocks};
use crate::error::CafError;
use crate::metadata::{EventTree, SequenceCatalog};
use crate::pinch::{PinchEnd, ThreadSet};
use log::{debug, info, log_enabled, Level};
use rustc_hash::FxHashSet;

/// Metadata used to name block ends in debug output.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiagnosticContext<'a> {
    pub catalog: Option<&'a SequenceCatalog>,
    pub events: Option<&'a EventTree>,
}

impl<'a> DiagnosticContext<'a> {
    pub fn new(catalog: &'a SequenceCatalog, events: &'a EventTree) -> Self {
        Self {
            catalog: Some(catalog),
            events: Some(events),
        }
    }

    /// `genome.header|start-end` for every segment of the end's block.
    pub fn describe_end(&self, threads: &ThreadSet, end: PinchEnd) -> String {
        let Some(block) = threads.block(end.block) else {
            return format!("<destroyed block {}>", end.block);
        };
        block
            .segments()
            .iter()
            .filter_map(|&id| threads.segment(id))
            .map(|segment| {
                let thread_name = threads
                    .thread(segment.thread())
                    .map(|t| t.name())
                    .unwrap_or_default();
                let info = self.catalog.and_then(|c| c.get(thread_name));
                let header = info
                    .map(|i| i.header.clone())
                    .unwrap_or_else(|| thread_name.to_string());
                let genome = info
                    .and_then(|i| self.events.and_then(|e| e.event(i.event)))
                    .map(|e| e.header().to_string())
                    .unwrap_or_else(|| "?".to_string());
                format!("{}.{}|{}-{}", genome, header, segment.start(), segment.end())
            })
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoverabilityStats {
    pub nodes_visited: usize,
    pub chains_visited: usize,
    pub recoverable_chains: usize,
}

/// Whether the chain starting at `child` can be dropped, given the parent
/// chain edge-end `parent` incident to the node the child hangs from.
pub fn chain_is_recoverable_given_parent(
    threads: &ThreadSet,
    graph: &CactusGraph,
    child: EdgeEndId,
    parent: EdgeEndId,
    ctx: &DiagnosticContext,
) -> bool {
    let a1 = graph.object(parent);
    let a2 = graph.object(graph.link(parent));
    let c1 = graph.object(child);
    let c2 = graph.object(graph.link(child));

    let connected1 = threads.connected_ends(c1);
    let connected2 = threads.connected_ends(c2);

    let mut recoverable = false;
    if connected1.contains(&a1) && connected2.contains(&a2) {
        recoverable = !(connected2.contains(&a1) || connected1.contains(&a2));
    } else if connected1.contains(&a2) && connected2.contains(&a1) {
        recoverable = !(connected2.contains(&a2) || connected1.contains(&a1));
    }

    // A duplication links the two child ends to each other.
    if connected1.contains(&c2) {
        debug_assert!(connected2.contains(&c1));
        recoverable = false;
    }

    if log_enabled!(Level::Debug) {
        debug!(
            "c1: {} c2: {} p1: {} p2: {}",
            ctx.describe_end(threads, c1),
            ctx.describe_end(threads, c2),
            ctx.describe_end(threads, a1),
            ctx.describe_end(threads, a2)
        );
        debug!(
            "c1->p1 {} c1->p2 {} c2->p1 {} c2->p2 {} c1->c2 {} => {}",
            connected1.contains(&a1),
            connected1.contains(&a2),
            connected2.contains(&a1),
            connected2.contains(&a2),
            connected1.contains(&c2),
            if recoverable { "recoverable" } else { "unrecoverable" }
        );
    }
    recoverable
}

/// Whether a chain rooted at the root node can be dropped.
pub fn root_chain_is_recoverable(
    threads: &ThreadSet,
    graph: &CactusGraph,
    child: EdgeEndId,
    ctx: &DiagnosticContext,
) -> bool {
    let c1 = graph.object(child);
    let c2 = graph.object(graph.link(child));
    let connected1 = threads.connected_ends(c1);
    let connected2 = threads.connected_ends(c2);
    let shared = connected1.intersection(&connected2).count();
    let recoverable = shared == 0 && connected1.len() == 1 && connected2.len() == 1;

    if log_enabled!(Level::Debug) {
        debug!(
            "Root chain c1: {} c2: {} shared {} sizes {} {} => {}",
            ctx.describe_end(threads, c1),
            ctx.describe_end(threads, c2),
            shared,
            connected1.len(),
            connected2.len(),
            if recoverable { "recoverable" } else { "unrecoverable" }
        );
        for end in &connected1 {
            debug!("  connected to c1: {}", ctx.describe_end(threads, *end));
        }
        for end in &connected2 {
            debug!("  connected to c2: {}", ctx.describe_end(threads, *end));
        }
    }
    recoverable
}

enum Step {
    /// Enter a node through the parent chain edge-end it was reached by
    Enter(NodeId, Option<EdgeEndId>),
    /// Classify the chains rooted at a node once everything below it is done
    Classify(NodeId, Option<EdgeEndId>),
}

/// Chain-start edge-ends of every recoverable chain reachable from `root`.
///
/// Each node is entered with the parent chain edge-end it was reached by;
/// from there the walk descends into the chains hanging off the node and
/// continues along the parent chain until the cycle closes. The chains rooted
/// at a node are classified after both of those walks have finished.
pub fn recoverable_chains(
    threads: &ThreadSet,
    graph: &CactusGraph,
    root: NodeId,
    ctx: &DiagnosticContext,
) -> (Vec<EdgeEndId>, RecoverabilityStats) {
    let mut stats = RecoverabilityStats::default();
    let mut found = Vec::new();
    let mut stack = vec![Step::Enter(root, None)];

    while let Some(step) = stack.pop() {
        match step {
            Step::Enter(node, parent) => {
                stats.nodes_visited += 1;
                stack.push(Step::Classify(node, parent));
                let parent_link = parent.map(|p| graph.link(p));

                if let Some(link) = parent_link {
                    let next = graph.other_edge_end(link);
                    if !graph.is_chain_end(next) {
                        stack.push(Step::Enter(graph.node(next), Some(next)));
                    }
                }

                for &edge_end in graph.node_edge_ends(node).iter().rev() {
                    if Some(edge_end) == parent
                        || Some(edge_end) == parent_link
                        || !graph.link_orientation(edge_end)
                        || graph.other_node(edge_end) == node
                    {
                        continue;
                    }
                    debug_assert!(graph.is_chain_end(edge_end));
                    let other = graph.other_edge_end(edge_end);
                    stack.push(Step::Enter(graph.node(other), Some(other)));
                }
            }
            Step::Classify(node, parent) => {
                for &edge_end in graph.node_edge_ends(node) {
                    if !graph.is_chain_start(edge_end) {
                        continue;
                    }
                    stats.chains_visited += 1;
                    let recoverable = match parent {
                        Some(p) => {
                            chain_is_recoverable_given_parent(threads, graph, edge_end, p, ctx)
                        }
                        None => root_chain_is_recoverable(threads, graph, edge_end, ctx),
                    };
                    if recoverable {
                        stats.recoverable_chains += 1;
                        found.push(edge_end);
                    }
                }
            }
        }
    }
    (found, stats)
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecoverableMeltParams {
    pub break_chains_at_reverse_tandems: bool,
    pub maximum_median_spacing_between_linked_ends: i64,
    /// Recoverable chains longer than this are kept
    pub max_recoverable_chain_length: i64,
}

impl Default for RecoverableMeltParams {
    fn default() -> Self {
        Self {
            break_chains_at_reverse_tandems: true,
            maximum_median_spacing_between_linked_ends: i64::MAX,
            max_recoverable_chain_length: i64::MAX,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoverabilityReport {
    pub stats: RecoverabilityStats,
    pub blocks_destroyed: usize,
    /// Nodes in the decomposition
    pub node_count: usize,
    /// Chains in the decomposition
    pub chain_count: usize,
}

/// Destroy the blocks of every recoverable chain no longer than
/// `max_recoverable_chain_length`.
pub fn melt_recoverable_chains<B>(
    threads: &mut ThreadSet,
    builder: &mut B,
    params: &RecoverableMeltParams,
    ctx: &DiagnosticContext,
) -> Result<RecoverabilityReport, CafError>
where
    B: DecompositionBuilder + ?Sized,
{
    let decomposition = builder.build(
        threads,
        &DecompositionParams::for_melting(
            params.break_chains_at_reverse_tandems,
            params.maximum_median_spacing_between_linked_ends,
        ),
    )?;
    let graph = &decomposition.graph;

    let (chains, stats) = recoverable_chains(threads, graph, decomposition.root, ctx);
    info!(
        "Visited {} cactus nodes while getting recoverable chains",
        stats.nodes_visited
    );
    info!(
        "Found {} / {} recoverable chains",
        stats.recoverable_chains, stats.chains_visited
    );

    let mut to_delete = Vec::new();
    for &chain in &chains {
        let length = chain_length(threads, graph, chain);
        if length > params.max_recoverable_chain_length {
            debug!("Keeping recoverable chain of length {}", length);
            continue;
        }
        collect_chain_blocks(threads, graph, chain, &mut to_delete);
    }
    let mut seen = FxHashSet::default();
    to_delete.retain(|&block| seen.insert(block));

    let node_count = graph.node_count();
    let chain_count = graph.node_ids().map(|n| graph.chain_number(n)).sum();
    drop(decomposition);

    info!("Destroying {} recoverable blocks", to_delete.len());
    for &block in &to_delete {
        threads.destroy_block(block)?;
    }
    info!(
        "There were actually {} nodes and {} chains in the graph",
        node_count, chain_count
    );

    Ok(RecoverabilityReport {
        stats,
        blocks_destroyed: to_delete.len(),
        node_count,
        chain_count,
    })
}
