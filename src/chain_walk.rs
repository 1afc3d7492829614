//! Walks over the chains of a cactus decomposition.

use crate::cactus::{CactusGraph, EdgeEndId};
use crate::pinch::{BlockId, ThreadSet};

/// Visit the block behind every edge of the chain starting at `chain_start`.
///
/// The walk alternates the other-edge-end and link relations and stops once
/// it reaches a chain end again, so each chain is visited once. With
/// `recursive`, every chain rooted at an intermediate node is walked as well
/// before the walk continues along the current chain.
///
/// Panics if either relation stops being an involution.
pub fn walk_chain<F>(graph: &CactusGraph, chain_start: EdgeEndId, recursive: bool, visit: &mut F)
where
    F: FnMut(BlockId),
{
    let mut edge_end = chain_start;
    loop {
        visit(graph.object(edge_end).block);
        edge_end = graph.other_edge_end(edge_end);
        if graph.is_chain_end(edge_end) {
            break;
        }
        if recursive {
            let node = graph.node(edge_end);
            for &nested in graph.node_edge_ends(node) {
                if graph.is_chain_start(nested) {
                    walk_chain(graph, nested, true, visit);
                }
            }
        }
        edge_end = graph.link(edge_end);
    }
}

/// Total length of the chain's blocks, thread-end blocks excluded.
pub fn chain_length(threads: &ThreadSet, graph: &CactusGraph, chain_start: EdgeEndId) -> i64 {
    let mut length = 0;
    walk_chain(graph, chain_start, false, &mut |block| {
        if !threads.is_thread_end(block) {
            length += threads.block_length(block).unwrap_or(0);
        }
    });
    length
}

/// Append the chain's blocks, thread-end blocks excluded, to `blocks`.
pub fn collect_chain_blocks(
    threads: &ThreadSet,
    graph: &CactusGraph,
    chain_start: EdgeEndId,
    blocks: &mut Vec<BlockId>,
) {
    walk_chain(graph, chain_start, false, &mut |block| {
        if !threads.is_thread_end(block) {
            blocks.push(block);
        }
    });
}
