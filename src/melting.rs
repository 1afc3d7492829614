//! Graph reduction: trimming, filtering and short-chain removal.

use crate::cactus::{DecompositionBuilder, DecompositionParams};
use crate::chain_walk::{chain_length, collect_chain_blocks};
use crate::error::CafError;
use crate::pinch::{BlockId, ThreadSet};
use log::{debug, info};
use rustc_hash::FxHashSet;

/// Predicate selecting blocks to delete during filtering.
pub type BlockFilter<'a> = dyn Fn(&ThreadSet, BlockId) -> Result<bool, CafError> + 'a;

#[derive(Debug, Clone, PartialEq)]
pub struct MeltParams {
    /// Positions trimmed from each side of every block
    pub block_end_trim: i64,
    /// Chains shorter than this are removed; values `<= 1` disable the pass
    pub minimum_chain_length: i64,
    pub break_chains_at_reverse_tandems: bool,
    pub maximum_median_spacing_between_linked_ends: i64,
}

impl Default for MeltParams {
    fn default() -> Self {
        Self {
            block_end_trim: 0,
            minimum_chain_length: 1,
            break_chains_at_reverse_tandems: true,
            maximum_median_spacing_between_linked_ends: i64::MAX,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MeltStats {
    pub blocks_trimmed: usize,
    /// Blocks too short to survive the trim
    pub blocks_destroyed_by_trim: usize,
    pub blocks_filtered: usize,
    pub short_chain_blocks_removed: usize,
    pub joins: usize,
}

/// Reduce the alignment graph in place.
///
/// Runs, in order: block-end trimming, the optional block filter, removal of
/// every chain shorter than `minimum_chain_length` (using a decomposition
/// built for this pass and dropped before any block is destroyed) and a final
/// join of trivial boundaries. Thread-end blocks are never touched.
pub fn reduce<B>(
    threads: &mut ThreadSet,
    builder: &mut B,
    block_filter: Option<&BlockFilter>,
    params: &MeltParams,
) -> Result<MeltStats, CafError>
where
    B: DecompositionBuilder + ?Sized,
{
    let mut stats = MeltStats::default();

    if params.block_end_trim > 0 {
        for block in threads.block_ids() {
            if threads.is_thread_end(block) {
                continue;
            }
            threads.trim_block(block, params.block_end_trim)?;
            if threads.block(block).is_some() {
                stats.blocks_trimmed += 1;
            } else {
                stats.blocks_destroyed_by_trim += 1;
            }
        }
        debug!(
            "Trimmed {} blocks by {}, {} too short to keep",
            stats.blocks_trimmed, params.block_end_trim, stats.blocks_destroyed_by_trim
        );
    }

    if let Some(filter) = block_filter {
        for block in threads.block_ids() {
            if !threads.is_thread_end(block) && filter(threads, block)? {
                threads.destroy_block(block)?;
                stats.blocks_filtered += 1;
            }
        }
        debug!("Filtered out {} blocks", stats.blocks_filtered);
    }

    if params.minimum_chain_length > 1 {
        let to_delete = short_chain_blocks(threads, builder, params)?;
        for &block in &to_delete {
            threads.destroy_block(block)?;
        }
        stats.short_chain_blocks_removed = to_delete.len();
        debug!(
            "Removed {} blocks in chains shorter than {}",
            to_delete.len(),
            params.minimum_chain_length
        );
    }

    stats.joins = threads.join_trivial_boundaries();
    info!(
        "Melting removed {} blocks ({} trimmed away, {} filtered, {} in short chains), {} joins, {} blocks left",
        stats.blocks_destroyed_by_trim + stats.blocks_filtered + stats.short_chain_blocks_removed,
        stats.blocks_destroyed_by_trim,
        stats.blocks_filtered,
        stats.short_chain_blocks_removed,
        stats.joins,
        threads.block_count()
    );
    Ok(stats)
}

/// Non-thread-end blocks of every chain shorter than the threshold, each once.
fn short_chain_blocks<B>(
    threads: &ThreadSet,
    builder: &mut B,
    params: &MeltParams,
) -> Result<Vec<BlockId>, CafError>
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

    let mut chain_blocks = Vec::new();
    for node in graph.node_ids() {
        for &edge_end in graph.node_edge_ends(node) {
            if !graph.is_chain_start(edge_end) {
                continue;
            }
            let length = chain_length(threads, graph, edge_end);
            if length < params.minimum_chain_length {
                debug!("Chain at node {} has length {}, removing", node, length);
                collect_chain_blocks(threads, graph, edge_end, &mut chain_blocks);
            }
        }
    }

    let mut seen = FxHashSet::default();
    chain_blocks.retain(|&block| seen.insert(block));
    Ok(chain_blocks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cactus::{CactusGraph, Decomposition};
    use crate::pinch::{PinchEnd, ThreadId};

    fn cap_blocks(threads: &ThreadSet, thread: ThreadId) -> (BlockId, BlockId) {
        let t = threads.thread(thread).unwrap();
        let first = threads.segment(t.first_segment()).unwrap().block().unwrap();
        let last = threads.segment(t.last_segment()).unwrap().block().unwrap();
        (first, last)
    }

    /// One thread with a short block and a long block, each its own chain
    /// hanging off the root chain of thread ends.
    fn two_chain_setup() -> (ThreadSet, BlockId, BlockId, BlockId, BlockId) {
        let mut threads = ThreadSet::new();
        let t = threads.add_thread(1, 0, 100).unwrap();
        let short = threads.construct_block(&[(t, 10, true)], 5).unwrap();
        let long = threads.construct_block(&[(t, 40, true)], 15).unwrap();
        let (cap5, cap3) = cap_blocks(&threads, t);
        (threads, cap5, cap3, short, long)
    }

    fn builder_for(
        cap5: BlockId,
        cap3: BlockId,
        short: BlockId,
        long: BlockId,
    ) -> impl FnMut(&ThreadSet, &DecompositionParams) -> Result<Decomposition, CafError> {
        move |_, params| {
            assert_eq!(params.minimum_node_degree, 0);
            let mut graph = CactusGraph::new();
            let root = graph.add_node();
            let n1 = graph.add_node();
            let n2 = graph.add_node();
            graph.add_chain(root, &[(cap5, false, root), (cap3, true, root)])?;
            graph.add_chain(n1, &[(short, true, n1)])?;
            graph.add_chain(n2, &[(long, true, n2)])?;
            Ok(Decomposition {
                graph,
                root,
                dead_end_component: Vec::new(),
            })
        }
    }

    #[test]
    fn test_short_chain_removed_long_chain_kept() {
        let (mut threads, cap5, cap3, short, long) = two_chain_setup();
        let mut builder = builder_for(cap5, cap3, short, long);
        let params = MeltParams {
            minimum_chain_length: 10,
            ..MeltParams::default()
        };
        let stats = reduce(&mut threads, &mut builder, None, &params).unwrap();
        assert_eq!(stats.short_chain_blocks_removed, 1);
        assert!(threads.block(short).is_none());
        assert!(threads.block(long).is_some());
        assert!(threads.block(cap5).is_some());
        assert!(threads.block(cap3).is_some());
    }

    #[test]
    fn test_threshold_of_one_skips_decomposition() {
        let (mut threads, ..) = two_chain_setup();
        let mut builder = |_: &ThreadSet, _: &DecompositionParams| -> Result<Decomposition, CafError> {
            panic!("no decomposition expected")
        };
        let stats = reduce(&mut threads, &mut builder, None, &MeltParams::default()).unwrap();
        assert_eq!(stats.short_chain_blocks_removed, 0);
        assert_eq!(threads.block_count(), 4);
    }

    #[test]
    fn test_trim_never_touches_thread_ends() {
        let (mut threads, cap5, cap3, short, long) = two_chain_setup();
        let mut builder = builder_for(cap5, cap3, short, long);
        let params = MeltParams {
            block_end_trim: 3,
            ..MeltParams::default()
        };
        let stats = reduce(&mut threads, &mut builder, None, &params).unwrap();
        assert_eq!(stats.blocks_destroyed_by_trim, 1);
        assert_eq!(stats.blocks_trimmed, 1);
        assert_eq!(threads.block_length(long), Some(9));
        assert_eq!(threads.block_length(cap5), Some(1));
        assert_eq!(threads.block_length(cap3), Some(1));
    }

    #[test]
    fn test_filter_and_filter_errors() {
        let (mut threads, cap5, cap3, short, long) = two_chain_setup();
        let mut builder = builder_for(cap5, cap3, short, long);
        let filter = |threads: &ThreadSet, block: BlockId| -> Result<bool, CafError> {
            Ok(threads.block_length(block).unwrap_or(0) < 10)
        };
        let stats = reduce(&mut threads, &mut builder, Some(&filter), &MeltParams::default()).unwrap();
        assert_eq!(stats.blocks_filtered, 1);
        assert!(threads.block(short).is_none());
        assert_eq!(threads.block_count(), 3);

        let failing = |_: &ThreadSet, block: BlockId| -> Result<bool, CafError> {
            Err(CafError::Missing {
                kind: "sequence",
                name: block as u64,
            })
        };
        assert!(reduce(&mut threads, &mut builder, Some(&failing), &MeltParams::default()).is_err());
    }

    #[test]
    fn test_reduce_is_monotonic() {
        let (mut threads, cap5, cap3, short, long) = two_chain_setup();
        let before: FxHashSet<BlockId> = threads.block_ids().into_iter().collect();
        let mut builder = builder_for(cap5, cap3, short, long);
        let params = MeltParams {
            block_end_trim: 1,
            minimum_chain_length: 4,
            ..MeltParams::default()
        };
        reduce(&mut threads, &mut builder, None, &params).unwrap();
        let after: FxHashSet<BlockId> = threads.block_ids().into_iter().collect();
        assert!(after.is_subset(&before));
        let connected = threads.connected_ends(PinchEnd::new(cap5, false));
        assert_eq!(connected.len(), 1);
    }
}
