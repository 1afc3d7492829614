//! Species and tree coverage of a block.

use crate::error::{inconsistent, CafError};
use crate::metadata::{EventId, EventTree, SequenceCatalog};
use crate::pinch::{BlockId, ThreadSet};
use rustc_hash::FxHashSet;

fn block_events(
    threads: &ThreadSet,
    block: BlockId,
    catalog: &SequenceCatalog,
) -> Result<Vec<EventId>, CafError> {
    let b = threads.block(block).ok_or(CafError::Missing {
        kind: "block",
        name: block as u64,
    })?;
    b.segments()
        .iter()
        .map(|&id| {
            let segment = threads
                .segment(id)
                .ok_or_else(|| inconsistent(format!("Block {} holds a destroyed segment", block)))?;
            let thread = threads.thread(segment.thread()).ok_or(CafError::Missing {
                kind: "thread",
                name: segment.thread() as u64,
            })?;
            catalog.event_of(thread.name())
        })
        .collect()
}

/// True if the block has at least `min_ingroup` ingroup segments,
/// `min_outgroup` outgroup segments and `min_total` segments overall.
pub fn contains_required_species(
    threads: &ThreadSet,
    block: BlockId,
    catalog: &SequenceCatalog,
    events: &EventTree,
    min_ingroup: usize,
    min_outgroup: usize,
    min_total: usize,
) -> Result<bool, CafError> {
    let mut ingroup = 0;
    let mut outgroup = 0;
    for event in block_events(threads, block, catalog)? {
        let e = events.event(event).ok_or(CafError::Missing {
            kind: "event",
            name: event as u64,
        })?;
        if e.is_outgroup() {
            outgroup += 1;
        } else {
            ingroup += 1;
        }
    }
    Ok(ingroup >= min_ingroup && outgroup >= min_outgroup && ingroup + outgroup >= min_total)
}

/// Fraction of the species tree spanned by the block's events: the branch
/// length on the paths from each event up to their common ancestor, each
/// branch counted once, over the branch length below the root's first child.
///
/// Returns 0 when that whole-tree length is not positive.
pub fn tree_coverage(
    threads: &ThreadSet,
    block: BlockId,
    catalog: &SequenceCatalog,
    events: &EventTree,
) -> Result<f64, CafError> {
    let block_events = block_events(threads, block, catalog)?;
    if let Some(&bad) = block_events.iter().find(|&&e| events.event(e).is_none()) {
        return Err(CafError::Missing {
            kind: "event",
            name: bad as u64,
        });
    }
    let Some(ancestor) = block_events
        .iter()
        .copied()
        .reduce(|a, b| events.common_ancestor(a, b))
    else {
        return Ok(0.0);
    };

    let mut covered = 0.0;
    let mut seen = FxHashSet::default();
    for &start in &block_events {
        let mut cursor = Some(start);
        while let Some(event) = cursor {
            if event == ancestor || !seen.insert(event) {
                break;
            }
            let Some(e) = events.event(event) else {
                break;
            };
            covered += e.branch_length();
            cursor = e.parent();
        }
    }

    let Some(&first_child) = events
        .event(events.root())
        .and_then(|root| root.children().first())
    else {
        return Ok(0.0);
    };
    let whole_tree = events.subtree_branch_length(first_child);
    if whole_tree <= 0.0 {
        return Ok(0.0);
    }
    Ok((covered / whole_tree).clamp(0.0, 1.0))
}
