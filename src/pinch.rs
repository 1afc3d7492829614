//! Alignment graph ("pinch graph").
//!
//! Each thread is a doubly linked list of segments stored in an index arena.
//! Aligned segments belong to a block; a block's segments all share the
//! block's length and each carries its orientation relative to the block.
//! The first and last position of every thread is wrapped in a thread-end
//! block of length one when the thread is added.

use crate::error::{inconsistent, CafError};
use rustc_hash::FxHashSet;

pub type ThreadId = usize;
pub type SegmentId = usize;
pub type BlockId = usize;

/// One side of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PinchEnd {
    pub block: BlockId,
    /// `true` for the block's 5' side, `false` for its 3' side
    pub orientation: bool,
}

impl PinchEnd {
    pub fn new(block: BlockId, orientation: bool) -> Self {
        Self { block, orientation }
    }

    /// The other side of the same block
    pub fn opposite(&self) -> Self {
        Self::new(self.block, !self.orientation)
    }
}

#[derive(Debug, Clone)]
pub struct Thread {
    name: u64,
    start: i64,
    length: i64,
    first: SegmentId,
    last: SegmentId,
}

impl Thread {
    pub fn name(&self) -> u64 {
        self.name
    }

    pub fn start(&self) -> i64 {
        self.start
    }

    pub fn length(&self) -> i64 {
        self.length
    }

    pub fn first_segment(&self) -> SegmentId {
        self.first
    }

    pub fn last_segment(&self) -> SegmentId {
        self.last
    }
}

#[derive(Debug, Clone)]
pub struct Segment {
    thread: ThreadId,
    start: i64,
    length: i64,
    prev: Option<SegmentId>,
    next: Option<SegmentId>,
    block: Option<BlockId>,
    orientation: bool,
}

impl Segment {
    pub fn thread(&self) -> ThreadId {
        self.thread
    }

    pub fn start(&self) -> i64 {
        self.start
    }

    /// Exclusive end coordinate
    pub fn end(&self) -> i64 {
        self.start + self.length
    }

    pub fn length(&self) -> i64 {
        self.length
    }

    pub fn block(&self) -> Option<BlockId> {
        self.block
    }

    /// Orientation relative to the block (`true` = same strand as the block)
    pub fn orientation(&self) -> bool {
        self.orientation
    }

    pub fn five_prime(&self) -> Option<SegmentId> {
        self.prev
    }

    pub fn three_prime(&self) -> Option<SegmentId> {
        self.next
    }
}

#[derive(Debug, Clone)]
pub struct Block {
    length: i64,
    segments: Vec<SegmentId>,
}

impl Block {
    pub fn length(&self) -> i64 {
        self.length
    }

    /// Number of segments in the block
    pub fn degree(&self) -> usize {
        self.segments.len()
    }

    pub fn segments(&self) -> &[SegmentId] {
        &self.segments
    }

    pub fn first_segment(&self) -> SegmentId {
        self.segments[0]
    }
}

/// The set of threads together with their segment/block partition.
#[derive(Debug, Default, Clone)]
pub struct ThreadSet {
    threads: Vec<Thread>,
    segments: Vec<Option<Segment>>,
    blocks: Vec<Option<Block>>,
}

impl ThreadSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a thread covering `[start, start + length)`. Its terminal positions
    /// become thread-end blocks; the interior is left unaligned.
    pub fn add_thread(&mut self, name: u64, start: i64, length: i64) -> Result<ThreadId, CafError> {
        if length < 2 {
            return Err(inconsistent(format!(
                "Thread {} needs at least two positions, got {}",
                name, length
            )));
        }
        let id = self.threads.len();
        let cap5 = self.push_segment(id, start, 1);
        let mut tail = cap5;
        if length > 2 {
            let interior = self.push_segment(id, start + 1, length - 2);
            self.connect(tail, interior);
            tail = interior;
        }
        let cap3 = self.push_segment(id, start + length - 1, 1);
        self.connect(tail, cap3);
        self.threads.push(Thread {
            name,
            start,
            length,
            first: cap5,
            last: cap3,
        });
        self.push_block(1, &[(cap5, true)]);
        self.push_block(1, &[(cap3, true)]);
        Ok(id)
    }

    pub fn thread(&self, id: ThreadId) -> Option<&Thread> {
        self.threads.get(id)
    }

    pub fn threads(&self) -> impl Iterator<Item = (ThreadId, &Thread)> {
        self.threads.iter().enumerate()
    }

    pub fn thread_count(&self) -> usize {
        self.threads.len()
    }

    pub fn segment(&self, id: SegmentId) -> Option<&Segment> {
        self.segments.get(id).and_then(|s| s.as_ref())
    }

    pub fn segment_count(&self) -> usize {
        self.segments.iter().filter(|s| s.is_some()).count()
    }

    /// Segments of a thread in 5' to 3' order
    pub fn thread_segments(&self, thread: ThreadId) -> Vec<SegmentId> {
        let mut result = Vec::new();
        let mut cursor = self.threads.get(thread).map(|t| t.first);
        while let Some(id) = cursor {
            result.push(id);
            cursor = self.seg(id).next;
        }
        result
    }

    /// Segment of `thread` containing position `pos`
    pub fn segment_at(&self, thread: ThreadId, pos: i64) -> Option<SegmentId> {
        let mut cursor = self.threads.get(thread).map(|t| t.first);
        while let Some(id) = cursor {
            let segment = self.seg(id);
            if segment.start <= pos && pos < segment.end() {
                return Some(id);
            }
            cursor = segment.next;
        }
        None
    }

    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(id).and_then(|b| b.as_ref())
    }

    pub fn block_length(&self, id: BlockId) -> Option<i64> {
        self.block(id).map(|b| b.length)
    }

    pub fn blocks(&self) -> impl Iterator<Item = (BlockId, &Block)> {
        self.blocks
            .iter()
            .enumerate()
            .filter_map(|(id, b)| b.as_ref().map(|b| (id, b)))
    }

    /// Snapshot of the live block ids, safe to hold while mutating
    pub fn block_ids(&self) -> Vec<BlockId> {
        self.blocks().map(|(id, _)| id).collect()
    }

    pub fn block_count(&self) -> usize {
        self.blocks.iter().filter(|b| b.is_some()).count()
    }

    /// A block whose first segment sits at a thread extremity.
    pub fn is_thread_end(&self, block: BlockId) -> bool {
        let Some(b) = self.block(block) else {
            return false;
        };
        let segment = self.seg(b.first_segment());
        let thread_end = segment.prev.is_none() || segment.next.is_none();
        if thread_end {
            debug_assert_eq!(b.length, 1, "thread-end block {} is not of length 1", block);
        }
        thread_end
    }

    /// Align the unaligned regions `(thread, start, orientation)` of `length`
    /// positions each into a new block.
    pub fn construct_block(
        &mut self,
        regions: &[(ThreadId, i64, bool)],
        length: i64,
    ) -> Result<BlockId, CafError> {
        if regions.is_empty() || length < 1 {
            return Err(inconsistent("A block needs at least one region of positive length"));
        }
        for (i, &(thread, start, _)) in regions.iter().enumerate() {
            let t = self.threads.get(thread).ok_or(CafError::Missing {
                kind: "thread",
                name: thread as u64,
            })?;
            if start < t.start + 1 || start + length > t.start + t.length - 1 {
                return Err(inconsistent(format!(
                    "Region {}:{}-{} is outside the interior of thread {}",
                    thread,
                    start,
                    start + length,
                    t.name
                )));
            }
            for &(other_thread, other_start, _) in &regions[..i] {
                if other_thread == thread && other_start < start + length && start < other_start + length {
                    return Err(inconsistent(format!(
                        "Regions {}:{} and {}:{} overlap",
                        thread, start, other_thread, other_start
                    )));
                }
            }
            let mut cursor = self.segment_at(thread, start);
            while let Some(id) = cursor {
                let segment = self.seg(id);
                if segment.start >= start + length {
                    break;
                }
                if segment.block.is_some() {
                    return Err(inconsistent(format!(
                        "Region {}:{}-{} is already aligned",
                        thread,
                        start,
                        start + length
                    )));
                }
                cursor = segment.next;
            }
        }

        let members: Vec<(SegmentId, bool)> = regions
            .iter()
            .map(|&(thread, start, orientation)| {
                (self.isolate_unaligned(thread, start, length), orientation)
            })
            .collect();
        Ok(self.push_block(length, &members))
    }

    /// Destroy a block, leaving its segments unaligned.
    pub fn destroy_block(&mut self, block: BlockId) -> Result<(), CafError> {
        let b = self
            .blocks
            .get_mut(block)
            .and_then(|b| b.take())
            .ok_or(CafError::Missing {
                kind: "block",
                name: block as u64,
            })?;
        for id in b.segments {
            let segment = self.seg_mut(id);
            segment.block = None;
            segment.orientation = true;
        }
        Ok(())
    }

    /// Remove `trim` positions from both sides of every segment of the block.
    /// A block of length `<= 2 * trim` is destroyed instead.
    pub fn trim_block(&mut self, block: BlockId, trim: i64) -> Result<(), CafError> {
        let length = self.block_length(block).ok_or(CafError::Missing {
            kind: "block",
            name: block as u64,
        })?;
        if trim <= 0 {
            return Ok(());
        }
        if length <= trim.saturating_mul(2) {
            return self.destroy_block(block);
        }
        let members = self.block(block).map(|b| b.segments.clone()).unwrap_or_default();
        for id in members {
            let (thread, start, end) = {
                let segment = self.seg(id);
                (segment.thread, segment.start, segment.end())
            };
            let left = self.push_segment(thread, start, trim);
            self.insert_before(id, left);
            let right = self.push_segment(thread, end - trim, trim);
            self.insert_after(id, right);
            let segment = self.seg_mut(id);
            segment.start += trim;
            segment.length -= 2 * trim;
        }
        if let Some(b) = self.blocks[block].as_mut() {
            b.length -= 2 * trim;
        }
        Ok(())
    }

    /// Merge adjacent unaligned segments and blocks that continue each other
    /// without branching. Returns the number of joins performed.
    pub fn join_trivial_boundaries(&mut self) -> usize {
        let mut joins = 0;
        for thread in 0..self.threads.len() {
            let mut current = self.threads[thread].first;
            while let Some(next) = self.seg(current).next {
                if self.seg(current).block.is_none() && self.seg(next).block.is_none() {
                    self.absorb_next(current);
                    joins += 1;
                } else {
                    current = next;
                }
            }
        }

        loop {
            let mut merged = false;
            for block in self.block_ids() {
                if self.block(block).is_none() {
                    continue;
                }
                if let Some((partner, pairs)) = self.trivial_partner(block) {
                    self.merge_blocks(block, partner, &pairs);
                    joins += 1;
                    merged = true;
                }
            }
            if !merged {
                break;
            }
        }
        joins
    }

    /// Block ends reached from `end` by walking each of the block's segments
    /// across unaligned sequence to the next aligned segment.
    pub fn connected_ends(&self, end: PinchEnd) -> FxHashSet<PinchEnd> {
        let mut connected = FxHashSet::default();
        let Some(block) = self.block(end.block) else {
            return connected;
        };
        for &id in &block.segments {
            let segment = self.seg(id);
            let toward_5prime = end.orientation == segment.orientation;
            let mut cursor = if toward_5prime { segment.prev } else { segment.next };
            while let Some(c) = cursor {
                let other = self.seg(c);
                if let Some(b) = other.block {
                    let orientation = if toward_5prime {
                        !other.orientation
                    } else {
                        other.orientation
                    };
                    connected.insert(PinchEnd::new(b, orientation));
                    break;
                }
                cursor = if toward_5prime { other.prev } else { other.next };
            }
        }
        connected
    }

    fn seg(&self, id: SegmentId) -> &Segment {
        self.segments[id]
            .as_ref()
            .unwrap_or_else(|| panic!("Segment {} was destroyed", id))
    }

    fn seg_mut(&mut self, id: SegmentId) -> &mut Segment {
        self.segments[id]
            .as_mut()
            .unwrap_or_else(|| panic!("Segment {} was destroyed", id))
    }

    fn push_segment(&mut self, thread: ThreadId, start: i64, length: i64) -> SegmentId {
        let id = self.segments.len();
        self.segments.push(Some(Segment {
            thread,
            start,
            length,
            prev: None,
            next: None,
            block: None,
            orientation: true,
        }));
        id
    }

    fn push_block(&mut self, length: i64, members: &[(SegmentId, bool)]) -> BlockId {
        let id = self.blocks.len();
        for &(segment, orientation) in members {
            let s = self.seg_mut(segment);
            s.block = Some(id);
            s.orientation = orientation;
        }
        self.blocks.push(Some(Block {
            length,
            segments: members.iter().map(|&(s, _)| s).collect(),
        }));
        id
    }

    fn connect(&mut self, left: SegmentId, right: SegmentId) {
        self.seg_mut(left).next = Some(right);
        self.seg_mut(right).prev = Some(left);
    }

    fn insert_before(&mut self, anchor: SegmentId, new: SegmentId) {
        let prev = self.seg(anchor).prev;
        match prev {
            Some(p) => self.connect(p, new),
            None => {
                let thread = self.seg(anchor).thread;
                self.threads[thread].first = new;
            }
        }
        self.connect(new, anchor);
    }

    fn insert_after(&mut self, anchor: SegmentId, new: SegmentId) {
        let next = self.seg(anchor).next;
        match next {
            Some(n) => self.connect(new, n),
            None => {
                let thread = self.seg(anchor).thread;
                self.threads[thread].last = new;
            }
        }
        self.connect(anchor, new);
    }

    /// Unlink a segment from its thread and free its slot.
    fn remove_segment(&mut self, id: SegmentId) {
        let (thread, prev, next) = {
            let s = self.seg(id);
            (s.thread, s.prev, s.next)
        };
        match (prev, next) {
            (Some(p), Some(n)) => self.connect(p, n),
            (Some(p), None) => {
                self.seg_mut(p).next = None;
                self.threads[thread].last = p;
            }
            (None, Some(n)) => {
                self.seg_mut(n).prev = None;
                self.threads[thread].first = n;
            }
            (None, None) => {}
        }
        self.segments[id] = None;
    }

    fn absorb_next(&mut self, id: SegmentId) {
        if let Some(next) = self.seg(id).next {
            let length = self.seg(next).length;
            self.remove_segment(next);
            self.seg_mut(id).length += length;
        }
    }

    /// Split an unaligned segment at `offset`, returning the 3' piece.
    fn split_unaligned(&mut self, id: SegmentId, offset: i64) -> SegmentId {
        let (thread, start, length) = {
            let s = self.seg(id);
            debug_assert!(s.block.is_none(), "splitting aligned segment {}", id);
            (s.thread, s.start, s.length)
        };
        let right = self.push_segment(thread, start + offset, length - offset);
        self.insert_after(id, right);
        self.seg_mut(id).length = offset;
        right
    }

    /// Make `[start, start + length)` of `thread` exactly one unaligned segment.
    fn isolate_unaligned(&mut self, thread: ThreadId, start: i64, length: i64) -> SegmentId {
        let mut id = self
            .segment_at(thread, start)
            .unwrap_or_else(|| panic!("Position {} is outside thread {}", start, thread));
        let offset = start - self.seg(id).start;
        if offset > 0 {
            id = self.split_unaligned(id, offset);
        }
        while self.seg(id).length < length {
            self.absorb_next(id);
        }
        if self.seg(id).length > length {
            self.split_unaligned(id, length);
        }
        id
    }

    /// The block continuing `block` on its 3' side, if every segment of
    /// `block` is followed by a segment of the same partner block with the
    /// same orientation and both blocks have equal degree.
    fn trivial_partner(&self, block: BlockId) -> Option<(BlockId, Vec<(SegmentId, SegmentId)>)> {
        if self.is_thread_end(block) {
            return None;
        }
        let members = &self.block(block)?.segments;
        let mut partner = None;
        let mut pairs = Vec::with_capacity(members.len());
        for &id in members {
            let segment = self.seg(id);
            let follower = if segment.orientation {
                segment.next
            } else {
                segment.prev
            }?;
            let other = self.seg(follower);
            let other_block = other.block?;
            if other.orientation != segment.orientation {
                return None;
            }
            match partner {
                None => partner = Some(other_block),
                Some(p) if p != other_block => return None,
                _ => {}
            }
            pairs.push((id, follower));
        }
        let partner = partner?;
        if partner == block
            || self.is_thread_end(partner)
            || self.block(partner)?.degree() != members.len()
        {
            return None;
        }
        Some((partner, pairs))
    }

    fn merge_blocks(&mut self, block: BlockId, partner: BlockId, pairs: &[(SegmentId, SegmentId)]) {
        for &(id, follower) in pairs {
            let (follower_start, follower_length) = {
                let f = self.seg(follower);
                (f.start, f.length)
            };
            let forward = self.seg(id).orientation;
            self.remove_segment(follower);
            let segment = self.seg_mut(id);
            if !forward {
                segment.start = follower_start;
            }
            segment.length += follower_length;
        }
        let partner_length = self.blocks[partner].take().map(|b| b.length).unwrap_or(0);
        if let Some(b) = self.blocks[block].as_mut() {
            b.length += partner_length;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_threads() -> (ThreadSet, ThreadId, ThreadId) {
        let mut threads = ThreadSet::new();
        let a = threads.add_thread(1, 0, 100).unwrap();
        let b = threads.add_thread(2, 0, 100).unwrap();
        (threads, a, b)
    }

    #[test]
    fn test_add_thread_wraps_caps() {
        let mut threads = ThreadSet::new();
        let t = threads.add_thread(9, 10, 20).unwrap();
        let segments = threads.thread_segments(t);
        assert_eq!(segments.len(), 3);
        assert_eq!(threads.block_count(), 2);
        let first = threads.segment(segments[0]).unwrap();
        let last = threads.segment(segments[2]).unwrap();
        assert_eq!((first.start(), first.length()), (10, 1));
        assert_eq!((last.start(), last.length()), (29, 1));
        assert!(threads.is_thread_end(first.block().unwrap()));
        assert!(threads.is_thread_end(last.block().unwrap()));
        assert!(threads.add_thread(10, 0, 1).is_err());
    }

    #[test]
    fn test_construct_block_splits_unaligned_sequence() {
        let (mut threads, a, b) = two_threads();
        let block = threads
            .construct_block(&[(a, 10, true), (b, 40, false)], 5)
            .unwrap();
        assert_eq!(threads.block_length(block), Some(5));
        assert_eq!(threads.block(block).unwrap().degree(), 2);
        assert!(!threads.is_thread_end(block));
        // cap, 1-10, block, 15-99, cap
        assert_eq!(threads.thread_segments(a).len(), 5);
        let seg = threads.segment_at(b, 42).unwrap();
        assert_eq!(threads.segment(seg).unwrap().block(), Some(block));
        assert!(!threads.segment(seg).unwrap().orientation());
    }

    #[test]
    fn test_construct_block_rejects_aligned_or_cap_regions() {
        let (mut threads, a, b) = two_threads();
        threads.construct_block(&[(a, 10, true), (b, 10, true)], 5).unwrap();
        assert!(threads.construct_block(&[(a, 12, true)], 5).is_err());
        assert!(threads.construct_block(&[(a, 0, true)], 2).is_err());
        assert!(threads
            .construct_block(&[(b, 50, true), (b, 52, true)], 5)
            .is_err());
        assert_eq!(threads.block_count(), 5);
    }

    #[test]
    fn test_connected_ends_skip_unaligned_sequence() {
        let (mut threads, a, _) = two_threads();
        let x = threads.construct_block(&[(a, 10, true)], 5).unwrap();
        let y = threads.construct_block(&[(a, 30, false)], 5).unwrap();
        // 3' side of x faces the thread-3' side, where y sits reversed
        let connected = threads.connected_ends(PinchEnd::new(x, false));
        assert_eq!(connected.len(), 1);
        assert!(connected.contains(&PinchEnd::new(y, false)));

        let connected = threads.connected_ends(PinchEnd::new(y, false));
        assert!(connected.contains(&PinchEnd::new(x, false)));

        let cap5 = threads
            .segment(threads.thread(a).unwrap().first_segment())
            .unwrap()
            .block()
            .unwrap();
        let connected = threads.connected_ends(PinchEnd::new(x, true));
        assert!(connected.contains(&PinchEnd::new(cap5, false)));
    }

    #[test]
    fn test_trim_and_destroy() {
        let (mut threads, a, b) = two_threads();
        let block = threads
            .construct_block(&[(a, 10, true), (b, 20, true)], 10)
            .unwrap();
        threads.trim_block(block, 2).unwrap();
        assert_eq!(threads.block_length(block), Some(6));
        let seg = threads.segment_at(a, 12).unwrap();
        assert_eq!(threads.segment(seg).unwrap().block(), Some(block));
        assert_eq!(threads.segment(seg).unwrap().length(), 6);
        let trimmed = threads.segment_at(a, 10).unwrap();
        assert_eq!(threads.segment(trimmed).unwrap().block(), None);

        threads.trim_block(block, 3).unwrap();
        assert!(threads.block(block).is_none());
        assert!(threads.destroy_block(block).is_err());
    }

    #[test]
    fn test_huge_trim_destroys_block() {
        let (mut threads, a, _) = two_threads();
        let block = threads.construct_block(&[(a, 10, true)], 10).unwrap();
        threads.trim_block(block, i64::MAX).unwrap();
        assert!(threads.block(block).is_none());
    }

    #[test]
    fn test_join_trivial_boundaries() {
        let (mut threads, a, b) = two_threads();
        let x = threads
            .construct_block(&[(a, 10, true), (b, 30, false)], 5)
            .unwrap();
        let y = threads
            .construct_block(&[(a, 15, true), (b, 27, false)], 3)
            .unwrap();
        let z = threads.construct_block(&[(a, 50, true)], 4).unwrap();
        threads.destroy_block(z).unwrap();

        let joins = threads.join_trivial_boundaries();
        assert!(joins >= 3);
        assert!(threads.block(x).is_some() != threads.block(y).is_some());
        let merged = if threads.block(x).is_some() { x } else { y };
        assert_eq!(threads.block_length(merged), Some(8));
        let seg = threads.segment_at(b, 27).unwrap();
        let segment = threads.segment(seg).unwrap();
        assert_eq!((segment.start(), segment.length()), (27, 8));
        // cap, unaligned, merged block, unaligned, cap
        assert_eq!(threads.thread_segments(a).len(), 5);
    }
}
