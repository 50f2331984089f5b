//! Device memory pages and the blocks carved out of them.
//!
//! A page is one fixed-size region of device memory. Space is handed out from
//! a bump cursor (`tail`) and from an ordered set of reclaimed free blocks.
//! Adjacent free blocks are always merged, and a free region that reaches the
//! cursor is folded back into it instead of being stored.

use std::collections::BTreeMap;

use crate::api::stats::PageSnapshot;
use crate::gpu::PageHandle;
use crate::util::size::{align_up, is_aligned};

/// A contiguous byte range inside one page of a heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AllocationBlock {
    /// Index of the page inside its heap
    pub page_index: u32,
    /// Byte offset from the start of the page
    pub offset: u64,
    /// Size in bytes
    pub size: u64,
}

impl AllocationBlock {
    /// One past the last byte of this block.
    pub fn end(&self) -> u64 {
        self.offset + self.size
    }

    /// Check whether two blocks share any byte.
    pub fn overlaps(&self, other: &AllocationBlock) -> bool {
        self.page_index == other.page_index
            && self.offset < other.end()
            && other.offset < self.end()
    }
}

/// One page of device memory.
#[derive(Debug)]
pub(crate) struct Page {
    /// Native page handle
    handle: PageHandle,
    /// Total bytes in the page
    capacity: u64,
    /// Minimum alignment of every block placed in this page
    alignment: u64,
    /// Bump cursor; `[tail, capacity)` has never been handed out
    tail: u64,
    /// Reclaimed free blocks below `tail`, keyed by offset
    free_blocks: BTreeMap<u64, u64>,
    /// Bytes currently handed out
    used_bytes: u64,
}

impl Page {
    pub fn new(handle: PageHandle, capacity: u64, alignment: u64) -> Self {
        Self {
            handle,
            capacity,
            alignment: alignment.max(1),
            tail: 0,
            free_blocks: BTreeMap::new(),
            used_bytes: 0,
        }
    }

    pub fn handle(&self) -> PageHandle {
        self.handle
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    #[cfg(test)]
    pub fn tail(&self) -> u64 {
        self.tail
    }

    pub fn used_bytes(&self) -> u64 {
        self.used_bytes
    }

    pub fn is_empty(&self) -> bool {
        self.used_bytes == 0
    }

    /// Cheap admission check run before any search.
    pub fn has_room_for(&self, size: u64) -> bool {
        self.capacity - self.used_bytes >= size
    }

    /// Find and claim `size` bytes aligned to `alignment`.
    ///
    /// Reclaimed blocks are searched first in ascending offset order; the first
    /// one that fits is split. Otherwise the block is bumped from `tail`.
    /// Returns the offset of the claimed range.
    pub fn find(&mut self, size: u64, alignment: u64) -> Option<u64> {
        if size == 0 || !self.has_room_for(size) {
            return None;
        }

        let alignment = alignment.max(self.alignment);

        let fit = self.free_blocks.iter().find_map(|(&offset, &block_size)| {
            let aligned = align_up(offset, alignment);
            let gap = aligned - offset;
            (gap + size <= block_size).then_some((offset, block_size, aligned))
        });

        let offset = match fit {
            Some((offset, block_size, aligned)) => {
                self.free_blocks.remove(&offset);
                if aligned > offset {
                    self.free_blocks.insert(offset, aligned - offset);
                }
                let remainder = offset + block_size - (aligned + size);
                if remainder > 0 {
                    self.free_blocks.insert(aligned + size, remainder);
                }
                aligned
            }
            None => {
                let aligned = align_up(self.tail, alignment);
                if aligned + size > self.capacity {
                    return None;
                }
                // Nothing free ends at `tail`, so the gap cannot touch another free block.
                if aligned > self.tail {
                    self.free_blocks.insert(self.tail, aligned - self.tail);
                }
                self.tail = aligned + size;
                aligned
            }
        };

        debug_assert!(is_aligned(offset, alignment));
        self.used_bytes += size;
        Some(offset)
    }

    /// Return a block to the page, merging it with its free neighbours.
    pub fn forfeit(&mut self, offset: u64, size: u64) {
        debug_assert!(offset + size <= self.tail, "forfeited block beyond tail");

        let mut start = offset;
        let mut end = offset + size;

        let left = self
            .free_blocks
            .range(..start)
            .next_back()
            .map(|(&o, &s)| (o, s));
        if let Some((left_offset, left_size)) = left {
            if left_offset + left_size == start {
                self.free_blocks.remove(&left_offset);
                start = left_offset;
            }
        }

        if let Some(right_size) = self.free_blocks.remove(&end) {
            end += right_size;
        }

        if end == self.tail {
            self.tail = start;
        } else {
            self.free_blocks.insert(start, end - start);
        }

        debug_assert!(self.used_bytes >= size, "page used bytes underflow");
        self.used_bytes = self.used_bytes.saturating_sub(size);
    }

    /// Largest contiguous range that could be handed out, ignoring alignment.
    pub fn largest_free_block(&self) -> u64 {
        self.free_blocks
            .values()
            .copied()
            .chain(std::iter::once(self.capacity - self.tail))
            .max()
            .unwrap_or(0)
    }

    pub fn free_block_count(&self) -> usize {
        self.free_blocks.len()
    }

    pub fn snapshot(&self) -> PageSnapshot {
        PageSnapshot {
            capacity: self.capacity,
            tail: self.tail,
            used_bytes: self.used_bytes,
            free_block_count: self.free_block_count(),
            largest_free_block: self.largest_free_block(),
        }
    }

    /// Free blocks as `(offset, size)` pairs in ascending offset order.
    #[cfg(test)]
    pub fn free_blocks(&self) -> Vec<(u64, u64)> {
        self.free_blocks.iter().map(|(&o, &s)| (o, s)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(capacity: u64) -> Page {
        Page::new(PageHandle(1), capacity, 1)
    }

    fn assert_invariants(page: &Page) {
        assert!(page.tail() <= page.capacity());
        let blocks = page.free_blocks();
        for pair in blocks.windows(2) {
            let (a_off, a_size) = pair[0];
            let (b_off, _) = pair[1];
            // Disjoint and never touching
            assert!(a_off + a_size < b_off, "free blocks touch: {:?}", pair);
        }
        for &(off, size) in &blocks {
            // Below the cursor and never ending at it
            assert!(off + size < page.tail());
        }
    }

    #[test]
    fn test_bump_allocation() {
        let mut page = page(4096);
        assert_eq!(page.find(1024, 1), Some(0));
        assert_eq!(page.find(2048, 1), Some(1024));
        assert_eq!(page.find(1024, 1), Some(3072));
        assert_eq!(page.tail(), 4096);
        assert_eq!(page.used_bytes(), 4096);
        assert_eq!(page.find(1, 1), None);
    }

    #[test]
    fn test_reuse_with_split() {
        let mut page = page(4096);
        page.find(1024, 1);
        page.find(2048, 1);
        page.find(1024, 1);

        page.forfeit(1024, 2048);
        assert_eq!(page.free_blocks(), vec![(1024, 2048)]);

        assert_eq!(page.find(1536, 1), Some(1024));
        assert_eq!(page.free_blocks(), vec![(2560, 512)]);
        assert_eq!(page.used_bytes(), 1024 + 1536 + 1024);
        assert_invariants(&page);
    }

    #[test]
    fn test_forfeit_merges_both_neighbours() {
        let mut page = page(4096);
        let a = page.find(512, 1).unwrap();
        let b = page.find(512, 1).unwrap();
        let c = page.find(512, 1).unwrap();
        let _d = page.find(512, 1).unwrap();

        page.forfeit(a, 512);
        page.forfeit(c, 512);
        assert_eq!(page.free_blocks(), vec![(0, 512), (1024, 512)]);

        page.forfeit(b, 512);
        assert_eq!(page.free_blocks(), vec![(0, 1536)]);
        assert_invariants(&page);
    }

    #[test]
    fn test_tail_shrink() {
        let mut page = page(4096);
        let a = page.find(1024, 1).unwrap();
        let b = page.find(1024, 1).unwrap();

        page.forfeit(b, 1024);
        assert_eq!(page.tail(), 1024);
        assert!(page.free_blocks().is_empty());

        page.forfeit(a, 1024);
        assert_eq!(page.tail(), 0);
        assert!(page.is_empty());
    }

    #[test]
    fn test_tail_shrink_swallows_left_neighbour() {
        let mut page = page(4096);
        let a = page.find(1024, 1).unwrap();
        let b = page.find(1024, 1).unwrap();

        page.forfeit(a, 1024);
        page.forfeit(b, 1024);

        assert_eq!(page.tail(), 0);
        assert!(page.free_blocks().is_empty());
    }

    #[test]
    fn test_coalescing_completeness_any_order() {
        let orders: [[usize; 5]; 4] = [
            [0, 1, 2, 3, 4],
            [4, 3, 2, 1, 0],
            [1, 3, 0, 4, 2],
            [2, 0, 4, 1, 3],
        ];

        for order in orders {
            let mut page = page(1 << 16);
            let sizes = [256u64, 768, 512, 1024, 256];
            let offsets: Vec<u64> = sizes.iter().map(|&s| page.find(s, 256).unwrap()).collect();

            for &i in &order {
                page.forfeit(offsets[i], sizes[i]);
                assert_invariants(&page);
            }

            assert_eq!(page.tail(), 0, "order {:?}", order);
            assert!(page.free_blocks().is_empty(), "order {:?}", order);
            assert_eq!(page.used_bytes(), 0);
        }
    }

    #[test]
    fn test_alignment_gap_becomes_free_block() {
        let mut page = page(8192);
        assert_eq!(page.find(100, 1), Some(0));
        assert_eq!(page.find(1000, 1024), Some(1024));
        assert_eq!(page.free_blocks(), vec![(100, 924)]);

        // Small unaligned request reuses the gap
        assert_eq!(page.find(200, 1), Some(100));
        assert_eq!(page.free_blocks(), vec![(300, 724)]);
    }

    #[test]
    fn test_aligned_fit_inside_free_block() {
        let mut page = page(8192);
        let a = page.find(300, 1).unwrap();
        let _b = page.find(4000, 1).unwrap();
        let _c = page.find(100, 1).unwrap();

        page.forfeit(a, 300);
        // Block [0, 300) holds 256 bytes at offset 0 with 256 alignment
        assert_eq!(page.find(256, 256), Some(0));
        assert_eq!(page.free_blocks(), vec![(256, 44)]);
    }

    #[test]
    fn test_admission_check() {
        let mut page = page(1024);
        page.find(1000, 1);
        assert!(!page.has_room_for(100));
        assert_eq!(page.find(100, 1), None);
    }

    #[test]
    fn test_no_overlap_under_churn() {
        let mut page = page(1 << 20);
        let mut live: Vec<(u64, u64)> = Vec::new();
        let mut seed = 0x2545_f491u64;

        for step in 0..2000 {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;

            if live.is_empty() || seed % 3 != 0 {
                let size = 256 * (1 + seed % 16);
                if let Some(offset) = page.find(size, 256) {
                    live.push((offset, size));
                }
            } else {
                let idx = (seed as usize / 3) % live.len();
                let (offset, size) = live.swap_remove(idx);
                page.forfeit(offset, size);
            }

            assert_invariants(&page);
            if step % 100 == 0 {
                let mut sorted = live.clone();
                sorted.sort();
                for pair in sorted.windows(2) {
                    assert!(pair[0].0 + pair[0].1 <= pair[1].0, "overlap: {:?}", pair);
                }
            }
        }

        for (offset, size) in live.drain(..) {
            page.forfeit(offset, size);
        }
        assert_eq!(page.tail(), 0);
        assert!(page.free_blocks().is_empty());
    }

    #[test]
    fn test_block_overlap() {
        let a = AllocationBlock { page_index: 0, offset: 0, size: 100 };
        let b = AllocationBlock { page_index: 0, offset: 50, size: 100 };
        let c = AllocationBlock { page_index: 0, offset: 100, size: 100 };
        let d = AllocationBlock { page_index: 1, offset: 0, size: 100 };
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
        assert!(!a.overlaps(&d));
        assert_eq!(a.end(), 100);
    }
}
