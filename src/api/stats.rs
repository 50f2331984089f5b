//! Allocator statistics and heap snapshots.

use crate::allocators::heap::HeapId;
use crate::gpu::HeapPurpose;
use crate::util::size::format_bytes;

/// Aggregated allocator statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransientStats {
    /// Heaps currently serving buffers.
    pub buffer_heaps: usize,

    /// Heaps currently serving images.
    pub image_heaps: usize,

    /// Device bytes reserved by all heap pages.
    pub reserved_bytes: u64,

    /// Bytes currently handed out, including pending allocations.
    pub used_bytes: u64,

    /// Highest `used_bytes` observed.
    pub peak_used_bytes: u64,

    /// Allocations that have not been destroyed.
    pub live_allocations: usize,

    /// Destroyed allocations waiting out the frame delay.
    pub pending_allocations: usize,

    /// Create calls answered from the cache.
    pub cache_hits: u64,

    /// Create calls that needed a fresh placement.
    pub cache_misses: u64,

    /// Heaps created so far.
    pub heaps_created: u64,

    /// Heaps released by trimming or shutdown.
    pub heaps_released: u64,

    /// Blocks returned to heaps.
    pub forfeits: u64,

    /// Expired allocations whose heap was gone.
    pub orphans: u64,

    /// Destroy calls for allocations that were not live.
    pub unknown_destroys: u64,

    /// Requests that failed even after creating a new heap.
    pub exhaustion_failures: u64,

    /// Events discarded because the event log was full.
    pub dropped_events: u64,

    /// Number of `update()` calls so far.
    pub frame: u64,
}

impl TransientStats {
    /// Fraction of create calls answered from the cache.
    pub fn hit_ratio(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            return 0.0;
        }
        self.cache_hits as f64 / total as f64
    }

    /// Fraction of reserved bytes currently handed out.
    pub fn utilization(&self) -> f64 {
        if self.reserved_bytes == 0 {
            return 0.0;
        }
        self.used_bytes as f64 / self.reserved_bytes as f64
    }
}

impl std::fmt::Display for TransientStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Transient Allocator Statistics (frame {}):", self.frame)?;
        writeln!(f, "  Heaps:      {} buffer, {} image", self.buffer_heaps, self.image_heaps)?;
        writeln!(f, "  Reserved:   {}", format_bytes(self.reserved_bytes))?;
        writeln!(f, "  Used:       {} (peak {})", format_bytes(self.used_bytes), format_bytes(self.peak_used_bytes))?;
        writeln!(f, "  Live:       {}", self.live_allocations)?;
        writeln!(f, "  Pending:    {}", self.pending_allocations)?;
        writeln!(f, "  Cache:      {} hits, {} misses", self.cache_hits, self.cache_misses)?;
        writeln!(f, "  Forfeits:   {}", self.forfeits)?;
        if self.orphans > 0 || self.unknown_destroys > 0 || self.exhaustion_failures > 0 {
            writeln!(
                f,
                "  Problems:   {} orphans, {} unknown destroys, {} exhausted",
                self.orphans, self.unknown_destroys, self.exhaustion_failures
            )?;
        }
        Ok(())
    }
}

/// State of one page at snapshot time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSnapshot {
    pub capacity: u64,
    /// Bump cursor; everything from here to `capacity` is untouched.
    pub tail: u64,
    pub used_bytes: u64,
    /// Reclaimed free blocks below the cursor.
    pub free_block_count: usize,
    /// Largest contiguous free range, counting the room above the cursor.
    pub largest_free_block: u64,
}

/// State of one heap at snapshot time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeapSnapshot {
    pub heap_id: HeapId,
    pub purpose: HeapPurpose,
    pub pages: Vec<PageSnapshot>,
}

impl HeapSnapshot {
    pub fn capacity(&self) -> u64 {
        self.pages.iter().map(|p| p.capacity).sum()
    }

    pub fn used_bytes(&self) -> u64 {
        self.pages.iter().map(|p| p.used_bytes).sum()
    }

    /// Free bytes that sit below a page cursor, i.e. reclaimed but fragmented.
    pub fn fragmented_bytes(&self) -> u64 {
        self.pages
            .iter()
            .map(|p| p.tail - p.used_bytes.min(p.tail))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ratios() {
        let stats = TransientStats {
            cache_hits: 3,
            cache_misses: 1,
            reserved_bytes: 1000,
            used_bytes: 250,
            ..Default::default()
        };
        assert_eq!(stats.hit_ratio(), 0.75);
        assert_eq!(stats.utilization(), 0.25);
        assert_eq!(TransientStats::default().hit_ratio(), 0.0);
    }

    #[test]
    fn test_display() {
        let stats = TransientStats {
            orphans: 1,
            ..Default::default()
        };
        let text = stats.to_string();
        assert!(text.contains("frame 0"));
        assert!(text.contains("1 orphans"));
    }

    #[test]
    fn test_heap_snapshot_totals() {
        let snapshot = HeapSnapshot {
            heap_id: HeapId(1),
            purpose: HeapPurpose::Buffers,
            pages: vec![
                PageSnapshot {
                    capacity: 4096,
                    tail: 3072,
                    used_bytes: 2048,
                    free_block_count: 1,
                    largest_free_block: 1024,
                },
                PageSnapshot {
                    capacity: 4096,
                    tail: 0,
                    used_bytes: 0,
                    free_block_count: 0,
                    largest_free_block: 4096,
                },
            ],
        };
        assert_eq!(snapshot.capacity(), 8192);
        assert_eq!(snapshot.used_bytes(), 2048);
        assert_eq!(snapshot.fragmented_bytes(), 1024);
    }
}
