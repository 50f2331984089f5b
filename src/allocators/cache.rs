//! Allocation cache: request deduplication and deferred destruction.
//!
//! Live allocations are indexed by request hash so identical requests share
//! one placement. Destroyed allocations leave the index immediately and wait
//! in a [`DeferredDestroyQueue`] until the frame delay has elapsed, so nothing
//! pending can be handed out again.

use std::collections::HashMap;
use std::fmt;

use crate::allocators::deferred::DeferredDestroyQueue;
use crate::allocators::handles::{AllocationHandle, SlotArena};
use crate::api::allocation::{Allocation, Placement};
use crate::gpu::ResourceDesc;
use crate::sync::mutex::Mutex;

/// Errors from cache lifetime operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheError {
    /// The allocation was never registered or has already been released.
    UnknownAllocation,
    /// The allocation has already been destroyed and is waiting out its delay.
    AlreadyPending,
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::UnknownAllocation => write!(f, "allocation is not known to the cache"),
            CacheError::AlreadyPending => write!(f, "allocation is already queued for removal"),
        }
    }
}

impl std::error::Error for CacheError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryState {
    Live,
    Pending,
}

#[derive(Debug)]
struct CacheEntry {
    allocation: Allocation,
    shape: ResourceDesc,
    state: EntryState,
    created_frame: u64,
    #[cfg(feature = "debug")]
    trace: crate::debug::backtrace::CreationTrace,
}

/// Outcome of registering a fresh placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Registration {
    /// The placement is now the live allocation for its shape.
    Inserted(Allocation),
    /// Another thread registered the same shape first.
    Existing(Allocation),
}

/// A still-live allocation found at shutdown.
#[derive(Debug)]
pub(crate) struct LeakedAllocation {
    pub allocation: Allocation,
    pub created_frame: u64,
    pub trace: Option<String>,
}

/// Everything left in the cache at shutdown.
#[derive(Debug, Default)]
pub(crate) struct DrainedEntries {
    pub pending: Vec<Allocation>,
    pub live: Vec<LeakedAllocation>,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: SlotArena<CacheEntry>,
    live_by_hash: HashMap<u64, Vec<AllocationHandle>>,
    pending: DeferredDestroyQueue,
}

impl CacheState {
    fn find_live(&self, hash: u64, shape: &ResourceDesc) -> Option<Allocation> {
        self.live_by_hash
            .get(&hash)?
            .iter()
            .filter_map(|&handle| self.entries.get(handle))
            .find(|entry| entry.state == EntryState::Live && entry.shape == *shape)
            .map(|entry| entry.allocation)
    }

    fn unindex(&mut self, hash: u64, handle: AllocationHandle) {
        if let Some(handles) = self.live_by_hash.get_mut(&hash) {
            handles.retain(|&h| h != handle);
            if handles.is_empty() {
                self.live_by_hash.remove(&hash);
            }
        }
    }
}

/// Deduplicating, frame-delayed store of transient allocations.
pub(crate) struct AllocationCache {
    state: Mutex<CacheState>,
    frame_delay: u32,
}

impl AllocationCache {
    /// Create a cache whose destroyed entries expire after `frame_delay` frames (minimum 1).
    pub fn new(frame_delay: u32) -> Self {
        Self {
            state: Mutex::new(CacheState::default()),
            frame_delay: frame_delay.max(1),
        }
    }

    pub fn frame_delay(&self) -> u32 {
        self.frame_delay
    }

    /// Look up a live allocation with this hash and an equal shape.
    pub fn try_get_from_hash(&self, hash: u64, shape: &ResourceDesc) -> Option<Allocation> {
        self.state.lock().find_live(hash, shape)
    }

    /// Register a fresh placement as the live allocation for `shape`.
    ///
    /// If a live allocation with the same shape appeared since the caller's
    /// lookup, nothing is stored and that allocation is returned instead.
    pub fn register(
        &self,
        hash: u64,
        shape: ResourceDesc,
        placement: Placement,
        frame: u64,
    ) -> Registration {
        let mut state = self.state.lock();

        if let Some(existing) = state.find_live(hash, &shape) {
            return Registration::Existing(existing);
        }

        let handle = state.entries.insert_with(|handle| CacheEntry {
            allocation: placement.into_allocation(handle, hash),
            shape,
            state: EntryState::Live,
            created_frame: frame,
            #[cfg(feature = "debug")]
            trace: crate::debug::backtrace::CreationTrace::capture(),
        });
        state.live_by_hash.entry(hash).or_default().push(handle);

        Registration::Inserted(placement.into_allocation(handle, hash))
    }

    /// Move a live allocation to the pending queue.
    pub fn queue_for_removal(&self, allocation: &Allocation) -> Result<(), CacheError> {
        let mut state = self.state.lock();

        let entry = state
            .entries
            .get_mut(allocation.handle)
            .ok_or(CacheError::UnknownAllocation)?;
        if entry.allocation != *allocation {
            return Err(CacheError::UnknownAllocation);
        }
        if entry.state == EntryState::Pending {
            return Err(CacheError::AlreadyPending);
        }

        entry.state = EntryState::Pending;
        let hash = entry.allocation.request_hash;
        state.unindex(hash, allocation.handle);
        state.pending.push(allocation.handle, self.frame_delay);
        Ok(())
    }

    /// Count one frame boundary and remove the allocations whose delay elapsed.
    ///
    /// The returned allocations are no longer known to the cache; the caller
    /// must hand their blocks back to the owning heaps.
    pub fn age_and_collect(&self) -> Vec<Allocation> {
        let mut state = self.state.lock();
        if state.pending.is_empty() {
            return Vec::new();
        }
        let expired = state.pending.age();
        expired
            .into_iter()
            .filter_map(|handle| state.entries.remove(handle))
            .map(|entry| entry.allocation)
            .collect()
    }

    /// Remove every entry, live or pending.
    pub fn drain_all(&self) -> DrainedEntries {
        let mut state = self.state.lock();
        let mut drained = DrainedEntries::default();

        let pending = state.pending.drain();
        for handle in pending {
            if let Some(entry) = state.entries.remove(handle) {
                drained.pending.push(entry.allocation);
            }
        }

        let live: Vec<AllocationHandle> = state.entries.iter().map(|(handle, _)| handle).collect();
        for handle in live {
            if let Some(entry) = state.entries.remove(handle) {
                drained.live.push(LeakedAllocation {
                    allocation: entry.allocation,
                    created_frame: entry.created_frame,
                    #[cfg(feature = "debug")]
                    trace: Some(entry.trace.resolve()),
                    #[cfg(not(feature = "debug"))]
                    trace: None,
                });
            }
        }

        state.live_by_hash.clear();
        drained
    }

    /// Whether `allocation` is registered and not yet destroyed.
    pub fn is_live(&self, allocation: &Allocation) -> bool {
        self.state
            .lock()
            .entries
            .get(allocation.handle)
            .map_or(false, |entry| {
                entry.state == EntryState::Live && entry.allocation == *allocation
            })
    }

    pub fn live_count(&self) -> usize {
        let state = self.state.lock();
        state.entries.len() - state.pending.len()
    }

    pub fn pending_count(&self) -> usize {
        self.state.lock().pending.len()
    }
}

impl fmt::Debug for AllocationCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AllocationCache")
            .field("frame_delay", &self.frame_delay())
            .field("live", &self.live_count())
            .field("pending", &self.pending_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocators::heap::HeapId;
    use crate::allocators::page::AllocationBlock;
    use crate::gpu::{BufferDesc, BufferUsage, HeapPurpose, MemoryUsage, ResourceHandle};

    fn shape(size: u64) -> ResourceDesc {
        ResourceDesc::Buffer(BufferDesc {
            size,
            usage: BufferUsage::UNIFORM_BUFFER,
            memory_usage: MemoryUsage::GPU_ONLY,
        })
    }

    fn placement(resource: u64, offset: u64, size: u64) -> Placement {
        Placement {
            resource: ResourceHandle(resource),
            heap_id: HeapId(0),
            block: AllocationBlock {
                page_index: 0,
                offset,
                size,
            },
            purpose: HeapPurpose::Buffers,
        }
    }

    fn inserted(reg: Registration) -> Allocation {
        match reg {
            Registration::Inserted(a) => a,
            Registration::Existing(a) => panic!("expected insert, got existing {:?}", a),
        }
    }

    #[test]
    fn test_hit_after_register() {
        let cache = AllocationCache::new(3);
        assert!(cache.try_get_from_hash(42, &shape(256)).is_none());

        let alloc = inserted(cache.register(42, shape(256), placement(1, 0, 256), 0));
        assert_eq!(cache.try_get_from_hash(42, &shape(256)), Some(alloc));
        assert_eq!(alloc.request_hash(), 42);
        assert_eq!(cache.live_count(), 1);
    }

    #[test]
    fn test_hash_collision_checks_shape() {
        let cache = AllocationCache::new(3);
        let a = inserted(cache.register(7, shape(256), placement(1, 0, 256), 0));
        let b = inserted(cache.register(7, shape(512), placement(2, 256, 512), 0));

        assert_ne!(a, b);
        assert_eq!(cache.try_get_from_hash(7, &shape(256)), Some(a));
        assert_eq!(cache.try_get_from_hash(7, &shape(512)), Some(b));
        assert_eq!(cache.try_get_from_hash(7, &shape(1024)), None);
    }

    #[test]
    fn test_register_race_returns_existing() {
        let cache = AllocationCache::new(3);
        let winner = inserted(cache.register(1, shape(256), placement(1, 0, 256), 0));
        let loser = cache.register(1, shape(256), placement(2, 256, 256), 0);
        assert_eq!(loser, Registration::Existing(winner));
        assert_eq!(cache.live_count(), 1);
    }

    #[test]
    fn test_pending_not_returned() {
        let cache = AllocationCache::new(2);
        let alloc = inserted(cache.register(1, shape(256), placement(1, 0, 256), 0));

        cache.queue_for_removal(&alloc).unwrap();
        assert!(!cache.is_live(&alloc));
        assert!(cache.try_get_from_hash(1, &shape(256)).is_none());
        assert_eq!(cache.pending_count(), 1);
        assert_eq!(cache.live_count(), 0);

        // A new registration of the same shape is a separate entry
        let fresh = inserted(cache.register(1, shape(256), placement(2, 256, 256), 0));
        assert_ne!(fresh.handle(), alloc.handle());
    }

    #[test]
    fn test_queue_twice_and_unknown() {
        let cache = AllocationCache::new(1);
        let alloc = inserted(cache.register(1, shape(256), placement(1, 0, 256), 0));

        assert_eq!(cache.queue_for_removal(&alloc), Ok(()));
        assert_eq!(cache.queue_for_removal(&alloc), Err(CacheError::AlreadyPending));

        assert_eq!(cache.age_and_collect(), vec![alloc]);
        assert_eq!(cache.queue_for_removal(&alloc), Err(CacheError::UnknownAllocation));
    }

    #[test]
    fn test_age_and_collect_waits_for_delay() {
        let cache = AllocationCache::new(3);
        let alloc = inserted(cache.register(1, shape(256), placement(1, 0, 256), 0));
        cache.queue_for_removal(&alloc).unwrap();

        assert!(cache.age_and_collect().is_empty());
        assert!(cache.age_and_collect().is_empty());
        assert_eq!(cache.age_and_collect(), vec![alloc]);
        assert_eq!(cache.pending_count(), 0);
    }

    #[test]
    fn test_frame_delay_minimum() {
        let cache = AllocationCache::new(0);
        assert_eq!(cache.frame_delay(), 1);
    }

    #[test]
    fn test_drain_all() {
        let cache = AllocationCache::new(3);
        let a = inserted(cache.register(1, shape(256), placement(1, 0, 256), 4));
        let b = inserted(cache.register(2, shape(512), placement(2, 256, 512), 5));
        cache.queue_for_removal(&a).unwrap();

        let drained = cache.drain_all();
        assert_eq!(drained.pending, vec![a]);
        assert_eq!(drained.live.len(), 1);
        assert_eq!(drained.live[0].allocation, b);
        assert_eq!(drained.live[0].created_frame, 5);
        assert_eq!(cache.live_count(), 0);
        assert_eq!(cache.pending_count(), 0);
    }
}
