//! Allocator event log.
//!
//! Any thread pushes events without taking a lock; the frame thread drains
//! them for overlays, profilers or tests. When the log is full the oldest
//! event is dropped and counted.

use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_queue::ArrayQueue;

use crate::allocators::handles::AllocationHandle;
use crate::allocators::heap::HeapId;
use crate::api::allocation::Allocation;
use crate::gpu::HeapPurpose;

/// Something the allocator did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocatorEvent {
    /// A fresh allocation was placed and registered.
    Created { allocation: Allocation },
    /// A create call was answered from the cache.
    CacheHit { allocation: Allocation },
    /// An allocation was queued for deferred destruction.
    Destroyed { allocation: Allocation, frame: u64 },
    /// An expired allocation's block went back to its heap.
    Forfeited { allocation: Allocation },
    /// An expired allocation's heap was gone; the resource was released directly.
    Orphaned { allocation: Allocation },
    /// A destroy call named an allocation that is not live.
    UnknownDestroy { handle: AllocationHandle },
    /// A heap and its pages were created.
    HeapCreated { heap_id: HeapId, purpose: HeapPurpose, bytes: u64 },
    /// A heap and its pages were released.
    HeapReleased { heap_id: HeapId, purpose: HeapPurpose },
    /// A request could not be placed even in a new heap.
    Exhausted { size: u64, purpose: HeapPurpose },
    /// `update()` finished a frame.
    Frame { frame: u64 },
}

/// Bounded lock-free event queue.
pub(crate) struct EventLog {
    queue: Option<ArrayQueue<AllocatorEvent>>,
    dropped: AtomicU64,
}

impl EventLog {
    /// Create a log holding up to `capacity` events. A capacity of 0 disables it.
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: (capacity > 0).then(|| ArrayQueue::new(capacity)),
            dropped: AtomicU64::new(0),
        }
    }

    pub fn push(&self, event: AllocatorEvent) {
        if let Some(queue) = &self.queue {
            if queue.force_push(event).is_some() {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Take every queued event, oldest first.
    pub fn drain(&self) -> Vec<AllocatorEvent> {
        let mut events = Vec::new();
        if let Some(queue) = &self.queue {
            events.reserve(queue.len());
            while let Some(event) = queue.pop() {
                events.push(event);
            }
        }
        events
    }

    /// Number of events discarded because the log was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn is_enabled(&self) -> bool {
        self.queue.is_some()
    }
}

impl std::fmt::Debug for EventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLog")
            .field("enabled", &self.is_enabled())
            .field("capacity", &self.queue.as_ref().map(|q| q.capacity()))
            .field("dropped", &self.dropped())
            .finish()
    }
}
