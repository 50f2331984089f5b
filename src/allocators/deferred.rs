//! Frame-delayed destruction queue.
//!
//! A destroyed allocation may still be referenced by command buffers that the
//! device has not finished executing. Instead of waiting on fences, entries
//! sit here for a fixed number of frame boundaries before they are released.

use std::collections::VecDeque;

use crate::allocators::handles::AllocationHandle;

/// A pending deferred destroy.
#[derive(Debug, Clone, Copy)]
struct PendingDestroy {
    handle: AllocationHandle,
    frames_remaining: u32,
}

/// Queue of allocations waiting out their safety window.
#[derive(Debug)]
pub(crate) struct DeferredDestroyQueue {
    entries: VecDeque<PendingDestroy>,
}

impl DeferredDestroyQueue {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::new(),
        }
    }

    /// Queue a handle to expire after `frames` calls to [`age`](Self::age).
    pub fn push(&mut self, handle: AllocationHandle, frames: u32) {
        self.entries.push_back(PendingDestroy {
            handle,
            frames_remaining: frames.max(1),
        });
    }

    /// Count one frame boundary and return the handles whose window has elapsed.
    pub fn age(&mut self) -> Vec<AllocationHandle> {
        let mut expired = Vec::new();
        self.entries.retain_mut(|entry| {
            entry.frames_remaining -= 1;
            if entry.frames_remaining == 0 {
                expired.push(entry.handle);
                false
            } else {
                true
            }
        });
        expired
    }

    /// Remove every entry regardless of its remaining window.
    pub fn drain(&mut self) -> Vec<AllocationHandle> {
        self.entries.drain(..).map(|entry| entry.handle).collect()
    }

    #[cfg(test)]
    pub fn contains(&self, handle: AllocationHandle) -> bool {
        self.entries.iter().any(|entry| entry.handle == handle)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl Default for DeferredDestroyQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocators::handles::SlotArena;

    fn handles(n: usize) -> Vec<AllocationHandle> {
        let mut arena = SlotArena::new();
        (0..n).map(|i| arena.insert_with(|_| i)).collect()
    }

    #[test]
    fn test_expires_after_delay() {
        let h = handles(1);
        let mut queue = DeferredDestroyQueue::new();
        queue.push(h[0], 3);

        assert!(queue.age().is_empty());
        assert!(queue.age().is_empty());
        assert!(queue.contains(h[0]));
        assert_eq!(queue.age(), vec![h[0]]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_zero_delay_treated_as_one() {
        let h = handles(1);
        let mut queue = DeferredDestroyQueue::new();
        queue.push(h[0], 0);
        assert_eq!(queue.age(), vec![h[0]]);
    }

    #[test]
    fn test_staggered_entries() {
        let h = handles(2);
        let mut queue = DeferredDestroyQueue::new();
        queue.push(h[0], 2);
        queue.age();
        queue.push(h[1], 2);

        assert_eq!(queue.age(), vec![h[0]]);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.age(), vec![h[1]]);
    }

    #[test]
    fn test_drain() {
        let h = handles(3);
        let mut queue = DeferredDestroyQueue::new();
        for &handle in &h {
            queue.push(handle, 5);
        }
        assert_eq!(queue.drain(), h);
        assert!(queue.is_empty());
    }
}
