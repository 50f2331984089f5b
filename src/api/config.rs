//! Allocator configuration.

use crate::util::size::{kb, mb};

/// Configuration for the transient allocator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransientConfig {
    /// Size of each device memory page (default: 64 MB)
    pub page_size: u64,

    /// Number of pages reserved by every heap (default: 4)
    pub pages_per_heap: usize,

    /// Frames a destroyed allocation waits before its memory is reused (default: 3).
    ///
    /// Must cover the number of frames the device may still be executing
    /// after the CPU records a destroy. Values below 1 are treated as 1.
    pub frame_delay: u32,

    /// Create one buffer heap and one image heap up front (default: false)
    pub eager_heaps: bool,

    /// Maximum number of undrained allocator events; 0 disables the log (default: 1024)
    pub event_capacity: usize,
}

impl Default for TransientConfig {
    fn default() -> Self {
        Self {
            page_size: mb(64),
            pages_per_heap: 4,
            frame_delay: 3,
            eager_heaps: false,
            event_capacity: 1024,
        }
    }
}

impl TransientConfig {
    /// Create a minimal config for testing or tools.
    pub fn minimal() -> Self {
        Self {
            page_size: kb(256),
            pages_per_heap: 2,
            frame_delay: 3,
            eager_heaps: false,
            event_capacity: 256,
        }
    }

    /// Create a config for renderers with large transient working sets.
    pub fn high_capacity() -> Self {
        Self {
            page_size: mb(256),
            pages_per_heap: 8,
            frame_delay: 3,
            eager_heaps: true,
            event_capacity: 4096,
        }
    }

    /// Builder pattern: set page size.
    pub fn with_page_size(mut self, size: u64) -> Self {
        self.page_size = size;
        self
    }

    /// Builder pattern: set pages per heap.
    pub fn with_pages_per_heap(mut self, count: usize) -> Self {
        self.pages_per_heap = count;
        self
    }

    /// Builder pattern: set frame delay.
    pub fn with_frame_delay(mut self, frames: u32) -> Self {
        self.frame_delay = frames;
        self
    }

    /// Builder pattern: create default heaps at construction.
    pub fn with_eager_heaps(mut self, eager: bool) -> Self {
        self.eager_heaps = eager;
        self
    }

    /// Builder pattern: set event log capacity.
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Frame delay actually applied.
    pub fn effective_frame_delay(&self) -> u32 {
        self.frame_delay.max(1)
    }

    /// Bytes reserved by one heap.
    pub fn heap_bytes(&self) -> u64 {
        self.page_size * self.pages_per_heap as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TransientConfig::default();
        assert_eq!(config.page_size, mb(64));
        assert_eq!(config.pages_per_heap, 4);
        assert_eq!(config.frame_delay, 3);
        assert!(!config.eager_heaps);
        assert_eq!(config.heap_bytes(), mb(256));
    }

    #[test]
    fn test_builders() {
        let config = TransientConfig::minimal()
            .with_page_size(kb(4))
            .with_pages_per_heap(1)
            .with_frame_delay(0)
            .with_eager_heaps(true)
            .with_event_capacity(0);

        assert_eq!(config.page_size, 4096);
        assert_eq!(config.pages_per_heap, 1);
        assert_eq!(config.effective_frame_delay(), 1);
        assert!(config.eager_heaps);
        assert_eq!(config.event_capacity, 0);
    }

    #[test]
    fn test_presets() {
        assert!(TransientConfig::minimal().page_size < TransientConfig::default().page_size);
        assert!(TransientConfig::high_capacity().eager_heaps);
    }
}
