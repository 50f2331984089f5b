//! Transient heaps: a fixed set of device pages serving one resource purpose.

use std::fmt;
use std::sync::Arc;

use crate::allocators::page::{AllocationBlock, Page};
use crate::api::stats::HeapSnapshot;
use crate::gpu::{BackendError, HeapPurpose, PageHandle, TransientDevice};
use crate::sync::mutex::Mutex;

/// Unique identifier of a heap within one allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HeapId(pub u64);

impl HeapId {
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for HeapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "heap#{}", self.0)
    }
}

/// A group of equally sized device pages for either buffers or images.
///
/// One lock covers every page, so a search and a forfeit never interleave.
pub(crate) struct TransientHeap {
    id: HeapId,
    purpose: HeapPurpose,
    page_size: u64,
    pages: Mutex<Vec<Page>>,
    device: Arc<dyn TransientDevice>,
}

impl TransientHeap {
    /// Create a heap and all of its pages.
    ///
    /// If any page fails to allocate, the pages already created are released
    /// before the error is returned.
    pub fn new(
        id: HeapId,
        purpose: HeapPurpose,
        page_size: u64,
        page_count: usize,
        device: Arc<dyn TransientDevice>,
    ) -> Result<Self, BackendError> {
        let alignment = device.page_alignment(purpose);
        let mut pages = Vec::with_capacity(page_count);

        for _ in 0..page_count {
            match device.create_heap_page(page_size, purpose) {
                Ok(handle) => pages.push(Page::new(handle, page_size, alignment)),
                Err(err) => {
                    for page in &pages {
                        device.release_heap_page(page.handle(), purpose);
                    }
                    return Err(err);
                }
            }
        }

        Ok(Self {
            id,
            purpose,
            page_size,
            pages: Mutex::new(pages),
            device,
        })
    }

    pub fn id(&self) -> HeapId {
        self.id
    }

    pub fn purpose(&self) -> HeapPurpose {
        self.purpose
    }

    /// Claim `size` bytes aligned to `alignment` from the first page that can hold them.
    ///
    /// Returns the block together with the native handle of its page.
    pub fn find_next_available_block(
        &self,
        size: u64,
        alignment: u64,
    ) -> Option<(AllocationBlock, PageHandle)> {
        if size == 0 || size > self.page_size {
            return None;
        }

        let mut pages = self.pages.lock();
        for (index, page) in pages.iter_mut().enumerate() {
            if !page.has_room_for(size) {
                continue;
            }
            if let Some(offset) = page.find(size, alignment) {
                let block = AllocationBlock {
                    page_index: index as u32,
                    offset,
                    size,
                };
                return Some((block, page.handle()));
            }
        }

        None
    }

    /// Return a block to its page.
    pub fn forfeit_allocation_block(&self, block: AllocationBlock) {
        let mut pages = self.pages.lock();
        match pages.get_mut(block.page_index as usize) {
            Some(page) => page.forfeit(block.offset, block.size),
            None => {
                crate::ta_emit_ctx!(
                    TA901,
                    format!("{} has no page {} for block {:?}", self.id, block.page_index, block)
                );
            }
        }
    }

    /// Bytes currently handed out across all pages.
    pub fn used_bytes(&self) -> u64 {
        self.pages.lock().iter().map(Page::used_bytes).sum()
    }

    /// Bytes reserved across all pages.
    pub fn capacity(&self) -> u64 {
        self.pages.lock().iter().map(Page::capacity).sum()
    }

    pub fn page_count(&self) -> usize {
        self.pages.lock().len()
    }

    /// Whether no page holds any live block.
    pub fn is_empty(&self) -> bool {
        self.pages.lock().iter().all(Page::is_empty)
    }

    pub fn snapshot(&self) -> HeapSnapshot {
        let pages = self.pages.lock();
        HeapSnapshot {
            heap_id: self.id,
            purpose: self.purpose,
            pages: pages.iter().map(Page::snapshot).collect(),
        }
    }
}

impl fmt::Debug for TransientHeap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransientHeap")
            .field("id", &self.id)
            .field("purpose", &self.purpose)
            .field("page_size", &self.page_size)
            .field("pages", &self.page_count())
            .finish()
    }
}

impl Drop for TransientHeap {
    fn drop(&mut self) {
        for page in self.pages.lock().iter() {
            self.device.release_heap_page(page.handle(), self.purpose);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::DummyDevice;

    fn heap_with(device: &Arc<DummyDevice>, page_size: u64, pages: usize) -> TransientHeap {
        TransientHeap::new(
            HeapId(1),
            HeapPurpose::Buffers,
            page_size,
            pages,
            device.clone() as Arc<dyn TransientDevice>,
        )
        .unwrap()
    }

    #[test]
    fn test_heap_creates_and_releases_pages() {
        let device = Arc::new(DummyDevice::new());
        {
            let heap = heap_with(&device, 4096, 3);
            assert_eq!(heap.page_count(), 3);
            assert_eq!(heap.capacity(), 3 * 4096);
            assert_eq!(device.live_pages(), 3);
        }
        assert_eq!(device.live_pages(), 0);
        assert_eq!(device.stats().pages_released, 3);
    }

    #[test]
    fn test_partial_page_failure_releases_created_pages() {
        let device = Arc::new(DummyDevice::new().with_page_limit(2));
        let result = TransientHeap::new(
            HeapId(7),
            HeapPurpose::Buffers,
            4096,
            4,
            device.clone() as Arc<dyn TransientDevice>,
        );

        assert_eq!(result.err(), Some(BackendError::OutOfDeviceMemory));
        assert_eq!(device.live_pages(), 0);
    }

    #[test]
    fn test_falls_through_to_next_page() {
        let device = Arc::new(DummyDevice::new().with_buffer_alignment(1));
        let heap = heap_with(&device, 4096, 2);

        let (a, _) = heap.find_next_available_block(3072, 1).unwrap();
        assert_eq!((a.page_index, a.offset), (0, 0));

        // Page 0 has 1024 left, not enough
        let (b, _) = heap.find_next_available_block(2048, 1).unwrap();
        assert_eq!((b.page_index, b.offset), (1, 0));

        // Page 0 passes the admission check but its tail cannot honour the alignment
        let (c, _) = heap.find_next_available_block(1024, 2048).unwrap();
        assert_eq!((c.page_index, c.offset), (1, 2048));
    }

    #[test]
    fn test_oversized_request_rejected() {
        let device = Arc::new(DummyDevice::new());
        let heap = heap_with(&device, 4096, 1);
        assert!(heap.find_next_available_block(8192, 1).is_none());
        assert!(heap.find_next_available_block(0, 1).is_none());
    }

    #[test]
    fn test_forfeit_and_is_empty() {
        let device = Arc::new(DummyDevice::new());
        let heap = heap_with(&device, 8192, 1);

        let (a, _) = heap.find_next_available_block(1024, 256).unwrap();
        let (b, _) = heap.find_next_available_block(1024, 256).unwrap();
        assert_eq!(heap.used_bytes(), 2048);
        assert!(!heap.is_empty());

        heap.forfeit_allocation_block(a);
        heap.forfeit_allocation_block(b);
        assert!(heap.is_empty());

        let snapshot = heap.snapshot();
        assert_eq!(snapshot.pages[0].tail, 0);
        assert_eq!(snapshot.pages[0].free_block_count, 0);
        assert_eq!(snapshot.pages[0].largest_free_block, 8192);
    }

    #[test]
    fn test_page_alignment_applies() {
        // Buffer pages honour the device placement alignment even for unaligned requests
        let device = Arc::new(DummyDevice::new().with_buffer_alignment(512));
        let heap = heap_with(&device, 8192, 1);

        let (a, _) = heap.find_next_available_block(100, 1).unwrap();
        let (b, _) = heap.find_next_available_block(100, 1).unwrap();
        assert_eq!(a.offset, 0);
        assert_eq!(b.offset, 512);
    }
}
