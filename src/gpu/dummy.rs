//! Dummy device implementation for testing
//!
//! Keeps page and resource bookkeeping in host memory and never touches a GPU.
//! Tests use it to observe what the allocator asked the backend to do.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use super::traits::*;
use crate::sync::mutex::Mutex;

/// Counters describing what a [`DummyDevice`] has been asked to do.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DummyDeviceStats {
    pub pages_created: u64,
    pub pages_released: u64,
    pub resources_placed: u64,
    pub resources_released: u64,
}

#[derive(Debug, Clone, Copy)]
struct PlacedResource {
    page: PageHandle,
    offset: u64,
    desc: ResourceDesc,
}

#[derive(Debug, Default)]
struct DummyState {
    pages: HashMap<PageHandle, (u64, HeapPurpose)>,
    resources: HashMap<ResourceHandle, PlacedResource>,
    stats: DummyDeviceStats,
}

/// Host-only device for tests and tools.
#[derive(Debug)]
pub struct DummyDevice {
    state: Mutex<DummyState>,
    next_handle: AtomicU64,
    buffer_alignment: u64,
    image_alignment: u64,
    /// Maximum number of pages alive at once (None = unlimited)
    page_limit: Option<usize>,
    fail_placement: AtomicBool,
}

impl DummyDevice {
    /// Create a dummy device with 256-byte buffer and 4 KB image alignment.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(DummyState::default()),
            next_handle: AtomicU64::new(1),
            buffer_alignment: 256,
            image_alignment: 4096,
            page_limit: None,
            fail_placement: AtomicBool::new(false),
        }
    }

    /// Builder pattern: set buffer placement alignment.
    pub fn with_buffer_alignment(mut self, alignment: u64) -> Self {
        self.buffer_alignment = alignment;
        self
    }

    /// Builder pattern: set image alignment reported by `image_requirements`.
    pub fn with_image_alignment(mut self, alignment: u64) -> Self {
        self.image_alignment = alignment;
        self
    }

    /// Builder pattern: fail page creation once `limit` pages are alive.
    pub fn with_page_limit(mut self, limit: usize) -> Self {
        self.page_limit = Some(limit);
        self
    }

    /// Make every subsequent `place_resource` call fail (or succeed again).
    pub fn set_fail_placement(&self, fail: bool) {
        self.fail_placement.store(fail, Ordering::Relaxed);
    }

    /// Counters so far.
    pub fn stats(&self) -> DummyDeviceStats {
        self.state.lock().stats.clone()
    }

    /// Number of pages currently alive.
    pub fn live_pages(&self) -> usize {
        self.state.lock().pages.len()
    }

    /// Number of placed resources currently alive.
    pub fn live_resources(&self) -> usize {
        self.state.lock().resources.len()
    }

    /// Where a live resource was placed.
    pub fn resource_location(&self, resource: ResourceHandle) -> Option<(PageHandle, u64)> {
        self.state
            .lock()
            .resources
            .get(&resource)
            .map(|r| (r.page, r.offset))
    }

    /// Description a live resource was placed with.
    pub fn resource_desc(&self, resource: ResourceHandle) -> Option<ResourceDesc> {
        self.state.lock().resources.get(&resource).map(|r| r.desc)
    }

    fn next_handle(&self) -> u64 {
        self.next_handle.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for DummyDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl TransientDevice for DummyDevice {
    fn create_heap_page(&self, size: u64, purpose: HeapPurpose) -> Result<PageHandle, BackendError> {
        if size == 0 {
            return Err(BackendError::Other("zero-sized page".to_string()));
        }

        let mut state = self.state.lock();
        if let Some(limit) = self.page_limit {
            if state.pages.len() >= limit {
                return Err(BackendError::OutOfDeviceMemory);
            }
        }

        let handle = PageHandle(self.next_handle());
        state.pages.insert(handle, (size, purpose));
        state.stats.pages_created += 1;
        Ok(handle)
    }

    fn release_heap_page(&self, page: PageHandle, _purpose: HeapPurpose) {
        let mut state = self.state.lock();
        if state.pages.remove(&page).is_some() {
            state.stats.pages_released += 1;
        }
    }

    fn place_resource(
        &self,
        page: PageHandle,
        offset: u64,
        desc: &ResourceDesc,
    ) -> Result<ResourceHandle, BackendError> {
        if self.fail_placement.load(Ordering::Relaxed) {
            return Err(BackendError::PlacementFailed("injected failure".to_string()));
        }

        let mut state = self.state.lock();
        let (page_size, purpose) = match state.pages.get(&page) {
            Some(entry) => *entry,
            None => return Err(BackendError::PlacementFailed(format!("unknown page {:?}", page))),
        };

        if purpose != desc.purpose() {
            return Err(BackendError::PlacementFailed(format!(
                "{} resource placed in {} page",
                desc.purpose(),
                purpose
            )));
        }

        let size = match desc {
            ResourceDesc::Buffer(buffer) => buffer.size,
            ResourceDesc::Image { spec, .. } => self.image_requirements(spec).size,
        };
        if offset + size > page_size {
            return Err(BackendError::PlacementFailed(format!(
                "range {}..{} exceeds page size {}",
                offset,
                offset + size,
                page_size
            )));
        }

        let handle = ResourceHandle(self.next_handle());
        state.resources.insert(
            handle,
            PlacedResource {
                page,
                offset,
                desc: *desc,
            },
        );
        state.stats.resources_placed += 1;
        Ok(handle)
    }

    fn release_resource(&self, resource: ResourceHandle, _purpose: HeapPurpose) {
        let mut state = self.state.lock();
        if state.resources.remove(&resource).is_some() {
            state.stats.resources_released += 1;
        }
    }

    fn image_requirements(&self, spec: &ImageSpec) -> MemoryRequirements {
        MemoryRequirements {
            size: crate::util::size::align_up(spec.packed_size(), self.image_alignment),
            alignment: self.image_alignment,
        }
    }

    fn buffer_placement_alignment(&self) -> u64 {
        self.buffer_alignment
    }
}
