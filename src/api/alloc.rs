//! The main allocator type.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::allocators::cache::{AllocationCache, Registration};
use crate::allocators::heap::{HeapId, TransientHeap};
use crate::allocators::page::AllocationBlock;
use crate::api::allocation::{Allocation, Placement};
use crate::api::config::TransientConfig;
use crate::api::error::TransientAllocError;
use crate::api::request::request_hash;
use crate::api::stats::{HeapSnapshot, TransientStats};
use crate::diagnostics::events::{AllocatorEvent, EventLog};
use crate::diagnostics::tracy::{self, ProfileZone};
use crate::gpu::{
    BufferDesc, BufferUsage, HeapPurpose, ImageSpec, MemoryUsage, PageHandle, ResourceDesc,
    TransientDevice,
};
use crate::sync::atomics::{AtomicCounter, ByteGauge};
use crate::sync::mutex::RwLock;
use crate::util::size::{align_up, format_bytes};
use crate::{ta_emit, ta_emit_ctx};

/// Transient GPU memory allocator.
///
/// Carves short-lived buffers and images out of large device pages and
/// reclaims them a fixed number of frames after they are destroyed. It is
/// cheap to clone (internally uses `Arc`) and thread-safe; `update()` must be
/// called once per frame from a single thread.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use transalloc::{BufferUsage, DummyDevice, MemoryUsage, TransientAllocator, TransientConfig};
///
/// let device = Arc::new(DummyDevice::new());
/// let alloc = TransientAllocator::new(device, TransientConfig::minimal());
///
/// let buffer = alloc
///     .create_buffer(4096, BufferUsage::STORAGE_BUFFER, MemoryUsage::GPU_ONLY)
///     .unwrap();
/// // ... record GPU work using buffer.resource() ...
/// alloc.destroy_buffer(&buffer);
/// alloc.update();
/// ```
#[derive(Clone)]
pub struct TransientAllocator {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Counters {
    next_heap_id: AtomicCounter,
    cache_hits: AtomicCounter,
    cache_misses: AtomicCounter,
    heaps_created: AtomicCounter,
    heaps_released: AtomicCounter,
    forfeits: AtomicCounter,
    orphans: AtomicCounter,
    unknown_destroys: AtomicCounter,
    exhaustion_failures: AtomicCounter,
}

struct Inner {
    device: Arc<dyn TransientDevice>,
    config: TransientConfig,
    buffer_heaps: RwLock<Vec<Arc<TransientHeap>>>,
    image_heaps: RwLock<Vec<Arc<TransientHeap>>>,
    cache: AllocationCache,
    events: EventLog,
    counters: Counters,
    used: ByteGauge,
    frame: AtomicU64,
}

impl TransientAllocator {
    /// Create a new allocator on top of `device`.
    ///
    /// With `eager_heaps` set, one buffer heap and one image heap are created
    /// immediately; if that fails the heaps are created on first use instead.
    pub fn new(device: Arc<dyn TransientDevice>, config: TransientConfig) -> Self {
        crate::diagnostics::init_from_env();

        let inner = Inner {
            cache: AllocationCache::new(config.effective_frame_delay()),
            events: EventLog::new(config.event_capacity),
            device,
            config,
            buffer_heaps: RwLock::new(Vec::new()),
            image_heaps: RwLock::new(Vec::new()),
            counters: Counters::default(),
            used: ByteGauge::new(),
            frame: AtomicU64::new(0),
        };

        if inner.config.eager_heaps {
            for purpose in [HeapPurpose::Buffers, HeapPurpose::Images] {
                if let Ok(heap) = inner.create_heap(purpose) {
                    inner.heaps(purpose).write().push(heap);
                }
            }
        }

        Self {
            inner: Arc::new(inner),
        }
    }

    /// Create an allocator with default configuration.
    pub fn with_defaults(device: Arc<dyn TransientDevice>) -> Self {
        Self::new(device, TransientConfig::default())
    }

    /// The configuration this allocator was created with.
    pub fn config(&self) -> &TransientConfig {
        &self.inner.config
    }

    /// The backend device.
    pub fn device(&self) -> &Arc<dyn TransientDevice> {
        &self.inner.device
    }

    /// Create (or reuse) a transient buffer.
    ///
    /// `size` is rounded up to the device's buffer placement alignment. If a
    /// live allocation with the same rounded size, usage and memory class
    /// exists, it is returned instead of placing a new buffer.
    pub fn create_buffer(
        &self,
        size: u64,
        usage: BufferUsage,
        memory_usage: MemoryUsage,
    ) -> Result<Allocation, TransientAllocError> {
        let inner = &*self.inner;

        if size == 0 {
            ta_emit!(TA002);
            return Err(TransientAllocError::InvalidSize { size });
        }
        inner.check_memory_usage(memory_usage)?;
        inner.check_fits_page(size, HeapPurpose::Buffers)?;

        let alignment = inner.device.buffer_placement_alignment().max(1);
        let size = align_up(size, alignment);
        let desc = ResourceDesc::Buffer(BufferDesc {
            size,
            usage,
            memory_usage,
        });
        let hash = request_hash(&desc);

        if let Some(hit) = inner.lookup(hash, &desc) {
            return Ok(hit);
        }

        inner.allocate(desc, hash, size, alignment)
    }

    /// Create (or reuse) a transient image.
    ///
    /// Size and alignment come from the device's requirement query, which is
    /// only made on a cache miss.
    pub fn create_image(
        &self,
        spec: ImageSpec,
        memory_usage: MemoryUsage,
    ) -> Result<Allocation, TransientAllocError> {
        let inner = &*self.inner;

        if !spec.is_valid() {
            ta_emit_ctx!(TA002, format!("{:?}", spec));
            return Err(TransientAllocError::InvalidSize { size: 0 });
        }
        inner.check_memory_usage(memory_usage)?;

        let desc = ResourceDesc::Image { spec, memory_usage };
        let hash = request_hash(&desc);

        if let Some(hit) = inner.lookup(hash, &desc) {
            return Ok(hit);
        }

        let requirements = inner.device.image_requirements(&spec);
        inner.check_fits_page(requirements.size, HeapPurpose::Images)?;
        let alignment = requirements.alignment.max(1);
        let size = align_up(requirements.size, alignment);
        if size == 0 {
            ta_emit_ctx!(TA002, format!("backend reported zero size for {:?}", spec));
            return Err(TransientAllocError::InvalidSize { size });
        }

        inner.allocate(desc, hash, size, alignment)
    }

    /// Destroy a buffer allocation after the frame delay.
    ///
    /// Unknown or already destroyed allocations are reported (TA201) and ignored.
    pub fn destroy_buffer(&self, allocation: &Allocation) {
        self.inner.destroy(allocation, HeapPurpose::Buffers);
    }

    /// Destroy an image allocation after the frame delay.
    ///
    /// Unknown or already destroyed allocations are reported (TA201) and ignored.
    pub fn destroy_image(&self, allocation: &Allocation) {
        self.inner.destroy(allocation, HeapPurpose::Images);
    }

    /// Advance one frame.
    ///
    /// Allocations whose frame delay has elapsed release their native resource
    /// and return their block to the heap. Call once per frame from one thread.
    pub fn update(&self) {
        let inner = &*self.inner;
        let _zone = ProfileZone::new("TransientAllocator::update");

        for allocation in inner.cache.age_and_collect() {
            inner.release(&allocation);
        }

        let frame = inner.frame.fetch_add(1, Ordering::Relaxed) + 1;
        inner.events.push(AllocatorEvent::Frame { frame });

        tracy::frame_mark();
        tracy::plot_used_bytes(inner.used.get());
    }

    /// Number of `update()` calls so far.
    pub fn frame(&self) -> u64 {
        self.inner.frame.load(Ordering::Relaxed)
    }

    /// Whether `allocation` is live (created and not yet destroyed).
    pub fn is_live(&self, allocation: &Allocation) -> bool {
        self.inner.cache.is_live(allocation)
    }

    /// Take every event recorded since the last drain, oldest first.
    pub fn drain_events(&self) -> Vec<AllocatorEvent> {
        self.inner.events.drain()
    }

    /// Get allocator statistics.
    pub fn stats(&self) -> TransientStats {
        let inner = &*self.inner;
        let counters = &inner.counters;

        let (buffer_heaps, buffer_bytes) = inner.heap_totals(HeapPurpose::Buffers);
        let (image_heaps, image_bytes) = inner.heap_totals(HeapPurpose::Images);

        TransientStats {
            buffer_heaps,
            image_heaps,
            reserved_bytes: buffer_bytes + image_bytes,
            used_bytes: inner.used.get(),
            peak_used_bytes: inner.used.peak(),
            live_allocations: inner.cache.live_count(),
            pending_allocations: inner.cache.pending_count(),
            cache_hits: counters.cache_hits.get(),
            cache_misses: counters.cache_misses.get(),
            heaps_created: counters.heaps_created.get(),
            heaps_released: counters.heaps_released.get(),
            forfeits: counters.forfeits.get(),
            orphans: counters.orphans.get(),
            unknown_destroys: counters.unknown_destroys.get(),
            exhaustion_failures: counters.exhaustion_failures.get(),
            dropped_events: inner.events.dropped(),
            frame: inner.frame.load(Ordering::Relaxed),
        }
    }

    /// Per-page state of every heap, buffer heaps first.
    pub fn heap_snapshots(&self) -> Vec<HeapSnapshot> {
        [HeapPurpose::Buffers, HeapPurpose::Images]
            .into_iter()
            .flat_map(|purpose| {
                self.inner
                    .heaps(purpose)
                    .read()
                    .iter()
                    .map(|heap| heap.snapshot())
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Release heaps that hold no allocations, live or pending.
    ///
    /// With `eager_heaps` set, the last heap of each purpose is kept.
    /// Returns the number of heaps released.
    pub fn trim_heaps(&self) -> usize {
        let inner = &*self.inner;
        let mut released = Vec::new();

        for purpose in [HeapPurpose::Buffers, HeapPurpose::Images] {
            let mut heaps = inner.heaps(purpose).write();
            let mut index = heaps.len();
            while index > 0 {
                index -= 1;
                if inner.config.eager_heaps && heaps.len() == 1 {
                    break;
                }
                if heaps[index].is_empty() {
                    released.push(heaps.remove(index));
                }
            }
        }

        let count = released.len();
        for heap in released {
            inner.note_heap_released(&heap);
        }
        count
    }

    /// Release every allocation and heap.
    ///
    /// Pending allocations are released immediately. Allocations that were
    /// never destroyed are reported as leaks (TA301) and released too. Also
    /// runs when the last clone of the allocator is dropped.
    pub fn shutdown(&self) {
        self.inner.shutdown();
    }

    /// Remove a heap from the allocator without releasing its allocations.
    #[cfg(test)]
    fn detach_heap(&self, heap_id: HeapId) -> Option<Arc<TransientHeap>> {
        [HeapPurpose::Buffers, HeapPurpose::Images]
            .into_iter()
            .find_map(|purpose| {
                let mut heaps = self.inner.heaps(purpose).write();
                let index = heaps.iter().position(|heap| heap.id() == heap_id)?;
                Some(heaps.remove(index))
            })
    }
}

impl std::fmt::Debug for TransientAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransientAllocator")
            .field("config", &self.inner.config)
            .field("cache", &self.inner.cache)
            .field("events", &self.inner.events)
            .field("frame", &self.frame())
            .finish()
    }
}

impl Inner {
    fn heaps(&self, purpose: HeapPurpose) -> &RwLock<Vec<Arc<TransientHeap>>> {
        match purpose {
            HeapPurpose::Buffers => &self.buffer_heaps,
            HeapPurpose::Images => &self.image_heaps,
        }
    }

    fn heap_totals(&self, purpose: HeapPurpose) -> (usize, u64) {
        let heaps = self.heaps(purpose).read();
        (heaps.len(), heaps.iter().map(|heap| heap.capacity()).sum())
    }

    fn find_heap(&self, purpose: HeapPurpose, heap_id: HeapId) -> Option<Arc<TransientHeap>> {
        self.heaps(purpose)
            .read()
            .iter()
            .find(|heap| heap.id() == heap_id)
            .cloned()
    }

    fn check_memory_usage(&self, memory_usage: MemoryUsage) -> Result<(), TransientAllocError> {
        if memory_usage.is_conflicting() {
            ta_emit!(TA003);
            return Err(TransientAllocError::ConflictingMemoryUsage(memory_usage));
        }
        Ok(())
    }

    /// Reject requests no page can ever hold, before any rounding or heap growth.
    fn check_fits_page(&self, size: u64, purpose: HeapPurpose) -> Result<(), TransientAllocError> {
        if size > self.config.page_size {
            ta_emit_ctx!(
                TA102,
                format!(
                    "{} requested, page size {}",
                    format_bytes(size),
                    format_bytes(self.config.page_size)
                )
            );
            return Err(self.exhausted(size, purpose));
        }
        Ok(())
    }

    fn lookup(&self, hash: u64, desc: &ResourceDesc) -> Option<Allocation> {
        let hit = self.cache.try_get_from_hash(hash, desc)?;
        self.counters.cache_hits.increment();
        self.events.push(AllocatorEvent::CacheHit { allocation: hit });
        Some(hit)
    }

    /// Place a fresh resource for a request that missed the cache.
    fn allocate(
        &self,
        desc: ResourceDesc,
        hash: u64,
        size: u64,
        alignment: u64,
    ) -> Result<Allocation, TransientAllocError> {
        let _zone = ProfileZone::new("TransientAllocator::allocate");
        self.counters.cache_misses.increment();

        let purpose = desc.purpose();
        // Rounding can still push a request that passed the early check past the page
        self.check_fits_page(size, purpose)?;

        let (heap, block, page) = self.find_block(purpose, size, alignment)?;

        let resource = match self.device.place_resource(page, block.offset, &desc) {
            Ok(resource) => resource,
            Err(err) => {
                heap.forfeit_allocation_block(block);
                ta_emit_ctx!(TA004, format!("{} block {:?}: {}", heap.id(), block, err));
                return Err(err.into());
            }
        };

        let placement = Placement {
            resource,
            heap_id: heap.id(),
            block,
            purpose,
        };
        let frame = self.frame.load(Ordering::Relaxed);

        match self.cache.register(hash, desc, placement, frame) {
            Registration::Inserted(allocation) => {
                self.used.add(allocation.size);
                self.events.push(AllocatorEvent::Created { allocation });
                Ok(allocation)
            }
            Registration::Existing(winner) => {
                // Another thread registered the same shape first; ours was never visible.
                self.device.release_resource(resource, purpose);
                heap.forfeit_allocation_block(block);
                self.counters.cache_hits.increment();
                self.events.push(AllocatorEvent::CacheHit { allocation: winner });
                Ok(winner)
            }
        }
    }

    /// Find a block in an existing heap of `purpose`, or in one new heap.
    fn find_block(
        &self,
        purpose: HeapPurpose,
        size: u64,
        alignment: u64,
    ) -> Result<(Arc<TransientHeap>, AllocationBlock, PageHandle), TransientAllocError> {
        let heaps = self.heaps(purpose);

        for heap in heaps.read().iter() {
            if let Some((block, page)) = heap.find_next_available_block(size, alignment) {
                return Ok((heap.clone(), block, page));
            }
        }

        let mut heaps = heaps.write();

        // Another thread may have grown the list or freed space while we waited.
        for heap in heaps.iter() {
            if let Some((block, page)) = heap.find_next_available_block(size, alignment) {
                return Ok((heap.clone(), block, page));
            }
        }

        let heap = self.create_heap(purpose)?;
        let found = heap.find_next_available_block(size, alignment);
        heaps.push(heap.clone());
        drop(heaps);

        match found {
            Some((block, page)) => Ok((heap, block, page)),
            None => {
                ta_emit_ctx!(TA001, format!("{} {} bytes aligned to {}", purpose, size, alignment));
                Err(self.exhausted(size, purpose))
            }
        }
    }

    fn create_heap(&self, purpose: HeapPurpose) -> Result<Arc<TransientHeap>, TransientAllocError> {
        let heap_id = HeapId(self.counters.next_heap_id.increment());
        let heap = TransientHeap::new(
            heap_id,
            purpose,
            self.config.page_size,
            self.config.pages_per_heap.max(1),
            self.device.clone(),
        )
        .map_err(|err| {
            ta_emit_ctx!(TA101, format!("{} {}: {}", purpose, heap_id, err));
            TransientAllocError::Backend(err)
        })?;

        self.counters.heaps_created.increment();
        self.events.push(AllocatorEvent::HeapCreated {
            heap_id,
            purpose,
            bytes: heap.capacity(),
        });
        Ok(Arc::new(heap))
    }

    fn exhausted(&self, size: u64, purpose: HeapPurpose) -> TransientAllocError {
        self.counters.exhaustion_failures.increment();
        self.events.push(AllocatorEvent::Exhausted { size, purpose });
        TransientAllocError::ExhaustedCapacity { size, purpose }
    }

    fn destroy(&self, allocation: &Allocation, purpose: HeapPurpose) {
        let result = if allocation.purpose == purpose {
            self.cache.queue_for_removal(allocation).map_err(|err| err.to_string())
        } else {
            Err(format!("{} allocation destroyed as {}", allocation.purpose, purpose))
        };

        match result {
            Ok(()) => self.events.push(AllocatorEvent::Destroyed {
                allocation: *allocation,
                frame: self.frame.load(Ordering::Relaxed),
            }),
            Err(reason) => {
                self.counters.unknown_destroys.increment();
                ta_emit_ctx!(TA201, format!("{:?}: {}", allocation.handle, reason));
                self.events.push(AllocatorEvent::UnknownDestroy {
                    handle: allocation.handle,
                });
            }
        }
    }

    /// Release the native resource and hand the block back to its heap.
    fn release(&self, allocation: &Allocation) {
        self.device.release_resource(allocation.resource, allocation.purpose);

        match self.find_heap(allocation.purpose, allocation.heap_id) {
            Some(heap) => {
                heap.forfeit_allocation_block(allocation.block);
                self.counters.forfeits.increment();
                self.events.push(AllocatorEvent::Forfeited {
                    allocation: *allocation,
                });
            }
            None => {
                self.counters.orphans.increment();
                ta_emit_ctx!(TA202, format!("{:?} in {}", allocation.handle, allocation.heap_id));
                self.events.push(AllocatorEvent::Orphaned {
                    allocation: *allocation,
                });
            }
        }

        self.used.sub(allocation.size);
    }

    fn note_heap_released(&self, heap: &TransientHeap) {
        self.counters.heaps_released.increment();
        self.events.push(AllocatorEvent::HeapReleased {
            heap_id: heap.id(),
            purpose: heap.purpose(),
        });
    }

    fn shutdown(&self) {
        let drained = self.cache.drain_all();

        for allocation in &drained.pending {
            self.release(allocation);
        }

        for leak in &drained.live {
            let context = format!(
                "{:?} {} bytes in {} created at frame {}",
                leak.allocation.handle,
                leak.allocation.size,
                leak.allocation.heap_id,
                leak.created_frame
            );
            match &leak.trace {
                Some(trace) => ta_emit_ctx!(TA301, format!("{}\n{}", context, trace)),
                None => ta_emit_ctx!(TA301, context),
            }
            self.release(&leak.allocation);
        }

        for purpose in [HeapPurpose::Buffers, HeapPurpose::Images] {
            let heaps = std::mem::take(&mut *self.heaps(purpose).write());
            for heap in heaps {
                self.note_heap_released(&heap);
            }
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::{DummyDevice, ImageFormat, ImageUsage};
    use crate::util::size::kb;

    fn setup(page_size: u64) -> (Arc<DummyDevice>, TransientAllocator) {
        let device = Arc::new(DummyDevice::new().with_buffer_alignment(256));
        let config = TransientConfig::minimal()
            .with_page_size(page_size)
            .with_pages_per_heap(1);
        let alloc = TransientAllocator::new(device.clone(), config);
        (device, alloc)
    }

    fn storage(alloc: &TransientAllocator, size: u64) -> Allocation {
        alloc
            .create_buffer(size, BufferUsage::STORAGE_BUFFER, MemoryUsage::GPU_ONLY)
            .unwrap()
    }

    fn run_frames(alloc: &TransientAllocator, frames: u32) {
        for _ in 0..frames {
            alloc.update();
        }
    }

    #[test]
    fn test_buffer_size_rounded_to_alignment() {
        let (_device, alloc) = setup(kb(64));
        let a = storage(&alloc, 100);
        assert_eq!(a.size(), 256);
        assert_eq!(a.purpose(), HeapPurpose::Buffers);
    }

    #[test]
    fn test_invalid_requests() {
        let (_device, alloc) = setup(kb(64));
        assert_eq!(
            alloc.create_buffer(0, BufferUsage::STORAGE_BUFFER, MemoryUsage::GPU_ONLY),
            Err(TransientAllocError::InvalidSize { size: 0 })
        );

        let both = MemoryUsage::UPLOAD | MemoryUsage::READBACK;
        assert_eq!(
            alloc.create_buffer(256, BufferUsage::STORAGE_BUFFER, both),
            Err(TransientAllocError::ConflictingMemoryUsage(both))
        );

        let spec = ImageSpec::new_2d(0, 16, ImageFormat::Rgba8Unorm, ImageUsage::SAMPLED);
        assert!(matches!(
            alloc.create_image(spec, MemoryUsage::GPU_ONLY),
            Err(TransientAllocError::InvalidSize { .. })
        ));
        assert_eq!(alloc.stats().heaps_created, 0);
    }

    #[test]
    fn test_orphaned_allocation_releases_resource() {
        let (device, alloc) = setup(kb(64));
        let a = storage(&alloc, 1024);

        let heap = alloc.detach_heap(a.heap_id()).unwrap();
        alloc.destroy_buffer(&a);
        run_frames(&alloc, 3);

        let stats = alloc.stats();
        assert_eq!(stats.orphans, 1);
        assert_eq!(stats.forfeits, 0);
        assert_eq!(device.resource_location(a.resource()), None);
        assert!(alloc
            .drain_events()
            .contains(&AllocatorEvent::Orphaned { allocation: a }));

        // The detached heap still owns its pages until dropped
        assert_eq!(heap.used_bytes(), 1024);
        drop(heap);
        assert_eq!(device.live_pages(), 0);
    }

    #[test]
    fn test_placement_failure_returns_block() {
        let (device, alloc) = setup(kb(64));
        device.set_fail_placement(true);

        let result = alloc.create_buffer(1024, BufferUsage::STORAGE_BUFFER, MemoryUsage::GPU_ONLY);
        assert!(matches!(result, Err(TransientAllocError::Backend(_))));

        let snapshots = alloc.heap_snapshots();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].used_bytes(), 0);
        assert_eq!(snapshots[0].pages[0].tail, 0);

        device.set_fail_placement(false);
        let a = storage(&alloc, 1024);
        assert_eq!(a.offset(), 0);
    }

    #[test]
    fn test_heap_creation_failure() {
        let device = Arc::new(DummyDevice::new().with_page_limit(0));
        let alloc = TransientAllocator::new(device.clone(), TransientConfig::minimal());

        let result = alloc.create_buffer(256, BufferUsage::STORAGE_BUFFER, MemoryUsage::GPU_ONLY);
        assert!(matches!(result, Err(TransientAllocError::Backend(_))));
        assert_eq!(alloc.stats().buffer_heaps, 0);
    }

    #[test]
    fn test_oversized_request_exhausts_without_new_heap() {
        let (_device, alloc) = setup(kb(4));
        let result = alloc.create_buffer(kb(8), BufferUsage::STORAGE_BUFFER, MemoryUsage::GPU_ONLY);
        assert_eq!(
            result,
            Err(TransientAllocError::ExhaustedCapacity {
                size: kb(8),
                purpose: HeapPurpose::Buffers
            })
        );
        let stats = alloc.stats();
        assert_eq!(stats.heaps_created, 0);
        assert_eq!(stats.exhaustion_failures, 1);
    }

    #[test]
    fn test_huge_request_rejected_before_rounding() {
        let (device, alloc) = setup(kb(64));
        let size = u64::MAX - 10;

        let result = alloc.create_buffer(size, BufferUsage::STORAGE_BUFFER, MemoryUsage::GPU_ONLY);
        assert_eq!(
            result,
            Err(TransientAllocError::ExhaustedCapacity {
                size,
                purpose: HeapPurpose::Buffers
            })
        );

        let stats = alloc.stats();
        assert_eq!(stats.heaps_created, 0);
        assert_eq!(stats.reserved_bytes, 0);
        assert_eq!(stats.cache_misses, 0);
        assert_eq!(stats.exhaustion_failures, 1);
        assert_eq!(device.live_pages(), 0);
    }

    #[test]
    fn test_image_larger_than_page_rejected_before_rounding() {
        let device = Arc::new(DummyDevice::new().with_image_alignment(1));
        let config = TransientConfig::minimal()
            .with_page_size(kb(4))
            .with_pages_per_heap(1);
        let alloc = TransientAllocator::new(device.clone(), config);

        // 64x64 RGBA8 packs to 16 KB
        let spec = ImageSpec::new_2d(64, 64, ImageFormat::Rgba8Unorm, ImageUsage::SAMPLED);
        assert_eq!(
            alloc.create_image(spec, MemoryUsage::GPU_ONLY),
            Err(TransientAllocError::ExhaustedCapacity {
                size: kb(16),
                purpose: HeapPurpose::Images
            })
        );
        assert_eq!(alloc.stats().heaps_created, 0);
        assert_eq!(device.live_pages(), 0);
    }

    #[test]
    fn test_eager_heaps_survive_trim() {
        let device = Arc::new(DummyDevice::new());
        let config = TransientConfig::minimal().with_eager_heaps(true);
        let alloc = TransientAllocator::new(device.clone(), config);

        let stats = alloc.stats();
        assert_eq!(stats.buffer_heaps, 1);
        assert_eq!(stats.image_heaps, 1);
        assert_eq!(alloc.trim_heaps(), 0);
    }

    #[test]
    fn test_update_counts_frames() {
        let (_device, alloc) = setup(kb(64));
        run_frames(&alloc, 5);
        assert_eq!(alloc.frame(), 5);
        assert_eq!(alloc.stats().frame, 5);
    }
}
