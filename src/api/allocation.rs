//! Allocations handed out to callers.

use crate::allocators::handles::AllocationHandle;
use crate::allocators::heap::HeapId;
use crate::allocators::page::AllocationBlock;
use crate::gpu::{HeapPurpose, ResourceHandle};

/// A placed transient buffer or image.
///
/// Cheap to copy. Identical requests made while an allocation is live return
/// the same value, so several callers may hold copies of one allocation; the
/// backing memory is reclaimed only after a destroy and the frame delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Allocation {
    pub(crate) handle: AllocationHandle,
    pub(crate) resource: ResourceHandle,
    pub(crate) heap_id: HeapId,
    pub(crate) block: AllocationBlock,
    pub(crate) request_hash: u64,
    pub(crate) size: u64,
    pub(crate) purpose: HeapPurpose,
}

impl Allocation {
    /// Cache handle identifying this allocation.
    pub fn handle(&self) -> AllocationHandle {
        self.handle
    }

    /// Native buffer or image placed in device memory.
    pub fn resource(&self) -> ResourceHandle {
        self.resource
    }

    /// Heap that owns the backing block.
    pub fn heap_id(&self) -> HeapId {
        self.heap_id
    }

    /// Byte range inside the heap.
    pub fn block(&self) -> AllocationBlock {
        self.block
    }

    /// Byte offset inside the owning page.
    pub fn offset(&self) -> u64 {
        self.block.offset
    }

    /// Hash of the request shape that produced this allocation.
    pub fn request_hash(&self) -> u64 {
        self.request_hash
    }

    /// Size of the backing block in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn purpose(&self) -> HeapPurpose {
        self.purpose
    }
}

/// A block placed and bound, not yet registered with the cache.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Placement {
    pub resource: ResourceHandle,
    pub heap_id: HeapId,
    pub block: AllocationBlock,
    pub purpose: HeapPurpose,
}

impl Placement {
    pub fn into_allocation(self, handle: AllocationHandle, request_hash: u64) -> Allocation {
        Allocation {
            handle,
            resource: self.resource,
            heap_id: self.heap_id,
            block: self.block,
            request_hash,
            size: self.block.size,
            purpose: self.purpose,
        }
    }
}
