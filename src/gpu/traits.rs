//! Device traits and resource description types.
//!
//! This module defines the backend interface WITHOUT pulling in any
//! backend-specific dependencies, so the allocator core depends on
//! traits, not implementations.

use std::fmt;

/// Opaque handle to one native memory page (a `VkDeviceMemory`, an `ID3D12Heap`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageHandle(pub u64);

/// Opaque handle to a resource placed inside a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceHandle(pub u64);

impl PageHandle {
    /// Get the raw backend value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl ResourceHandle {
    /// Get the raw backend value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Which resource shape a heap serves.
///
/// Buffers and images need different native memory-type flags, so a heap
/// is dedicated to exactly one of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeapPurpose {
    /// Linear buffers.
    Buffers,
    /// Opaque (tiled) images.
    Images,
}

impl HeapPurpose {
    /// Lowercase name used in diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            HeapPurpose::Buffers => "buffer",
            HeapPurpose::Images => "image",
        }
    }
}

impl fmt::Display for HeapPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors reported by a backend device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The device could not provide memory for a new page.
    OutOfDeviceMemory,
    /// No memory type supports the requested purpose.
    NoCompatibleMemoryType,
    /// Creating or binding a placed resource failed.
    PlacementFailed(String),
    /// Backend-specific error (opaque)
    Other(String),
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::OutOfDeviceMemory => write!(f, "device out of memory"),
            BackendError::NoCompatibleMemoryType => write!(f, "no compatible memory type"),
            BackendError::PlacementFailed(msg) => write!(f, "resource placement failed: {}", msg),
            BackendError::Other(msg) => write!(f, "backend error: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}

/// Buffer usage flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BufferUsage {
    pub bits: u32,
}

impl BufferUsage {
    pub const TRANSFER_SRC: Self = Self { bits: 0x0001 };
    pub const TRANSFER_DST: Self = Self { bits: 0x0002 };
    pub const UNIFORM_TEXEL_BUFFER: Self = Self { bits: 0x0004 };
    pub const STORAGE_TEXEL_BUFFER: Self = Self { bits: 0x0008 };
    pub const UNIFORM_BUFFER: Self = Self { bits: 0x0010 };
    pub const STORAGE_BUFFER: Self = Self { bits: 0x0020 };
    pub const INDEX_BUFFER: Self = Self { bits: 0x0040 };
    pub const VERTEX_BUFFER: Self = Self { bits: 0x0080 };
    pub const INDIRECT_BUFFER: Self = Self { bits: 0x0100 };

    /// No usage.
    pub const fn empty() -> Self {
        Self { bits: 0 }
    }

    /// Check whether every flag in `other` is set.
    pub const fn contains(&self, other: Self) -> bool {
        self.bits & other.bits == other.bits
    }
}

impl std::ops::BitOr for BufferUsage {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self { bits: self.bits | rhs.bits }
    }
}

/// Memory residency class of a request.
///
/// `UPLOAD` (CPU writes, GPU reads) and `READBACK` (GPU writes, CPU reads)
/// select different host-visible heaps and cannot be combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MemoryUsage {
    pub bits: u32,
}

impl MemoryUsage {
    /// GPU-only access, fastest for shaders
    pub const GPU_ONLY: Self = Self { bits: 0x0 };
    /// CPU can map and write, GPU reads
    pub const UPLOAD: Self = Self { bits: 0x1 };
    /// GPU writes, CPU maps and reads
    pub const READBACK: Self = Self { bits: 0x2 };
    /// Request dedicated memory residency where the backend distinguishes it
    pub const DEDICATED: Self = Self { bits: 0x4 };

    /// Check whether every flag in `other` is set.
    pub const fn contains(&self, other: Self) -> bool {
        self.bits & other.bits == other.bits
    }

    /// True when mutually exclusive residency flags are combined.
    pub const fn is_conflicting(&self) -> bool {
        self.contains(Self::UPLOAD) && self.contains(Self::READBACK)
    }

    /// True when the CPU may map the memory.
    pub const fn is_host_visible(&self) -> bool {
        self.bits & (Self::UPLOAD.bits | Self::READBACK.bits) != 0
    }
}

impl std::ops::BitOr for MemoryUsage {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self { bits: self.bits | rhs.bits }
    }
}

/// Image usage flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ImageUsage {
    pub bits: u32,
}

impl ImageUsage {
    pub const TRANSFER_SRC: Self = Self { bits: 0x01 };
    pub const TRANSFER_DST: Self = Self { bits: 0x02 };
    pub const SAMPLED: Self = Self { bits: 0x04 };
    pub const STORAGE: Self = Self { bits: 0x08 };
    pub const COLOR_ATTACHMENT: Self = Self { bits: 0x10 };
    pub const DEPTH_STENCIL_ATTACHMENT: Self = Self { bits: 0x20 };

    /// Check whether every flag in `other` is set.
    pub const fn contains(&self, other: Self) -> bool {
        self.bits & other.bits == other.bits
    }
}

impl std::ops::BitOr for ImageUsage {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self { bits: self.bits | rhs.bits }
    }
}

/// Texel formats the transient system can place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    R8Unorm,
    R32Float,
    Rgba8Unorm,
    Rgba8Srgb,
    Bgra8Unorm,
    Rgba16Float,
    Rgba32Float,
    D32Float,
    D24UnormS8Uint,
    Bc1Unorm,
    Bc7Unorm,
}

impl ImageFormat {
    /// Bytes per texel block.
    pub const fn block_bytes(&self) -> u64 {
        match self {
            ImageFormat::R8Unorm => 1,
            ImageFormat::R32Float
            | ImageFormat::Rgba8Unorm
            | ImageFormat::Rgba8Srgb
            | ImageFormat::Bgra8Unorm
            | ImageFormat::D32Float
            | ImageFormat::D24UnormS8Uint => 4,
            ImageFormat::Rgba16Float | ImageFormat::Bc1Unorm => 8,
            ImageFormat::Rgba32Float | ImageFormat::Bc7Unorm => 16,
        }
    }

    /// Texel block edge length (4 for block-compressed formats).
    pub const fn block_extent(&self) -> u32 {
        match self {
            ImageFormat::Bc1Unorm | ImageFormat::Bc7Unorm => 4,
            _ => 1,
        }
    }

    /// Depth or depth-stencil format.
    pub const fn is_depth(&self) -> bool {
        matches!(self, ImageFormat::D32Float | ImageFormat::D24UnormS8Uint)
    }
}

/// Description of a transient image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageSpec {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub mip_count: u32,
    pub layer_count: u32,
    pub format: ImageFormat,
    pub usage: ImageUsage,
}

impl ImageSpec {
    /// Single-mip, single-layer 2D image.
    pub fn new_2d(width: u32, height: u32, format: ImageFormat, usage: ImageUsage) -> Self {
        Self {
            width,
            height,
            depth: 1,
            mip_count: 1,
            layer_count: 1,
            format,
            usage,
        }
    }

    /// Builder pattern: set mip count.
    pub fn with_mips(mut self, mip_count: u32) -> Self {
        self.mip_count = mip_count;
        self
    }

    /// Builder pattern: set array layer count.
    pub fn with_layers(mut self, layer_count: u32) -> Self {
        self.layer_count = layer_count;
        self
    }

    /// Builder pattern: set depth (3D images).
    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = depth;
        self
    }

    /// True when every extent and count is non-zero.
    pub fn is_valid(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.depth > 0
            && self.mip_count > 0
            && self.layer_count > 0
    }

    /// Tightly packed byte size of the full mip chain, ignoring tiling.
    pub fn packed_size(&self) -> u64 {
        let block = self.format.block_extent().max(1);
        let mut total = 0u64;
        for mip in 0..self.mip_count {
            let w = (self.width >> mip).max(1);
            let h = (self.height >> mip).max(1);
            let d = (self.depth >> mip).max(1);
            let blocks_x = ((w + block - 1) / block) as u64;
            let blocks_y = ((h + block - 1) / block) as u64;
            total += blocks_x * blocks_y * d as u64 * self.format.block_bytes();
        }
        total * self.layer_count as u64
    }
}

/// Native description of a buffer to place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferDesc {
    /// Size in bytes (already rounded to placement alignment)
    pub size: u64,
    pub usage: BufferUsage,
    pub memory_usage: MemoryUsage,
}

/// Resource to be placed at an offset inside a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceDesc {
    Buffer(BufferDesc),
    Image {
        spec: ImageSpec,
        memory_usage: MemoryUsage,
    },
}

impl ResourceDesc {
    /// The heap purpose this resource belongs in.
    pub fn purpose(&self) -> HeapPurpose {
        match self {
            ResourceDesc::Buffer(_) => HeapPurpose::Buffers,
            ResourceDesc::Image { .. } => HeapPurpose::Images,
        }
    }
}

/// Size and alignment a backend requires for a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRequirements {
    pub size: u64,
    pub alignment: u64,
}

/// Backend device operations consumed by the transient allocator.
///
/// This trait is object-safe for use with `Arc<dyn TransientDevice>`.
/// Implementations must be callable from several threads at once.
pub trait TransientDevice: Send + Sync {
    /// Allocate one fixed-size page of device memory typed for `purpose`.
    fn create_heap_page(&self, size: u64, purpose: HeapPurpose) -> Result<PageHandle, BackendError>;

    /// Release a page created by `create_heap_page`.
    fn release_heap_page(&self, page: PageHandle, purpose: HeapPurpose);

    /// Create a resource aliased at `offset` inside `page`.
    ///
    /// Must not copy or clear memory.
    fn place_resource(
        &self,
        page: PageHandle,
        offset: u64,
        desc: &ResourceDesc,
    ) -> Result<ResourceHandle, BackendError>;

    /// Destroy a placed resource. The page memory stays reserved.
    fn release_resource(&self, resource: ResourceHandle, purpose: HeapPurpose);

    /// Size and alignment of an image with the given description.
    ///
    /// Tiling rules are backend-specific, so the allocator never computes this itself.
    fn image_requirements(&self, spec: &ImageSpec) -> MemoryRequirements;

    /// Minimum placement alignment for buffers (a fixed platform constant).
    fn buffer_placement_alignment(&self) -> u64;

    /// Alignment every page offset is rounded to for `purpose`.
    fn page_alignment(&self, purpose: HeapPurpose) -> u64 {
        match purpose {
            HeapPurpose::Buffers => self.buffer_placement_alignment(),
            HeapPurpose::Images => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_usage_conflicts() {
        assert!(!MemoryUsage::GPU_ONLY.is_conflicting());
        assert!(!MemoryUsage::UPLOAD.is_conflicting());
        assert!(!(MemoryUsage::UPLOAD | MemoryUsage::DEDICATED).is_conflicting());
        assert!((MemoryUsage::UPLOAD | MemoryUsage::READBACK).is_conflicting());
        assert!(MemoryUsage::READBACK.is_host_visible());
        assert!(!MemoryUsage::GPU_ONLY.is_host_visible());
    }

    #[test]
    fn test_usage_flags_combine() {
        let usage = BufferUsage::STORAGE_BUFFER | BufferUsage::TRANSFER_DST;
        assert!(usage.contains(BufferUsage::STORAGE_BUFFER));
        assert!(!usage.contains(BufferUsage::VERTEX_BUFFER));
        assert!(BufferUsage::empty().contains(BufferUsage::empty()));
    }

    #[test]
    fn test_image_packed_size() {
        let spec = ImageSpec::new_2d(1920, 1080, ImageFormat::Rgba8Unorm, ImageUsage::COLOR_ATTACHMENT);
        assert_eq!(spec.packed_size(), 1920 * 1080 * 4);

        let mipped = ImageSpec::new_2d(4, 4, ImageFormat::R8Unorm, ImageUsage::SAMPLED).with_mips(3);
        assert_eq!(mipped.packed_size(), 16 + 4 + 1);

        let bc = ImageSpec::new_2d(6, 6, ImageFormat::Bc7Unorm, ImageUsage::SAMPLED);
        assert_eq!(bc.packed_size(), 4 * 16);
    }

    #[test]
    fn test_image_spec_validity() {
        let spec = ImageSpec::new_2d(0, 16, ImageFormat::D32Float, ImageUsage::DEPTH_STENCIL_ATTACHMENT);
        assert!(!spec.is_valid());
        assert!(spec.format.is_depth());
        assert!(ImageSpec::new_2d(1, 1, ImageFormat::R8Unorm, ImageUsage::SAMPLED).is_valid());
    }
}
