//! Backend device interface for transient placement.
//!
//! The allocator never talks to a graphics API directly; it asks a
//! [`TransientDevice`] to create pages and place resources inside them.
//!
//! ## Backends
//! - `dummy`: host-only bookkeeping device, always available (tests, tools)
//! - `vulkan`: via the `ash` crate (enable `gpu-vulkan` feature)

// Always present for API stability: traits define the interface
pub mod traits;
pub use traits::{
    BackendError, BufferDesc, BufferUsage, HeapPurpose, ImageFormat, ImageSpec, ImageUsage,
    MemoryRequirements, MemoryUsage, PageHandle, ResourceDesc, ResourceHandle, TransientDevice,
};

// Dummy device for testing (always available)
pub mod dummy;
pub use dummy::{DummyDevice, DummyDeviceStats};

// Backend implementations are conditionally compiled
#[cfg(feature = "gpu-vulkan")]
pub mod vulkan;
