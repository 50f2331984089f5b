//! # transalloc
//!
//! Transient GPU memory sub-allocation for render graphs.
//!
//! ## Features
//!
//! - Large device pages carved into buffers and images (first-fit, split, coalesce)
//! - Identical requests share one placement while it is live
//! - Frame-delayed destruction: memory is reused only after the GPU is done with it
//! - Heaps grow on demand and can be trimmed when empty
//! - Coded diagnostics, a lock-free event log and optional Tracy integration
//! - Backend-agnostic via [`TransientDevice`]; Vulkan backend behind `gpu-vulkan`
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use transalloc::{
//!     DummyDevice, ImageFormat, ImageSpec, ImageUsage, MemoryUsage, TransientAllocator,
//!     TransientConfig,
//! };
//!
//! let alloc = TransientAllocator::new(Arc::new(DummyDevice::new()), TransientConfig::minimal());
//!
//! // Render loop
//! let spec = ImageSpec::new_2d(64, 64, ImageFormat::Rgba16Float, ImageUsage::COLOR_ATTACHMENT);
//! let target = alloc.create_image(spec, MemoryUsage::GPU_ONLY).unwrap();
//! // ... record passes that use target.resource() ...
//! alloc.destroy_image(&target);
//! alloc.update();
//! ```

pub mod api;
pub mod diagnostics;
pub mod gpu;

mod allocators;
mod sync;
mod util;

#[cfg(feature = "debug")]
mod debug;

// Re-export public API at crate root for convenience
pub use api::alloc::TransientAllocator;
pub use api::allocation::Allocation;
pub use api::config::TransientConfig;
pub use api::error::TransientAllocError;
pub use api::stats::{HeapSnapshot, PageSnapshot, TransientStats};

pub use allocators::cache::CacheError;
pub use allocators::handles::AllocationHandle;
pub use allocators::heap::HeapId;
pub use allocators::page::AllocationBlock;

// Backend interface
pub use gpu::{
    BackendError, BufferDesc, BufferUsage, DummyDevice, DummyDeviceStats, HeapPurpose,
    ImageFormat, ImageSpec, ImageUsage, MemoryRequirements, MemoryUsage, PageHandle,
    ResourceDesc, ResourceHandle, TransientDevice,
};

// Diagnostics
pub use diagnostics::{AllocatorEvent, Diagnostic, DiagnosticKind};
pub use diagnostics::{set_strict_mode, StrictMode, StrictModeGuard};
pub use diagnostics::{TA001, TA002, TA003, TA004, TA101, TA102, TA201, TA202, TA301, TA901};

/// Size helpers for configuring page sizes.
pub use util::size::{align_up, format_bytes, gb, kb, mb};
