//! Errors surfaced by the transient allocator.

use std::fmt;

use crate::gpu::{BackendError, HeapPurpose, MemoryUsage};

/// Errors from create calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransientAllocError {
    /// Zero-sized buffer or image with a zero extent, mip count or layer count.
    InvalidSize { size: u64 },
    /// Upload and readback residency requested together.
    ConflictingMemoryUsage(MemoryUsage),
    /// No heap could hold the request, including a freshly created one.
    ExhaustedCapacity { size: u64, purpose: HeapPurpose },
    /// The backend failed to create a page or place a resource.
    Backend(BackendError),
}

impl fmt::Display for TransientAllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransientAllocError::InvalidSize { size } => {
                write!(f, "invalid transient allocation size: {} bytes", size)
            }
            TransientAllocError::ConflictingMemoryUsage(usage) => {
                write!(f, "memory usage {:#x} combines upload and readback", usage.bits)
            }
            TransientAllocError::ExhaustedCapacity { size, purpose } => {
                write!(f, "no {} heap can hold {} bytes", purpose, size)
            }
            TransientAllocError::Backend(err) => write!(f, "backend error: {}", err),
        }
    }
}

impl std::error::Error for TransientAllocError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransientAllocError::Backend(err) => Some(err),
            _ => None,
        }
    }
}

impl From<BackendError> for TransientAllocError {
    fn from(err: BackendError) -> Self {
        TransientAllocError::Backend(err)
    }
}
