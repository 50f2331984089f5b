//! Request shapes and their hashes.
//!
//! Two create calls are interchangeable when their resource descriptions are
//! equal. The hash only picks candidates; the cache compares descriptions
//! before reusing anything.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::gpu::ResourceDesc;

/// Hash of a request shape.
///
/// Buffers hash their rounded size, usage and memory class; images hash every
/// extent, count, format and usage field plus the memory class.
pub fn request_hash(desc: &ResourceDesc) -> u64 {
    let mut hasher = DefaultHasher::new();
    desc.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::{BufferDesc, BufferUsage, ImageFormat, ImageSpec, ImageUsage, MemoryUsage};

    fn buffer(size: u64, usage: BufferUsage) -> ResourceDesc {
        ResourceDesc::Buffer(BufferDesc {
            size,
            usage,
            memory_usage: MemoryUsage::GPU_ONLY,
        })
    }

    #[test]
    fn test_hash_is_deterministic() {
        let a = buffer(1024, BufferUsage::VERTEX_BUFFER);
        assert_eq!(request_hash(&a), request_hash(&a.clone()));
    }

    #[test]
    fn test_hash_distinguishes_fields() {
        let base = request_hash(&buffer(1024, BufferUsage::VERTEX_BUFFER));
        assert_ne!(base, request_hash(&buffer(2048, BufferUsage::VERTEX_BUFFER)));
        assert_ne!(base, request_hash(&buffer(1024, BufferUsage::INDEX_BUFFER)));

        let spec = ImageSpec::new_2d(64, 64, ImageFormat::Rgba8Unorm, ImageUsage::SAMPLED);
        let image = |spec: ImageSpec| ResourceDesc::Image {
            spec,
            memory_usage: MemoryUsage::GPU_ONLY,
        };
        let image_hash = request_hash(&image(spec));
        assert_ne!(image_hash, request_hash(&image(spec.with_mips(2))));
        assert_ne!(image_hash, request_hash(&image(spec.with_layers(6))));
    }
}
