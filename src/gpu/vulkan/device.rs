//! Vulkan transient device implementation

use std::sync::Arc;

use ash::vk;
use ash::vk::Handle;

use super::super::traits::{
    BackendError, HeapPurpose, ImageFormat, ImageSpec, MemoryRequirements, PageHandle,
    ResourceDesc, ResourceHandle, TransientDevice,
};
use crate::util::size::align_up;

/// Buffer usages every buffer page must be able to host.
const PAGE_BUFFER_USAGE: vk::BufferUsageFlags = vk::BufferUsageFlags::from_raw(
    vk::BufferUsageFlags::VERTEX_BUFFER.as_raw()
        | vk::BufferUsageFlags::INDEX_BUFFER.as_raw()
        | vk::BufferUsageFlags::INDIRECT_BUFFER.as_raw()
        | vk::BufferUsageFlags::STORAGE_BUFFER.as_raw()
        | vk::BufferUsageFlags::UNIFORM_BUFFER.as_raw()
        | vk::BufferUsageFlags::STORAGE_TEXEL_BUFFER.as_raw()
        | vk::BufferUsageFlags::UNIFORM_TEXEL_BUFFER.as_raw()
        | vk::BufferUsageFlags::TRANSFER_SRC.as_raw()
        | vk::BufferUsageFlags::TRANSFER_DST.as_raw(),
);

/// Usages of the colour probe image that types image pages.
const PAGE_IMAGE_USAGE: vk::ImageUsageFlags = vk::ImageUsageFlags::from_raw(
    vk::ImageUsageFlags::TRANSFER_SRC.as_raw()
        | vk::ImageUsageFlags::TRANSFER_DST.as_raw()
        | vk::ImageUsageFlags::SAMPLED.as_raw()
        | vk::ImageUsageFlags::STORAGE.as_raw()
        | vk::ImageUsageFlags::COLOR_ATTACHMENT.as_raw(),
);

/// Fallback image alignment when the probe image cannot be created.
const FALLBACK_IMAGE_ALIGNMENT: u64 = 64 * 1024;

/// Vulkan-backed transient device.
///
/// Pages are `VkDeviceMemory` objects in a device-local memory type; resources
/// are `VkBuffer`/`VkImage` objects bound at an offset inside them.
pub struct VulkanTransientDevice {
    /// Vulkan device
    device: Arc<ash::Device>,
    /// Memory properties of the physical device
    memory_properties: vk::PhysicalDeviceMemoryProperties,
    /// Minimum offset alignment for placed buffers
    buffer_alignment: u64,
}

impl VulkanTransientDevice {
    /// Create a new Vulkan transient device.
    pub fn new(
        device: Arc<ash::Device>,
        physical_device: vk::PhysicalDevice,
        instance: &ash::Instance,
    ) -> Self {
        let memory_properties =
            unsafe { instance.get_physical_device_memory_properties(physical_device) };
        let limits = unsafe { instance.get_physical_device_properties(physical_device) }.limits;

        let buffer_alignment = limits
            .min_storage_buffer_offset_alignment
            .max(limits.min_uniform_buffer_offset_alignment)
            .max(limits.buffer_image_granularity)
            .max(256);

        Self {
            device,
            memory_properties,
            buffer_alignment,
        }
    }

    fn page_memory_requirements(
        &self,
        purpose: HeapPurpose,
    ) -> Result<vk::MemoryRequirements, BackendError> {
        match purpose {
            HeapPurpose::Buffers => {
                let info = vk::BufferCreateInfo::builder()
                    .size(self.buffer_alignment)
                    .usage(PAGE_BUFFER_USAGE)
                    .sharing_mode(vk::SharingMode::EXCLUSIVE);

                unsafe {
                    let probe = self
                        .device
                        .create_buffer(&info, None)
                        .map_err(|e| BackendError::Other(format!("probe buffer: {:?}", e)))?;
                    let req = self.device.get_buffer_memory_requirements(probe);
                    self.device.destroy_buffer(probe, None);
                    Ok(req)
                }
            }
            HeapPurpose::Images => {
                let info = image_create_info(1, 1, 1, 1, 1, vk::Format::R8G8B8A8_UNORM, PAGE_IMAGE_USAGE);

                unsafe {
                    let probe = self
                        .device
                        .create_image(&info, None)
                        .map_err(|e| BackendError::Other(format!("probe image: {:?}", e)))?;
                    let req = self.device.get_image_memory_requirements(probe);
                    self.device.destroy_image(probe, None);
                    Ok(req)
                }
            }
        }
    }

    /// Find a device-local memory type allowed by `type_filter`.
    fn find_memory_type(&self, type_filter: u32) -> Result<u32, BackendError> {
        let count = self.memory_properties.memory_type_count as usize;
        for (i, mem_type) in self.memory_properties.memory_types[..count].iter().enumerate() {
            let allowed = type_filter & (1 << i) != 0;
            if allowed
                && mem_type
                    .property_flags
                    .contains(vk::MemoryPropertyFlags::DEVICE_LOCAL)
            {
                return Ok(i as u32);
            }
        }

        Err(BackendError::NoCompatibleMemoryType)
    }
}

impl TransientDevice for VulkanTransientDevice {
    fn create_heap_page(&self, size: u64, purpose: HeapPurpose) -> Result<PageHandle, BackendError> {
        let requirements = self.page_memory_requirements(purpose)?;
        let memory_type_index = self.find_memory_type(requirements.memory_type_bits)?;

        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(align_up(size, requirements.alignment))
            .memory_type_index(memory_type_index);

        let memory = unsafe {
            self.device
                .allocate_memory(&alloc_info, None)
                .map_err(|_| BackendError::OutOfDeviceMemory)?
        };

        Ok(PageHandle(memory.as_raw()))
    }

    fn release_heap_page(&self, page: PageHandle, _purpose: HeapPurpose) {
        unsafe {
            self.device
                .free_memory(vk::DeviceMemory::from_raw(page.raw()), None);
        }
    }

    fn place_resource(
        &self,
        page: PageHandle,
        offset: u64,
        desc: &ResourceDesc,
    ) -> Result<ResourceHandle, BackendError> {
        let memory = vk::DeviceMemory::from_raw(page.raw());

        match desc {
            ResourceDesc::Buffer(buffer) => {
                let info = vk::BufferCreateInfo::builder()
                    .size(buffer.size)
                    .usage(vk::BufferUsageFlags::from_raw(buffer.usage.bits))
                    .sharing_mode(vk::SharingMode::EXCLUSIVE);

                unsafe {
                    let vk_buffer = self
                        .device
                        .create_buffer(&info, None)
                        .map_err(|e| BackendError::PlacementFailed(format!("{:?}", e)))?;

                    if let Err(e) = self.device.bind_buffer_memory(vk_buffer, memory, offset) {
                        self.device.destroy_buffer(vk_buffer, None);
                        return Err(BackendError::PlacementFailed(format!("{:?}", e)));
                    }

                    Ok(ResourceHandle(vk_buffer.as_raw()))
                }
            }
            ResourceDesc::Image { spec, .. } => {
                let info = spec_create_info(spec);

                unsafe {
                    let vk_image = self
                        .device
                        .create_image(&info, None)
                        .map_err(|e| BackendError::PlacementFailed(format!("{:?}", e)))?;

                    if let Err(e) = self.device.bind_image_memory(vk_image, memory, offset) {
                        self.device.destroy_image(vk_image, None);
                        return Err(BackendError::PlacementFailed(format!("{:?}", e)));
                    }

                    Ok(ResourceHandle(vk_image.as_raw()))
                }
            }
        }
    }

    fn release_resource(&self, resource: ResourceHandle, purpose: HeapPurpose) {
        unsafe {
            match purpose {
                HeapPurpose::Buffers => self
                    .device
                    .destroy_buffer(vk::Buffer::from_raw(resource.raw()), None),
                HeapPurpose::Images => self
                    .device
                    .destroy_image(vk::Image::from_raw(resource.raw()), None),
            }
        }
    }

    fn image_requirements(&self, spec: &ImageSpec) -> MemoryRequirements {
        let info = spec_create_info(spec);

        let probed = unsafe {
            self.device.create_image(&info, None).ok().map(|image| {
                let req = self.device.get_image_memory_requirements(image);
                self.device.destroy_image(image, None);
                req
            })
        };

        match probed {
            Some(req) => MemoryRequirements {
                size: align_up(req.size, req.alignment),
                alignment: req.alignment,
            },
            None => MemoryRequirements {
                size: align_up(spec.packed_size(), FALLBACK_IMAGE_ALIGNMENT),
                alignment: FALLBACK_IMAGE_ALIGNMENT,
            },
        }
    }

    fn buffer_placement_alignment(&self) -> u64 {
        self.buffer_alignment
    }
}

fn spec_create_info(spec: &ImageSpec) -> vk::ImageCreateInfo {
    image_create_info(
        spec.width,
        spec.height,
        spec.depth,
        spec.mip_count,
        spec.layer_count,
        vk_format(spec.format),
        vk::ImageUsageFlags::from_raw(spec.usage.bits),
    )
}

fn image_create_info(
    width: u32,
    height: u32,
    depth: u32,
    mips: u32,
    layers: u32,
    format: vk::Format,
    usage: vk::ImageUsageFlags,
) -> vk::ImageCreateInfo {
    let image_type = if depth > 1 {
        vk::ImageType::TYPE_3D
    } else {
        vk::ImageType::TYPE_2D
    };

    vk::ImageCreateInfo::builder()
        .image_type(image_type)
        .format(format)
        .extent(vk::Extent3D {
            width,
            height,
            depth,
        })
        .mip_levels(mips)
        .array_layers(layers)
        .samples(vk::SampleCountFlags::TYPE_1)
        .tiling(vk::ImageTiling::OPTIMAL)
        .usage(usage)
        .sharing_mode(vk::SharingMode::EXCLUSIVE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .build()
}

fn vk_format(format: ImageFormat) -> vk::Format {
    match format {
        ImageFormat::R8Unorm => vk::Format::R8_UNORM,
        ImageFormat::R32Float => vk::Format::R32_SFLOAT,
        ImageFormat::Rgba8Unorm => vk::Format::R8G8B8A8_UNORM,
        ImageFormat::Rgba8Srgb => vk::Format::R8G8B8A8_SRGB,
        ImageFormat::Bgra8Unorm => vk::Format::B8G8R8A8_UNORM,
        ImageFormat::Rgba16Float => vk::Format::R16G16B16A16_SFLOAT,
        ImageFormat::Rgba32Float => vk::Format::R32G32B32A32_SFLOAT,
        ImageFormat::D32Float => vk::Format::D32_SFLOAT,
        ImageFormat::D24UnormS8Uint => vk::Format::D24_UNORM_S8_UINT,
        ImageFormat::Bc1Unorm => vk::Format::BC1_RGBA_UNORM_BLOCK,
        ImageFormat::Bc7Unorm => vk::Format::BC7_UNORM_BLOCK,
    }
}
