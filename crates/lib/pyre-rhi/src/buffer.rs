use ash::vk;

use super::allocator::{self, Allocation, AllocationCreateDesc, Allocator, MemoryLocation};
use super::{Device, RhiError};

#[derive(Debug)]
pub struct Buffer {
    pub raw: vk::Buffer,
    pub desc: BufferDesc,
    pub allocation: Allocation,
}

impl Buffer {
    pub fn device_address(&self, device: &Device) -> vk::DeviceAddress {
        unsafe {
            device.raw.get_buffer_device_address(
                &vk::BufferDeviceAddressInfo::builder().buffer(self.raw).build(),
            )
        }
    }
}

/// A buffer's full identity for the transient allocator's descriptor-keyed
/// pool lookups: same fields determine whether two transient buffers can
/// alias the same memory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BufferDesc {
    pub size: usize,
    pub alignment: Option<usize>,
    pub usage: vk::BufferUsageFlags,
    pub memory_location: MemoryLocation,
}

impl BufferDesc {
    pub fn new_gpu_only(size: usize, usage: vk::BufferUsageFlags) -> Self {
        BufferDesc { size, usage, memory_location: MemoryLocation::GpuOnly, alignment: None }
    }

    pub fn new_gpu_to_cpu(size: usize, usage: vk::BufferUsageFlags) -> Self {
        BufferDesc { size, usage, memory_location: MemoryLocation::GpuToCpu, alignment: None }
    }

    pub fn new_cpu_to_gpu(size: usize, usage: vk::BufferUsageFlags) -> Self {
        BufferDesc { size, usage, memory_location: MemoryLocation::CpuToGpu, alignment: None }
    }

    pub fn alignment(mut self, alignment: usize) -> Self {
        self.alignment = Some(alignment);
        self
    }

    pub fn usage_flags(mut self, usage: vk::BufferUsageFlags) -> Self {
        self.usage = usage;
        self
    }
}

impl Device {
    pub fn create_buffer(&self, desc: BufferDesc, name: &str) -> Result<Buffer, RhiError> {
        Self::create_buffer_internal(&self.raw, &mut self.global_allocator.lock(), desc, name)
    }

    pub fn destroy_buffer(&self, buffer: Buffer) {
        unsafe { self.raw.destroy_buffer(buffer.raw, None) };
        self.global_allocator
            .lock()
            .free(buffer.allocation)
            .expect("failed to free buffer memory");
    }

    pub(crate) fn create_buffer_internal(
        device: &ash::Device,
        allocator: &mut Allocator,
        desc: BufferDesc,
        name: &str,
    ) -> Result<Buffer, RhiError> {
        let create_info = vk::BufferCreateInfo {
            size: desc.size as u64,
            usage: desc.usage,
            sharing_mode: vk::SharingMode::EXCLUSIVE,
            ..Default::default()
        };

        let buffer = unsafe { device.create_buffer(&create_info, None)? };
        let mut requirements = unsafe { device.get_buffer_memory_requirements(buffer) };

        if let Some(alignment) = desc.alignment {
            requirements.alignment = requirements.alignment.max(alignment as u64);
        }

        let allocation = allocator
            .allocate(&AllocationCreateDesc {
                name,
                requirements,
                location: allocator::to_inner_memory_location(&desc.memory_location),
                linear: true,
            })
            .map_err(|error| RhiError::AllocationFailure { name: name.to_owned(), error })?;

        unsafe { device.bind_buffer_memory(buffer, allocation.memory(), allocation.offset())? };

        Ok(Buffer { raw: buffer, desc, allocation })
    }

    /// Returns the memory requirements a buffer of this description would
    /// have, without creating or binding it. Used by the transient
    /// allocator's pool-sizing pass to learn `memory_type_bits` before it has
    /// decided which pool a resource belongs to.
    pub fn buffer_memory_requirements(&self, desc: &BufferDesc) -> Result<vk::MemoryRequirements, RhiError> {
        let create_info = vk::BufferCreateInfo {
            size: desc.size as u64,
            usage: desc.usage,
            sharing_mode: vk::SharingMode::EXCLUSIVE,
            ..Default::default()
        };
        let buffer = unsafe { self.raw.create_buffer(&create_info, None)? };
        let requirements = unsafe { self.raw.get_buffer_memory_requirements(buffer) };
        unsafe { self.raw.destroy_buffer(buffer, None) };
        Ok(requirements)
    }

    /// Creates a buffer and binds it against an offset inside an
    /// already-allocated pool, rather than allocating dedicated memory for
    /// it. This is how the transient allocator's aliased mode gives two
    /// non-overlapping-lifetime buffers the same backing `vk::DeviceMemory`.
    pub fn create_aliased_buffer(
        &self,
        desc: BufferDesc,
        pool_memory: vk::DeviceMemory,
        pool_offset: u64,
    ) -> Result<vk::Buffer, RhiError> {
        let create_info = vk::BufferCreateInfo {
            size: desc.size as u64,
            usage: desc.usage,
            sharing_mode: vk::SharingMode::EXCLUSIVE,
            ..Default::default()
        };
        let buffer = unsafe { self.raw.create_buffer(&create_info, None)? };
        unsafe { self.raw.bind_buffer_memory(buffer, pool_memory, pool_offset)? };
        Ok(buffer)
    }
}
