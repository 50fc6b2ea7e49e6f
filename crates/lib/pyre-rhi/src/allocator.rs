use gpu_allocator::vulkan::{
    Allocation as VulkanAllocation, AllocationCreateDesc as VulkanAllocationCreateDesc,
    Allocator as VulkanAllocator, AllocatorCreateDesc as VulkanAllocatorCreateDesc,
};
use gpu_allocator::MemoryLocation as VulkanMemoryLocation;

pub type Allocator = VulkanAllocator;
pub type AllocatorCreateDesc = VulkanAllocatorCreateDesc;
pub type Allocation = VulkanAllocation;
pub type AllocationCreateDesc<'a> = VulkanAllocationCreateDesc<'a>;

/// Same as `gpu_allocator::MemoryLocation`, but `Hash` so it can sit inside
/// the descriptors the transient allocator uses as pool keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MemoryLocation {
    Unknown,
    GpuOnly,
    CpuToGpu,
    GpuToCpu,
}

pub fn to_inner_memory_location(loc: &MemoryLocation) -> VulkanMemoryLocation {
    match loc {
        MemoryLocation::Unknown => VulkanMemoryLocation::Unknown,
        MemoryLocation::GpuOnly => VulkanMemoryLocation::GpuOnly,
        MemoryLocation::CpuToGpu => VulkanMemoryLocation::CpuToGpu,
        MemoryLocation::GpuToCpu => VulkanMemoryLocation::GpuToCpu,
    }
}
