use pyre_rhi::{BufferDesc as RhiBufferDesc, ImageDesc as RhiImageDesc};

use crate::handle::Handle;

/// Bitmask of devices a resource is visible on. Bit *i* set means the
/// resource participates when [`crate::graph::RenderGraph::execute_on_all_gpus`]
/// reaches device *i*; a resource outside a device's mask is skipped on it
/// rather than erroring.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct GpuMask(pub u32);

impl GpuMask {
    pub const ALL: GpuMask = GpuMask(u32::MAX);

    pub fn single(gpu_index: u32) -> Self {
        GpuMask(1 << gpu_index)
    }

    pub fn contains(&self, gpu_index: u32) -> bool {
        self.0 & (1 << gpu_index) != 0
    }
}

/// The span of batches and queues a resource is touched across.
/// `MAX`/`0` sentinels mean "never touched" — [`Self::is_used`] is the
/// predicate that "unused resources get no memory" hinges on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LifetimeWindow {
    pub first_use_batch: u32,
    pub last_use_batch: u32,
    pub first_queue: u32,
    pub last_queue: u32,
}

impl Default for LifetimeWindow {
    fn default() -> Self {
        Self { first_use_batch: u32::MAX, last_use_batch: 0, first_queue: 0, last_queue: 0 }
    }
}

impl LifetimeWindow {
    pub fn is_used(&self) -> bool {
        self.first_use_batch <= self.last_use_batch
    }

    pub fn touch(&mut self, batch: u32, queue: u32) {
        if batch < self.first_use_batch {
            self.first_use_batch = batch;
            self.first_queue = queue;
        }
        if !self.is_used() || batch >= self.last_use_batch {
            self.last_use_batch = batch;
            self.last_queue = queue;
        }
    }

    /// Two windows may share memory iff they never overlap in batch index.
    pub fn disjoint_from(&self, other: &LifetimeWindow) -> bool {
        self.last_use_batch < other.first_use_batch || other.last_use_batch < self.first_use_batch
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ImageLayout {
    Undefined,
    ColorAttachmentOptimal,
    DepthStencilAttachmentOptimal,
    DepthStencilReadOnlyOptimal,
    ShaderReadOnlyOptimal,
    TransferSrcOptimal,
    TransferDstOptimal,
    General,
    PresentSrc,
}

pub struct BufferResource {
    pub desc: RhiBufferDesc,
    pub transient: bool,
    pub name: String,
    pub gpu_mask: GpuMask,
    pub generation: u8,
    pub lifetime: LifetimeWindow,
    /// Bound by the host at `use_persistent_buffer` time, or by the
    /// Transient Allocator during `compile()`. `None` until then.
    pub device_handle: Option<ash::vk::Buffer>,
}

pub struct ImageResource {
    pub desc: RhiImageDesc,
    pub transient: bool,
    pub name: String,
    pub gpu_mask: GpuMask,
    pub generation: u8,
    pub lifetime: LifetimeWindow,
    pub current_layout: ImageLayout,
    pub device_handle: Option<ash::vk::Image>,
}

/// Acceleration structures carry only a handle and a GPU affinity — no
/// lifetime-window tracking or memory aliasing applies to them, so the
/// record stays minimal pending a future expansion of the Transient
/// Allocator to cover BLAS/TLAS scratch memory.
pub struct AccelerationStructureResource {
    pub name: String,
    pub gpu_mask: GpuMask,
    pub generation: u8,
    pub device_handle: Option<ash::vk::AccelerationStructureKHR>,
}

/// A sub-range into a resource, handed to a task instead of the bare handle.
/// Views are ephemeral — never registered, only passed into tasks — so this
/// carries the handle by value rather than by index into any further table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResourceView {
    Buffer { handle: Handle, offset: u64, size: u64 },
    Image { handle: Handle, base_mip: u32, mip_count: u32, base_layer: u32, layer_count: u32 },
    AccelerationStructure { handle: Handle },
}

impl ResourceView {
    pub fn whole_buffer(handle: Handle, size: u64) -> Self {
        ResourceView::Buffer { handle, offset: 0, size }
    }

    pub fn whole_image(handle: Handle, mip_levels: u32, array_layers: u32) -> Self {
        ResourceView::Image { handle, base_mip: 0, mip_count: mip_levels, base_layer: 0, layer_count: array_layers }
    }

    pub fn handle(&self) -> Handle {
        match self {
            ResourceView::Buffer { handle, .. }
            | ResourceView::Image { handle, .. }
            | ResourceView::AccelerationStructure { handle } => *handle,
        }
    }
}
