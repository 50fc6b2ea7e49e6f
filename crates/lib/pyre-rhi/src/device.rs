use ash::vk;
use parking_lot::Mutex;

use super::allocator::{Allocator, AllocatorCreateDesc};
use super::RhiError;

/// Identifies one of the queue families a `Device` exposes. Host code (not
/// this crate) resolves these against `vk::PhysicalDeviceQueueFamilyProperties`
/// during instance/physical-device setup, which is out of scope here.
#[derive(Copy, Clone)]
pub struct QueueFamily {
    pub index: u32,
    pub properties: vk::QueueFamilyProperties,
}

pub struct Queue {
    pub raw: vk::Queue,
    pub family: QueueFamily,
}

/// The device/memory/command surface the render graph core is recorded
/// against. Deliberately thin: no instance, physical-device selection,
/// surface, or swapchain live here — those are host concerns per the
/// render graph's scope (see `SPEC_FULL.md`'s Non-goals).
pub struct Device {
    pub raw: ash::Device,
    pub global_allocator: Mutex<Allocator>,
    pub global_queue: Queue,
    setup_cb: Mutex<super::CommandBuffer>,
}

impl Device {
    /// Wraps an already-created logical device and its primary queue. `host`
    /// has performed instance creation, physical device selection, and
    /// queue-family resolution before calling this.
    pub fn new(
        raw: ash::Device,
        physical_device_memory_properties: vk::PhysicalDeviceMemoryProperties,
        instance: ash::Instance,
        physical_device: vk::PhysicalDevice,
        global_queue: Queue,
    ) -> Result<Self, RhiError> {
        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance,
            device: raw.clone(),
            physical_device,
            debug_settings: Default::default(),
            buffer_device_address: true,
        })
        .map_err(|error| RhiError::AllocationFailure { name: "allocator".into(), error })?;

        let _ = physical_device_memory_properties;

        let setup_cb = super::CommandBuffer::new(&raw, global_queue.family.index);

        Ok(Self { raw, global_allocator: Mutex::new(allocator), global_queue, setup_cb: Mutex::new(setup_cb) })
    }

    pub fn wait_idle(&self) {
        unsafe { self.raw.device_wait_idle().expect("device_wait_idle failed") };
    }

    /// Allocates one raw block of device memory sized and typed for a whole
    /// transient-allocator memory pool, rather than for a single resource.
    /// The render graph's transient allocator binds many aliased
    /// buffers/images against sub-offsets of the returned allocation.
    pub fn allocate_pool(&self, requirements: vk::MemoryRequirements, name: &str) -> Result<super::Allocation, RhiError> {
        self.global_allocator
            .lock()
            .allocate(&super::AllocationCreateDesc {
                name,
                requirements,
                location: super::allocator::to_inner_memory_location(&super::MemoryLocation::GpuOnly),
                linear: true,
            })
            .map_err(|error| RhiError::AllocationFailure { name: name.to_owned(), error })
    }

    pub fn free_pool(&self, allocation: super::Allocation) {
        self.global_allocator.lock().free(allocation).expect("failed to free pool memory");
    }

    /// Runs `callback` on a dedicated one-shot command buffer and blocks
    /// until the device has executed it. Used by the transient allocator for
    /// pool-clearing transitions that don't belong to any recorded batch.
    pub fn with_setup_commands(&self, callback: impl FnOnce(vk::CommandBuffer)) -> Result<(), RhiError> {
        let setup_cb = self.setup_cb.lock();

        unsafe {
            self.raw.wait_for_fences(&[setup_cb.submit_done_fence], true, u64::MAX)?;
            self.raw.reset_fences(&[setup_cb.submit_done_fence])?;

            self.raw.begin_command_buffer(
                setup_cb.raw,
                &vk::CommandBufferBeginInfo::builder().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT).build(),
            )?;
        }

        callback(setup_cb.raw);

        unsafe {
            self.raw.end_command_buffer(setup_cb.raw)?;

            let command_buffers = [setup_cb.raw];
            let submit_info = vk::SubmitInfo::builder().command_buffers(&command_buffers).build();
            self.raw.queue_submit(self.global_queue.raw, &[submit_info], setup_cb.submit_done_fence)?;
        }

        Ok(())
    }
}
