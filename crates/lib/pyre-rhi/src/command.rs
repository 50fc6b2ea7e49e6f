use ash::vk;

pub struct CommandBuffer {
    pub raw: vk::CommandBuffer,
    pub submit_done_fence: vk::Fence,

    _pool: vk::CommandPool,
}

impl CommandBuffer {
    pub fn new(device: &ash::Device, queue_family_index: u32) -> Self {
        let fence_ci = vk::FenceCreateInfo::builder().flags(vk::FenceCreateFlags::SIGNALED).build();
        let fence = unsafe { device.create_fence(&fence_ci, None).expect("failed to create fence") };

        let pool_ci = vk::CommandPoolCreateInfo::builder()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(queue_family_index)
            .build();
        let pool = unsafe { device.create_command_pool(&pool_ci, None).expect("failed to create command pool") };

        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_buffer_count(1)
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .build();
        let buffers = unsafe { device.allocate_command_buffers(&alloc_info).expect("failed to allocate command buffer") };

        Self { raw: buffers[0], _pool: pool, submit_done_fence: fence }
    }
}
