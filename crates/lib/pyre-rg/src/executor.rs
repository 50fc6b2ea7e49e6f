use ash::vk;
use pyre_rhi::Device;

use crate::access::{AccessFlags, Stage};
use crate::barrier::{Barrier, BarrierTarget};
use crate::batch::Batch;
use crate::compiled::CompiledGraph;
use crate::debug::DebugInfoRecorder;
use crate::error::GraphError;
use crate::handle::{Handle, HandleSpace};
use crate::options::GraphOptions;
use crate::registry::ResourceRegistry;
use crate::resource::{ImageLayout, ResourceView};
use crate::task::{Attachment, Task};

/// The task-interface object handed to a task's callback, exposing
/// device/command-buffer access, the task's own attachment list (for name
/// lookup), a scratch slice, and handle resolvers. Resolvers validate
/// generation against the registry; a mismatch is surfaced to the caller as
/// `GraphError::StaleHandle` rather than panicking — the executor downgrades
/// it to a logged skip.
pub struct TaskInterface<'a> {
    pub device: &'a Device,
    pub command_buffer: vk::CommandBuffer,
    pub attachments: &'a [Attachment],
    pub scratch: &'a mut [u8],
    pub frame_index: u64,
    pub gpu_index: u32,
    registry: &'a ResourceRegistry,
}

impl<'a> TaskInterface<'a> {
    pub fn get_buffer(&self, view: ResourceView) -> Result<vk::Buffer, GraphError> {
        let handle = view.handle();
        self.registry.validate(handle)?;
        match handle.space {
            HandleSpace::Buffer => self.registry.buffers[handle.index as usize]
                .device_handle
                .ok_or(GraphError::InvalidHandle { space: handle.space, index: handle.index }),
            other => Err(GraphError::InvalidHandle { space: other, index: handle.index }),
        }
    }

    pub fn get_image(&self, view: ResourceView) -> Result<vk::Image, GraphError> {
        let handle = view.handle();
        self.registry.validate(handle)?;
        match handle.space {
            HandleSpace::Image => self.registry.images[handle.index as usize]
                .device_handle
                .ok_or(GraphError::InvalidHandle { space: handle.space, index: handle.index }),
            other => Err(GraphError::InvalidHandle { space: other, index: handle.index }),
        }
    }

    #[cfg(feature = "gpu_ray_tracing")]
    pub fn get_acceleration_structure(&self, view: ResourceView) -> Result<vk::AccelerationStructureKHR, GraphError> {
        let handle = view.handle();
        self.registry.validate(handle)?;
        resolve_acceleration_structure(self.registry, handle)
    }

    pub fn get_buffer_address(&self, view: ResourceView) -> Result<vk::DeviceAddress, GraphError> {
        let buffer = self.get_buffer(view)?;
        Ok(unsafe {
            self.device
                .raw
                .get_buffer_device_address(&vk::BufferDeviceAddressInfo::builder().buffer(buffer).build())
        })
    }
}

fn vk_stage(stage: Stage) -> vk::PipelineStageFlags {
    use vk::PipelineStageFlags as PS;
    match stage {
        Stage::TopOfPipe => PS::TOP_OF_PIPE,
        Stage::Indirect => PS::DRAW_INDIRECT,
        Stage::Transfer => PS::TRANSFER,
        Stage::Vertex => PS::VERTEX_SHADER,
        Stage::AccelerationStructureBuild => PS::COMPUTE_SHADER,
        Stage::Compute => PS::COMPUTE_SHADER,
        Stage::ColorAttachment => PS::COLOR_ATTACHMENT_OUTPUT,
        Stage::DepthStencil => PS::EARLY_FRAGMENT_TESTS | PS::LATE_FRAGMENT_TESTS,
        Stage::Resolve => PS::COLOR_ATTACHMENT_OUTPUT,
        Stage::Fragment => PS::FRAGMENT_SHADER,
        Stage::Host => PS::HOST,
        Stage::AllGraphics => PS::ALL_GRAPHICS,
        Stage::AllCommands => PS::ALL_COMMANDS,
        Stage::BottomOfPipe => PS::BOTTOM_OF_PIPE,
        Stage::Present => PS::BOTTOM_OF_PIPE,
    }
}

/// Derives `vk::AccessFlags` for a `(stage, access)` pair, mirroring the
/// stage-conditioned access derivation of `barrier.rs`'s `get_access_info` —
/// expanded here from `vk_sync::AccessType` matching to our own decomposed
/// `Stage`/`AccessFlags` model.
fn vk_access(stage: Stage, access: AccessFlags) -> vk::AccessFlags {
    use vk::AccessFlags as AF;
    let mut flags = AF::empty();

    match stage {
        Stage::ColorAttachment | Stage::Resolve => {
            if access.is_write() {
                flags |= AF::COLOR_ATTACHMENT_WRITE;
            }
            if access.is_read() {
                flags |= AF::COLOR_ATTACHMENT_READ;
            }
        }
        Stage::DepthStencil => {
            if access.is_write() {
                flags |= AF::DEPTH_STENCIL_ATTACHMENT_WRITE;
            }
            if access.is_read() {
                flags |= AF::DEPTH_STENCIL_ATTACHMENT_READ;
            }
        }
        Stage::Transfer => {
            if access.is_write() {
                flags |= AF::TRANSFER_WRITE;
            }
            if access.is_read() {
                flags |= AF::TRANSFER_READ;
            }
        }
        Stage::Compute | Stage::Vertex | Stage::Fragment | Stage::AccelerationStructureBuild => {
            if access.contains(AccessFlags::SAMPLED) || access.is_read() {
                flags |= AF::SHADER_READ;
            }
            if access.is_write() {
                flags |= AF::SHADER_WRITE;
            }
        }
        Stage::Indirect => flags |= AF::INDIRECT_COMMAND_READ,
        Stage::Host => {
            if access.is_write() {
                flags |= AF::HOST_WRITE;
            }
            if access.is_read() {
                flags |= AF::HOST_READ;
            }
        }
        Stage::AllGraphics | Stage::AllCommands => flags |= AF::MEMORY_READ | AF::MEMORY_WRITE,
        Stage::TopOfPipe | Stage::BottomOfPipe | Stage::Present => {}
    }

    flags
}

fn vk_layout(layout: ImageLayout) -> vk::ImageLayout {
    match layout {
        ImageLayout::Undefined => vk::ImageLayout::UNDEFINED,
        ImageLayout::ColorAttachmentOptimal => vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        ImageLayout::DepthStencilAttachmentOptimal => vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        ImageLayout::DepthStencilReadOnlyOptimal => vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL,
        ImageLayout::ShaderReadOnlyOptimal => vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        ImageLayout::TransferSrcOptimal => vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
        ImageLayout::TransferDstOptimal => vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        ImageLayout::General => vk::ImageLayout::GENERAL,
        ImageLayout::PresentSrc => vk::ImageLayout::PRESENT_SRC_KHR,
    }
}

/// Infers the image aspect mask a format implies.
fn vk_aspect_from_format(format: vk::Format) -> vk::ImageAspectFlags {
    match format {
        vk::Format::D16_UNORM | vk::Format::D32_SFLOAT | vk::Format::X8_D24_UNORM_PACK32 => vk::ImageAspectFlags::DEPTH,
        vk::Format::S8_UINT => vk::ImageAspectFlags::STENCIL,
        vk::Format::D16_UNORM_S8_UINT | vk::Format::D24_UNORM_S8_UINT | vk::Format::D32_SFLOAT_S8_UINT => {
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        }
        _ => vk::ImageAspectFlags::COLOR,
    }
}

fn resolve_buffer(registry: &ResourceRegistry, handle: Handle) -> Result<vk::Buffer, GraphError> {
    if handle.space != HandleSpace::Buffer {
        return Err(GraphError::InvalidHandle { space: handle.space, index: handle.index });
    }
    registry.buffers[handle.index as usize]
        .device_handle
        .ok_or(GraphError::InvalidHandle { space: handle.space, index: handle.index })
}

fn resolve_image(registry: &ResourceRegistry, handle: Handle) -> Result<(vk::Image, vk::Format), GraphError> {
    if handle.space != HandleSpace::Image {
        return Err(GraphError::InvalidHandle { space: handle.space, index: handle.index });
    }
    let resource = &registry.images[handle.index as usize];
    let image = resource.device_handle.ok_or(GraphError::InvalidHandle { space: handle.space, index: handle.index })?;
    Ok((image, resource.desc.format))
}

fn resolve_acceleration_structure(registry: &ResourceRegistry, handle: Handle) -> Result<vk::AccelerationStructureKHR, GraphError> {
    let resource = match handle.space {
        HandleSpace::Blas => registry.blas.get(handle.index as usize),
        HandleSpace::Tlas => registry.tlas.get(handle.index as usize),
        HandleSpace::Buffer | HandleSpace::Image => None,
    };
    resource
        .and_then(|r| r.device_handle)
        .ok_or(GraphError::InvalidHandle { space: handle.space, index: handle.index })
}

fn emit_barrier(device: &Device, cb: vk::CommandBuffer, registry: &ResourceRegistry, barrier: &Barrier) -> Result<(), GraphError> {
    let src_stage = vk_stage(barrier.src_stage);
    let dst_stage = vk_stage(barrier.dst_stage);
    let src_access = vk_access(barrier.src_stage, barrier.src_access);
    let dst_access = vk_access(barrier.dst_stage, barrier.dst_access);

    match barrier.target {
        BarrierTarget::Buffer { handle, offset, size } => {
            let buffer = resolve_buffer(registry, handle)?;
            let memory_barrier = vk::BufferMemoryBarrier::builder()
                .src_access_mask(src_access)
                .dst_access_mask(dst_access)
                .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .buffer(buffer)
                .offset(offset)
                .size(if size == u64::MAX { vk::WHOLE_SIZE } else { size })
                .build();

            unsafe {
                device.raw.cmd_pipeline_barrier(cb, src_stage, dst_stage, vk::DependencyFlags::empty(), &[], &[memory_barrier], &[]);
            }
        }
        BarrierTarget::Image { handle, old_layout, new_layout } => {
            let (image, format) = resolve_image(registry, handle)?;
            let memory_barrier = vk::ImageMemoryBarrier::builder()
                .src_access_mask(src_access)
                .dst_access_mask(dst_access)
                .old_layout(vk_layout(old_layout))
                .new_layout(vk_layout(new_layout))
                .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .image(image)
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: vk_aspect_from_format(format),
                    base_mip_level: 0,
                    level_count: vk::REMAINING_MIP_LEVELS,
                    base_array_layer: 0,
                    layer_count: vk::REMAINING_ARRAY_LAYERS,
                })
                .build();

            unsafe {
                device.raw.cmd_pipeline_barrier(cb, src_stage, dst_stage, vk::DependencyFlags::empty(), &[], &[], &[memory_barrier]);
            }
        }
        BarrierTarget::AccelerationStructure { handle } => {
            resolve_acceleration_structure(registry, handle)?;
            let memory_barrier =
                vk::MemoryBarrier::builder().src_access_mask(src_access).dst_access_mask(dst_access).build();

            unsafe {
                device.raw.cmd_pipeline_barrier(cb, src_stage, dst_stage, vk::DependencyFlags::empty(), &[memory_barrier], &[], &[]);
            }
        }
    }

    Ok(())
}

fn task_gpu_mask_excludes(task: &Task, registry: &ResourceRegistry, gpu_index: u32) -> bool {
    task.attachments.iter().any(|attachment| {
        let handle = attachment.view.handle();
        let mask = match handle.space {
            HandleSpace::Buffer => registry.buffers.get(handle.index as usize).map(|b| b.gpu_mask),
            HandleSpace::Image => registry.images.get(handle.index as usize).map(|i| i.gpu_mask),
            HandleSpace::Blas => registry.blas.get(handle.index as usize).map(|b| b.gpu_mask),
            HandleSpace::Tlas => registry.tlas.get(handle.index as usize).map(|t| t.gpu_mask),
        };
        !mask.unwrap_or(crate::resource::GpuMask::ALL).contains(gpu_index)
    })
}

fn batch_is_enabled(tasks: &[Task], batch: &Batch, condition_vector: u32) -> bool {
    batch.task_indices.iter().any(|&index| tasks[index].is_enabled(condition_vector))
}

/// Records the compiled batch list into `cb`. Acquiring and beginning the
/// command buffer, and submitting it afterward, are the caller's
/// responsibility (`RenderGraph::execute`) — this function only covers
/// barrier emission and task invocation.
#[allow(clippy::too_many_arguments)]
pub fn record(
    device: &Device,
    cb: vk::CommandBuffer,
    registry: &ResourceRegistry,
    tasks: &mut [Task],
    compiled: &CompiledGraph,
    condition_vector: u32,
    frame_index: u64,
    gpu_index: u32,
    options: &GraphOptions,
    debug: &mut DebugInfoRecorder,
) -> Result<(), GraphError> {
    let mut scratch = vec![0u8; options.scratch_memory_size];

    for (batch_index, batch) in compiled.batches.iter().enumerate() {
        if !batch_is_enabled(tasks, batch, condition_vector) {
            glog::trace!("skipping batch {batch_index}: disabled by condition vector {condition_vector:#x}");
            continue;
        }

        if options.record_debug_info {
            debug.batch(batch_index, batch.queue_index, batch.task_indices.len());
        }

        for barrier in &batch.pre_barriers {
            emit_barrier(device, cb, registry, barrier)?;
            if options.record_debug_info {
                debug.barrier(batch_index, barrier);
            }
        }

        for &task_index in &batch.task_indices {
            let task = &mut tasks[task_index];
            if !task.is_enabled(condition_vector) {
                continue;
            }
            if task_gpu_mask_excludes(task, registry, gpu_index) {
                glog::trace!("skipping task '{}' on gpu {gpu_index}: outside its resources' gpu mask", task.name);
                continue;
            }

            if options.enable_debug_labels {
                glog::debug!("begin task '{}'", task.name);
            }

            let Some(callback) = task.execute.as_mut() else {
                glog::warn!("task '{}' has no execute callback recorded, skipping", task.name);
                continue;
            };

            let mut interface = TaskInterface {
                device,
                command_buffer: cb,
                attachments: &task.attachments,
                scratch: &mut scratch,
                frame_index,
                gpu_index,
                registry,
            };

            if let Err(error) = callback(&mut interface) {
                glog::warn!("task '{}' failed during execute, skipping: {error:?}", task.name);
            }

            if options.enable_debug_labels {
                glog::debug!("end task '{}'", task.name);
            }
        }

        for barrier in &batch.post_release_barriers {
            emit_barrier(device, cb, registry, barrier)?;
            if options.record_debug_info {
                debug.barrier(batch_index, barrier);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{AccessFlags, Stage};
    use crate::resource::GpuMask;
    use crate::task::{Attachment, TaskKind};

    /// A task touching a resource whose GPU mask excludes the device index
    /// must be skipped on that device without erroring. Exercised directly
    /// against the pure mask-check rather than through
    /// `RenderGraph::execute_on_all_gpus`, which needs a live `Device` to
    /// submit against.
    #[test]
    fn task_is_excluded_on_gpus_outside_the_resource_mask() {
        let mut registry = ResourceRegistry::default();
        let view = registry
            .register_persistent_buffer(
                ash::vk::Buffer::null(),
                64,
                ash::vk::BufferUsageFlags::STORAGE_BUFFER,
                GpuMask::single(0),
            )
            .unwrap();

        let mut task = Task::new("write_b", TaskKind::Compute);
        task.attachments.push(Attachment { name: "w".into(), access: AccessFlags::write(), stage: Stage::Compute, view });

        assert!(!task_gpu_mask_excludes(&task, &registry, 0));
        assert!(task_gpu_mask_excludes(&task, &registry, 1));
    }

    #[test]
    fn task_with_no_attachments_is_never_excluded() {
        let registry = ResourceRegistry::default();
        let task = Task::new("no_op", TaskKind::Compute);
        assert!(!task_gpu_mask_excludes(&task, &registry, 3));
    }
}
