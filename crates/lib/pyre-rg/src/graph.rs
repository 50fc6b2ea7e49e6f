use std::sync::Arc;

use ash::vk;
use pyre_rhi::{BufferDesc as RhiBufferDesc, CommandBuffer, Device, ImageDesc as RhiImageDesc, RhiError};

use crate::compiled::CompiledGraph;
use crate::debug::DebugInfoRecorder;
use crate::error::GraphError;
use crate::options::GraphOptions;
use crate::registry::ResourceRegistry;
use crate::resource::GpuMask;
use crate::resource::ResourceView;
use crate::plan::plan;
use crate::task::{Task, TaskBuilder, TaskKind};
use crate::transient_allocator;
use crate::executor;

/// Top-level entry point: one instance per in-flight frame graph, owning the
/// devices it records against, the recorder's task list, the resource
/// registry, and (after `compile()`) the batch/barrier/allocation plan. This
/// crate folds recording, compiling, and executing into one struct with
/// explicit module functions underneath, rather than separate builder/
/// compiled-graph types chained by the host.
pub struct RenderGraph {
    devices: Vec<Arc<Device>>,
    command_buffers: Vec<CommandBuffer>,
    registry: ResourceRegistry,
    tasks: Vec<Task>,
    condition_vector: u32,
    options: GraphOptions,
    compiled: Option<CompiledGraph>,
    debug: DebugInfoRecorder,
    frame_index: u64,
}

impl RenderGraph {
    /// One command buffer is allocated per device up front; the graph never
    /// grows that list.
    pub fn create(devices: Vec<Arc<Device>>, options: GraphOptions) -> Self {
        let command_buffers =
            devices.iter().map(|device| CommandBuffer::new(&device.raw, device.global_queue.family.index)).collect();

        Self {
            devices,
            command_buffers,
            registry: ResourceRegistry::default(),
            tasks: Vec::new(),
            condition_vector: 0,
            options,
            compiled: None,
            debug: DebugInfoRecorder::default(),
            frame_index: 0,
        }
    }

    // --- Resource declaration ---

    pub fn use_persistent_buffer(
        &mut self,
        device_handle: vk::Buffer,
        size: u64,
        usage_flags: vk::BufferUsageFlags,
        gpu_mask: GpuMask,
    ) -> Result<ResourceView, GraphError> {
        self.registry.register_persistent_buffer(device_handle, size, usage_flags, gpu_mask)
    }

    pub fn use_persistent_image(
        &mut self,
        device_handle: vk::Image,
        desc: RhiImageDesc,
        gpu_mask: GpuMask,
    ) -> Result<ResourceView, GraphError> {
        self.registry.register_persistent_image(device_handle, desc, gpu_mask)
    }

    pub fn create_transient_buffer(&mut self, desc: RhiBufferDesc, name: impl Into<String>) -> Result<ResourceView, GraphError> {
        self.registry.create_transient_buffer(desc, name)
    }

    pub fn create_transient_image(&mut self, desc: RhiImageDesc, name: impl Into<String>) -> Result<ResourceView, GraphError> {
        self.registry.create_transient_image(desc, name)
    }

    #[cfg(feature = "gpu_ray_tracing")]
    pub fn use_persistent_blas(
        &mut self,
        device_handle: vk::AccelerationStructureKHR,
        gpu_mask: GpuMask,
    ) -> Result<ResourceView, GraphError> {
        self.registry.register_persistent_blas(device_handle, gpu_mask)
    }

    #[cfg(feature = "gpu_ray_tracing")]
    pub fn use_persistent_tlas(
        &mut self,
        device_handle: vk::AccelerationStructureKHR,
        gpu_mask: GpuMask,
    ) -> Result<ResourceView, GraphError> {
        self.registry.register_persistent_tlas(device_handle, gpu_mask)
    }

    // --- Task declaration ---

    pub fn compute(&mut self, name: impl Into<String>) -> TaskBuilder<'_> {
        TaskBuilder::new(self, name, TaskKind::Compute)
    }

    pub fn raster(&mut self, name: impl Into<String>) -> TaskBuilder<'_> {
        TaskBuilder::new(self, name, TaskKind::Raster)
    }

    pub fn transfer(&mut self, name: impl Into<String>) -> TaskBuilder<'_> {
        TaskBuilder::new(self, name, TaskKind::Transfer)
    }

    pub fn general(&mut self, name: impl Into<String>) -> TaskBuilder<'_> {
        TaskBuilder::new(self, name, TaskKind::General)
    }

    #[cfg(feature = "gpu_ray_tracing")]
    pub fn ray_tracing(&mut self, name: impl Into<String>) -> TaskBuilder<'_> {
        TaskBuilder::new(self, name, TaskKind::RayTracing)
    }

    /// The direct form for a fully pre-built task record, bypassing the
    /// builder.
    pub fn add_task(&mut self, task: Task) {
        self.push_task(task);
    }

    pub(crate) fn push_task(&mut self, task: Task) {
        self.tasks.push(task);
    }

    /// Toggles bit `index` of the 32-bit condition vector consulted at
    /// execute time to decide which tasks actually run.
    pub fn set_condition(&mut self, index: u32, value: bool) {
        debug_assert!(index < 32, "condition index out of range for a 32-bit vector");
        if value {
            self.condition_vector |= 1 << index;
        } else {
            self.condition_vector &= !(1 << index);
        }
    }

    pub fn condition_vector(&self) -> u32 {
        self.condition_vector
    }

    /// Runs the Dependency Analyzer, Batch Planner, Synchronization Planner,
    /// and Transient Allocator in sequence. Transient resources are bound
    /// against `devices[0]`: `execute_on_all_gpus` re-executes one compiled
    /// plan per device without separate per-device transient memory, so this
    /// crate treats device 0 as the transient allocator's home device (see
    /// DESIGN.md).
    pub fn compile(&mut self) -> Result<(), GraphError> {
        self.compile_inner().map_err(GraphError::into_compile_error)
    }

    fn compile_inner(&mut self) -> Result<(), GraphError> {
        if let Some(previous) = self.compiled.take() {
            for allocation in previous.pool_allocations {
                self.devices[0].free_pool(allocation);
            }
        }

        self.debug.clear();

        let output = plan(&mut self.registry, &self.tasks, &self.options)?;
        let pool_allocations = transient_allocator::bind(&output.transient_plan, &self.devices[0], &mut self.registry)?;

        if self.options.record_debug_info {
            self.debug.note(format!(
                "compiled {} batches across {} pools",
                output.batches.len(),
                output.transient_plan.pools.len()
            ));
        }

        glog::debug!("compiled {} tasks into {} batches", self.tasks.len(), output.batches.len());
        self.compiled = Some(CompiledGraph { batches: output.batches, pool_allocations });
        Ok(())
    }

    /// Records and submits the compiled plan against one device.
    pub fn execute(&mut self, gpu_index: u32) -> Result<(), GraphError> {
        self.execute_device(gpu_index)?;
        self.frame_index += 1;
        Ok(())
    }

    fn execute_device(&mut self, gpu_index: u32) -> Result<(), GraphError> {
        let compiled = self.compiled.as_ref().ok_or(GraphError::NotCompiled)?;
        let device = self.devices.get(gpu_index as usize).ok_or(GraphError::NotCompiled)?;
        let cb = &self.command_buffers[gpu_index as usize];

        unsafe {
            device.raw.wait_for_fences(&[cb.submit_done_fence], true, u64::MAX).map_err(RhiError::from)?;
            device.raw.reset_fences(&[cb.submit_done_fence]).map_err(RhiError::from)?;
            device
                .raw
                .begin_command_buffer(cb.raw, &vk::CommandBufferBeginInfo::builder().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT).build())
                .map_err(RhiError::from)?;
        }

        executor::record(
            device,
            cb.raw,
            &self.registry,
            &mut self.tasks,
            compiled,
            self.condition_vector,
            self.frame_index,
            gpu_index,
            &self.options,
            &mut self.debug,
        )?;

        unsafe {
            device.raw.end_command_buffer(cb.raw).map_err(RhiError::from)?;
            let command_buffers = [cb.raw];
            let submit_info = vk::SubmitInfo::builder().command_buffers(&command_buffers).build();
            device.raw.queue_submit(device.global_queue.raw, &[submit_info], cb.submit_done_fence).map_err(RhiError::from)?;
        }

        Ok(())
    }

    /// Re-runs the same compiled plan independently against every device in
    /// the graph.
    pub fn execute_on_all_gpus(&mut self) -> Result<(), GraphError> {
        for gpu_index in 0..self.devices.len() as u32 {
            self.execute_device(gpu_index)?;
        }
        self.frame_index += 1;
        Ok(())
    }

    /// Copies the accumulated debug dump into `buffer`, returning the number
    /// of bytes written.
    pub fn get_debug_info(&self, buffer: &mut [u8]) -> usize {
        self.debug.get_debug_info(buffer)
    }
}
