use pyre_rhi::{BufferDesc as RhiBufferDesc, ImageDesc as RhiImageDesc};

use crate::error::GraphError;
use crate::handle::{Handle, HandleAllocator, HandleSpace};
use crate::resource::{
    AccelerationStructureResource, BufferResource, GpuMask, ImageLayout, ImageResource, ResourceView,
};

/// Assigns stable `(index, generation)` handles, one monotonic allocator per
/// handle space, and owns the per-space resource tables other components
/// index into by `Handle::index`.
#[derive(Default)]
pub struct ResourceRegistry {
    buffer_alloc: HandleAllocator,
    image_alloc: HandleAllocator,
    blas_alloc: HandleAllocator,
    tlas_alloc: HandleAllocator,

    pub(crate) buffers: Vec<BufferResource>,
    pub(crate) images: Vec<ImageResource>,
    pub(crate) blas: Vec<AccelerationStructureResource>,
    pub(crate) tlas: Vec<AccelerationStructureResource>,
}

impl ResourceRegistry {
    pub fn register_persistent_buffer(
        &mut self,
        device_handle: ash::vk::Buffer,
        size: u64,
        usage: ash::vk::BufferUsageFlags,
        gpu_mask: GpuMask,
    ) -> Result<ResourceView, GraphError> {
        let handle = self.buffer_alloc.allocate(HandleSpace::Buffer)?;
        self.buffers.push(BufferResource {
            desc: RhiBufferDesc::new_gpu_only(size as usize, usage),
            transient: false,
            name: format!("persistent_buffer_{}", handle.index),
            gpu_mask,
            generation: handle.generation,
            lifetime: Default::default(),
            device_handle: Some(device_handle),
        });
        Ok(ResourceView::whole_buffer(handle, size))
    }

    pub fn register_persistent_image(
        &mut self,
        device_handle: ash::vk::Image,
        desc: RhiImageDesc,
        gpu_mask: GpuMask,
    ) -> Result<ResourceView, GraphError> {
        let handle = self.image_alloc.allocate(HandleSpace::Image)?;
        let mip_levels = desc.mip_levels as u32;
        let array_layers = desc.array_elements;
        self.images.push(ImageResource {
            desc,
            transient: false,
            name: format!("persistent_image_{}", handle.index),
            gpu_mask,
            generation: handle.generation,
            lifetime: Default::default(),
            current_layout: ImageLayout::Undefined,
            device_handle: Some(device_handle),
        });
        Ok(ResourceView::whole_image(handle, mip_levels, array_layers))
    }

    pub fn create_transient_buffer(
        &mut self,
        desc: RhiBufferDesc,
        name: impl Into<String>,
    ) -> Result<ResourceView, GraphError> {
        let handle = self.buffer_alloc.allocate(HandleSpace::Buffer)?;
        let size = desc.size as u64;
        self.buffers.push(BufferResource {
            desc,
            transient: true,
            name: name.into(),
            gpu_mask: GpuMask::ALL,
            generation: handle.generation,
            lifetime: Default::default(),
            device_handle: None,
        });
        Ok(ResourceView::whole_buffer(handle, size))
    }

    pub fn create_transient_image(
        &mut self,
        desc: RhiImageDesc,
        name: impl Into<String>,
    ) -> Result<ResourceView, GraphError> {
        let handle = self.image_alloc.allocate(HandleSpace::Image)?;
        let mip_levels = desc.mip_levels as u32;
        let array_layers = desc.array_elements;
        self.images.push(ImageResource {
            desc,
            transient: true,
            name: name.into(),
            gpu_mask: GpuMask::ALL,
            generation: handle.generation,
            lifetime: Default::default(),
            current_layout: ImageLayout::Undefined,
            device_handle: None,
        });
        Ok(ResourceView::whole_image(handle, mip_levels, array_layers))
    }

    /// Registers a bottom-level acceleration structure built outside the
    /// graph, mirroring `register_persistent_buffer`/`_image`'s import-only
    /// shape: acceleration structures are always host-owned, never allocated
    /// by the Transient Allocator.
    #[cfg(feature = "gpu_ray_tracing")]
    pub fn register_persistent_blas(
        &mut self,
        device_handle: ash::vk::AccelerationStructureKHR,
        gpu_mask: GpuMask,
    ) -> Result<ResourceView, GraphError> {
        let handle = self.blas_alloc.allocate(HandleSpace::Blas)?;
        self.blas.push(AccelerationStructureResource {
            name: format!("blas_{}", handle.index),
            gpu_mask,
            generation: handle.generation,
            device_handle: Some(device_handle),
        });
        Ok(ResourceView::AccelerationStructure { handle })
    }

    /// Registers a top-level acceleration structure; see
    /// [`Self::register_persistent_blas`].
    #[cfg(feature = "gpu_ray_tracing")]
    pub fn register_persistent_tlas(
        &mut self,
        device_handle: ash::vk::AccelerationStructureKHR,
        gpu_mask: GpuMask,
    ) -> Result<ResourceView, GraphError> {
        let handle = self.tlas_alloc.allocate(HandleSpace::Tlas)?;
        self.tlas.push(AccelerationStructureResource {
            name: format!("tlas_{}", handle.index),
            gpu_mask,
            generation: handle.generation,
            device_handle: Some(device_handle),
        });
        Ok(ResourceView::AccelerationStructure { handle })
    }

    /// Validates a view's handle against invariant 1 ("every attachment's
    /// `resource_view` references a live handle (generation matches)").
    /// Called by the Dependency Analyzer's first pass.
    pub fn validate(&self, handle: Handle) -> Result<(), GraphError> {
        let (len, generation) = match handle.space {
            HandleSpace::Buffer => (self.buffers.len(), self.buffers.get(handle.index as usize).map(|b| b.generation)),
            HandleSpace::Image => (self.images.len(), self.images.get(handle.index as usize).map(|i| i.generation)),
            HandleSpace::Blas => (self.blas.len(), self.blas.get(handle.index as usize).map(|a| a.generation)),
            HandleSpace::Tlas => (self.tlas.len(), self.tlas.get(handle.index as usize).map(|a| a.generation)),
        };

        if handle.index as usize >= len {
            return Err(GraphError::InvalidHandle { space: handle.space, index: handle.index });
        }

        let expected = generation.expect("index bound checked above");
        if expected != handle.generation {
            return Err(GraphError::StaleHandle {
                space: handle.space,
                index: handle.index,
                expected,
                got: handle.generation,
            });
        }

        Ok(())
    }

    /// Records a batch/queue touch on the resource a handle refers to.
    /// Acceleration structures carry only a handle and a GPU affinity — no
    /// lifetime window exists for them, so this is a no-op for BLAS/TLAS
    /// handles.
    pub fn touch_lifetime(&mut self, handle: Handle, batch: u32, queue: u32) {
        match handle.space {
            HandleSpace::Buffer => self.buffers[handle.index as usize].lifetime.touch(batch, queue),
            HandleSpace::Image => self.images[handle.index as usize].lifetime.touch(batch, queue),
            HandleSpace::Blas | HandleSpace::Tlas => {}
        }
    }

    /// Bumps the generation of a transient slot being reused across a
    /// recompile: recycling a slot's memory without bumping the generation
    /// would let a handle minted against the old occupant silently alias the
    /// new one.
    pub fn bump_generation(&mut self, space: HandleSpace, index: u32) {
        match space {
            HandleSpace::Buffer => self.buffers[index as usize].generation = self.buffers[index as usize].generation.wrapping_add(1),
            HandleSpace::Image => self.images[index as usize].generation = self.images[index as usize].generation.wrapping_add(1),
            HandleSpace::Blas => self.blas[index as usize].generation = self.blas[index as usize].generation.wrapping_add(1),
            HandleSpace::Tlas => self.tlas[index as usize].generation = self.tlas[index as usize].generation.wrapping_add(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persistent_buffer_is_never_transient() {
        let mut reg = ResourceRegistry::default();
        let view = reg
            .register_persistent_buffer(ash::vk::Buffer::null(), 1024, ash::vk::BufferUsageFlags::STORAGE_BUFFER, GpuMask::ALL)
            .unwrap();
        assert!(!reg.buffers[view.handle().index as usize].transient);
    }

    #[test]
    fn stale_generation_is_rejected() {
        let mut reg = ResourceRegistry::default();
        let view = reg
            .create_transient_buffer(RhiBufferDesc::new_gpu_only(64, ash::vk::BufferUsageFlags::STORAGE_BUFFER), "t")
            .unwrap();
        reg.bump_generation(crate::handle::HandleSpace::Buffer, view.handle().index);
        assert!(matches!(reg.validate(view.handle()), Err(GraphError::StaleHandle { .. })));
    }

    #[test]
    fn out_of_range_index_is_invalid() {
        let reg = ResourceRegistry::default();
        let bogus = Handle::new(HandleSpace::Buffer, 5, 0);
        assert!(matches!(reg.validate(bogus), Err(GraphError::InvalidHandle { .. })));
    }

    #[cfg(feature = "gpu_ray_tracing")]
    #[test]
    fn blas_and_tlas_occupy_disjoint_handle_spaces() {
        let mut reg = ResourceRegistry::default();
        let blas = reg.register_persistent_blas(ash::vk::AccelerationStructureKHR::null(), GpuMask::ALL).unwrap();
        let tlas = reg.register_persistent_tlas(ash::vk::AccelerationStructureKHR::null(), GpuMask::ALL).unwrap();

        assert_eq!(blas.handle().space, HandleSpace::Blas);
        assert_eq!(tlas.handle().space, HandleSpace::Tlas);
        assert_eq!(blas.handle().index, 0);
        assert_eq!(tlas.handle().index, 0);
        assert!(reg.validate(blas.handle()).is_ok());
        assert!(reg.validate(tlas.handle()).is_ok());
    }
}
