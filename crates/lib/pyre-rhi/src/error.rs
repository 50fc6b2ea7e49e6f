use thiserror::Error;

/// Errors surfaced by the device/memory/command layer that the render graph
/// core is recorded against. Kept separate from `pyre-rg::GraphError`: this
/// crate reports *how the device failed*, the graph reports *how the graph
/// misused the device*.
#[derive(Debug, Error)]
pub enum RhiError {
    #[error("allocation failed for {name:?}: {error:?}")]
    AllocationFailure {
        name: String,
        error: gpu_allocator::AllocationError,
    },

    #[error("vulkan error: {err:?}")]
    Vulkan { err: ash::vk::Result },

    #[error("device is out of memory")]
    OutOfMemory,
}

impl From<ash::vk::Result> for RhiError {
    fn from(err: ash::vk::Result) -> Self {
        match err {
            ash::vk::Result::ERROR_OUT_OF_DEVICE_MEMORY | ash::vk::Result::ERROR_OUT_OF_HOST_MEMORY => {
                Self::OutOfMemory
            }
            err => Self::Vulkan { err },
        }
    }
}
