pub use glam::*;

/// Three-dimensional extent, used by resource descriptors that need a
/// width/height/depth independent of `vk::Extent3D` (kept out of `pyre-rhi`
/// so descriptor math doesn't need a Vulkan dependency).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct Extent3 {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

impl Extent3 {
    pub const fn new(width: u32, height: u32, depth: u32) -> Self {
        Self { width, height, depth }
    }

    pub const fn new_2d(width: u32, height: u32) -> Self {
        Self::new(width, height, 1)
    }
}
