use crate::access::{AccessFlags, Stage};
use crate::handle::Handle;
use crate::resource::ImageLayout;

/// Which half of a split barrier this entry is, if any. A barrier is marked
/// `release` or `acquire` when it is one half of a split barrier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SplitRole {
    None,
    Release,
    Acquire,
}

/// The resource a barrier targets: a buffer sub-range, an image sub-resource
/// range plus an `old_layout -> new_layout` transition, or an acceleration
/// structure (synchronized as a whole, no sub-range or layout).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BarrierTarget {
    Buffer { handle: Handle, offset: u64, size: u64 },
    Image { handle: Handle, old_layout: ImageLayout, new_layout: ImageLayout },
    AccelerationStructure { handle: Handle },
}

impl BarrierTarget {
    pub fn handle(&self) -> Handle {
        match self {
            BarrierTarget::Buffer { handle, .. } => *handle,
            BarrierTarget::Image { handle, .. } => *handle,
            BarrierTarget::AccelerationStructure { handle } => *handle,
        }
    }
}

/// `(src_stage, dst_stage, src_access, dst_access, resource_target)` per spec
/// §3, plus the split-barrier role.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Barrier {
    pub src_stage: Stage,
    pub dst_stage: Stage,
    pub src_access: AccessFlags,
    pub dst_access: AccessFlags,
    pub target: BarrierTarget,
    pub split: SplitRole,
}

impl Barrier {
    pub fn is_release(&self) -> bool {
        self.split == SplitRole::Release
    }

    pub fn is_acquire(&self) -> bool {
        self.split == SplitRole::Acquire
    }
}
