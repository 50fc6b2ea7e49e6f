use bitflags::bitflags;

use crate::resource::ImageLayout;

bitflags! {
    /// `sampled` implies `read` at construction time (see [`AccessFlags::sampled`]);
    /// `concurrent` only has meaning alongside `write` and waives the
    /// exclusive-write rule for the attachment pair it's declared on.
    #[derive(Default)]
    pub struct AccessFlags: u8 {
        const READ       = 0b0001;
        const WRITE      = 0b0010;
        const SAMPLED    = 0b0100;
        const CONCURRENT = 0b1000;
    }
}

impl AccessFlags {
    pub fn read() -> Self {
        AccessFlags::READ
    }

    pub fn write() -> Self {
        AccessFlags::WRITE
    }

    pub fn sampled() -> Self {
        AccessFlags::READ | AccessFlags::SAMPLED
    }

    pub fn concurrent_write() -> Self {
        AccessFlags::WRITE | AccessFlags::CONCURRENT
    }

    pub fn is_write(&self) -> bool {
        self.contains(AccessFlags::WRITE)
    }

    pub fn is_read(&self) -> bool {
        self.contains(AccessFlags::READ)
    }

    pub fn is_concurrent(&self) -> bool {
        self.contains(AccessFlags::CONCURRENT)
    }
}

/// Pipeline stage vocabulary an attachment is declared against. Ordered
/// roughly earliest-to-latest for [`Stage::combine`]'s least-upper-bound rule
/// and for the split-barrier pipeline-stage-distance heuristic below.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    TopOfPipe,
    Indirect,
    Transfer,
    Vertex,
    AccelerationStructureBuild,
    Compute,
    ColorAttachment,
    DepthStencil,
    Resolve,
    Fragment,
    Host,
    AllGraphics,
    AllCommands,
    BottomOfPipe,
    /// An attachment handed off to presentation. Distinct from `BottomOfPipe`
    /// so that a swapchain-bound image is the only thing `infer_layout` ever
    /// forces into `ImageLayout::PresentSrc` — an attachment that merely
    /// finishes at bottom-of-pipe without presenting stays in whatever layout
    /// its access implies.
    Present,
}

impl Stage {
    /// Canonical position used for distance and ordering comparisons. Two
    /// stages that are not truly ordered (e.g. `Compute` vs `Fragment`) still
    /// need a total order for a deterministic LUB — ties are broken by this
    /// table's declaration order, which is what makes batch-compile
    /// idempotent across repeated `plan()` calls on the same input.
    fn rank(&self) -> u32 {
        match self {
            Stage::TopOfPipe => 0,
            Stage::Indirect => 1,
            Stage::Transfer => 2,
            Stage::Vertex => 3,
            Stage::AccelerationStructureBuild => 4,
            Stage::Compute => 5,
            Stage::ColorAttachment => 6,
            Stage::DepthStencil => 7,
            Stage::Resolve => 8,
            Stage::Fragment => 9,
            Stage::Host => 10,
            Stage::AllGraphics => 11,
            Stage::AllCommands => 12,
            Stage::BottomOfPipe => 13,
            Stage::Present => 14,
        }
    }

    /// Least-upper-bound of two stages in the partial order where earlier
    /// pipeline stages rank below later ones and `all-commands` dominates.
    pub fn combine(self, other: Stage) -> Stage {
        if self == Stage::AllCommands || other == Stage::AllCommands {
            return Stage::AllCommands;
        }
        if self.rank() >= other.rank() {
            self
        } else {
            other
        }
    }

    /// Distance used by the split-barrier heuristic.
    pub fn distance(self, other: Stage) -> u32 {
        (self.rank() as i64 - other.rank() as i64).unsigned_abs() as u32
    }
}

/// `pyre-rhi::ImageDesc` carries an `ash::vk::Format`; this enum is
/// intentionally format-agnostic at the `pyre-rg` layer so the core doesn't
/// need to depend on `ash` for plan data — callers resolve the concrete
/// aspect mask from the resource's own format at barrier-emission time (see
/// `executor.rs`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageAspect {
    Color,
    Depth,
    Stencil,
    DepthStencil,
}

/// Infers the image layout an attachment needs from its stage and access.
pub fn infer_layout(stage: Stage, access: AccessFlags) -> ImageLayout {
    if access.contains(AccessFlags::SAMPLED) {
        return ImageLayout::ShaderReadOnlyOptimal;
    }
    match stage {
        Stage::ColorAttachment if access.is_write() => ImageLayout::ColorAttachmentOptimal,
        Stage::DepthStencil => {
            if access.is_write() {
                ImageLayout::DepthStencilAttachmentOptimal
            } else {
                ImageLayout::DepthStencilReadOnlyOptimal
            }
        }
        Stage::Transfer if access.is_write() => ImageLayout::TransferDstOptimal,
        Stage::Transfer if access.is_read() => ImageLayout::TransferSrcOptimal,
        Stage::Compute if access.is_write() => ImageLayout::General,
        Stage::Present => ImageLayout::PresentSrc,
        _ if access.is_write() => ImageLayout::General,
        _ => ImageLayout::ShaderReadOnlyOptimal,
    }
}

/// Layout transitions expensive enough to push a transition toward the
/// split-barrier path even when the stage distance alone wouldn't justify it.
pub fn is_expensive_layout_transition(from: ImageLayout, to: ImageLayout) -> bool {
    matches!(
        (from, to),
        (ImageLayout::ColorAttachmentOptimal, ImageLayout::ShaderReadOnlyOptimal)
            | (ImageLayout::DepthStencilAttachmentOptimal, ImageLayout::ShaderReadOnlyOptimal)
            | (ImageLayout::TransferDstOptimal, ImageLayout::ShaderReadOnlyOptimal)
            | (ImageLayout::General, ImageLayout::ShaderReadOnlyOptimal)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_commands_dominates_combine() {
        assert_eq!(Stage::Vertex.combine(Stage::AllCommands), Stage::AllCommands);
        assert_eq!(Stage::AllCommands.combine(Stage::Fragment), Stage::AllCommands);
    }

    #[test]
    fn combine_picks_later_stage() {
        assert_eq!(Stage::Transfer.combine(Stage::Fragment), Stage::Fragment);
    }

    #[test]
    fn sampled_read_always_infers_shader_read_only() {
        assert_eq!(infer_layout(Stage::Fragment, AccessFlags::sampled()), ImageLayout::ShaderReadOnlyOptimal);
    }

    #[test]
    fn color_attachment_write_infers_color_attachment_optimal() {
        assert_eq!(infer_layout(Stage::ColorAttachment, AccessFlags::write()), ImageLayout::ColorAttachmentOptimal);
    }

    #[test]
    fn transfer_read_vs_write_infer_different_layouts() {
        assert_eq!(infer_layout(Stage::Transfer, AccessFlags::write()), ImageLayout::TransferDstOptimal);
        assert_eq!(infer_layout(Stage::Transfer, AccessFlags::read()), ImageLayout::TransferSrcOptimal);
    }

    #[test]
    fn expensive_transition_set_covers_the_common_attachment_to_read_only_cases() {
        assert!(is_expensive_layout_transition(ImageLayout::ColorAttachmentOptimal, ImageLayout::ShaderReadOnlyOptimal));
        assert!(!is_expensive_layout_transition(ImageLayout::ShaderReadOnlyOptimal, ImageLayout::ColorAttachmentOptimal));
    }

    #[test]
    fn only_present_stage_infers_present_src() {
        assert_eq!(infer_layout(Stage::Present, AccessFlags::read()), ImageLayout::PresentSrc);
        assert_ne!(infer_layout(Stage::BottomOfPipe, AccessFlags::read()), ImageLayout::PresentSrc);
    }
}
