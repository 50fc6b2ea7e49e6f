use ash::vk;
pub use vk_sync::AccessType;
use derive_builder::Builder;

use super::{Buffer, CommandBuffer, Device, Image};

/// Low-level pipeline-barrier recording. `pyre-rg`'s synchronization planner
/// decides *which* `AccessType` transitions are needed and batches them; this
/// module only turns a resolved batch into `vkCmdPipelineBarrier` calls.
#[derive(Builder)]
#[builder(pattern = "owned")]
pub struct ImageBarrier<'a> {
    pub image: &'a Image,
    pub prev_access: &'a [AccessType],
    pub next_access: &'a [AccessType],
    pub aspect_mask: vk::ImageAspectFlags,
    #[builder(default = "false")]
    pub discard_contents: bool,
}

impl<'a> ImageBarrier<'a> {
    pub fn builder() -> ImageBarrierBuilder<'a> {
        Default::default()
    }
}

pub fn image_barrier(device: &Device, cb: &CommandBuffer, barriers: &[ImageBarrier]) {
    let img_barriers = barriers
        .iter()
        .map(|barrier| {
            let subresource_range = vk::ImageSubresourceRange::builder()
                .aspect_mask(barrier.aspect_mask)
                .base_array_layer(0)
                .base_mip_level(0)
                .layer_count(vk::REMAINING_ARRAY_LAYERS)
                .level_count(vk::REMAINING_MIP_LEVELS)
                .build();

            vk_sync::ImageBarrier {
                previous_accesses: barrier.prev_access,
                next_accesses: barrier.next_access,
                // optimal layouts on both sides for max throughput; queue ownership
                // transfer is not supported (single queue family for now).
                previous_layout: vk_sync::ImageLayout::Optimal,
                next_layout: vk_sync::ImageLayout::Optimal,
                discard_contents: barrier.discard_contents,
                src_queue_family_index: device.global_queue.family.index,
                dst_queue_family_index: device.global_queue.family.index,
                image: barrier.image.raw,
                range: subresource_range,
            }
        })
        .collect::<Vec<_>>();

    vk_sync::cmd::pipeline_barrier(&device.raw, cb.raw, None, &[], &img_barriers);
}

#[derive(Builder)]
#[builder(pattern = "owned")]
pub struct BufferBarrier<'a> {
    pub buffer: &'a Buffer,
    pub prev_access: &'a [AccessType],
    pub next_access: &'a [AccessType],
}

impl<'a> BufferBarrier<'a> {
    pub fn builder() -> BufferBarrierBuilder<'a> {
        Default::default()
    }
}

pub fn buffer_barrier(device: &Device, cb: &CommandBuffer, barriers: &[BufferBarrier]) {
    let buf_barriers = barriers
        .iter()
        .map(|barrier| vk_sync::BufferBarrier {
            previous_accesses: barrier.prev_access,
            next_accesses: barrier.next_access,
            src_queue_family_index: device.global_queue.family.index,
            dst_queue_family_index: device.global_queue.family.index,
            buffer: barrier.buffer.raw,
            size: barrier.buffer.desc.size,
            offset: 0,
        })
        .collect::<Vec<_>>();

    vk_sync::cmd::pipeline_barrier(&device.raw, cb.raw, None, &buf_barriers, &[]);
}

/// A barrier with no resource attached: used by the split-barrier path's
/// release step, and for the global execution-dependency the batch planner
/// inserts between adjacent batches that share no resource but must still
/// not reorder across a queue-ownership boundary.
pub fn global_barrier(device: &Device, cb: &CommandBuffer, prev_access: &[AccessType], next_access: &[AccessType]) {
    let barrier = vk_sync::GlobalBarrier { previous_accesses: prev_access, next_accesses: next_access };
    vk_sync::cmd::pipeline_barrier(&device.raw, cb.raw, Some(barrier), &[], &[]);
}
