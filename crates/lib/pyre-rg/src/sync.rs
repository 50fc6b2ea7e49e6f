use std::collections::HashMap;

use crate::access::{infer_layout, is_expensive_layout_transition, AccessFlags, Stage};
use crate::barrier::{Barrier, BarrierTarget, SplitRole};
use crate::batch::Batch;
use crate::error::GraphError;
use crate::handle::{Handle, HandleSpace};
use crate::resource::ImageLayout;
use crate::task::Task;

/// Per-resource state the Synchronization Planner carries forward across
/// batches: stage, access, and layout evolving batch by batch. `last_batch`
/// tracks which batch last produced this state, needed to anchor a split
/// barrier's release half.
#[derive(Clone, Copy, Debug)]
struct ResourceSyncState {
    stage: Stage,
    access: AccessFlags,
    layout: ImageLayout,
    last_batch: Option<usize>,
}

impl ResourceSyncState {
    fn initial() -> Self {
        Self { stage: Stage::TopOfPipe, access: AccessFlags::empty(), layout: ImageLayout::Undefined, last_batch: None }
    }
}

fn space_rank(space: HandleSpace) -> u8 {
    match space {
        HandleSpace::Buffer => 0,
        HandleSpace::Image => 1,
        HandleSpace::Blas => 2,
        HandleSpace::Tlas => 3,
    }
}

struct Aggregated {
    handle: Handle,
    stage: Stage,
    access: AccessFlags,
    layout: Option<ImageLayout>,
    buffer_range: Option<(u64, u64)>,
}

/// Unions every attachment in a batch onto its resource, computing the
/// aggregated incoming access set from each attachment's effective stage and
/// access. Rejects a batch where two attachments on the same image disagree
/// on required layout, reporting it rather than guessing intent — see
/// DESIGN.md.
fn build_aggregated(tasks: &[Task], batch: &Batch) -> Result<Vec<Aggregated>, GraphError> {
    let mut by_handle: HashMap<Handle, Aggregated> = HashMap::new();

    for &task_index in &batch.task_indices {
        for attachment in &tasks[task_index].attachments {
            let handle = attachment.view.handle();
            let inferred_layout =
                (handle.space == HandleSpace::Image).then(|| infer_layout(attachment.stage, attachment.access));
            let buffer_range = match attachment.view {
                crate::resource::ResourceView::Buffer { offset, size, .. } => Some((offset, size)),
                _ => None,
            };

            match by_handle.get_mut(&handle) {
                Some(entry) => {
                    entry.stage = entry.stage.combine(attachment.stage);
                    entry.access |= attachment.access;
                    if let (Some(existing), Some(incoming)) = (entry.layout, inferred_layout) {
                        if existing != incoming {
                            return Err(GraphError::LayoutConflict {
                                space: handle.space,
                                index: handle.index,
                                a: existing,
                                b: incoming,
                            });
                        }
                    }
                    if entry.layout.is_none() {
                        entry.layout = inferred_layout;
                    }
                    if entry.buffer_range.is_none() {
                        entry.buffer_range = buffer_range;
                    }
                }
                None => {
                    by_handle.insert(handle, Aggregated { handle, stage: attachment.stage, access: attachment.access, layout: inferred_layout, buffer_range });
                }
            }
        }
    }

    let mut aggregated: Vec<Aggregated> = by_handle.into_values().collect();
    // Deterministic order (spec testable property 4: idempotence) independent
    // of `HashMap`'s iteration order.
    aggregated.sort_by_key(|a| (space_rank(a.handle.space), a.handle.index));
    Ok(aggregated)
}

/// Derives per-batch pre-barriers and post-release barriers in a single
/// forward pass over the already-finalized batch list, choosing single vs
/// split form per the split-barrier heuristic below.
pub fn plan_synchronization(tasks: &[Task], batches: &mut [Batch], use_split_barriers: bool) -> Result<(), GraphError> {
    let mut states: HashMap<Handle, ResourceSyncState> = HashMap::new();

    for batch_index in 0..batches.len() {
        let aggregated = build_aggregated(tasks, &batches[batch_index])?;

        for entry in aggregated {
            let state = *states.entry(entry.handle).or_insert_with(ResourceSyncState::initial);

            let is_image = entry.handle.space == HandleSpace::Image;
            let new_layout = entry.layout.unwrap_or(state.layout);
            let layout_changed = is_image && state.layout != new_layout;
            let needs_barrier = state.access.is_write() || entry.access.is_write() || layout_changed;

            if needs_barrier {
                let target = match entry.handle.space {
                    HandleSpace::Image => BarrierTarget::Image { handle: entry.handle, old_layout: state.layout, new_layout },
                    HandleSpace::Buffer => {
                        let (offset, size) = entry.buffer_range.unwrap_or((0, u64::MAX));
                        BarrierTarget::Buffer { handle: entry.handle, offset, size }
                    }
                    HandleSpace::Blas | HandleSpace::Tlas => BarrierTarget::AccelerationStructure { handle: entry.handle },
                };

                let barrier = Barrier {
                    src_stage: state.stage,
                    dst_stage: entry.stage,
                    src_access: state.access,
                    dst_access: entry.access,
                    target,
                    split: SplitRole::None,
                };

                let concurrent_either = state.access.is_concurrent() || entry.access.is_concurrent();
                let expensive = is_image && is_expensive_layout_transition(state.layout, new_layout);
                let far_apart = state.stage.distance(entry.stage) > 3;

                let split_eligible = use_split_barriers
                    && !concurrent_either
                    && (far_apart || expensive)
                    && state
                        .last_batch
                        .is_some_and(|producer| batches[producer].task_indices.len() >= 5)
                    && batches[batch_index].task_indices.len() >= 5;

                if split_eligible {
                    let producer = state.last_batch.expect("split_eligible implies a producer batch");
                    batches[producer].post_release_barriers.push(Barrier { split: SplitRole::Release, ..barrier });
                    batches[batch_index].pre_barriers.push(Barrier { split: SplitRole::Acquire, ..barrier });
                } else {
                    batches[batch_index].pre_barriers.push(barrier);
                }
            }

            states.insert(
                entry.handle,
                ResourceSyncState { stage: entry.stage, access: entry.access, layout: new_layout, last_batch: Some(batch_index) },
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::analyze;
    use crate::batch::plan_batches;
    use crate::registry::ResourceRegistry;
    use crate::resource::ResourceView;
    use crate::task::{Attachment, TaskKind};
    use pyre_rhi::BufferDesc;

    #[test]
    fn read_after_write_emits_one_buffer_barrier() {
        let mut registry = ResourceRegistry::default();
        let view = registry
            .create_transient_buffer(BufferDesc::new_gpu_only(64, ash::vk::BufferUsageFlags::STORAGE_BUFFER), "b")
            .unwrap();

        let mut t0 = Task::new("w", TaskKind::Compute);
        t0.attachments.push(Attachment { name: "w".into(), access: AccessFlags::write(), stage: Stage::Compute, view });
        let mut t1 = Task::new("r", TaskKind::Compute);
        t1.attachments.push(Attachment { name: "r".into(), access: AccessFlags::read(), stage: Stage::Compute, view });

        let tasks = vec![t0, t1];
        let deps = analyze(&registry, &tasks, false).unwrap();
        let mut batches = plan_batches(&mut registry, &tasks, &deps, false, false, false);
        plan_synchronization(&tasks, &mut batches, false).unwrap();

        assert_eq!(batches[0].pre_barriers.len(), 0);
        assert_eq!(batches[1].pre_barriers.len(), 1);
        assert!(batches[1].pre_barriers[0].src_access.is_write());
        assert!(batches[1].pre_barriers[0].dst_access.is_read());
    }

    #[test]
    fn two_reads_of_same_buffer_emit_no_barrier() {
        let mut registry = ResourceRegistry::default();
        let view = registry
            .create_transient_buffer(BufferDesc::new_gpu_only(64, ash::vk::BufferUsageFlags::STORAGE_BUFFER), "b")
            .unwrap();

        let mut t0 = Task::new("r0", TaskKind::Compute);
        t0.attachments.push(Attachment { name: "r".into(), access: AccessFlags::read(), stage: Stage::Compute, view });
        let mut t1 = Task::new("r1", TaskKind::Transfer);
        t1.attachments.push(Attachment { name: "r".into(), access: AccessFlags::read(), stage: Stage::Transfer, view });

        let tasks = vec![t0, t1];
        let deps = analyze(&registry, &tasks, false).unwrap();
        let mut batches = plan_batches(&mut registry, &tasks, &deps, false, false, false);
        plan_synchronization(&tasks, &mut batches, false).unwrap();

        assert!(batches.iter().all(|b| b.pre_barriers.is_empty()));
    }

    #[test]
    fn conflicting_layouts_in_one_batch_are_rejected() {
        let mut registry = ResourceRegistry::default();
        let desc = pyre_rhi::ImageDesc::new_2d([64, 64], ash::vk::Format::R8G8B8A8_UNORM);
        let view = registry.create_transient_image(desc, "img").unwrap();

        let mut t0 = Task::new("mixed", TaskKind::Raster);
        t0.attachments.push(Attachment { name: "color".into(), access: AccessFlags::write(), stage: Stage::ColorAttachment, view });
        t0.attachments.push(Attachment { name: "sample".into(), access: AccessFlags::sampled(), stage: Stage::Fragment, view });

        let tasks = vec![t0];
        let deps = analyze(&registry, &tasks, false).unwrap();
        let mut batches = plan_batches(&mut registry, &tasks, &deps, false, false, false);

        assert!(matches!(plan_synchronization(&tasks, &mut batches, false), Err(GraphError::LayoutConflict { .. })));
    }
}
