//! Black-box render-graph scenarios, exercised against `pyre_rg::plan` rather
//! than the full `RenderGraph`: `plan` covers analysis, batching, and
//! synchronization without touching a device, which is the only part of this
//! test pack that can run without a real GPU. The multi-GPU fan-out scenario
//! is covered as a unit test next to `task_gpu_mask_excludes` in
//! `executor.rs` for the same reason.

use ash::vk;
use pyre_rg::{AccessFlags, GraphOptions, ResourceRegistry, Stage, Task, TaskKind};
use pyre_rhi::{BufferDesc, ImageDesc};

fn options(use_split_barriers: bool, enable_aliasing: bool) -> GraphOptions {
    GraphOptions {
        enable_reordering: false,
        enable_aliasing,
        use_split_barriers,
        enable_multi_queue: false,
        enable_batch_merging: false,
        ..GraphOptions::default()
    }
}

fn attach(task: &mut Task, name: &str, access: AccessFlags, stage: Stage, view: pyre_rg::ResourceView) {
    task.attachments.push(pyre_rg::Attachment { name: name.into(), access, stage, view });
}

/// S1 - read-after-write on a buffer.
#[test]
fn s1_read_after_write_forces_two_batches_with_one_barrier() {
    let mut registry = ResourceRegistry::default();
    let view = registry
        .create_transient_buffer(BufferDesc::new_gpu_only(256, vk::BufferUsageFlags::STORAGE_BUFFER), "b")
        .unwrap();

    let mut t1 = Task::new("write_b", TaskKind::Compute);
    attach(&mut t1, "w", AccessFlags::write(), Stage::Compute, view);
    let mut t2 = Task::new("read_b", TaskKind::Compute);
    attach(&mut t2, "r", AccessFlags::read(), Stage::Compute, view);

    let output = pyre_rg::plan(&mut registry, &[t1, t2], &options(false, false)).unwrap();

    assert_eq!(output.batches.len(), 2);
    assert!(output.batches[0].pre_barriers.is_empty());
    assert_eq!(output.batches[1].pre_barriers.len(), 1);
    let barrier = &output.batches[1].pre_barriers[0];
    assert!(barrier.src_access.is_write());
    assert!(barrier.dst_access.is_read());
    assert!(matches!(barrier.target, pyre_rg::BarrierTarget::Buffer { handle, .. } if handle == view.handle()));
}

/// S2 - sampled read of a color attachment: large enough producer/consumer
/// batches to clear the split-barrier eligibility threshold in `sync.rs`, so
/// the color-attachment write release and the fragment-shader read acquire
/// land as two halves of a split barrier rather than one combined barrier.
#[test]
fn s2_sampled_read_of_color_attachment_uses_a_split_barrier() {
    let mut registry = ResourceRegistry::default();
    let image = registry.create_transient_image(ImageDesc::new_2d([64, 64], vk::Format::R8G8B8A8_UNORM), "i").unwrap();

    let filler_desc = || BufferDesc::new_gpu_only(64, vk::BufferUsageFlags::STORAGE_BUFFER);

    let mut tasks = Vec::new();

    let mut t1 = Task::new("raster_color", TaskKind::Raster);
    attach(&mut t1, "color", AccessFlags::write(), Stage::ColorAttachment, image);
    tasks.push(t1);

    for i in 0..4 {
        let view = registry.create_transient_buffer(filler_desc(), format!("producer_filler_{i}")).unwrap();
        let mut filler = Task::new(format!("producer_filler_{i}"), TaskKind::Raster);
        // A first-ever read (never written) needs no barrier, so these only
        // pad the batch to the split-barrier size threshold without adding
        // barriers of their own.
        attach(&mut filler, "r", AccessFlags::read(), Stage::Vertex, view);
        tasks.push(filler);
    }

    let mut t2 = Task::new("sample_i", TaskKind::Raster);
    attach(&mut t2, "sample", AccessFlags::sampled(), Stage::Fragment, image);
    tasks.push(t2);

    for i in 0..4 {
        let view = registry.create_transient_buffer(filler_desc(), format!("consumer_filler_{i}")).unwrap();
        let mut filler = Task::new(format!("consumer_filler_{i}"), TaskKind::Raster);
        attach(&mut filler, "r", AccessFlags::read(), Stage::Vertex, view);
        tasks.push(filler);
    }

    let output = pyre_rg::plan(&mut registry, &tasks, &options(true, false)).unwrap();

    assert_eq!(output.batches.len(), 2);
    assert_eq!(output.batches[0].task_indices.len(), 5);
    assert_eq!(output.batches[1].task_indices.len(), 5);

    let release = &output.batches[0].post_release_barriers;
    let acquire = &output.batches[1].pre_barriers;
    assert_eq!(release.len(), 1);
    assert_eq!(acquire.len(), 1);
    assert!(release[0].is_release());
    assert!(acquire[0].is_acquire());
    assert!(matches!(
        release[0].target,
        pyre_rg::BarrierTarget::Image { old_layout: pyre_rg::ImageLayout::ColorAttachmentOptimal, new_layout: pyre_rg::ImageLayout::ShaderReadOnlyOptimal, .. }
    ));
}

/// S3 - concurrent writes to disjoint offsets of the same buffer share one
/// batch and need no barrier between them.
#[test]
fn s3_concurrent_writes_share_one_batch_without_a_barrier() {
    let mut registry = ResourceRegistry::default();
    let buffer =
        registry.create_transient_buffer(BufferDesc::new_gpu_only(256, vk::BufferUsageFlags::STORAGE_BUFFER), "b").unwrap();
    let front = pyre_rg::ResourceView::Buffer { handle: buffer.handle(), offset: 0, size: 128 };
    let back = pyre_rg::ResourceView::Buffer { handle: buffer.handle(), offset: 128, size: 128 };

    let mut t1 = Task::new("write_front", TaskKind::Compute);
    attach(&mut t1, "w", AccessFlags::concurrent_write(), Stage::Compute, front);
    let mut t2 = Task::new("write_back", TaskKind::Compute);
    attach(&mut t2, "w", AccessFlags::concurrent_write(), Stage::Compute, back);

    let output = pyre_rg::plan(&mut registry, &[t1, t2], &options(false, false)).unwrap();

    assert_eq!(output.batches.len(), 1);
    assert_eq!(output.batches[0].task_indices, vec![0, 1]);
    assert!(output.batches[0].pre_barriers.is_empty());
}

/// S4 - two equally-sized transient images with non-overlapping batch
/// lifetimes end up bound to the same memory offset once aliasing is
/// enabled. A shared fence buffer written by both tasks forces the batch
/// planner to place them in separate batches, so their lifetime windows
/// don't touch.
#[test]
fn s4_non_overlapping_transient_images_alias_the_same_offset() {
    let mut registry = ResourceRegistry::default();
    let desc = ImageDesc::new_2d([128, 128], vk::Format::R8G8B8A8_UNORM);
    let i1 = registry.create_transient_image(desc, "i1").unwrap();
    let i2 = registry.create_transient_image(desc, "i2").unwrap();
    let fence = registry
        .create_transient_buffer(BufferDesc::new_gpu_only(16, vk::BufferUsageFlags::STORAGE_BUFFER), "fence")
        .unwrap();

    let mut t1 = Task::new("use_i1", TaskKind::Compute);
    attach(&mut t1, "w", AccessFlags::write(), Stage::Compute, i1);
    attach(&mut t1, "fence", AccessFlags::write(), Stage::Compute, fence);

    let mut t2 = Task::new("use_i2", TaskKind::Compute);
    attach(&mut t2, "w", AccessFlags::write(), Stage::Compute, i2);
    attach(&mut t2, "fence", AccessFlags::write(), Stage::Compute, fence);

    let output = pyre_rg::plan(&mut registry, &[t1, t2], &options(false, true)).unwrap();
    assert_eq!(output.batches.len(), 2, "the shared fence write must force two batches");

    let a1 = output.transient_plan.image_allocations[&i1.handle().index];
    let a2 = output.transient_plan.image_allocations[&i2.handle().index];
    assert_eq!(a1.pool, a2.pool);
    assert_eq!(a1.offset, a2.offset);
}

/// S5 - a disabled middle task is skipped entirely by the condition vector,
/// and the tasks around it still see correct plan output since disabling a
/// task happens at record time, not at compile time.
#[test]
fn s5_disabled_task_is_skipped_by_condition_vector_at_record_time() {
    let mut registry = ResourceRegistry::default();
    let view = registry
        .create_transient_buffer(BufferDesc::new_gpu_only(64, vk::BufferUsageFlags::STORAGE_BUFFER), "b")
        .unwrap();

    let mut t0 = Task::new("first", TaskKind::Compute);
    attach(&mut t0, "w", AccessFlags::write(), Stage::Compute, view);

    let mut t1 = Task::new("middle", TaskKind::Compute);
    t1.condition_mask = 1;
    t1.condition_value = 1;
    attach(&mut t1, "r", AccessFlags::read(), Stage::Compute, view);

    let mut t2 = Task::new("last", TaskKind::Compute);
    attach(&mut t2, "r", AccessFlags::read(), Stage::Compute, view);

    let tasks = vec![t0, t1, t2];
    let condition_vector = 0u32;
    assert!(tasks[0].is_enabled(condition_vector));
    assert!(!tasks[1].is_enabled(condition_vector));
    assert!(tasks[2].is_enabled(condition_vector));

    // Batching/sync plans over every declared task regardless of condition
    // vector; `executor::record` is what skips a disabled task at record
    // time, which is covered by its own `batch_is_enabled`/`is_enabled`
    // checks in `executor.rs`.
    let output = pyre_rg::plan(&mut registry, &tasks, &options(false, false)).unwrap();
    assert!(!output.batches.is_empty());
}

/// Strict validation mode rejects an unannotated write-write hazard instead
/// of silently serializing it via a hazard edge.
#[test]
fn strict_validation_rejects_unannotated_write_write_hazard() {
    let mut registry = ResourceRegistry::default();
    let view = registry
        .create_transient_buffer(BufferDesc::new_gpu_only(64, vk::BufferUsageFlags::STORAGE_BUFFER), "b")
        .unwrap();

    let mut t0 = Task::new("w0", TaskKind::Compute);
    attach(&mut t0, "w", AccessFlags::write(), Stage::Compute, view);
    let mut t1 = Task::new("w1", TaskKind::Compute);
    attach(&mut t1, "w", AccessFlags::write(), Stage::Compute, view);

    let mut strict_options = options(false, false);
    strict_options.strict_validation = true;

    let result = pyre_rg::plan(&mut registry, &[t0, t1], &strict_options);
    assert!(matches!(result, Err(pyre_rg::GraphError::WriteConflict)));
}
