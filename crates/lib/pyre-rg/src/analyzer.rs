use crate::access::AccessFlags;
use crate::error::GraphError;
use crate::handle::Handle;
use crate::registry::ResourceRegistry;
use crate::task::Task;

/// A directed hazard edge `a -> b`: task `b` must not be reordered ahead of
/// task `a`, and if they end up in the same batch, they must not be
/// reordered relative to each other either.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HazardEdge {
    pub from: usize,
    pub to: usize,
}

/// Output of the Dependency Analyzer: the hazard graph consumed by the Batch
/// Planner. Lifetime windows are defined in terms of `first_use_batch`/
/// `last_use_batch`, but no batch assignment exists yet at analysis time;
/// this crate resolves that ordering by having the Batch Planner call back
/// into the registry to touch each resource's window as it assigns batch
/// indices (see DESIGN.md's Open Question log). The Analyzer's job is purely
/// validation plus hazard-edge construction from declaration order.
pub struct DependencyGraph {
    pub edges: Vec<HazardEdge>,
}

/// One per-resource record of every task that attached to it so far, in
/// declaration order. Kept flat (not indexed by hazard kind) since the
/// number of attachments to a single transient resource within one frame is
/// small.
fn hazards(prev: AccessFlags, next: AccessFlags) -> bool {
    let prev_write = prev.is_write();
    let next_write = next.is_write();

    if prev_write && next_write {
        return !(prev.is_concurrent() && next.is_concurrent());
    }
    if prev_write && next.is_read() {
        return true;
    }
    if prev.is_read() && next_write {
        return true;
    }
    false
}

/// A write-write hazard without a declared `concurrent` flag on both sides.
/// Distinct from [`hazards`]: every write-write hazard also triggers
/// [`hazards`] (it still needs its ordering edge even in strict mode), but
/// only this narrower case is what strict validation rejects outright. A
/// read/write ordering hazard is still resolved correctly by the edge alone.
fn write_write_conflict(prev: AccessFlags, next: AccessFlags) -> bool {
    prev.is_write() && next.is_write() && !(prev.is_concurrent() && next.is_concurrent())
}

/// Single linear pass validating every attachment's handle, plus a second
/// pass (still O(tasks × attachments-per-resource), not a separate full
/// traversal) building the hazard graph. Spec's two "passes" are folded into
/// one loop here since both only need forward knowledge of prior attachments
/// to the same resource. `strict` rejects an unannotated write-write hazard
/// as `GraphError::WriteConflict` instead of silently ordering it.
pub fn analyze(registry: &ResourceRegistry, tasks: &[Task], strict: bool) -> Result<DependencyGraph, GraphError> {
    let mut edges = Vec::new();
    let mut last_attachments: std::collections::HashMap<Handle, Vec<(usize, AccessFlags)>> = std::collections::HashMap::new();

    for (task_index, task) in tasks.iter().enumerate() {
        for attachment in &task.attachments {
            let handle = attachment.view.handle();
            registry.validate(handle)?;

            if let Some(history) = last_attachments.get(&handle) {
                for &(prev_index, prev_access) in history {
                    if strict && write_write_conflict(prev_access, attachment.access) {
                        return Err(GraphError::WriteConflict);
                    }
                    if hazards(prev_access, attachment.access) {
                        edges.push(HazardEdge { from: prev_index, to: task_index });
                    }
                }
            }

            last_attachments.entry(handle).or_default().push((task_index, attachment.access));
        }
    }

    Ok(DependencyGraph { edges })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::Stage;
    use crate::resource::{GpuMask, ResourceView};
    use crate::task::TaskKind;
    use pyre_rhi::BufferDesc;

    fn buffer_view(registry: &mut ResourceRegistry) -> ResourceView {
        registry
            .create_transient_buffer(BufferDesc::new_gpu_only(256, ash::vk::BufferUsageFlags::STORAGE_BUFFER), "b")
            .unwrap()
    }

    #[test]
    fn write_then_read_produces_hazard_edge() {
        let mut registry = ResourceRegistry::default();
        let view = buffer_view(&mut registry);

        let mut t0 = Task::new("writer", TaskKind::Compute);
        t0.attachments.push(crate::task::Attachment { name: "w".into(), access: AccessFlags::write(), stage: Stage::Compute, view });
        let mut t1 = Task::new("reader", TaskKind::Compute);
        t1.attachments.push(crate::task::Attachment { name: "r".into(), access: AccessFlags::read(), stage: Stage::Compute, view });

        let graph = analyze(&registry, &[t0, t1], false).unwrap();
        assert_eq!(graph.edges, vec![HazardEdge { from: 0, to: 1 }]);
    }

    #[test]
    fn two_reads_never_conflict() {
        let mut registry = ResourceRegistry::default();
        let view = buffer_view(&mut registry);

        let mut t0 = Task::new("r0", TaskKind::Compute);
        t0.attachments.push(crate::task::Attachment { name: "r".into(), access: AccessFlags::read(), stage: Stage::Compute, view });
        let mut t1 = Task::new("r1", TaskKind::Compute);
        t1.attachments.push(crate::task::Attachment { name: "r".into(), access: AccessFlags::read(), stage: Stage::Compute, view });

        let graph = analyze(&registry, &[t0, t1], false).unwrap();
        assert!(graph.edges.is_empty());
    }

    #[test]
    fn concurrent_writes_remove_the_write_write_edge() {
        let mut registry = ResourceRegistry::default();
        let view = buffer_view(&mut registry);

        let mut t0 = Task::new("w0", TaskKind::Compute);
        t0.attachments.push(crate::task::Attachment { name: "w".into(), access: AccessFlags::concurrent_write(), stage: Stage::Compute, view });
        let mut t1 = Task::new("w1", TaskKind::Compute);
        t1.attachments.push(crate::task::Attachment { name: "w".into(), access: AccessFlags::concurrent_write(), stage: Stage::Compute, view });

        let graph = analyze(&registry, &[t0, t1], false).unwrap();
        assert!(graph.edges.is_empty());
    }

    #[test]
    fn stale_handle_is_rejected() {
        let mut registry = ResourceRegistry::default();
        let view = buffer_view(&mut registry);
        registry.bump_generation(view.handle().space, view.handle().index);

        let mut t0 = Task::new("stale", TaskKind::Compute);
        t0.attachments.push(crate::task::Attachment { name: "r".into(), access: AccessFlags::read(), stage: Stage::Compute, view });

        assert!(matches!(analyze(&registry, &[t0], false), Err(GraphError::StaleHandle { .. })));
    }

    #[test]
    fn strict_mode_rejects_unannotated_write_write_hazard() {
        let mut registry = ResourceRegistry::default();
        let view = buffer_view(&mut registry);

        let mut t0 = Task::new("w0", TaskKind::Compute);
        t0.attachments.push(crate::task::Attachment { name: "w".into(), access: AccessFlags::write(), stage: Stage::Compute, view });
        let mut t1 = Task::new("w1", TaskKind::Compute);
        t1.attachments.push(crate::task::Attachment { name: "w".into(), access: AccessFlags::write(), stage: Stage::Compute, view });

        assert!(matches!(analyze(&registry, &[t0, t1], true), Err(GraphError::WriteConflict)));
    }

    #[test]
    fn strict_mode_allows_declared_concurrent_writes() {
        let mut registry = ResourceRegistry::default();
        let view = buffer_view(&mut registry);

        let mut t0 = Task::new("w0", TaskKind::Compute);
        t0.attachments.push(crate::task::Attachment { name: "w".into(), access: AccessFlags::concurrent_write(), stage: Stage::Compute, view });
        let mut t1 = Task::new("w1", TaskKind::Compute);
        t1.attachments.push(crate::task::Attachment { name: "w".into(), access: AccessFlags::concurrent_write(), stage: Stage::Compute, view });

        assert!(analyze(&registry, &[t0, t1], true).is_ok());
    }
}
