use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use crate::analyzer::DependencyGraph;
use crate::barrier::Barrier;
use crate::handle::Handle;
use crate::registry::ResourceRegistry;
use crate::task::{Task, TaskKind};

/// One group of tasks recorded together with no barrier between them.
/// `pre_barriers`/`post_release_barriers` start empty — the Synchronization
/// Planner fills them in as a pass over the already-finalized batch list.
#[derive(Clone, Debug, Default)]
pub struct Batch {
    pub task_indices: Vec<usize>,
    pub queue_index: u32,
    pub pre_barriers: Vec<Barrier>,
    pub post_release_barriers: Vec<Barrier>,
}

struct OpenBatch {
    task_indices: Vec<usize>,
    write_set: HashSet<Handle>,
    queue: u32,
}

/// Tie-break rank for reordering within a batch: prefer transfer before
/// compute before raster. `General`/`RayTracing` have no canonical place in
/// that ordering; placed after compute and before raster respectively as a
/// reasoned default (see DESIGN.md).
fn kind_rank(kind: TaskKind) -> u32 {
    match kind {
        TaskKind::Transfer => 0,
        TaskKind::Compute => 1,
        TaskKind::General => 2,
        TaskKind::RayTracing => 3,
        TaskKind::Raster => 4,
    }
}

/// Greedy batching pass, followed by optional intra-batch reordering and
/// optional adjacent-batch merging. Resource lifetime windows
/// are touched here, after batch indices are final, rather than in the
/// Dependency Analyzer — see `analyzer.rs`'s module doc for why.
pub fn plan_batches(
    registry: &mut ResourceRegistry,
    tasks: &[Task],
    dependency_graph: &DependencyGraph,
    enable_reordering: bool,
    enable_batch_merging: bool,
    enable_multi_queue: bool,
) -> Vec<Batch> {
    let raw_batches = greedy_batch(tasks, enable_multi_queue);

    let ordered_batches: Vec<Vec<usize>> = raw_batches
        .into_iter()
        .map(|indices| {
            if enable_reordering {
                reorder_batch(&indices, tasks, &dependency_graph.edges)
            } else {
                indices
            }
        })
        .collect();

    let queues: Vec<u32> = tasks_to_queue_per_batch(&ordered_batches, tasks, enable_multi_queue);

    let merged = if enable_batch_merging {
        merge_adjacent_batches(ordered_batches, &queues, &dependency_graph.edges)
    } else {
        ordered_batches.into_iter().zip(queues.iter().copied()).collect()
    };

    let mut batches = Vec::with_capacity(merged.len());
    for (batch_index, (task_indices, queue_index)) in merged.into_iter().enumerate() {
        for &task_index in &task_indices {
            for attachment in &tasks[task_index].attachments {
                registry.touch_lifetime(attachment.view.handle(), batch_index as u32, queue_index);
            }
        }
        batches.push(Batch { task_indices, queue_index, pre_barriers: Vec::new(), post_release_barriers: Vec::new() });
    }
    batches
}

fn greedy_batch(tasks: &[Task], enable_multi_queue: bool) -> Vec<Vec<usize>> {
    let mut batches = Vec::new();
    let mut open: Option<OpenBatch> = None;

    for (task_index, task) in tasks.iter().enumerate() {
        let queue = task.kind.queue_index(enable_multi_queue);

        let hazard_with_open = open
            .as_ref()
            .map(|batch| task.attachments.iter().any(|a| batch.write_set.contains(&a.view.handle())))
            .unwrap_or(false);
        let queue_mismatch = open.as_ref().map(|batch| batch.queue != queue).unwrap_or(false);

        if hazard_with_open || queue_mismatch {
            let closed = open.take().unwrap();
            batches.push(closed.task_indices);
        }

        let batch = open.get_or_insert_with(|| OpenBatch { task_indices: Vec::new(), write_set: HashSet::new(), queue });
        batch.task_indices.push(task_index);
        for write in task.writes() {
            batch.write_set.insert(write.view.handle());
        }
    }

    if let Some(batch) = open.take() {
        batches.push(batch.task_indices);
    }

    batches
}

fn tasks_to_queue_per_batch(batches: &[Vec<usize>], tasks: &[Task], enable_multi_queue: bool) -> Vec<u32> {
    batches
        .iter()
        .map(|indices| {
            let first = indices.first().copied().expect("batches are never empty");
            tasks[first].kind.queue_index(enable_multi_queue)
        })
        .collect()
}

/// Topologically sorts one batch's tasks by the intra-batch hazard
/// sub-graph, breaking ties by [`kind_rank`] then declaration order — both
/// of which are fixed inputs, so the result is deterministic across runs
/// (spec testable property 4).
fn reorder_batch(task_indices: &[usize], tasks: &[Task], edges: &[crate::analyzer::HazardEdge]) -> Vec<usize> {
    let members: HashSet<usize> = task_indices.iter().copied().collect();

    let mut indegree: HashMap<usize, u32> = task_indices.iter().map(|&i| (i, 0)).collect();
    let mut successors: HashMap<usize, Vec<usize>> = HashMap::new();
    for edge in edges {
        if members.contains(&edge.from) && members.contains(&edge.to) {
            *indegree.get_mut(&edge.to).expect("edge endpoint in batch") += 1;
            successors.entry(edge.from).or_default().push(edge.to);
        }
    }

    let mut ready: BinaryHeap<Reverse<(u32, usize)>> = BinaryHeap::new();
    for &index in task_indices {
        if indegree[&index] == 0 {
            ready.push(Reverse((kind_rank(tasks[index].kind), index)));
        }
    }

    let mut order = Vec::with_capacity(task_indices.len());
    while let Some(Reverse((_, index))) = ready.pop() {
        order.push(index);
        if let Some(succs) = successors.get(&index) {
            for &succ in succs {
                let entry = indegree.get_mut(&succ).expect("successor tracked");
                *entry -= 1;
                if *entry == 0 {
                    ready.push(Reverse((kind_rank(tasks[succ].kind), succ)));
                }
            }
        }
    }

    debug_assert_eq!(order.len(), task_indices.len(), "hazard sub-graph must be acyclic");
    order
}

/// Merges adjacent batches sharing a queue when no task in the later batch
/// depends on a task in the earlier one. Barrier deduplication is deferred
/// to the Synchronization Planner, since no barriers exist yet at this
/// stage — see DESIGN.md.
fn merge_adjacent_batches(
    batches: Vec<Vec<usize>>,
    queues: &[u32],
    edges: &[crate::analyzer::HazardEdge],
) -> Vec<(Vec<usize>, u32)> {
    if batches.is_empty() {
        return Vec::new();
    }

    let mut merged: Vec<(Vec<usize>, u32)> = vec![(batches[0].clone(), queues[0])];

    for i in 1..batches.len() {
        let next_indices = &batches[i];
        let next_queue = queues[i];
        let (prev_indices, prev_queue) = merged.last_mut().unwrap();

        let same_queue = *prev_queue == next_queue;
        let depends = edges.iter().any(|e| prev_indices.contains(&e.from) && next_indices.contains(&e.to));

        if same_queue && !depends {
            prev_indices.extend_from_slice(next_indices);
        } else {
            merged.push((next_indices.clone(), next_queue));
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{AccessFlags, Stage};
    use crate::analyzer::analyze;
    use crate::resource::ResourceView;
    use crate::task::Attachment;
    use pyre_rhi::BufferDesc;

    fn buffer_view(registry: &mut ResourceRegistry) -> ResourceView {
        registry
            .create_transient_buffer(BufferDesc::new_gpu_only(64, ash::vk::BufferUsageFlags::STORAGE_BUFFER), "b")
            .unwrap()
    }

    #[test]
    fn read_after_write_forces_two_batches() {
        let mut registry = ResourceRegistry::default();
        let view = buffer_view(&mut registry);

        let mut t0 = Task::new("w", TaskKind::Compute);
        t0.attachments.push(Attachment { name: "w".into(), access: AccessFlags::write(), stage: Stage::Compute, view });
        let mut t1 = Task::new("r", TaskKind::Compute);
        t1.attachments.push(Attachment { name: "r".into(), access: AccessFlags::read(), stage: Stage::Compute, view });

        let tasks = vec![t0, t1];
        let deps = analyze(&registry, &tasks, false).unwrap();
        let batches = plan_batches(&mut registry, &tasks, &deps, false, false, false);

        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].task_indices, vec![0]);
        assert_eq!(batches[1].task_indices, vec![1]);
    }

    #[test]
    fn concurrent_writes_share_one_batch() {
        let mut registry = ResourceRegistry::default();
        let view = buffer_view(&mut registry);

        let mut t0 = Task::new("w0", TaskKind::Compute);
        t0.attachments.push(Attachment { name: "w".into(), access: AccessFlags::concurrent_write(), stage: Stage::Compute, view });
        let mut t1 = Task::new("w1", TaskKind::Compute);
        t1.attachments.push(Attachment { name: "w".into(), access: AccessFlags::concurrent_write(), stage: Stage::Compute, view });

        let tasks = vec![t0, t1];
        let deps = analyze(&registry, &tasks, false).unwrap();
        let batches = plan_batches(&mut registry, &tasks, &deps, false, false, false);

        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].task_indices, vec![0, 1]);
    }

    #[test]
    fn unrelated_tasks_batch_together_and_touch_lifetime() {
        let mut registry = ResourceRegistry::default();
        let view_a = buffer_view(&mut registry);
        let view_b = buffer_view(&mut registry);

        let mut t0 = Task::new("a", TaskKind::Compute);
        t0.attachments.push(Attachment { name: "w".into(), access: AccessFlags::write(), stage: Stage::Compute, view: view_a });
        let mut t1 = Task::new("b", TaskKind::Compute);
        t1.attachments.push(Attachment { name: "w".into(), access: AccessFlags::write(), stage: Stage::Compute, view: view_b });

        let tasks = vec![t0, t1];
        let deps = analyze(&registry, &tasks, false).unwrap();
        let batches = plan_batches(&mut registry, &tasks, &deps, false, false, false);

        assert_eq!(batches.len(), 1);
        assert!(registry.buffers[view_a.handle().index as usize].lifetime.is_used());
        assert!(registry.buffers[view_b.handle().index as usize].lifetime.is_used());
    }
}
