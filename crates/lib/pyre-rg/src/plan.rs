use crate::batch::{self, Batch};
use crate::error::GraphError;
use crate::options::GraphOptions;
use crate::registry::ResourceRegistry;
use crate::task::Task;
use crate::transient_allocator::{self, TransientAllocationPlan};
use crate::{analyzer, sync};

/// The device-independent portion of `compile()`: dependency analysis,
/// batching, synchronization planning, and transient-allocation *planning*
/// (not binding). Exposed separately from `RenderGraph::compile` so this
/// idempotent, deterministic core can be exercised without a live device —
/// `RenderGraph` calls this same function internally before handing the
/// transient plan to `transient_allocator::bind`.
pub struct PlanOutput {
    pub batches: Vec<Batch>,
    pub transient_plan: TransientAllocationPlan,
}

pub fn plan(registry: &mut ResourceRegistry, tasks: &[Task], options: &GraphOptions) -> Result<PlanOutput, GraphError> {
    let dependency_graph = analyzer::analyze(registry, tasks, options.strict_validation)?;
    let mut batches = batch::plan_batches(
        registry,
        tasks,
        &dependency_graph,
        options.enable_reordering,
        options.enable_batch_merging,
        options.enable_multi_queue,
    );
    sync::plan_synchronization(tasks, &mut batches, options.use_split_barriers)?;
    let transient_plan = transient_allocator::plan_transient_allocation(registry, options.enable_aliasing);

    Ok(PlanOutput { batches, transient_plan })
}
