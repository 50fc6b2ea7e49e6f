use crate::batch::Batch;

/// Output of `RenderGraph::compile()`: the finalized batch list plus the
/// device memory backing transient resources. Held by the graph until the
/// next `compile()` call or the graph's own destruction, at which point the
/// pool allocations are returned to the device.
#[derive(Default)]
pub struct CompiledGraph {
    pub batches: Vec<Batch>,
    pub pool_allocations: Vec<pyre_rhi::Allocation>,
}
