/// Construction-time configuration: a plain `Default`-able struct the host
/// fills in partially and passes to `create`.
#[derive(Clone, Copy, Debug)]
pub struct GraphOptions {
    /// Topologically reorder each batch's tasks by the intra-batch hazard
    /// sub-graph, preferring transfer before compute before raster among
    /// ties.
    pub enable_reordering: bool,
    /// Run the Transient Allocator's pool-packing mode instead of giving
    /// every transient resource its own dedicated allocation.
    pub enable_aliasing: bool,
    /// Emit release/acquire barrier pairs instead of single barriers when
    /// the split-barrier heuristic applies.
    pub use_split_barriers: bool,
    /// Route transfer-kind tasks onto a second queue index.
    pub enable_multi_queue: bool,
    /// Merge adjacent batches sharing a queue when nothing in the later one
    /// depends on the earlier.
    pub enable_batch_merging: bool,
    /// Size in bytes of the scratch slice handed to `TaskInterface` for the
    /// duration of one task callback.
    pub scratch_memory_size: usize,
    /// Push/pop a debug label around each task's callback during execute.
    pub enable_debug_labels: bool,
    /// Append a human-readable line to the graph's `DebugInfoRecorder` for
    /// every batch and barrier compiled, retrievable via `get_debug_info`.
    pub record_debug_info: bool,
    /// Reject two writes to the same resource with no `concurrent` flag as
    /// `GraphError::WriteConflict` instead of silently serializing them via a
    /// hazard edge. Off by default since a write-after-write is often
    /// intentional (e.g. clear then draw) and the hazard edge already orders
    /// it correctly.
    pub strict_validation: bool,
}

impl Default for GraphOptions {
    fn default() -> Self {
        Self {
            enable_reordering: true,
            enable_aliasing: true,
            use_split_barriers: true,
            enable_multi_queue: false,
            enable_batch_merging: true,
            scratch_memory_size: 128 * 1024,
            enable_debug_labels: false,
            record_debug_info: false,
            strict_validation: false,
        }
    }
}
