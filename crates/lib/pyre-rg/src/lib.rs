extern crate log as glog;

mod access;
mod analyzer;
mod barrier;
mod batch;
mod compiled;
mod debug;
mod error;
mod executor;
mod handle;
mod options;
mod plan;
mod registry;
mod resource;
mod sync;
mod task;
mod transient_allocator;

pub mod graph;

pub use access::{AccessFlags, ImageAspect, Stage};
pub use barrier::{Barrier, BarrierTarget, SplitRole};
pub use batch::Batch;
pub use compiled::CompiledGraph;
pub use debug::DebugInfoRecorder;
pub use error::GraphError;
pub use executor::TaskInterface;
pub use graph::RenderGraph;
pub use handle::{Handle, HandleSpace};
pub use options::GraphOptions;
pub use plan::{plan, PlanOutput};
pub use registry::ResourceRegistry;
pub use resource::{GpuMask, ImageLayout, LifetimeWindow, ResourceView};
pub use task::{Attachment, ExecuteCallback, Task, TaskBuilder, TaskKind};
pub use transient_allocator::{Pool, ResourceAllocation, TransientAllocationPlan};
