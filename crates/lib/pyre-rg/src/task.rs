use crate::access::{AccessFlags, Stage};
use crate::resource::ResourceView;

/// Which queue family a task's kind implies, for the Batch Planner's
/// different-queue-family-closes-a-batch rule.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TaskKind {
    General,
    Compute,
    Raster,
    Transfer,
    RayTracing,
}

impl TaskKind {
    /// Queue index implied by this kind when multi-queue scheduling is
    /// enabled. `General` and `RayTracing` share the graphics queue with
    /// `Raster` here, since this workspace models one physical graphics+compute
    /// queue and one dedicated transfer queue, matching `pyre-rhi::Device`'s
    /// single `global_queue` plus the transfer-queue extension point noted in
    /// `GraphOptions::enable_multi_queue`.
    pub fn queue_index(&self, enable_multi_queue: bool) -> u32 {
        if !enable_multi_queue {
            return 0;
        }
        match self {
            TaskKind::Transfer => 1,
            _ => 0,
        }
    }
}

/// One resource touched by a task: its name, access kind, pipeline stage,
/// and the view it's bound through.
#[derive(Clone, Debug)]
pub struct Attachment {
    pub name: String,
    pub access: AccessFlags,
    pub stage: Stage,
    pub view: ResourceView,
}

/// `FnMut` rather than `FnOnce`: `execute_on_all_gpus` invokes the same
/// compiled task list once per device, and a graph whose task list persists
/// across frames (the host re-executes without re-recording) must be able to
/// call a task's callback more than once.
pub type ExecuteCallback = Box<dyn FnMut(&mut crate::executor::TaskInterface) -> anyhow::Result<()>>;

/// A recorded unit of GPU work: its attachments, execute callback, and the
/// condition under which it participates in the plan. A task is enabled iff
/// `(graph.condition_vector & condition_mask) == condition_value`.
pub struct Task {
    pub name: String,
    pub kind: TaskKind,
    pub attachments: Vec<Attachment>,
    pub execute: Option<ExecuteCallback>,
    pub condition_mask: u32,
    pub condition_value: u32,
}

impl Task {
    pub fn new(name: impl Into<String>, kind: TaskKind) -> Self {
        Self {
            name: name.into(),
            kind,
            attachments: Vec::new(),
            execute: None,
            condition_mask: 0,
            condition_value: 0,
        }
    }

    /// Whether this task is enabled under the given 32-bit condition vector.
    /// `condition_mask == 0` means always-enabled.
    pub fn is_enabled(&self, condition_vector: u32) -> bool {
        (condition_vector & self.condition_mask) == self.condition_value
    }

    pub fn writes(&self) -> impl Iterator<Item = &Attachment> {
        self.attachments.iter().filter(|a| a.access.is_write())
    }

    pub fn reads(&self) -> impl Iterator<Item = &Attachment> {
        self.attachments.iter().filter(|a| a.access.is_read())
    }
}

/// Builder produced by `RenderGraph::compute`/`raster`/`transfer`/`ray_tracing`.
/// Buffers attachments until `.executes(..)` seals the task and appends it to
/// the graph's task list; sealed explicitly by `.executes()` rather than by
/// `Drop`, since declaring a task's callback is what seals it.
pub struct TaskBuilder<'rg> {
    graph: &'rg mut crate::graph::RenderGraph,
    task: Option<Task>,
}

impl<'rg> TaskBuilder<'rg> {
    pub(crate) fn new(graph: &'rg mut crate::graph::RenderGraph, name: impl Into<String>, kind: TaskKind) -> Self {
        Self { graph, task: Some(Task::new(name, kind)) }
    }

    pub fn reads(mut self, stage: Stage, view: ResourceView) -> Self {
        self.push(stage, AccessFlags::read(), view, "read");
        self
    }

    pub fn writes(mut self, stage: Stage, view: ResourceView) -> Self {
        self.push(stage, AccessFlags::write(), view, "write");
        self
    }

    pub fn samples(mut self, stage: Stage, view: ResourceView) -> Self {
        self.push(stage, AccessFlags::sampled(), view, "sampled");
        self
    }

    pub fn concurrent_writes(mut self, stage: Stage, view: ResourceView) -> Self {
        self.push(stage, AccessFlags::concurrent_write(), view, "concurrent_write");
        self
    }

    pub fn condition(mut self, mask: u32, value: u32) -> Self {
        let task = self.task.as_mut().expect("task already sealed");
        task.condition_mask = mask;
        task.condition_value = value;
        self
    }

    /// Seals the task: attaches the execute callback and appends the task to
    /// the graph's recorder. No further attachments can be added afterward,
    /// which this enforces by consuming `self`.
    pub fn executes(
        mut self,
        callback: impl FnMut(&mut crate::executor::TaskInterface) -> anyhow::Result<()> + 'static,
    ) {
        let mut task = self.task.take().expect("task already sealed");
        task.execute = Some(Box::new(callback));
        self.graph.push_task(task);
    }

    fn push(&mut self, stage: Stage, access: AccessFlags, view: ResourceView, name: &str) {
        let task = self.task.as_mut().expect("task already sealed");
        task.attachments.push(Attachment { name: name.to_owned(), access, stage, view });
    }
}
