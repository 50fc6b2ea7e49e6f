use thiserror::Error;

use crate::handle::HandleSpace;

/// `CompileError` wraps whichever of the other variants caused `compile()`
/// to reject the graph; record-time and execute-time paths return the inner
/// variants directly.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("handle index {index} is out of range for the {space} handle space")]
    InvalidHandle { space: HandleSpace, index: u32 },

    #[error("handle generation mismatch for {space} index {index}: expected {expected}, got {got}")]
    StaleHandle { space: HandleSpace, index: u32, expected: u8, got: u8 },

    #[error("two writes to the same resource in one batch without `concurrent`")]
    WriteConflict,

    #[error("batch aggregates two accesses to {space} index {index} that imply different image layouts ({a:?} vs {b:?})")]
    LayoutConflict { space: HandleSpace, index: u32, a: crate::resource::ImageLayout, b: crate::resource::ImageLayout },

    #[error("the {space} handle space is exhausted (2^24 handles already minted)")]
    ResourceExhausted { space: HandleSpace },

    #[error("transient allocation failed: device is out of memory")]
    DeviceOutOfMemory,

    #[error("execute() called before a successful compile()")]
    NotCompiled,

    #[error("device rejected a submission: {0:?}")]
    DeviceError(#[from] pyre_rhi::RhiError),

    #[error("compile failed: {0}")]
    CompileError(Box<GraphError>),
}

impl GraphError {
    pub fn into_compile_error(self) -> Self {
        match self {
            GraphError::CompileError(_) => self,
            other => GraphError::CompileError(Box::new(other)),
        }
    }
}
