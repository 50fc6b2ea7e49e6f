extern crate log as glog;

mod allocator;
mod buffer;
mod command;
mod device;
mod error;
mod image;

pub mod barrier;

pub use allocator::{Allocation, AllocationCreateDesc, Allocator, MemoryLocation};
pub use buffer::{Buffer, BufferDesc};
pub use command::CommandBuffer;
pub use device::{Device, Queue, QueueFamily};
pub use error::RhiError;
pub use image::{Image, ImageDesc, ImageType, ImageViewDesc};
