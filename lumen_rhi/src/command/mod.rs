/// Command module - command buffer state machine and parallel recording

pub mod command_buffer;
pub mod parallel;

pub use command_buffer::{CommandBuffer, CommandBufferState};
pub use parallel::record_in_parallel;
