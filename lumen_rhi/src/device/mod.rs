/// Device module - traits implemented by graphics backends
///
/// The rest of the crate only talks to the GPU through these traits.
/// `mock_device` provides a recording implementation for unit tests.

pub mod buffer;
pub mod shader;
pub mod descriptor;
pub mod pipeline_state;
pub mod render_pass;
pub mod command_encoder;
pub mod device;

#[cfg(test)]
pub mod mock_device;

pub use buffer::*;
pub use shader::*;
pub use descriptor::*;
pub use pipeline_state::*;
pub use render_pass::*;
pub use command_encoder::*;
pub use device::*;

#[cfg(test)]
#[path = "device_tests.rs"]
mod tests;
