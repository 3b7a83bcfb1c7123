mod config;
pub use config::*;

mod device;
pub use device::*;

mod layout_entry;
pub use layout_entry::*;

mod layout_cache;
pub use layout_cache::*;

mod pipeline;
pub use pipeline::*;

mod shader_system;
pub use shader_system::*;

mod vertex_description;
pub use vertex_description::*;

pub mod vulkan;

#[cfg(test)]
mod test_device;
