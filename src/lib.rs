pub mod error;
pub mod renderer;
pub mod shaders;
pub mod util;

pub use shaders::build_tasks;
