mod binding;
pub use binding::*;

pub mod asset;
pub use asset::ShaderAsset;

pub mod reflection;
pub use reflection::{MAX_BIND_GROUPS, ShaderReflection};

pub mod json;

pub mod build_tasks;

#[cfg(feature = "slang")]
pub mod compiler;

/// whether to use column-major or row-major matricies with slang
pub const COLUMN_MAJOR: bool = true;
