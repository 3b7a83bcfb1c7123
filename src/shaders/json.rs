use glam::UVec3;
use serde::{Deserialize, Serialize};

use super::{BindingDescriptor, ShaderAsset, Visibility};

/// the human-readable sidecar written next to a baked shader asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReflectionJson {
    pub source_file_name: String,
    pub entry_point: String,
    pub stage: Visibility,
    pub thread_group_size: UVec3,
    pub code_size: usize,
    pub bindings: Vec<BindingDescriptor>,
}

impl ReflectionJson {
    pub fn from_asset(source_file_name: &str, asset: &ShaderAsset) -> Self {
        Self {
            source_file_name: source_file_name.to_string(),
            entry_point: asset.entry_point.clone(),
            stage: asset.entry_stage,
            thread_group_size: asset.thread_group_size,
            code_size: asset.code.len(),
            bindings: asset.bindings.clone(),
        }
    }
}
