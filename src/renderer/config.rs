use crate::shaders::Visibility;

use super::LayoutEntry;

pub struct ShaderSystemConfig {
    /// the set 0 layout shared by every pipeline (camera and frame data)
    pub global_layout: Vec<LayoutEntry>,
}

impl Default for ShaderSystemConfig {
    /// one uniform buffer of per-frame data at slot 0
    fn default() -> Self {
        Self {
            global_layout: vec![LayoutEntry::uniform_buffer(
                0,
                Visibility::VERTEX | Visibility::FRAGMENT,
                0,
            )],
        }
    }
}
