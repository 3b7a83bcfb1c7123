use std::cell::Cell;
use std::rc::Rc;

use crate::shaders::Visibility;

use super::{
    BlendState, GraphicsDevice, LayoutEntry, PrimitiveState, RenderPipelineDesc, VertexLayoutKind,
};

/// counts every create and destroy call, and records what it was asked to build
#[derive(Debug, Default)]
pub struct RecordingDevice {
    pub shader_modules_created: usize,
    pub bind_group_layouts_created: usize,
    pub pipeline_layouts_created: usize,
    pub render_pipelines_created: usize,
    /// shared so it can be read after the device has been dropped
    pub destroyed: Rc<Cell<usize>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedPipeline {
    /// the entries of every set, in set order
    pub layout: Vec<Vec<LayoutEntry>>,
    pub vertex_entry_point: String,
    pub has_fragment: bool,
    pub vertex_layout: VertexLayoutKind,
    pub primitive: PrimitiveState,
    pub blend: BlendState,
}

impl RecordingDevice {
    fn destroy(&mut self) {
        self.destroyed.set(self.destroyed.get() + 1);
    }
}

impl GraphicsDevice for RecordingDevice {
    /// the stage it was compiled for
    type ShaderModule = Visibility;
    type BindGroupLayout = Vec<LayoutEntry>;
    type PipelineLayout = Vec<Vec<LayoutEntry>>;
    type RenderPipeline = RecordedPipeline;

    fn create_shader_module(
        &mut self,
        stage: Visibility,
        _code: &[u8],
    ) -> anyhow::Result<Self::ShaderModule> {
        self.shader_modules_created += 1;
        Ok(stage)
    }

    fn create_bind_group_layout(
        &mut self,
        entries: &[LayoutEntry],
    ) -> anyhow::Result<Self::BindGroupLayout> {
        self.bind_group_layouts_created += 1;
        Ok(entries.to_vec())
    }

    fn create_pipeline_layout(
        &mut self,
        bind_group_layouts: &[&Self::BindGroupLayout],
    ) -> anyhow::Result<Self::PipelineLayout> {
        anyhow::ensure!(!bind_group_layouts.is_empty(), "no bind group layouts");

        self.pipeline_layouts_created += 1;
        Ok(bind_group_layouts
            .iter()
            .map(|layout| layout.to_vec())
            .collect())
    }

    fn create_render_pipeline(
        &mut self,
        desc: &RenderPipelineDesc<'_, Self>,
    ) -> anyhow::Result<Self::RenderPipeline> {
        anyhow::ensure!(
            *desc.vertex.module == Visibility::VERTEX,
            "vertex module has stage {}",
            desc.vertex.module
        );
        if let Some(fragment) = &desc.fragment {
            anyhow::ensure!(
                *fragment.module == Visibility::FRAGMENT,
                "fragment module has stage {}",
                fragment.module
            );
        }

        self.render_pipelines_created += 1;

        Ok(RecordedPipeline {
            layout: desc.layout.clone(),
            vertex_entry_point: desc.vertex.entry_point.to_string(),
            has_fragment: desc.fragment.is_some(),
            vertex_layout: desc.vertex_layout,
            primitive: desc.primitive,
            blend: desc.blend,
        })
    }

    fn destroy_shader_module(&mut self, _module: Self::ShaderModule) {
        self.destroy();
    }

    fn destroy_bind_group_layout(&mut self, _layout: Self::BindGroupLayout) {
        self.destroy();
    }

    fn destroy_pipeline_layout(&mut self, _layout: Self::PipelineLayout) {
        self.destroy();
    }

    fn destroy_render_pipeline(&mut self, _pipeline: Self::RenderPipeline) {
        self.destroy();
    }
}
