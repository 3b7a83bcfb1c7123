use crate::shaders::Visibility;

use super::{BlendState, LayoutEntry, PrimitiveState, VertexLayoutKind};

/// the native object factory the caches sit on top of
///
/// every create call is expected to be expensive; the caches guarantee
/// each structurally distinct object is only created once
pub trait GraphicsDevice {
    type ShaderModule;
    type BindGroupLayout;
    type PipelineLayout;
    type RenderPipeline;

    fn create_shader_module(
        &mut self,
        stage: Visibility,
        code: &[u8],
    ) -> anyhow::Result<Self::ShaderModule>;

    /// entries are sorted by slot
    fn create_bind_group_layout(
        &mut self,
        entries: &[LayoutEntry],
    ) -> anyhow::Result<Self::BindGroupLayout>;

    /// layouts are in set order, starting at set 0
    fn create_pipeline_layout(
        &mut self,
        bind_group_layouts: &[&Self::BindGroupLayout],
    ) -> anyhow::Result<Self::PipelineLayout>;

    fn create_render_pipeline(
        &mut self,
        desc: &RenderPipelineDesc<'_, Self>,
    ) -> anyhow::Result<Self::RenderPipeline>;

    fn destroy_shader_module(&mut self, _module: Self::ShaderModule) {}
    fn destroy_bind_group_layout(&mut self, _layout: Self::BindGroupLayout) {}
    fn destroy_pipeline_layout(&mut self, _layout: Self::PipelineLayout) {}
    fn destroy_render_pipeline(&mut self, _pipeline: Self::RenderPipeline) {}
}

pub struct ShaderStageDesc<'a, D: GraphicsDevice + ?Sized> {
    pub module: &'a D::ShaderModule,
    pub entry_point: &'a str,
}

pub struct RenderPipelineDesc<'a, D: GraphicsDevice + ?Sized> {
    pub layout: &'a D::PipelineLayout,
    pub vertex: ShaderStageDesc<'a, D>,
    /// depth-only pipelines have no fragment stage
    pub fragment: Option<ShaderStageDesc<'a, D>>,
    pub vertex_layout: VertexLayoutKind,
    pub primitive: PrimitiveState,
    pub blend: BlendState,
}
