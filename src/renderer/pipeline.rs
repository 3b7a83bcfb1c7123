use std::collections::HashMap;

use log::*;

use crate::error::CacheError;
use crate::shaders::MAX_BIND_GROUPS;

use super::{
    BindGroupLayoutHandle, GraphicsDevice, LayoutCache, RenderPipelineDesc, ShaderHandle,
    ShaderProgram, ShaderStageDesc, StageModule,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VertexLayoutKind {
    /// vertices are generated in the shader (fullscreen passes)
    #[default]
    None,
    /// see [`super::StandardVertex`]
    StandardMesh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveTopology {
    PointList,
    LineList,
    LineStrip,
    #[default]
    TriangleList,
    TriangleStrip,
}

impl PrimitiveTopology {
    pub fn is_strip(&self) -> bool {
        matches!(self, Self::LineStrip | Self::TriangleStrip)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexFormat {
    Uint16,
    Uint32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FrontFace {
    #[default]
    Ccw,
    Cw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullMode {
    None,
    Front,
    #[default]
    Back,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PrimitiveState {
    pub topology: PrimitiveTopology,
    /// enables primitive restart for strip topologies
    pub strip_index_format: Option<IndexFormat>,
    pub front_face: FrontFace,
    pub cull_mode: CullMode,
    pub unclipped_depth: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    Src,
    OneMinusSrc,
    SrcAlpha,
    OneMinusSrcAlpha,
    Dst,
    OneMinusDst,
    DstAlpha,
    OneMinusDstAlpha,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendOperation {
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendComponent {
    pub src_factor: BlendFactor,
    pub dst_factor: BlendFactor,
    pub operation: BlendOperation,
}

impl BlendComponent {
    pub const REPLACE: Self = Self {
        src_factor: BlendFactor::One,
        dst_factor: BlendFactor::Zero,
        operation: BlendOperation::Add,
    };

    pub const OVER: Self = Self {
        src_factor: BlendFactor::One,
        dst_factor: BlendFactor::OneMinusSrcAlpha,
        operation: BlendOperation::Add,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendState {
    pub color: BlendComponent,
    pub alpha: BlendComponent,
}

impl BlendState {
    pub const REPLACE: Self = Self {
        color: BlendComponent::REPLACE,
        alpha: BlendComponent::REPLACE,
    };

    pub const ALPHA_BLENDING: Self = Self {
        color: BlendComponent {
            src_factor: BlendFactor::SrcAlpha,
            dst_factor: BlendFactor::OneMinusSrcAlpha,
            operation: BlendOperation::Add,
        },
        alpha: BlendComponent::OVER,
    };

    /// replace is the same as blending disabled
    pub fn is_replace(&self) -> bool {
        *self == Self::REPLACE
    }
}

impl Default for BlendState {
    fn default() -> Self {
        Self::REPLACE
    }
}

/// everything that distinguishes one render pipeline from another
///
/// the global (set 0) layout is owned by the shader system and is not part of the key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineKey {
    pub shader: ShaderHandle,
    pub vertex_layout: VertexLayoutKind,
    pub primitive: PrimitiveState,
    pub blend: BlendState,
}

impl PipelineKey {
    pub fn new(shader: ShaderHandle) -> Self {
        Self {
            shader,
            vertex_layout: VertexLayoutKind::StandardMesh,
            primitive: PrimitiveState::default(),
            blend: BlendState::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PipelineHandle(usize);

fn stage_desc<'a, D: GraphicsDevice>(
    modules: &'a [D::ShaderModule],
    stage: &'a StageModule,
) -> ShaderStageDesc<'a, D> {
    ShaderStageDesc {
        module: &modules[stage.module.0],
        entry_point: &stage.entry_point,
    }
}

/// handles stay valid for as long as the cache that issued them
pub struct PipelineCache<D: GraphicsDevice> {
    pipelines: Vec<D::RenderPipeline>,
    lookup: HashMap<PipelineKey, PipelineHandle>,
}

impl<D: GraphicsDevice> Default for PipelineCache<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: GraphicsDevice> PipelineCache<D> {
    pub fn new() -> Self {
        Self {
            pipelines: vec![],
            lookup: HashMap::new(),
        }
    }

    /// `program` must be the program `key.shader` refers to
    pub fn get_render_pipeline(
        &mut self,
        device: &mut D,
        layouts: &mut LayoutCache<D>,
        global_layout: BindGroupLayoutHandle,
        program: &ShaderProgram,
        modules: &[D::ShaderModule],
        key: &PipelineKey,
    ) -> Result<PipelineHandle, CacheError> {
        if let Some(handle) = self.lookup.get(key) {
            trace!("render pipeline cache hit: {handle:?}");
            return Ok(*handle);
        }

        let vertex = program.vertex.as_ref().ok_or(CacheError::MissingStage("vertex"))?;

        let mut set_layouts = Vec::with_capacity(MAX_BIND_GROUPS);
        set_layouts.push(global_layout);
        for set in 1..MAX_BIND_GROUPS {
            let group = program.reflection.group(set);
            set_layouts.push(layouts.get_layout_for_group(device, group)?);
        }
        let pipeline_layout = layouts.get_pipeline_layout(device, &set_layouts)?;

        let desc = RenderPipelineDesc {
            layout: layouts.pipeline_layout(pipeline_layout),
            vertex: stage_desc::<D>(modules, vertex),
            fragment: program
                .fragment
                .as_ref()
                .map(|fragment| stage_desc::<D>(modules, fragment)),
            vertex_layout: key.vertex_layout,
            primitive: key.primitive,
            blend: key.blend,
        };
        let pipeline = device.create_render_pipeline(&desc)?;

        let handle = PipelineHandle(self.pipelines.len());
        self.pipelines.push(pipeline);
        self.lookup.insert(*key, handle);

        debug!("created render pipeline {handle:?} for {key:?}");

        Ok(handle)
    }

    pub fn pipeline(&self, handle: PipelineHandle) -> &D::RenderPipeline {
        &self.pipelines[handle.0]
    }

    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    pub fn destroy(self, device: &mut D) {
        for pipeline in self.pipelines {
            device.destroy_render_pipeline(pipeline);
        }
    }
}
