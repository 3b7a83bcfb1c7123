use std::ffi::CString;

use ash::vk;
use log::*;

use crate::shaders::Visibility;

use super::{
    BindingShape, BlendFactor, BlendOperation, BlendState, BufferBindingType, CullMode, FrontFace,
    GraphicsDevice, LayoutEntry, PrimitiveState, PrimitiveTopology, RenderPipelineDesc,
};

/// attachment formats for dynamic rendering
#[derive(Debug, Clone, Copy)]
pub struct AshDeviceConfig {
    pub color_format: vk::Format,
    pub depth_format: Option<vk::Format>,
}

impl Default for AshDeviceConfig {
    fn default() -> Self {
        Self {
            color_format: vk::Format::B8G8R8A8_SRGB,
            depth_format: Some(vk::Format::D32_SFLOAT),
        }
    }
}

/// a [`GraphicsDevice`] on top of a logical vulkan device
///
/// pipelines use dynamic rendering (vulkan 1.3), so there are no render passes;
/// viewport and scissor are dynamic state
pub struct AshDevice {
    device: ash::Device,
    config: AshDeviceConfig,
}

impl AshDevice {
    /// the caller keeps ownership of the logical device, and must destroy it
    /// only after every cache built on this wrapper has been dropped
    pub fn new(device: ash::Device, config: AshDeviceConfig) -> Self {
        Self { device, config }
    }

    pub fn device(&self) -> &ash::Device {
        &self.device
    }
}

impl GraphicsDevice for AshDevice {
    type ShaderModule = vk::ShaderModule;
    type BindGroupLayout = vk::DescriptorSetLayout;
    type PipelineLayout = vk::PipelineLayout;
    type RenderPipeline = vk::Pipeline;

    fn create_shader_module(
        &mut self,
        stage: Visibility,
        code: &[u8],
    ) -> anyhow::Result<Self::ShaderModule> {
        let mut byte_reader = std::io::Cursor::new(code);
        let words = ash::util::read_spv(&mut byte_reader)?;
        let create_info = vk::ShaderModuleCreateInfo::default().code(&words);

        let module = unsafe { self.device.create_shader_module(&create_info, None)? };
        debug!("created {stage} shader module ({} words)", words.len());

        Ok(module)
    }

    fn create_bind_group_layout(
        &mut self,
        entries: &[LayoutEntry],
    ) -> anyhow::Result<Self::BindGroupLayout> {
        let bindings: Vec<vk::DescriptorSetLayoutBinding> =
            entries.iter().map(layout_binding).collect();

        let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);
        let layout = unsafe { self.device.create_descriptor_set_layout(&create_info, None)? };

        Ok(layout)
    }

    fn create_pipeline_layout(
        &mut self,
        bind_group_layouts: &[&Self::BindGroupLayout],
    ) -> anyhow::Result<Self::PipelineLayout> {
        let set_layouts: Vec<vk::DescriptorSetLayout> =
            bind_group_layouts.iter().map(|layout| **layout).collect();
        let create_info = vk::PipelineLayoutCreateInfo::default().set_layouts(&set_layouts);

        let layout = unsafe { self.device.create_pipeline_layout(&create_info, None)? };

        Ok(layout)
    }

    fn create_render_pipeline(
        &mut self,
        desc: &RenderPipelineDesc<'_, Self>,
    ) -> anyhow::Result<Self::RenderPipeline> {
        let vertex_entry = CString::new(desc.vertex.entry_point)?;
        let fragment_entry = desc
            .fragment
            .as_ref()
            .map(|fragment| CString::new(fragment.entry_point))
            .transpose()?;

        let mut stages = vec![
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::VERTEX)
                .module(*desc.vertex.module)
                .name(&vertex_entry),
        ];
        if let (Some(fragment), Some(fragment_entry)) = (&desc.fragment, &fragment_entry) {
            stages.push(
                vk::PipelineShaderStageCreateInfo::default()
                    .stage(vk::ShaderStageFlags::FRAGMENT)
                    .module(*fragment.module)
                    .name(fragment_entry),
            );
        }

        let binding_descriptions = desc.vertex_layout.binding_descriptions();
        let attribute_descriptions = desc.vertex_layout.attribute_descriptions();
        let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&binding_descriptions)
            .vertex_attribute_descriptions(&attribute_descriptions);

        let input_assembly_state = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(topology(desc.primitive.topology))
            .primitive_restart_enable(primitive_restart(&desc.primitive));

        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);

        let rasterization_state = vk::PipelineRasterizationStateCreateInfo::default()
            .depth_clamp_enable(desc.primitive.unclipped_depth)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(cull_mode(desc.primitive.cull_mode))
            .front_face(front_face(desc.primitive.front_face))
            .depth_bias_enable(false);

        let multisample_state = vk::PipelineMultisampleStateCreateInfo::default()
            .sample_shading_enable(false)
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let has_depth = self.config.depth_format.is_some();
        let depth_stencil_state = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(has_depth)
            .depth_write_enable(has_depth)
            .depth_compare_op(vk::CompareOp::LESS_OR_EQUAL)
            .depth_bounds_test_enable(false)
            .stencil_test_enable(false);

        // depth-only pipelines write no color
        let color_attachments = if desc.fragment.is_some() {
            vec![color_blend_attachment(&desc.blend)]
        } else {
            vec![]
        };
        let color_blend_state = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .attachments(&color_attachments);

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state =
            vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

        let color_formats = if desc.fragment.is_some() {
            vec![self.config.color_format]
        } else {
            vec![]
        };
        let mut rendering_info = vk::PipelineRenderingCreateInfo::default()
            .color_attachment_formats(&color_formats)
            .depth_attachment_format(self.config.depth_format.unwrap_or(vk::Format::UNDEFINED));

        let pipeline_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&stages)
            .vertex_input_state(&vertex_input_state)
            .input_assembly_state(&input_assembly_state)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization_state)
            .multisample_state(&multisample_state)
            .depth_stencil_state(&depth_stencil_state)
            .color_blend_state(&color_blend_state)
            .dynamic_state(&dynamic_state)
            .layout(*desc.layout)
            .push_next(&mut rendering_info);

        let pipelines = unsafe {
            self.device
                .create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
                .map_err(|(_, e)| e)?
        };

        pipelines
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("driver returned no pipeline"))
    }

    fn destroy_shader_module(&mut self, module: Self::ShaderModule) {
        unsafe { self.device.destroy_shader_module(module, None) };
    }

    fn destroy_bind_group_layout(&mut self, layout: Self::BindGroupLayout) {
        unsafe { self.device.destroy_descriptor_set_layout(layout, None) };
    }

    fn destroy_pipeline_layout(&mut self, layout: Self::PipelineLayout) {
        unsafe { self.device.destroy_pipeline_layout(layout, None) };
    }

    fn destroy_render_pipeline(&mut self, pipeline: Self::RenderPipeline) {
        unsafe { self.device.destroy_pipeline(pipeline, None) };
    }
}

fn layout_binding(entry: &LayoutEntry) -> vk::DescriptorSetLayoutBinding<'static> {
    vk::DescriptorSetLayoutBinding::default()
        .binding(entry.slot)
        .descriptor_type(descriptor_type(&entry.shape))
        .descriptor_count(entry.count)
        .stage_flags(stage_flags(entry.visibility))
}

pub fn descriptor_type(shape: &BindingShape) -> vk::DescriptorType {
    match shape {
        BindingShape::Buffer {
            ty: BufferBindingType::Uniform,
            has_dynamic_offset: false,
            ..
        } => vk::DescriptorType::UNIFORM_BUFFER,
        BindingShape::Buffer {
            ty: BufferBindingType::Uniform,
            has_dynamic_offset: true,
            ..
        } => vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
        BindingShape::Buffer {
            has_dynamic_offset: false,
            ..
        } => vk::DescriptorType::STORAGE_BUFFER,
        BindingShape::Buffer {
            has_dynamic_offset: true,
            ..
        } => vk::DescriptorType::STORAGE_BUFFER_DYNAMIC,
        BindingShape::Texture(_) => vk::DescriptorType::SAMPLED_IMAGE,
        BindingShape::Sampler(_) => vk::DescriptorType::SAMPLER,
        BindingShape::StorageTexture { .. } => vk::DescriptorType::STORAGE_IMAGE,
    }
}

pub fn stage_flags(visibility: Visibility) -> vk::ShaderStageFlags {
    let mut flags = vk::ShaderStageFlags::empty();
    if visibility.contains(Visibility::VERTEX) {
        flags |= vk::ShaderStageFlags::VERTEX;
    }
    if visibility.contains(Visibility::FRAGMENT) {
        flags |= vk::ShaderStageFlags::FRAGMENT;
    }
    if visibility.contains(Visibility::COMPUTE) {
        flags |= vk::ShaderStageFlags::COMPUTE;
    }
    flags
}

fn topology(topology: PrimitiveTopology) -> vk::PrimitiveTopology {
    match topology {
        PrimitiveTopology::PointList => vk::PrimitiveTopology::POINT_LIST,
        PrimitiveTopology::LineList => vk::PrimitiveTopology::LINE_LIST,
        PrimitiveTopology::LineStrip => vk::PrimitiveTopology::LINE_STRIP,
        PrimitiveTopology::TriangleList => vk::PrimitiveTopology::TRIANGLE_LIST,
        PrimitiveTopology::TriangleStrip => vk::PrimitiveTopology::TRIANGLE_STRIP,
    }
}

fn primitive_restart(primitive: &PrimitiveState) -> bool {
    primitive.topology.is_strip() && primitive.strip_index_format.is_some()
}

fn cull_mode(cull_mode: CullMode) -> vk::CullModeFlags {
    match cull_mode {
        CullMode::None => vk::CullModeFlags::NONE,
        CullMode::Front => vk::CullModeFlags::FRONT,
        CullMode::Back => vk::CullModeFlags::BACK,
    }
}

fn front_face(front_face: FrontFace) -> vk::FrontFace {
    match front_face {
        FrontFace::Ccw => vk::FrontFace::COUNTER_CLOCKWISE,
        FrontFace::Cw => vk::FrontFace::CLOCKWISE,
    }
}

fn blend_factor(factor: BlendFactor) -> vk::BlendFactor {
    match factor {
        BlendFactor::Zero => vk::BlendFactor::ZERO,
        BlendFactor::One => vk::BlendFactor::ONE,
        BlendFactor::Src => vk::BlendFactor::SRC_COLOR,
        BlendFactor::OneMinusSrc => vk::BlendFactor::ONE_MINUS_SRC_COLOR,
        BlendFactor::SrcAlpha => vk::BlendFactor::SRC_ALPHA,
        BlendFactor::OneMinusSrcAlpha => vk::BlendFactor::ONE_MINUS_SRC_ALPHA,
        BlendFactor::Dst => vk::BlendFactor::DST_COLOR,
        BlendFactor::OneMinusDst => vk::BlendFactor::ONE_MINUS_DST_COLOR,
        BlendFactor::DstAlpha => vk::BlendFactor::DST_ALPHA,
        BlendFactor::OneMinusDstAlpha => vk::BlendFactor::ONE_MINUS_DST_ALPHA,
    }
}

fn blend_op(operation: BlendOperation) -> vk::BlendOp {
    match operation {
        BlendOperation::Add => vk::BlendOp::ADD,
        BlendOperation::Subtract => vk::BlendOp::SUBTRACT,
        BlendOperation::ReverseSubtract => vk::BlendOp::REVERSE_SUBTRACT,
        BlendOperation::Min => vk::BlendOp::MIN,
        BlendOperation::Max => vk::BlendOp::MAX,
    }
}

fn color_blend_attachment(blend: &BlendState) -> vk::PipelineColorBlendAttachmentState {
    let attachment = vk::PipelineColorBlendAttachmentState::default()
        .color_write_mask(vk::ColorComponentFlags::RGBA);

    if blend.is_replace() {
        return attachment.blend_enable(false);
    }

    let BlendState { color, alpha } = blend;
    attachment
        .blend_enable(true)
        .src_color_blend_factor(blend_factor(color.src_factor))
        .dst_color_blend_factor(blend_factor(color.dst_factor))
        .color_blend_op(blend_op(color.operation))
        .src_alpha_blend_factor(blend_factor(alpha.src_factor))
        .dst_alpha_blend_factor(blend_factor(alpha.dst_factor))
        .alpha_blend_op(blend_op(alpha.operation))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::{IndexFormat, StorageTextureAccess, StorageTextureFormat};
    use crate::shaders::{SamplerKind, TextureInfo, ViewDimension};

    fn buffer(ty: BufferBindingType, has_dynamic_offset: bool) -> BindingShape {
        BindingShape::Buffer {
            ty,
            has_dynamic_offset,
            min_binding_size: 0,
        }
    }

    #[test]
    fn descriptor_types() {
        let cases = [
            (
                buffer(BufferBindingType::Uniform, false),
                vk::DescriptorType::UNIFORM_BUFFER,
            ),
            (
                buffer(BufferBindingType::Uniform, true),
                vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
            ),
            (
                buffer(BufferBindingType::ReadOnlyStorage, false),
                vk::DescriptorType::STORAGE_BUFFER,
            ),
            (
                buffer(BufferBindingType::Storage, true),
                vk::DescriptorType::STORAGE_BUFFER_DYNAMIC,
            ),
            (
                BindingShape::Texture(TextureInfo::float_2d()),
                vk::DescriptorType::SAMPLED_IMAGE,
            ),
            (
                BindingShape::Sampler(SamplerKind::Comparison),
                vk::DescriptorType::SAMPLER,
            ),
            (
                BindingShape::StorageTexture {
                    access: StorageTextureAccess::WriteOnly,
                    format: StorageTextureFormat::Rgba16Float,
                    view_dimension: ViewDimension::D2,
                },
                vk::DescriptorType::STORAGE_IMAGE,
            ),
        ];

        for (shape, expected) in cases {
            assert_eq!(descriptor_type(&shape), expected, "{shape:?}");
        }
    }

    #[test]
    fn binding_arrays_set_the_descriptor_count() {
        let cascades = LayoutEntry {
            slot: 3,
            visibility: Visibility::FRAGMENT,
            count: 4,
            shape: BindingShape::Texture(TextureInfo::float_2d()),
        };

        let binding = layout_binding(&cascades);

        assert_eq!(binding.binding, 3);
        assert_eq!(binding.descriptor_count, 4);
        assert_eq!(binding.descriptor_type, vk::DescriptorType::SAMPLED_IMAGE);
        assert_eq!(binding.stage_flags, vk::ShaderStageFlags::FRAGMENT);

        let camera = LayoutEntry::uniform_buffer(0, Visibility::VERTEX, 64);
        assert_eq!(layout_binding(&camera).descriptor_count, 1);
    }

    #[test]
    fn visibility_maps_to_stage_flags() {
        assert_eq!(
            stage_flags(Visibility::VERTEX | Visibility::FRAGMENT),
            vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT
        );
        assert_eq!(
            stage_flags(Visibility::COMPUTE),
            vk::ShaderStageFlags::COMPUTE
        );
        assert_eq!(stage_flags(Visibility::empty()), vk::ShaderStageFlags::empty());
    }

    #[test]
    fn primitive_restart_needs_a_strip_and_an_index_format() {
        let mut primitive = PrimitiveState {
            topology: PrimitiveTopology::TriangleStrip,
            ..Default::default()
        };
        assert!(!primitive_restart(&primitive));

        primitive.strip_index_format = Some(IndexFormat::Uint16);
        assert!(primitive_restart(&primitive));

        primitive.topology = PrimitiveTopology::TriangleList;
        assert!(!primitive_restart(&primitive));
    }

    #[test]
    fn default_rasterizer_state() {
        let primitive = PrimitiveState::default();

        assert_eq!(topology(primitive.topology), vk::PrimitiveTopology::TRIANGLE_LIST);
        assert_eq!(cull_mode(primitive.cull_mode), vk::CullModeFlags::BACK);
        assert_eq!(
            front_face(primitive.front_face),
            vk::FrontFace::COUNTER_CLOCKWISE
        );
    }

    #[test]
    fn replace_disables_blending() {
        let attachment = color_blend_attachment(&BlendState::REPLACE);
        assert_eq!(attachment.blend_enable, vk::FALSE);
        assert_eq!(attachment.color_write_mask, vk::ColorComponentFlags::RGBA);

        let attachment = color_blend_attachment(&BlendState::ALPHA_BLENDING);
        assert_eq!(attachment.blend_enable, vk::TRUE);
        assert_eq!(attachment.src_color_blend_factor, vk::BlendFactor::SRC_ALPHA);
        assert_eq!(
            attachment.dst_color_blend_factor,
            vk::BlendFactor::ONE_MINUS_SRC_ALPHA
        );
        assert_eq!(attachment.src_alpha_blend_factor, vk::BlendFactor::ONE);
        assert_eq!(attachment.alpha_blend_op, vk::BlendOp::ADD);
    }
}
