use ash::vk;

use super::VertexLayoutKind;

pub trait VertexDescription {
    fn binding_descriptions() -> Vec<vk::VertexInputBindingDescription>;
    fn attribute_descriptions() -> Vec<vk::VertexInputAttributeDescription>;
}

/// the interleaved vertex every mesh pipeline reads from binding 0
#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C)]
pub struct StandardVertex {
    pub position: glam::Vec3,
    pub normal: glam::Vec3,
    pub uv: glam::Vec2,
    /// w is the bitangent sign
    pub tangent: glam::Vec4,
}

impl VertexDescription for StandardVertex {
    fn binding_descriptions() -> Vec<vk::VertexInputBindingDescription> {
        vec![
            vk::VertexInputBindingDescription::default()
                .binding(0)
                .stride(std::mem::size_of::<Self>() as u32)
                .input_rate(vk::VertexInputRate::VERTEX),
        ]
    }

    fn attribute_descriptions() -> Vec<vk::VertexInputAttributeDescription> {
        // color formats double as vector formats
        let attribute = |location: u32, format: vk::Format, offset: usize| {
            vk::VertexInputAttributeDescription::default()
                .binding(0)
                .location(location)
                .format(format)
                .offset(offset as u32)
        };

        vec![
            attribute(
                0,
                vk::Format::R32G32B32_SFLOAT,
                std::mem::offset_of!(StandardVertex, position),
            ),
            attribute(
                1,
                vk::Format::R32G32B32_SFLOAT,
                std::mem::offset_of!(StandardVertex, normal),
            ),
            attribute(
                2,
                vk::Format::R32G32_SFLOAT,
                std::mem::offset_of!(StandardVertex, uv),
            ),
            attribute(
                3,
                vk::Format::R32G32B32A32_SFLOAT,
                std::mem::offset_of!(StandardVertex, tangent),
            ),
        ]
    }
}

impl VertexLayoutKind {
    pub fn binding_descriptions(&self) -> Vec<vk::VertexInputBindingDescription> {
        match self {
            Self::None => vec![],
            Self::StandardMesh => StandardVertex::binding_descriptions(),
        }
    }

    pub fn attribute_descriptions(&self) -> Vec<vk::VertexInputAttributeDescription> {
        match self {
            Self::None => vec![],
            Self::StandardMesh => StandardVertex::attribute_descriptions(),
        }
    }
}
