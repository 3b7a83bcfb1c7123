use shader_slang as slang;

use crate::shaders::{SamplerKind, TextureInfo, TextureSampleKind, ViewDimension, Visibility};

use super::{ParameterLayout, ResourceShape, TypeLayout};

// converts slang's program layout into the compiler-independent tree, see
// https://docs.shader-slang.org/en/latest/parameter-blocks.html

pub fn global_parameters(program_layout: &slang::reflection::Shader) -> Vec<ParameterLayout> {
    program_layout.parameters().map(parameter_layout).collect()
}

pub fn stage_visibility(stage: slang::Stage) -> Option<Visibility> {
    match stage {
        slang::Stage::Vertex => Some(Visibility::VERTEX),
        slang::Stage::Fragment => Some(Visibility::FRAGMENT),
        slang::Stage::Compute => Some(Visibility::COMPUTE),
        _ => None,
    }
}

fn parameter_layout(variable: &slang::reflection::VariableLayout) -> ParameterLayout {
    let type_layout = variable.type_layout();

    // plain data only takes up bytes in a uniform buffer, never a binding
    let slot_index = match variable.category() {
        slang::ParameterCategory::None | slang::ParameterCategory::Uniform => None,
        _ => Some(variable.binding_index()),
    };

    let sub_space_offset = match type_layout.kind() {
        slang::TypeKind::ParameterBlock => Some(
            variable.binding_space()
                + variable.offset(slang::ParameterCategory::SubElementRegisterSpace) as u32,
        ),
        _ => None,
    };

    ParameterLayout {
        name: variable.name().map(str::to_string),
        slot_index,
        binding_space: Some(variable.binding_space()),
        sub_space_offset,
        type_layout: convert_type_layout(type_layout),
    }
}

fn convert_type_layout(type_layout: &slang::reflection::TypeLayout) -> TypeLayout {
    match type_layout.kind() {
        slang::TypeKind::ParameterBlock => {
            let element = type_layout.element_type_layout();

            TypeLayout::ParameterBlock {
                fields: element.fields().map(parameter_layout).collect(),
                uniform_size: element.size(slang::ParameterCategory::Uniform) as u32,
            }
        }

        slang::TypeKind::ConstantBuffer => {
            let element = type_layout.element_type_layout();
            let size = element.size(slang::ParameterCategory::Uniform) as u32;

            TypeLayout::resource(ResourceShape::ConstantBuffer { size })
        }

        slang::TypeKind::Struct => TypeLayout::Struct {
            fields: type_layout.fields().map(parameter_layout).collect(),
        },

        slang::TypeKind::Array => TypeLayout::Array {
            element: Box::new(convert_type_layout(type_layout.element_type_layout())),
            element_count: type_layout.element_count().unwrap_or_default() as u32,
        },

        slang::TypeKind::SamplerState => TypeLayout::resource(ResourceShape::Sampler {
            kind: SamplerKind::Filtering,
        }),

        slang::TypeKind::ShaderStorageBuffer => {
            TypeLayout::resource(ResourceShape::StructuredBuffer {
                size: 0,
                read_only: false,
            })
        }

        slang::TypeKind::Resource => TypeLayout::resource(convert_resource(type_layout)),

        slang::TypeKind::Scalar | slang::TypeKind::Vector | slang::TypeKind::Matrix => {
            TypeLayout::Uniform {
                size: type_layout.size(slang::ParameterCategory::Uniform) as u32,
            }
        }

        k => TypeLayout::resource(ResourceShape::Unsupported {
            description: format!("type kind {k:?}"),
        }),
    }
}

fn convert_resource(type_layout: &slang::reflection::TypeLayout) -> ResourceShape {
    let read_only = !matches!(
        type_layout.resource_access(),
        Some(slang::ResourceAccess::ReadWrite)
    );

    let shape = type_layout.resource_shape();
    if let Some(info) = shape.and_then(texture_info) {
        return ResourceShape::Texture { info };
    }

    match shape {
        Some(slang::ResourceShape::SlangStructuredBuffer) => ResourceShape::StructuredBuffer {
            size: type_layout.element_type_layout().size(slang::ParameterCategory::Uniform) as u32,
            read_only,
        },
        Some(slang::ResourceShape::SlangByteAddressBuffer) => {
            ResourceShape::ByteAddressBuffer { read_only }
        }

        s => ResourceShape::Unsupported {
            description: format!("resource shape {s:?}"),
        },
    }
}

/// 1d arrays have no view dimension to map to
fn texture_info(shape: slang::ResourceShape) -> Option<TextureInfo> {
    let (view_dimension, multisampled) = match shape {
        slang::ResourceShape::SlangTexture1d => (ViewDimension::D1, false),
        slang::ResourceShape::SlangTexture2d => (ViewDimension::D2, false),
        slang::ResourceShape::SlangTexture2dArray => (ViewDimension::D2Array, false),
        slang::ResourceShape::SlangTexture2dMultisample => (ViewDimension::D2, true),
        slang::ResourceShape::SlangTexture2dMultisampleArray => (ViewDimension::D2Array, true),
        slang::ResourceShape::SlangTexture3d => (ViewDimension::D3, false),
        slang::ResourceShape::SlangTextureCube => (ViewDimension::Cube, false),
        slang::ResourceShape::SlangTextureCubeArray => (ViewDimension::CubeArray, false),
        _ => return None,
    };

    Some(TextureInfo {
        sample_kind: TextureSampleKind::Float,
        view_dimension,
        multisampled,
    })
}
