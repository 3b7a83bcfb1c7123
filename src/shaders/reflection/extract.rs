use log::*;
use serde::{Deserialize, Serialize};

use crate::error::ReflectionError;
use crate::shaders::{
    BindingDescriptor, BindingResource, BufferInfo, SamplerInfo, SamplerKind, TextureInfo,
    Visibility,
};

use super::ShaderReflection;

/// one named parameter or struct field in a compiler's type-layout tree
///
/// this mirrors what slang reports for a variable layout, without holding on to
/// any compiler objects, so extraction can be tested without a compiler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterLayout {
    pub name: Option<String>,
    /// the binding index within the enclosing space; None if the parameter is never bound
    pub slot_index: Option<u32>,
    /// the register space the parameter was declared in
    pub binding_space: Option<u32>,
    /// for parameter blocks, the space allocated to the block's contents
    pub sub_space_offset: Option<u32>,
    pub type_layout: TypeLayout,
}

impl ParameterLayout {
    pub fn new(name: &str, type_layout: TypeLayout) -> Self {
        Self {
            name: Some(name.to_string()),
            slot_index: None,
            binding_space: None,
            sub_space_offset: None,
            type_layout,
        }
    }

    pub fn slot(mut self, slot_index: u32) -> Self {
        self.slot_index = Some(slot_index);
        self
    }

    pub fn space(mut self, binding_space: u32) -> Self {
        self.binding_space = Some(binding_space);
        self
    }

    pub fn sub_space(mut self, sub_space_offset: u32) -> Self {
        self.sub_space_offset = Some(sub_space_offset);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TypeLayout {
    Resource { shape: ResourceShape },
    Struct { fields: Vec<ParameterLayout> },
    /// introduces its own binding space;
    /// uniform_size is the byte size of the element's plain-data fields
    ParameterBlock {
        fields: Vec<ParameterLayout>,
        uniform_size: u32,
    },
    Array {
        element: Box<TypeLayout>,
        element_count: u32,
    },
    /// scalars, vectors and matrices
    Uniform { size: u32 },
}

impl TypeLayout {
    pub fn resource(shape: ResourceShape) -> Self {
        Self::Resource { shape }
    }
}

/// tagged by "type" since the sampler variant has a `kind` field of its own
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ResourceShape {
    ConstantBuffer { size: u32 },
    StructuredBuffer { size: u32, read_only: bool },
    ByteAddressBuffer { read_only: bool },
    Texture { info: TextureInfo },
    Sampler { kind: SamplerKind },
    /// anything the binding model has no kind for (acceleration structures, etc)
    Unsupported { description: String },
}

/// threaded through the tree walk by value
#[derive(Debug, Clone, Default)]
struct ExtractContext {
    current_set: Option<u32>,
    slot_offset: u32,
    name_prefix: String,
}

impl ExtractContext {
    fn qualified_name(&self, name: Option<&str>) -> String {
        match (self.name_prefix.is_empty(), name) {
            (true, Some(name)) => name.to_string(),
            (false, Some(name)) if !name.is_empty() => format!("{}.{name}", self.name_prefix),
            _ => self.name_prefix.clone(),
        }
    }

    /// the enclosing set, else the parameter's own declared space, else 0
    fn resolve_set(&self, parameter: &ParameterLayout) -> u32 {
        self.current_set
            .or(parameter.binding_space)
            .unwrap_or_default()
    }
}

/// flattens a shader's global parameters into bindings sorted by (set, slot)
pub fn extract_bindings(
    parameters: &[ParameterLayout],
    stage: Visibility,
) -> Vec<BindingDescriptor> {
    let mut bindings: Vec<BindingDescriptor> = parameters
        .iter()
        .flat_map(|parameter| reflect_parameter(parameter, ExtractContext::default(), stage))
        .collect();

    bindings.sort_by_key(BindingDescriptor::location);

    bindings
}

pub fn extract_reflection(
    parameters: &[ParameterLayout],
    stage: Visibility,
) -> Result<ShaderReflection, ReflectionError> {
    ShaderReflection::from_bindings(extract_bindings(parameters, stage), stage)
}

fn reflect_parameter(
    parameter: &ParameterLayout,
    context: ExtractContext,
    stage: Visibility,
) -> Vec<BindingDescriptor> {
    let full_name = context.qualified_name(parameter.name.as_deref());

    match &parameter.type_layout {
        TypeLayout::ParameterBlock {
            fields,
            uniform_size,
        } => reflect_parameter_block(parameter, fields, *uniform_size, context, full_name, stage),

        TypeLayout::Struct { fields } => {
            let field_context = ExtractContext {
                current_set: context.current_set.or(parameter.binding_space),
                slot_offset: context.slot_offset + parameter.slot_index.unwrap_or_default(),
                name_prefix: full_name,
            };

            fields
                .iter()
                .flat_map(|field| reflect_parameter(field, field_context.clone(), stage))
                .collect()
        }

        leaf => {
            let Some(slot_index) = parameter.slot_index else {
                trace!("'{full_name}' has no binding slot");
                return vec![];
            };

            let Some((resource, count)) = classify(leaf) else {
                debug!("dropping unclassifiable binding '{full_name}': {leaf:?}");
                return vec![];
            };

            let set = context.resolve_set(parameter);
            let slot = context.slot_offset + slot_index;

            let binding = BindingDescriptor::new(set, slot, resource, stage, &full_name);

            vec![binding.with_count(count)]
        }
    }
}

fn reflect_parameter_block(
    parameter: &ParameterLayout,
    fields: &[ParameterLayout],
    uniform_size: u32,
    context: ExtractContext,
    full_name: String,
    stage: Visibility,
) -> Vec<BindingDescriptor> {
    let block_set = parameter
        .sub_space_offset
        .or(parameter.binding_space)
        .unwrap_or_default();

    let block_context = ExtractContext {
        current_set: Some(block_set),
        slot_offset: 0,
        name_prefix: full_name.clone(),
    };

    let mut bindings: Vec<BindingDescriptor> = fields
        .iter()
        .flat_map(|field| reflect_parameter(field, block_context.clone(), stage))
        .collect();

    if uniform_size == 0 {
        return bindings;
    }

    // the block's plain-data fields share one implicit uniform buffer,
    // in the block's own set at the block's own slot
    match parameter.slot_index {
        Some(slot_index) => {
            let slot = context.slot_offset + slot_index;
            let name = format!("{full_name}_CBuffer");
            let resource = BindingResource::uniform_buffer(uniform_size);

            bindings.push(BindingDescriptor::new(block_set, slot, resource, stage, &name));
        }
        None => {
            debug!(
                "parameter block '{full_name}' has no slot; skipping its implicit uniform buffer"
            );
        }
    }

    bindings
}

/// the resource kind of a leaf and how many descriptors it binds
fn classify(type_layout: &TypeLayout) -> Option<(BindingResource, u32)> {
    match type_layout {
        TypeLayout::Resource { shape } => classify_shape(shape).map(|resource| (resource, 1)),
        // nested arrays flatten into one binding array
        TypeLayout::Array {
            element,
            element_count,
        } => {
            // unsized arrays would need bindless descriptor indexing
            if *element_count == 0 {
                return None;
            }

            let (resource, count) = classify(element)?;
            Some((resource, count.checked_mul(*element_count)?))
        }
        TypeLayout::Struct { .. }
        | TypeLayout::ParameterBlock { .. }
        | TypeLayout::Uniform { .. } => None,
    }
}

fn classify_shape(shape: &ResourceShape) -> Option<BindingResource> {
    let resource = match shape {
        ResourceShape::ConstantBuffer { size } => BindingResource::uniform_buffer(*size),
        ResourceShape::StructuredBuffer { size, read_only } => storage(*size, *read_only),
        ResourceShape::ByteAddressBuffer { read_only } => storage(0, *read_only),
        ResourceShape::Texture { info } => BindingResource::Texture(*info),
        ResourceShape::Sampler { kind } => BindingResource::Sampler(SamplerInfo { kind: *kind }),
        ResourceShape::Unsupported { .. } => return None,
    };

    Some(resource)
}

fn storage(size: u32, read_only: bool) -> BindingResource {
    let info = BufferInfo { size };
    if read_only {
        BindingResource::ReadOnlyStorage(info)
    } else {
        BindingResource::StorageBuffer(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shaders::ResourceKind;

    fn texture(name: &str) -> ParameterLayout {
        ParameterLayout::new(
            name,
            TypeLayout::resource(ResourceShape::Texture {
                info: TextureInfo::float_2d(),
            }),
        )
    }

    fn sampler(name: &str) -> ParameterLayout {
        ParameterLayout::new(
            name,
            TypeLayout::resource(ResourceShape::Sampler {
                kind: SamplerKind::Filtering,
            }),
        )
    }

    fn float(name: &str) -> ParameterLayout {
        ParameterLayout::new(name, TypeLayout::Uniform { size: 4 })
    }

    fn summary(bindings: &[BindingDescriptor]) -> Vec<(u32, u32, ResourceKind, &str)> {
        bindings
            .iter()
            .map(|b| (b.set, b.slot, b.kind(), b.name.as_str()))
            .collect()
    }

    #[test]
    fn parameter_block_gets_its_own_space_and_an_implicit_buffer() {
        let material = ParameterLayout::new(
            "gMaterial",
            TypeLayout::ParameterBlock {
                fields: vec![
                    texture("albedo").slot(1),
                    texture("normal").slot(2),
                    float("roughness"),
                ],
                uniform_size: 16,
            },
        )
        .slot(0)
        .space(0)
        .sub_space(1);

        let bindings = extract_bindings(&[material], Visibility::FRAGMENT);

        // the buffer follows the block into set 1, never the enclosing set 0
        assert_eq!(
            summary(&bindings),
            vec![
                (1, 0, ResourceKind::UniformBuffer, "gMaterial_CBuffer"),
                (1, 1, ResourceKind::Texture, "gMaterial.albedo"),
                (1, 2, ResourceKind::Texture, "gMaterial.normal"),
            ]
        );
        assert_eq!(bindings[0].resource.buffer_size(), Some(16));
        assert!(bindings.iter().all(|b| b.visibility == Visibility::FRAGMENT));
    }

    #[test]
    fn parameter_block_without_slot_keeps_nested_bindings() {
        let material = ParameterLayout::new(
            "gMaterial",
            TypeLayout::ParameterBlock {
                fields: vec![texture("albedo").slot(0), float("roughness")],
                uniform_size: 4,
            },
        )
        .sub_space(2);

        let bindings = extract_bindings(&[material], Visibility::FRAGMENT);

        assert_eq!(
            summary(&bindings),
            vec![(2, 0, ResourceKind::Texture, "gMaterial.albedo")]
        );
    }

    #[test]
    fn parameter_block_without_uniform_data_has_no_buffer() {
        let textures = ParameterLayout::new(
            "gTextures",
            TypeLayout::ParameterBlock {
                fields: vec![texture("albedo").slot(0)],
                uniform_size: 0,
            },
        )
        .slot(0)
        .space(3);

        let bindings = extract_bindings(&[textures], Visibility::FRAGMENT);

        assert_eq!(
            summary(&bindings),
            vec![(3, 0, ResourceKind::Texture, "gTextures.albedo")]
        );
    }

    #[test]
    fn nested_structs_offset_slots() {
        let inner = ParameterLayout::new(
            "maps",
            TypeLayout::Struct {
                fields: vec![texture("albedo").slot(0), texture("normal").slot(1)],
            },
        )
        .slot(1);
        let outer = ParameterLayout::new(
            "material",
            TypeLayout::Struct {
                fields: vec![sampler("sampler").slot(0), inner],
            },
        )
        .slot(2)
        .space(1);

        let bindings = extract_bindings(&[outer], Visibility::FRAGMENT);

        assert_eq!(
            summary(&bindings),
            vec![
                (1, 2, ResourceKind::Sampler, "material.sampler"),
                (1, 3, ResourceKind::Texture, "material.maps.albedo"),
                (1, 4, ResourceKind::Texture, "material.maps.normal"),
            ]
        );
    }

    #[test]
    fn unbound_and_unclassifiable_leaves_are_dropped() {
        let parameters = vec![
            // compile-time constant, never bound
            float("exposure"),
            ParameterLayout::new(
                "tlas",
                TypeLayout::resource(ResourceShape::Unsupported {
                    description: "acceleration structure".to_string(),
                }),
            )
            .slot(0),
            // plain data with a slot still has no resource kind
            float("stray").slot(1),
            texture("albedo").slot(2),
        ];

        let bindings = extract_bindings(&parameters, Visibility::VERTEX);

        assert_eq!(summary(&bindings), vec![(0, 2, ResourceKind::Texture, "albedo")]);
    }

    #[test]
    fn leaves_fall_back_to_their_declared_space() {
        let parameters = vec![
            texture("shadowMap").slot(4).space(2),
            ParameterLayout::new(
                "lights",
                TypeLayout::resource(ResourceShape::StructuredBuffer {
                    size: 0,
                    read_only: true,
                }),
            )
            .slot(0),
            ParameterLayout::new(
                "histogram",
                TypeLayout::resource(ResourceShape::ByteAddressBuffer { read_only: false }),
            )
            .slot(1),
        ];

        let bindings = extract_bindings(&parameters, Visibility::COMPUTE);

        assert_eq!(
            summary(&bindings),
            vec![
                (0, 0, ResourceKind::ReadOnlyStorage, "lights"),
                (0, 1, ResourceKind::StorageBuffer, "histogram"),
                (2, 4, ResourceKind::Texture, "shadowMap"),
            ]
        );
    }

    fn array(element: TypeLayout, element_count: u32) -> TypeLayout {
        TypeLayout::Array {
            element: Box::new(element),
            element_count,
        }
    }

    #[test]
    fn resource_arrays_keep_their_count() {
        let shadow_texture = TypeLayout::resource(ResourceShape::Texture {
            info: TextureInfo::float_2d(),
        });
        let parameters = vec![
            ParameterLayout::new("cascades", array(shadow_texture.clone(), 4)).slot(0),
            ParameterLayout::new("weights", array(TypeLayout::Uniform { size: 4 }, 8)).slot(1),
            // [2][3] flattens to six descriptors
            ParameterLayout::new("atlas", array(array(shadow_texture.clone(), 3), 2)).slot(2),
            ParameterLayout::new("bindless", array(shadow_texture, 0)).slot(3),
        ];

        let bindings = extract_bindings(&parameters, Visibility::FRAGMENT);

        assert_eq!(
            summary(&bindings),
            vec![
                (0, 0, ResourceKind::Texture, "cascades"),
                (0, 2, ResourceKind::Texture, "atlas"),
            ]
        );
        let counts: Vec<u32> = bindings.iter().map(|b| b.count).collect();
        assert_eq!(counts, vec![4, 6]);
    }

    #[test]
    fn layout_trees_load_from_json() {
        let material = ParameterLayout::new(
            "gMaterial",
            TypeLayout::ParameterBlock {
                fields: vec![
                    sampler("shadowSampler").slot(1),
                    ParameterLayout::new(
                        "lights",
                        TypeLayout::resource(ResourceShape::StructuredBuffer {
                            size: 32,
                            read_only: true,
                        }),
                    )
                    .slot(2),
                ],
                uniform_size: 16,
            },
        )
        .slot(0)
        .sub_space(1);

        let json = serde_json::to_value(&material).unwrap();
        assert_eq!(
            json["type_layout"]["fields"][0]["type_layout"]["shape"],
            serde_json::json!({ "type": "sampler", "kind": "filtering" })
        );

        let parsed: ParameterLayout = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, material);
        assert_eq!(
            summary(&extract_bindings(&[parsed], Visibility::FRAGMENT)),
            vec![
                (1, 0, ResourceKind::UniformBuffer, "gMaterial_CBuffer"),
                (1, 1, ResourceKind::Sampler, "gMaterial.shadowSampler"),
                (1, 2, ResourceKind::ReadOnlyStorage, "gMaterial.lights"),
            ]
        );
    }

    /// global cbuffer, a material parameter block, and a loose struct of textures
    #[test]
    fn mixed_globals() {
        let per_frame = ParameterLayout::new(
            "PerFrameUniforms",
            TypeLayout::resource(ResourceShape::ConstantBuffer { size: 80 }),
        )
        .slot(0)
        .space(0);

        let texture_set = |name: &str| {
            ParameterLayout::new(
                name,
                TypeLayout::Struct {
                    fields: vec![texture("albedoMap").slot(0), texture("normalMap").slot(1)],
                },
            )
        };

        let material = ParameterLayout::new(
            "gMaterial",
            TypeLayout::ParameterBlock {
                fields: vec![
                    texture_set("textures").slot(1),
                    sampler("sampler").slot(3),
                    float("roughness"),
                ],
                uniform_size: 16,
            },
        )
        .slot(0)
        .space(1)
        .sub_space(1);

        let extra = texture_set("gExtraTextures").slot(1).space(0);

        let reflection =
            extract_reflection(&[per_frame, material, extra], Visibility::VERTEX).unwrap();

        insta::assert_snapshot!(reflection.to_string(), @r"
        stages: vertex
        set 0 slot 0 UniformBuffer [vertex] size=80 PerFrameUniforms
        set 0 slot 1 Texture [vertex] gExtraTextures.albedoMap
        set 0 slot 2 Texture [vertex] gExtraTextures.normalMap
        set 1 slot 0 UniformBuffer [vertex] size=16 gMaterial_CBuffer
        set 1 slot 1 Texture [vertex] gMaterial.textures.albedoMap
        set 1 slot 2 Texture [vertex] gMaterial.textures.normalMap
        set 1 slot 3 Sampler [vertex] gMaterial.sampler
        ");
    }

    #[test]
    fn colliding_declarations_fail_reflection() {
        let parameters = vec![texture("a").slot(0), texture("b").slot(0)];

        let err = extract_reflection(&parameters, Visibility::FRAGMENT).unwrap_err();

        assert!(matches!(
            err,
            ReflectionError::DuplicateBinding { set: 0, slot: 0, .. }
        ));
    }
}
