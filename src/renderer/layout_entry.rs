use crate::shaders::{
    BindingDescriptor, BindingResource, SamplerKind, TextureInfo, ViewDimension, Visibility,
};

/// one slot of a bind group layout, as the graphics device sees it
///
/// derived equality and hashing only look at the active `shape` variant,
/// so two entries built from different shaders compare equal when they bind the same thing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayoutEntry {
    pub slot: u32,
    pub visibility: Visibility,
    /// descriptors in the binding array
    pub count: u32,
    pub shape: BindingShape,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingShape {
    Buffer {
        ty: BufferBindingType,
        has_dynamic_offset: bool,
        min_binding_size: u64,
    },
    Texture(TextureInfo),
    Sampler(SamplerKind),
    StorageTexture {
        access: StorageTextureAccess,
        format: StorageTextureFormat,
        view_dimension: ViewDimension,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferBindingType {
    Uniform,
    Storage,
    ReadOnlyStorage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageTextureAccess {
    WriteOnly,
    ReadOnly,
    ReadWrite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageTextureFormat {
    Rgba8Unorm,
    Rgba16Float,
    Rgba32Float,
    R32Float,
    R32Uint,
}

impl LayoutEntry {
    pub fn uniform_buffer(slot: u32, visibility: Visibility, min_binding_size: u64) -> Self {
        Self {
            slot,
            visibility,
            count: 1,
            shape: BindingShape::Buffer {
                ty: BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size,
            },
        }
    }
}

impl From<&BindingDescriptor> for LayoutEntry {
    fn from(binding: &BindingDescriptor) -> Self {
        let buffer = |ty, size: u32| BindingShape::Buffer {
            ty,
            has_dynamic_offset: false,
            min_binding_size: size as u64,
        };

        let shape = match binding.resource {
            BindingResource::UniformBuffer(info) => buffer(BufferBindingType::Uniform, info.size),
            BindingResource::StorageBuffer(info) => buffer(BufferBindingType::Storage, info.size),
            BindingResource::ReadOnlyStorage(info) => {
                buffer(BufferBindingType::ReadOnlyStorage, info.size)
            }
            BindingResource::Texture(info) => BindingShape::Texture(info),
            BindingResource::Sampler(info) => BindingShape::Sampler(info.kind),
        };

        Self {
            slot: binding.slot,
            visibility: binding.visibility,
            count: binding.count,
            shape,
        }
    }
}

/// the order-sensitive structural key of one bind group layout
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LayoutKey(Vec<LayoutEntry>);

impl LayoutKey {
    pub fn new(entries: &[LayoutEntry]) -> Self {
        Self(entries.to_vec())
    }

    pub fn entries(&self) -> &[LayoutEntry] {
        &self.0
    }
}
