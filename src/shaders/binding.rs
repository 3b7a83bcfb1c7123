use std::fmt;

use serde::{Deserialize, Serialize};

/// a stable lookup key for a named shader property
///
/// this is persisted in shader assets, so the hash must never change
pub type PropertyId = u32;

pub fn property_id(name: &str) -> PropertyId {
    name.bytes()
        .fold(0u32, |hash, byte| hash.wrapping_mul(31).wrapping_add(byte as u32))
}

/// the on-disk name field is 32 bytes including the nul terminator
pub const MAX_BINDING_NAME_LEN: usize = 31;

bitflags::bitflags! {
    /// which shader stages can access a binding
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct Visibility: u8 {
        const VERTEX = 0x1;
        const FRAGMENT = 0x2;
        const COMPUTE = 0x4;
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "none");
        }

        let names: Vec<&str> = [
            (Self::VERTEX, "vertex"),
            (Self::FRAGMENT, "fragment"),
            (Self::COMPUTE, "compute"),
        ]
        .into_iter()
        .filter(|(stage, _)| self.contains(*stage))
        .map(|(_, name)| name)
        .collect();

        write!(f, "{}", names.join("|"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ResourceKind {
    UniformBuffer = 0,
    StorageBuffer = 1,
    ReadOnlyStorage = 2,
    Texture = 3,
    Sampler = 4,
}

impl ResourceKind {
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::UniformBuffer),
            1 => Some(Self::StorageBuffer),
            2 => Some(Self::ReadOnlyStorage),
            3 => Some(Self::Texture),
            4 => Some(Self::Sampler),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BufferInfo {
    pub size: u32,
}

// tag values are shared with the asset format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[repr(u8)]
pub enum TextureSampleKind {
    Float = 2,
    UnfilterableFloat = 3,
    Depth = 4,
    Sint = 5,
    Uint = 6,
}

impl TextureSampleKind {
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            2 => Some(Self::Float),
            3 => Some(Self::UnfilterableFloat),
            4 => Some(Self::Depth),
            5 => Some(Self::Sint),
            6 => Some(Self::Uint),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[repr(u8)]
pub enum ViewDimension {
    D1 = 1,
    D2 = 2,
    D2Array = 3,
    Cube = 4,
    CubeArray = 5,
    D3 = 6,
}

impl ViewDimension {
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(Self::D1),
            2 => Some(Self::D2),
            3 => Some(Self::D2Array),
            4 => Some(Self::Cube),
            5 => Some(Self::CubeArray),
            6 => Some(Self::D3),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextureInfo {
    pub sample_kind: TextureSampleKind,
    pub view_dimension: ViewDimension,
    pub multisampled: bool,
}

impl TextureInfo {
    /// a plain filterable 2d texture
    pub fn float_2d() -> Self {
        Self {
            sample_kind: TextureSampleKind::Float,
            view_dimension: ViewDimension::D2,
            multisampled: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[repr(u8)]
pub enum SamplerKind {
    Filtering = 2,
    NonFiltering = 3,
    Comparison = 4,
}

impl SamplerKind {
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            2 => Some(Self::Filtering),
            3 => Some(Self::NonFiltering),
            4 => Some(Self::Comparison),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SamplerInfo {
    pub kind: SamplerKind,
}

/// the resource bound at a slot, with the payload that only makes sense for its kind
///
/// tagged by "type"; [`SamplerInfo`] already owns a `kind` key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BindingResource {
    UniformBuffer(BufferInfo),
    StorageBuffer(BufferInfo),
    ReadOnlyStorage(BufferInfo),
    Texture(TextureInfo),
    Sampler(SamplerInfo),
}

impl BindingResource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::UniformBuffer(_) => ResourceKind::UniformBuffer,
            Self::StorageBuffer(_) => ResourceKind::StorageBuffer,
            Self::ReadOnlyStorage(_) => ResourceKind::ReadOnlyStorage,
            Self::Texture(_) => ResourceKind::Texture,
            Self::Sampler(_) => ResourceKind::Sampler,
        }
    }

    pub fn uniform_buffer(size: u32) -> Self {
        Self::UniformBuffer(BufferInfo { size })
    }

    pub fn buffer_size(&self) -> Option<u32> {
        match self {
            Self::UniformBuffer(info) | Self::StorageBuffer(info) | Self::ReadOnlyStorage(info) => {
                Some(info.size)
            }
            Self::Texture(_) | Self::Sampler(_) => None,
        }
    }
}

/// one flattened resource binding of a shader
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BindingDescriptor {
    pub set: u32,
    pub slot: u32,
    pub id: PropertyId,
    pub visibility: Visibility,
    pub resource: BindingResource,
    /// descriptors in the binding array; 1 for a single resource
    pub count: u32,
    pub name: String,
}

impl BindingDescriptor {
    /// names longer than [`MAX_BINDING_NAME_LEN`] are truncated at a char boundary
    pub fn new(
        set: u32,
        slot: u32,
        resource: BindingResource,
        visibility: Visibility,
        name: &str,
    ) -> Self {
        let name = truncate_name(name).to_string();

        Self {
            set,
            slot,
            id: property_id(&name),
            visibility,
            resource,
            count: 1,
            name,
        }
    }

    pub fn with_count(mut self, count: u32) -> Self {
        self.count = count;
        self
    }

    pub fn kind(&self) -> ResourceKind {
        self.resource.kind()
    }

    /// the (set, slot) ordering every reflection is sorted by
    pub fn location(&self) -> (u32, u32) {
        (self.set, self.slot)
    }
}

fn truncate_name(name: &str) -> &str {
    if name.len() <= MAX_BINDING_NAME_LEN {
        return name;
    }

    let mut end = MAX_BINDING_NAME_LEN;
    while !name.is_char_boundary(end) {
        end -= 1;
    }

    &name[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property_id_is_stable() {
        assert_eq!(property_id(""), 0);
        assert_eq!(property_id("a"), 97);
        // 97 * 31 + 98
        assert_eq!(property_id("ab"), 3105);
        assert_eq!(property_id("gMaterial.albedo"), property_id("gMaterial.albedo"));
        assert_ne!(property_id("albedo"), property_id("normal"));
    }

    #[test]
    fn long_names_are_truncated_on_char_boundary() {
        let long = "é".repeat(20);
        let binding = BindingDescriptor::new(
            0,
            0,
            BindingResource::uniform_buffer(16),
            Visibility::VERTEX,
            &long,
        );

        assert!(binding.name.len() <= MAX_BINDING_NAME_LEN);
        assert_eq!(binding.name, "é".repeat(15));
        assert_eq!(binding.id, property_id(&binding.name));
    }

    #[test]
    fn visibility_display() {
        assert_eq!(Visibility::empty().to_string(), "none");
        assert_eq!(Visibility::FRAGMENT.to_string(), "fragment");
        assert_eq!(
            (Visibility::VERTEX | Visibility::FRAGMENT).to_string(),
            "vertex|fragment"
        );
    }

    #[test]
    fn resource_kind_follows_payload() {
        let texture = BindingResource::Texture(TextureInfo::float_2d());
        assert_eq!(texture.kind(), ResourceKind::Texture);
        assert_eq!(texture.buffer_size(), None);

        let storage = BindingResource::ReadOnlyStorage(BufferInfo { size: 256 });
        assert_eq!(storage.kind(), ResourceKind::ReadOnlyStorage);
        assert_eq!(storage.buffer_size(), Some(256));
    }

    #[test]
    fn sampler_json_keeps_its_kind() {
        let binding = BindingDescriptor::new(
            2,
            3,
            BindingResource::Sampler(SamplerInfo {
                kind: SamplerKind::Comparison,
            }),
            Visibility::FRAGMENT,
            "shadowSampler",
        )
        .with_count(2);

        let json = serde_json::to_value(&binding).unwrap();
        assert_eq!(
            json["resource"],
            serde_json::json!({ "type": "sampler", "kind": "comparison" })
        );
        assert_eq!(json["count"], 2);

        let parsed: BindingDescriptor = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, binding);
    }
}
