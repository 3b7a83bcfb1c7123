use std::path::Path;

use glam::UVec3;

use crate::error::{FormatError, ReflectionError, ShaderLoadError};

use super::{
    BindingDescriptor, BindingResource, BufferInfo, MAX_BINDING_NAME_LEN, ResourceKind,
    SamplerInfo, SamplerKind, ShaderReflection, TextureInfo, TextureSampleKind, ViewDimension,
    Visibility,
};

/// "SHDR" read as a little-endian u32
pub const SHADER_ASSET_MAGIC: u32 = 0x52444853;
/// older versions are rejected, not migrated
pub const SHADER_ASSET_VERSION: u16 = 4;

pub const HEADER_SIZE: usize = 64;
pub const BINDING_STRIDE: usize = 64;

/// NUL-padded name fields in the header and in each binding record
const NAME_FIELD_SIZE: usize = 32;

// header offsets
const MAGIC: usize = 0;
const VERSION: usize = 4;
const BINDING_COUNT: usize = 6;
const CODE_SIZE: usize = 8;
const THREAD_GROUP_SIZE: usize = 12;
const ENTRY_STAGE: usize = 24;
const ENTRY_POINT: usize = 32;

// binding record offsets
const SET: usize = 0;
const SLOT: usize = 4;
const ID: usize = 8;
const KIND: usize = 12;
const VISIBILITY: usize = 13;
const PAYLOAD: usize = 16;
const NAME: usize = 20;
const ARRAY_COUNT: usize = 52;

/// a compiled shader stage with its binding table, as stored on disk
///
/// layout: a 64-byte header, then `bindings.len()` 64-byte records sorted by (set, slot),
/// then the code bytes, all little-endian
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderAsset {
    pub entry_stage: Visibility,
    /// only meaningful for compute shaders
    pub thread_group_size: UVec3,
    pub entry_point: String,
    pub bindings: Vec<BindingDescriptor>,
    pub code: Vec<u8>,
}

impl ShaderAsset {
    pub fn from_reflection(
        reflection: &ShaderReflection,
        entry_point: &str,
        thread_group_size: UVec3,
        code: Vec<u8>,
    ) -> Self {
        Self {
            entry_stage: reflection.stage_visibility(),
            thread_group_size,
            entry_point: entry_point.to_string(),
            bindings: reflection.bindings().to_vec(),
            code,
        }
    }

    /// rebuilds the grouped reflection from the decoded binding table
    pub fn reflection(&self) -> Result<ShaderReflection, ReflectionError> {
        ShaderReflection::from_bindings(self.bindings.clone(), self.entry_stage)
    }

    pub fn encoded_size(&self) -> u64 {
        HEADER_SIZE as u64
            + self.bindings.len() as u64 * BINDING_STRIDE as u64
            + self.code.len() as u64
    }

    pub fn encode(&self) -> Result<Vec<u8>, FormatError> {
        let binding_count =
            u16::try_from(self.bindings.len()).map_err(|_| FormatError::TooManyBindings {
                count: self.bindings.len(),
            })?;
        let code_size = u32::try_from(self.code.len()).map_err(|_| FormatError::CodeTooLarge {
            size: self.code.len(),
        })?;

        let mut bytes = Vec::with_capacity(self.encoded_size() as usize);

        bytes.extend_from_slice(&SHADER_ASSET_MAGIC.to_le_bytes());
        bytes.extend_from_slice(&SHADER_ASSET_VERSION.to_le_bytes());
        bytes.extend_from_slice(&binding_count.to_le_bytes());
        bytes.extend_from_slice(&code_size.to_le_bytes());
        for axis in self.thread_group_size.to_array() {
            bytes.extend_from_slice(&axis.to_le_bytes());
        }
        bytes.push(self.entry_stage.bits());
        bytes.resize(ENTRY_POINT, 0);
        write_name(&mut bytes, &self.entry_point)?;
        debug_assert_eq!(bytes.len(), HEADER_SIZE);

        let mut sorted: Vec<&BindingDescriptor> = self.bindings.iter().collect();
        sorted.sort_by_key(|binding| binding.location());

        for binding in sorted {
            let record_start = bytes.len();

            bytes.extend_from_slice(&binding.set.to_le_bytes());
            bytes.extend_from_slice(&binding.slot.to_le_bytes());
            bytes.extend_from_slice(&binding.id.to_le_bytes());
            bytes.push(binding.kind() as u8);
            bytes.push(binding.visibility.bits());
            bytes.resize(record_start + PAYLOAD, 0);
            bytes.extend_from_slice(&encode_payload(&binding.resource));
            write_name(&mut bytes, &binding.name)?;
            bytes.extend_from_slice(&binding.count.to_le_bytes());
            bytes.resize(record_start + BINDING_STRIDE, 0);
        }

        bytes.extend_from_slice(&self.code);

        Ok(bytes)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, FormatError> {
        if bytes.len() < HEADER_SIZE {
            return Err(FormatError::TooSmall {
                len: bytes.len(),
                header_size: HEADER_SIZE,
            });
        }

        let magic = read_u32_le(bytes, MAGIC);
        if magic != SHADER_ASSET_MAGIC {
            return Err(FormatError::BadMagic {
                expected: SHADER_ASSET_MAGIC,
                found: magic,
            });
        }

        let version = read_u16_le(bytes, VERSION);
        if version != SHADER_ASSET_VERSION {
            return Err(FormatError::UnsupportedVersion {
                found: version,
                supported: SHADER_ASSET_VERSION,
            });
        }

        let binding_count = read_u16_le(bytes, BINDING_COUNT) as usize;
        let code_size = read_u32_le(bytes, CODE_SIZE) as usize;

        // u64 so a hostile code size cannot wrap on 32-bit targets
        let declared =
            HEADER_SIZE as u64 + (binding_count * BINDING_STRIDE) as u64 + code_size as u64;
        if declared > bytes.len() as u64 {
            return Err(FormatError::Truncated {
                declared,
                actual: bytes.len(),
            });
        }

        let thread_group_size = UVec3::new(
            read_u32_le(bytes, THREAD_GROUP_SIZE),
            read_u32_le(bytes, THREAD_GROUP_SIZE + 4),
            read_u32_le(bytes, THREAD_GROUP_SIZE + 8),
        );
        let entry_stage = Visibility::from_bits_truncate(bytes[ENTRY_STAGE]);
        let entry_point = read_name(&bytes[ENTRY_POINT..ENTRY_POINT + NAME_FIELD_SIZE]);

        let table_end = HEADER_SIZE + binding_count * BINDING_STRIDE;
        let bindings = bytes[HEADER_SIZE..table_end]
            .chunks_exact(BINDING_STRIDE)
            .enumerate()
            .map(|(index, record)| decode_binding(index, record))
            .collect::<Result<Vec<_>, _>>()?;

        let code = bytes[table_end..table_end + code_size].to_vec();

        Ok(Self {
            entry_stage,
            thread_group_size,
            entry_point,
            bindings,
            code,
        })
    }

    pub fn read_from_file(path: impl AsRef<Path>) -> Result<Self, ShaderLoadError> {
        let path = path.as_ref();

        let bytes = std::fs::read(path).map_err(|source| ShaderLoadError::Io {
            path: path.display().to_string(),
            source,
        })?;

        Self::decode(&bytes).map_err(|source| ShaderLoadError::Format {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn write_to_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, self.encode()?)?;

        Ok(())
    }
}

fn encode_payload(resource: &BindingResource) -> [u8; 4] {
    match resource {
        BindingResource::UniformBuffer(info)
        | BindingResource::StorageBuffer(info)
        | BindingResource::ReadOnlyStorage(info) => info.size.to_le_bytes(),
        BindingResource::Texture(info) => [
            info.sample_kind as u8,
            info.view_dimension as u8,
            info.multisampled as u8,
            0,
        ],
        BindingResource::Sampler(info) => [info.kind as u8, 0, 0, 0],
    }
}

fn decode_binding(index: usize, record: &[u8]) -> Result<BindingDescriptor, FormatError> {
    let invalid = |field, value: u8| FormatError::InvalidField {
        index,
        field,
        value: value.into(),
    };

    let kind_tag = record[KIND];
    let kind = ResourceKind::from_tag(kind_tag).ok_or(invalid("resource kind", kind_tag))?;

    let visibility_bits = record[VISIBILITY];
    let visibility =
        Visibility::from_bits(visibility_bits).ok_or(invalid("visibility", visibility_bits))?;

    let count = read_u32_le(record, ARRAY_COUNT);
    if count == 0 {
        return Err(FormatError::InvalidField {
            index,
            field: "array count",
            value: count,
        });
    }

    let payload = &record[PAYLOAD..PAYLOAD + 4];
    let buffer = || BufferInfo {
        size: read_u32_le(payload, 0),
    };

    let resource = match kind {
        ResourceKind::UniformBuffer => BindingResource::UniformBuffer(buffer()),
        ResourceKind::StorageBuffer => BindingResource::StorageBuffer(buffer()),
        ResourceKind::ReadOnlyStorage => BindingResource::ReadOnlyStorage(buffer()),
        ResourceKind::Texture => {
            let sample_kind = TextureSampleKind::from_tag(payload[0])
                .ok_or(invalid("texture sample kind", payload[0]))?;
            let view_dimension = ViewDimension::from_tag(payload[1])
                .ok_or(invalid("texture view dimension", payload[1]))?;
            let multisampled = match payload[2] {
                0 => false,
                1 => true,
                other => return Err(invalid("texture multisampled", other)),
            };

            BindingResource::Texture(TextureInfo {
                sample_kind,
                view_dimension,
                multisampled,
            })
        }
        ResourceKind::Sampler => {
            let kind =
                SamplerKind::from_tag(payload[0]).ok_or(invalid("sampler kind", payload[0]))?;
            BindingResource::Sampler(SamplerInfo { kind })
        }
    };

    Ok(BindingDescriptor {
        set: read_u32_le(record, SET),
        slot: read_u32_le(record, SLOT),
        id: read_u32_le(record, ID),
        visibility,
        resource,
        count,
        name: read_name(&record[NAME..NAME + NAME_FIELD_SIZE]),
    })
}

fn write_name(bytes: &mut Vec<u8>, name: &str) -> Result<(), FormatError> {
    if name.len() > MAX_BINDING_NAME_LEN {
        return Err(FormatError::NameTooLong {
            name: name.to_string(),
            max: MAX_BINDING_NAME_LEN,
        });
    }

    let mut field = [0u8; NAME_FIELD_SIZE];
    field[..name.len()].copy_from_slice(name.as_bytes());
    bytes.extend_from_slice(&field);

    Ok(())
}

fn read_name(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

// callers check bounds against the declared sizes first

fn read_u16_le(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

fn read_u32_le(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}
