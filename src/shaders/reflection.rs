use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ReflectionError;

use super::{BindingDescriptor, Visibility};

mod extract;
pub use extract::*;

mod merge;
pub use merge::*;

#[cfg(feature = "slang")]
pub mod slang;

/// set 0 is global frame data, 1..3 are per-material/per-draw
pub const MAX_BIND_GROUPS: usize = 4;

/// a contiguous range of a reflection's bindings belonging to one set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GroupRange {
    pub offset: u32,
    pub count: u32,
}

/// the flattened bindings of one shader (or of several merged stages)
///
/// bindings are sorted by (set, slot) with no duplicates,
/// and every set index is below [`MAX_BIND_GROUPS`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShaderReflection {
    bindings: Vec<BindingDescriptor>,
    groups: [GroupRange; MAX_BIND_GROUPS],
    stage_visibility: Visibility,
}

impl ShaderReflection {
    pub fn from_bindings(
        mut bindings: Vec<BindingDescriptor>,
        stage_visibility: Visibility,
    ) -> Result<Self, ReflectionError> {
        bindings.sort_by_key(BindingDescriptor::location);

        for pair in bindings.windows(2) {
            let (first, second) = (&pair[0], &pair[1]);
            if first.location() == second.location() {
                return Err(ReflectionError::DuplicateBinding {
                    set: first.set,
                    slot: first.slot,
                    first: first.name.clone(),
                    second: second.name.clone(),
                });
            }
        }

        let groups = group_ranges(&bindings)?;

        Ok(Self {
            bindings,
            groups,
            stage_visibility,
        })
    }

    pub fn empty(stage_visibility: Visibility) -> Self {
        Self {
            bindings: vec![],
            groups: Default::default(),
            stage_visibility,
        }
    }

    pub fn bindings(&self) -> &[BindingDescriptor] {
        &self.bindings
    }

    pub fn groups(&self) -> &[GroupRange; MAX_BIND_GROUPS] {
        &self.groups
    }

    /// the bindings of one set, empty if the set is unused or out of range
    pub fn group(&self, set: usize) -> &[BindingDescriptor] {
        let Some(range) = self.groups.get(set) else {
            return &[];
        };

        let start = range.offset as usize;
        let end = start + range.count as usize;
        &self.bindings[start..end]
    }

    pub fn stage_visibility(&self) -> Visibility {
        self.stage_visibility
    }

    pub fn set_stage_visibility(&mut self, stage_visibility: Visibility) {
        self.stage_visibility = stage_visibility;
    }

    pub fn find(&self, id: super::PropertyId) -> Option<&BindingDescriptor> {
        self.bindings.iter().find(|binding| binding.id == id)
    }
}

/// a single scan over sorted bindings, recording each set's first offset and count
fn group_ranges(
    bindings: &[BindingDescriptor],
) -> Result<[GroupRange; MAX_BIND_GROUPS], ReflectionError> {
    let mut groups = [GroupRange::default(); MAX_BIND_GROUPS];

    for (index, binding) in bindings.iter().enumerate() {
        let Some(group) = groups.get_mut(binding.set as usize) else {
            return Err(ReflectionError::SetOutOfRange {
                name: binding.name.clone(),
                set: binding.set,
                max: MAX_BIND_GROUPS,
            });
        };

        if group.count == 0 {
            group.offset = index as u32;
        }
        group.count += 1;
    }

    Ok(groups)
}

impl fmt::Display for ShaderReflection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "stages: {}", self.stage_visibility)?;
        for binding in &self.bindings {
            write!(
                f,
                "set {} slot {} {:?} [{}]",
                binding.set,
                binding.slot,
                binding.kind(),
                binding.visibility,
            )?;
            if let Some(size) = binding.resource.buffer_size() {
                write!(f, " size={size}")?;
            }
            if binding.count > 1 {
                write!(f, " count={}", binding.count)?;
            }
            writeln!(f, " {}", binding.name)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shaders::{BindingResource, SamplerInfo, SamplerKind, TextureInfo};

    fn texture(set: u32, slot: u32, name: &str) -> BindingDescriptor {
        BindingDescriptor::new(
            set,
            slot,
            BindingResource::Texture(TextureInfo::float_2d()),
            Visibility::FRAGMENT,
            name,
        )
    }

    #[test]
    fn groups_cover_all_bindings() {
        let sampler = BindingDescriptor::new(
            3,
            1,
            BindingResource::Sampler(SamplerInfo {
                kind: SamplerKind::Filtering,
            }),
            Visibility::FRAGMENT,
            "linearSampler",
        );
        let camera = BindingDescriptor::new(
            0,
            0,
            BindingResource::uniform_buffer(64),
            Visibility::VERTEX,
            "camera",
        );

        // deliberately unsorted input
        let bindings = vec![sampler, texture(1, 0, "albedo"), camera, texture(1, 1, "normal")];
        let reflection = ShaderReflection::from_bindings(bindings, Visibility::FRAGMENT).unwrap();

        let locations: Vec<_> = reflection.bindings().iter().map(|b| b.location()).collect();
        assert_eq!(locations, vec![(0, 0), (1, 0), (1, 1), (3, 1)]);

        assert_eq!(reflection.groups()[0], GroupRange { offset: 0, count: 1 });
        assert_eq!(reflection.groups()[1], GroupRange { offset: 1, count: 2 });
        assert_eq!(reflection.groups()[2], GroupRange { offset: 0, count: 0 });
        assert_eq!(reflection.groups()[3], GroupRange { offset: 3, count: 1 });

        let covered: u32 = reflection.groups().iter().map(|g| g.count).sum();
        assert_eq!(covered as usize, reflection.bindings().len());

        assert!(reflection.group(2).is_empty());
        assert_eq!(reflection.group(1)[1].name, "normal");
        assert!(reflection.group(7).is_empty());
    }

    #[test]
    fn duplicate_locations_are_rejected() {
        let bindings = vec![texture(1, 0, "albedo"), texture(1, 0, "normal")];
        let err = ShaderReflection::from_bindings(bindings, Visibility::FRAGMENT).unwrap_err();

        assert_eq!(
            err,
            ReflectionError::DuplicateBinding {
                set: 1,
                slot: 0,
                first: "albedo".to_string(),
                second: "normal".to_string(),
            }
        );
    }

    #[test]
    fn sets_past_the_last_group_are_rejected() {
        let err =
            ShaderReflection::from_bindings(vec![texture(4, 0, "extra")], Visibility::FRAGMENT)
                .unwrap_err();

        insta::assert_snapshot!(
            err.to_string(),
            @"binding 'extra' uses set 4, but only 4 bind groups are supported"
        );
    }

    #[test]
    fn display_lists_bindings() {
        let bindings = vec![
            BindingDescriptor::new(
                0,
                0,
                BindingResource::uniform_buffer(80),
                Visibility::VERTEX | Visibility::FRAGMENT,
                "PerFrameUniforms",
            ),
            texture(1, 0, "gMaterial.albedoMap"),
            texture(1, 1, "gShadowCascades").with_count(4),
        ];
        let reflection =
            ShaderReflection::from_bindings(bindings, Visibility::VERTEX | Visibility::FRAGMENT)
                .unwrap();

        insta::assert_snapshot!(reflection.to_string(), @r"
        stages: vertex|fragment
        set 0 slot 0 UniformBuffer [vertex|fragment] size=80 PerFrameUniforms
        set 1 slot 0 Texture [fragment] gMaterial.albedoMap
        set 1 slot 1 Texture [fragment] count=4 gShadowCascades
        ");
    }
}
