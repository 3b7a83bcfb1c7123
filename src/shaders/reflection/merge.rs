use std::cmp::Ordering;

use crate::error::MergeError;

use super::ShaderReflection;

/// combines the reflections of two stages into one
///
/// bindings at the same (set, slot) must agree on their kind and array count; their
/// visibility is unioned and the first reflection's payload and name are kept
pub fn merge(a: &ShaderReflection, b: &ShaderReflection) -> Result<ShaderReflection, MergeError> {
    let (lhs, rhs) = (a.bindings(), b.bindings());
    let mut merged = Vec::with_capacity(lhs.len() + rhs.len());

    let (mut i, mut j) = (0, 0);
    while i < lhs.len() && j < rhs.len() {
        let (left, right) = (&lhs[i], &rhs[j]);

        match left.location().cmp(&right.location()) {
            Ordering::Less => {
                merged.push(left.clone());
                i += 1;
            }
            Ordering::Greater => {
                merged.push(right.clone());
                j += 1;
            }
            Ordering::Equal => {
                if left.kind() != right.kind() {
                    return Err(MergeError::BindingConflict {
                        set: left.set,
                        slot: left.slot,
                        first: left.kind(),
                        second: right.kind(),
                    });
                }
                if left.count != right.count {
                    return Err(MergeError::CountConflict {
                        set: left.set,
                        slot: left.slot,
                        first: left.count,
                        second: right.count,
                    });
                }

                let mut shared = left.clone();
                shared.visibility |= right.visibility;
                merged.push(shared);
                i += 1;
                j += 1;
            }
        }
    }

    merged.extend_from_slice(&lhs[i..]);
    merged.extend_from_slice(&rhs[j..]);

    let stages = a.stage_visibility() | b.stage_visibility();

    Ok(ShaderReflection::from_bindings(merged, stages)?)
}
