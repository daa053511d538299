//! Structural assignability.
//!
//! Rules:
//! - Tags are invisible unless the target itself is tagged
//! - A union candidate must fit entirely; a union target needs one fitting member
//! - `TypedDict` and `HasKeys` use width subtyping: the candidate may know more fields
//! - `HasKeys` fits its keyless `Object` base, never the other way around

use crate::types::{Type, TypeMap};

impl Type {
    /// Whether a value of type `candidate` may be used where `self` is expected.
    #[inline]
    pub fn accepts(&self, candidate: &Type) -> bool {
        assign(self, candidate)
    }
}

/// Whether `candidate` is assignable to `target`.
pub fn assign(target: &Type, candidate: &Type) -> bool {
    if let Type::Union { members } = candidate {
        return members.iter().all(|member| assign(target, member));
    }

    match (target, candidate) {
        (Type::Any, _) => true,
        (Type::Invalid, Type::Invalid) => true,
        (_, Type::Invalid) => false,

        (
            Type::Tagged {
                tags: target_tags,
                value: target_value,
            },
            Type::Tagged {
                tags: candidate_tags,
                value: candidate_value,
            },
        ) => covers(target_tags, candidate_tags) && assign(target_value, candidate_value),
        (Type::Tagged { .. }, _) => false,
        (_, Type::Tagged { value, .. }) => assign(target, value),

        (Type::Union { members }, _) => members.iter().any(|member| assign(member, candidate)),

        (
            Type::Const {
                inner: target_inner,
                value: target_value,
            },
            Type::Const {
                inner: candidate_inner,
                value: candidate_value,
            },
        ) => target_value == candidate_value && assign(target_inner, candidate_inner),
        (Type::Const { .. }, _) => false,
        (_, Type::Const { inner, .. }) => assign(target, inner),

        (Type::List { element: target }, Type::List { element: candidate }) => {
            assign(target, candidate)
        }
        (Type::TypedDict { fields: target }, Type::TypedDict { fields: candidate }) => {
            covers(target, candidate)
        }
        (
            Type::Function {
                params: target_params,
                output: target_output,
            },
            Type::Function {
                params: candidate_params,
                output: candidate_output,
            },
        ) => {
            // Parameters are contravariant.
            target_params.len() == candidate_params.len()
                && target_params.iter().all(|(name, target_param)| {
                    candidate_params
                        .get(name)
                        .is_some_and(|candidate_param| assign(candidate_param, target_param))
                })
                && assign(target_output, candidate_output)
        }

        (Type::Object { class: target }, Type::Object { class: candidate })
        | (Type::Object { class: target }, Type::HasKeys { class: candidate, .. }) => {
            target == candidate
        }
        (
            Type::HasKeys {
                class: target_class,
                keys: target_keys,
            },
            Type::HasKeys {
                class: candidate_class,
                keys: candidate_keys,
            },
        ) => target_class == candidate_class && covers(target_keys, candidate_keys),

        _ => target == candidate,
    }
}

/// Every member of `target` exists in `candidate` with an assignable type.
fn covers(target: &TypeMap, candidate: &TypeMap) -> bool {
    target.iter().all(|(name, target_ty)| {
        candidate
            .get(name)
            .is_some_and(|candidate_ty| assign(target_ty, candidate_ty))
    })
}
