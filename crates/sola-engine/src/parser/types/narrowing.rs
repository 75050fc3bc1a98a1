//! Type narrowing
//!
//! Refines a variable's static type inside a branch guarded by an `is` test
//! or a null comparison.

use super::compat::TypeRelation;
use super::ty::Type;

/// Narrow `original` after a type test against `check`.
///
/// A positive test yields `check` when it is compatible with `original`; a
/// negative test against a union removes `check` from the set. Anything else
/// leaves `original` unchanged.
pub fn narrow_type(original: &Type, check: &Type, positive: bool, relation: &TypeRelation<'_>) -> Type {
    if original.is_error() || check.is_error() {
        return original.clone();
    }
    if positive {
        if relation.is_compatible(check, original) {
            return check.clone();
        }
        if let Type::Union(members) = original {
            // `Dog|null is Animal` keeps the members that pass the test
            let kept: Vec<Type> = members
                .iter()
                .filter(|m| relation.is_compatible(m, check))
                .cloned()
                .collect();
            if !kept.is_empty() {
                return Type::union(kept);
            }
        }
        return original.clone();
    }
    match original {
        Type::Union(members) => {
            let kept: Vec<Type> = members.iter().filter(|m| *m != check).cloned().collect();
            if kept.is_empty() || kept.len() == members.len() {
                original.clone()
            } else {
                Type::union(kept)
            }
        }
        _ => original.clone(),
    }
}

/// One narrowing fact extracted from a condition: `var` has type `ty`
/// (positive) or does not (negative).
#[derive(Debug, Clone, PartialEq)]
pub struct TypeGuard {
    pub var: String,
    pub ty: Type,
    pub positive: bool,
}

impl TypeGuard {
    pub fn negate(&self) -> Self {
        Self {
            var: self.var.clone(),
            ty: self.ty.clone(),
            positive: !self.positive,
        }
    }
}
