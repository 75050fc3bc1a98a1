//! Sola type system
//!
//! Structured types with set-semantics unions, a parser for the canonical
//! string rendering, compatibility rules, narrowing, and generic
//! substitution. Type names are rendered to strings only for diagnostics.

pub mod compat;
pub mod generics;
pub mod narrowing;
pub mod parse;
pub mod ty;

pub use compat::{is_type_compatible, TypeRelation};
pub use generics::{bind_params, infer_type_args, substitute, type_args, unify, Substitution};
pub use narrowing::{narrow_type, TypeGuard};
pub use parse::TypeParseError;
pub use ty::{base_name, is_type_param_name, last_segment, FloatKind, IntKind, Type};
