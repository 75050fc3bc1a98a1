//! Core type representation

use std::fmt;

use crate::parser::ast::TypeNode;

/// Sized integer variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntKind {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    Byte,
}

impl IntKind {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "i8" => IntKind::I8,
            "i16" => IntKind::I16,
            "i32" => IntKind::I32,
            "i64" => IntKind::I64,
            "u8" => IntKind::U8,
            "u16" => IntKind::U16,
            "u32" => IntKind::U32,
            "u64" => IntKind::U64,
            "byte" => IntKind::Byte,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            IntKind::I8 => "i8",
            IntKind::I16 => "i16",
            IntKind::I32 => "i32",
            IntKind::I64 => "i64",
            IntKind::U8 => "u8",
            IntKind::U16 => "u16",
            IntKind::U32 => "u32",
            IntKind::U64 => "u64",
            IntKind::Byte => "byte",
        }
    }
}

/// Sized float variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatKind {
    F32,
    F64,
}

impl FloatKind {
    pub fn name(self) -> &'static str {
        match self {
            FloatKind::F32 => "f32",
            FloatKind::F64 => "f64",
        }
    }
}

/// Multi-letter names that always denote a type parameter
const WELL_KNOWN_TYPE_PARAMS: &[&str] = &[
    "TKey", "TValue", "TResult", "TElement", "Key", "Value", "Element",
];

/// Whether `name` is spelled like a type parameter: a single upper-case letter
/// or one of the well-known multi-letter names.
pub fn is_type_param_name(name: &str) -> bool {
    let mut chars = name.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => c.is_ascii_uppercase(),
        _ => WELL_KNOWN_TYPE_PARAMS.contains(&name),
    }
}

/// Strip generic arguments: `Box<int>` → `Box`
pub fn base_name(name: &str) -> &str {
    match name.find('<') {
        Some(idx) => &name[..idx],
        None => name,
    }
}

/// Last namespace segment: `App\Models\User` → `User`
pub fn last_segment(name: &str) -> &str {
    let base = base_name(name);
    match base.rfind('\\') {
        Some(idx) => &base[idx + 1..],
        None => base,
    }
}

/// A static type.
///
/// Unions compare as sets; everything else compares structurally.
#[derive(Debug, Clone)]
pub enum Type {
    Int,
    Float,
    Bool,
    String,
    Null,
    Void,
    Dynamic,
    /// Sentinel produced after a diagnostic; compatible with everything
    Error,
    /// `$this` outside of any class
    Unknown,
    SizedInt(IntKind),
    SizedFloat(FloatKind),
    /// `T[]`
    Array(Box<Type>),
    /// `T[N]`
    FixedArray(Box<Type>, usize),
    /// `map[K]V`
    Map(Box<Type>, Box<Type>),
    /// Untyped `array`
    AnyArray,
    /// Untyped `map`
    AnyMap,
    /// PHP-style associative array
    SuperArray,
    Tuple(Vec<Type>),
    Union(Vec<Type>),
    Func {
        params: Vec<Type>,
        ret: Box<Type>,
    },
    /// Class, interface, enum, alias or new-type name
    Named(String),
    /// `Box<int>`
    Generic {
        base: String,
        args: Vec<Type>,
    },
    /// Unbound type parameter
    Param(String),
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        use Type::*;
        match (self, other) {
            (Int, Int)
            | (Float, Float)
            | (Bool, Bool)
            | (String, String)
            | (Null, Null)
            | (Void, Void)
            | (Dynamic, Dynamic)
            | (Error, Error)
            | (Unknown, Unknown)
            | (AnyArray, AnyArray)
            | (AnyMap, AnyMap)
            | (SuperArray, SuperArray) => true,
            (SizedInt(a), SizedInt(b)) => a == b,
            (SizedFloat(a), SizedFloat(b)) => a == b,
            (Array(a), Array(b)) => a == b,
            (FixedArray(a, n), FixedArray(b, m)) => n == m && a == b,
            (Map(k1, v1), Map(k2, v2)) => k1 == k2 && v1 == v2,
            (Tuple(a), Tuple(b)) => a == b,
            (Union(a), Union(b)) => {
                a.len() == b.len() && a.iter().all(|m| b.contains(m))
            }
            (
                Func { params: p1, ret: r1 },
                Func { params: p2, ret: r2 },
            ) => p1 == p2 && r1 == r2,
            (Named(a), Named(b)) => a == b,
            (Generic { base: b1, args: a1 }, Generic { base: b2, args: a2 }) => {
                b1 == b2 && a1 == a2
            }
            (Param(a), Param(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Type {}

impl Type {
    pub fn named(name: impl Into<std::string::String>) -> Self {
        Type::Named(name.into())
    }

    pub fn array(element: Type) -> Self {
        Type::Array(Box::new(element))
    }

    pub fn map(key: Type, value: Type) -> Self {
        Type::Map(Box::new(key), Box::new(value))
    }

    pub fn func(params: Vec<Type>, ret: Type) -> Self {
        Type::Func {
            params,
            ret: Box::new(ret),
        }
    }

    /// Resolve a primitive spelling (`int`, `u8`, `array`, ...)
    pub fn primitive(name: &str) -> Option<Self> {
        Some(match name {
            "int" => Type::Int,
            "float" => Type::Float,
            "bool" => Type::Bool,
            "string" => Type::String,
            "null" => Type::Null,
            "void" => Type::Void,
            "dynamic" | "mixed" => Type::Dynamic,
            "error" => Type::Error,
            "unknown" => Type::Unknown,
            "array" => Type::AnyArray,
            "map" => Type::AnyMap,
            "SuperArray" => Type::SuperArray,
            "f32" => Type::SizedFloat(FloatKind::F32),
            "f64" => Type::SizedFloat(FloatKind::F64),
            other => Type::SizedInt(IntKind::from_name(other)?),
        })
    }

    /// Resolve a bare name: primitive, type parameter or nominal type
    pub fn from_name(name: &str) -> Self {
        if let Some(prim) = Type::primitive(name) {
            prim
        } else if is_type_param_name(name) {
            Type::Param(name.to_string())
        } else {
            Type::Named(name.to_string())
        }
    }

    /// Build a union, flattening nested unions and dropping duplicates.
    /// A single remaining member is returned as-is.
    pub fn union(members: impl IntoIterator<Item = Type>) -> Self {
        let mut flat: Vec<Type> = Vec::new();
        for member in members {
            match member {
                Type::Union(inner) => {
                    for m in inner {
                        if !flat.contains(&m) {
                            flat.push(m);
                        }
                    }
                }
                other => {
                    if !flat.contains(&other) {
                        flat.push(other);
                    }
                }
            }
        }
        if flat.len() == 1 {
            flat.pop().unwrap_or(Type::Void)
        } else {
            Type::Union(flat)
        }
    }

    /// `T|null`
    pub fn nullable(self) -> Self {
        Type::union([self, Type::Null])
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Type::Error)
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self, Type::Dynamic)
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Type::Void)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Type::Null)
    }

    pub fn is_int_family(&self) -> bool {
        matches!(self, Type::Int | Type::SizedInt(_))
    }

    pub fn is_float_family(&self) -> bool {
        matches!(self, Type::Float | Type::SizedFloat(_))
    }

    pub fn is_numeric(&self) -> bool {
        self.is_int_family() || self.is_float_family()
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Type::String)
    }

    pub fn is_array_like(&self) -> bool {
        matches!(self, Type::Array(_) | Type::FixedArray(..) | Type::AnyArray)
    }

    /// Whether `null` is one of the union members
    pub fn is_nullable(&self) -> bool {
        match self {
            Type::Null => true,
            Type::Union(members) => members.iter().any(Type::is_null),
            _ => false,
        }
    }

    /// Remove `null` from a union
    pub fn without_null(&self) -> Type {
        match self {
            Type::Union(members) => {
                Type::union(members.iter().filter(|m| !m.is_null()).cloned())
            }
            other => other.clone(),
        }
    }

    /// Element type of an array-like type
    pub fn element_type(&self) -> Option<&Type> {
        match self {
            Type::Array(el) | Type::FixedArray(el, _) => Some(el),
            _ => None,
        }
    }

    /// Nominal base name for `Named` and `Generic`
    pub fn nominal_name(&self) -> Option<&str> {
        match self {
            Type::Named(n) => Some(n),
            Type::Generic { base, .. } => Some(base),
            _ => None,
        }
    }

    /// Whether any type parameter occurs inside this type
    pub fn has_params(&self) -> bool {
        match self {
            Type::Param(_) => true,
            Type::Array(el) | Type::FixedArray(el, _) => el.has_params(),
            Type::Map(k, v) => k.has_params() || v.has_params(),
            Type::Tuple(ms) | Type::Union(ms) => ms.iter().any(Type::has_params),
            Type::Generic { args, .. } => args.iter().any(Type::has_params),
            Type::Func { params, ret } => params.iter().any(Type::has_params) || ret.has_params(),
            _ => false,
        }
    }

    /// Convert an annotation, treating any name in `type_params` as a parameter
    pub fn from_node_with(node: &TypeNode, type_params: &[std::string::String]) -> Self {
        let convert = |n: &TypeNode| Type::from_node_with(n, type_params);
        match node {
            TypeNode::Simple(name) | TypeNode::Class(name) => {
                if type_params.iter().any(|p| p == name) {
                    Type::Param(name.clone())
                } else {
                    Type::from_name(name)
                }
            }
            TypeNode::TypeParameter(name) => Type::Param(name.clone()),
            TypeNode::Array { element, size } => match size {
                Some(n) => Type::FixedArray(Box::new(convert(element)), *n),
                None => Type::Array(Box::new(convert(element))),
            },
            TypeNode::Map(k, v) => Type::map(convert(k), convert(v)),
            TypeNode::Nullable(inner) => convert(inner).nullable(),
            TypeNode::Tuple(members) => Type::Tuple(members.iter().map(convert).collect()),
            TypeNode::Union(members) => Type::union(members.iter().map(convert)),
            TypeNode::Null => Type::Null,
            TypeNode::Generic { base, args } => Type::Generic {
                base: base.clone(),
                args: args.iter().map(convert).collect(),
            },
            TypeNode::Func { params, ret } => {
                Type::func(params.iter().map(convert).collect(), convert(ret))
            }
        }
    }

    pub fn from_node(node: &TypeNode) -> Self {
        Type::from_node_with(node, &[])
    }

    /// Whether rendering this type inside `T[]` or a union needs parentheses
    fn needs_parens(&self) -> bool {
        matches!(self, Type::Union(_) | Type::Func { .. } | Type::Map(..))
    }
}

fn join(types: &[Type]) -> std::string::String {
    types
        .iter()
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => write!(f, "int"),
            Type::Float => write!(f, "float"),
            Type::Bool => write!(f, "bool"),
            Type::String => write!(f, "string"),
            Type::Null => write!(f, "null"),
            Type::Void => write!(f, "void"),
            Type::Dynamic => write!(f, "dynamic"),
            Type::Error => write!(f, "error"),
            Type::Unknown => write!(f, "unknown"),
            Type::SizedInt(k) => write!(f, "{}", k.name()),
            Type::SizedFloat(k) => write!(f, "{}", k.name()),
            Type::Array(el) if el.needs_parens() => write!(f, "({})[]", el),
            Type::Array(el) => write!(f, "{}[]", el),
            Type::FixedArray(el, n) if el.needs_parens() => write!(f, "({})[{}]", el, n),
            Type::FixedArray(el, n) => write!(f, "{}[{}]", el, n),
            Type::Map(k, v) if matches!(v.as_ref(), Type::Union(_) | Type::Func { .. }) => {
                write!(f, "map[{}]({})", k, v)
            }
            Type::Map(k, v) => write!(f, "map[{}]{}", k, v),
            Type::AnyArray => write!(f, "array"),
            Type::AnyMap => write!(f, "map"),
            Type::SuperArray => write!(f, "SuperArray"),
            Type::Tuple(members) => write!(f, "({})", join(members)),
            Type::Union(members) => {
                let parts: Vec<_> = members
                    .iter()
                    .map(|m| match m {
                        Type::Func { .. } => format!("({})", m),
                        _ => m.to_string(),
                    })
                    .collect();
                write!(f, "{}", parts.join("|"))
            }
            Type::Func { params, ret } => write!(f, "func({}): {}", join(params), ret),
            Type::Named(n) | Type::Param(n) => write!(f, "{}", n),
            Type::Generic { base, args } => write!(f, "{}<{}>", base, join(args)),
        }
    }
}
