//! Type annotation nodes

/// Type annotation as written in source
#[derive(Debug, Clone, PartialEq)]
pub enum TypeNode {
    /// Primitive or otherwise unresolved name: `int`, `string`, `dynamic`
    Simple(String),

    /// Class, interface, enum, alias or new-type name: `App\User`
    Class(String),

    /// `T[]` or fixed-size `T[N]`
    Array {
        element: Box<TypeNode>,
        size: Option<usize>,
    },

    /// `map[K]V`
    Map(Box<TypeNode>, Box<TypeNode>),

    /// `?T`
    Nullable(Box<TypeNode>),

    /// `(T1, T2)`
    Tuple(Vec<TypeNode>),

    /// `A|B`
    Union(Vec<TypeNode>),

    /// `null`
    Null,

    /// `Box<int>`
    Generic { base: String, args: Vec<TypeNode> },

    /// Type parameter reference inside a generic declaration
    TypeParameter(String),

    /// `func(int, string): bool`
    Func {
        params: Vec<TypeNode>,
        ret: Box<TypeNode>,
    },
}

impl TypeNode {
    pub fn simple(name: impl Into<String>) -> Self {
        TypeNode::Simple(name.into())
    }

    pub fn class(name: impl Into<String>) -> Self {
        TypeNode::Class(name.into())
    }

    pub fn array_of(element: TypeNode) -> Self {
        TypeNode::Array {
            element: Box::new(element),
            size: None,
        }
    }

    /// Canonical rendering of the annotation.
    ///
    /// Nullable types render as their inner type; callers add `|null` where
    /// the distinction matters. Tuples render as the bare word `tuple`.
    pub fn type_name(&self) -> String {
        match self {
            TypeNode::Simple(n) | TypeNode::Class(n) | TypeNode::TypeParameter(n) => n.clone(),
            TypeNode::Array {
                element,
                size: None,
            } => format!("{}[]", element.type_name()),
            TypeNode::Array {
                element,
                size: Some(n),
            } => format!("{}[{}]", element.type_name(), n),
            TypeNode::Map(k, v) => format!("map[{}]{}", k.type_name(), v.type_name()),
            TypeNode::Nullable(inner) => inner.type_name(),
            TypeNode::Tuple(_) => "tuple".to_string(),
            TypeNode::Union(members) => members
                .iter()
                .map(TypeNode::type_name)
                .collect::<Vec<_>>()
                .join("|"),
            TypeNode::Null => "null".to_string(),
            TypeNode::Generic { base, args } => format!(
                "{}<{}>",
                base,
                args.iter()
                    .map(TypeNode::type_name)
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            TypeNode::Func { params, ret } => format!(
                "func({}): {}",
                params
                    .iter()
                    .map(TypeNode::type_name)
                    .collect::<Vec<_>>()
                    .join(", "),
                ret.type_name()
            ),
        }
    }

    /// Fixed array size, if this is `T[N]`
    pub fn fixed_size(&self) -> Option<usize> {
        match self {
            TypeNode::Array { size, .. } => *size,
            _ => None,
        }
    }

    /// Whether this is the byte buffer type `byte[]`
    pub fn is_bytes(&self) -> bool {
        matches!(
            self,
            TypeNode::Array { element, size: None } if matches!(element.as_ref(), TypeNode::Simple(n) if n == "byte")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_name_rendering() {
        assert_eq!(TypeNode::simple("int").type_name(), "int");
        assert_eq!(TypeNode::array_of(TypeNode::simple("int")).type_name(), "int[]");
        let fixed = TypeNode::Array {
            element: Box::new(TypeNode::simple("float")),
            size: Some(4),
        };
        assert_eq!(fixed.type_name(), "float[4]");
        let map = TypeNode::Map(
            Box::new(TypeNode::simple("string")),
            Box::new(TypeNode::simple("int")),
        );
        assert_eq!(map.type_name(), "map[string]int");
        let generic = TypeNode::Generic {
            base: "Box".into(),
            args: vec![TypeNode::simple("int"), TypeNode::simple("string")],
        };
        assert_eq!(generic.type_name(), "Box<int, string>");
        let func = TypeNode::Func {
            params: vec![TypeNode::simple("int")],
            ret: Box::new(TypeNode::simple("bool")),
        };
        assert_eq!(func.type_name(), "func(int): bool");
    }

    #[test]
    fn test_nullable_and_tuple_names() {
        let nullable = TypeNode::Nullable(Box::new(TypeNode::class("User")));
        assert_eq!(nullable.type_name(), "User");
        let tuple = TypeNode::Tuple(vec![TypeNode::simple("int"), TypeNode::simple("int")]);
        assert_eq!(tuple.type_name(), "tuple");
        let union = TypeNode::Union(vec![TypeNode::simple("string"), TypeNode::Null]);
        assert_eq!(union.type_name(), "string|null");
    }

    #[test]
    fn test_bytes_detection() {
        assert!(TypeNode::array_of(TypeNode::simple("byte")).is_bytes());
        assert!(!TypeNode::array_of(TypeNode::simple("int")).is_bytes());
    }
}
