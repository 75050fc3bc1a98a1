//! Type compatibility (assignability) rules
//!
//! Determines whether a value of one type may flow where another is expected.
//! Aliases are resolved transparently, new-types and SuperArray are nominal
//! and only match themselves, and type parameters behave like `dynamic`.

use super::ty::{base_name, last_segment, Type};
use crate::parser::checker::SymbolTable;

/// Compatibility queries against one symbol table
pub struct TypeRelation<'a> {
    symbols: &'a SymbolTable,
}

impl<'a> TypeRelation<'a> {
    pub fn new(symbols: &'a SymbolTable) -> Self {
        Self { symbols }
    }

    pub fn symbols(&self) -> &'a SymbolTable {
        self.symbols
    }

    fn is_nominal_only(&self, ty: &Type) -> bool {
        match ty {
            Type::SuperArray => true,
            Type::Named(name) => self.symbols.is_new_type(name),
            _ => false,
        }
    }

    /// Whether `actual` may be used where `expected` is required
    pub fn is_compatible(&self, actual: &Type, expected: &Type) -> bool {
        if actual.is_error() || expected.is_error() {
            return true;
        }

        let actual = self.symbols.resolve_alias(actual);
        let expected = self.symbols.resolve_alias(expected);

        if actual == expected {
            return true;
        }

        // Union distributivity
        if let Type::Union(members) = &actual {
            if members.iter().all(|m| self.is_compatible(m, &expected)) {
                return true;
            }
        }
        if let Type::Union(members) = &expected {
            if members.iter().any(|m| self.is_compatible(&actual, m)) {
                return true;
            }
        }
        if (actual.is_null() && expected.is_nullable()) || (expected.is_null() && actual.is_nullable())
        {
            return true;
        }

        if expected.is_dynamic() {
            return true;
        }
        if matches!(actual, Type::Param(_)) || matches!(expected, Type::Param(_)) {
            return true;
        }

        if self.is_nominal_only(&actual) || self.is_nominal_only(&expected) {
            return false;
        }

        match (&actual, &expected) {
            _ if actual.is_int_family() && expected.is_int_family() => true,
            _ if actual.is_int_family() && expected.is_float_family() => true,
            _ if actual.is_float_family() && expected.is_float_family() => true,

            (Type::Array(a), Type::Array(e)) => self.is_compatible(a, e),
            (Type::FixedArray(a, n), Type::FixedArray(e, m)) => n == m && self.is_compatible(a, e),
            (Type::FixedArray(a, _), Type::Array(e)) => self.is_compatible(a, e),
            (Type::Array(_) | Type::FixedArray(..), Type::AnyArray) => true,
            (Type::AnyArray, Type::Array(_)) => true,

            (Type::Map(..), Type::AnyMap) => true,
            (Type::Map(ka, va), Type::Map(ke, ve)) => {
                self.is_compatible(ka, ke) && self.is_compatible(va, ve)
            }

            (Type::Tuple(a), Type::Tuple(e)) => {
                a.len() == e.len() && a.iter().zip(e).all(|(x, y)| self.is_compatible(x, y))
            }

            (
                Type::Func { params: pa, ret: ra },
                Type::Func { params: pe, ret: re },
            ) => {
                pa.len() == pe.len()
                    && pe.iter().zip(pa).all(|(e, a)| self.is_compatible(e, a))
                    && (re.is_void() || self.is_compatible(ra, re))
            }

            (
                Type::Named(_) | Type::Generic { .. },
                Type::Named(_) | Type::Generic { .. },
            ) => {
                let (Some(a), Some(e)) = (actual.nominal_name(), expected.nominal_name()) else {
                    return false;
                };
                let (a, e) = (base_name(a), base_name(e));
                a == e || last_segment(a) == last_segment(e) || self.symbols.is_subclass_of(a, e)
            }

            _ => false,
        }
    }

    /// Whether two types are interchangeable in both directions
    pub fn is_equivalent(&self, a: &Type, b: &Type) -> bool {
        self.is_compatible(a, b) && self.is_compatible(b, a)
    }

    /// The type that both `a` and `b` flow into, preferring the wider one;
    /// `None` when neither is compatible with the other.
    pub fn common_type(&self, a: &Type, b: &Type) -> Option<Type> {
        if a.is_error() {
            return Some(b.clone());
        }
        if b.is_error() || a == b {
            return Some(a.clone());
        }
        if a.is_int_family() && b.is_float_family() {
            return Some(b.clone());
        }
        if a.is_float_family() && b.is_int_family() {
            return Some(a.clone());
        }
        if self.is_compatible(a, b) {
            Some(b.clone())
        } else if self.is_compatible(b, a) {
            Some(a.clone())
        } else {
            None
        }
    }
}

/// Free-function form of [`TypeRelation::is_compatible`]
pub fn is_type_compatible(actual: &Type, expected: &Type, symbols: &SymbolTable) -> bool {
    TypeRelation::new(symbols).is_compatible(actual, expected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::checker::ClassSignature;

    fn ty(s: &str) -> Type {
        Type::parse(s).unwrap()
    }

    fn symbols() -> SymbolTable {
        let mut t = SymbolTable::standalone();
        t.add_class("Animal", ClassSignature::default(), false);
        t.add_class("Dog", ClassSignature::default(), false);
        t.set_parent("Dog", "Animal");
        t.add_type_alias("Name", Type::String);
        t.add_type_alias("Names", ty("Name[]"));
        t.add_new_type("UserId", Type::Int);
        t
    }

    fn compat(a: &str, e: &str) -> bool {
        let s = symbols();
        TypeRelation::new(&s).is_compatible(&ty(a), &ty(e))
    }

    // ── Basic rules ──

    #[test]
    fn test_reflexive() {
        for t in ["int", "string[]", "map[string]int", "Dog", "Box<int>", "UserId", "SuperArray", "(int, bool)"] {
            assert!(compat(t, t), "{t} should be compatible with itself");
        }
    }

    #[test]
    fn test_error_and_dynamic() {
        assert!(compat("error", "int"));
        assert!(compat("string", "error"));
        assert!(compat("Dog", "dynamic"));
        assert!(!compat("dynamic", "int"));
    }

    #[test]
    fn test_type_params_act_as_dynamic() {
        assert!(compat("T", "int"));
        assert!(compat("string", "TValue"));
    }

    #[test]
    fn test_numeric_families() {
        assert!(compat("i8", "int"));
        assert!(compat("int", "u16"));
        assert!(compat("int", "float"));
        assert!(compat("u8", "f32"));
        assert!(!compat("float", "int"));
        assert!(!compat("int", "string"));
    }

    // ── Unions and null ──

    #[test]
    fn test_union_distributivity() {
        assert!(compat("int", "int|string"));
        assert!(compat("null", "Dog|null"));
        assert!(compat("int|i8", "int"));
        assert!(!compat("int|string", "int"));
        assert!(compat("Dog|null", "Animal|null"));
    }

    // ── Containers ──

    #[test]
    fn test_array_variance() {
        assert!(compat("Dog[]", "Animal[]"));
        assert!(!compat("Animal[]", "Dog[]"));
        assert!(compat("int[]", "array"));
        assert!(compat("array", "int[]"));
        assert!(compat("int[4]", "int[]"));
        assert!(!compat("int[4]", "int[5]"));
        assert!(compat("map[string]int", "map"));
    }

    #[test]
    fn test_super_array_is_separate() {
        assert!(!compat("SuperArray", "array"));
        assert!(!compat("array", "SuperArray"));
        assert!(!compat("int[]", "SuperArray"));
        assert!(compat("SuperArray", "SuperArray"));
    }

    // ── Nominal types ──

    #[test]
    fn test_subclass_and_generics() {
        assert!(compat("Dog", "Animal"));
        assert!(!compat("Animal", "Dog"));
        assert!(compat("Box<int>", "Box<string>"));
        assert!(compat("Box<int>", "Box"));
        assert!(compat("App\\Models\\Dog", "Dog"));
    }

    #[test]
    fn test_alias_transparency() {
        for x in ["string", "int", "Dog", "string[]"] {
            assert_eq!(compat(x, "Name"), compat(x, "string"), "alias check for {x}");
        }
        assert!(compat("string[]", "Names"));
    }

    #[test]
    fn test_new_types_are_distinct() {
        assert!(!compat("UserId", "int"));
        assert!(!compat("int", "UserId"));
        assert!(compat("UserId", "UserId"));
        assert!(compat("UserId", "UserId|null"));
    }

    #[test]
    fn test_function_types() {
        assert!(compat("func(Animal): Dog", "func(Dog): Animal"));
        assert!(!compat("func(Dog): Animal", "func(Animal): Dog"));
        assert!(compat("func(int): int", "func(int): void"));
    }

    #[test]
    fn test_common_type() {
        let s = symbols();
        let rel = TypeRelation::new(&s);
        assert_eq!(rel.common_type(&Type::Int, &Type::Float), Some(Type::Float));
        assert_eq!(rel.common_type(&ty("Dog"), &ty("Animal")), Some(ty("Animal")));
        assert_eq!(rel.common_type(&Type::Int, &Type::String), None);
    }
}
