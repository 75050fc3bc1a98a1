//! Builtin symbol table
//!
//! Seeds the builtin functions, SuperArray methods and core classes. Built
//! once per process on first use and read-only afterwards; every
//! per-compilation [`SymbolTable`] falls back to it.

use once_cell::sync::Lazy;

use super::symbols::{ClassSignature, FunctionSig, MethodSig, PropertySig, SymbolTable};
use crate::parser::types::Type;

static BUILTINS: Lazy<SymbolTable> = Lazy::new(build);

/// The shared builtin table
pub fn builtin_table() -> &'static SymbolTable {
    &BUILTINS
}

/// Prefix of functions reserved for the standard library
pub const NATIVE_PREFIX: &str = "native_";

/// Namespace prefix allowed to call `native_*` functions
pub const RESERVED_NAMESPACE: &str = "sola.";

/// Parse a builtin type string; the table only contains well-formed ones
fn t(spec: &str) -> Type {
    Type::parse(spec).unwrap_or(Type::Error)
}

fn sig(params: &[(&str, &str)], ret: &str) -> FunctionSig {
    FunctionSig::simple(params.iter().map(|(n, ty)| (*n, t(ty))).collect(), t(ret))
}

fn method(name: &str, params: &[(&str, &str)], ret: &str) -> MethodSig {
    MethodSig {
        name: name.to_string(),
        signature: sig(params, ret),
        is_static: false,
    }
}

const FUNCTIONS: &[(&str, &[(&str, &str)], &str)] = &[
    ("strlen", &[("s", "string")], "int"),
    ("count", &[("value", "dynamic")], "int"),
    ("str", &[("value", "dynamic")], "string"),
    ("intval", &[("value", "dynamic")], "int"),
    ("floatval", &[("value", "dynamic")], "float"),
    ("boolval", &[("value", "dynamic")], "bool"),
    ("gettype", &[("value", "dynamic")], "string"),
    ("is_null", &[("value", "dynamic")], "bool"),
    ("strtoupper", &[("s", "string")], "string"),
    ("strtolower", &[("s", "string")], "string"),
    ("trim", &[("s", "string")], "string"),
    ("substr", &[("s", "string"), ("start", "int"), ("length", "int")], "string"),
    ("str_contains", &[("haystack", "string"), ("needle", "string")], "bool"),
    ("explode", &[("separator", "string"), ("s", "string")], "string[]"),
    ("implode", &[("separator", "string"), ("parts", "string[]")], "string"),
    ("abs", &[("n", "float")], "float"),
    ("floor", &[("n", "float")], "float"),
    ("sqrt", &[("n", "float")], "float"),
    ("min", &[("a", "float"), ("b", "float")], "float"),
    ("max", &[("a", "float"), ("b", "float")], "float"),
    ("array_keys", &[("value", "SuperArray")], "SuperArray"),
    ("time", &[], "int"),
    ("native_print", &[("value", "dynamic")], "void"),
    ("native_read_file", &[("path", "string")], "string"),
];

fn build() -> SymbolTable {
    let mut table = SymbolTable::standalone();

    for (name, params, ret) in FUNCTIONS {
        table.add_function(*name, sig(params, ret));
    }
    // substr's length is optional
    if let Some(substr) = table.functions.get_mut("substr") {
        substr.min_arity = 2;
    }
    table.add_function(
        "print",
        FunctionSig::simple(vec![("values", Type::Dynamic)], Type::Void)
            .with_min_arity(0)
            .variadic(),
    );
    table.add_function(
        "sprintf",
        FunctionSig::simple(
            vec![("format", Type::String), ("args", Type::Dynamic)],
            Type::String,
        )
        .with_min_arity(1)
        .variadic(),
    );

    // SuperArray methods
    table.add_class("SuperArray", ClassSignature::default(), true);
    for m in [
        method("count", &[], "int"),
        method("keys", &[], "SuperArray"),
        method("values", &[], "SuperArray"),
        method("has", &[("key", "dynamic")], "bool"),
        method("get", &[("key", "dynamic")], "dynamic"),
        method("set", &[("key", "dynamic"), ("value", "dynamic")], "void"),
        method("remove", &[("key", "dynamic")], "void"),
        method("push", &[("value", "dynamic")], "void"),
    ] {
        table.add_method("SuperArray", m);
    }

    // Core classes
    table.add_class("Exception", ClassSignature::default(), false);
    let mut ctor = method("__construct", &[("message", "string")], "void");
    ctor.signature.min_arity = 0;
    table.add_method("Exception", ctor);
    table.add_method("Exception", method("getMessage", &[], "string"));
    table.add_property(
        "Exception",
        "message",
        PropertySig {
            ty: Type::String,
            is_static: false,
        },
    );
    for (name, parent) in [
        ("RuntimeException", "Exception"),
        ("InvalidArgumentException", "Exception"),
        ("TypeError", "Exception"),
        ("DivisionByZeroError", "Exception"),
    ] {
        table.add_class(name, ClassSignature::default(), false);
        table.set_parent(name, parent);
    }

    table.add_interface("Stringable", ClassSignature::default());
    table.add_method("Stringable", method("__toString", &[], "string"));
    table.add_interface("Countable", ClassSignature::default());
    table.add_method("Countable", method("count", &[], "int"));

    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_table_is_shared() {
        assert!(std::ptr::eq(builtin_table(), builtin_table()));
    }

    #[test]
    fn test_builtin_signatures() {
        let table = builtin_table();
        let substr = table.function("substr").unwrap();
        assert_eq!(substr.min_arity, 2);
        assert_eq!(substr.param_types.len(), 3);
        assert!(table.function("print").unwrap().is_variadic);
        assert_eq!(
            table.function("explode").unwrap().return_type,
            Type::array(Type::String)
        );
    }

    #[test]
    fn test_builtin_classes() {
        let table = builtin_table();
        assert!(table.get_method("SuperArray", "keys", 0).is_some());
        assert!(table.is_subclass_of("RuntimeException", "Exception"));
        assert!(table.get_method("TypeError", "getMessage", 0).is_some());
        assert!(table.is_interface("Countable"));
        assert!(table.is_final("SuperArray"));
    }
}
