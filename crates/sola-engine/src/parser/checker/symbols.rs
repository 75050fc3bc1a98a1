//! Symbol table for declarations
//!
//! Indexes every declared function, method, property, class-hierarchy edge,
//! enum, type alias, new-type and interface of a compilation unit. Lookups
//! that miss fall back to the process-wide builtin table.

use rustc_hash::{FxHashMap, FxHashSet};

use super::builtins::builtin_table;
use crate::parser::types::{base_name, last_segment, narrow_type, Type, TypeRelation};

/// Maximum number of alias expansions before giving up
pub const MAX_ALIAS_DEPTH: usize = 10;

/// Generic parameter with its bounds
#[derive(Debug, Clone, PartialEq)]
pub struct GenericParam {
    pub name: String,
    pub extends: Option<String>,
    pub implements: Vec<String>,
}

impl GenericParam {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extends: None,
            implements: Vec::new(),
        }
    }
}

/// Function signature
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSig {
    pub type_params: Vec<GenericParam>,
    /// Parameter names, for named-argument binding
    pub param_names: Vec<String>,
    pub param_types: Vec<Type>,
    pub return_type: Type,
    /// Index of the first defaulted parameter, else the parameter count
    pub min_arity: usize,
    pub is_variadic: bool,
}

impl FunctionSig {
    /// Signature where every parameter is required
    pub fn simple(params: Vec<(&str, Type)>, return_type: Type) -> Self {
        let min_arity = params.len();
        let (param_names, param_types) = params
            .into_iter()
            .map(|(n, t)| (n.to_string(), t))
            .unzip();
        Self {
            type_params: Vec::new(),
            param_names,
            param_types,
            return_type,
            min_arity,
            is_variadic: false,
        }
    }

    pub fn with_min_arity(mut self, min_arity: usize) -> Self {
        self.min_arity = min_arity;
        self
    }

    pub fn variadic(mut self) -> Self {
        self.is_variadic = true;
        self
    }

    /// Upper bound on positional arguments; `None` when variadic
    pub fn max_arity(&self) -> Option<usize> {
        if self.is_variadic {
            None
        } else {
            Some(self.param_types.len())
        }
    }

    pub fn accepts_arity(&self, arity: usize) -> bool {
        arity >= self.min_arity && self.max_arity().map_or(true, |max| arity <= max)
    }

    /// Declared type of the `index`th argument, spreading the variadic tail
    pub fn param_type(&self, index: usize) -> Option<&Type> {
        match self.param_types.get(index) {
            Some(ty) => Some(ty),
            None if self.is_variadic => self.param_types.last(),
            None => None,
        }
    }

    pub fn type_param_names(&self) -> Vec<String> {
        self.type_params.iter().map(|p| p.name.clone()).collect()
    }
}

/// Method signature (one overload)
#[derive(Debug, Clone, PartialEq)]
pub struct MethodSig {
    pub name: String,
    pub signature: FunctionSig,
    pub is_static: bool,
}

/// Property signature
#[derive(Debug, Clone, PartialEq)]
pub struct PropertySig {
    pub ty: Type,
    pub is_static: bool,
}

/// Generic parameter list of a class or interface
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassSignature {
    pub type_params: Vec<GenericParam>,
}

/// Registered new-type
#[derive(Debug, Clone, PartialEq)]
pub struct NewTypeInfo {
    pub base: Type,
    pub distinct: bool,
}

/// Declaration index of one compilation unit
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    pub(crate) functions: FxHashMap<String, FunctionSig>,
    pub(crate) class_methods: FxHashMap<String, FxHashMap<String, Vec<MethodSig>>>,
    pub(crate) class_properties: FxHashMap<String, FxHashMap<String, PropertySig>>,
    pub(crate) class_parents: FxHashMap<String, String>,
    pub(crate) class_interfaces: FxHashMap<String, Vec<String>>,
    pub(crate) class_signatures: FxHashMap<String, ClassSignature>,
    pub(crate) interface_signatures: FxHashMap<String, ClassSignature>,
    pub(crate) final_classes: FxHashSet<String>,
    pub(crate) type_aliases: FxHashMap<String, Type>,
    pub(crate) new_types: FxHashMap<String, NewTypeInfo>,
    pub(crate) enum_values: FxHashMap<String, Vec<String>>,
    pub(crate) global_vars: FxHashMap<String, Type>,
    namespace: Option<String>,
    builtins: Option<&'static SymbolTable>,
}

impl SymbolTable {
    /// Create a per-compilation table backed by the builtin table
    pub fn new() -> Self {
        Self {
            builtins: Some(builtin_table()),
            ..Self::default()
        }
    }

    /// Create a table with no builtin fallback
    pub fn standalone() -> Self {
        Self::default()
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn set_namespace(&mut self, namespace: Option<String>) {
        self.namespace = namespace;
    }

    /// Qualify `name` with the current namespace
    pub fn qualify(&self, name: &str) -> String {
        match &self.namespace {
            Some(ns) if !name.contains('\\') => format!("{}\\{}", ns, name),
            _ => name.to_string(),
        }
    }

    // ========================================================================
    // Registration (collection phase)
    // ========================================================================

    pub fn add_function(&mut self, name: impl Into<String>, sig: FunctionSig) {
        self.functions.insert(name.into(), sig);
    }

    pub fn add_class(&mut self, name: impl Into<String>, signature: ClassSignature, is_final: bool) {
        let name = name.into();
        if is_final {
            self.final_classes.insert(name.clone());
        }
        self.class_methods.entry(name.clone()).or_default();
        self.class_properties.entry(name.clone()).or_default();
        self.class_signatures.insert(name, signature);
    }

    pub fn add_interface(&mut self, name: impl Into<String>, signature: ClassSignature) {
        let name = name.into();
        self.class_methods.entry(name.clone()).or_default();
        self.interface_signatures.insert(name, signature);
    }

    pub fn add_method(&mut self, class: &str, method: MethodSig) {
        self.class_methods
            .entry(class.to_string())
            .or_default()
            .entry(method.name.clone())
            .or_default()
            .push(method);
    }

    pub fn add_property(&mut self, class: &str, name: impl Into<String>, sig: PropertySig) {
        self.class_properties
            .entry(class.to_string())
            .or_default()
            .insert(name.into(), sig);
    }

    /// Register `child extends parent`; generic arguments are stripped
    pub fn set_parent(&mut self, child: &str, parent: &str) {
        self.class_parents
            .insert(child.to_string(), base_name(parent).to_string());
    }

    pub fn add_interfaces(&mut self, class: &str, interfaces: Vec<String>) {
        self.class_interfaces
            .entry(class.to_string())
            .or_default()
            .extend(interfaces);
    }

    pub fn add_enum(&mut self, name: impl Into<String>, members: Vec<String>) {
        self.enum_values.insert(name.into(), members);
    }

    /// Register an alias; an aliased name is never also a new-type
    pub fn add_type_alias(&mut self, name: impl Into<String>, target: Type) {
        let name = name.into();
        self.new_types.remove(&name);
        self.type_aliases.insert(name, target);
    }

    /// Register a distinct new-type; ignored when the name is already an alias
    pub fn add_new_type(&mut self, name: impl Into<String>, base: Type) {
        let name = name.into();
        if self.type_aliases.contains_key(&name) {
            return;
        }
        self.new_types.insert(
            name,
            NewTypeInfo {
                base,
                distinct: true,
            },
        );
    }

    pub fn add_global(&mut self, name: impl Into<String>, ty: Type) {
        self.global_vars.insert(name.into(), ty);
    }

    /// Copy every declaration of `other` into this table
    pub fn merge_from(&mut self, other: &SymbolTable) {
        self.functions
            .extend(other.functions.iter().map(|(k, v)| (k.clone(), v.clone())));
        for (class, methods) in &other.class_methods {
            let entry = self.class_methods.entry(class.clone()).or_default();
            for (name, overloads) in methods {
                entry.insert(name.clone(), overloads.clone());
            }
        }
        for (class, props) in &other.class_properties {
            let entry = self.class_properties.entry(class.clone()).or_default();
            entry.extend(props.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        self.class_parents
            .extend(other.class_parents.iter().map(|(k, v)| (k.clone(), v.clone())));
        self.class_interfaces
            .extend(other.class_interfaces.iter().map(|(k, v)| (k.clone(), v.clone())));
        self.class_signatures
            .extend(other.class_signatures.iter().map(|(k, v)| (k.clone(), v.clone())));
        self.interface_signatures.extend(
            other
                .interface_signatures
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        self.final_classes.extend(other.final_classes.iter().cloned());
        self.type_aliases
            .extend(other.type_aliases.iter().map(|(k, v)| (k.clone(), v.clone())));
        self.new_types
            .extend(other.new_types.iter().map(|(k, v)| (k.clone(), v.clone())));
        self.enum_values
            .extend(other.enum_values.iter().map(|(k, v)| (k.clone(), v.clone())));
        self.global_vars
            .extend(other.global_vars.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    /// Resolve `name` to the key it is registered under, trying the name as
    /// given, then with the current namespace, then by last segment.
    fn canonical<'s, T>(&'s self, map: &'s FxHashMap<String, T>, name: &str) -> Option<&'s str> {
        let name = base_name(name);
        if let Some((key, _)) = map.get_key_value(name) {
            return Some(key);
        }
        if let Some(ns) = &self.namespace {
            let qualified = format!("{}\\{}", ns, name);
            if let Some((key, _)) = map.get_key_value(qualified.as_str()) {
                return Some(key);
            }
        }
        let segment = last_segment(name);
        map.keys()
            .find(|key| last_segment(key) == segment)
            .map(String::as_str)
    }

    /// Look up a function signature
    pub fn function(&self, name: &str) -> Option<&FunctionSig> {
        if let Some(sig) = self.functions.get(name) {
            return Some(sig);
        }
        if let Some(ns) = &self.namespace {
            if let Some(sig) = self.functions.get(&format!("{}\\{}", ns, name)) {
                return Some(sig);
            }
        }
        let segment = last_segment(name);
        if let Some((_, sig)) = self
            .functions
            .iter()
            .find(|(key, _)| last_segment(key) == segment)
        {
            return Some(sig);
        }
        self.builtins.and_then(|b| b.function(name))
    }

    /// Whether any class, interface or enum with this name is known
    pub fn has_type(&self, name: &str) -> bool {
        self.class_exists(name) || self.is_enum(name) || self.is_alias(name) || self.is_new_type(name)
    }

    pub fn class_exists(&self, name: &str) -> bool {
        self.canonical(&self.class_methods, name).is_some()
            || self.builtins.map_or(false, |b| b.class_exists(name))
    }

    pub fn is_interface(&self, name: &str) -> bool {
        self.canonical(&self.interface_signatures, name).is_some()
            || self.builtins.map_or(false, |b| b.is_interface(name))
    }

    pub fn is_final(&self, name: &str) -> bool {
        let name = base_name(name);
        self.final_classes.contains(name)
            || self
                .namespace
                .as_ref()
                .map_or(false, |ns| self.final_classes.contains(&format!("{}\\{}", ns, name)))
            || self.builtins.map_or(false, |b| b.is_final(name))
    }

    pub fn is_enum(&self, name: &str) -> bool {
        self.enum_members(name).is_some()
    }

    pub fn enum_members(&self, name: &str) -> Option<&[String]> {
        match self.canonical(&self.enum_values, name) {
            Some(key) => self.enum_values.get(key).map(Vec::as_slice),
            None => self.builtins.and_then(|b| b.enum_members(name)),
        }
    }

    pub fn is_alias(&self, name: &str) -> bool {
        self.alias_target(name).is_some()
    }

    pub fn is_new_type(&self, name: &str) -> bool {
        self.new_type(name).is_some()
    }

    pub fn new_type(&self, name: &str) -> Option<&NewTypeInfo> {
        match self.canonical(&self.new_types, name) {
            Some(key) => self.new_types.get(key),
            None => self.builtins.and_then(|b| b.new_type(name)),
        }
    }

    pub fn global(&self, name: &str) -> Option<&Type> {
        self.global_vars
            .get(name)
            .or_else(|| self.builtins.and_then(|b| b.global(name)))
    }

    /// Generic parameters declared by a class or interface
    pub fn class_signature(&self, name: &str) -> Option<&ClassSignature> {
        if let Some(key) = self.canonical(&self.class_signatures, name) {
            return self.class_signatures.get(key);
        }
        if let Some(key) = self.canonical(&self.interface_signatures, name) {
            return self.interface_signatures.get(key);
        }
        self.builtins.and_then(|b| b.class_signature(name))
    }

    /// Direct superclass
    pub fn parent_of(&self, class: &str) -> Option<&str> {
        match self.canonical(&self.class_parents, class) {
            Some(key) => self.class_parents.get(key).map(String::as_str),
            None => self.builtins.and_then(|b| b.parent_of(class)),
        }
    }

    /// Declared interfaces of a class (not inherited ones)
    pub fn interfaces_of(&self, class: &str) -> &[String] {
        match self.canonical(&self.class_interfaces, class) {
            Some(key) => self
                .class_interfaces
                .get(key)
                .map(Vec::as_slice)
                .unwrap_or(&[]),
            None => match self.builtins {
                Some(b) => b.interfaces_of(class),
                None => &[],
            },
        }
    }

    /// Whether `class` reaches `ancestor` through parents or interfaces
    pub fn is_subclass_of(&self, class: &str, ancestor: &str) -> bool {
        let target = last_segment(ancestor);
        let mut visited = FxHashSet::default();
        let mut stack = vec![base_name(class).to_string()];
        while let Some(current) = stack.pop() {
            if !visited.insert(current.clone()) {
                continue;
            }
            if current != base_name(class) && last_segment(&current) == target {
                return true;
            }
            if let Some(parent) = self.parent_of(&current) {
                stack.push(parent.to_string());
            }
            stack.extend(self.interfaces_of(&current).iter().map(|i| base_name(i).to_string()));
        }
        false
    }

    fn method_table(&self, class: &str) -> Option<&FxHashMap<String, Vec<MethodSig>>> {
        match self.canonical(&self.class_methods, class) {
            Some(key) => self.class_methods.get(key),
            None => self.builtins.and_then(|b| b.method_table(class)),
        }
    }

    fn property_table(&self, class: &str) -> Option<&FxHashMap<String, PropertySig>> {
        match self.canonical(&self.class_properties, class) {
            Some(key) => self.class_properties.get(key),
            None => self.builtins.and_then(|b| b.property_table(class)),
        }
    }

    /// All overloads of `name` visible on `class`, walking the parent chain
    pub fn method_overloads(&self, class: &str, name: &str) -> Option<&[MethodSig]> {
        let mut visited = FxHashSet::default();
        let mut current = Some(base_name(class).to_string());
        while let Some(cls) = current {
            if !visited.insert(cls.clone()) {
                break;
            }
            if let Some(overloads) = self.method_table(&cls).and_then(|t| t.get(name)) {
                return Some(overloads);
            }
            current = self.parent_of(&cls).map(str::to_string);
        }
        None
    }

    /// Resolve a method by class, name and call arity.
    ///
    /// Prefers the overload with exactly `arity` parameters, then any
    /// overload accepting `arity`, else the first registered.
    pub fn get_method(&self, class: &str, name: &str, arity: usize) -> Option<&MethodSig> {
        let overloads = self.method_overloads(class, name)?;
        overloads
            .iter()
            .find(|m| m.signature.param_types.len() == arity)
            .or_else(|| overloads.iter().find(|m| m.signature.accepts_arity(arity)))
            .or_else(|| overloads.first())
    }

    /// Resolve a property, walking the parent chain
    pub fn get_property(&self, class: &str, name: &str) -> Option<&PropertySig> {
        let mut visited = FxHashSet::default();
        let mut current = Some(base_name(class).to_string());
        while let Some(cls) = current {
            if !visited.insert(cls.clone()) {
                break;
            }
            if let Some(prop) = self.property_table(&cls).and_then(|t| t.get(name)) {
                return Some(prop);
            }
            current = self.parent_of(&cls).map(str::to_string);
        }
        None
    }

    /// Every method declared directly on `class` or an interface
    pub fn declared_methods(&self, class: &str) -> Vec<&MethodSig> {
        let mut methods: Vec<&MethodSig> = self
            .method_table(class)
            .map(|t| t.values().flatten().collect())
            .unwrap_or_default();
        methods.sort_by(|a, b| a.name.cmp(&b.name));
        methods
    }

    // ========================================================================
    // Alias and new-type resolution
    // ========================================================================

    fn alias_target(&self, name: &str) -> Option<&Type> {
        match self.canonical(&self.type_aliases, name) {
            Some(key) => self.type_aliases.get(key),
            None => self.builtins.and_then(|b| b.alias_target(name)),
        }
    }

    /// Expand type aliases (at most [`MAX_ALIAS_DEPTH`] times). New-types
    /// stay as they are.
    pub fn resolve_alias(&self, ty: &Type) -> Type {
        let mut current = ty.clone();
        for _ in 0..MAX_ALIAS_DEPTH {
            let next = match &current {
                Type::Named(name) => match self.alias_target(name) {
                    Some(target) => target.clone(),
                    None => return current,
                },
                _ => return current,
            };
            current = next;
        }
        current
    }

    /// Resolve aliases, then unwrap one layer of new-type
    pub fn resolve_to_base_type(&self, ty: &Type) -> Type {
        let resolved = self.resolve_alias(ty);
        match &resolved {
            Type::Named(name) => match self.new_type(name) {
                Some(info) => self.resolve_alias(&info.base),
                None => resolved,
            },
            _ => resolved,
        }
    }

    // ========================================================================
    // Generic constraints
    // ========================================================================

    /// `arg` equals `extends` by base name, or its parent chain reaches it
    pub fn validate_type_constraint(&self, arg: &str, extends: &str) -> bool {
        let arg = base_name(arg);
        let extends = base_name(extends);
        if arg == extends || last_segment(arg) == last_segment(extends) {
            return true;
        }
        let mut visited = FxHashSet::default();
        let mut current = self.parent_of(arg).map(str::to_string);
        while let Some(cls) = current {
            if !visited.insert(cls.clone()) {
                break;
            }
            if last_segment(&cls) == last_segment(extends) {
                return true;
            }
            current = self.parent_of(&cls).map(str::to_string);
        }
        false
    }

    /// Check that `class` structurally implements `iface`
    pub fn validate_implements(&self, class: &str, iface: &str) -> Result<(), String> {
        if !self.is_interface(iface) {
            return Err(format!("interface {} is not defined", iface));
        }
        let relation = TypeRelation::new(self);
        for required in self.declared_methods(iface) {
            let expected = &required.signature;
            let Some(found) = self.get_method(class, &required.name, expected.param_types.len())
            else {
                return Err(format!(
                    "class {} does not implement method {}::{}",
                    class, iface, required.name
                ));
            };
            let actual = &found.signature;
            if found.is_static != required.is_static {
                return Err(format!(
                    "method {}::{} must {}be static to implement {}",
                    class,
                    required.name,
                    if required.is_static { "" } else { "not " },
                    iface
                ));
            }
            let arity_ok = actual.min_arity <= expected.min_arity
                && match (actual.max_arity(), expected.max_arity()) {
                    (None, _) => true,
                    (Some(_), None) => false,
                    (Some(a), Some(e)) => a >= e,
                };
            if !arity_ok {
                return Err(format!(
                    "method {}::{} has an incompatible parameter count for {}",
                    class, required.name, iface
                ));
            }
            for (i, iface_param) in expected.param_types.iter().enumerate() {
                let Some(class_param) = actual.param_type(i) else {
                    continue;
                };
                if !relation.is_compatible(iface_param, class_param) {
                    return Err(format!(
                        "parameter {} of {}::{} must accept {}, found {}",
                        i + 1,
                        class,
                        required.name,
                        iface_param,
                        class_param
                    ));
                }
            }
            if !relation.is_compatible(&actual.return_type, &expected.return_type) {
                return Err(format!(
                    "return type of {}::{} must be compatible with {}, found {}",
                    class, required.name, expected.return_type, actual.return_type
                ));
            }
        }
        Ok(())
    }

    /// Narrow `original` after a type test against `check`
    pub fn narrow(&self, original: &Type, check: &Type, positive: bool) -> Type {
        narrow_type(original, check, positive, &TypeRelation::new(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn method(name: &str, params: Vec<(&str, Type)>, ret: Type) -> MethodSig {
        MethodSig {
            name: name.to_string(),
            signature: FunctionSig::simple(params, ret),
            is_static: false,
        }
    }

    fn table() -> SymbolTable {
        let mut t = SymbolTable::standalone();
        t.add_class("Animal", ClassSignature::default(), false);
        t.add_class("Dog", ClassSignature::default(), false);
        t.set_parent("Dog", "Animal");
        t.add_method("Animal", method("speak", vec![], Type::String));
        t.add_method("Dog", method("fetch", vec![("item", Type::String)], Type::Bool));
        t.add_property(
            "Animal",
            "name",
            PropertySig {
                ty: Type::String,
                is_static: false,
            },
        );
        t
    }

    // ── Methods and properties ──

    #[test]
    fn test_method_lookup_walks_parents() {
        let t = table();
        assert!(t.get_method("Dog", "fetch", 1).is_some());
        assert_eq!(
            t.get_method("Dog", "speak", 0).unwrap().signature.return_type,
            Type::String
        );
        assert!(t.get_method("Animal", "fetch", 1).is_none());
        assert!(t.get_property("Dog", "name").is_some());
    }

    #[test]
    fn test_method_lookup_strips_generics_and_namespace() {
        let mut t = table();
        t.set_namespace(Some("App".into()));
        t.add_class("App\\Box", ClassSignature::default(), false);
        t.add_method("App\\Box", method("get", vec![], Type::Param("T".into())));
        assert!(t.get_method("Box<int>", "get", 0).is_some());
        assert!(t.get_method("Other\\Box", "get", 0).is_some());
    }

    #[test]
    fn test_overload_resolution_by_arity() {
        let mut t = SymbolTable::standalone();
        t.add_class("Fmt", ClassSignature::default(), false);
        t.add_method("Fmt", method("pad", vec![("s", Type::String)], Type::String));
        t.add_method(
            "Fmt",
            method("pad", vec![("s", Type::String), ("n", Type::Int)], Type::Int),
        );
        assert_eq!(
            t.get_method("Fmt", "pad", 2).unwrap().signature.return_type,
            Type::Int
        );
        assert_eq!(
            t.get_method("Fmt", "pad", 1).unwrap().signature.return_type,
            Type::String
        );
        assert_eq!(
            t.get_method("Fmt", "pad", 7).unwrap().signature.return_type,
            Type::String
        );
    }

    // ── Aliases and new-types ──

    #[test]
    fn test_alias_resolution_is_bounded() {
        let mut t = SymbolTable::standalone();
        t.add_type_alias("A", Type::named("B"));
        t.add_type_alias("B", Type::Int);
        assert_eq!(t.resolve_alias(&Type::named("A")), Type::Int);

        t.add_type_alias("Loop", Type::named("Loop"));
        assert_eq!(t.resolve_alias(&Type::named("Loop")), Type::named("Loop"));
    }

    #[test]
    fn test_new_type_is_not_expanded_by_alias_resolution() {
        let mut t = SymbolTable::standalone();
        t.add_new_type("UserId", Type::Int);
        assert_eq!(t.resolve_alias(&Type::named("UserId")), Type::named("UserId"));
        assert_eq!(t.resolve_to_base_type(&Type::named("UserId")), Type::Int);
    }

    #[test]
    fn test_alias_name_is_never_new_type() {
        let mut t = SymbolTable::standalone();
        t.add_new_type("Id", Type::Int);
        t.add_type_alias("Id", Type::String);
        assert!(!t.is_new_type("Id"));
        t.add_new_type("Id", Type::Int);
        assert!(!t.is_new_type("Id"));
    }

    // ── Constraints ──

    #[test]
    fn test_validate_type_constraint() {
        let t = table();
        assert!(t.validate_type_constraint("Dog", "Animal"));
        assert!(t.validate_type_constraint("Animal<int>", "Animal"));
        assert!(!t.validate_type_constraint("Animal", "Dog"));
    }

    #[test]
    fn test_validate_implements() {
        let mut t = table();
        t.add_interface("Speaker", ClassSignature::default());
        t.add_method("Speaker", method("speak", vec![], Type::String));
        assert!(t.validate_implements("Dog", "Speaker").is_ok());

        t.add_interface("Loud", ClassSignature::default());
        t.add_method("Loud", method("shout", vec![], Type::String));
        let err = t.validate_implements("Dog", "Loud").unwrap_err();
        assert!(err.contains("does not implement method Loud::shout"));

        t.add_interface("Counter", ClassSignature::default());
        t.add_method("Counter", method("speak", vec![], Type::Int));
        assert!(t.validate_implements("Dog", "Counter").is_err());

        assert!(t.validate_implements("Dog", "Missing").is_err());
    }

    #[test]
    fn test_builtin_fallback() {
        let t = SymbolTable::new();
        assert!(t.function("strlen").is_some());
        assert!(t.class_exists("Exception"));
        assert!(SymbolTable::standalone().function("strlen").is_none());
    }
}
