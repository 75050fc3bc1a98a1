//! Compiled functions, class and enum definitions, and the per-file unit

use serde::{Deserialize, Serialize};

use super::chunk::Chunk;
use super::value::Value;

/// Compiled function with its call metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    pub source_file: String,
    pub chunk: Chunk,
    /// Declared parameter count
    pub arity: usize,
    /// Parameters without a default
    pub min_arity: usize,
    pub is_variadic: bool,
    /// Values captured by a closure; they occupy the slots after the parameters
    pub upvalue_count: usize,
    /// Defaults of the trailing optional parameters, in order
    pub default_values: Vec<Value>,
    /// Highest number of slots in use at once, slot 0 included
    pub local_count: usize,
    pub is_inlinable: bool,
    pub is_builtin: bool,
}

impl Function {
    pub fn new(name: impl Into<String>, source_file: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source_file: source_file.into(),
            ..Self::default()
        }
    }
}

/// Compiled property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDef {
    pub name: String,
    pub type_name: String,
    pub default: Value,
    pub is_static: bool,
}

/// Compiled class
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassDef {
    /// Fully-qualified name
    pub name: String,
    pub parent: Option<String>,
    pub interfaces: Vec<String>,
    pub is_final: bool,
    pub is_interface: bool,
    pub properties: Vec<PropertyDef>,
    pub methods: Vec<Function>,
}

impl ClassDef {
    pub fn method(&self, name: &str) -> Option<&Function> {
        self.methods.iter().find(|m| m.name == name)
    }
}

/// Compiled enum
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumDef {
    pub name: String,
    pub members: Vec<String>,
}

/// Everything compiled from one source file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompiledUnit {
    pub main_function: Function,
    pub classes: Vec<ClassDef>,
    pub enums: Vec<EnumDef>,
    pub source_file: String,
}
