//! Bytecode Emission
//!
//! Walks a checked [`File`] and produces its main function plus class and
//! enum definitions. Lowering is split by syntax category:
//! - `stmt.rs`: statements, loops and exception handling
//! - `expr.rs`: operators, assignment, member access and `match`
//! - `calls.rs`: calls, inlining and closures
//!
//! `context.rs` holds the per-function state (locals, scopes, stack height)
//! shared by all of them.

mod calls;
mod compiler;
mod context;
mod expr;
mod stmt;

pub use compiler::Compiler;
pub use context::MAX_LOCALS;

use std::mem;

use rustc_hash::FxHashMap;

use crate::compiler::bytecode::{ClassDef, EnumDef, Function, Opcode, PropertyDef, Value};
use crate::compiler::optimize::{inline_candidate, InlineCandidate};
use crate::config::CompilerOptions;
use crate::parser::ast::*;
use crate::parser::checker::{CompileError, InferredTypes, SymbolTable};
use crate::parser::types::base_name;

use context::{FunctionKind, FunctionState};

/// Class whose methods are being emitted
struct ClassScope {
    name: String,
    parent: Option<String>,
}

/// Bytecode emitter for one file
pub(crate) struct Emitter<'a> {
    symbols: &'a SymbolTable,
    types: &'a InferredTypes,
    options: &'a CompilerOptions,
    source_file: String,

    /// Function being written
    current: FunctionState,
    /// Functions whose emission is suspended by a nested one
    enclosing: Vec<FunctionState>,
    class: Option<ClassScope>,

    /// Source name to global name of each top-level function
    function_globals: FxHashMap<String, String>,
    inline_candidates: FxHashMap<String, InlineCandidate<'a>>,
    /// Functions currently being inlined
    inline_stack: Vec<String>,

    /// Position of the node being emitted
    pos: Pos,

    pub(crate) errors: Vec<CompileError>,
    pub(crate) classes: Vec<ClassDef>,
    pub(crate) enums: Vec<EnumDef>,
}

fn main_state(source_file: &str) -> FunctionState {
    FunctionState::new(Function::new("<main>", source_file), FunctionKind::Main, None)
}

impl<'a> Emitter<'a> {
    pub(crate) fn new(
        symbols: &'a SymbolTable,
        types: &'a InferredTypes,
        options: &'a CompilerOptions,
        source_file: &str,
    ) -> Self {
        Self {
            symbols,
            types,
            options,
            source_file: source_file.to_string(),
            current: main_state(source_file),
            enclosing: Vec::new(),
            class: None,
            function_globals: FxHashMap::default(),
            inline_candidates: FxHashMap::default(),
            inline_stack: Vec::new(),
            pos: Pos::new(source_file, 1, 1),
            errors: Vec::new(),
            classes: Vec::new(),
            enums: Vec::new(),
        }
    }

    /// Emit a whole file and return its main function
    pub(crate) fn emit_file(&mut self, file: &'a File) -> Function {
        for decl in &file.declarations {
            self.pos = decl.pos().clone();
            match decl {
                Declaration::Class(class) => self.emit_class(class),
                Declaration::Interface(interface) => self.emit_interface(interface),
                Declaration::Enum(e) => {
                    let name = self.symbols.qualify(&e.name);
                    self.enums.push(EnumDef {
                        name,
                        members: e.members.clone(),
                    });
                }
                Declaration::TypeAlias(_) | Declaration::NewType(_) => {}
            }
        }

        // Every function is reachable by its global name before any body runs
        for decl in file.functions() {
            let global = self.symbols.qualify(&decl.name);
            self.function_globals.insert(decl.name.clone(), global);
        }
        for decl in file.functions() {
            self.emit_top_level_function(decl);
        }

        self.emit_function_body(&file.statements);
        let main = mem::replace(&mut self.current, main_state(&self.source_file));
        context::finish(main)
    }

    /// Compile a top-level function and store it in its global
    fn emit_top_level_function(&mut self, decl: &'a FunctionDecl) {
        self.pos = decl.pos.clone();
        let name = self.symbols.qualify(&decl.name);
        self.push_function(&name, FunctionKind::Function, &decl.params, &[], None);
        self.emit_function_body(&decl.body);
        let function = self.pop_function();

        if function.is_inlinable {
            if let Some(candidate) = inline_candidate(&name, decl) {
                log::trace!("{} is an inline candidate", name);
                if name != decl.name {
                    self.inline_candidates.insert(name.clone(), candidate.clone());
                }
                self.inline_candidates.insert(decl.name.clone(), candidate);
            }
        }

        self.emit_value(Value::Function(Box::new(function)));
        let index = self.name_constant(&name);
        self.emit_u16(Opcode::StoreGlobal, index);
        self.emit(Opcode::Pop);
    }

    // ========================================================================
    // Classes
    // ========================================================================

    fn emit_class(&mut self, class: &ClassDecl) {
        let name = self.symbols.qualify(&class.name);
        let parent = class
            .parent
            .as_ref()
            .map(|p| self.resolve_class_name(base_name(&p.type_name())));
        let saved = self.class.replace(ClassScope {
            name: name.clone(),
            parent: parent.clone(),
        });

        let properties = class
            .properties
            .iter()
            .map(|p| self.property_def(&name, p))
            .collect();
        let methods = class
            .methods
            .iter()
            .filter_map(|m| self.emit_method(m))
            .collect();
        let interfaces = class
            .interfaces
            .iter()
            .map(|i| self.resolve_class_name(i))
            .collect();

        self.class = saved;
        self.classes.push(ClassDef {
            name,
            parent,
            interfaces,
            is_final: class.is_final,
            is_interface: false,
            properties,
            methods,
        });
    }

    fn emit_interface(&mut self, interface: &InterfaceDecl) {
        let name = self.symbols.qualify(&interface.name);
        let interfaces = interface
            .parents
            .iter()
            .map(|p| self.resolve_class_name(p))
            .collect();
        self.classes.push(ClassDef {
            name,
            interfaces,
            is_interface: true,
            ..ClassDef::default()
        });
    }

    fn property_def(&mut self, class: &str, prop: &PropertyDecl) -> PropertyDef {
        let default = match &prop.default {
            None => Value::Null,
            Some(expr) => self.constant_value(expr).unwrap_or_else(|| {
                self.error(CompileError::ConstantRequired {
                    context: format!("default value of property {}::${}", class, prop.name),
                    pos: expr.pos().clone(),
                });
                Value::Null
            }),
        };
        PropertyDef {
            name: prop.name.clone(),
            type_name: prop
                .ty
                .as_ref()
                .map_or_else(|| "dynamic".to_string(), TypeNode::type_name),
            default,
            is_static: prop.is_static,
        }
    }

    /// Abstract methods have no body and produce nothing
    fn emit_method(&mut self, method: &MethodDecl) -> Option<Function> {
        let body = method.body.as_ref()?;
        self.pos = method.pos.clone();
        let kind = FunctionKind::Method {
            is_static: method.is_static,
        };
        self.push_function(&method.name, kind, &method.params, &[], None);
        self.emit_function_body(body);
        Some(self.pop_function())
    }

    /// Fully-qualified name of a class reference; `self`, `static` and
    /// `parent` resolve against the class being emitted
    pub(super) fn resolve_class_name(&self, name: &str) -> String {
        match name {
            "self" | "static" => match &self.class {
                Some(class) => class.name.clone(),
                None => name.to_string(),
            },
            "parent" => match self.class.as_ref().and_then(|c| c.parent.clone()) {
                Some(parent) => parent,
                None => name.to_string(),
            },
            _ if name.starts_with('\\') => name.trim_start_matches('\\').to_string(),
            _ => {
                let qualified = self.symbols.qualify(name);
                let known = self.symbols.class_exists(&qualified)
                    || self.symbols.is_interface(&qualified)
                    || self.symbols.is_enum(&qualified);
                if known {
                    qualified
                } else {
                    name.to_string()
                }
            }
        }
    }
}
