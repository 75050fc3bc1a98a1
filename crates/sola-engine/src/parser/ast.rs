//! Abstract Syntax Tree (AST) for the Sola language.
//!
//! The lexer and parser live outside this crate; they hand over a [`File`]
//! built from the node types defined here. This module defines:
//! - File structure (namespace, `use` directives, declarations, statements)
//! - Statements (declarations, control flow, etc.)
//! - Expressions (literals, operators, calls, closures, `match`)
//! - Type annotations
//!
//! Every AST node carries a [`Pos`] for diagnostics.

use std::fmt;
use std::sync::Arc;

pub mod expression;
pub mod statement;
pub mod types;
pub mod visitor;

pub use expression::*;
pub use statement::*;
pub use types::*;
pub use visitor::*;

/// Source position of a node
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pos {
    pub filename: Arc<str>,
    pub line: u32,
    pub column: u32,
}

impl Pos {
    pub fn new(filename: impl Into<Arc<str>>, line: u32, column: u32) -> Self {
        Self {
            filename: filename.into(),
            line,
            column,
        }
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.filename, self.line, self.column)
    }
}

/// Root node: one parsed source file
#[derive(Debug, Clone, PartialEq)]
pub struct File {
    /// Source path as given to the parser
    pub path: String,

    /// Optional `namespace` of the file (`App\Models`)
    pub namespace: Option<String>,

    /// `use` directives in source order
    pub uses: Vec<UseDecl>,

    /// Classes, interfaces, enums, type aliases and new-types
    pub declarations: Vec<Declaration>,

    /// Top-level statements (function declarations included)
    pub statements: Vec<Statement>,
}

impl File {
    /// Create an empty file with the given path
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            namespace: None,
            uses: Vec::new(),
            declarations: Vec::new(),
            statements: Vec::new(),
        }
    }

    /// Top-level function declarations, in source order
    pub fn functions(&self) -> impl Iterator<Item = &FunctionDecl> {
        self.statements.iter().filter_map(|stmt| match stmt {
            Statement::Function(decl) => Some(decl),
            _ => None,
        })
    }
}

/// `use Some\Import;`
#[derive(Debug, Clone, PartialEq)]
pub struct UseDecl {
    pub path: String,
    pub pos: Pos,
}

// ============================================================================
// Declarations
// ============================================================================

/// Top-level declaration
#[derive(Debug, Clone, PartialEq)]
pub enum Declaration {
    Class(ClassDecl),
    Interface(InterfaceDecl),
    Enum(EnumDecl),
    TypeAlias(TypeAliasDecl),
    NewType(NewTypeDecl),
}

impl Declaration {
    pub fn name(&self) -> &str {
        match self {
            Declaration::Class(d) => &d.name,
            Declaration::Interface(d) => &d.name,
            Declaration::Enum(d) => &d.name,
            Declaration::TypeAlias(d) => &d.name,
            Declaration::NewType(d) => &d.name,
        }
    }

    pub fn pos(&self) -> &Pos {
        match self {
            Declaration::Class(d) => &d.pos,
            Declaration::Interface(d) => &d.pos,
            Declaration::Enum(d) => &d.pos,
            Declaration::TypeAlias(d) => &d.pos,
            Declaration::NewType(d) => &d.pos,
        }
    }
}

/// Generic parameter with optional bounds: `T extends Base implements Countable`
#[derive(Debug, Clone, PartialEq)]
pub struct TypeParam {
    pub name: String,
    pub extends: Option<String>,
    pub implements: Vec<String>,
    pub pos: Pos,
}

impl TypeParam {
    pub fn new(name: impl Into<String>, pos: Pos) -> Self {
        Self {
            name: name.into(),
            extends: None,
            implements: Vec::new(),
            pos,
        }
    }
}

/// Class declaration
#[derive(Debug, Clone, PartialEq)]
pub struct ClassDecl {
    pub name: String,
    pub type_params: Vec<TypeParam>,
    /// Bounds given in a trailing `where` clause
    pub where_clause: Vec<TypeParam>,
    /// Parent class, possibly generic (`Box<int>`)
    pub parent: Option<TypeNode>,
    pub interfaces: Vec<String>,
    pub is_final: bool,
    pub properties: Vec<PropertyDecl>,
    pub methods: Vec<MethodDecl>,
    pub pos: Pos,
}

/// Interface declaration; method bodies are absent
#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceDecl {
    pub name: String,
    pub type_params: Vec<TypeParam>,
    pub parents: Vec<String>,
    pub methods: Vec<MethodDecl>,
    pub pos: Pos,
}

/// Enum declaration: `enum Colour { Red, Green, Blue }`
#[derive(Debug, Clone, PartialEq)]
pub struct EnumDecl {
    pub name: String,
    pub members: Vec<String>,
    pub pos: Pos,
}

/// `type Name = Target;`
#[derive(Debug, Clone, PartialEq)]
pub struct TypeAliasDecl {
    pub name: String,
    pub target: TypeNode,
    pub pos: Pos,
}

/// `newtype UserId = int;`
#[derive(Debug, Clone, PartialEq)]
pub struct NewTypeDecl {
    pub name: String,
    pub base: TypeNode,
    pub pos: Pos,
}

/// Property declaration inside a class
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDecl {
    pub name: String,
    pub ty: Option<TypeNode>,
    pub default: Option<Expression>,
    pub is_static: bool,
    pub pos: Pos,
}

/// Method declaration; `body` is `None` for interface methods
#[derive(Debug, Clone, PartialEq)]
pub struct MethodDecl {
    pub name: String,
    pub type_params: Vec<TypeParam>,
    pub params: Vec<Param>,
    pub return_type: Option<TypeNode>,
    pub body: Option<Vec<Statement>>,
    pub is_static: bool,
    pub pos: Pos,
}

/// Function or method parameter
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: Option<TypeNode>,
    pub default: Option<Expression>,
    pub variadic: bool,
    pub pos: Pos,
}

impl Param {
    pub fn new(name: impl Into<String>, ty: Option<TypeNode>, pos: Pos) -> Self {
        Self {
            name: name.into(),
            ty,
            default: None,
            variadic: false,
            pos,
        }
    }
}

/// Index of the first defaulted parameter, else the parameter count
pub fn min_arity(params: &[Param]) -> usize {
    params
        .iter()
        .position(|p| p.default.is_some() || p.variadic)
        .unwrap_or(params.len())
}
