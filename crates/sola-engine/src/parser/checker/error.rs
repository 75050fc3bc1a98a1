//! Error types for type checking and emission
//!
//! Provides structured error types with source positions for reporting
//! type-checking, binding and code-generation errors.

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::parser::ast::Pos;

/// Errors produced by the checker and the emitter
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CompileError {
    /// Value assigned to a variable of an incompatible declared type
    #[error("cannot assign {actual} to variable of type {expected}")]
    AssignMismatch {
        expected: String,
        actual: String,
        pos: Pos,
    },

    /// Value assigned to a property of an incompatible declared type
    #[error("cannot assign {actual} to property {class}::{property} of type {expected}")]
    PropertyMismatch {
        class: String,
        property: String,
        expected: String,
        actual: String,
        pos: Pos,
    },

    /// Argument incompatible with the parameter type
    #[error("argument {index} of {callee} expects {expected}, found {actual}")]
    ArgumentMismatch {
        callee: String,
        index: usize,
        expected: String,
        actual: String,
        pos: Pos,
    },

    /// Wrong number of arguments
    #[error("{callee} expects {} argument(s), found {actual}", arity_range(*min, *max))]
    ArgumentCount {
        callee: String,
        min: usize,
        max: Option<usize>,
        actual: usize,
        pos: Pos,
    },

    #[error("{callee} has no parameter named {name}")]
    UnknownNamedArgument { callee: String, name: String, pos: Pos },

    #[error("parameter {name} of {callee} is passed more than once")]
    DuplicateNamedArgument { callee: String, name: String, pos: Pos },

    #[error("missing required argument {name} for {callee}")]
    MissingArgument { callee: String, name: String, pos: Pos },

    #[error("positional argument follows a named argument in call to {callee}")]
    PositionalAfterNamed { callee: String, pos: Pos },

    /// Returned value incompatible with the declared return type
    #[error("return type mismatch: expected {expected}, found {actual}")]
    ReturnMismatch {
        expected: String,
        actual: String,
        pos: Pos,
    },

    #[error("expected {expected} return value(s), found {actual}")]
    ReturnCount {
        expected: usize,
        actual: usize,
        pos: Pos,
    },

    #[error("function {function} does not return a value on every path")]
    MissingReturn { function: String, pos: Pos },

    #[error("undefined variable ${name}")]
    UndefinedVariable { name: String, pos: Pos },

    #[error("undefined function {name}")]
    UndefinedFunction { name: String, pos: Pos },

    #[error("undefined class {name}")]
    UndefinedClass { name: String, pos: Pos },

    #[error("undefined method {class}::{method}")]
    UndefinedMethod {
        class: String,
        method: String,
        pos: Pos,
    },

    #[error("undefined property {class}::{property}")]
    UndefinedProperty {
        class: String,
        property: String,
        pos: Pos,
    },

    #[error("enum {enum_name} has no member {member}")]
    UndefinedEnumMember {
        enum_name: String,
        member: String,
        pos: Pos,
    },

    #[error("operator {op} cannot be applied to {left} and {right}")]
    InvalidBinaryOp {
        op: String,
        left: String,
        right: String,
        pos: Pos,
    },

    #[error("operator {op} cannot be applied to {operand}")]
    InvalidUnaryOp {
        op: String,
        operand: String,
        pos: Pos,
    },

    /// `$x := expr` where `expr` has no usable type
    #[error("cannot infer the type of ${name} from {actual}")]
    CannotInfer {
        name: String,
        actual: String,
        pos: Pos,
    },

    #[error("switch over {enum_name} is not exhaustive, missing: {}", missing.join(", "))]
    NonExhaustiveSwitch {
        enum_name: String,
        missing: Vec<String>,
        pos: Pos,
    },

    #[error("cannot index into {ty}")]
    NotIndexable { ty: String, pos: Pos },

    #[error("cannot iterate over {ty}")]
    NotIterable { ty: String, pos: Pos },

    #[error("cannot call a value of type {ty}")]
    NotCallable { ty: String, pos: Pos },

    #[error("compound assignment to an array element is not supported")]
    CompoundIndexAssignment { pos: Pos },

    #[error("{class} expects {expected} type argument(s), found {actual}")]
    TypeArgumentCount {
        class: String,
        expected: usize,
        actual: usize,
        pos: Pos,
    },

    #[error("type constraint violation: {message}")]
    ConstraintViolation { message: String, pos: Pos },

    #[error("{message}")]
    InterfaceConformance { message: String, pos: Pos },

    #[error("class {class} cannot extend final class {parent}")]
    FinalClassExtended {
        class: String,
        parent: String,
        pos: Pos,
    },

    #[error("cannot instantiate interface {name}")]
    InterfaceInstantiation { name: String, pos: Pos },

    #[error("{name} may only be called from the sola.* namespace")]
    RestrictedFunction { name: String, pos: Pos },

    #[error("cannot cast {from} to {to}")]
    InvalidCast { from: String, to: String, pos: Pos },

    #[error("cannot throw a value of type {ty}")]
    InvalidThrow { ty: String, pos: Pos },

    #[error("cannot destructure {actual} into {expected} variable(s)")]
    DestructureCount {
        expected: usize,
        actual: String,
        pos: Pos,
    },

    #[error("map literal {part} type mismatch: expected {expected}, found {actual}")]
    MapEntryMismatch {
        part: &'static str,
        expected: String,
        actual: String,
        pos: Pos,
    },

    #[error("break statement outside of loop or switch")]
    BreakOutsideLoop { pos: Pos },

    #[error("continue statement outside of loop")]
    ContinueOutsideLoop { pos: Pos },

    #[error("variable ${name} is already declared in this scope")]
    Redeclaration { name: String, pos: Pos },

    #[error("too many local variables in one function (limit {limit})")]
    TooManyLocals { limit: usize, pos: Pos },

    #[error("bytecode limit exceeded: {what}")]
    LimitExceeded { what: String, pos: Pos },

    #[error("invalid assignment target")]
    InvalidAssignTarget { pos: Pos },

    #[error("{context} must be a constant expression")]
    ConstantRequired { context: String, pos: Pos },
}

fn arity_range(min: usize, max: Option<usize>) -> String {
    match max {
        None => format!("at least {}", min),
        Some(max) if max == min => min.to_string(),
        Some(max) => format!("{} to {}", min, max),
    }
}

impl CompileError {
    /// Source position of the error
    pub fn pos(&self) -> &Pos {
        use CompileError::*;
        match self {
            AssignMismatch { pos, .. }
            | PropertyMismatch { pos, .. }
            | ArgumentMismatch { pos, .. }
            | ArgumentCount { pos, .. }
            | UnknownNamedArgument { pos, .. }
            | DuplicateNamedArgument { pos, .. }
            | MissingArgument { pos, .. }
            | PositionalAfterNamed { pos, .. }
            | ReturnMismatch { pos, .. }
            | ReturnCount { pos, .. }
            | MissingReturn { pos, .. }
            | UndefinedVariable { pos, .. }
            | UndefinedFunction { pos, .. }
            | UndefinedClass { pos, .. }
            | UndefinedMethod { pos, .. }
            | UndefinedProperty { pos, .. }
            | UndefinedEnumMember { pos, .. }
            | InvalidBinaryOp { pos, .. }
            | InvalidUnaryOp { pos, .. }
            | CannotInfer { pos, .. }
            | NonExhaustiveSwitch { pos, .. }
            | NotIndexable { pos, .. }
            | NotIterable { pos, .. }
            | NotCallable { pos, .. }
            | CompoundIndexAssignment { pos }
            | TypeArgumentCount { pos, .. }
            | ConstraintViolation { pos, .. }
            | InterfaceConformance { pos, .. }
            | FinalClassExtended { pos, .. }
            | InterfaceInstantiation { pos, .. }
            | RestrictedFunction { pos, .. }
            | InvalidCast { pos, .. }
            | InvalidThrow { pos, .. }
            | DestructureCount { pos, .. }
            | MapEntryMismatch { pos, .. }
            | BreakOutsideLoop { pos }
            | ContinueOutsideLoop { pos }
            | Redeclaration { pos, .. }
            | TooManyLocals { pos, .. }
            | LimitExceeded { pos, .. }
            | InvalidAssignTarget { pos }
            | ConstantRequired { pos, .. } => pos,
        }
    }

    /// Stable error code
    pub fn code(&self) -> &'static str {
        use CompileError::*;
        match self {
            AssignMismatch { .. } => "E0001",
            PropertyMismatch { .. } => "E0002",
            ArgumentMismatch { .. } => "E0003",
            ArgumentCount { .. } => "E0004",
            UnknownNamedArgument { .. } => "E0005",
            DuplicateNamedArgument { .. } => "E0006",
            MissingArgument { .. } => "E0007",
            PositionalAfterNamed { .. } => "E0008",
            ReturnMismatch { .. } => "E0009",
            ReturnCount { .. } => "E0010",
            MissingReturn { .. } => "E0011",
            UndefinedVariable { .. } => "E0012",
            UndefinedFunction { .. } => "E0013",
            UndefinedClass { .. } => "E0014",
            UndefinedMethod { .. } => "E0015",
            UndefinedProperty { .. } => "E0016",
            UndefinedEnumMember { .. } => "E0017",
            InvalidBinaryOp { .. } => "E0018",
            InvalidUnaryOp { .. } => "E0019",
            CannotInfer { .. } => "E0020",
            NonExhaustiveSwitch { .. } => "E0021",
            NotIndexable { .. } => "E0022",
            NotIterable { .. } => "E0023",
            NotCallable { .. } => "E0024",
            CompoundIndexAssignment { .. } => "E0025",
            TypeArgumentCount { .. } => "E0026",
            ConstraintViolation { .. } => "E0027",
            InterfaceConformance { .. } => "E0028",
            FinalClassExtended { .. } => "E0029",
            InterfaceInstantiation { .. } => "E0030",
            RestrictedFunction { .. } => "E0031",
            InvalidCast { .. } => "E0032",
            InvalidThrow { .. } => "E0033",
            DestructureCount { .. } => "E0034",
            MapEntryMismatch { .. } => "E0035",
            BreakOutsideLoop { .. } => "E0036",
            ContinueOutsideLoop { .. } => "E0037",
            Redeclaration { .. } => "E0038",
            TooManyLocals { .. } => "E0039",
            LimitExceeded { .. } => "E0040",
            InvalidAssignTarget { .. } => "E0041",
            ConstantRequired { .. } => "E0042",
        }
    }
}

// ========================================================================
// Warnings
// ========================================================================

/// Warning codes for configurable warnings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WarningCode {
    /// Unreachable code (W1001)
    UnreachableCode,
    /// Possibly uninitialised variable (W1002)
    UninitializedVariable,
    /// Style hint (W1003)
    StyleHint,
}

impl WarningCode {
    /// Get the warning code string (e.g., "W1001")
    pub fn as_str(&self) -> &'static str {
        match self {
            WarningCode::UnreachableCode => "W1001",
            WarningCode::UninitializedVariable => "W1002",
            WarningCode::StyleHint => "W1003",
        }
    }

    /// Parse a warning code from its configuration name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "unreachable-code" => Some(WarningCode::UnreachableCode),
            "uninitialized-variable" => Some(WarningCode::UninitializedVariable),
            "style-hint" => Some(WarningCode::StyleHint),
            _ => None,
        }
    }
}

/// Warnings emitted during checking and dataflow analysis
#[derive(Debug, Clone, PartialEq)]
pub enum CheckWarning {
    /// Code that can never execute
    UnreachableCode { pos: Pos },

    /// Variable read on a path where it was never assigned
    UninitializedVariable { name: String, pos: Pos },

    /// Suggest a shorter construct (`??`, `?->`)
    StyleHint { message: String, pos: Pos },
}

impl CheckWarning {
    pub fn pos(&self) -> &Pos {
        match self {
            CheckWarning::UnreachableCode { pos }
            | CheckWarning::UninitializedVariable { pos, .. }
            | CheckWarning::StyleHint { pos, .. } => pos,
        }
    }

    /// Get the warning code for this warning
    pub fn code(&self) -> WarningCode {
        match self {
            CheckWarning::UnreachableCode { .. } => WarningCode::UnreachableCode,
            CheckWarning::UninitializedVariable { .. } => WarningCode::UninitializedVariable,
            CheckWarning::StyleHint { .. } => WarningCode::StyleHint,
        }
    }

    pub fn message(&self) -> String {
        match self {
            CheckWarning::UnreachableCode { .. } => "unreachable code".to_string(),
            CheckWarning::UninitializedVariable { name, .. } => {
                format!("variable ${} may be used before it is assigned", name)
            }
            CheckWarning::StyleHint { message, .. } => message.clone(),
        }
    }
}

/// Configuration for which warnings are enabled/disabled
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WarningConfig {
    /// Disabled warning codes (suppressed)
    pub disabled: FxHashSet<WarningCode>,
    /// Warnings promoted to errors
    pub deny: FxHashSet<WarningCode>,
}

impl WarningConfig {
    /// Check if a warning should be emitted
    pub fn is_enabled(&self, code: WarningCode) -> bool {
        !self.disabled.contains(&code)
    }

    /// Check if a warning should be treated as an error
    pub fn is_denied(&self, code: WarningCode) -> bool {
        self.deny.contains(&code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos() -> Pos {
        Pos::new("main.sola", 3, 9)
    }

    // ── CompileError ────────────────────────────────────────────────────

    #[test]
    fn test_assign_mismatch_message() {
        let err = CompileError::AssignMismatch {
            expected: "string".into(),
            actual: "int".into(),
            pos: pos(),
        };
        assert_eq!(err.to_string(), "cannot assign int to variable of type string");
        assert_eq!(err.code(), "E0001");
        assert_eq!(err.pos().line, 3);
    }

    #[test]
    fn test_non_exhaustive_message() {
        let err = CompileError::NonExhaustiveSwitch {
            enum_name: "Colour".into(),
            missing: vec!["Green".into(), "Blue".into()],
            pos: pos(),
        };
        assert_eq!(
            err.to_string(),
            "switch over Colour is not exhaustive, missing: Green, Blue"
        );
    }

    #[test]
    fn test_argument_count_message() {
        let exact = CompileError::ArgumentCount {
            callee: "f".into(),
            min: 2,
            max: Some(2),
            actual: 1,
            pos: pos(),
        };
        assert_eq!(exact.to_string(), "f expects 2 argument(s), found 1");
        let open = CompileError::ArgumentCount {
            callee: "print".into(),
            min: 1,
            max: None,
            actual: 0,
            pos: pos(),
        };
        assert_eq!(open.to_string(), "print expects at least 1 argument(s), found 0");
    }

    // ── WarningCode ─────────────────────────────────────────────────────

    #[test]
    fn test_warning_code_as_str() {
        assert_eq!(WarningCode::UnreachableCode.as_str(), "W1001");
        assert_eq!(WarningCode::UninitializedVariable.as_str(), "W1002");
        assert_eq!(WarningCode::StyleHint.as_str(), "W1003");
    }

    #[test]
    fn test_warning_code_from_name() {
        assert_eq!(WarningCode::from_name("unreachable-code"), Some(WarningCode::UnreachableCode));
        assert_eq!(WarningCode::from_name("style-hint"), Some(WarningCode::StyleHint));
        assert_eq!(WarningCode::from_name("unknown"), None);
    }

    // ── WarningConfig ───────────────────────────────────────────────────

    #[test]
    fn test_warning_config() {
        let mut config = WarningConfig::default();
        assert!(config.is_enabled(WarningCode::StyleHint));
        config.disabled.insert(WarningCode::StyleHint);
        config.deny.insert(WarningCode::UnreachableCode);
        assert!(!config.is_enabled(WarningCode::StyleHint));
        assert!(config.is_denied(WarningCode::UnreachableCode));
        assert!(!config.is_denied(WarningCode::UninitializedVariable));
    }
}
