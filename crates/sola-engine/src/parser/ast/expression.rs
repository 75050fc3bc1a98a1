//! Expression AST nodes
//!
//! This module defines all expression types in the Sola language, including:
//! - Literal expressions (numbers, strings, arrays, maps, SuperArrays)
//! - Unary and binary operations
//! - Function, method and static calls, with named arguments
//! - Closures and arrow functions
//! - `match` expressions

use super::*;

/// Expression (produces a value)
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Integer literal: 42
    IntLiteral(IntLiteral),

    /// Float literal: 3.14
    FloatLiteral(FloatLiteral),

    /// String literal: "hello"
    StringLiteral(StringLiteral),

    /// Interpolated string: "Hello, {$name}!"
    Interpolated(InterpolatedString),

    /// Boolean literal: true, false
    BoolLiteral(BoolLiteral),

    /// Null literal
    NullLiteral(Pos),

    /// `User::class`
    ClassName(ClassNameExpr),

    /// Array literal: [1, 2, 3]
    Array(ArrayLiteral),

    /// Map literal: map{"a": 1}
    Map(MapLiteral),

    /// SuperArray literal: ["a" => 1, 2]
    SuperArray(SuperArrayLiteral),

    /// Variable: $x
    Variable(Variable),

    /// Bare name: a function reference or constant
    Identifier(Identifier),

    /// `$this`
    This(Pos),

    /// Binary expression: $x + $y, $a && $b, $a ?? $b
    Binary(BinaryExpr),

    /// Unary expression: -$x, !$x, ~$x
    Unary(UnaryExpr),

    /// ++$x, $x--
    Increment(IncrementExpr),

    /// Assignment: $x = 42, $y += 1
    Assign(AssignExpr),

    /// Function call: f(1, b: 2)
    Call(CallExpr),

    /// Method call: $obj->m(1), $obj?->m()
    MethodCall(MethodCallExpr),

    /// Static call: Foo::make(1)
    StaticCall(StaticCallExpr),

    /// Static property or enum member: Foo::$count, Colour::Red
    StaticProperty(StaticPropertyExpr),

    /// Property access: $obj->name, $obj?->name
    Property(PropertyExpr),

    /// Index access: $arr[0]; `index: None` is the append form `$arr[]`
    Index(IndexExpr),

    /// New expression: new Box<int>(1)
    New(NewExpr),

    /// Ternary: $c ? $a : $b
    Ternary(TernaryExpr),

    /// Cast: (int) $x, or safe cast returning null on failure
    Cast(CastExpr),

    /// Type test: $x is User
    Is(IsExpr),

    /// Closure: function ($x) use ($y) { ... }
    Closure(ClosureExpr),

    /// Arrow function: fn ($x) => $x + $y
    Arrow(ArrowFnExpr),

    /// Match expression
    Match(MatchExpr),
}

impl Expression {
    /// Get the position of this expression
    pub fn pos(&self) -> &Pos {
        match self {
            Expression::IntLiteral(e) => &e.pos,
            Expression::FloatLiteral(e) => &e.pos,
            Expression::StringLiteral(e) => &e.pos,
            Expression::Interpolated(e) => &e.pos,
            Expression::BoolLiteral(e) => &e.pos,
            Expression::NullLiteral(pos) => pos,
            Expression::ClassName(e) => &e.pos,
            Expression::Array(e) => &e.pos,
            Expression::Map(e) => &e.pos,
            Expression::SuperArray(e) => &e.pos,
            Expression::Variable(e) => &e.pos,
            Expression::Identifier(e) => &e.pos,
            Expression::This(pos) => pos,
            Expression::Binary(e) => &e.pos,
            Expression::Unary(e) => &e.pos,
            Expression::Increment(e) => &e.pos,
            Expression::Assign(e) => &e.pos,
            Expression::Call(e) => &e.pos,
            Expression::MethodCall(e) => &e.pos,
            Expression::StaticCall(e) => &e.pos,
            Expression::StaticProperty(e) => &e.pos,
            Expression::Property(e) => &e.pos,
            Expression::Index(e) => &e.pos,
            Expression::New(e) => &e.pos,
            Expression::Ternary(e) => &e.pos,
            Expression::Cast(e) => &e.pos,
            Expression::Is(e) => &e.pos,
            Expression::Closure(e) => &e.pos,
            Expression::Arrow(e) => &e.pos,
            Expression::Match(e) => &e.pos,
        }
    }

    /// Check if this expression is a scalar literal
    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            Expression::IntLiteral(_)
                | Expression::FloatLiteral(_)
                | Expression::StringLiteral(_)
                | Expression::BoolLiteral(_)
                | Expression::NullLiteral(_)
        )
    }

    /// Name of the variable if this is `$name`
    pub fn as_variable(&self) -> Option<&str> {
        match self {
            Expression::Variable(v) => Some(&v.name),
            _ => None,
        }
    }

    /// Stable identity of this node, used to key per-expression side tables.
    ///
    /// Valid only while the owning AST is alive and not moved.
    pub fn node_id(&self) -> usize {
        self as *const Expression as usize
    }

    pub fn int(value: i64, pos: Pos) -> Self {
        Expression::IntLiteral(IntLiteral { value, pos })
    }

    pub fn float(value: f64, pos: Pos) -> Self {
        Expression::FloatLiteral(FloatLiteral { value, pos })
    }

    pub fn string(value: impl Into<String>, pos: Pos) -> Self {
        Expression::StringLiteral(StringLiteral {
            value: value.into(),
            pos,
        })
    }

    pub fn boolean(value: bool, pos: Pos) -> Self {
        Expression::BoolLiteral(BoolLiteral { value, pos })
    }

    pub fn var(name: impl Into<String>, pos: Pos) -> Self {
        Expression::Variable(Variable {
            name: name.into(),
            pos,
        })
    }

    pub fn ident(name: impl Into<String>, pos: Pos) -> Self {
        Expression::Identifier(Identifier {
            name: name.into(),
            pos,
        })
    }

    pub fn binary(op: BinaryOp, left: Expression, right: Expression, pos: Pos) -> Self {
        Expression::Binary(BinaryExpr {
            op,
            left: Box::new(left),
            right: Box::new(right),
            pos,
        })
    }

    pub fn call(callee: Expression, args: Vec<Argument>, pos: Pos) -> Self {
        Expression::Call(CallExpr {
            callee: Box::new(callee),
            args,
            pos,
        })
    }

    pub fn assign(target: Expression, value: Expression, pos: Pos) -> Self {
        Expression::Assign(AssignExpr {
            target: Box::new(target),
            op: AssignOp::Assign,
            value: Box::new(value),
            pos,
        })
    }
}

// ============================================================================
// Literal Expressions
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct IntLiteral {
    pub value: i64,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FloatLiteral {
    pub value: f64,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StringLiteral {
    pub value: String,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoolLiteral {
    pub value: bool,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InterpolatedString {
    pub parts: Vec<InterpolationPart>,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InterpolationPart {
    Literal(String),
    Expression(Expression),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassNameExpr {
    pub class: String,
    pub pos: Pos,
}

// ============================================================================
// Container Literals
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ArrayLiteral {
    pub elements: Vec<Expression>,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapLiteral {
    pub entries: Vec<(Expression, Expression)>,
    pub pos: Pos,
}

/// SuperArray entry; a missing key takes the next integer index
#[derive(Debug, Clone, PartialEq)]
pub struct SuperArrayEntry {
    pub key: Option<Expression>,
    pub value: Expression,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SuperArrayLiteral {
    pub entries: Vec<SuperArrayEntry>,
    pub pos: Pos,
}

// ============================================================================
// Names
// ============================================================================

/// `$name` (stored without the sigil)
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Identifier {
    pub name: String,
    pub pos: Pos,
}

// ============================================================================
// Unary & Binary Expressions
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct BinaryExpr {
    pub op: BinaryOp,
    pub left: Box<Expression>,
    pub right: Box<Expression>,
    pub pos: Pos,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,

    // Bitwise
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,

    // Comparison
    Eq,
    Ne,
    Identical,
    NotIdentical,
    Lt,
    Le,
    Gt,
    Ge,

    // Logical
    And,
    Or,
    Coalesce,
}

impl BinaryOp {
    /// Source spelling of the operator
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Identical => "===",
            BinaryOp::NotIdentical => "!==",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Coalesce => "??",
        }
    }

    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod
        )
    }

    pub fn is_bitwise(self) -> bool {
        matches!(
            self,
            BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor | BinaryOp::Shl | BinaryOp::Shr
        )
    }

    pub fn is_equality(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Identical | BinaryOp::NotIdentical
        )
    }

    pub fn is_ordering(self) -> bool {
        matches!(self, BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge)
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnaryExpr {
    pub op: UnaryOp,
    pub operand: Box<Expression>,
    pub pos: Pos,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
    Not,
    BitNot,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
            UnaryOp::BitNot => "~",
        }
    }
}

/// `++$x`, `$x++`, `--$x`, `$x--`
#[derive(Debug, Clone, PartialEq)]
pub struct IncrementExpr {
    pub target: Box<Expression>,
    pub is_increment: bool,
    pub is_prefix: bool,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssignExpr {
    pub target: Box<Expression>,
    pub op: AssignOp,
    pub value: Box<Expression>,
    pub pos: Pos,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    Coalesce,
}

impl AssignOp {
    /// The binary operator a compound assignment applies
    pub fn binary_op(self) -> Option<BinaryOp> {
        match self {
            AssignOp::Assign => None,
            AssignOp::Add => Some(BinaryOp::Add),
            AssignOp::Sub => Some(BinaryOp::Sub),
            AssignOp::Mul => Some(BinaryOp::Mul),
            AssignOp::Div => Some(BinaryOp::Div),
            AssignOp::Mod => Some(BinaryOp::Mod),
            AssignOp::BitAnd => Some(BinaryOp::BitAnd),
            AssignOp::BitOr => Some(BinaryOp::BitOr),
            AssignOp::BitXor => Some(BinaryOp::BitXor),
            AssignOp::Shl => Some(BinaryOp::Shl),
            AssignOp::Shr => Some(BinaryOp::Shr),
            AssignOp::Coalesce => Some(BinaryOp::Coalesce),
        }
    }
}

// ============================================================================
// Calls and Member Access
// ============================================================================

/// Call argument, positional or named (`name: value`)
#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    pub name: Option<String>,
    pub value: Expression,
}

impl Argument {
    pub fn positional(value: Expression) -> Self {
        Self { name: None, value }
    }

    pub fn named(name: impl Into<String>, value: Expression) -> Self {
        Self {
            name: Some(name.into()),
            value,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallExpr {
    pub callee: Box<Expression>,
    pub args: Vec<Argument>,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodCallExpr {
    pub object: Box<Expression>,
    pub method: String,
    pub args: Vec<Argument>,
    pub nullsafe: bool,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StaticCallExpr {
    pub class: String,
    pub method: String,
    pub args: Vec<Argument>,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StaticPropertyExpr {
    pub class: String,
    pub property: String,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyExpr {
    pub object: Box<Expression>,
    pub property: String,
    pub nullsafe: bool,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexExpr {
    pub object: Box<Expression>,
    pub index: Option<Box<Expression>>,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewExpr {
    pub class: String,
    pub type_args: Vec<TypeNode>,
    pub args: Vec<Argument>,
    pub pos: Pos,
}

// ============================================================================
// Complex Expressions
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct TernaryExpr {
    pub condition: Box<Expression>,
    pub then_branch: Box<Expression>,
    pub else_branch: Box<Expression>,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CastExpr {
    pub value: Box<Expression>,
    pub target: TypeNode,
    /// Safe casts yield null instead of throwing
    pub safe: bool,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IsExpr {
    pub value: Box<Expression>,
    pub target: TypeNode,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClosureExpr {
    pub params: Vec<Param>,
    pub return_type: Option<TypeNode>,
    /// Variables captured by value via `use (...)`
    pub uses: Vec<String>,
    pub body: Vec<Statement>,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArrowFnExpr {
    pub params: Vec<Param>,
    pub return_type: Option<TypeNode>,
    pub body: Box<Expression>,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchExpr {
    pub subject: Box<Expression>,
    pub arms: Vec<MatchArm>,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchArm {
    pub pattern: MatchPattern,
    pub guard: Option<Expression>,
    pub body: Expression,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MatchPattern {
    /// `_`
    Wildcard,
    /// Compared with `==`
    Value(Expression),
    /// `User $u`: type test with optional binding
    Type {
        ty: TypeNode,
        binding: Option<String>,
    },
}
