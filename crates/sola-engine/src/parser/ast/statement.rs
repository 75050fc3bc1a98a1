//! Statement AST nodes

use super::*;

/// Statement
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// Expression statement: f(1);
    Expression(ExpressionStmt),

    /// `var $x: int = 1;` or `$x := 1;`
    VarDecl(VarDecl),

    /// `($a, $b) = f();`
    MultiAssign(MultiAssign),

    If(IfStmt),
    While(WhileStmt),
    For(ForStmt),
    Foreach(ForeachStmt),
    Switch(SwitchStmt),
    Break(Pos),
    Continue(Pos),
    Return(ReturnStmt),
    Echo(EchoStmt),
    Try(TryStmt),
    Throw(ThrowStmt),
    Block(BlockStmt),

    /// Function declaration (top level or nested)
    Function(FunctionDecl),

    /// `unset($a[$k]);`
    Unset(UnsetStmt),
}

impl Statement {
    /// Get the position of this statement
    pub fn pos(&self) -> &Pos {
        match self {
            Statement::Expression(s) => &s.pos,
            Statement::VarDecl(s) => &s.pos,
            Statement::MultiAssign(s) => &s.pos,
            Statement::If(s) => &s.pos,
            Statement::While(s) => &s.pos,
            Statement::For(s) => &s.pos,
            Statement::Foreach(s) => &s.pos,
            Statement::Switch(s) => &s.pos,
            Statement::Break(pos) => pos,
            Statement::Continue(pos) => pos,
            Statement::Return(s) => &s.pos,
            Statement::Echo(s) => &s.pos,
            Statement::Try(s) => &s.pos,
            Statement::Throw(s) => &s.pos,
            Statement::Block(s) => &s.pos,
            Statement::Function(s) => &s.pos,
            Statement::Unset(s) => &s.pos,
        }
    }

    /// Whether control never continues past this statement
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Statement::Return(_) | Statement::Throw(_) | Statement::Break(_) | Statement::Continue(_)
        )
    }

    pub fn expr(expr: Expression) -> Self {
        let pos = expr.pos().clone();
        Statement::Expression(ExpressionStmt { expr, pos })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionStmt {
    pub expr: Expression,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub name: String,
    pub ty: Option<TypeNode>,
    pub init: Option<Expression>,
    /// Declared with the short `:=` form
    pub is_short: bool,
    pub pos: Pos,
}

impl VarDecl {
    pub fn new(
        name: impl Into<String>,
        ty: Option<TypeNode>,
        init: Option<Expression>,
        pos: Pos,
    ) -> Self {
        Self {
            name: name.into(),
            ty,
            init,
            is_short: false,
            pos,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MultiAssign {
    pub names: Vec<String>,
    pub value: Expression,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfStmt {
    pub condition: Expression,
    pub then_branch: Vec<Statement>,
    pub else_ifs: Vec<ElseIf>,
    pub else_branch: Option<Vec<Statement>>,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElseIf {
    pub condition: Expression,
    pub body: Vec<Statement>,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WhileStmt {
    pub condition: Expression,
    pub body: Vec<Statement>,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForStmt {
    pub init: Option<Box<Statement>>,
    pub condition: Option<Expression>,
    pub update: Option<Expression>,
    pub body: Vec<Statement>,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForeachStmt {
    pub iterable: Expression,
    pub key: Option<String>,
    pub value: String,
    pub body: Vec<Statement>,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchStmt {
    pub subject: Expression,
    pub cases: Vec<SwitchCase>,
    pub default: Option<Vec<Statement>>,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchCase {
    pub value: Expression,
    pub body: Vec<Statement>,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReturnStmt {
    pub values: Vec<Expression>,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EchoStmt {
    pub value: Expression,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TryStmt {
    pub body: Vec<Statement>,
    pub catches: Vec<CatchClause>,
    pub finally: Option<Vec<Statement>>,
    pub pos: Pos,
}

/// `catch (Exception $e) { ... }`
#[derive(Debug, Clone, PartialEq)]
pub struct CatchClause {
    pub class: String,
    pub var: Option<String>,
    pub body: Vec<Statement>,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThrowStmt {
    pub value: Expression,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlockStmt {
    pub body: Vec<Statement>,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: String,
    pub type_params: Vec<TypeParam>,
    pub params: Vec<Param>,
    pub return_type: Option<TypeNode>,
    pub body: Vec<Statement>,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnsetStmt {
    pub target: Expression,
    pub pos: Pos,
}
