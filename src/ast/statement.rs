use crate::source::Span;

use super::declaration::LocalId;
use super::expression::Expression;
use super::name::Name;
use super::r#type::Type;

#[derive(Debug, Clone)]
pub enum Statement {
    Block(Block),
    VarDecl(VarDecl),
    ReturnStmt(Option<Expression>),
    IfStmt(IfStmt),
    WhileStmt(WhileStmt),
    ExpressionStmt(Expression),
}

#[derive(Debug, Clone, Default)]
pub struct Block {
    pub statements: Vec<Statement>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct VarDecl {
    pub name: Name,
    pub name_span: Span,
    pub r#type: Option<Type>,
    pub value: Expression,
    pub span: Span,
    pub local: Option<LocalId>,
}

#[derive(Debug, Clone)]
pub struct IfStmt {
    pub condition: Expression,
    pub block: Block,
    pub else_stmt: Option<ElseStmt>,
}

#[derive(Debug, Clone)]
pub enum ElseStmt {
    ElseIf(Box<IfStmt>),
    Else(Block),
}

#[derive(Debug, Clone)]
pub struct WhileStmt {
    pub condition: Expression,
    pub block: Block,
}

impl Statement {
    pub fn returns(&self) -> bool {
        match self {
            Statement::ReturnStmt(..) => true,
            Statement::Block(block) => block.returns(),
            _ => false,
        }
    }
}

impl Block {
    pub fn returns(&self) -> bool {
        self.statements.last().is_some_and(Statement::returns)
    }
}
