use crate::source::Span;

use super::declaration::LocalId;
use super::literal::Literal;
use super::name::Name;
use super::operator::{BinaryOp, UnaryOp};

#[derive(Debug, Clone)]
pub struct Expression {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Literal(Literal),
    OperandName(Name, Option<Binding>),
    UnaryOp(UnaryOp, Box<Expression>),
    BinaryOp(BinaryOp, Box<Expression>, Box<Expression>),
    Assignment(Box<Expression>, Box<Expression>),
    Arguments(Box<Expression>, Vec<Expression>),
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Binding {
    Local(LocalId),
    Function(usize),
}

impl Expression {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Expression { kind, span }
    }

    pub fn literal(&self) -> Option<&Literal> {
        match &self.kind {
            ExprKind::Literal(lit) => Some(lit),
            _ => None,
        }
    }
}
