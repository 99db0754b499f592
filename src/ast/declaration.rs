use crate::source::Span;

use super::name::Name;
use super::r#type::Type;
use super::statement::Block;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct LocalId(pub u16);

#[derive(Debug, Clone)]
pub struct FunctionDecl {
    pub name: Name,
    pub name_span: Span,
    pub params: Vec<Param>,
    pub returns: Option<Type>,
    pub block: Block,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: Name,
    pub r#type: Option<Type>,
    pub span: Span,
    pub local: Option<LocalId>,
}
